//! KubeScript Run Phase
//!
//! Serves the handlers an application declared, at exactly the endpoints the
//! build phase wired into the gateway:
//!
//! - `POST /<identifier>` calls the handler and answers `200` with a
//!   `{ body, headers, statusCode }` envelope
//! - `GET /readinessProbe` answers `ok`
//!
//! Handler failures are recovered per request, logged, and broadcast to
//! [`Runner::subscribe_failures`] receivers.

#![deny(unsafe_code)]
#![cfg_attr(feature = "strict-docs", warn(missing_docs))]
#![cfg_attr(not(feature = "strict-docs"), allow(missing_docs))]

pub mod dispatcher;
pub mod emitter;
pub mod envelope;
pub mod error;
pub mod routes;
pub mod server;

pub use dispatcher::{create_router, DispatchState};
pub use emitter::GatewayEmitter;
pub use envelope::{Envelope, InvocationFailure};
pub use error::{RuntimeError, RuntimeResult};
pub use routes::RouteTable;
pub use server::Runner;
