//! KubeScript Core
//!
//! Shared vocabulary for both execution phases of a KubeScript application.
//!
//! ## Phases
//!
//! - **build**: the declared routes drive manifest synthesis, the deployment
//!   pipeline and gateway wiring (`kubescript-build`)
//! - **run**: the same declarations drive request dispatch (`kubescript-runtime`)
//!
//! ## Key Principle
//!
//! The two phases run as separate processes and share no state other than the
//! [`Identifier`] derived from each [`Registration`]. Everything that feeds the
//! derivation lives in this crate so both phases compute it the same way.
//!
//! ## Usage
//!
//! ```no_run
//! use kubescript_core::{App, Context, HandlerError, Invocation, Reply};
//!
//! let mut app = App::new();
//! app.get("/cart", |_req: Invocation, _ctx: Context| async move {
//!     Ok::<_, HandlerError>(Reply::json(serde_json::json!({ "items": [] })))
//! });
//!
//! let registrations = app.registrations().expect("valid declarations");
//! assert!(registrations.contains("GET-cart"));
//! ```

#![deny(unsafe_code)]
#![cfg_attr(feature = "strict-docs", warn(missing_docs))]
#![cfg_attr(not(feature = "strict-docs"), allow(missing_docs))]

pub mod addressing;
pub mod config;
pub mod descriptor;
pub mod emit;
pub mod error;
pub mod handler;
pub mod registration;

// Re-exports
pub use addressing::{HttpMethod, Identifier};
pub use config::{BuildSettings, GatewayConfig, KubeScriptConfig, LoggingConfig, ServerConfig};
pub use descriptor::ProjectDescriptor;
pub use emit::{EmitError, Emitter};
pub use error::{ConfigError, RegistrationError};
pub use handler::{Context, Handler, HandlerError, Invocation, Reply};
pub use registration::{App, Registration, RegistrationSet, Trigger};
