//! KubeScript
//!
//! Declare HTTP routes and event handlers once. The same declarations drive
//! the build phase (image, manifests, cluster deploy, gateway wiring) and the
//! run phase (request dispatch inside the container).
//!
//! ```no_run
//! use kubescript::{App, Context, HandlerError, Invocation, Reply};
//!
//! #[tokio::main]
//! async fn main() -> std::process::ExitCode {
//!     let mut app = App::new();
//!     app.get("/cart", |_req: Invocation, _ctx: Context| async move {
//!         Ok::<_, HandlerError>(Reply::json(serde_json::json!({ "items": [] })))
//!     });
//!     kubescript::launch(app).await
//! }
//! ```

#![deny(unsafe_code)]
#![cfg_attr(feature = "strict-docs", warn(missing_docs))]
#![cfg_attr(not(feature = "strict-docs"), allow(missing_docs))]

pub mod cli;
pub mod logging;

pub use cli::{launch, Cli, Command};

pub use kubescript_core::{
    App, Context, EmitError, Emitter, Handler, HandlerError, HttpMethod, Identifier, Invocation,
    KubeScriptConfig, ProjectDescriptor, Registration, RegistrationError, RegistrationSet, Reply,
    Trigger,
};

pub use kubescript_build as build;
pub use kubescript_runtime as runtime;
