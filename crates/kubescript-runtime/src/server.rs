//! Server setup and lifecycle

use crate::dispatcher::{create_router, DispatchState};
use crate::emitter::GatewayEmitter;
use crate::envelope::InvocationFailure;
use crate::error::{RuntimeError, RuntimeResult};
use crate::routes::RouteTable;
use axum::Router;
use kubescript_core::{App, Emitter, KubeScriptConfig, ServerConfig};
use std::future::Future;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::broadcast;

/// Capacity of the failure broadcast channel
const FAILURE_CHANNEL_CAPACITY: usize = 256;

/// Run-phase server for one application
pub struct Runner {
    config: ServerConfig,
    routes: Arc<RouteTable>,
    emitter: Arc<dyn Emitter>,
    failures: broadcast::Sender<InvocationFailure>,
}

impl Runner {
    /// Finalise `app` into a route table. Events are emitted to the
    /// configured gateway.
    pub fn new(app: &App, config: &KubeScriptConfig) -> RuntimeResult<Self> {
        let registrations = app.registrations()?;
        let (failures, _) = broadcast::channel(FAILURE_CHANNEL_CAPACITY);

        Ok(Self {
            config: config.server.clone(),
            routes: Arc::new(RouteTable::from_registrations(&registrations)),
            emitter: Arc::new(GatewayEmitter::from_config(&config.gateway)),
            failures,
        })
    }

    /// Replace the emitter handed to handlers
    pub fn with_emitter(mut self, emitter: Arc<dyn Emitter>) -> Self {
        self.emitter = emitter;
        self
    }

    /// Receive every failed invocation from now on
    pub fn subscribe_failures(&self) -> broadcast::Receiver<InvocationFailure> {
        self.failures.subscribe()
    }

    pub fn routes(&self) -> &RouteTable {
        &self.routes
    }

    /// Dispatcher router
    pub fn router(&self) -> Router {
        let state = DispatchState::new(
            self.routes.clone(),
            self.emitter.clone(),
            self.failures.clone(),
        );
        create_router(state, &self.config)
    }

    /// Listen on the configured address until Ctrl+C or SIGTERM
    pub async fn run(self) -> RuntimeResult<()> {
        let addr = self.config.listen_addr;
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| RuntimeError::Bind { addr, source })?;

        self.serve(listener, shutdown_signal()).await
    }

    /// Serve on `listener` until `shutdown` resolves
    pub async fn serve<F>(self, listener: TcpListener, shutdown: F) -> RuntimeResult<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let addr = listener
            .local_addr()
            .map_err(|e| RuntimeError::Server(e.to_string()))?;
        tracing::info!("KubeScript runner listening on {}", addr);
        tracing::info!("Serving {} handler(s)", self.routes.len());

        axum::serve(listener, self.router())
            .with_graceful_shutdown(shutdown)
            .await
            .map_err(|e| RuntimeError::Server(e.to_string()))?;

        tracing::info!("KubeScript runner shutting down");
        Ok(())
    }
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install signal handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating graceful shutdown");
        }
        _ = terminate => {
            tracing::info!("Received terminate signal, initiating graceful shutdown");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::envelope::Envelope;
    use kubescript_core::{Context, HandlerError, Invocation, Reply};
    use tokio::sync::oneshot;

    async fn cart(_inv: Invocation, _ctx: Context) -> Result<Reply, HandlerError> {
        Ok(Reply::json(serde_json::json!({ "items": [] })))
    }

    async fn fails(_inv: Invocation, _ctx: Context) -> Result<Reply, HandlerError> {
        Err(HandlerError::with_status(409, "conflict"))
    }

    fn app() -> App {
        let mut app = App::new();
        app.get("/cart", cart).post("/checkout", fails);
        app
    }

    #[test]
    fn test_new_rejects_duplicates() {
        let mut app = app();
        app.get("/cart", cart);
        let err = Runner::new(&app, &KubeScriptConfig::default()).err().unwrap();
        assert!(matches!(err, RuntimeError::Registration(_)));
    }

    #[tokio::test]
    async fn test_serve_until_shutdown() {
        let runner = Runner::new(&app(), &KubeScriptConfig::default()).unwrap();
        let mut failures = runner.subscribe_failures();

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (stop, stopped) = oneshot::channel::<()>();
        let server = tokio::spawn(runner.serve(listener, async move {
            let _ = stopped.await;
        }));

        let client = reqwest::Client::new();
        let ready = client
            .get(format!("http://{}/readinessProbe", addr))
            .send()
            .await
            .unwrap();
        assert_eq!(ready.status().as_u16(), 200);
        assert_eq!(ready.text().await.unwrap(), "ok");

        let envelope: Envelope = client
            .post(format!("http://{}/GET-cart", addr))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(envelope.status_code, 200);
        assert_eq!(envelope.body, serde_json::json!({ "items": [] }));

        let rejected = client
            .post(format!("http://{}/POST-checkout", addr))
            .send()
            .await
            .unwrap();
        assert_eq!(rejected.status().as_u16(), 409);

        let failure = failures.recv().await.unwrap();
        assert_eq!(failure.identifier, "POST-checkout");
        assert_eq!(failure.message, "conflict");

        stop.send(()).unwrap();
        server.await.unwrap().unwrap();
    }
}
