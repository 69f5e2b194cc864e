//! Run-phase emitter

use async_trait::async_trait;
use kubescript_core::{EmitError, Emitter, GatewayConfig};
use reqwest::Client;
use serde_json::Value;
use tracing::{debug, instrument};

/// Header carrying the event name
pub const EVENT_HEADER: &str = "Event";

/// Posts events to the gateway's event ingress
#[derive(Debug, Clone)]
pub struct GatewayEmitter {
    client: Client,
    url: String,
}

impl GatewayEmitter {
    /// Emitter posting to `url`
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            url: url.into(),
        }
    }

    /// Emitter for `http://<host>:<event_port>/`
    pub fn from_config(config: &GatewayConfig) -> Self {
        Self::new(format!("http://{}:{}/", config.host, config.event_port))
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl Emitter for GatewayEmitter {
    #[instrument(skip(self, payload), fields(url = %self.url))]
    async fn emit(&self, event: &str, payload: Value) -> Result<(), EmitError> {
        let response = self
            .client
            .post(&self.url)
            .header(EVENT_HEADER, event)
            .json(&payload)
            .send()
            .await
            .map_err(|e| EmitError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(EmitError::Gateway {
                status: status.as_u16(),
                body,
            });
        }

        debug!(event, "Event emitted");
        Ok(())
    }

    fn name(&self) -> &str {
        "gateway"
    }
}
