//! Build-phase emitter

use async_trait::async_trait;
use kubescript_core::{EmitError, Emitter};
use serde_json::Value;
use tracing::warn;

/// Emitter active while the build phase evaluates the application.
///
/// Emitting during a build is a programming error: there is no gateway to
/// deliver to yet. Every call fails with [`EmitError::BuildPhase`].
#[derive(Debug, Clone, Copy, Default)]
pub struct BuildPhaseEmitter;

#[async_trait]
impl Emitter for BuildPhaseEmitter {
    async fn emit(&self, event: &str, _payload: Value) -> Result<(), EmitError> {
        warn!(event, "emit called during build phase");
        Err(EmitError::BuildPhase {
            event: event.to_string(),
        })
    }

    fn name(&self) -> &str {
        "build-phase"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kubescript_core::Context;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_emit_always_fails() {
        let err = BuildPhaseEmitter
            .emit("order.created", serde_json::json!({ "id": 1 }))
            .await
            .unwrap_err();
        assert!(matches!(err, EmitError::BuildPhase { ref event } if event == "order.created"));
    }

    #[tokio::test]
    async fn test_emit_through_context() {
        let ctx = Context::new(Arc::new(BuildPhaseEmitter));
        let err = ctx.emit("tick", &()).await.unwrap_err();
        assert!(matches!(err, EmitError::BuildPhase { .. }));
    }
}
