//! Emit contract
//!
//! `emit` is part of the declared surface but means different things per
//! phase: the build phase refuses it, the run phase posts to the gateway.

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

/// Emit failures
#[derive(Debug, Error)]
pub enum EmitError {
    /// `emit` was called while building; events only exist once deployed
    #[error("emit is not available at build time (event {event:?})")]
    BuildPhase { event: String },

    /// Payload could not be serialized
    #[error("Invalid event payload: {0}")]
    Payload(String),

    /// Gateway could not be reached
    #[error("Gateway unreachable: {0}")]
    Transport(String),

    /// Gateway answered with a non-2xx status
    #[error("Gateway rejected event: {status} - {body}")]
    Gateway { status: u16, body: String },
}

/// Phase-specific implementation of `emit`
#[async_trait]
pub trait Emitter: Send + Sync {
    /// Emit `event` with a JSON payload
    async fn emit(&self, event: &str, payload: Value) -> Result<(), EmitError>;

    /// Emitter name for logging
    fn name(&self) -> &str;
}
