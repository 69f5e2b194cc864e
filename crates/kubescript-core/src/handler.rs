//! Handler contract shared by both phases
//!
//! Handlers are declared once and only ever invoked by the run-phase
//! dispatcher. The build phase holds the same references but never calls them.

use crate::addressing::Identifier;
use crate::emit::{EmitError, Emitter};
use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use thiserror::Error;

/// A single inbound invocation routed to a handler
#[derive(Debug, Clone)]
pub struct Invocation {
    /// Identifier the invocation was addressed to
    pub identifier: Identifier,
    /// Request headers, names lower-cased
    pub headers: BTreeMap<String, String>,
    /// Parsed JSON body (`Null` when the request had no body)
    pub body: Value,
}

impl Invocation {
    /// Create an invocation with no headers
    pub fn new(identifier: Identifier, body: Value) -> Self {
        Self {
            identifier,
            headers: BTreeMap::new(),
            body,
        }
    }

    /// Look up a header by case-insensitive name
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }
}

/// What a handler produced: body, headers and status
#[derive(Debug, Clone, PartialEq)]
pub struct Reply {
    pub status: u16,
    pub headers: BTreeMap<String, String>,
    pub body: Value,
}

impl Reply {
    /// 200 reply carrying a JSON value
    pub fn json(body: Value) -> Self {
        Self {
            status: 200,
            headers: BTreeMap::new(),
            body,
        }
    }

    /// 200 reply carrying plain text
    pub fn text(body: impl Into<String>) -> Self {
        Self::json(Value::String(body.into()))
    }

    /// Reply with no body
    pub fn empty() -> Self {
        Self::json(Value::Null)
    }

    /// Set the status code
    pub fn with_status(mut self, status: u16) -> Self {
        self.status = status;
        self
    }

    /// Add a header; the name is stored lower-cased
    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.insert(name.to_ascii_lowercase(), value.into());
        self
    }
}

impl Default for Reply {
    fn default() -> Self {
        Self::empty()
    }
}

/// Failure raised by a handler
///
/// Recovered per request by the dispatcher: the status (default 500) becomes
/// the response status and the message becomes the response body.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{message}")]
pub struct HandlerError {
    pub status: Option<u16>,
    pub message: String,
}

impl HandlerError {
    /// Error without an explicit status
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            status: None,
            message: message.into(),
        }
    }

    /// Error carrying an explicit status
    pub fn with_status(status: u16, message: impl Into<String>) -> Self {
        Self {
            status: Some(status),
            message: message.into(),
        }
    }

    /// Status to respond with
    pub fn status_code(&self) -> u16 {
        self.status.unwrap_or(500)
    }
}

impl From<EmitError> for HandlerError {
    fn from(err: EmitError) -> Self {
        Self::new(err.to_string())
    }
}

impl From<serde_json::Error> for HandlerError {
    fn from(err: serde_json::Error) -> Self {
        Self::with_status(400, err.to_string())
    }
}

/// Per-invocation context handed to handlers
#[derive(Clone)]
pub struct Context {
    emitter: Arc<dyn Emitter>,
}

impl Context {
    /// Create a context around the phase's emitter
    pub fn new(emitter: Arc<dyn Emitter>) -> Self {
        Self { emitter }
    }

    /// Emit an event through the gateway
    pub async fn emit<T: Serialize + ?Sized>(
        &self,
        event: &str,
        payload: &T,
    ) -> Result<(), EmitError> {
        let payload =
            serde_json::to_value(payload).map_err(|e| EmitError::Payload(e.to_string()))?;
        self.emitter.emit(event, payload).await
    }

    /// Underlying emitter
    pub fn emitter(&self) -> &Arc<dyn Emitter> {
        &self.emitter
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("emitter", &self.emitter.name())
            .finish()
    }
}

/// Trait implemented by every route and event handler
#[async_trait]
pub trait Handler: Send + Sync + 'static {
    /// Handle one invocation
    async fn call(&self, invocation: Invocation, ctx: Context) -> Result<Reply, HandlerError>;
}

#[async_trait]
impl<F, Fut> Handler for F
where
    F: Fn(Invocation, Context) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Reply, HandlerError>> + Send + 'static,
{
    async fn call(&self, invocation: Invocation, ctx: Context) -> Result<Reply, HandlerError> {
        (self)(invocation, ctx).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct NullEmitter;

    #[async_trait]
    impl Emitter for NullEmitter {
        async fn emit(&self, _event: &str, _payload: Value) -> Result<(), EmitError> {
            Ok(())
        }

        fn name(&self) -> &str {
            "null"
        }
    }

    #[test]
    fn test_reply_builder_lowercases_headers() {
        let reply = Reply::json(json!({"a": 1}))
            .with_status(201)
            .with_header("X-Trace", "abc");

        assert_eq!(reply.status, 201);
        assert_eq!(reply.headers.get("x-trace").map(String::as_str), Some("abc"));
        assert!(reply.headers.get("X-Trace").is_none());
    }

    #[test]
    fn test_handler_error_default_status() {
        assert_eq!(HandlerError::new("boom").status_code(), 500);
        assert_eq!(HandlerError::with_status(404, "missing").status_code(), 404);
        assert_eq!(HandlerError::new("boom").to_string(), "boom");
    }

    #[test]
    fn test_invocation_header_lookup_is_case_insensitive() {
        let mut inv = Invocation::new(Identifier::event("tick"), Value::Null);
        inv.headers.insert("event".to_string(), "tick".to_string());
        assert_eq!(inv.header("Event"), Some("tick"));
        assert_eq!(inv.header("missing"), None);
    }

    #[tokio::test]
    async fn test_closure_handler() {
        let handler = |inv: Invocation, _ctx: Context| async move {
            Ok::<_, HandlerError>(Reply::json(json!({ "echo": inv.body })))
        };

        let ctx = Context::new(Arc::new(NullEmitter));
        let reply = Handler::call(&handler, Invocation::new(Identifier::event("e"), json!(7)), ctx)
            .await
            .unwrap();
        assert_eq!(reply.body, json!({ "echo": 7 }));
    }
}
