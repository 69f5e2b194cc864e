//! Response envelope
//!
//! The gateway expects every function to answer `200` with a JSON document
//! describing the real response: `{ body, headers, statusCode }`. The
//! envelope's `headers` carry the handler's headers plus the content type
//! implied by the body.

use kubescript_core::Reply;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

pub const JSON_CONTENT_TYPE: &str = "application/json; charset=utf-8";
pub const TEXT_CONTENT_TYPE: &str = "text/plain; charset=utf-8";

/// Content type implied by a reply body; `None` for an empty body
pub fn content_type_for(body: &Value) -> Option<&'static str> {
    match body {
        Value::Null => None,
        Value::String(_) => Some(TEXT_CONTENT_TYPE),
        _ => Some(JSON_CONTENT_TYPE),
    }
}

/// Wrapped handler result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Envelope {
    pub body: Value,
    pub headers: BTreeMap<String, String>,
    pub status_code: u16,
}

impl From<Reply> for Envelope {
    fn from(reply: Reply) -> Self {
        let mut headers = BTreeMap::new();
        if let Some(content_type) = content_type_for(&reply.body) {
            headers.insert("content-type".to_string(), content_type.to_string());
        }
        headers.extend(
            reply
                .headers
                .into_iter()
                .map(|(name, value)| (name.to_ascii_lowercase(), value)),
        );

        Self {
            body: reply.body,
            headers,
            status_code: reply.status,
        }
    }
}

/// A failed invocation, as logged and broadcast to failure observers
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvocationFailure {
    /// Request path without the leading slash
    pub identifier: String,
    pub status: u16,
    pub message: String,
}
