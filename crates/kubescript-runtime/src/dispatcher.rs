//! Invocation dispatcher
//!
//! Serves `GET /readinessProbe` and `POST /<identifier>`. The identifier is
//! the raw request path without its leading slash, looked up verbatim in the
//! [`RouteTable`].
//!
//! Layers, outermost first: failure recovery, CORS, request tracing, body
//! limit. Body parsing and envelope wrapping happen in the dispatch handler.

use crate::envelope::{Envelope, InvocationFailure};
use crate::routes::RouteTable;
use axum::{
    body::Bytes,
    extract::{DefaultBodyLimit, Request, State},
    http::{header, HeaderMap, Method, StatusCode, Uri},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use futures::FutureExt;
use kubescript_core::{Context, Emitter, Handler, Invocation, ServerConfig};
use serde_json::Value;
use std::collections::BTreeMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio::sync::broadcast;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{debug, error};

/// Shared dispatcher state
#[derive(Clone)]
pub struct DispatchState {
    routes: Arc<RouteTable>,
    context: Context,
    failures: broadcast::Sender<InvocationFailure>,
}

impl DispatchState {
    pub fn new(
        routes: Arc<RouteTable>,
        emitter: Arc<dyn Emitter>,
        failures: broadcast::Sender<InvocationFailure>,
    ) -> Self {
        Self {
            routes,
            context: Context::new(emitter),
            failures,
        }
    }

    pub fn routes(&self) -> &RouteTable {
        &self.routes
    }
}

/// Create the dispatcher router
pub fn create_router(state: DispatchState, config: &ServerConfig) -> Router {
    let mut router = Router::new()
        .route("/readinessProbe", get(readiness))
        .fallback(dispatch)
        .layer(DefaultBodyLimit::max(config.max_body_size))
        .layer(TraceLayer::new_for_http());

    if config.enable_cors {
        router = router.layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        );
    }

    router
        .layer(middleware::from_fn_with_state(state.clone(), recover))
        .with_state(state)
}

/// Readiness probe
async fn readiness() -> &'static str {
    "ok"
}

fn identifier_of(path: &str) -> &str {
    path.strip_prefix('/').unwrap_or(path)
}

/// Plain-text failure response tagged for the recovery layer
fn failure_response(failure: InvocationFailure) -> Response {
    let status = StatusCode::from_u16(failure.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    let mut response = (
        status,
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        failure.message.clone(),
    )
        .into_response();
    response.extensions_mut().insert(failure);
    response
}

/// Outermost layer: turns panics into 500s and reports every failed
/// invocation
async fn recover(State(state): State<DispatchState>, request: Request, next: Next) -> Response {
    let identifier = identifier_of(request.uri().path()).to_string();

    let response = match AssertUnwindSafe(next.run(request)).catch_unwind().await {
        Ok(response) => response,
        Err(_) => failure_response(InvocationFailure {
            identifier,
            status: 500,
            message: "handler panicked".to_string(),
        }),
    };

    if let Some(failure) = response.extensions().get::<InvocationFailure>() {
        error!(
            identifier = %failure.identifier,
            status = failure.status,
            "Invocation failed: {}",
            failure.message
        );
        // No receivers is fine
        let _ = state.failures.send(failure.clone());
    }

    response
}

fn parse_body(raw: &[u8]) -> Result<Value, serde_json::Error> {
    if raw.iter().all(u8::is_ascii_whitespace) {
        return Ok(Value::Null);
    }
    serde_json::from_slice(raw)
}

fn header_map(headers: &HeaderMap) -> BTreeMap<String, String> {
    let mut out: BTreeMap<String, String> = BTreeMap::new();
    for (name, value) in headers {
        let Ok(value) = value.to_str() else {
            continue;
        };
        out.entry(name.as_str().to_ascii_lowercase())
            .and_modify(|existing| {
                existing.push_str(", ");
                existing.push_str(value);
            })
            .or_insert_with(|| value.to_string());
    }
    out
}

/// `POST /<identifier>`: parse, call the handler and wrap its reply
async fn dispatch(
    State(state): State<DispatchState>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let raw = identifier_of(uri.path());
    let Some((identifier, handler)) = state.routes.lookup(raw) else {
        debug!(identifier = raw, "No handler registered");
        return (StatusCode::NOT_FOUND, "Not Found").into_response();
    };

    if method != Method::POST {
        return (
            StatusCode::METHOD_NOT_ALLOWED,
            [(header::ALLOW, "POST")],
            "Method Not Allowed",
        )
            .into_response();
    }

    let body = match parse_body(&body) {
        Ok(body) => body,
        Err(e) => {
            return failure_response(InvocationFailure {
                identifier: identifier.to_string(),
                status: 400,
                message: format!("Invalid JSON body: {}", e),
            })
        }
    };

    let invocation = Invocation {
        identifier: identifier.clone(),
        headers: header_map(&headers),
        body,
    };

    match handler.call(invocation, state.context.clone()).await {
        Ok(reply) => Json(Envelope::from(reply)).into_response(),
        Err(err) => failure_response(InvocationFailure {
            identifier: identifier.to_string(),
            status: err.status_code(),
            message: err.message,
        }),
    }
}
