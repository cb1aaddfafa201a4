//! HTTP transport.
//!
//! Routes:
//!
//! | Method | Path          | Purpose                                   |
//! |--------|---------------|-------------------------------------------|
//! | GET    | `/health`     | static `{"status":"ok"}`                  |
//! | GET    | `/`, `/mcp`   | discovery document (JSON or one SSE frame)|
//! | POST   | `/mcp`        | JSON-RPC, `tool_call` or `resource_access`|
//! | POST   | `/mcp/:tool`  | direct tool call (legacy)                 |
//!
//! Any body that parses as JSON is answered with `200`, whatever the
//! outcome; failures are reported inside the envelope. A non-JSON content
//! type or unparseable body gets `400` with a parse-error envelope.
//! Notifications are acknowledged with `202` and no body.

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{Path, Query, Request, State};
use axum::http::header::{ACCEPT, CONTENT_TYPE};
use axum::http::{HeaderMap, HeaderName, HeaderValue, Method, StatusCode};
use axum::middleware::{self, Next};
use axum::response::sse::{Event, Sse};
use axum::response::{IntoResponse, Response as HttpResponse};
use axum::routing::{get, post};
use axum::{Extension, Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;

use super::TransportError;
use crate::mcp::{parse_error_response, Dispatcher, RequestContext, Response, Transport};

/// Header carrying the correlation ID in both directions.
pub const CORRELATION_HEADER: &str = "x-correlation-id";

#[derive(Clone)]
struct AppState {
    dispatcher: Arc<Dispatcher>,
    shutdown: CancellationToken,
}

/// Correlation ID attached to each request by the middleware.
#[derive(Debug, Clone)]
pub struct CorrelationId(pub String);

#[derive(Debug, Default, Deserialize)]
struct DiscoveryQuery {
    sse: Option<String>,
}

/// Build the router.
pub fn router(dispatcher: Arc<Dispatcher>, shutdown: CancellationToken) -> Router {
    let state = AppState { dispatcher, shutdown };

    Router::new()
        .route("/health", get(health))
        .route("/", get(discovery))
        .route("/mcp", get(discovery).post(handle_post))
        .route("/mcp/:tool", post(handle_tool))
        .with_state(state)
        .layer(middleware::from_fn(correlation))
        .layer(middleware::from_fn(cors))
}

/// Bind and serve until `shutdown` is canceled.
pub async fn serve_http(
    dispatcher: Arc<Dispatcher>,
    host: &str,
    port: u16,
    shutdown: CancellationToken,
) -> Result<(), TransportError> {
    let addr: SocketAddr = format!("{host}:{port}")
        .parse()
        .map_err(|_| TransportError::InvalidAddress(format!("{host}:{port}")))?;
    let listener =
        tokio::net::TcpListener::bind(addr).await.map_err(|source| TransportError::Bind { addr, source })?;

    tracing::info!(%addr, tools = dispatcher.registry().tool_count(), "HTTP transport listening");

    let app = router(dispatcher, shutdown.clone());
    axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await?;

    tracing::info!("HTTP transport stopped");
    Ok(())
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

async fn discovery(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<DiscoveryQuery>,
) -> HttpResponse {
    let doc = state.dispatcher.discover();

    if wants_sse(&headers, &query) {
        let payload = match serde_json::to_string(&doc) {
            Ok(payload) => payload,
            Err(e) => return (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response(),
        };
        let stream = futures::stream::once(async move { Ok::<_, Infallible>(Event::default().data(payload)) });
        return Sse::new(stream).into_response();
    }

    Json(doc).into_response()
}

async fn handle_post(
    State(state): State<AppState>,
    Extension(CorrelationId(correlation_id)): Extension<CorrelationId>,
    headers: HeaderMap,
    body: Bytes,
) -> HttpResponse {
    let ctx = context(&state, correlation_id);
    let value = match parse_body(&headers, &body, &ctx) {
        Ok(value) => value,
        Err(rejection) => return rejection,
    };

    match state.dispatcher.handle_value(value, &ctx).await {
        Some(response) => (StatusCode::OK, Json(response)).into_response(),
        None => StatusCode::ACCEPTED.into_response(),
    }
}

async fn handle_tool(
    State(state): State<AppState>,
    Extension(CorrelationId(correlation_id)): Extension<CorrelationId>,
    Path(tool): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> HttpResponse {
    let ctx = context(&state, correlation_id);
    let params = if body.iter().all(u8::is_ascii_whitespace) {
        None
    } else {
        match parse_body(&headers, &body, &ctx) {
            Ok(value) => Some(value),
            Err(rejection) => return rejection,
        }
    };

    let result = state.dispatcher.call_tool_envelope(&tool, params, &ctx).await;
    (StatusCode::OK, Json(Response::from(result))).into_response()
}

fn context(state: &AppState, correlation_id: String) -> RequestContext {
    RequestContext::new(Transport::Http).with_parent(&state.shutdown).with_correlation_id(correlation_id)
}

/// Parse a POST body, or produce the `400` response.
fn parse_body(headers: &HeaderMap, body: &[u8], ctx: &RequestContext) -> Result<Value, HttpResponse> {
    let reject = |message: String| {
        tracing::debug!(correlation_id = %ctx.correlation_id, %message, "rejecting body");
        let envelope = Response::from(parse_error_response(&message, ctx));
        Err((StatusCode::BAD_REQUEST, Json(envelope)).into_response())
    };

    if let Some(content_type) = headers.get(CONTENT_TYPE) {
        let content_type = content_type.to_str().unwrap_or_default().to_ascii_lowercase();
        if !content_type.contains("json") {
            return reject(format!("unsupported content type '{content_type}'"));
        }
    }

    match serde_json::from_slice(body) {
        Ok(value) => Ok(value),
        Err(e) => reject(e.to_string()),
    }
}

fn wants_sse(headers: &HeaderMap, query: &DiscoveryQuery) -> bool {
    let flagged = query.sse.as_deref().is_some_and(|v| matches!(v, "true" | "1"));
    let accepts = headers
        .get(ACCEPT)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.contains("text/event-stream"));
    flagged || accepts
}

/// Permissive CORS. Preflight requests are answered directly.
async fn cors(request: Request, next: Next) -> HttpResponse {
    let mut response = if request.method() == Method::OPTIONS {
        StatusCode::NO_CONTENT.into_response()
    } else {
        next.run(request).await
    };

    let headers = response.headers_mut();
    headers.insert("access-control-allow-origin", HeaderValue::from_static("*"));
    headers.insert("access-control-allow-methods", HeaderValue::from_static("GET, POST, OPTIONS"));
    headers.insert(
        "access-control-allow-headers",
        HeaderValue::from_static("Content-Type, Accept, Authorization, X-Correlation-ID"),
    );
    headers.insert("access-control-expose-headers", HeaderValue::from_static("X-Correlation-ID"));
    response
}

/// Take the correlation ID from the request header or generate one, expose
/// it to handlers and echo it on the response.
async fn correlation(mut request: Request, next: Next) -> HttpResponse {
    let id = request
        .headers()
        .get(CORRELATION_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map_or_else(|| uuid::Uuid::new_v4().to_string(), String::from);

    request.extensions_mut().insert(CorrelationId(id.clone()));
    let mut response = next.run(request).await;
    if let Ok(value) = HeaderValue::from_str(&id) {
        response.headers_mut().insert(HeaderName::from_static(CORRELATION_HEADER), value);
    }
    response
}
