use std::time::Instant;

use axum::{
    extract::Request,
    http::{HeaderName, HeaderValue},
    middleware::Next,
    response::Response,
};
use tracing::{error, field::Empty, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::context::CallContext;

pub const REQUEST_ID_HEADER: HeaderName = HeaderName::from_static("x-request-id");

const MAX_REQUEST_ID_LEN: usize = 128;

fn request_id(req: &Request) -> String {
    req.headers()
        .get(&REQUEST_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|id| !id.is_empty() && id.len() <= MAX_REQUEST_ID_LEN)
        .map(str::to_owned)
        .unwrap_or_else(|| Uuid::new_v4().to_string())
}

/// Wraps each call in an `rpc` span and logs its start and outcome.
/// Header values are never logged.
pub async fn log_calls(mut req: Request, next: Next) -> Response {
    let request_id = request_id(&req);
    let procedure = req.uri().path().to_owned();
    req.extensions_mut()
        .insert(CallContext::new(request_id.clone(), procedure.clone()));

    let span = info_span!(
        "rpc",
        procedure = %procedure,
        request_id = %request_id,
        status = Empty,
        duration_ms = Empty
    );

    async move {
        let started = Instant::now();
        info!("request started");

        let mut res = next.run(req).await;

        let status = res.status();
        let duration_ms = started.elapsed().as_millis() as u64;
        let span = tracing::Span::current();
        span.record("status", status.as_u16());
        span.record("duration_ms", duration_ms);

        if status.is_server_error() {
            error!(status = status.as_u16(), duration_ms, "request failed");
        } else if status.is_client_error() {
            warn!(status = status.as_u16(), duration_ms, "request failed");
        } else {
            info!(status = status.as_u16(), duration_ms, "request completed");
        }

        if let Ok(value) = HeaderValue::from_str(&request_id) {
            res.headers_mut().insert(REQUEST_ID_HEADER, value);
        }
        res
    }
    .instrument(span)
    .await
}
