use axum::{extract::Request, middleware::Next, response::Response};
use std::time::Instant;
use tracing::info;

use super::request_id::RequestId;

pub async fn metrics_middleware(req: Request, next: Next) -> Response {
    let start = Instant::now();
    let method = req.method().clone();
    let uri = req.uri().clone();
    let request_id = req
        .extensions()
        .get::<RequestId>()
        .map(|id| id.0.clone())
        .unwrap_or_else(|| "unknown".to_string());

    let response = next.run(req).await;

    info!(
        target: "metrics",
        method = %method,
        uri = %uri,
        request_id = %request_id,
        status = %response.status().as_u16(),
        latency_ms = %start.elapsed().as_millis(),
        "request_completed"
    );

    response
}
