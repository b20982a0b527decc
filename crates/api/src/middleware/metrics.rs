use axum::{body::Body, extract::MatchedPath, http::Request, middleware::Next, response::Response};
use common::metrics::METRICS;

/// Counts every response by method, route template and status.
pub async fn metrics(req: Request<Body>, next: Next) -> Response {
    let method = req.method().to_string();
    let path = req
        .extensions()
        .get::<MatchedPath>()
        .map(|matched| matched.as_str().to_string())
        .unwrap_or_else(|| req.uri().path().to_string());
    let resp = next.run(req).await;
    let status = resp.status().as_u16();
    METRICS.record_http_request(&method, &path, status);
    resp
}
