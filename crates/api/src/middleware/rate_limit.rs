use axum::{
    body::Body,
    extract::State,
    http::{HeaderMap, HeaderValue, Request},
    middleware::Next,
    response::Response,
};
use store::RateLimitError;

use crate::{
    error::{ApiError, AppError},
    middleware::request_id::request_id_of,
    state::AppState,
};

pub const API_LIMIT_TYPE: &str = "api";

/// Applies the `api` limit per client address.
pub async fn rate_limit(
    State(state): State<AppState>,
    req: Request<Body>,
    next: Next,
) -> Result<Response, ApiError> {
    let request_id = request_id_of(&req);
    let identity = client_ip(req.headers());

    match state.limiter.check_or_throw(&identity, API_LIMIT_TYPE).await {
        Ok(decision) => {
            let mut resp = next.run(req).await;
            let headers = resp.headers_mut();
            headers.insert("X-RateLimit-Remaining", HeaderValue::from(decision.remaining));
            headers.insert("X-RateLimit-Reset", HeaderValue::from(decision.reset_at));
            Ok(resp)
        }
        Err(RateLimitError::Exceeded { reset_at, .. }) => {
            let retry_after = retry_after_secs(reset_at, state.clock.now_ms());
            Err(AppError::RateLimited { retry_after }.with_request_id(&request_id))
        }
    }
}

fn client_ip(headers: &HeaderMap) -> String {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .or_else(|| headers.get("x-real-ip").and_then(|v| v.to_str().ok()))
        .map(str::trim)
        .filter(|ip| !ip.is_empty())
        .unwrap_or("unknown")
        .to_string()
}

fn retry_after_secs(reset_at: i64, now_ms: i64) -> u64 {
    let wait_ms = (reset_at - now_ms).max(0) as u64;
    wait_ms.div_ceil(1000).max(1)
}
