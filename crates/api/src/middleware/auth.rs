use axum::{
    body::Body,
    extract::State,
    http::{header, HeaderValue, Request},
    middleware::Next,
    response::Response,
};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;
use tracing::warn;

use crate::{
    error::{ApiError, AppError},
    middleware::request_id::request_id_of,
    state::AppState,
};

pub async fn admin_auth(
    State(state): State<AppState>,
    req: Request<Body>,
    next: Next,
) -> Result<Response, ApiError> {
    let request_id = request_id_of(&req);
    let Some(expected) = state.admin_token_hash.as_deref() else {
        return Err(AppError::Forbidden("admin access is not configured".to_string())
            .with_request_id(&request_id));
    };

    let token = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(parse_bearer)
        .ok_or_else(|| AppError::Unauthorized.with_request_id(&request_id))?;

    if !bool::from(hash_token(token).as_slice().ct_eq(expected)) {
        warn!(request_id = %request_id, "rejected admin token");
        return Err(AppError::Unauthorized.with_request_id(&request_id));
    }

    Ok(next.run(req).await)
}

fn parse_bearer(value: &HeaderValue) -> Option<&str> {
    let value = value.to_str().ok()?;
    let mut parts = value.splitn(2, ' ');
    let scheme = parts.next().unwrap_or_default();
    let token = parts.next().unwrap_or_default();
    if scheme != "Bearer" || token.is_empty() {
        return None;
    }
    Some(token)
}

pub fn hash_token(raw: &str) -> Vec<u8> {
    Sha256::digest(raw.as_bytes()).to_vec()
}
