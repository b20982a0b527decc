use axum::{
    http::{header, HeaderValue, StatusCode},
    response::IntoResponse,
    Json,
};
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: ErrorBody,
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
    pub request_id: String,
}

#[derive(Debug)]
pub enum AppError {
    BadRequest(String),
    Unauthorized,
    Forbidden(String),
    /// Whole seconds until the caller's window reopens.
    RateLimited { retry_after: u64 },
    Unavailable,
}

#[derive(Debug)]
pub struct ApiError {
    pub error: AppError,
    pub request_id: String,
}

impl AppError {
    pub fn with_request_id(self, request_id: &str) -> ApiError {
        ApiError {
            error: self,
            request_id: request_id.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let mut retry_after = None;
        let (status, code, message) = match self.error {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "invalid_request", msg),
            AppError::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                "unauthorized",
                "Invalid admin token".to_string(),
            ),
            AppError::Forbidden(msg) => (StatusCode::FORBIDDEN, "forbidden", msg),
            AppError::RateLimited { retry_after: secs } => {
                retry_after = Some(secs);
                (
                    StatusCode::TOO_MANY_REQUESTS,
                    "rate_limited",
                    "Too many requests".to_string(),
                )
            }
            AppError::Unavailable => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "storage_unavailable",
                "Storage is unavailable".to_string(),
            ),
        };

        let mut response = (
            status,
            Json(ErrorResponse {
                error: ErrorBody {
                    code: code.to_string(),
                    message,
                    request_id: self.request_id,
                },
            }),
        )
            .into_response();
        if let Some(secs) = retry_after {
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from(secs));
        }
        response
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;
    use axum::response::IntoResponse;

    fn rt() -> tokio::runtime::Runtime {
        tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap()
    }

    async fn body_json(response: axum::response::Response) -> serde_json::Value {
        let body = to_bytes(response.into_body(), 1024).await.unwrap();
        serde_json::from_slice(&body).unwrap()
    }

    #[test]
    fn test_with_request_id() {
        let err = AppError::Unavailable.with_request_id("req_123");
        assert_eq!(err.request_id, "req_123");
    }

    #[test]
    fn test_bad_request_response() {
        rt().block_on(async {
            let response = AppError::BadRequest("identity must not be empty".to_string())
                .with_request_id("req_001")
                .into_response();
            assert_eq!(response.status(), StatusCode::BAD_REQUEST);

            let json = body_json(response).await;
            assert_eq!(json["error"]["code"], "invalid_request");
            assert_eq!(json["error"]["message"], "identity must not be empty");
            assert_eq!(json["error"]["request_id"], "req_001");
        });
    }

    #[test]
    fn test_unauthorized_response() {
        rt().block_on(async {
            let response = AppError::Unauthorized.with_request_id("req_002").into_response();
            assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
            let json = body_json(response).await;
            assert_eq!(json["error"]["code"], "unauthorized");
        });
    }

    #[test]
    fn test_rate_limited_sets_retry_after() {
        rt().block_on(async {
            let response = AppError::RateLimited { retry_after: 42 }
                .with_request_id("req_005")
                .into_response();
            assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
            assert_eq!(response.headers()[header::RETRY_AFTER], "42");

            let json = body_json(response).await;
            assert_eq!(json["error"]["code"], "rate_limited");
            assert_eq!(json["error"]["message"], "Too many requests");
        });
    }

    #[test]
    fn test_unavailable_response() {
        rt().block_on(async {
            let response = AppError::Unavailable.with_request_id("req_006").into_response();
            assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
            assert!(response.headers().get(header::RETRY_AFTER).is_none());
            let json = body_json(response).await;
            assert_eq!(json["error"]["code"], "storage_unavailable");
        });
    }
}
