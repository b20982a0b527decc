pub mod admin;
pub mod health;

use axum::{
    middleware::{from_fn, from_fn_with_state},
    Router,
};

use crate::middleware::{
    auth::admin_auth, metrics::metrics, rate_limit::rate_limit, request_id::request_id,
};
use crate::state::AppState;

pub fn v1_router(state: AppState) -> Router {
    admin::router(state.clone())
        .route_layer(from_fn_with_state(state.clone(), admin_auth))
        .route_layer(from_fn_with_state(state, rate_limit))
}

pub fn health_router(state: AppState) -> Router {
    health::router(state)
}

/// Full application: public health routes plus the rate-limited, token
/// protected admin surface.
pub fn app(state: AppState) -> Router {
    Router::new()
        .merge(health_router(state.clone()))
        .merge(v1_router(state))
        .layer(from_fn(metrics))
        .layer(from_fn(request_id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::testing::{test_state, TestState, ADMIN_TOKEN};
    use async_trait::async_trait;
    use axum::{
        body::{to_bytes, Body},
        http::{header, Method, Request, StatusCode},
        response::Response,
    };
    use chrono::{TimeZone, Utc};
    use common::channel_config::CONFIG_KEY;
    use common::clock::ManualClock;
    use common::metrics::METRICS;
    use common::types::{ChannelType, FailureEntry};
    use std::sync::Arc;
    use std::time::Duration;
    use store::{KvStore, StoreError};
    use tower::ServiceExt;

    fn request(method: Method, uri: &str, token: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder()
            .method(method)
            .uri(uri)
            .header("x-forwarded-for", "10.1.2.3");
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        builder.body(Body::empty()).unwrap()
    }

    async fn send(state: &AppState, req: Request<Body>) -> Response {
        app(state.clone()).oneshot(req).await.unwrap()
    }

    async fn json(response: Response) -> serde_json::Value {
        let body = to_bytes(response.into_body(), 64 * 1024).await.unwrap();
        serde_json::from_slice(&body).unwrap()
    }

    async fn seed_failures(ts: &TestState, count: usize) {
        for i in 0..count {
            let entry = FailureEntry::new(
                Utc.timestamp_opt(1_700_000_000 + i as i64, 0).unwrap(),
                ChannelType::Email,
                "ops@test.com",
                &format!("sub-{i}"),
                "HTTP 500",
            );
            ts.state.failure_log.record(entry).await.unwrap();
        }
    }

    #[tokio::test]
    async fn test_health_degraded_without_config() {
        let ts = test_state(&[]);
        let response = send(&ts.state, request(Method::GET, "/health", None)).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().contains_key("x-request-id"));

        let body = json(response).await;
        assert_eq!(body["status"], "degraded");
        assert_eq!(body["checks"]["kv"], "ok");
        assert_eq!(body["checks"]["config"], "missing");
        assert_eq!(body["uptime"], 0);
    }

    #[tokio::test]
    async fn test_health_healthy_with_config() {
        let ts = test_state(&[]);
        ts.kv
            .put(CONFIG_KEY, r#"{"enabledNotifiers":[]}"#, None)
            .await
            .unwrap();
        let body = json(send(&ts.state, request(Method::GET, "/health", None)).await).await;
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["checks"]["config"], "ok");
    }

    struct DownKv;

    #[async_trait]
    impl KvStore for DownKv {
        async fn get(&self, _key: &str) -> Result<Option<String>, StoreError> {
            Err(StoreError::Unavailable("connection refused".to_string()))
        }
        async fn put(&self, _key: &str, _value: &str, _ttl: Option<Duration>) -> Result<(), StoreError> {
            Err(StoreError::Unavailable("connection refused".to_string()))
        }
        async fn delete(&self, _key: &str) -> Result<(), StoreError> {
            Err(StoreError::Unavailable("connection refused".to_string()))
        }
    }

    fn down_state() -> AppState {
        let store: Arc<dyn KvStore> = Arc::new(DownKv);
        let clock = Arc::new(ManualClock::new(1_700_000_000_000));
        let settings = common::config::Settings::from_lookup(|name| match name {
            "SUBWATCH_REDIS_URL" => Some("redis://unused".to_string()),
            "SUBWATCH_ADMIN_TOKEN" => Some(ADMIN_TOKEN.to_string()),
            _ => None,
        })
        .unwrap();
        AppState::new(store, clock, &settings)
    }

    #[tokio::test]
    async fn test_health_unhealthy_when_store_down() {
        let state = down_state();
        let response = send(&state, request(Method::GET, "/health", None)).await;
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        let body = json(response).await;
        assert_eq!(body["status"], "unhealthy");
        assert_eq!(body["checks"]["kv"], "error");
    }

    #[tokio::test]
    async fn test_metrics_exposes_counters() {
        let ts = test_state(&[]);
        send(&ts.state, request(Method::GET, "/health", None)).await;
        let response = send(&ts.state, request(Method::GET, "/metrics", None)).await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = to_bytes(response.into_body(), 64 * 1024).await.unwrap();
        let text = String::from_utf8(body.to_vec()).unwrap();
        assert!(text.contains("# TYPE http_requests_total counter"));
        assert!(METRICS.gather().contains("path=\"/health\""));
    }

    #[tokio::test]
    async fn test_admin_requires_token() {
        let ts = test_state(&[]);
        let response = send(&ts.state, request(Method::GET, "/v1/admin/failures", None)).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let request_id = response.headers()["x-request-id"].to_str().unwrap().to_string();
        let body = json(response).await;
        assert_eq!(body["error"]["code"], "unauthorized");
        assert_eq!(body["error"]["request_id"], request_id);

        let response = send(
            &ts.state,
            request(Method::GET, "/v1/admin/failures", Some("wrong")),
        )
        .await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_admin_forbidden_without_configured_token() {
        let ts = test_state(&[("SUBWATCH_ADMIN_TOKEN", "")]);
        assert!(ts.state.admin_token_hash.is_none());
        let response = send(
            &ts.state,
            request(Method::GET, "/v1/admin/failures", Some(ADMIN_TOKEN)),
        )
        .await;
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_list_failures_most_recent_first() {
        let ts = test_state(&[]);
        seed_failures(&ts, 3).await;

        let response = send(
            &ts.state,
            request(Method::GET, "/v1/admin/failures?limit=2", Some(ADMIN_TOKEN)),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().contains_key("x-ratelimit-remaining"));
        let body = json(response).await;
        let items = body["items"].as_array().unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0]["subscriptionId"], "sub-2");
        assert_eq!(items[1]["subscriptionId"], "sub-1");
    }

    #[tokio::test]
    async fn test_list_failures_default_limit() {
        let ts = test_state(&[("SUBWATCH_FAILURE_LOG_DEFAULT_LIMIT", "2")]);
        seed_failures(&ts, 4).await;
        let body = json(
            send(
                &ts.state,
                request(Method::GET, "/v1/admin/failures", Some(ADMIN_TOKEN)),
            )
            .await,
        )
        .await;
        assert_eq!(body["items"].as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_clear_failures() {
        let ts = test_state(&[]);
        seed_failures(&ts, 2).await;
        let response = send(
            &ts.state,
            request(Method::DELETE, "/v1/admin/failures", Some(ADMIN_TOKEN)),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json(response).await["status"], "cleared");
        assert!(ts.state.failure_log.list(None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_failures_unavailable_when_store_down() {
        let state = down_state();
        let response = send(
            &state,
            request(Method::GET, "/v1/admin/failures", Some(ADMIN_TOKEN)),
        )
        .await;
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(json(response).await["error"]["code"], "storage_unavailable");
    }

    #[tokio::test]
    async fn test_reset_rate_limit() {
        let ts = test_state(&[("SUBWATCH_RATE_LIMIT_LOGIN", "1")]);
        assert!(ts.state.limiter.check("alice", "login").await.allowed);
        assert!(!ts.state.limiter.check("alice", "login").await.allowed);

        let response = send(
            &ts.state,
            request(Method::DELETE, "/v1/admin/rate-limits/login/alice", Some(ADMIN_TOKEN)),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = json(response).await;
        assert_eq!(body["limitType"], "login");
        assert_eq!(body["identity"], "alice");
        assert!(ts.state.limiter.check("alice", "login").await.allowed);
    }

    #[tokio::test]
    async fn test_reset_rejects_bad_limit_type() {
        let ts = test_state(&[]);
        let response = send(
            &ts.state,
            request(Method::DELETE, "/v1/admin/rate-limits/a:b/alice", Some(ADMIN_TOKEN)),
        )
        .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_admin_rate_limited_per_client() {
        let ts = test_state(&[("SUBWATCH_RATE_LIMIT_API", "2")]);
        for _ in 0..2 {
            let response = send(
                &ts.state,
                request(Method::GET, "/v1/admin/failures", Some(ADMIN_TOKEN)),
            )
            .await;
            assert_eq!(response.status(), StatusCode::OK);
        }

        let response = send(
            &ts.state,
            request(Method::GET, "/v1/admin/failures", Some(ADMIN_TOKEN)),
        )
        .await;
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        let retry_after: u64 = response.headers()[header::RETRY_AFTER]
            .to_str()
            .unwrap()
            .parse()
            .unwrap();
        assert!((1..=60).contains(&retry_after));

        let mut other = request(Method::GET, "/v1/admin/failures", Some(ADMIN_TOKEN));
        other
            .headers_mut()
            .insert("x-forwarded-for", "10.9.9.9".parse().unwrap());
        assert_eq!(send(&ts.state, other).await.status(), StatusCode::OK);

        ts.clock.advance(60_000);
        let response = send(
            &ts.state,
            request(Method::GET, "/v1/admin/failures", Some(ADMIN_TOKEN)),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_health_is_not_rate_limited() {
        let ts = test_state(&[("SUBWATCH_RATE_LIMIT_API", "1")]);
        for _ in 0..3 {
            let response = send(&ts.state, request(Method::GET, "/health", None)).await;
            assert_eq!(response.status(), StatusCode::OK);
        }
    }
}
