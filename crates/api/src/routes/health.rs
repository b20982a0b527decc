use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use chrono::{DateTime, Utc};
use common::channel_config::CONFIG_KEY;
use common::metrics::METRICS;
use serde::Serialize;
use std::time::Duration;
use store::{KvStore, StoreError};
use tracing::warn;

use crate::state::AppState;

const PROBE_PREFIX: &str = "health:probe";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
enum Check {
    Ok,
    Missing,
    Error,
}

#[derive(Serialize)]
struct HealthChecks {
    kv: Check,
    config: Check,
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    checks: HealthChecks,
    timestamp: DateTime<Utc>,
    /// Milliseconds since the process built its state.
    uptime: i64,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/metrics", get(metrics))
        .with_state(state)
}

async fn health(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let kv = probe(state.store.as_ref()).await;
    let config = match state.store.get(CONFIG_KEY).await {
        Ok(Some(_)) => Check::Ok,
        Ok(None) => Check::Missing,
        Err(err) => {
            warn!(error = %err, "config health check failed");
            Check::Error
        }
    };

    let (code, status) = match (kv == Check::Ok, config == Check::Ok) {
        (true, true) => (StatusCode::OK, "healthy"),
        (false, false) => (StatusCode::SERVICE_UNAVAILABLE, "unhealthy"),
        _ => (StatusCode::OK, "degraded"),
    };

    let now = state.clock.now_ms();
    (
        code,
        Json(HealthResponse {
            status,
            checks: HealthChecks { kv, config },
            timestamp: state.clock.now(),
            uptime: (now - state.started_at_ms).max(0),
        }),
    )
}

/// Write, read back and delete a throwaway key of its own.
async fn probe(store: &dyn KvStore) -> Check {
    let token = nanoid::nanoid!(8);
    let key = format!("{PROBE_PREFIX}:{token}");
    let round_trip = async {
        store.put(&key, &token, Some(Duration::from_secs(10))).await?;
        let read = store.get(&key).await?;
        store.delete(&key).await?;
        Ok::<_, StoreError>(read)
    };
    match round_trip.await {
        Ok(Some(read)) if read == token => Check::Ok,
        Ok(_) => {
            warn!("health probe read back a different value");
            Check::Error
        }
        Err(err) => {
            warn!(error = %err, "health probe failed");
            Check::Error
        }
    }
}

async fn metrics() -> String {
    METRICS.gather()
}
