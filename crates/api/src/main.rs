use common::clock::{Clock, SystemClock};
use common::config::Settings;
use std::net::SocketAddr;
use std::sync::Arc;
use store::{KvStore, RedisKv};
use tokio::net::TcpListener;
use tracing::{info, warn};

mod error;
mod middleware;
mod routes;
mod state;

use crate::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .json()
        .init();

    let settings = Settings::from_env()?;
    let store: Arc<dyn KvStore> = Arc::new(RedisKv::open(&settings.redis_url)?);
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let state = AppState::new(store, clock, &settings);
    if state.admin_token_hash.is_none() {
        warn!("SUBWATCH_ADMIN_TOKEN is not set, admin routes will answer 403");
    }

    let app = routes::app(state);
    let addr: SocketAddr = settings.api_bind.parse()?;

    info!(%addr, env = %settings.subwatch_env, "starting api");

    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("shutting down api");
        })
        .await?;

    Ok(())
}
