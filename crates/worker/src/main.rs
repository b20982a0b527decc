use anyhow::{Context, Result};
use clap::Parser;
use common::clock::{Clock, SystemClock};
use common::config::Settings;
use common::metrics::METRICS;
use common::types::{ChannelType, Subscription};
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use store::{FailureLog, KvStore, RateLimiter, RedisKv};
use tokio::sync::watch;
use tracing::{info, warn};

mod config_source;
mod jobs;
mod transport;

use config_source::ConfigSource;
use jobs::delivery::Executor;

#[derive(Debug, Parser)]
#[command(name = "subwatch-worker")]
#[command(about = "Delivers expiry reminders for due subscriptions", version)]
struct Args {
    /// JSON array of due subscriptions, `-` for stdin.
    #[arg(long, default_value = "-")]
    input: PathBuf,
    /// Restrict the run to one channel type.
    #[arg(long)]
    channel: Option<ChannelType>,
}

#[derive(Clone)]
pub struct WorkerState {
    pub store: Arc<dyn KvStore>,
    pub client: reqwest::Client,
    pub clock: Arc<dyn Clock>,
    pub settings: Settings,
}

fn read_subscriptions(input: &Path) -> Result<Vec<Subscription>> {
    let raw = if input.as_os_str() == "-" {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .context("reading subscriptions from stdin")?;
        buf
    } else {
        std::fs::read_to_string(input)
            .with_context(|| format!("reading subscriptions from {}", input.display()))?
    };
    serde_json::from_str(&raw).context("parsing subscriptions")
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .json()
        .init();

    let args = Args::parse();
    let settings = Settings::from_env()?;
    let subscriptions = read_subscriptions(&args.input)?;

    let client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(settings.http_timeout_secs))
        .build()?;

    let state = WorkerState {
        store: Arc::new(RedisKv::open(&settings.redis_url)?),
        client,
        clock: Arc::new(SystemClock),
        settings,
    };

    let limiter = Arc::new(RateLimiter::new(
        state.store.clone(),
        state.clock.clone(),
        state.settings.rate_limits.clone(),
        state.settings.rate_limit_policy,
    ));
    let failure_log = Arc::new(FailureLog::new(
        state.store.clone(),
        state.settings.failure_log_max,
        state.settings.failure_log_default_limit,
    ));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("shutdown requested, finishing in-flight delivery");
            let _ = shutdown_tx.send(true);
        }
    });

    let executor = Executor::new(
        limiter,
        failure_log,
        Arc::new(&*METRICS),
        state.clock.clone(),
    )
    .with_shutdown(shutdown_rx);
    let config_source = ConfigSource::new(
        state.store.clone(),
        state.clock.clone(),
        state.settings.config_ttl_ms,
    );

    info!(
        env = %state.settings.subwatch_env,
        subscriptions = subscriptions.len(),
        "worker starting"
    );

    let reports = jobs::run::run_notifications(
        &config_source,
        &executor,
        &subscriptions,
        args.channel,
        |channel, config| {
            transport::for_channel(channel, config, &state.client, state.clock.clone())
        },
    )
    .await?;

    println!("{}", serde_json::to_string_pretty(&reports)?);
    Ok(())
}
