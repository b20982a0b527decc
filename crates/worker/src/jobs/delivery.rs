use common::clock::Clock;
use common::metrics::MetricsSink;
use common::routing::DistributionMap;
use common::types::{ChannelType, DeliveryReport, FailureEntry, Subscription};
use std::sync::Arc;
use std::time::Instant;
use store::{FailureLog, RateLimiter};
use tokio::sync::watch;
use tracing::{info, warn};

use crate::transport::Transport;

pub const RATE_LIMITED: &str = "rate limited";

/// Walks a distribution map target by target. A failing target never stops
/// the ones after it.
pub struct Executor {
    limiter: Arc<RateLimiter>,
    failure_log: Arc<FailureLog>,
    metrics: Arc<dyn MetricsSink>,
    clock: Arc<dyn Clock>,
    shutdown: Option<watch::Receiver<bool>>,
}

impl Executor {
    pub fn new(
        limiter: Arc<RateLimiter>,
        failure_log: Arc<FailureLog>,
        metrics: Arc<dyn MetricsSink>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            limiter,
            failure_log,
            metrics,
            clock,
            shutdown: None,
        }
    }

    /// Stop starting new targets once `shutdown` flips to true.
    pub fn with_shutdown(mut self, shutdown: watch::Receiver<bool>) -> Self {
        self.shutdown = Some(shutdown);
        self
    }

    fn shutting_down(&self) -> bool {
        self.shutdown.as_ref().is_some_and(|rx| *rx.borrow())
    }

    pub async fn deliver(
        &self,
        map: &DistributionMap,
        channel: ChannelType,
        transport: &dyn Transport,
    ) -> DeliveryReport {
        let mut report = DeliveryReport::for_channel(channel);

        for (target, subscriptions) in map {
            if self.shutting_down() {
                report.skipped += 1;
                continue;
            }
            report.attempted += 1;

            let decision = self.limiter.check(target, channel.as_str()).await;
            if !decision.allowed {
                warn!(%channel, target, reset_at = decision.reset_at, "target rate limited");
                report.rate_limited += 1;
                self.record_failures(channel, target, subscriptions, RATE_LIMITED, &mut report)
                    .await;
                continue;
            }

            let start = Instant::now();
            let result = transport.send(target, subscriptions).await;
            let latency_ms = start.elapsed().as_millis() as u64;

            match result {
                Ok(()) => {
                    info!(%channel, target, count = subscriptions.len(), latency_ms, "delivered");
                    report.succeeded += 1;
                    self.metrics.track_notification(channel, true);
                }
                Err(err) => {
                    warn!(%channel, target, error = %err, latency_ms, "delivery failed");
                    report.failed += 1;
                    self.metrics.track_notification(channel, false);
                    self.record_failures(channel, target, subscriptions, &err.to_string(), &mut report)
                        .await;
                }
            }
        }

        if report.skipped > 0 {
            warn!(%channel, skipped = report.skipped, "shutdown requested, targets skipped");
        }
        report
    }

    async fn record_failures(
        &self,
        channel: ChannelType,
        target: &str,
        subscriptions: &[Subscription],
        reason: &str,
        report: &mut DeliveryReport,
    ) {
        for subscription in subscriptions {
            let entry = FailureEntry::new(self.clock.now(), channel, target, &subscription.id, reason);
            if let Err(err) = self.failure_log.record(entry).await {
                warn!(
                    %channel,
                    target,
                    subscription_id = %subscription.id,
                    error = %err,
                    "failed to persist failure log entry"
                );
                report.unrecorded_failures += 1;
            }
        }
    }
}
