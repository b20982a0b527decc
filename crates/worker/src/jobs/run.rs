use anyhow::Context;
use common::channel_config::ChannelConfig;
use common::routing::distribute_all;
use common::types::{ChannelType, DeliveryReport, Subscription};
use tracing::info;

use crate::config_source::ConfigSource;
use crate::jobs::delivery::Executor;
use crate::transport::Transport;

/// One reminder run: route the due subscriptions across every enabled channel
/// and deliver each channel in turn.
///
/// Only a configuration read failure aborts the run; delivery problems end up
/// in the returned reports.
pub async fn run_notifications<F>(
    config_source: &ConfigSource,
    executor: &Executor,
    subscriptions: &[Subscription],
    only: Option<ChannelType>,
    transport_for: F,
) -> anyhow::Result<Vec<DeliveryReport>>
where
    F: Fn(ChannelType, &ChannelConfig) -> Box<dyn Transport>,
{
    let config = config_source
        .load()
        .await
        .context("loading channel configuration")?;

    info!(
        subscriptions = subscriptions.len(),
        enabled = ?config.enabled,
        "starting delivery run"
    );

    let mut reports = Vec::new();
    for (channel, map) in distribute_all(subscriptions, &config) {
        if only.is_some_and(|wanted| wanted != channel) {
            continue;
        }
        let transport = transport_for(channel, &config);
        let report = executor.deliver(&map, channel, transport.as_ref()).await;
        info!(
            %channel,
            attempted = report.attempted,
            succeeded = report.succeeded,
            failed = report.failed,
            rate_limited = report.rate_limited,
            skipped = report.skipped,
            "channel delivery finished"
        );
        reports.push(report);
    }

    Ok(reports)
}
