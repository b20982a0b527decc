//! Fan-out of due subscriptions to channel targets.
//!
//! Each subscription either pins itself to explicit targets through its
//! per-channel override, or falls back to every globally configured target.

use indexmap::IndexMap;
use url::Url;

use crate::channel_config::ChannelConfig;
use crate::types::{ChannelType, Subscription};

/// Target id (webhook URL or email address) to the subscriptions routed there,
/// in first-routed order.
pub type DistributionMap = IndexMap<String, Vec<Subscription>>;

/// Where a subscription goes on one channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Targets {
    /// Broadcast to every global target.
    Default,
    /// Only these targets.
    Explicit(Vec<String>),
}

/// Resolves the targets for one subscription on one channel.
pub fn resolve_targets(
    channel: ChannelType,
    subscription: &Subscription,
    config: &ChannelConfig,
) -> Targets {
    let overrides = subscription.overrides(channel);
    let mut explicit: Vec<String> = Vec::new();

    match channel {
        ChannelType::WechatBot => {
            for key in overrides {
                for webhook in config.global_targets(channel) {
                    if webhook_key(webhook).as_deref() == Some(key) && !explicit.contains(webhook) {
                        explicit.push(webhook.clone());
                    }
                }
            }
        }
        ChannelType::Email => {
            for address in overrides {
                if !explicit.iter().any(|t| t == address) {
                    explicit.push(address.to_string());
                }
            }
        }
    }

    if explicit.is_empty() {
        Targets::Default
    } else {
        Targets::Explicit(explicit)
    }
}

/// Routes `subscriptions` for a single channel type.
///
/// An empty global target list disables the channel for this run and yields
/// an empty map, overrides included.
pub fn distribute(
    channel: ChannelType,
    subscriptions: &[Subscription],
    config: &ChannelConfig,
) -> DistributionMap {
    let mut map = DistributionMap::new();
    let globals = config.global_targets(channel);
    if globals.is_empty() {
        return map;
    }

    for subscription in subscriptions {
        match resolve_targets(channel, subscription, config) {
            Targets::Default => {
                for target in globals {
                    push(&mut map, target, subscription);
                }
            }
            Targets::Explicit(targets) => {
                for target in &targets {
                    push(&mut map, target, subscription);
                }
            }
        }
    }

    map
}

/// Routes `subscriptions` for every enabled channel, dropping channels that
/// end up with nothing to deliver.
pub fn distribute_all(
    subscriptions: &[Subscription],
    config: &ChannelConfig,
) -> Vec<(ChannelType, DistributionMap)> {
    config
        .enabled
        .iter()
        .map(|channel| (*channel, distribute(*channel, subscriptions, config)))
        .filter(|(_, map)| !map.is_empty())
        .collect()
}

fn push(map: &mut DistributionMap, target: &str, subscription: &Subscription) {
    map.entry(target.to_string())
        .or_default()
        .push(subscription.clone());
}

/// Value of the `key` query parameter of a bot webhook URL.
pub fn webhook_key(webhook: &str) -> Option<String> {
    let url = Url::parse(webhook).ok()?;
    url.query_pairs()
        .find(|(name, _)| name == "key")
        .map(|(_, value)| value.into_owned())
}
