use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum ChannelType {
    #[serde(rename = "wechatbot")]
    WechatBot,
    Email,
}

impl ChannelType {
    pub const ALL: [ChannelType; 2] = [ChannelType::WechatBot, ChannelType::Email];

    pub fn as_str(&self) -> &'static str {
        match self {
            ChannelType::WechatBot => "wechatbot",
            ChannelType::Email => "email",
        }
    }
}

impl fmt::Display for ChannelType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ChannelType {
    type Err = UnknownChannel;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "wechatbot" => Ok(ChannelType::WechatBot),
            "email" => Ok(ChannelType::Email),
            other => Err(UnknownChannel(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown channel type: {0}")]
pub struct UnknownChannel(pub String);

/// A subscription that is due for a reminder on this run.
///
/// Owned by the subscription store; the pipeline only reads it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Subscription {
    pub id: String,
    pub name: String,
    pub expiry_date: DateTime<Utc>,
    pub is_active: bool,
    pub auto_renew: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wechat_bot_keys: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email_addresses: Option<String>,
}

impl Subscription {
    /// Raw per-channel override entries, split on `|` and trimmed.
    ///
    /// Returns an empty list when the field is absent or blank.
    pub fn overrides(&self, channel: ChannelType) -> Vec<&str> {
        let raw = match channel {
            ChannelType::WechatBot => self.wechat_bot_keys.as_deref(),
            ChannelType::Email => self.email_addresses.as_deref(),
        };
        raw.map(split_list).unwrap_or_default()
    }
}

/// Splits a `|`-delimited list, trimming entries and dropping empty ones.
pub fn split_list(raw: &str) -> Vec<&str> {
    raw.split('|')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .collect()
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct FailureEntry {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub channel: ChannelType,
    pub target: String,
    pub subscription_id: String,
    pub error: String,
}

impl FailureEntry {
    pub fn new(
        timestamp: DateTime<Utc>,
        channel: ChannelType,
        target: &str,
        subscription_id: &str,
        error: &str,
    ) -> Self {
        Self {
            id: format!("fl_{}", nanoid::nanoid!(12)),
            timestamp,
            channel,
            target: target.to_string(),
            subscription_id: subscription_id.to_string(),
            error: error.to_string(),
        }
    }
}

/// Outcome counts for one channel type in one delivery run.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryReport {
    pub channel: Option<ChannelType>,
    pub attempted: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub rate_limited: usize,
    pub skipped: usize,
    pub unrecorded_failures: usize,
}

impl DeliveryReport {
    pub fn for_channel(channel: ChannelType) -> Self {
        Self {
            channel: Some(channel),
            ..Self::default()
        }
    }

    pub fn is_clean(&self) -> bool {
        self.failed == 0 && self.rate_limited == 0 && self.skipped == 0
    }
}
