use async_trait::async_trait;
use common::channel_config::ChannelConfig;
use common::clock::Clock;
use common::types::{ChannelType, Subscription};
use std::sync::Arc;
use thiserror::Error;

pub mod email;
pub mod message;
pub mod wechat_bot;

#[derive(Error, Debug)]
pub enum TransportError {
    #[error("HTTP {0}")]
    Status(u16),
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),
    #[error("rejected by provider: {0}")]
    Rejected(String),
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),
}

/// Sends one reminder covering `subscriptions` to a single target.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, target: &str, subscriptions: &[Subscription]) -> Result<(), TransportError>;
}

/// Builds the HTTP transport for `channel` from the current configuration.
pub fn for_channel(
    channel: ChannelType,
    config: &ChannelConfig,
    client: &reqwest::Client,
    clock: Arc<dyn Clock>,
) -> Box<dyn Transport> {
    match channel {
        ChannelType::WechatBot => Box::new(wechat_bot::WechatBotTransport::new(
            client.clone(),
            config.wechat_bot.msg_type,
            clock,
        )),
        ChannelType::Email => Box::new(email::EmailTransport::new(
            client.clone(),
            email::RESEND_ENDPOINT,
            &config.email,
            clock,
        )),
    }
}
