use async_trait::async_trait;
use common::channel_config::BotMessageType;
use common::clock::Clock;
use common::types::Subscription;
use reqwest::Client;
use serde_json::{json, Value};
use std::sync::Arc;

use super::{message, Transport, TransportError};

/// Group-bot webhook: the target is the full webhook URL.
pub struct WechatBotTransport {
    client: Client,
    msg_type: BotMessageType,
    clock: Arc<dyn Clock>,
}

impl WechatBotTransport {
    pub fn new(client: Client, msg_type: BotMessageType, clock: Arc<dyn Clock>) -> Self {
        Self {
            client,
            msg_type,
            clock,
        }
    }

    fn payload(&self, subscriptions: &[Subscription]) -> Value {
        let now = self.clock.now();
        match self.msg_type {
            BotMessageType::Text => json!({
                "msgtype": "text",
                "text": { "content": message::render_text(subscriptions, now) },
            }),
            BotMessageType::Markdown => json!({
                "msgtype": "markdown",
                "markdown": { "content": message::render_markdown(subscriptions, now) },
            }),
        }
    }
}

/// The bot API answers 200 even on failure and reports it through `errcode`.
fn check_reply(body: &str) -> Result<(), TransportError> {
    let Ok(reply) = serde_json::from_str::<Value>(body) else {
        return Ok(());
    };
    match reply.get("errcode").and_then(Value::as_i64) {
        None | Some(0) => Ok(()),
        Some(code) => {
            let msg = reply
                .get("errmsg")
                .and_then(Value::as_str)
                .unwrap_or("unknown error");
            Err(TransportError::Rejected(format!("errcode {}: {}", code, msg)))
        }
    }
}

#[async_trait]
impl Transport for WechatBotTransport {
    async fn send(&self, target: &str, subscriptions: &[Subscription]) -> Result<(), TransportError> {
        let resp = self
            .client
            .post(target)
            .json(&self.payload(subscriptions))
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            return Err(TransportError::Status(status.as_u16()));
        }
        let body = resp.text().await?;
        check_reply(&body)
    }
}
