//! Channel configuration as stored under the `config` key.
//!
//! The stored form packs target lists into `|`-delimited strings. Those are
//! split exactly once here so routing only ever sees ordered lists.

use serde_json::Value;

use crate::types::{split_list, ChannelType};

pub const CONFIG_KEY: &str = "config";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum BotMessageType {
    #[default]
    Text,
    Markdown,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WechatBotConfig {
    pub webhooks: Vec<String>,
    pub msg_type: BotMessageType,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EmailConfig {
    pub recipients: Vec<String>,
    pub from: String,
    pub api_key: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChannelConfig {
    pub enabled: Vec<ChannelType>,
    pub wechat_bot: WechatBotConfig,
    pub email: EmailConfig,
}

impl ChannelConfig {
    /// Builds a configuration from the stored JSON document.
    ///
    /// Never fails: missing sections, non-string fields and unknown channel
    /// names all degrade to "no targets" for the affected channel.
    pub fn from_value(value: &Value) -> Self {
        let mut enabled = Vec::new();
        if let Some(names) = value.get("enabledNotifiers").and_then(Value::as_array) {
            for name in names.iter().filter_map(Value::as_str) {
                if let Ok(channel) = name.parse::<ChannelType>() {
                    if !enabled.contains(&channel) {
                        enabled.push(channel);
                    }
                }
            }
        }

        let bot = value.get("wechatBot");
        let msg_type = match bot.and_then(|b| string_field(b, "msgType")) {
            Some("markdown") => BotMessageType::Markdown,
            _ => BotMessageType::Text,
        };
        let wechat_bot = WechatBotConfig {
            webhooks: target_list(bot, "webhook"),
            msg_type,
        };

        let mail = value.get("email");
        let email = EmailConfig {
            recipients: target_list(mail, "toEmail"),
            from: mail
                .and_then(|m| string_field(m, "fromEmail"))
                .unwrap_or_default()
                .trim()
                .to_string(),
            api_key: mail
                .and_then(|m| string_field(m, "resendApiKey"))
                .unwrap_or_default()
                .to_string(),
        };

        Self {
            enabled,
            wechat_bot,
            email,
        }
    }

    /// Parses the raw stored string. Fails only when it is not JSON at all.
    pub fn parse(raw: &str) -> Result<Self, serde_json::Error> {
        let value: Value = serde_json::from_str(raw)?;
        Ok(Self::from_value(&value))
    }

    pub fn is_enabled(&self, channel: ChannelType) -> bool {
        self.enabled.contains(&channel)
    }

    /// Global (broadcast) targets for a channel type.
    pub fn global_targets(&self, channel: ChannelType) -> &[String] {
        match channel {
            ChannelType::WechatBot => &self.wechat_bot.webhooks,
            ChannelType::Email => &self.email.recipients,
        }
    }
}

fn string_field<'a>(section: &'a Value, field: &str) -> Option<&'a str> {
    section.get(field).and_then(Value::as_str)
}

/// Splits a `|` list, keeping the first occurrence of each target.
fn target_list(section: Option<&Value>, field: &str) -> Vec<String> {
    let mut targets: Vec<String> = Vec::new();
    let raw = section.and_then(|s| string_field(s, field)).unwrap_or_default();
    for target in split_list(raw) {
        if !targets.iter().any(|seen| seen == target) {
            targets.push(target.to_string());
        }
    }
    targets
}
