use async_trait::async_trait;
use common::channel_config::EmailConfig;
use common::clock::Clock;
use common::types::Subscription;
use reqwest::Client;
use serde::Serialize;
use std::sync::Arc;

use super::{message, Transport, TransportError};

pub const RESEND_ENDPOINT: &str = "https://api.resend.com/emails";

/// Email through the Resend HTTP API: the target is the recipient address.
pub struct EmailTransport {
    client: Client,
    endpoint: String,
    from: String,
    api_key: String,
    clock: Arc<dyn Clock>,
}

#[derive(Serialize)]
struct SendEmail<'a> {
    from: &'a str,
    to: [&'a str; 1],
    subject: String,
    html: String,
}

impl EmailTransport {
    /// `endpoint` is normally [`RESEND_ENDPOINT`].
    pub fn new(client: Client, endpoint: &str, config: &EmailConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            client,
            endpoint: endpoint.to_string(),
            from: config.from.clone(),
            api_key: config.api_key.clone(),
            clock,
        }
    }

    fn request<'a>(&'a self, target: &'a str, subscriptions: &[Subscription]) -> SendEmail<'a> {
        SendEmail {
            from: &self.from,
            to: [target],
            subject: message::subject(subscriptions),
            html: message::render_html(subscriptions, self.clock.now()),
        }
    }
}

#[async_trait]
impl Transport for EmailTransport {
    async fn send(&self, target: &str, subscriptions: &[Subscription]) -> Result<(), TransportError> {
        if self.api_key.is_empty() {
            return Err(TransportError::InvalidConfiguration(
                "missing email API key".to_string(),
            ));
        }
        if self.from.is_empty() {
            return Err(TransportError::InvalidConfiguration(
                "missing sender address".to_string(),
            ));
        }

        let resp = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&self.request(target, subscriptions))
            .send()
            .await?;

        if resp.status().is_success() {
            Ok(())
        } else {
            Err(TransportError::Status(resp.status().as_u16()))
        }
    }
}
