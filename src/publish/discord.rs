use super::{status_error, SinkError, SocialSink};
use crate::publish::format::truncate_with_marker;
use crate::retry::RetryPolicy;
use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use std::time::Duration;

/// Discord message content limit.
pub const DISCORD_MAX_LEN: usize = 2000;

/// Social sink posting to a Discord channel webhook; the visual goes into an
/// embed image.
#[derive(Clone)]
pub struct DiscordSink {
    webhook: String,
    client: Client,
    timeout: Duration,
    retry: RetryPolicy,
}

impl DiscordSink {
    pub fn new(webhook: String) -> Self {
        Self {
            webhook,
            client: Client::new(),
            timeout: Duration::from_secs(5),
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout = Duration::from_secs(secs);
        self
    }

    pub fn with_retries(mut self, retries: u8) -> Self {
        self.retry.max_attempts = retries;
        self
    }
}

#[async_trait]
impl SocialSink for DiscordSink {
    async fn publish(&self, text: &str, image_url: Option<&str>) -> Result<(), SinkError> {
        let payload = DiscordWebhookPayload::new(&truncate_with_marker(text, DISCORD_MAX_LEN), image_url);
        let (client, webhook, timeout, payload) = (&self.client, &self.webhook, self.timeout, &payload);

        self.retry
            .run("discord webhook", SinkError::is_safe_to_retry, move || async move {
                let rsp = client
                    .post(webhook.as_str())
                    .timeout(timeout)
                    .json(payload)
                    .send()
                    .await?;
                let status = rsp.status();
                if !status.is_success() {
                    let body = rsp.text().await.unwrap_or_default();
                    return Err(status_error(status, body));
                }
                Ok(())
            })
            .await
    }

    fn max_len(&self) -> usize {
        DISCORD_MAX_LEN
    }

    fn name(&self) -> &str {
        "discord"
    }
}

#[derive(Serialize)]
struct DiscordImage {
    url: String,
}

#[derive(Serialize)]
struct DiscordEmbed {
    image: DiscordImage,
}

#[derive(Serialize)]
struct DiscordWebhookPayload {
    content: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    embeds: Vec<DiscordEmbed>,
}

impl DiscordWebhookPayload {
    fn new(content: &str, image_url: Option<&str>) -> Self {
        Self {
            content: content.to_string(),
            embeds: image_url
                .map(|u| DiscordEmbed {
                    image: DiscordImage { url: u.to_string() },
                })
                .into_iter()
                .collect(),
        }
    }
}
