// src/publish/x.rs
use anyhow::Context;
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;

use super::{status_error, SinkError, SocialSink};
use crate::publish::format::truncate_with_marker;
use crate::retry::RetryPolicy;

pub const X_MAX_LEN: usize = 280;
const DEFAULT_API_BASE: &str = "https://api.x.com/2";

/// Posts to X through the v2 API with an OAuth 2.0 user-context token
/// (`tweet.write`, `media.write` scopes).
pub struct XSink {
    client: reqwest::Client,
    access_token: String,
    api_base: String,
    max_len: usize,
    retry: RetryPolicy,
}

#[derive(Deserialize)]
struct DataId {
    data: IdOnly,
}

#[derive(Deserialize)]
struct IdOnly {
    id: String,
}

impl XSink {
    pub fn new(access_token: impl Into<String>, timeout: Duration) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent("crypto-sentiment-agent/0.1")
            .connect_timeout(Duration::from_secs(5))
            .timeout(timeout)
            .build()
            .context("building x http client")?;
        Ok(Self {
            client,
            access_token: access_token.into(),
            api_base: DEFAULT_API_BASE.to_string(),
            max_len: X_MAX_LEN,
            retry: RetryPolicy::default(),
        })
    }

    pub fn with_api_base(mut self, base: impl Into<String>) -> Self {
        self.api_base = base.into().trim_end_matches('/').to_string();
        self
    }

    /// Lowers the post limit; X never accepts more than [`X_MAX_LEN`].
    pub fn with_max_len(mut self, max_len: usize) -> Self {
        self.max_len = max_len.min(X_MAX_LEN);
        self
    }

    /// Downloads the visual and uploads it as tweet media; returns the media id.
    async fn upload_image(&self, image_url: &str) -> Result<String, SinkError> {
        let bytes = self
            .client
            .get(image_url)
            .send()
            .await?
            .error_for_status()?
            .bytes()
            .await?;

        let form = Form::new().text("media_category", "tweet_image").part(
            "media",
            Part::bytes(bytes.to_vec())
                .file_name("signal.png")
                .mime_str("image/png")?,
        );
        let rsp = self
            .client
            .post(format!("{}/media/upload", self.api_base))
            .bearer_auth(&self.access_token)
            .multipart(form)
            .send()
            .await?;
        let status = rsp.status();
        if !status.is_success() {
            let body = rsp.text().await.unwrap_or_default();
            return Err(status_error(status, body));
        }
        let parsed: DataId = rsp.json().await?;
        Ok(parsed.data.id)
    }

    async fn post_tweet(&self, text: &str, media_id: Option<&str>) -> Result<String, SinkError> {
        let mut body = json!({ "text": text });
        if let Some(id) = media_id {
            body["media"] = json!({ "media_ids": [id] });
        }
        let url = format!("{}/tweets", self.api_base);
        let (client, token, url, body) = (&self.client, self.access_token.as_str(), url.as_str(), &body);

        self.retry
            .run("x post", SinkError::is_safe_to_retry, move || async move {
                let rsp = client.post(url).bearer_auth(token).json(body).send().await?;
                let status = rsp.status();
                if !status.is_success() {
                    let body = rsp.text().await.unwrap_or_default();
                    return Err(status_error(status, body));
                }
                let parsed: DataId = rsp.json().await?;
                Ok(parsed.data.id)
            })
            .await
    }
}

#[async_trait]
impl SocialSink for XSink {
    async fn publish(&self, text: &str, image_url: Option<&str>) -> Result<(), SinkError> {
        // X weighs emoji as two characters
        let text = truncate_with_marker(text, self.max_len);

        // A failed media upload degrades to a text-only post.
        let media_id = match image_url {
            Some(url) => match self.upload_image(url).await {
                Ok(id) => Some(id),
                Err(e) => {
                    tracing::warn!(error = %e, "x media upload failed, posting text only");
                    None
                }
            },
            None => None,
        };

        let id = self.post_tweet(&text, media_id.as_deref()).await?;
        tracing::debug!(tweet_id = %id, with_media = media_id.is_some(), "posted to x");
        Ok(())
    }

    fn max_len(&self) -> usize {
        self.max_len
    }

    fn name(&self) -> &str {
        "x"
    }
}
