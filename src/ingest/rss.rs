// src/ingest/rss.rs
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use metrics::{counter, histogram};
use quick_xml::de::from_str;
use serde::Deserialize;
use std::time::Duration;
use time::{format_description::well_known::Rfc2822, OffsetDateTime};

use crate::ingest::{normalize_text, NewsSource};
use crate::model::{Article, UNKNOWN_SOURCE};

#[derive(Debug, Deserialize)]
struct Rss {
    channel: Channel,
}

#[derive(Debug, Deserialize)]
struct Channel {
    title: Option<String>,
    #[serde(rename = "item", default)]
    item: Vec<Item>,
}

#[derive(Debug, Deserialize)]
struct Item {
    title: Option<String>,
    link: Option<String>,
    guid: Option<Guid>,
    #[serde(rename = "pubDate")]
    pub_date: Option<String>,
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Guid {
    #[serde(rename = "$text", default)]
    value: String,
}

fn parse_rfc2822(ts: &str) -> Option<DateTime<Utc>> {
    let dt = OffsetDateTime::parse(ts.trim(), &Rfc2822).ok()?;
    DateTime::from_timestamp(dt.unix_timestamp(), 0)
}

/// RSS 2.0 feed (Cointelegraph by default) as a [`NewsSource`].
pub struct RssNewsSource {
    mode: Mode,
}

enum Mode {
    Fixture(String),
    Http { url: String, client: reqwest::Client },
}

impl RssNewsSource {
    /// Parses a fixed XML document on every fetch. Used by tests and dry runs.
    pub fn from_fixture(xml: &str) -> Self {
        Self {
            mode: Mode::Fixture(xml.to_string()),
        }
    }

    pub fn from_url(url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent("crypto-sentiment-agent/0.1")
            .connect_timeout(Duration::from_secs(5))
            .timeout(timeout)
            .build()
            .context("building feed http client")?;
        Ok(Self {
            mode: Mode::Http {
                url: url.into(),
                client,
            },
        })
    }

    fn parse_items_from_str(s: &str) -> Result<Vec<Article>> {
        let t0 = std::time::Instant::now();
        let xml_clean = scrub_html_entities_for_xml(s);
        let rss: Rss = from_str(&xml_clean).context("parsing rss xml")?;

        let source = rss
            .channel
            .title
            .as_deref()
            .map(normalize_text)
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| UNKNOWN_SOURCE.to_string());

        let now = Utc::now();
        let mut out = Vec::with_capacity(rss.channel.item.len());
        for it in rss.channel.item {
            let title = it.title.as_deref().map(normalize_text).unwrap_or_default();
            if title.is_empty() {
                tracing::warn!(target: "ingest", link = ?it.link, "skipping rss item without title");
                continue;
            }
            let link = it.link.unwrap_or_default().trim().to_string();
            let id = it
                .guid
                .map(|g| g.value.trim().to_string())
                .filter(|g| !g.is_empty())
                .or_else(|| Some(link.clone()).filter(|l| !l.is_empty()))
                .unwrap_or_else(|| title.clone());

            let published = it
                .pub_date
                .as_deref()
                .and_then(parse_rfc2822)
                .unwrap_or(now);

            out.push(
                Article::new(id, title)
                    .with_summary(
                        it.description
                            .as_deref()
                            .map(normalize_text)
                            .unwrap_or_default(),
                    )
                    .with_link(link)
                    .with_source(source.clone())
                    .published_at(published),
            );
        }

        let ms = t0.elapsed().as_secs_f64() * 1_000.0;
        histogram!("ingest_parse_ms").record(ms);
        counter!("ingest_events_total").increment(out.len() as u64);
        Ok(out)
    }
}

#[async_trait]
impl NewsSource for RssNewsSource {
    async fn fetch(&self) -> Result<Vec<Article>> {
        match &self.mode {
            Mode::Fixture(s) => Self::parse_items_from_str(s),
            Mode::Http { url, client } => {
                let body = client
                    .get(url.as_str())
                    .send()
                    .await
                    .context("rss http get()")?
                    .error_for_status()
                    .context("rss non-2xx")?
                    .text()
                    .await
                    .context("rss http .text()")?;
                Self::parse_items_from_str(&body)
            }
        }
    }

    fn name(&self) -> &str {
        match &self.mode {
            Mode::Fixture(_) => "rss-fixture",
            Mode::Http { url, .. } => url.as_str(),
        }
    }
}

/// Feeds love HTML entities that are undefined in XML.
fn scrub_html_entities_for_xml(s: &str) -> String {
    s.replace("&nbsp;", " ")
        .replace("&ndash;", "-")
        .replace("&mdash;", "-")
        .replace("&ldquo;", "\"")
        .replace("&rdquo;", "\"")
        .replace("&lsquo;", "'")
        .replace("&rsquo;", "'")
        .replace("&hellip;", "...")
}
