//! OpenAI-backed analysis adapter: chat completions with a forced tool call
//! for the two batch stages, image generation for visuals.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::analyze::{AnalysisAdapter, AnalysisError};
use crate::config::ai::AiConfig;
use crate::model::{Article, SentimentAnalysis, SignalType, TradingSignal};
use crate::retry::RetryPolicy;

const SENTIMENT_SYSTEM: &str = "You are a cryptocurrency market analyst. For every article, \
judge the market sentiment it expresses about crypto assets. Score it from -1.0 (very negative) \
to 1.0 (very positive), give a 0.0-1.0 confidence reflecting how clear that sentiment is, list \
the assets mentioned and add a one-sentence summary. Weigh market impact over technology news.";

const SIGNAL_SYSTEM: &str = "You are a cautious cryptocurrency trader. From the sentiment \
analyses, emit at most one signal per asset that has meaningful coverage. Use buy or sell only \
on strong, consistent evidence and hold otherwise. Give a 0.0-1.0 confidence, an aggregate \
sentiment score from -1.0 to 1.0, a short reasoning and the sources that support it.";

pub struct OpenAiAdapter {
    http: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
    image_model: String,
    archive_dir: Option<PathBuf>,
    retry: RetryPolicy,
}

impl OpenAiAdapter {
    pub fn new(cfg: &AiConfig, timeout: Duration) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent("crypto-sentiment-agent/0.1")
            .connect_timeout(Duration::from_secs(5))
            .timeout(timeout)
            .build()?;
        Ok(Self {
            http,
            api_key: cfg.api_key.clone(),
            base_url: cfg.base_url.clone(),
            model: cfg.model.clone(),
            image_model: cfg.image_model.clone(),
            archive_dir: cfg.archive_dir.clone(),
            retry: RetryPolicy::default(),
        })
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    async fn post_json(&self, path: &str, body: &Value) -> Result<Value, AnalysisError> {
        let url = format!("{}{}", self.base_url, path);
        let url = url.as_str();
        let http = &self.http;
        let api_key = self.api_key.as_str();
        self.retry
            .run(path, AnalysisError::is_retryable, move || async move {
                let resp = http
                    .post(url)
                    .bearer_auth(api_key)
                    .json(body)
                    .send()
                    .await?;
                let status = resp.status();
                if status.as_u16() == 401 || status.as_u16() == 403 {
                    return Err(AnalysisError::Unauthorized(status.as_u16()));
                }
                if !status.is_success() {
                    let body = resp.text().await.unwrap_or_default();
                    return Err(AnalysisError::Status {
                        status: status.as_u16(),
                        body: truncate_for_log(&body),
                    });
                }
                resp.json::<Value>()
                    .await
                    .map_err(|e| AnalysisError::Decode(e.to_string()))
            })
            .await
    }

    /// Runs one forced tool call and returns the parsed tool arguments.
    async fn call_tool(
        &self,
        system: &str,
        user: String,
        tool_name: &str,
        parameters: Value,
    ) -> Result<Value, AnalysisError> {
        let body = json!({
            "model": self.model,
            "messages": [
                { "role": "system", "content": system },
                { "role": "user", "content": user },
            ],
            "tools": [{
                "type": "function",
                "function": { "name": tool_name, "parameters": parameters },
            }],
            "tool_choice": { "type": "function", "function": { "name": tool_name } },
            "temperature": 0.2,
        });
        let resp = self.post_json("/chat/completions", &body).await?;
        tool_arguments(&resp)
    }

    async fn archive_visual(&self, dir: &Path, signal: &TradingSignal, url: &str) {
        let folder = dir.join(Utc::now().format("%Y%m%d%H%M%S").to_string());
        let file = folder.join(format!(
            "{}_{}.png",
            file_safe(&signal.cryptocurrency),
            signal.signal_type
        ));
        let res = async {
            let bytes = self
                .http
                .get(url)
                .send()
                .await?
                .error_for_status()?
                .bytes()
                .await?;
            tokio::fs::create_dir_all(&folder).await?;
            tokio::fs::write(&file, &bytes).await?;
            Ok::<(), anyhow::Error>(())
        }
        .await;
        match res {
            Ok(()) => tracing::debug!(path = %file.display(), "visual archived"),
            Err(e) => tracing::warn!(error = %e, path = %file.display(), "visual archive failed"),
        }
    }
}

#[derive(Serialize)]
struct ArticleIn<'a> {
    title: &'a str,
    summary: &'a str,
    source: &'a str,
    link: &'a str,
    published: String,
}

#[derive(Serialize)]
struct AnalysisIn<'a> {
    headline: &'a str,
    source: &'a str,
    sentiment_score: f64,
    confidence: f64,
    entities: Vec<&'a str>,
    summary: &'a str,
    timestamp: String,
}

#[derive(Deserialize)]
struct RawAnalysis {
    headline: String,
    #[serde(default)]
    source: String,
    sentiment_score: f64,
    confidence: f64,
    #[serde(default)]
    entities: Vec<String>,
    #[serde(default)]
    summary: String,
}

#[derive(Deserialize)]
struct RawSignal {
    cryptocurrency: String,
    signal_type: String,
    confidence: f64,
    sentiment_score: f64,
    #[serde(default)]
    reasoning: String,
    #[serde(default)]
    sources: Vec<String>,
}

#[async_trait]
impl AnalysisAdapter for OpenAiAdapter {
    async fn analyze_sentiment(
        &self,
        articles: &[Article],
    ) -> Result<Vec<SentimentAnalysis>, AnalysisError> {
        if articles.is_empty() {
            return Ok(Vec::new());
        }
        let input: Vec<ArticleIn<'_>> = articles
            .iter()
            .map(|a| ArticleIn {
                title: &a.title,
                summary: &a.summary,
                source: &a.source,
                link: &a.link,
                published: a.published.to_rfc3339(),
            })
            .collect();
        let user = format!(
            "Analyze the sentiment of these cryptocurrency news articles: {}",
            serde_json::to_string(&input).map_err(|e| AnalysisError::Decode(e.to_string()))?
        );
        let args = self
            .call_tool(SENTIMENT_SYSTEM, user, "analyze_crypto_sentiment", sentiment_schema())
            .await?;

        let now = Utc::now();
        let out = parse_items::<RawAnalysis>(&args, "analyses")?
            .into_iter()
            .map(|r| {
                let mut a = SentimentAnalysis::new(r.headline, r.source, r.sentiment_score, r.confidence)
                    .with_entities(r.entities)
                    .with_summary(r.summary);
                a.timestamp = now;
                a
            })
            .collect();
        Ok(out)
    }

    async fn generate_signals(
        &self,
        analyses: &[SentimentAnalysis],
        tracked_assets: &[String],
    ) -> Result<Vec<TradingSignal>, AnalysisError> {
        if analyses.is_empty() {
            return Ok(Vec::new());
        }
        let input: Vec<AnalysisIn<'_>> = analyses
            .iter()
            .map(|a| AnalysisIn {
                headline: &a.headline,
                source: &a.source,
                sentiment_score: a.sentiment_score,
                confidence: a.confidence,
                entities: a.entities.iter().map(String::as_str).collect(),
                summary: &a.summary,
                timestamp: a.timestamp.to_rfc3339(),
            })
            .collect();
        let system = format!(
            "{SIGNAL_SYSTEM} Focus on these assets: {}.",
            tracked_assets.join(", ")
        );
        let user = format!(
            "Generate trading signals from these sentiment analyses: {}",
            serde_json::to_string(&input).map_err(|e| AnalysisError::Decode(e.to_string()))?
        );
        let args = self
            .call_tool(&system, user, "generate_trading_signals", signal_schema())
            .await?;

        let now = Utc::now();
        let mut out = Vec::new();
        for r in parse_items::<RawSignal>(&args, "signals")? {
            let Some(kind) = SignalType::parse(&r.signal_type) else {
                tracing::debug!(asset = %r.cryptocurrency, signal_type = %r.signal_type, "dropping signal with unknown type");
                continue;
            };
            out.push(
                TradingSignal::new(r.cryptocurrency, kind, r.confidence, r.sentiment_score)
                    .with_reasoning(r.reasoning)
                    .with_sources(r.sources)
                    .at(now),
            );
        }
        Ok(out)
    }

    async fn generate_visual(&self, signal: &TradingSignal) -> Result<Option<String>, AnalysisError> {
        let kind = signal.signal_type.as_str().to_ascii_uppercase();
        let color = signal.signal_type.color();
        let prompt = format!(
            "A clean, professional trading-signal card for {asset}. Show the {kind} signal \
             prominently in a {color} theme, with sentiment {sent:.2} and confidence {conf:.2} \
             as simple visual gauges. Modern digital style suitable for social media. \
             Show only these key metrics, no explanatory text.",
            asset = signal.cryptocurrency,
            sent = signal.sentiment_score,
            conf = signal.confidence,
        );
        let body = json!({
            "model": self.image_model,
            "prompt": prompt,
            "size": "1024x1024",
            "quality": "standard",
            "n": 1,
        });
        let resp = self.post_json("/images/generations", &body).await?;
        let url = resp
            .pointer("/data/0/url")
            .and_then(Value::as_str)
            .map(str::to_string);

        if let (Some(dir), Some(u)) = (self.archive_dir.as_deref(), url.as_deref()) {
            self.archive_visual(dir, signal, u).await;
        }
        Ok(url)
    }

    fn name(&self) -> &str {
        "openai"
    }
}

/// Pulls `choices[0].message.tool_calls[0].function.arguments` and parses the
/// JSON string it carries.
fn tool_arguments(resp: &Value) -> Result<Value, AnalysisError> {
    let raw = resp
        .pointer("/choices/0/message/tool_calls/0/function/arguments")
        .and_then(Value::as_str)
        .ok_or_else(|| AnalysisError::Decode("response has no tool call arguments".into()))?;
    serde_json::from_str(raw).map_err(|e| AnalysisError::Decode(format!("tool arguments: {e}")))
}

/// Items that fail to deserialize are dropped one by one; a missing array is
/// a decode error for the whole call.
fn parse_items<T: DeserializeOwned>(args: &Value, key: &str) -> Result<Vec<T>, AnalysisError> {
    let items = args
        .get(key)
        .and_then(Value::as_array)
        .ok_or_else(|| AnalysisError::Decode(format!("missing `{key}` array")))?;
    let mut out = Vec::with_capacity(items.len());
    for (idx, item) in items.iter().enumerate() {
        match serde_json::from_value::<T>(item.clone()) {
            Ok(v) => out.push(v),
            Err(e) => tracing::debug!(key, idx, error = %e, "dropping unparseable item"),
        }
    }
    Ok(out)
}

fn sentiment_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "analyses": {
                "type": "array",
                "items": {
                    "type": "object",
                    "properties": {
                        "headline": { "type": "string" },
                        "source": { "type": "string" },
                        "sentiment_score": { "type": "number", "minimum": -1.0, "maximum": 1.0 },
                        "confidence": { "type": "number", "minimum": 0.0, "maximum": 1.0 },
                        "entities": { "type": "array", "items": { "type": "string" } },
                        "summary": { "type": "string" }
                    },
                    "required": ["headline", "source", "sentiment_score", "confidence", "entities", "summary"]
                }
            }
        },
        "required": ["analyses"]
    })
}

fn signal_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "signals": {
                "type": "array",
                "items": {
                    "type": "object",
                    "properties": {
                        "cryptocurrency": { "type": "string" },
                        "signal_type": { "type": "string", "enum": ["buy", "sell", "hold"] },
                        "confidence": { "type": "number", "minimum": 0.0, "maximum": 1.0 },
                        "sentiment_score": { "type": "number", "minimum": -1.0, "maximum": 1.0 },
                        "reasoning": { "type": "string" },
                        "sources": { "type": "array", "items": { "type": "string" } }
                    },
                    "required": ["cryptocurrency", "signal_type", "confidence", "sentiment_score", "reasoning", "sources"]
                }
            }
        },
        "required": ["signals"]
    })
}

fn truncate_for_log(s: &str) -> String {
    s.chars().take(300).collect()
}

fn file_safe(s: &str) -> String {
    s.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '_' })
        .collect()
}
