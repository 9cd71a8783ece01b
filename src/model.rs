//! Records flowing through one cycle: articles, sentiment analyses
//! and trading signals.
//!
//! Everything here is plain data. Constructors clamp confidences (and analysis
//! scores) into their documented ranges; a signal's sentiment is stored as
//! reported so the ledger encoder can refuse values it cannot represent.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Source name used when a feed does not announce its own title.
pub const UNKNOWN_SOURCE: &str = "Unknown";

/// A news item as fetched from a feed. Immutable once built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Article {
    /// Source-unique identifier; the dedup key.
    pub id: String,
    pub title: String,
    pub summary: String,
    pub link: String,
    pub published: DateTime<Utc>,
    pub source: String,
}

impl Article {
    /// Builds an article with `published = now` and the unknown source name.
    pub fn new(id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            summary: String::new(),
            link: String::new(),
            published: Utc::now(),
            source: UNKNOWN_SOURCE.to_string(),
        }
    }

    pub fn with_summary(mut self, summary: impl Into<String>) -> Self {
        self.summary = summary.into();
        self
    }

    pub fn with_link(mut self, link: impl Into<String>) -> Self {
        self.link = link.into();
        self
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        let s = source.into();
        self.source = if s.trim().is_empty() {
            UNKNOWN_SOURCE.to_string()
        } else {
            s
        };
        self
    }

    pub fn published_at(mut self, ts: DateTime<Utc>) -> Self {
        self.published = ts;
        self
    }
}

/// Sentiment of one article, as judged by the analysis service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SentimentAnalysis {
    pub headline: String,
    pub source: String,
    /// When the analysis was produced (not when the article was published).
    pub timestamp: DateTime<Utc>,
    /// -1.0 (very negative) ..= 1.0 (very positive)
    pub sentiment_score: f64,
    /// 0.0 ..= 1.0
    pub confidence: f64,
    /// Mentioned assets; a set, order is irrelevant.
    pub entities: BTreeSet<String>,
    pub summary: String,
}

impl SentimentAnalysis {
    pub fn new(
        headline: impl Into<String>,
        source: impl Into<String>,
        sentiment_score: f64,
        confidence: f64,
    ) -> Self {
        Self {
            headline: headline.into(),
            source: source.into(),
            timestamp: Utc::now(),
            sentiment_score: clamp_signed(sentiment_score),
            confidence: clamp01(confidence),
            entities: BTreeSet::new(),
            summary: String::new(),
        }
    }

    pub fn with_entities<I, S>(mut self, entities: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.entities = entities.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_summary(mut self, summary: impl Into<String>) -> Self {
        self.summary = summary.into();
        self
    }
}

/// Categorical recommendation carried by a [`TradingSignal`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SignalType {
    Buy,
    Sell,
    Hold,
}

impl SignalType {
    pub fn as_str(self) -> &'static str {
        match self {
            SignalType::Buy => "buy",
            SignalType::Sell => "sell",
            SignalType::Hold => "hold",
        }
    }

    /// Lenient parse used on model output; anything unknown is `None`.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "buy" => Some(SignalType::Buy),
            "sell" => Some(SignalType::Sell),
            "hold" => Some(SignalType::Hold),
            _ => None,
        }
    }

    /// Colour theme used when asking for a visual.
    pub fn color(self) -> &'static str {
        match self {
            SignalType::Buy => "green",
            SignalType::Sell => "red",
            SignalType::Hold => "yellow",
        }
    }
}

impl fmt::Display for SignalType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Aggregated recommendation for one asset across all analyses of a cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradingSignal {
    pub cryptocurrency: String,
    pub signal_type: SignalType,
    /// 0.0 ..= 1.0
    pub confidence: f64,
    /// Kept as reported; the ledger encoder rejects values outside -1.0 ..= 1.0.
    pub sentiment_score: f64,
    pub reasoning: String,
    pub timestamp: DateTime<Utc>,
    /// Contributing headlines/sources, in the order the service listed them.
    #[serde(default)]
    pub sources: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
}

impl TradingSignal {
    pub fn new(
        cryptocurrency: impl Into<String>,
        signal_type: SignalType,
        confidence: f64,
        sentiment_score: f64,
    ) -> Self {
        Self {
            cryptocurrency: cryptocurrency.into(),
            signal_type,
            confidence: clamp01(confidence),
            sentiment_score,
            reasoning: String::new(),
            timestamp: Utc::now(),
            sources: Vec::new(),
            image_url: None,
        }
    }

    pub fn with_reasoning(mut self, reasoning: impl Into<String>) -> Self {
        self.reasoning = reasoning.into();
        self
    }

    pub fn with_sources<I, S>(mut self, sources: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.sources = sources.into_iter().map(Into::into).collect();
        self
    }

    pub fn at(mut self, ts: DateTime<Utc>) -> Self {
        self.timestamp = ts;
        self
    }
}

pub(crate) fn clamp01(x: f64) -> f64 {
    if x.is_nan() {
        0.0
    } else {
        x.clamp(0.0, 1.0)
    }
}

pub(crate) fn clamp_signed(x: f64) -> f64 {
    if x.is_nan() {
        0.0
    } else {
        x.clamp(-1.0, 1.0)
    }
}
