// src/analyze/mod.rs
//! Analysis adapter: the reasoning service that turns articles into sentiment,
//! sentiment into signals, and signals into an optional visual.

pub mod openai;

use crate::model::{Article, SentimentAnalysis, TradingSignal};
use async_trait::async_trait;

/// Why an analysis call produced nothing.
#[derive(Debug, thiserror::Error)]
pub enum AnalysisError {
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("service returned HTTP {status}: {body}")]
    Status { status: u16, body: String },
    /// Credentials rejected. Retrying next cycle will not help.
    #[error("service rejected credentials (HTTP {0})")]
    Unauthorized(u16),
    #[error("could not decode service response: {0}")]
    Decode(String),
    #[error("analysis call timed out after {0:?}")]
    Timeout(std::time::Duration),
}

impl AnalysisError {
    /// Configuration-class failures that should stop the agent.
    pub fn is_fatal(&self) -> bool {
        matches!(self, AnalysisError::Unauthorized(_))
    }

    /// Worth another attempt inside the same call.
    pub fn is_retryable(&self) -> bool {
        match self {
            AnalysisError::Transport(e) => e.is_connect() || e.is_timeout(),
            AnalysisError::Status { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}

#[async_trait]
pub trait AnalysisAdapter: Send + Sync {
    /// One batch call. May return fewer analyses than articles.
    async fn analyze_sentiment(
        &self,
        articles: &[Article],
    ) -> Result<Vec<SentimentAnalysis>, AnalysisError>;

    /// One batch call over every analysis of the cycle. Assets without enough
    /// evidence may be left out.
    async fn generate_signals(
        &self,
        analyses: &[SentimentAnalysis],
        tracked_assets: &[String],
    ) -> Result<Vec<TradingSignal>, AnalysisError>;

    /// URL of a generated image, or `None` when the service produced none.
    async fn generate_visual(&self, signal: &TradingSignal) -> Result<Option<String>, AnalysisError>;

    fn name(&self) -> &str;
}
