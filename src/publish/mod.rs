// src/publish/mod.rs
//! Publication sinks: where finished signals go.

pub mod discord;
pub mod encoding;
pub mod format;
pub mod ledger_relay;
pub mod x;

use async_trait::async_trait;
use std::time::Duration;

pub use encoding::{decode_sentiment, encode_sentiment, EncodeError};
pub use format::{direction_marker, format_signal_post, truncate_with_marker, weighted_len, TRUNCATION_MARKER};

#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("sink returned HTTP {status}: {body}")]
    Status { status: u16, body: String },
    #[error("rejected: {0}")]
    Rejected(String),
    #[error("no confirmation within {0:?}")]
    Timeout(Duration),
    #[error(transparent)]
    Encoding(#[from] EncodeError),
}

impl SinkError {
    /// Only failures where the request provably never reached the remote side.
    pub fn is_safe_to_retry(&self) -> bool {
        match self {
            SinkError::Transport(e) => e.is_connect(),
            SinkError::Status { status, .. } => *status == 429,
            _ => false,
        }
    }
}

/// Social network post target.
#[async_trait]
pub trait SocialSink: Send + Sync {
    /// Publishes one post. `text` is expected to respect [`SocialSink::max_len`].
    async fn publish(&self, text: &str, image_url: Option<&str>) -> Result<(), SinkError>;
    /// Hard limit of one post, measured with [`weighted_len`].
    fn max_len(&self) -> usize;
    fn name(&self) -> &str;
}

/// Proof that a ledger write was confirmed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerReceipt {
    pub tx_hash: String,
    pub block_number: Option<u64>,
}

/// Ledger record target. `record` resolves only once the write is confirmed.
#[async_trait]
pub trait LedgerSink: Send + Sync {
    async fn record(
        &self,
        target: &str,
        asset: &str,
        encoded_sentiment: i32,
        unix_timestamp: i64,
    ) -> Result<LedgerReceipt, SinkError>;
    fn name(&self) -> &str;
}

pub(crate) fn status_error(status: reqwest::StatusCode, body: String) -> SinkError {
    SinkError::Status {
        status: status.as_u16(),
        body: body.chars().take(300).collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_throttling_is_retryable_among_statuses() {
        let e = |status| SinkError::Status {
            status,
            body: String::new(),
        };
        assert!(e(429).is_safe_to_retry());
        assert!(!e(500).is_safe_to_retry());
        assert!(!SinkError::Rejected("x".into()).is_safe_to_retry());
    }
}
