// src/pipeline/report.rs
//! What one cycle did, step by step. Returned by `CyclePipeline::run_cycle`
//! so callers and tests can inspect outcomes instead of parsing logs.

use crate::analyze::AnalysisError;
use crate::model::SignalType;
use crate::publish::LedgerReceipt;
use std::fmt;

/// Outcome of one step. `Partial` means the service returned fewer items than
/// it was asked about, which is accepted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum StepOutcome {
    #[default]
    Skipped,
    Succeeded,
    Partial { produced: usize, expected: usize },
    Failed(String),
}

impl StepOutcome {
    pub fn from_counts(produced: usize, expected: usize) -> Self {
        if produced >= expected {
            StepOutcome::Succeeded
        } else {
            StepOutcome::Partial { produced, expected }
        }
    }

    pub fn failed(e: impl fmt::Display) -> Self {
        StepOutcome::Failed(e.to_string())
    }

    pub fn is_success(&self) -> bool {
        matches!(self, StepOutcome::Succeeded | StepOutcome::Partial { .. })
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, StepOutcome::Failed(_))
    }

    /// Label value for `sink_publish_total`.
    pub(crate) fn metric_label(&self) -> &'static str {
        match self {
            StepOutcome::Skipped => "skipped",
            StepOutcome::Succeeded | StepOutcome::Partial { .. } => "ok",
            StepOutcome::Failed(_) => "error",
        }
    }
}

/// Where a cycle stopped.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CycleEnd {
    #[default]
    NoNewArticles,
    FetchFailed,
    SentimentFailed,
    NoAnalyses,
    SignalsFailed,
    NoSignals,
    Published,
}

impl CycleEnd {
    pub fn as_str(self) -> &'static str {
        match self {
            CycleEnd::NoNewArticles => "no_new_articles",
            CycleEnd::FetchFailed => "fetch_failed",
            CycleEnd::SentimentFailed => "sentiment_failed",
            CycleEnd::NoAnalyses => "no_analyses",
            CycleEnd::SignalsFailed => "signals_failed",
            CycleEnd::NoSignals => "no_signals",
            CycleEnd::Published => "published",
        }
    }
}

impl fmt::Display for CycleEnd {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-signal fan-out result. The three sub-steps are independent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignalReport {
    pub asset: String,
    pub signal_type: SignalType,
    pub visual: StepOutcome,
    pub social: StepOutcome,
    pub ledger: StepOutcome,
    pub image_url: Option<String>,
    pub receipt: Option<LedgerReceipt>,
}

impl SignalReport {
    pub(crate) fn new(asset: &str, signal_type: SignalType) -> Self {
        Self {
            asset: asset.to_string(),
            signal_type,
            visual: StepOutcome::Skipped,
            social: StepOutcome::Skipped,
            ledger: StepOutcome::Skipped,
            image_url: None,
            receipt: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub fetched: usize,
    pub new_articles: usize,
    pub skipped_duplicates: usize,
    pub sentiment: StepOutcome,
    pub signals: StepOutcome,
    pub end: CycleEnd,
    pub signal_reports: Vec<SignalReport>,
}

impl CycleReport {
    pub fn published_social(&self) -> usize {
        self.signal_reports.iter().filter(|r| r.social.is_success()).count()
    }

    pub fn published_ledger(&self) -> usize {
        self.signal_reports.iter().filter(|r| r.ledger.is_success()).count()
    }
}

/// Errors that escape a cycle and should stop the agent. Everything else is
/// absorbed into the [`CycleReport`].
#[derive(Debug, thiserror::Error)]
pub enum CycleError {
    #[error("{stage} stage failed: {source}")]
    Fatal {
        stage: &'static str,
        source: AnalysisError,
    },
}
