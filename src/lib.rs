// src/lib.rs
// Public library surface for the binary and integration tests.

pub mod analyze;
pub mod cli;
pub mod config;
pub mod dedup;
pub mod ingest;
pub mod metrics;
pub mod model;
pub mod pipeline;
pub mod publish;
pub mod retry;
pub mod scheduler;

pub use crate::dedup::{DedupStore, SeenPolicy};
pub use crate::model::{Article, SentimentAnalysis, SignalType, TradingSignal};
pub use crate::pipeline::{CycleEnd, CyclePipeline, CycleReport, PipelineConfig, StepOutcome};
pub use crate::scheduler::{RunMode, Scheduler, StopHandle};
