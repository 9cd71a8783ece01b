// src/pipeline/mod.rs
//! One cycle: fetch → dedup → sentiment → signals → per-signal fan-out
//! (visual, social post, ledger record).
//!
//! Failures of the news source or of a bulk analysis call end the cycle early
//! and are reported, not returned. Sink failures stay inside the signal and
//! the sink they happened in. Only configuration-class errors from the
//! analysis service leave `run_cycle` as `Err`.

pub mod report;

use async_trait::async_trait;
use metrics::{counter, gauge, histogram};
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::analyze::{AnalysisAdapter, AnalysisError};
use crate::dedup::{DedupStore, SeenPolicy};
use crate::ingest::{filter_unseen, NewsSource};
use crate::model::{Article, TradingSignal};
use crate::publish::{encode_sentiment, format_signal_post, LedgerSink, SocialSink};

pub use report::{CycleEnd, CycleError, CycleReport, SignalReport, StepOutcome};

pub const DEFAULT_VISUAL_CONFIDENCE_THRESHOLD: f64 = 0.6;

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub tracked_assets: Vec<String>,
    /// A visual is requested only when confidence is strictly above this.
    pub visual_confidence_threshold: f64,
    /// Upper bound for social posts; the sink's own limit applies too.
    pub social_max_len: usize,
    /// Timeout for fetch, analysis and social calls.
    pub call_timeout: Duration,
    /// Timeout for a ledger write including its confirmation wait.
    pub ledger_timeout: Duration,
    pub seen_policy: SeenPolicy,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            tracked_assets: Vec::new(),
            visual_confidence_threshold: DEFAULT_VISUAL_CONFIDENCE_THRESHOLD,
            social_max_len: 280,
            call_timeout: Duration::from_secs(60),
            ledger_timeout: Duration::from_secs(180),
            seen_policy: SeenPolicy::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleState {
    Idle,
    Fetching,
    Analyzing,
    SignalGenerating,
    Publishing,
}

struct LedgerTarget {
    sink: Arc<dyn LedgerSink>,
    address: String,
}

pub struct CyclePipeline {
    source: Arc<dyn NewsSource>,
    analysis: Arc<dyn AnalysisAdapter>,
    store: Box<dyn DedupStore>,
    social: Option<Arc<dyn SocialSink>>,
    ledger: Option<LedgerTarget>,
    cfg: PipelineConfig,
    state: CycleState,
}

impl CyclePipeline {
    pub fn new(
        source: Arc<dyn NewsSource>,
        analysis: Arc<dyn AnalysisAdapter>,
        store: Box<dyn DedupStore>,
        cfg: PipelineConfig,
    ) -> Self {
        Self {
            source,
            analysis,
            store,
            social: None,
            ledger: None,
            cfg,
            state: CycleState::Idle,
        }
    }

    pub fn with_social(mut self, sink: Arc<dyn SocialSink>) -> Self {
        self.social = Some(sink);
        self
    }

    /// Ledger publication needs both a sink and a target address.
    pub fn with_ledger(mut self, sink: Arc<dyn LedgerSink>, target: impl Into<String>) -> Self {
        self.ledger = Some(LedgerTarget {
            sink,
            address: target.into(),
        });
        self
    }

    pub fn state(&self) -> CycleState {
        self.state
    }

    pub fn store(&self) -> &dyn DedupStore {
        self.store.as_ref()
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.cfg
    }

    fn enter(&mut self, next: CycleState) {
        debug!(from = ?self.state, to = ?next, "cycle state");
        self.state = next;
    }

    pub async fn run_cycle(&mut self) -> Result<CycleReport, CycleError> {
        crate::metrics::describe_metrics();
        counter!("cycle_runs_total").increment(1);
        let started = Instant::now();

        let out = self.run_stages().await;
        self.enter(CycleState::Idle);

        histogram!("cycle_duration_ms").record(started.elapsed().as_secs_f64() * 1000.0);
        gauge!("cycle_last_run_ts").set(chrono::Utc::now().timestamp() as f64);
        if let Ok(report) = &out {
            info!(
                end = %report.end,
                fetched = report.fetched,
                new = report.new_articles,
                skipped = report.skipped_duplicates,
                signals = report.signal_reports.len(),
                social_ok = report.published_social(),
                ledger_ok = report.published_ledger(),
                "cycle finished"
            );
        }
        out
    }

    async fn run_stages(&mut self) -> Result<CycleReport, CycleError> {
        let mut report = CycleReport::default();

        self.enter(CycleState::Fetching);
        let fetched = match with_timeout(self.cfg.call_timeout, self.source.fetch()).await {
            Ok(Ok(items)) => items,
            Ok(Err(e)) => {
                warn!(stage = "fetch", source = self.source.name(), error = ?e, "news fetch failed");
                report.end = CycleEnd::FetchFailed;
                return Ok(report);
            }
            Err(limit) => {
                warn!(stage = "fetch", source = self.source.name(), ?limit, "news fetch timed out");
                report.end = CycleEnd::FetchFailed;
                return Ok(report);
            }
        };
        report.fetched = fetched.len();

        let (fresh, skipped) = filter_unseen(fetched, self.store.as_ref());
        report.new_articles = fresh.len();
        report.skipped_duplicates = skipped;
        counter!("cycle_articles_new_total").increment(fresh.len() as u64);
        counter!("cycle_dedup_skipped_total").increment(skipped as u64);

        if fresh.is_empty() {
            info!(stage = "fetch", fetched = report.fetched, "no new articles");
            report.end = CycleEnd::NoNewArticles;
            return Ok(report);
        }
        if self.cfg.seen_policy == SeenPolicy::OnFetch {
            self.mark_all(&fresh);
        }

        self.enter(CycleState::Analyzing);
        let analyses = match self
            .analysis_call("sentiment", self.analysis.analyze_sentiment(&fresh))
            .await?
        {
            Ok(a) => a,
            Err(e) => {
                warn!(stage = "sentiment", articles = fresh.len(), error = %e, "sentiment analysis failed");
                report.sentiment = StepOutcome::failed(&e);
                report.end = CycleEnd::SentimentFailed;
                return Ok(report);
            }
        };
        if self.cfg.seen_policy == SeenPolicy::OnAnalysis {
            self.mark_all(&fresh);
        }
        counter!("cycle_analyses_total").increment(analyses.len() as u64);
        report.sentiment = StepOutcome::from_counts(analyses.len(), fresh.len());
        if analyses.len() < fresh.len() {
            debug!(
                stage = "sentiment",
                produced = analyses.len(),
                expected = fresh.len(),
                "partial sentiment batch"
            );
        }
        if analyses.is_empty() {
            info!(stage = "sentiment", "service returned no analyses");
            report.end = CycleEnd::NoAnalyses;
            return Ok(report);
        }

        self.enter(CycleState::SignalGenerating);
        let signals = match self
            .analysis_call(
                "signals",
                self.analysis
                    .generate_signals(&analyses, &self.cfg.tracked_assets),
            )
            .await?
        {
            Ok(s) => s,
            Err(e) => {
                warn!(stage = "signals", analyses = analyses.len(), error = %e, "signal generation failed");
                report.signals = StepOutcome::failed(&e);
                report.end = CycleEnd::SignalsFailed;
                return Ok(report);
            }
        };
        counter!("cycle_signals_total").increment(signals.len() as u64);
        report.signals = if self.cfg.tracked_assets.is_empty() {
            StepOutcome::Succeeded
        } else {
            StepOutcome::from_counts(signals.len(), self.cfg.tracked_assets.len())
        };
        if signals.is_empty() {
            info!(stage = "signals", "no signals generated");
            report.end = CycleEnd::NoSignals;
            return Ok(report);
        }

        self.enter(CycleState::Publishing);
        for signal in signals {
            let r = self.publish_signal(signal).await;
            report.signal_reports.push(r);
        }
        report.end = CycleEnd::Published;
        Ok(report)
    }

    fn mark_all(&mut self, articles: &[Article]) {
        for a in articles {
            self.store.mark_seen(&a.id);
        }
    }

    /// Runs a bulk analysis call under the call timeout. The outer `Result`
    /// carries only fatal errors; everything else is handed back for the
    /// caller to report.
    async fn analysis_call<T, F>(
        &self,
        stage: &'static str,
        fut: F,
    ) -> Result<Result<T, AnalysisError>, CycleError>
    where
        F: Future<Output = Result<T, AnalysisError>>,
    {
        let res = match with_timeout(self.cfg.call_timeout, fut).await {
            Ok(r) => r,
            Err(limit) => Err(AnalysisError::Timeout(limit)),
        };
        match res {
            Err(e) if e.is_fatal() => {
                tracing::error!(stage, error = %e, "fatal analysis error");
                Err(CycleError::Fatal { stage, source: e })
            }
            other => Ok(other),
        }
    }

    async fn publish_signal(&self, mut signal: TradingSignal) -> SignalReport {
        let asset = signal.cryptocurrency.clone();
        let mut r = SignalReport::new(&asset, signal.signal_type);
        debug!(
            stage = "publish",
            asset = %asset,
            signal = %signal.signal_type,
            confidence = signal.confidence,
            sentiment = signal.sentiment_score,
            "fan-out"
        );

        if signal.confidence > self.cfg.visual_confidence_threshold {
            let res = with_timeout(self.cfg.call_timeout, self.analysis.generate_visual(&signal)).await;
            r.visual = match res {
                Ok(Ok(Some(url))) => {
                    signal.image_url = Some(url);
                    StepOutcome::Succeeded
                }
                Ok(Ok(None)) => {
                    warn!(stage = "visual", asset = %asset, "no visual produced");
                    StepOutcome::failed("no image returned")
                }
                Ok(Err(e)) => {
                    warn!(stage = "visual", asset = %asset, error = %e, "visual generation failed");
                    StepOutcome::failed(e)
                }
                Err(limit) => {
                    warn!(stage = "visual", asset = %asset, ?limit, "visual generation timed out");
                    StepOutcome::failed(AnalysisError::Timeout(limit))
                }
            };
        }
        r.image_url = signal.image_url.clone();

        if let Some(sink) = &self.social {
            let max_len = self.cfg.social_max_len.min(sink.max_len());
            let text = format_signal_post(&signal, max_len);
            r.social = match with_timeout(
                self.cfg.call_timeout,
                sink.publish(&text, signal.image_url.as_deref()),
            )
            .await
            {
                Ok(Ok(())) => {
                    info!(stage = "social", sink = sink.name(), asset = %asset, chars = text.chars().count(), "posted");
                    StepOutcome::Succeeded
                }
                Ok(Err(e)) => {
                    warn!(stage = "social", sink = sink.name(), asset = %asset, error = %e, "social post failed");
                    StepOutcome::failed(e)
                }
                Err(limit) => {
                    warn!(stage = "social", sink = sink.name(), asset = %asset, ?limit, "social post timed out");
                    StepOutcome::failed(format!("timed out after {limit:?}"))
                }
            };
            count_sink(sink.name(), &r.social);
        }

        if let Some(ledger) = &self.ledger {
            r.ledger = match encode_sentiment(signal.sentiment_score) {
                Err(e) => {
                    warn!(stage = "ledger", asset = %asset, sentiment = signal.sentiment_score, error = %e, "cannot encode sentiment");
                    StepOutcome::failed(e)
                }
                Ok(encoded) => {
                    let fut = ledger.sink.record(
                        &ledger.address,
                        &asset,
                        encoded,
                        signal.timestamp.timestamp(),
                    );
                    match with_timeout(self.cfg.ledger_timeout, fut).await {
                        Ok(Ok(receipt)) => {
                            info!(
                                stage = "ledger",
                                sink = ledger.sink.name(),
                                asset = %asset,
                                encoded,
                                tx_hash = %receipt.tx_hash,
                                block = ?receipt.block_number,
                                "recorded"
                            );
                            r.receipt = Some(receipt);
                            StepOutcome::Succeeded
                        }
                        Ok(Err(e)) => {
                            warn!(stage = "ledger", sink = ledger.sink.name(), asset = %asset, error = %e, "ledger write failed");
                            StepOutcome::failed(e)
                        }
                        Err(limit) => {
                            warn!(stage = "ledger", sink = ledger.sink.name(), asset = %asset, ?limit, "ledger write timed out");
                            StepOutcome::failed(format!("timed out after {limit:?}"))
                        }
                    }
                }
            };
            count_sink(ledger.sink.name(), &r.ledger);
        }

        r
    }
}

/// `Err` carries the limit that was hit.
async fn with_timeout<F: Future>(limit: Duration, fut: F) -> Result<F::Output, Duration> {
    tokio::time::timeout(limit, fut).await.map_err(|_| limit)
}

fn count_sink(sink: &str, outcome: &StepOutcome) {
    counter!(
        "sink_publish_total",
        "sink" => sink.to_string(),
        "result" => outcome.metric_label()
    )
    .increment(1);
}

/// Anything the scheduler can drive one cycle at a time.
#[async_trait]
pub trait CycleRunner: Send {
    async fn run_cycle(&mut self) -> Result<CycleReport, CycleError>;
}

#[async_trait]
impl CycleRunner for CyclePipeline {
    async fn run_cycle(&mut self) -> Result<CycleReport, CycleError> {
        CyclePipeline::run_cycle(self).await
    }
}
