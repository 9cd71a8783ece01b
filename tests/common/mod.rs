// tests/common/mod.rs
// In-memory fakes for the pipeline's external services.
#![allow(dead_code)]

use async_trait::async_trait;
use parking_lot::Mutex;
use std::time::Duration;

use crypto_sentiment_agent::analyze::{AnalysisAdapter, AnalysisError};
use crypto_sentiment_agent::ingest::NewsSource;
use crypto_sentiment_agent::model::{Article, SentimentAnalysis, SignalType, TradingSignal};
use crypto_sentiment_agent::publish::{LedgerReceipt, LedgerSink, SinkError, SocialSink};

pub fn article(id: &str) -> Article {
    Article::new(id, format!("Headline {id}"))
        .with_summary("Markets moved.")
        .with_source("TestWire")
}

pub fn signal(asset: &str, kind: SignalType, confidence: f64, sentiment: f64) -> TradingSignal {
    TradingSignal::new(asset, kind, confidence, sentiment).with_reasoning(format!("{asset} news flow"))
}

/// Returns whatever is queued; an `Err` entry simulates a failing fetch.
#[derive(Default)]
pub struct FakeSource {
    pub batch: Mutex<Vec<Article>>,
    pub fail: Mutex<bool>,
    pub calls: Mutex<u32>,
}

impl FakeSource {
    pub fn with(articles: Vec<Article>) -> Self {
        let s = Self::default();
        *s.batch.lock() = articles;
        s
    }
}

#[async_trait]
impl NewsSource for FakeSource {
    async fn fetch(&self) -> anyhow::Result<Vec<Article>> {
        *self.calls.lock() += 1;
        if *self.fail.lock() {
            anyhow::bail!("feed unreachable");
        }
        Ok(self.batch.lock().clone())
    }

    fn name(&self) -> &str {
        "fake-source"
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum Failure {
    #[default]
    None,
    Server,
    Unauthorized,
}

impl Failure {
    fn err(self) -> Option<AnalysisError> {
        match self {
            Failure::None => None,
            Failure::Server => Some(AnalysisError::Status {
                status: 500,
                body: "boom".into(),
            }),
            Failure::Unauthorized => Some(AnalysisError::Unauthorized(401)),
        }
    }
}

/// Analyses every article it gets (optionally only the first `limit`), and
/// returns a fixed list of signals.
#[derive(Default)]
pub struct FakeAnalysis {
    pub sentiment_failure: Mutex<Failure>,
    pub signals_failure: Mutex<Failure>,
    pub limit: Mutex<Option<usize>>,
    pub signals: Mutex<Vec<TradingSignal>>,
    pub visual_fails: Mutex<bool>,

    pub analyzed_ids: Mutex<Vec<String>>,
    pub signal_calls: Mutex<u32>,
    pub visual_calls: Mutex<Vec<String>>,
}

impl FakeAnalysis {
    pub fn with_signals(signals: Vec<TradingSignal>) -> Self {
        let a = Self::default();
        *a.signals.lock() = signals;
        a
    }
}

#[async_trait]
impl AnalysisAdapter for FakeAnalysis {
    async fn analyze_sentiment(
        &self,
        articles: &[Article],
    ) -> Result<Vec<SentimentAnalysis>, AnalysisError> {
        self.analyzed_ids
            .lock()
            .extend(articles.iter().map(|a| a.id.clone()));
        if let Some(e) = self.sentiment_failure.lock().err() {
            return Err(e);
        }
        let take = self.limit.lock().unwrap_or(articles.len());
        Ok(articles
            .iter()
            .take(take)
            .map(|a| SentimentAnalysis::new(&a.title, &a.source, 0.4, 0.8).with_entities(["Bitcoin"]))
            .collect())
    }

    async fn generate_signals(
        &self,
        _analyses: &[SentimentAnalysis],
        _tracked_assets: &[String],
    ) -> Result<Vec<TradingSignal>, AnalysisError> {
        *self.signal_calls.lock() += 1;
        if let Some(e) = self.signals_failure.lock().err() {
            return Err(e);
        }
        Ok(self.signals.lock().clone())
    }

    async fn generate_visual(&self, signal: &TradingSignal) -> Result<Option<String>, AnalysisError> {
        self.visual_calls.lock().push(signal.cryptocurrency.clone());
        if *self.visual_fails.lock() {
            return Err(AnalysisError::Decode("no image".into()));
        }
        Ok(Some(format!("https://img.test/{}.png", signal.cryptocurrency)))
    }

    fn name(&self) -> &str {
        "fake-analysis"
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Post {
    pub text: String,
    pub image_url: Option<String>,
}

pub struct FakeSocial {
    pub max_len: usize,
    /// Outcome script for successive calls, `true` = fail; calls past the end succeed.
    pub fail_on: Mutex<Vec<bool>>,
    pub delay: Mutex<Option<Duration>>,
    pub posts: Mutex<Vec<Post>>,
}

impl FakeSocial {
    pub fn new(max_len: usize) -> Self {
        Self {
            max_len,
            fail_on: Mutex::new(Vec::new()),
            delay: Mutex::new(None),
            posts: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl SocialSink for FakeSocial {
    async fn publish(&self, text: &str, image_url: Option<&str>) -> Result<(), SinkError> {
        let delay = *self.delay.lock();
        if let Some(d) = delay {
            tokio::time::sleep(d).await;
        }
        self.posts.lock().push(Post {
            text: text.to_string(),
            image_url: image_url.map(str::to_string),
        });
        let fail = {
            let mut script = self.fail_on.lock();
            !script.is_empty() && script.remove(0)
        };
        if fail {
            return Err(SinkError::Rejected("duplicate content".into()));
        }
        Ok(())
    }

    fn max_len(&self) -> usize {
        self.max_len
    }

    fn name(&self) -> &str {
        "fake-social"
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    pub target: String,
    pub asset: String,
    pub encoded: i32,
    pub ts: i64,
}

#[derive(Default)]
pub struct FakeLedger {
    pub fail: Mutex<bool>,
    pub records: Mutex<Vec<Record>>,
}

#[async_trait]
impl LedgerSink for FakeLedger {
    async fn record(
        &self,
        target: &str,
        asset: &str,
        encoded_sentiment: i32,
        unix_timestamp: i64,
    ) -> Result<LedgerReceipt, SinkError> {
        self.records.lock().push(Record {
            target: target.to_string(),
            asset: asset.to_string(),
            encoded: encoded_sentiment,
            ts: unix_timestamp,
        });
        if *self.fail.lock() {
            return Err(SinkError::Rejected("reverted".into()));
        }
        let n = self.records.lock().len();
        Ok(LedgerReceipt {
            tx_hash: format!("0x{n:04x}"),
            block_number: Some(100 + n as u64),
        })
    }

    fn name(&self) -> &str {
        "fake-ledger"
    }
}
