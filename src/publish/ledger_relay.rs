// src/publish/ledger_relay.rs
//! Ledger sink backed by an HTTP relay that owns the signing key and talks to
//! the chain. The relay submits a sentiment record, reports transaction status,
//! deploys tracker contracts and serves their history.

use anyhow::Context;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::encoding::decode_sentiment;
use super::{status_error, LedgerReceipt, LedgerSink, SinkError};

pub struct LedgerRelayClient {
    http: reqwest::Client,
    base_url: String,
    network: Option<String>,
    api_key: Option<String>,
    confirm_timeout: Duration,
    poll_interval: Duration,
}

#[derive(Serialize)]
struct RecordReq<'a> {
    contract: &'a str,
    cryptocurrency: &'a str,
    sentiment: i32,
    timestamp: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    network: Option<&'a str>,
}

#[derive(Deserialize)]
struct Submitted {
    tx_hash: String,
}

#[derive(Debug, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
enum TxState {
    Pending,
    Confirmed,
    Failed,
}

#[derive(Deserialize)]
struct TxStatus {
    status: TxState,
    #[serde(default)]
    block_number: Option<u64>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Serialize)]
struct DeployReq<'a> {
    name: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    network: Option<&'a str>,
}

#[derive(Deserialize)]
struct Deployed {
    address: String,
}

#[derive(Deserialize)]
struct RawRecord {
    sentiment: i32,
    timestamp: i64,
}

/// One stored entry, decoded back to a float score.
#[derive(Debug, Clone, PartialEq)]
pub struct SentimentRecord {
    pub sentiment: f64,
    pub timestamp: DateTime<Utc>,
}

impl LedgerRelayClient {
    pub fn new(base_url: impl Into<String>, request_timeout: Duration) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent("crypto-sentiment-agent/0.1")
            .connect_timeout(Duration::from_secs(5))
            .timeout(request_timeout)
            .build()
            .context("building ledger relay client")?;
        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            network: None,
            api_key: None,
            confirm_timeout: Duration::from_secs(120),
            poll_interval: Duration::from_secs(2),
        })
    }

    pub fn with_network(mut self, network: Option<String>) -> Self {
        self.network = network;
        self
    }

    pub fn with_api_key(mut self, key: Option<String>) -> Self {
        self.api_key = key;
        self
    }

    pub fn with_confirmation(mut self, timeout: Duration, poll_interval: Duration) -> Self {
        self.confirm_timeout = timeout;
        self.poll_interval = poll_interval;
        self
    }

    fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        let rb = self.http.request(method, format!("{}{}", self.base_url, path));
        match &self.api_key {
            Some(k) => rb.bearer_auth(k),
            None => rb,
        }
    }

    async fn send_json<T: serde::de::DeserializeOwned>(
        rb: reqwest::RequestBuilder,
    ) -> Result<T, SinkError> {
        let rsp = rb.send().await?;
        let status = rsp.status();
        if !status.is_success() {
            let body = rsp.text().await.unwrap_or_default();
            return Err(status_error(status, body));
        }
        Ok(rsp.json::<T>().await?)
    }

    /// Polls the relay until the transaction is final or the deadline passes.
    async fn wait_for_confirmation(&self, tx_hash: &str) -> Result<LedgerReceipt, SinkError> {
        let deadline = tokio::time::Instant::now() + self.confirm_timeout;
        loop {
            let st: TxStatus =
                Self::send_json(self.request(reqwest::Method::GET, &format!("/tx/{tx_hash}"))).await?;
            match st.status {
                TxState::Confirmed => {
                    return Ok(LedgerReceipt {
                        tx_hash: tx_hash.to_string(),
                        block_number: st.block_number,
                    })
                }
                TxState::Failed => {
                    return Err(SinkError::Rejected(
                        st.error.unwrap_or_else(|| format!("transaction {tx_hash} failed")),
                    ))
                }
                TxState::Pending => {}
            }
            if tokio::time::Instant::now() + self.poll_interval > deadline {
                return Err(SinkError::Timeout(self.confirm_timeout));
            }
            tokio::time::sleep(self.poll_interval).await;
        }
    }

    /// Deploys a new tracker contract and returns its address.
    pub async fn deploy(&self, name: &str) -> Result<String, SinkError> {
        let req = DeployReq {
            name,
            network: self.network.as_deref(),
        };
        let out: Deployed =
            Self::send_json(self.request(reqwest::Method::POST, "/contracts").json(&req)).await?;
        Ok(out.address)
    }

    /// Recorded history for one asset, oldest first as served by the relay.
    pub async fn history(&self, target: &str, asset: &str) -> Result<Vec<SentimentRecord>, SinkError> {
        let raw: Vec<RawRecord> = Self::send_json(
            self.request(reqwest::Method::GET, &format!("/contracts/{target}/sentiment"))
                .query(&[("cryptocurrency", asset)]),
        )
        .await?;
        Ok(raw
            .into_iter()
            .filter_map(|r| match DateTime::from_timestamp(r.timestamp, 0) {
                Some(timestamp) => Some(SentimentRecord {
                    sentiment: decode_sentiment(r.sentiment),
                    timestamp,
                }),
                None => {
                    tracing::warn!(asset, timestamp = r.timestamp, "skipping record with out-of-range timestamp");
                    None
                }
            })
            .collect())
    }
}

#[async_trait]
impl LedgerSink for LedgerRelayClient {
    async fn record(
        &self,
        target: &str,
        asset: &str,
        encoded_sentiment: i32,
        unix_timestamp: i64,
    ) -> Result<LedgerReceipt, SinkError> {
        let req = RecordReq {
            contract: target,
            cryptocurrency: asset,
            sentiment: encoded_sentiment,
            timestamp: unix_timestamp,
            network: self.network.as_deref(),
        };
        let sub: Submitted =
            Self::send_json(self.request(reqwest::Method::POST, "/sentiment").json(&req)).await?;
        tracing::debug!(tx_hash = %sub.tx_hash, asset, "ledger write submitted");
        self.wait_for_confirmation(&sub.tx_hash).await
    }

    fn name(&self) -> &str {
        "ledger-relay"
    }
}
