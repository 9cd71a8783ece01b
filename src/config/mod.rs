// src/config/mod.rs
//! Process configuration, read from the environment (after `.env`).

pub mod ai;
pub mod assets;

use anyhow::{anyhow, Context, Result};
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

use crate::dedup::SeenPolicy;
use crate::pipeline::{PipelineConfig, DEFAULT_VISUAL_CONFIDENCE_THRESHOLD};

pub const DEFAULT_FEED_URL: &str = "https://cointelegraph.com/rss";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SocialConfig {
    /// OAuth 2.0 user token for X. Takes precedence over Discord.
    pub x_access_token: Option<String>,
    pub discord_webhook_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerConfig {
    pub relay_url: Option<String>,
    pub api_key: Option<String>,
    pub contract_address: Option<String>,
    pub network: Option<String>,
    pub confirm_timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct AgentConfig {
    pub feed_url: String,
    pub polling_interval: Duration,
    pub visual_confidence_threshold: f64,
    pub social_max_len: usize,
    pub call_timeout: Duration,
    pub ledger_timeout: Duration,
    /// 0 keeps every id for the life of the process.
    pub dedup_capacity: usize,
    pub seen_policy: SeenPolicy,
    pub tracked_assets: Vec<String>,
    pub social: SocialConfig,
    pub ledger: LedgerConfig,
    pub metrics_addr: Option<SocketAddr>,
}

impl AgentConfig {
    /// Reads the process environment; tracked assets come from
    /// [`assets::load_assets_default`].
    pub fn from_env() -> Result<Self> {
        let mut cfg = Self::from_lookup(|k| std::env::var(k).ok())?;
        cfg.tracked_assets = assets::load_assets_default()?;
        Ok(cfg)
    }

    /// Builds the config from any key lookup. Tracked assets are left at the
    /// built-in list.
    pub fn from_lookup<F>(get: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |k: &str| get(k).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let polling_secs: u64 = parse_or(&get, "POLLING_INTERVAL_SECS", 3600)?;
        if polling_secs == 0 {
            return Err(anyhow!("POLLING_INTERVAL_SECS must be positive"));
        }
        let threshold: f64 = parse_or(
            &get,
            "VISUAL_CONFIDENCE_THRESHOLD",
            DEFAULT_VISUAL_CONFIDENCE_THRESHOLD,
        )?;
        if !(0.0..=1.0).contains(&threshold) {
            return Err(anyhow!(
                "VISUAL_CONFIDENCE_THRESHOLD must be within 0..=1, got {threshold}"
            ));
        }
        let social_max_len: usize = parse_or(&get, "SOCIAL_MAX_LEN", 280)?;
        if social_max_len < 16 {
            return Err(anyhow!("SOCIAL_MAX_LEN too small: {social_max_len}"));
        }

        Ok(Self {
            feed_url: get("FEED_URL").unwrap_or_else(|| DEFAULT_FEED_URL.to_string()),
            polling_interval: Duration::from_secs(polling_secs),
            visual_confidence_threshold: threshold,
            social_max_len,
            call_timeout: Duration::from_secs(parse_or(&get, "CALL_TIMEOUT_SECS", 60)?),
            ledger_timeout: Duration::from_secs(parse_or(&get, "LEDGER_TIMEOUT_SECS", 180)?),
            dedup_capacity: parse_or(&get, "DEDUP_CAPACITY", 0)?,
            seen_policy: parse_or(&get, "SEEN_POLICY", SeenPolicy::default())?,
            tracked_assets: assets::DEFAULT_TRACKED_ASSETS
                .iter()
                .map(|s| s.to_string())
                .collect(),
            social: SocialConfig {
                x_access_token: get("X_ACCESS_TOKEN"),
                discord_webhook_url: get("DISCORD_WEBHOOK_URL"),
            },
            ledger: LedgerConfig {
                relay_url: get("LEDGER_RELAY_URL"),
                api_key: get("LEDGER_API_KEY"),
                contract_address: get("CONTRACT_ADDRESS"),
                network: get("LEDGER_NETWORK"),
                confirm_timeout: Duration::from_secs(parse_or(&get, "LEDGER_CONFIRM_TIMEOUT_SECS", 120)?),
            },
            metrics_addr: get("METRICS_ADDR")
                .map(|a| a.parse().with_context(|| format!("METRICS_ADDR={a}")))
                .transpose()?,
        })
    }

    pub fn pipeline_config(&self) -> PipelineConfig {
        PipelineConfig {
            tracked_assets: self.tracked_assets.clone(),
            visual_confidence_threshold: self.visual_confidence_threshold,
            social_max_len: self.social_max_len,
            call_timeout: self.call_timeout,
            ledger_timeout: self.ledger_timeout,
            seen_policy: self.seen_policy,
        }
    }
}

fn parse_or<T, G>(get: &G, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    G: Fn(&str) -> Option<String>,
{
    match get(key) {
        None => Ok(default),
        Some(raw) => raw
            .parse::<T>()
            .map_err(|e| anyhow!("invalid {key}={raw}: {e}")),
    }
}
