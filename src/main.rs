//! crypto-sentiment-agent binary entrypoint.
//! Loads configuration, wires the news source, analysis adapter and sinks into
//! a cycle pipeline, and drives it with the scheduler until stopped.

use anyhow::{anyhow, Context, Result};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use crypto_sentiment_agent::analyze::openai::OpenAiAdapter;
use crypto_sentiment_agent::cli::{Cli, USAGE};
use crypto_sentiment_agent::config::ai::AiConfig;
use crypto_sentiment_agent::config::AgentConfig;
use crypto_sentiment_agent::dedup::store_for_capacity;
use crypto_sentiment_agent::ingest::rss::RssNewsSource;
use crypto_sentiment_agent::metrics::Metrics;
use crypto_sentiment_agent::publish::discord::DiscordSink;
use crypto_sentiment_agent::publish::ledger_relay::LedgerRelayClient;
use crypto_sentiment_agent::publish::x::XSink;
use crypto_sentiment_agent::publish::SocialSink;
use crypto_sentiment_agent::{CyclePipeline, RunMode, Scheduler, StopHandle};

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let json = std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);
    if json {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env in local/dev; no-op when absent.
    let _ = dotenvy::dotenv();
    init_tracing();

    let cli = Cli::from_env()?;
    if cli.help {
        print!("{USAGE}");
        return Ok(());
    }

    let mut cfg = AgentConfig::from_env().context("loading agent configuration")?;
    if cli.network.is_some() {
        cfg.ledger.network = cli.network.clone();
    }
    if cli.contract_address.is_some() {
        cfg.ledger.contract_address = cli.contract_address.clone();
    }

    let relay = match &cfg.ledger.relay_url {
        Some(url) => Some(Arc::new(
            LedgerRelayClient::new(url, cfg.call_timeout)?
                .with_network(cfg.ledger.network.clone())
                .with_api_key(cfg.ledger.api_key.clone())
                .with_confirmation(cfg.ledger.confirm_timeout, std::time::Duration::from_secs(2)),
        )),
        None => None,
    };

    if cli.deploy_contract && !cli.should_deploy(cfg.ledger.contract_address.as_deref()) {
        tracing::warn!(
            address = cfg.ledger.contract_address.as_deref().unwrap_or_default(),
            "contract address already configured, skipping deploy"
        );
    }
    if cli.should_deploy(cfg.ledger.contract_address.as_deref()) {
        match &relay {
            Some(relay) => match relay.deploy(&cli.contract_name).await {
                Ok(address) => {
                    tracing::info!(%address, name = %cli.contract_name, "tracker contract deployed");
                    println!("{address}");
                    cfg.ledger.contract_address = Some(address);
                }
                // the agent still runs without ledger writes
                Err(e) => tracing::error!(error = %e, name = %cli.contract_name, "contract deploy failed"),
            },
            None => tracing::error!("--deploy-contract needs LEDGER_RELAY_URL, skipping deploy"),
        }
    }

    if let Some(asset) = &cli.history {
        let relay = relay
            .as_ref()
            .ok_or_else(|| anyhow!("--history needs LEDGER_RELAY_URL"))?;
        let target = cfg
            .ledger
            .contract_address
            .as_deref()
            .ok_or_else(|| anyhow!("--history needs CONTRACT_ADDRESS or --contract-address"))?;
        let records = relay
            .history(target, asset)
            .await
            .with_context(|| format!("reading history for {asset}"))?;
        for r in records {
            println!("{}\t{:+.2}", r.timestamp.to_rfc3339(), r.sentiment);
        }
        return Ok(());
    }

    let _metrics_task = match cfg.metrics_addr {
        Some(addr) => {
            let m = Metrics::init()?;
            Some(m.serve(addr).await?)
        }
        None => None,
    };

    let source = Arc::new(RssNewsSource::from_url(&cfg.feed_url, cfg.call_timeout)?);
    let ai_cfg = AiConfig::load_default().context("loading AI config")?;
    let analysis = Arc::new(OpenAiAdapter::new(&ai_cfg, cfg.call_timeout)?);

    let mut pipeline = CyclePipeline::new(
        source,
        analysis,
        store_for_capacity(cfg.dedup_capacity),
        cfg.pipeline_config(),
    );

    if cli.no_social {
        tracing::info!("social publication disabled by flag");
    } else if let Some(sink) = social_sink(&cfg)? {
        tracing::info!(sink = sink.name(), "social publication enabled");
        pipeline = pipeline.with_social(sink);
    } else {
        tracing::info!("no social sink configured");
    }

    match (&relay, &cfg.ledger.contract_address) {
        _ if cli.no_ledger => tracing::info!("ledger publication disabled by flag"),
        (Some(relay), Some(target)) => {
            tracing::info!(%target, "ledger publication enabled");
            pipeline = pipeline.with_ledger(relay.clone(), target.clone());
        }
        (Some(_), None) => {
            tracing::warn!("LEDGER_RELAY_URL set without a contract address; ledger disabled")
        }
        (None, _) => tracing::info!("no ledger sink configured"),
    }

    let mode = if cli.run_once {
        RunMode::Once
    } else {
        RunMode::Every(cfg.polling_interval)
    };
    let (mut scheduler, stop) = Scheduler::new(mode);
    spawn_signal_listener(stop)?;

    tracing::info!(
        feed = %cfg.feed_url,
        ?mode,
        assets = cfg.tracked_assets.len(),
        seen_policy = ?cfg.seen_policy,
        "agent starting"
    );
    let cycles = scheduler.run(&mut pipeline).await?;
    tracing::info!(cycles, "agent stopped");
    Ok(())
}

fn social_sink(cfg: &AgentConfig) -> Result<Option<Arc<dyn SocialSink>>> {
    if let Some(token) = &cfg.social.x_access_token {
        let sink = XSink::new(token.clone(), cfg.call_timeout)?.with_max_len(cfg.social_max_len);
        return Ok(Some(Arc::new(sink)));
    }
    if let Some(url) = &cfg.social.discord_webhook_url {
        let sink = DiscordSink::new(url.clone()).with_timeout(cfg.call_timeout.as_secs().max(1));
        return Ok(Some(Arc::new(sink)));
    }
    Ok(None)
}

/// SIGINT / SIGTERM request a stop at the next cycle boundary.
#[cfg(unix)]
fn spawn_signal_listener(stop: StopHandle) -> Result<()> {
    use tokio::signal::unix::{signal, SignalKind};
    let mut sigterm = signal(SignalKind::terminate())?;
    tokio::spawn(async move {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => tracing::info!("Received SIGINT"),
            _ = sigterm.recv() => tracing::info!("Received SIGTERM"),
        }
        stop.stop();
    });
    Ok(())
}

#[cfg(not(unix))]
fn spawn_signal_listener(stop: StopHandle) -> Result<()> {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Received Ctrl-C");
        }
        stop.stop();
    });
    Ok(())
}
