use anyhow::Context;
use axum::{routing::get, Router};
use metrics::{describe_counter, describe_gauge, describe_histogram, Unit};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use once_cell::sync::OnceCell;
use std::net::SocketAddr;

/// Registers descriptions for every series the agent emits. Idempotent.
pub fn describe_metrics() {
    static DESCRIBED: OnceCell<()> = OnceCell::new();
    DESCRIBED.get_or_init(|| {
        describe_counter!("cycle_runs_total", "Cycles started");
        describe_counter!("cycle_articles_new_total", "Articles that survived dedup");
        describe_counter!("cycle_dedup_skipped_total", "Articles dropped as already seen");
        describe_counter!("cycle_analyses_total", "Sentiment analyses returned");
        describe_counter!("cycle_signals_total", "Trading signals generated");
        describe_counter!(
            "sink_publish_total",
            "Publication attempts per sink, labelled by result"
        );
        describe_histogram!("cycle_duration_ms", Unit::Milliseconds, "Wall time of one cycle");
        describe_gauge!("cycle_last_run_ts", Unit::Seconds, "Unix time the last cycle ended");
        describe_gauge!("scheduler_cycles_completed", "Cycles completed since start");
        describe_counter!("ingest_events_total", "RSS items parsed");
        describe_histogram!("ingest_parse_ms", Unit::Milliseconds, "RSS parse time");
    });
}

pub struct Metrics {
    pub handle: PrometheusHandle,
}

impl Metrics {
    /// Installs the global Prometheus recorder. Fails if one is already set.
    pub fn init() -> anyhow::Result<Self> {
        let handle = PrometheusBuilder::new()
            .install_recorder()
            .context("prometheus: install recorder")?;
        describe_metrics();
        Ok(Self { handle })
    }

    /// `/metrics` in the Prometheus exposition format, plus `/health`.
    pub fn router(&self) -> Router {
        let handle = self.handle.clone();
        Router::new()
            .route(
                "/metrics",
                get(move || {
                    let h = handle.clone();
                    async move { h.render() }
                }),
            )
            .route("/health", get(|| async { "ok" }))
    }

    /// Serves [`Metrics::router`] on `addr` in a background task.
    pub async fn serve(&self, addr: SocketAddr) -> anyhow::Result<tokio::task::JoinHandle<()>> {
        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .with_context(|| format!("binding metrics listener on {addr}"))?;
        let app = self.router();
        tracing::info!(%addr, "metrics endpoint listening");
        Ok(tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app).await {
                tracing::error!(error = %e, "metrics server stopped");
            }
        }))
    }
}
