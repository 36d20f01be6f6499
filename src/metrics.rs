use anyhow::{Context, Result};
use axum::{routing::get, Router};
use metrics::{describe_counter, describe_gauge};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use once_cell::sync::OnceCell;

pub struct Metrics {
    pub handle: PrometheusHandle,
}

/// One-time metric descriptions (so series show up on /metrics with help text).
pub fn describe_all() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!(
            "calendar_fetch_errors_total",
            "Calendar source fetches that ended as SourceUnavailable."
        );
        describe_counter!(
            "calendar_rows_malformed_total",
            "Rows skipped because their time text could not be parsed."
        );
        describe_counter!("alarms_fired_total", "Lead-time alarms sent.");
        describe_counter!("digests_sent_total", "Daily digests composed and sent.");
        describe_counter!(
            "scheduler_job_failures_total",
            "Job runs that returned an error (skipped for that tick)."
        );
        describe_counter!("notify_failures_total", "Failed deliveries per channel.");
        describe_gauge!("scheduler_last_tick_ts", "Unix ts of the last job dispatch.");
    });
}

impl Metrics {
    /// Install the Prometheus recorder. Fails if another recorder is already installed.
    pub fn init() -> Result<Self> {
        let handle = PrometheusBuilder::new()
            .install_recorder()
            .context("prometheus: install recorder")?;
        describe_all();
        Ok(Self { handle })
    }

    /// `/metrics` in the Prometheus exposition format, plus `/healthz`.
    pub fn router(&self) -> Router {
        router_for(self.handle.clone())
    }
}

pub fn router_for(handle: PrometheusHandle) -> Router {
    Router::new()
        .route(
            "/metrics",
            get(move || {
                let h = handle.clone();
                async move { h.render() }
            }),
        )
        .route("/healthz", get(|| async { "ok" }))
}

/// Serve `router` on `addr` in the background.
pub async fn serve(addr: &str, router: Router) -> Result<tokio::task::JoinHandle<()>> {
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding metrics listener on {addr}"))?;
    tracing::info!(target: "metrics", %addr, "metrics endpoint up");
    Ok(tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, router).await {
            tracing::warn!(target: "metrics", error = ?e, "metrics server stopped");
        }
    }))
}
