//! Economic calendar notifier: worker entrypoint.
//! Loads config, wires the calendar source and notification channels, and runs the
//! digest + alarm scheduler until ctrl-c.

use std::sync::Arc;

use anyhow::Result;
use econ_calendar_alerts::calendar::providers::TradingEconomicsProvider;
use econ_calendar_alerts::engine::{build_default_scheduler, JobContext};
use econ_calendar_alerts::metrics::{self, Metrics};
use econ_calendar_alerts::{AppConfig, NotifierMux};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// `LOG_FORMAT=json` switches to JSON lines; default is compact text.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let json = std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(fmt::layer().json()).init();
    } else {
        registry.with(fmt::layer().compact()).init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env in local/dev; no-op when absent.
    let _ = dotenvy::dotenv();
    init_tracing();

    let cfg = AppConfig::load_default()?;
    tracing::info!(
        tz = %cfg.timezone,
        digest_time = %cfg.digest_time,
        lead_min = cfg.lead_time.num_minutes(),
        interval_secs = cfg.check_interval.as_secs(),
        regions = ?cfg.regions,
        "config loaded"
    );

    if let Some(addr) = cfg.metrics_addr.as_deref() {
        let m = Metrics::init()?;
        let _server = metrics::serve(addr, m.router()).await?;
    }

    let notifier = NotifierMux::from_env();
    if notifier.is_empty() {
        tracing::warn!("no notification channel configured; messages will only be logged");
    }

    let source = TradingEconomicsProvider::from_api(&cfg.api_base_url, &cfg.api_key, cfg.regions.clone())?;
    let ctx = Arc::new(JobContext {
        source: Arc::new(source),
        notifier,
        retry: cfg.retry,
        regions: cfg.regions.clone(),
    });

    let scheduler = build_default_scheduler(&cfg, ctx);
    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = ?e, "ctrl-c handler failed");
            std::future::pending::<()>().await;
        }
        tracing::info!("shutdown requested");
    };
    scheduler.run_until(shutdown).await;
    Ok(())
}
