// tests/metrics_http.rs
use std::sync::Arc;

use axum::body::{self, Body};
use http::{Request, StatusCode};
use chrono::{TimeZone, Utc};
use chrono_tz::Europe::Berlin;
use econ_calendar_alerts::calendar::providers::StaticSource;
use econ_calendar_alerts::calendar::RetryPolicy;
use econ_calendar_alerts::engine::{build_scheduler, JobContext};
use econ_calendar_alerts::metrics::Metrics;
use econ_calendar_alerts::scheduler::ManualClock;
use econ_calendar_alerts::{AppConfig, NotifierMux};
use tower::ServiceExt;

const BODY_LIMIT: usize = 1024 * 1024;

// One test per process: the recorder is global.
#[tokio::test]
async fn metrics_endpoint_exposes_scheduler_series() {
    let m = Metrics::init().expect("install recorder");

    let clock = Arc::new(ManualClock::new(
        Berlin
            .with_ymd_and_hms(2025, 3, 12, 7, 59, 0)
            .unwrap()
            .with_timezone(&Utc),
    ));
    let ctx = Arc::new(JobContext {
        source: Arc::new(StaticSource::failing()),
        notifier: NotifierMux::default(),
        retry: RetryPolicy::default(),
        regions: vec![],
    });
    let mut sched = build_scheduler(&AppConfig::default(), ctx, clock.clone());
    sched.run_due().await;
    clock.advance(chrono::Duration::minutes(1));
    sched.run_due().await;

    let app = m.router();
    let resp = app
        .clone()
        .oneshot(Request::get("/metrics").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let bytes = body::to_bytes(resp.into_body(), BODY_LIMIT).await.unwrap();
    let text = String::from_utf8(bytes.to_vec()).unwrap();

    for needle in [
        "calendar_fetch_errors_total",
        "digests_sent_total",
        "scheduler_last_tick_ts",
    ] {
        assert!(text.contains(needle), "missing {needle} in:\n{text}");
    }

    let resp = app
        .oneshot(Request::get("/healthz").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
}
