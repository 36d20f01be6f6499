// tests/engine_day.rs
//
// Two simulated days, one tick per minute, through the real jobs.

use std::sync::Arc;

use chrono::{DateTime, Duration as ChronoDuration, TimeZone, Utc};
use chrono_tz::Europe::Berlin;
use econ_calendar_alerts::calendar::providers::StaticSource;
use econ_calendar_alerts::calendar::RetryPolicy;
use econ_calendar_alerts::engine::{build_scheduler, JobContext};
use econ_calendar_alerts::notify::MemoryNotifier;
use econ_calendar_alerts::scheduler::ManualClock;
use econ_calendar_alerts::{AppConfig, Notification, Notifier, NotifierMux, RawEventRow};

fn berlin(d: u32, h: u32, m: u32) -> DateTime<Utc> {
    Berlin
        .with_ymd_and_hms(2025, 3, d, h, m, 0)
        .unwrap()
        .with_timezone(&Utc)
}

fn row(time: &str, region: &str, impact: Option<u32>, name: &str) -> RawEventRow {
    RawEventRow {
        time: Some(time.into()),
        currency: Some(if region == "Germany" { "EUR" } else { "USD" }.into()),
        region: Some(region.into()),
        impact_indicators: impact,
        name: Some(name.into()),
    }
}

fn calendar() -> Vec<RawEventRow> {
    vec![
        row("09:00", "Germany", Some(3), "ZEW Economic Sentiment"),
        row("10:00", "Germany", Some(3), "CPI"),
        row("10:00", "Germany", Some(2), "PPI"),
        row("All Day", "United States", Some(3), "Bank Holiday"),
        row("9:61", "United States", Some(3), "Garbled"),
        row("10:00", "United States", None, "Speech"),
    ]
}

fn alarm_names(sent: &[Notification]) -> Vec<String> {
    sent.iter()
        .filter_map(|n| match n {
            Notification::Alarm(a) => Some(a.event_name.clone()),
            _ => None,
        })
        .collect()
}

async fn tick_until(
    sched: &mut econ_calendar_alerts::Scheduler<econ_calendar_alerts::AlertDeduplicator>,
    clock: &ManualClock,
    from: DateTime<Utc>,
    to: DateTime<Utc>,
) {
    let mut t = from;
    while t <= to {
        clock.set(t);
        sched.run_due().await;
        t += ChronoDuration::minutes(1);
    }
}

#[tokio::test]
async fn digest_once_and_each_alarm_once_per_day() {
    let clock = Arc::new(ManualClock::new(berlin(12, 7, 59)));
    let source = Arc::new(StaticSource::new(calendar()));
    let sink = Arc::new(MemoryNotifier::new());
    let sinks: Vec<Arc<dyn Notifier>> = vec![sink.clone()];
    let ctx = Arc::new(JobContext {
        source: source.clone(),
        notifier: NotifierMux::new(sinks),
        retry: RetryPolicy::default(),
        regions: vec!["Germany".into(), "United States".into(), "Japan".into()],
    });
    let mut sched = build_scheduler(&AppConfig::default(), ctx, clock.clone());

    // Day 1: 07:59 .. 10:05
    tick_until(&mut sched, &clock, berlin(12, 7, 59), berlin(12, 10, 5)).await;

    let sent = sink.sent();
    let digests: Vec<_> = sent
        .iter()
        .filter_map(|n| match n {
            Notification::Digest(d) => Some(d.clone()),
            _ => None,
        })
        .collect();
    assert_eq!(digests.len(), 1);
    let d = &digests[0];
    assert_eq!(d.sections.len(), 2);
    assert_eq!(d.sections[0].region, "Germany");
    assert_eq!(d.sections[0].events.len(), 3);
    // The garbled row is gone; the all-day one is listed.
    assert_eq!(d.sections[1].events.len(), 2);
    assert_eq!(d.missing_regions, vec!["Japan".to_string()]);

    assert_eq!(
        alarm_names(&sent),
        vec!["ZEW Economic Sentiment".to_string(), "CPI".to_string()]
    );
    assert!(matches!(sent[0], Notification::Digest(_)));

    // Day 2: long gap, then the morning again. Missed ticks are not replayed.
    sink.clear();
    tick_until(&mut sched, &clock, berlin(13, 7, 59), berlin(13, 9, 50)).await;
    let sent = sink.sent();
    assert!(matches!(sent[0], Notification::Digest(_)));
    assert_eq!(
        alarm_names(&sent),
        vec!["ZEW Economic Sentiment".to_string(), "CPI".to_string()]
    );
    assert_eq!(
        sched.state().state().day_stamp(),
        Some(chrono::NaiveDate::from_ymd_opt(2025, 3, 13).unwrap())
    );
}

#[tokio::test]
async fn long_check_interval_keeps_the_configured_lead() {
    use econ_calendar_alerts::config::RawConfig;

    let raw = RawConfig {
        lead_time_minutes: Some(15),
        check_interval_secs: Some(1800),
        ..Default::default()
    };
    let cfg = AppConfig::from_raw(raw, |_| None).unwrap();

    let clock = Arc::new(ManualClock::new(berlin(12, 9, 32)));
    let source = Arc::new(StaticSource::new(vec![row(
        "10:00",
        "Germany",
        Some(3),
        "CPI",
    )]));
    let sink = Arc::new(MemoryNotifier::new());
    let sinks: Vec<Arc<dyn Notifier>> = vec![sink.clone()];
    let ctx = Arc::new(JobContext {
        source,
        notifier: NotifierMux::new(sinks),
        retry: RetryPolicy::default(),
        regions: vec!["Germany".into()],
    });
    let mut sched = build_scheduler(&cfg, ctx, clock.clone());
    assert_eq!(sched.state().window().lead, ChronoDuration::minutes(15));

    // 28 minutes out: too early for a 15-minute lead.
    sched.run_due().await;
    assert!(alarm_names(&sink.sent()).is_empty());

    clock.set(berlin(12, 9, 45));
    sched.run_due().await;
    assert_eq!(alarm_names(&sink.sent()), vec!["CPI".to_string()]);
}
