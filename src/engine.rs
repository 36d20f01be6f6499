//! # Engine
//! The two recurring jobs and the wiring that puts them on one [`Scheduler`].
//!
//! - [`DailyDigestJob`]: resets alarm state, fetches, composes and sends the digest.
//! - [`AlarmCheckJob`]: fetches and fires lead-time alarms for high-impact events.
//!
//! Both run against the [`AlertDeduplicator`] owned by the scheduler.

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration};
use chrono_tz::Tz;
use metrics::counter;

use crate::alarm::AlertDeduplicator;
use crate::calendar::{fetch_events, CalendarSource, Event, EventTime, RetryPolicy};
use crate::config::AppConfig;
use crate::digest;
use crate::notify::{AlarmMessage, Notification, NotifierMux};
use crate::scheduler::{Clock, Job, JobHandler, Scheduler, SystemClock};

pub const DIGEST_JOB: &str = "daily-digest";
pub const ALARM_JOB: &str = "alarm-check";

/// Collaborators shared by both jobs.
pub struct JobContext {
    pub source: Arc<dyn CalendarSource>,
    pub notifier: NotifierMux,
    pub retry: RetryPolicy,
    pub regions: Vec<String>,
}

pub struct DailyDigestJob {
    ctx: Arc<JobContext>,
}

impl DailyDigestJob {
    pub fn new(ctx: Arc<JobContext>) -> Self {
        Self { ctx }
    }
}

#[async_trait]
impl JobHandler<AlertDeduplicator> for DailyDigestJob {
    async fn run(&self, dedup: &mut AlertDeduplicator, now: DateTime<Tz>) -> Result<()> {
        let today = now.date_naive();
        dedup.reset(today);

        let events = fetch_events(self.ctx.source.as_ref(), today, self.ctx.retry).await;
        let digest = digest::compose(today, &events, &self.ctx.regions);
        let (events_n, empty) = (digest.event_count(), digest.is_empty());

        let delivered = self.ctx.notifier.notify(&Notification::Digest(digest)).await;
        counter!("digests_sent_total").increment(1);
        tracing::info!(target: "digest", %today, events = events_n, empty, delivered, "digest sent");
        Ok(())
    }
}

pub struct AlarmCheckJob {
    ctx: Arc<JobContext>,
}

impl AlarmCheckJob {
    pub fn new(ctx: Arc<JobContext>) -> Self {
        Self { ctx }
    }
}

fn alarm_message(ev: &Event, now: DateTime<Tz>) -> AlarmMessage {
    let minutes = match &ev.time {
        EventTime::At(t) => {
            let delta = now.date_naive().and_time(*t) - now.naive_local();
            // Round up: 14m30s reads as "in 15 min".
            (delta + ChronoDuration::seconds(59)).num_minutes()
        }
        EventTime::Unscheduled(_) => 0,
    };
    AlarmMessage {
        title: format!("High-impact event: {}", ev.name),
        event_name: ev.name.clone(),
        currency: ev.currency.clone(),
        region: ev.region.clone(),
        time: ev.time.to_string(),
        lead_minutes: minutes,
    }
}

#[async_trait]
impl JobHandler<AlertDeduplicator> for AlarmCheckJob {
    async fn run(&self, dedup: &mut AlertDeduplicator, now: DateTime<Tz>) -> Result<()> {
        let events = fetch_events(self.ctx.source.as_ref(), now.date_naive(), self.ctx.retry).await;
        let local = now.naive_local();

        let mut fired = 0usize;
        for ev in &events {
            if dedup.should_fire(ev, local) {
                let msg = alarm_message(ev, now);
                tracing::info!(target: "alarm", event = %ev.name, currency = %ev.currency, time = %ev.time, "alarm");
                self.ctx.notifier.notify(&Notification::Alarm(msg)).await;
                counter!("alarms_fired_total").increment(1);
                fired += 1;
            }
        }
        tracing::debug!(target: "alarm", checked = events.len(), fired, "alarm check done");
        Ok(())
    }
}

/// Scheduler with the digest job (daily at `digest_time`) followed by the alarm job
/// (every `check_interval`), both sharing `ctx`.
pub fn build_scheduler(
    cfg: &AppConfig,
    ctx: Arc<JobContext>,
    clock: Arc<dyn Clock>,
) -> Scheduler<AlertDeduplicator> {
    let mut sched = Scheduler::with_clock(
        cfg.timezone,
        AlertDeduplicator::new(cfg.alert_window()),
        clock,
    );
    sched.add(Job::DailyAt {
        name: DIGEST_JOB,
        at: cfg.digest_time,
        handler: Box::new(DailyDigestJob::new(ctx.clone())),
    });
    sched.add(Job::EveryInterval {
        name: ALARM_JOB,
        every: cfg.check_interval,
        handler: Box::new(AlarmCheckJob::new(ctx)),
    });
    sched
}

/// Same as [`build_scheduler`] on the system clock.
pub fn build_default_scheduler(cfg: &AppConfig, ctx: Arc<JobContext>) -> Scheduler<AlertDeduplicator> {
    build_scheduler(cfg, ctx, Arc::new(SystemClock))
}
