//! # Scheduler
//! Single dispatch loop over a small ordered set of recurring jobs.
//!
//! Jobs run one at a time against state owned by the scheduler, so handlers get
//! `&mut S` without locking. A daily job fires at a local wall-clock time and never
//! replays fires missed before start. An interval job that falls behind (because
//! another job was running) runs once when it gets the loop back, and its overdue
//! ticks collapse into that single run.

use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Days, Duration as ChronoDuration, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;
use metrics::{counter, gauge};

/// Source of "now". Swappable so tests can drive time by hand.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    pub fn set(&self, t: DateTime<Utc>) {
        if let Ok(mut g) = self.now.lock() {
            *g = t;
        }
    }

    pub fn advance(&self, by: ChronoDuration) {
        if let Ok(mut g) = self.now.lock() {
            *g += by;
        }
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        self.now.lock().map(|g| *g).unwrap_or_else(|_| Utc::now())
    }
}

#[async_trait]
pub trait JobHandler<S: Send>: Send + Sync {
    /// `now` is the local time in the scheduler's timezone at dispatch.
    async fn run(&self, state: &mut S, now: DateTime<Tz>) -> Result<()>;
}

pub enum Job<S> {
    DailyAt {
        name: &'static str,
        at: NaiveTime,
        handler: Box<dyn JobHandler<S>>,
    },
    EveryInterval {
        name: &'static str,
        every: Duration,
        handler: Box<dyn JobHandler<S>>,
    },
}

impl<S: Send> Job<S> {
    pub fn name(&self) -> &'static str {
        match self {
            Job::DailyAt { name, .. } | Job::EveryInterval { name, .. } => *name,
        }
    }

    fn handler(&self) -> &dyn JobHandler<S> {
        match self {
            Job::DailyAt { handler, .. } | Job::EveryInterval { handler, .. } => &**handler,
        }
    }

    /// First fire for a job registered at `now`: immediately for interval jobs,
    /// next local occurrence strictly after `now` for daily jobs.
    fn first_due(&self, now: DateTime<Tz>) -> Option<DateTime<Tz>> {
        match self {
            Job::DailyAt { at, .. } => next_daily(*at, now),
            Job::EveryInterval { .. } => Some(now),
        }
    }

    fn next_due(&self, prev_due: DateTime<Tz>, now: DateTime<Tz>) -> Option<DateTime<Tz>> {
        match self {
            Job::DailyAt { at, .. } => next_daily(*at, now),
            Job::EveryInterval { every, .. } => Some(next_interval(*every, prev_due, now)),
        }
    }
}

/// Next instant after `after` whose local time-of-day is `at`. Days on which `at`
/// falls into a DST gap are skipped.
pub fn next_daily(at: NaiveTime, after: DateTime<Tz>) -> Option<DateTime<Tz>> {
    let tz = after.timezone();
    let start = after.date_naive();
    (0..=7u64)
        .filter_map(|i| start.checked_add_days(Days::new(i)))
        .filter_map(|d| tz.from_local_datetime(&d.and_time(at)).earliest())
        .find(|cand| *cand > after)
}

/// Smallest `prev_due + k * every` (k >= 1) that lies after `now`.
pub fn next_interval(every: Duration, prev_due: DateTime<Tz>, now: DateTime<Tz>) -> DateTime<Tz> {
    let step_ms = i64::try_from(every.as_millis()).unwrap_or(i64::MAX).max(1);
    let behind_ms = (now - prev_due).num_milliseconds().max(0);
    let k = behind_ms / step_ms + 1;
    prev_due + ChronoDuration::milliseconds(step_ms.saturating_mul(k))
}

struct Slot<S> {
    job: Job<S>,
    next_due: Option<DateTime<Tz>>,
}

pub struct Scheduler<S> {
    tz: Tz,
    clock: Arc<dyn Clock>,
    state: S,
    slots: Vec<Slot<S>>,
}

impl<S: Send + 'static> Scheduler<S> {
    pub fn with_clock(tz: Tz, state: S, clock: Arc<dyn Clock>) -> Self {
        Self {
            tz,
            clock,
            state,
            slots: Vec::new(),
        }
    }

    fn now(&self) -> DateTime<Tz> {
        self.clock.now().with_timezone(&self.tz)
    }

    /// Register a job; its first fire is computed from the current clock.
    pub fn add(&mut self, job: Job<S>) {
        let now = self.now();
        let next_due = job.first_due(now);
        match next_due {
            Some(due) => tracing::info!(target: "scheduler", job = job.name(), next = %due, "job registered"),
            None => tracing::warn!(target: "scheduler", job = job.name(), "job has no upcoming fire"),
        }
        self.slots.push(Slot { job, next_due });
    }

    pub fn state(&self) -> &S {
        &self.state
    }

    pub fn next_due_of(&self, name: &str) -> Option<DateTime<Tz>> {
        self.slots
            .iter()
            .find(|s| s.job.name() == name)
            .and_then(|s| s.next_due)
    }

    /// Earliest pending fire: (slot index, due). Ties go to the earlier-registered job.
    fn earliest(&self) -> Option<(usize, DateTime<Tz>)> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(i, s)| s.next_due.map(|d| (i, d)))
            .min_by_key(|&(i, d)| (d, i))
    }

    async fn run_slot(&mut self, idx: usize, now: DateTime<Tz>) {
        let slot = &mut self.slots[idx];
        let name = slot.job.name();
        let started = Instant::now();

        let result = slot.job.handler().run(&mut self.state, now).await;
        let elapsed_ms = started.elapsed().as_millis() as u64;
        match result {
            Ok(()) => {
                tracing::info!(target: "scheduler", job = name, elapsed_ms, "job finished");
            }
            Err(e) => {
                tracing::warn!(target: "scheduler", job = name, elapsed_ms, error = ?e, "job failed; skipped this tick");
                counter!("scheduler_job_failures_total", "job" => name).increment(1);
            }
        }
        gauge!("scheduler_last_tick_ts").set(now.timestamp() as f64);

        let prev_due = slot.next_due.unwrap_or(now);
        // Re-read the clock: the job may have taken a while.
        let after = self.clock.now().with_timezone(&self.tz).max(now);
        self.slots[idx].next_due = self.slots[idx].job.next_due(prev_due, after);
    }

    /// Run, in registration order, every job due at the current clock time.
    /// Returns the number of jobs run.
    pub async fn run_due(&mut self) -> usize {
        let mut ran = 0;
        for idx in 0..self.slots.len() {
            let now = self.now();
            if self.slots[idx].next_due.is_some_and(|d| d <= now) {
                self.run_slot(idx, now).await;
                ran += 1;
            }
        }
        ran
    }

    /// Dispatch loop. Sleeps until the earliest due job, runs it to completion, repeats.
    /// Returns the state once `shutdown` resolves; a running job is never interrupted.
    pub async fn run_until<F>(mut self, shutdown: F) -> S
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        tracing::info!(target: "scheduler", jobs = self.slots.len(), tz = %self.tz, "scheduler started");

        loop {
            let Some((idx, due)) = self.earliest() else {
                shutdown.as_mut().await;
                break;
            };
            let now = self.now();
            if due <= now {
                self.run_slot(idx, now).await;
                continue;
            }
            let wait = (due - now).to_std().unwrap_or_default();
            tokio::select! {
                _ = shutdown.as_mut() => break,
                _ = tokio::time::sleep(wait) => {}
            }
        }

        tracing::info!(target: "scheduler", "scheduler stopped");
        self.state
    }
}
