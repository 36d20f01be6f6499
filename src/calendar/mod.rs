// src/calendar/mod.rs
pub mod classify;
pub mod providers;

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveTime};
use metrics::counter;
use thiserror::Error;

pub use classify::{classify_batch, classify_row};

/// Coarse severity of a calendar event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ImpactLevel {
    Low,
    Medium,
    High,
    Unknown,
}

impl ImpactLevel {
    /// 3 → High, 2 → Medium, anything else → Low; no indicator → Unknown.
    pub fn from_indicator_count(count: Option<u32>) -> Self {
        match count {
            None => ImpactLevel::Unknown,
            Some(3) => ImpactLevel::High,
            Some(2) => ImpactLevel::Medium,
            Some(_) => ImpactLevel::Low,
        }
    }
}

impl fmt::Display for ImpactLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ImpactLevel::Low => "low",
            ImpactLevel::Medium => "medium",
            ImpactLevel::High => "high",
            ImpactLevel::Unknown => "unknown",
        };
        f.write_str(s)
    }
}

/// Same-day local wall-clock time of an event. Rows labelled "All Day" / "Tentative"
/// (or carrying no time at all) still show up in the digest but never alarm.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventTime {
    At(NaiveTime),
    Unscheduled(String),
}

impl fmt::Display for EventTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EventTime::At(t) => write!(f, "{}", t.format("%H:%M")),
            EventTime::Unscheduled(label) => f.write_str(label),
        }
    }
}

/// A classified calendar event. Built fresh on every fetch and never mutated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    pub time: EventTime,
    pub currency: String,
    /// Originating region (country) used for digest grouping.
    pub region: String,
    pub impact: ImpactLevel,
    pub name: String,
}

/// One row as delivered by a calendar source, before classification.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawEventRow {
    pub time: Option<String>,
    pub currency: Option<String>,
    pub region: Option<String>,
    /// Number of discrete impact indicators (e.g. bulls / stars / importance level).
    pub impact_indicators: Option<u32>,
    pub name: Option<String>,
}

#[derive(Debug, Error)]
pub enum CalendarError {
    #[error("calendar source `{source_name}` unavailable: {reason}")]
    SourceUnavailable { source_name: String, reason: String },
    #[error("malformed row #{index}: {reason}")]
    MalformedRow { index: usize, reason: String },
}

#[async_trait]
pub trait CalendarSource: Send + Sync {
    /// Raw rows for `today` (local date). An empty vec is a legitimate answer.
    async fn fetch_today(&self, today: NaiveDate) -> anyhow::Result<Vec<RawEventRow>>;
    fn name(&self) -> &'static str;
}

/// Bounded retry with exponential backoff for source fetches.
/// `attempts = 1` means a single try.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub attempts: u8,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 1,
            base_delay: Duration::from_millis(500),
        }
    }
}

impl RetryPolicy {
    fn delay_for(&self, attempt: u8) -> Duration {
        let shift = u32::from(attempt.saturating_sub(1)).min(10);
        self.base_delay.saturating_mul(1u32 << shift)
    }
}

/// Fetch raw rows, retrying per `retry`. Exhausted retries surface as `SourceUnavailable`.
pub async fn fetch_rows(
    source: &dyn CalendarSource,
    today: NaiveDate,
    retry: RetryPolicy,
) -> Result<Vec<RawEventRow>, CalendarError> {
    let attempts = retry.attempts.max(1);
    let mut attempt: u8 = 0;
    loop {
        attempt += 1;
        match source.fetch_today(today).await {
            Ok(rows) => return Ok(rows),
            Err(e) if attempt < attempts => {
                tracing::debug!(
                    target: "calendar",
                    source = source.name(),
                    attempt,
                    error = %e,
                    "fetch failed, retrying"
                );
                tokio::time::sleep(retry.delay_for(attempt)).await;
            }
            Err(e) => {
                return Err(CalendarError::SourceUnavailable {
                    source_name: source.name().to_string(),
                    reason: format!("{e:#}"),
                })
            }
        }
    }
}

/// Fetch and classify today's events. A source failure is logged and yields an empty set,
/// so callers never observe it as an error.
pub async fn fetch_events(
    source: &dyn CalendarSource,
    today: NaiveDate,
    retry: RetryPolicy,
) -> Vec<Event> {
    match fetch_rows(source, today, retry).await {
        Ok(rows) => classify_batch(rows),
        Err(e) => {
            tracing::warn!(target: "calendar", error = %e, "treating as no events");
            counter!("calendar_fetch_errors_total").increment(1);
            Vec::new()
        }
    }
}
