// src/alarm.rs
use std::collections::HashSet;
use std::fmt;

use chrono::{Duration as ChronoDuration, NaiveDate, NaiveDateTime, NaiveTime};

use crate::calendar::{Event, EventTime, ImpactLevel};

/// Per-day dedup identity of an alarm: (time, name), compared by value.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AlarmKey {
    pub time: NaiveTime,
    pub name: String,
}

impl AlarmKey {
    /// `None` for events without a wall-clock time.
    pub fn for_event(ev: &Event) -> Option<Self> {
        match &ev.time {
            EventTime::At(t) => Some(Self {
                time: *t,
                name: ev.name.clone(),
            }),
            EventTime::Unscheduled(_) => None,
        }
    }
}

impl fmt::Display for AlarmKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.time.format("%H:%M"), self.name)
    }
}

/// Alarms sent since the last daily reset.
#[derive(Debug, Clone, Default)]
pub struct AlarmState {
    sent_keys: HashSet<AlarmKey>,
    day_stamp: Option<NaiveDate>,
}

impl AlarmState {
    pub fn contains(&self, key: &AlarmKey) -> bool {
        self.sent_keys.contains(key)
    }

    pub fn len(&self) -> usize {
        self.sent_keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sent_keys.is_empty()
    }

    pub fn day_stamp(&self) -> Option<NaiveDate> {
        self.day_stamp
    }

    fn reset(&mut self, today: NaiveDate) {
        self.sent_keys.clear();
        self.day_stamp = Some(today);
    }
}

/// Half-open lead-time window `(lead - width, lead]` before an event's start.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AlertWindow {
    pub lead: ChronoDuration,
    pub width: ChronoDuration,
}

impl Default for AlertWindow {
    fn default() -> Self {
        Self {
            lead: ChronoDuration::minutes(15),
            width: ChronoDuration::minutes(1),
        }
    }
}

impl AlertWindow {
    /// Width should match the alarm-check interval so each event hits the window on exactly one tick.
    /// The lead is kept as given; the width is clamped into `[1s, lead]`.
    pub fn new(lead: ChronoDuration, width: ChronoDuration) -> Self {
        let lead = lead.max(ChronoDuration::seconds(1));
        let width = width.max(ChronoDuration::seconds(1)).min(lead);
        Self { lead, width }
    }

    pub fn contains(&self, delta: ChronoDuration) -> bool {
        delta > self.lead - self.width && delta <= self.lead
    }
}

/// Decides whether a high-impact event gets its single alarm today.
/// Exclusively owns the [`AlarmState`]; only [`AlertDeduplicator::reset`] clears it.
#[derive(Debug, Clone, Default)]
pub struct AlertDeduplicator {
    window: AlertWindow,
    state: AlarmState,
}

impl AlertDeduplicator {
    pub fn new(window: AlertWindow) -> Self {
        Self {
            window,
            state: AlarmState::default(),
        }
    }

    pub fn window(&self) -> AlertWindow {
        self.window
    }

    pub fn state(&self) -> &AlarmState {
        &self.state
    }

    /// True (and recorded) iff the event is High, inside the window, and unseen today.
    /// `now` is local wall-clock time; the event time is read as the same local day.
    pub fn should_fire(&mut self, ev: &Event, now: NaiveDateTime) -> bool {
        if ev.impact != ImpactLevel::High {
            return false;
        }
        let Some(key) = AlarmKey::for_event(ev) else {
            return false;
        };
        let delta = now.date().and_time(key.time) - now;
        if !self.window.contains(delta) {
            return false;
        }
        if self.state.contains(&key) {
            tracing::debug!(target: "alarm", %key, "already sent today");
            return false;
        }
        tracing::debug!(target: "alarm", %key, delta_secs = delta.num_seconds(), "firing");
        self.state.sent_keys.insert(key);
        true
    }

    /// Unconditionally forget every sent alarm and stamp `today`.
    pub fn reset(&mut self, today: NaiveDate) {
        let dropped = self.state.len();
        self.state.reset(today);
        tracing::debug!(target: "alarm", %today, dropped, "alarm state reset");
    }
}
