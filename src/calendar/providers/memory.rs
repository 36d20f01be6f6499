// src/calendar/providers/memory.rs
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::NaiveDate;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use crate::calendar::{CalendarSource, RawEventRow};

/// In-memory source for tests and demos. Can be flipped into a failing state.
pub struct StaticSource {
    rows: Mutex<Vec<RawEventRow>>,
    failing: Mutex<bool>,
    calls: AtomicUsize,
}

impl StaticSource {
    pub fn new(rows: Vec<RawEventRow>) -> Self {
        Self {
            rows: Mutex::new(rows),
            failing: Mutex::new(false),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing() -> Self {
        let s = Self::new(Vec::new());
        s.set_failing(true);
        s
    }

    pub fn set_rows(&self, rows: Vec<RawEventRow>) {
        if let Ok(mut g) = self.rows.lock() {
            *g = rows;
        }
    }

    pub fn set_failing(&self, on: bool) {
        if let Ok(mut g) = self.failing.lock() {
            *g = on;
        }
    }

    /// Number of `fetch_today` calls so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CalendarSource for StaticSource {
    async fn fetch_today(&self, _today: NaiveDate) -> Result<Vec<RawEventRow>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let failing = self.failing.lock().map(|g| *g).unwrap_or(false);
        if failing {
            return Err(anyhow!("static source set to fail"));
        }
        self.rows
            .lock()
            .map(|g| g.clone())
            .map_err(|_| anyhow!("static source poisoned"))
    }

    fn name(&self) -> &'static str {
        "static"
    }
}
