// src/lib.rs
// Public library surface for the binaries and integration tests.

pub mod alarm;
pub mod calendar;
pub mod config;
pub mod digest;
pub mod engine;
pub mod metrics;
pub mod notify;
pub mod scheduler;

// ---- Re-exports for stable public API ----
pub use crate::alarm::{AlarmKey, AlarmState, AlertDeduplicator, AlertWindow};
pub use crate::calendar::{CalendarSource, Event, EventTime, ImpactLevel, RawEventRow};
pub use crate::config::AppConfig;
pub use crate::engine::{build_scheduler, JobContext};
pub use crate::notify::{Notification, Notifier, NotifierMux};
pub use crate::scheduler::{Job, JobHandler, Scheduler};
