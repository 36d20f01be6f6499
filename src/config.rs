// src/config.rs
use anyhow::{anyhow, bail, Context, Result};
use chrono::{Duration as ChronoDuration, NaiveTime};
use chrono_tz::Tz;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::alarm::AlertWindow;
use crate::calendar::providers::trading_economics::DEFAULT_BASE_URL;
use crate::calendar::RetryPolicy;

pub const ENV_CONFIG_PATH: &str = "CALENDAR_CONFIG_PATH";
pub const DEFAULT_CONFIG_PATH: &str = "config/calendar.toml";

const DEFAULT_TZ: Tz = chrono_tz::Europe::Berlin;
const DEFAULT_DIGEST_TIME: (u32, u32) = (8, 0);
const DEFAULT_LEAD_MINUTES: i64 = 15;
const DEFAULT_CHECK_INTERVAL_SECS: u64 = 60;
const DEFAULT_API_KEY: &str = "guest:guest";

/// File / env shape. Everything optional; `AppConfig::from_raw` fills the gaps.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawConfig {
    pub timezone: Option<String>,
    pub digest_time: Option<String>,
    pub lead_time_minutes: Option<i64>,
    pub check_interval_secs: Option<u64>,
    pub regions: Option<Vec<String>>,
    /// "ENV" means: read from TRADING_ECONOMICS_API_KEY
    pub api_key: Option<String>,
    pub api_base_url: Option<String>,
    pub fetch_attempts: Option<u8>,
    pub fetch_backoff_ms: Option<u64>,
    pub metrics_addr: Option<String>,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub timezone: Tz,
    pub digest_time: NaiveTime,
    pub lead_time: ChronoDuration,
    pub check_interval: Duration,
    pub regions: Vec<String>,
    pub api_key: String,
    pub api_base_url: String,
    pub retry: RetryPolicy,
    pub metrics_addr: Option<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            timezone: DEFAULT_TZ,
            digest_time: NaiveTime::from_hms_opt(DEFAULT_DIGEST_TIME.0, DEFAULT_DIGEST_TIME.1, 0)
                .unwrap_or(NaiveTime::MIN),
            lead_time: ChronoDuration::minutes(DEFAULT_LEAD_MINUTES),
            check_interval: Duration::from_secs(DEFAULT_CHECK_INTERVAL_SECS),
            regions: vec!["Germany".to_string(), "United States".to_string()],
            api_key: DEFAULT_API_KEY.to_string(),
            api_base_url: DEFAULT_BASE_URL.to_string(),
            retry: RetryPolicy::default(),
            metrics_addr: None,
        }
    }
}

impl AppConfig {
    /// Alarm window: `(lead - check_interval, lead]`.
    pub fn alert_window(&self) -> AlertWindow {
        let width = ChronoDuration::from_std(self.check_interval)
            .unwrap_or_else(|_| ChronoDuration::seconds(DEFAULT_CHECK_INTERVAL_SECS as i64));
        AlertWindow::new(self.lead_time, width)
    }

    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let raw = read_raw(path.as_ref())?;
        Self::from_raw(apply_env_overrides(raw, env_lookup), env_lookup)
    }

    /// 1) $CALENDAR_CONFIG_PATH  2) config/calendar.toml  3) built-in defaults.
    /// Env overrides apply in every case.
    pub fn load_default() -> Result<Self> {
        let raw = if let Ok(p) = std::env::var(ENV_CONFIG_PATH) {
            let pb = PathBuf::from(p);
            if !pb.exists() {
                bail!("{ENV_CONFIG_PATH} points to non-existent path");
            }
            read_raw(&pb)?
        } else {
            let default_p = PathBuf::from(DEFAULT_CONFIG_PATH);
            if default_p.exists() {
                read_raw(&default_p)?
            } else {
                RawConfig::default()
            }
        };
        Self::from_raw(apply_env_overrides(raw, env_lookup), env_lookup)
    }

    /// Validate and fill defaults. Out-of-range values fall back with a warning;
    /// only an unresolvable `api_key = "ENV"` is an error.
    pub fn from_raw<F>(raw: RawConfig, env: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let timezone = match raw.timezone.as_deref() {
            None => DEFAULT_TZ,
            Some(name) => name.trim().parse::<Tz>().unwrap_or_else(|_| {
                tracing::warn!(target: "config", %name, "unknown timezone, using default");
                DEFAULT_TZ
            }),
        };

        let defaults = Self::default();
        let default_time = defaults.digest_time;
        let digest_time = match raw.digest_time.as_deref() {
            None => default_time,
            Some(s) => NaiveTime::parse_from_str(s.trim(), "%H:%M").unwrap_or_else(|_| {
                tracing::warn!(target: "config", value = %s, "digest_time not HH:MM, using default");
                default_time
            }),
        };

        let lead_minutes = match raw.lead_time_minutes {
            Some(m) if m >= 1 => m,
            Some(m) => {
                tracing::warn!(target: "config", value = m, "lead_time_minutes < 1, using default");
                DEFAULT_LEAD_MINUTES
            }
            None => DEFAULT_LEAD_MINUTES,
        };

        let check_secs = match raw.check_interval_secs {
            Some(0) => {
                tracing::warn!(target: "config", "check_interval_secs = 0, using default");
                DEFAULT_CHECK_INTERVAL_SECS
            }
            Some(s) if s > lead_minutes.unsigned_abs() * 60 => {
                tracing::warn!(
                    target: "config",
                    check_interval_secs = s,
                    lead_time_minutes = lead_minutes,
                    "check interval longer than lead time, using default"
                );
                DEFAULT_CHECK_INTERVAL_SECS
            }
            Some(s) => s,
            None => DEFAULT_CHECK_INTERVAL_SECS,
        };

        let regions = clean_list(raw.regions.unwrap_or(defaults.regions));

        let api_key = match raw.api_key {
            None => defaults.api_key,
            Some(k) if k.trim().eq_ignore_ascii_case("env") => env("TRADING_ECONOMICS_API_KEY")
                .filter(|v| !v.trim().is_empty())
                .ok_or_else(|| anyhow!("Missing TRADING_ECONOMICS_API_KEY env var"))?,
            Some(k) => k,
        };

        let retry = RetryPolicy {
            attempts: raw.fetch_attempts.unwrap_or(1).max(1),
            base_delay: Duration::from_millis(raw.fetch_backoff_ms.unwrap_or(500)),
        };

        Ok(Self {
            timezone,
            digest_time,
            lead_time: ChronoDuration::minutes(lead_minutes),
            check_interval: Duration::from_secs(check_secs),
            regions,
            api_key,
            api_base_url: raw.api_base_url.unwrap_or(defaults.api_base_url),
            retry,
            metrics_addr: raw.metrics_addr.filter(|a| !a.trim().is_empty()),
        })
    }
}

fn env_lookup(key: &str) -> Option<String> {
    std::env::var(key).ok()
}

fn read_raw(path: &Path) -> Result<RawConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("reading config from {}", path.display()))?;
    toml::from_str(&content).with_context(|| format!("parsing config {}", path.display()))
}

/// Env wins over file values. Unparseable numbers are ignored with a warning.
pub fn apply_env_overrides<F>(mut raw: RawConfig, env: F) -> RawConfig
where
    F: Fn(&str) -> Option<String>,
{
    fn num<T: std::str::FromStr>(key: &str, v: Option<String>) -> Option<T> {
        let v = v?;
        match v.trim().parse() {
            Ok(n) => Some(n),
            Err(_) => {
                tracing::warn!(target: "config", %key, value = %v, "ignoring non-numeric override");
                None
            }
        }
    }

    if let Some(v) = env("CALENDAR_TZ") {
        raw.timezone = Some(v);
    }
    if let Some(v) = env("DIGEST_TIME") {
        raw.digest_time = Some(v);
    }
    if let Some(v) = num("ALARM_LEAD_MINUTES", env("ALARM_LEAD_MINUTES")) {
        raw.lead_time_minutes = Some(v);
    }
    if let Some(v) = num("CHECK_INTERVAL_SECS", env("CHECK_INTERVAL_SECS")) {
        raw.check_interval_secs = Some(v);
    }
    if let Some(v) = env("CALENDAR_REGIONS") {
        raw.regions = Some(v.split(',').map(str::to_string).collect());
    }
    if let Some(v) = env("METRICS_ADDR") {
        raw.metrics_addr = Some(v);
    }
    raw
}

fn clean_list(items: Vec<String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for it in items {
        let t = it.trim();
        if !t.is_empty() && !out.iter().any(|o| o.eq_ignore_ascii_case(t)) {
            out.push(t.to_string());
        }
    }
    out
}
