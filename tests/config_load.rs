// tests/config_load.rs
use std::{env, fs};

use chrono::NaiveTime;
use econ_calendar_alerts::config::{AppConfig, ENV_CONFIG_PATH};
use serial_test::serial;

const OVERRIDE_KEYS: &[&str] = &[
    ENV_CONFIG_PATH,
    "CALENDAR_TZ",
    "DIGEST_TIME",
    "ALARM_LEAD_MINUTES",
    "CHECK_INTERVAL_SECS",
    "CALENDAR_REGIONS",
    "METRICS_ADDR",
];

fn clear_env() {
    for k in OVERRIDE_KEYS {
        env::remove_var(k);
    }
}

#[serial]
#[test]
fn file_is_read_and_env_overrides_it() {
    clear_env();
    let tmp = tempfile::tempdir().unwrap();
    let p = tmp.path().join("calendar.toml");
    fs::write(
        &p,
        r#"
        timezone = "America/New_York"
        digest_time = "07:30"
        lead_time_minutes = 10
        regions = ["United States"]
        fetch_attempts = 3
        fetch_backoff_ms = 250
        "#,
    )
    .unwrap();

    env::set_var(ENV_CONFIG_PATH, p.display().to_string());
    let c = AppConfig::load_default().unwrap();
    assert_eq!(c.timezone, chrono_tz::America::New_York);
    assert_eq!(c.digest_time, NaiveTime::from_hms_opt(7, 30, 0).unwrap());
    assert_eq!(c.lead_time.num_minutes(), 10);
    assert_eq!(c.regions, vec!["United States"]);
    assert_eq!(c.retry.attempts, 3);

    env::set_var("DIGEST_TIME", "06:45");
    let c = AppConfig::load_default().unwrap();
    assert_eq!(c.digest_time, NaiveTime::from_hms_opt(6, 45, 0).unwrap());

    clear_env();
}

#[serial]
#[test]
fn missing_explicit_path_is_an_error() {
    clear_env();
    env::set_var(ENV_CONFIG_PATH, "/definitely/not/here.toml");
    assert!(AppConfig::load_default().is_err());
    clear_env();
}

#[serial]
#[test]
fn no_file_means_defaults() {
    clear_env();
    let old = env::current_dir().unwrap();
    let tmp = tempfile::tempdir().unwrap();
    env::set_current_dir(tmp.path()).unwrap();

    let c = AppConfig::load_default().unwrap();
    assert_eq!(c.digest_time, NaiveTime::from_hms_opt(8, 0, 0).unwrap());
    assert_eq!(c.check_interval.as_secs(), 60);

    env::set_current_dir(&old).unwrap();
}

#[serial]
#[test]
fn load_from_file_rejects_bad_toml() {
    clear_env();
    let tmp = tempfile::tempdir().unwrap();
    let p = tmp.path().join("broken.toml");
    fs::write(&p, "timezone = ").unwrap();
    assert!(AppConfig::load_from_file(&p).is_err());
}
