//! Demo that pushes a sample digest and one alarm through the multiplexer
//! (log only when no channels are configured).

use chrono::Local;
use econ_calendar_alerts::calendar::classify_batch;
use econ_calendar_alerts::digest;
use econ_calendar_alerts::notify::AlarmMessage;
use econ_calendar_alerts::{Notification, NotifierMux, RawEventRow};

fn row(time: &str, currency: &str, region: &str, impact: u32, name: &str) -> RawEventRow {
    RawEventRow {
        time: Some(time.into()),
        currency: Some(currency.into()),
        region: Some(region.into()),
        impact_indicators: Some(impact),
        name: Some(name.into()),
    }
}

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();
    tracing_subscriber::fmt().with_target(false).init();
    let mux = NotifierMux::from_env();

    let events = classify_batch(vec![
        row("08:00", "EUR", "Germany", 2, "GDP q/q"),
        row("10:00", "EUR", "Germany", 3, "CPI m/m"),
        row("14:30", "USD", "United States", 3, "Non-Farm Payrolls"),
    ]);
    let today = Local::now().date_naive();
    let d = digest::compose(today, &events, &["Germany".into(), "United States".into()]);
    mux.notify(&Notification::Digest(d)).await;

    tokio::time::sleep(std::time::Duration::from_millis(400)).await;

    let alarm = AlarmMessage {
        title: "High-impact event: CPI m/m".into(),
        event_name: "CPI m/m".into(),
        currency: "EUR".into(),
        region: "Germany".into(),
        time: "10:00".into(),
        lead_minutes: 15,
    };
    mux.notify(&Notification::Alarm(alarm)).await;

    println!("notify-demo done");
}
