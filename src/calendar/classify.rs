// src/calendar/classify.rs
//! Raw row → [`Event`]. Missing fields degrade to `"N/A"` / [`ImpactLevel::Unknown`];
//! only an unreadable time text rejects a row, and never the rest of the batch.

use chrono::NaiveTime;
use metrics::counter;

use super::{CalendarError, Event, EventTime, ImpactLevel, RawEventRow};

pub const NOT_AVAILABLE: &str = "N/A";

const TIME_FORMATS: &[&str] = &["%H:%M", "%H:%M:%S", "%I:%M%p", "%I:%M %p"];
const UNSCHEDULED_LABELS: &[&str] = &["all day", "tentative"];

/// Decode HTML entities and collapse whitespace.
pub fn normalize_name(s: &str) -> String {
    let decoded = html_escape::decode_html_entities(s);
    decoded.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Parse a textual event time. Empty text and known labels are unscheduled, not errors.
pub fn parse_event_time(raw: Option<&str>) -> Result<EventTime, String> {
    let text = raw.map(str::trim).unwrap_or_default();
    if text.is_empty() {
        return Ok(EventTime::Unscheduled(NOT_AVAILABLE.to_string()));
    }
    let lower = text.to_ascii_lowercase();
    if UNSCHEDULED_LABELS.contains(&lower.as_str()) {
        return Ok(EventTime::Unscheduled(text.to_string()));
    }
    TIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveTime::parse_from_str(&lower, fmt).ok())
        .map(EventTime::At)
        .ok_or_else(|| format!("unparseable time `{text}`"))
}

fn text_or_na(v: Option<&str>) -> String {
    match v.map(normalize_name) {
        Some(s) if !s.is_empty() => s,
        _ => NOT_AVAILABLE.to_string(),
    }
}

/// Classify a single row. `index` is the row position, reported on failure.
pub fn classify_row(index: usize, row: &RawEventRow) -> Result<Event, CalendarError> {
    let time = parse_event_time(row.time.as_deref())
        .map_err(|reason| CalendarError::MalformedRow { index, reason })?;

    let currency = text_or_na(row.currency.as_deref()).to_ascii_uppercase();
    let region = match row.region.as_deref().map(normalize_name) {
        Some(r) if !r.is_empty() => r,
        _ => currency.clone(),
    };

    Ok(Event {
        time,
        currency,
        region,
        impact: ImpactLevel::from_indicator_count(row.impact_indicators),
        name: text_or_na(row.name.as_deref()),
    })
}

/// Classify every row, skipping (and counting) malformed ones.
pub fn classify_batch(rows: Vec<RawEventRow>) -> Vec<Event> {
    let mut out = Vec::with_capacity(rows.len());
    for (index, row) in rows.iter().enumerate() {
        match classify_row(index, row) {
            Ok(ev) => out.push(ev),
            Err(e) => {
                tracing::warn!(target: "calendar", error = %e, "skipping row");
                counter!("calendar_rows_malformed_total").increment(1);
            }
        }
    }
    out
}
