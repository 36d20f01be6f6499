//! # Digest
//! Builds the once-daily summary: events grouped by region, in the order the
//! source delivered them. Always yields a message, even for an empty day.

use chrono::NaiveDate;

use crate::calendar::{Event, ImpactLevel};

/// Fallback line when the whole day has no events.
pub const NO_EVENTS: &str = "No events found for today.";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventSummary {
    pub time: String,
    pub currency: String,
    pub impact: ImpactLevel,
    pub name: String,
}

impl EventSummary {
    fn from_event(ev: &Event) -> Self {
        Self {
            time: ev.time.to_string(),
            currency: ev.currency.clone(),
            impact: ev.impact,
            name: ev.name.clone(),
        }
    }

    pub fn line(&self) -> String {
        format!(
            "- {} [{}] {} ({})",
            self.time, self.currency, self.name, self.impact
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DigestSection {
    pub region: String,
    pub events: Vec<EventSummary>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Digest {
    pub title: String,
    pub date: NaiveDate,
    pub sections: Vec<DigestSection>,
    /// Configured regions that delivered nothing today.
    pub missing_regions: Vec<String>,
}

impl Digest {
    pub fn is_empty(&self) -> bool {
        self.sections.iter().all(|s| s.events.is_empty())
    }

    pub fn event_count(&self) -> usize {
        self.sections.iter().map(|s| s.events.len()).sum()
    }

    /// Body text without the title.
    pub fn body(&self) -> String {
        if self.is_empty() {
            return NO_EVENTS.to_string();
        }
        let mut out = String::new();
        for s in &self.sections {
            out.push_str(&format!("**{}**\n", s.region));
            for e in &s.events {
                out.push_str(&e.line());
                out.push('\n');
            }
            out.push('\n');
        }
        for r in &self.missing_regions {
            out.push_str(&format!("No events found for {r}.\n"));
        }
        out.trim_end().to_string()
    }
}

/// Group `events` by region in first-seen order. `expected_regions` are the regions the
/// source was asked for; those absent from `events` are listed as missing.
pub fn compose(date: NaiveDate, events: &[Event], expected_regions: &[String]) -> Digest {
    let mut sections: Vec<DigestSection> = Vec::new();
    for ev in events {
        let summary = EventSummary::from_event(ev);
        match sections.iter_mut().find(|s| s.region == ev.region) {
            Some(s) => s.events.push(summary),
            None => sections.push(DigestSection {
                region: ev.region.clone(),
                events: vec![summary],
            }),
        }
    }

    let missing_regions = expected_regions
        .iter()
        .filter(|r| !sections.iter().any(|s| s.region.eq_ignore_ascii_case(r)))
        .cloned()
        .collect();

    Digest {
        title: format!("Economic calendar for {}", date.format("%Y-%m-%d")),
        date,
        sections,
        missing_regions,
    }
}
