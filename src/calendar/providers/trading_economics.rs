use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use chrono::NaiveDate;
use metrics::counter;
use serde::Deserialize;
use std::time::Duration;

use crate::calendar::{CalendarSource, RawEventRow};

pub const DEFAULT_BASE_URL: &str = "https://api.tradingeconomics.com";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct TeRow {
    date: Option<String>,
    country: Option<String>,
    currency: Option<String>,
    event: Option<String>,
    importance: Option<u32>,
}

pub struct TradingEconomicsProvider {
    regions: Vec<String>,
    mode: Mode,
}

enum Mode {
    Fixture(String),
    Http {
        base_url: String,
        api_key: String,
        client: reqwest::Client,
    },
}

impl TradingEconomicsProvider {
    /// Serve rows from a captured JSON body; `regions` filters by `Country`.
    pub fn from_fixture(body: &str, regions: Vec<String>) -> Self {
        Self {
            regions,
            mode: Mode::Fixture(body.to_string()),
        }
    }

    pub fn from_api(base_url: &str, api_key: &str, regions: Vec<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .context("building calendar http client")?;
        Ok(Self {
            regions,
            mode: Mode::Http {
                base_url: base_url.trim_end_matches('/').to_string(),
                api_key: api_key.to_string(),
                client,
            },
        })
    }

    fn parse_rows(body: &str, today: NaiveDate) -> Result<Vec<RawEventRow>> {
        let rows: Vec<TeRow> = serde_json::from_str(body).context("parsing calendar json")?;
        let day = today.format("%Y-%m-%d").to_string();

        Ok(rows
            .into_iter()
            .filter(|r| r.date.as_deref().is_some_and(|d| d.starts_with(&day)))
            .map(|r| RawEventRow {
                // "2025-01-15T10:00:00" → "10:00"
                time: r.date.as_deref().and_then(|d| d.get(11..16)).map(str::to_string),
                currency: r.currency,
                region: r.country,
                impact_indicators: r.importance,
                name: r.event,
            })
            .collect())
    }

    async fn fetch_region(
        client: &reqwest::Client,
        base_url: &str,
        api_key: &str,
        region: &str,
        today: NaiveDate,
    ) -> Result<Vec<RawEventRow>> {
        let day = today.format("%Y-%m-%d");
        let url = format!("{base_url}/calendar/country/{region}/{day}/{day}");
        let body = client
            .get(&url)
            .query(&[("c", api_key), ("f", "json")])
            .send()
            .await
            .with_context(|| format!("calendar http get ({region})"))?
            .error_for_status()
            .with_context(|| format!("calendar non-2xx ({region})"))?
            .text()
            .await
            .context("calendar http .text()")?;
        Self::parse_rows(&body, today)
    }

    fn in_regions(&self, row: &RawEventRow) -> bool {
        self.regions.is_empty()
            || row
                .region
                .as_deref()
                .is_some_and(|c| self.regions.iter().any(|r| r.eq_ignore_ascii_case(c)))
    }
}

/// Concatenate per-region rows in request order. A failed region is logged and
/// skipped; the fetch only fails when no region succeeded.
fn merge_region_results(results: Vec<(&str, Result<Vec<RawEventRow>>)>) -> Result<Vec<RawEventRow>> {
    if results.is_empty() {
        return Err(anyhow!("no regions configured"));
    }
    let mut out = Vec::new();
    let mut last_err = None;
    let mut ok_regions = 0usize;
    for (region, res) in results {
        match res {
            Ok(mut rows) => {
                ok_regions += 1;
                out.append(&mut rows);
            }
            Err(e) => {
                tracing::warn!(target: "calendar", %region, error = ?e, "region fetch failed");
                counter!("calendar_fetch_errors_total").increment(1);
                last_err = Some(e);
            }
        }
    }
    match last_err {
        Some(e) if ok_regions == 0 => Err(e),
        _ => Ok(out),
    }
}

#[async_trait]
impl CalendarSource for TradingEconomicsProvider {
    async fn fetch_today(&self, today: NaiveDate) -> Result<Vec<RawEventRow>> {
        match &self.mode {
            Mode::Fixture(body) => {
                let rows = Self::parse_rows(body, today)?;
                Ok(rows.into_iter().filter(|r| self.in_regions(r)).collect())
            }
            Mode::Http {
                base_url,
                api_key,
                client,
            } => {
                let mut results = Vec::with_capacity(self.regions.len());
                for region in &self.regions {
                    let res = Self::fetch_region(client, base_url, api_key, region, today).await;
                    results.push((region.as_str(), res));
                }
                merge_region_results(results)
            }
        }
    }

    fn name(&self) -> &'static str {
        "TradingEconomics"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BODY: &str = r#"[
        {"Date":"2025-03-12T10:00:00","Country":"Germany","Currency":"EUR","Event":"CPI","Importance":3},
        {"Date":"2025-03-11T09:00:00","Country":"Germany","Currency":"EUR","Event":"Yesterday","Importance":1},
        {"Date":"2025-03-12T12:30:00","Country":"United States","Currency":"USD","Event":"Jobless Claims","Importance":2},
        {"Date":null,"Country":"Germany","Event":"Undated"}
    ]"#;

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 3, 12).unwrap()
    }

    #[test]
    fn keeps_only_today_and_slices_time() {
        let rows = TradingEconomicsProvider::parse_rows(BODY, day()).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].time.as_deref(), Some("10:00"));
        assert_eq!(rows[0].impact_indicators, Some(3));
        assert_eq!(rows[1].region.as_deref(), Some("United States"));
    }

    #[tokio::test]
    async fn fixture_filters_regions_case_insensitively() {
        let p = TradingEconomicsProvider::from_fixture(BODY, vec!["germany".into()]);
        let rows = p.fetch_today(day()).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].name.as_deref(), Some("CPI"));
    }

    fn te_row(region: &str, name: &str) -> RawEventRow {
        RawEventRow {
            time: Some("10:00".into()),
            region: Some(region.into()),
            name: Some(name.into()),
            ..Default::default()
        }
    }

    #[test]
    fn one_failed_region_keeps_the_others() {
        let merged = merge_region_results(vec![
            ("Germany", Err(anyhow!("503 from upstream"))),
            ("United States", Ok(vec![te_row("United States", "CPI")])),
            ("Japan", Ok(vec![])),
        ])
        .unwrap();
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].name.as_deref(), Some("CPI"));
    }

    #[test]
    fn every_region_failing_is_an_error() {
        let res = merge_region_results(vec![
            ("Germany", Err(anyhow!("timeout"))),
            ("United States", Err(anyhow!("dns"))),
        ]);
        let err = res.unwrap_err();
        assert!(err.to_string().contains("dns"));
    }

    #[test]
    fn no_regions_is_an_error() {
        assert!(merge_region_results(vec![]).is_err());
    }

    #[test]
    fn rows_keep_region_request_order() {
        let merged = merge_region_results(vec![
            ("Germany", Ok(vec![te_row("Germany", "ZEW"), te_row("Germany", "PPI")])),
            ("United States", Ok(vec![te_row("United States", "CPI")])),
        ])
        .unwrap();
        let names: Vec<_> = merged.iter().filter_map(|r| r.name.as_deref()).collect();
        assert_eq!(names, vec!["ZEW", "PPI", "CPI"]);
    }

    #[tokio::test]
    async fn broken_json_is_an_error() {
        let p = TradingEconomicsProvider::from_fixture("<html>", vec![]);
        assert!(p.fetch_today(day()).await.is_err());
    }
}
