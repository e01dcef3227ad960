//! Status probe: configured charts joined with what the store holds.

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::Serialize;

use chart_harness_core::store::ChartStore;

use crate::config::Config;
use crate::extract::ExtractorRegistry;

/// One line of `charts status`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChartStatus {
    pub chart: String,
    /// `None` for charts found only in the store.
    pub extractor: Option<String>,
    pub url: Option<String>,
    pub in_all: bool,
    pub records: u64,
    pub latest_chart_date: Option<DateTime<Utc>>,
}

/// Configured charts first (configuration order), then charts present in
/// the store but no longer configured.
pub async fn chart_status(config: &Config, store: &dyn ChartStore) -> Result<Vec<ChartStatus>> {
    let summaries = store.chart_summaries().await?;

    let mut rows: Vec<ChartStatus> = config
        .charts
        .iter()
        .map(|(id, source)| {
            let summary = summaries.iter().find(|s| &s.chart_name == id);
            ChartStatus {
                chart: id.clone(),
                extractor: Some(source.extractor.clone()),
                url: Some(source.url.clone()),
                in_all: source.include_in_all,
                records: summary.map_or(0, |s| s.records),
                latest_chart_date: summary.and_then(|s| s.latest_chart_date),
            }
        })
        .collect();

    for summary in summaries {
        if !config.charts.contains_key(&summary.chart_name) {
            rows.push(ChartStatus {
                chart: summary.chart_name,
                extractor: None,
                url: None,
                in_all: false,
                records: summary.records,
                latest_chart_date: summary.latest_chart_date,
            });
        }
    }

    Ok(rows)
}

pub fn print_status(rows: &[ChartStatus]) {
    let registry = ExtractorRegistry::builtin();

    println!(
        "{:<18} {:<16} {:>8}  {:<20} URL",
        "CHART", "EXTRACTOR", "RECORDS", "LAST CRAWLED"
    );
    for row in rows {
        let latest = row
            .latest_chart_date
            .map(|d| d.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_else(|| "never".to_string());
        let chart = if row.in_all {
            row.chart.clone()
        } else {
            format!("{}*", row.chart)
        };
        println!(
            "{:<18} {:<16} {:>8}  {:<20} {}",
            chart,
            row.extractor.as_deref().unwrap_or("-"),
            row.records,
            latest,
            row.url.as_deref().unwrap_or("(not configured)")
        );
    }
    println!();
    println!("* not included in `crawl all`");
    println!("extractors: {}", registry.names().join(", "));
}
