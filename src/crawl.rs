//! Crawl orchestration.
//!
//! Coordinates one chart run through the stages
//!
//! ```text
//! Idle → PurgeChart → Fetch → Extract → Normalize → Upsert → PostCleanup → Idle
//! ```
//!
//! A fetch failure or a store failure aborts the run and returns to `Idle`
//! with a [`CrawlStatus::Failed`] report; per-row problems only count as
//! skipped or rejected rows. With [`PurgeMode::BeforeFetch`] the chart is
//! emptied before fetching, so a failed fetch leaves it empty until the
//! next successful run. [`PurgeMode::AfterExtract`] defers the purge until
//! a non-empty normalized batch exists.
//!
//! At most one run per chart is in flight. The run takes the chart's
//! [`Lease`] before purging; a trigger that finds the lease held returns
//! [`CrawlStatus::Busy`] immediately instead of queueing.

use std::collections::BTreeMap;
use std::sync::Arc;

use anyhow::Result;
use chrono::Utc;
use serde::Serialize;
use thiserror::Error;
use tokio::task::JoinSet;
use tracing::{error, info, warn};

use chart_harness_core::cleanup::{auto_cleanup, purge_chart, CleanupReport};
use chart_harness_core::normalize::normalize_batch;
use chart_harness_core::reconcile::{reconcile, ReconcileReport};
use chart_harness_core::store::ChartStore;

use crate::config::{ChartSourceConfig, Config, CrawlConfig, PurgeMode};
use crate::extract::{Ceilings, ExtractorRegistry, Strategy};
use crate::fetch::Fetcher;
use crate::lease::{ChartLeases, Lease, LocalChartLeases};
use crate::progress::{CrawlProgressEvent, CrawlProgressReporter, NoProgress};

/// Stage of a crawl run.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum CrawlStage {
    Idle,
    PurgeChart,
    Fetch,
    Extract,
    Normalize,
    Upsert,
    PostCleanup,
}

impl CrawlStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            CrawlStage::Idle => "idle",
            CrawlStage::PurgeChart => "purge-chart",
            CrawlStage::Fetch => "fetch",
            CrawlStage::Extract => "extract",
            CrawlStage::Normalize => "normalize",
            CrawlStage::Upsert => "upsert",
            CrawlStage::PostCleanup => "post-cleanup",
        }
    }
}

impl std::fmt::Display for CrawlStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a run ended.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum CrawlStatus {
    Completed,
    Failed { stage: CrawlStage, reason: String },
    /// Another run for the same chart was in flight.
    Busy,
}

/// Errors raised before a run starts.
#[derive(Debug, Error)]
pub enum CrawlError {
    #[error("unknown chart '{chart}'. Configured: {available}")]
    UnknownChart { chart: String, available: String },
    #[error("chart '{chart}' uses unknown extractor '{extractor}'")]
    UnknownExtractor { chart: String, extractor: String },
}

/// Counts from one crawl run.
#[derive(Clone, Debug, Serialize)]
pub struct CrawlReport {
    pub chart: String,
    #[serde(flatten)]
    pub status: CrawlStatus,
    pub strategy: Option<Strategy>,
    pub extracted: u64,
    /// Rows dropped during extraction.
    pub skipped: u64,
    /// Entries dropped by the normalizer.
    pub rejected: u64,
    pub upserted: ReconcileReport,
    pub purged: u64,
    pub cleanup: Option<CleanupReport>,
}

impl CrawlReport {
    fn new(chart: &str) -> Self {
        Self {
            chart: chart.to_string(),
            status: CrawlStatus::Completed,
            strategy: None,
            extracted: 0,
            skipped: 0,
            rejected: 0,
            upserted: ReconcileReport::default(),
            purged: 0,
            cleanup: None,
        }
    }

    fn failed(mut self, stage: CrawlStage, reason: impl std::fmt::Display) -> Self {
        let reason = reason.to_string();
        error!(chart = %self.chart, %stage, %reason, "crawl run aborted");
        self.status = CrawlStatus::Failed { stage, reason };
        self
    }

    pub fn is_failed(&self) -> bool {
        matches!(self.status, CrawlStatus::Failed { .. })
    }
}

/// Runs crawls against explicit store, fetcher and extractor dependencies.
#[derive(Clone)]
pub struct Crawler {
    store: Arc<dyn ChartStore>,
    fetcher: Arc<dyn Fetcher>,
    registry: Arc<ExtractorRegistry>,
    charts: Arc<BTreeMap<String, ChartSourceConfig>>,
    settings: CrawlConfig,
    reporter: Arc<dyn CrawlProgressReporter>,
    leases: Arc<dyn ChartLeases>,
}

impl Crawler {
    pub fn new(config: &Config, store: Arc<dyn ChartStore>, fetcher: Arc<dyn Fetcher>) -> Self {
        Self {
            store,
            fetcher,
            registry: Arc::new(ExtractorRegistry::builtin()),
            charts: Arc::new(config.charts.clone()),
            settings: config.crawl.clone(),
            reporter: Arc::new(NoProgress),
            leases: Arc::new(LocalChartLeases::new()),
        }
    }

    pub fn with_reporter(mut self, reporter: Arc<dyn CrawlProgressReporter>) -> Self {
        self.reporter = reporter;
        self
    }

    pub fn with_registry(mut self, registry: ExtractorRegistry) -> Self {
        self.registry = Arc::new(registry);
        self
    }

    /// Replace the default in-process leases, e.g. with
    /// [`SqliteChartLeases`](crate::lease::SqliteChartLeases) so that
    /// separate processes exclude each other.
    pub fn with_leases(mut self, leases: Arc<dyn ChartLeases>) -> Self {
        self.leases = leases;
        self
    }

    /// Chart ids that `crawl all` runs, in configuration order.
    pub fn charts_in_all(&self) -> Vec<String> {
        self.charts
            .iter()
            .filter(|(_, c)| c.include_in_all)
            .map(|(id, _)| id.clone())
            .collect()
    }

    fn source(&self, chart: &str) -> Result<&ChartSourceConfig, CrawlError> {
        self.charts.get(chart).ok_or_else(|| CrawlError::UnknownChart {
            chart: chart.to_string(),
            available: self
                .charts
                .keys()
                .map(String::as_str)
                .collect::<Vec<_>>()
                .join(", "),
        })
    }

    fn enter(&self, chart: &str, stage: CrawlStage) {
        info!(chart, %stage, "crawl stage");
        self.reporter.report(CrawlProgressEvent::Stage {
            chart: chart.to_string(),
            stage,
        });
    }

    /// Run one chart through the full pipeline.
    pub async fn crawl_chart(&self, chart: &str) -> Result<CrawlReport, CrawlError> {
        let source = self.source(chart)?;
        if self.registry.get(&source.extractor).is_none() {
            return Err(CrawlError::UnknownExtractor {
                chart: chart.to_string(),
                extractor: source.extractor.clone(),
            });
        }

        let lease = match self.leases.try_acquire(chart).await {
            Ok(Some(lease)) => lease,
            Ok(None) => {
                warn!(chart, "crawl already in flight, trigger rejected");
                let mut report = CrawlReport::new(chart);
                report.status = CrawlStatus::Busy;
                return Ok(report);
            }
            Err(e) => {
                return Ok(CrawlReport::new(chart).failed(CrawlStage::Idle, format!("{:#}", e)))
            }
        };

        let report = self.run(chart, source).await;
        self.release(&lease).await;
        self.enter(chart, CrawlStage::Idle);
        Ok(report)
    }

    async fn release(&self, lease: &Lease) {
        if let Err(e) = self.leases.release(lease).await {
            // The lease goes stale and is taken over by a later run.
            warn!(chart = %lease.chart, error = %format!("{:#}", e), "failed to release crawl lease");
        }
    }

    async fn run(&self, chart: &str, source: &ChartSourceConfig) -> CrawlReport {
        let mut report = CrawlReport::new(chart);
        let store = self.store.as_ref();

        if self.settings.purge == PurgeMode::BeforeFetch {
            self.enter(chart, CrawlStage::PurgeChart);
            match purge_chart(store, chart).await {
                Ok(n) => report.purged = n,
                Err(e) => return report.failed(CrawlStage::PurgeChart, format!("{:#}", e)),
            }
        }

        self.enter(chart, CrawlStage::Fetch);
        let document = match self.fetcher.fetch(&source.url).await {
            Ok(body) => body,
            Err(e) => return report.failed(CrawlStage::Fetch, e),
        };

        self.enter(chart, CrawlStage::Extract);
        let Some(extractor) = self.registry.get(&source.extractor) else {
            return report.failed(CrawlStage::Extract, "extractor disappeared");
        };
        let ceilings = Ceilings {
            primary: source.ceiling,
            fallback: source.fallback_ceiling,
        };
        let extraction = extractor.extract(&document, chart, ceilings, Utc::now());
        report.strategy = Some(extraction.strategy);
        report.extracted = extraction.entries.len() as u64;
        report.skipped = extraction.skipped.len() as u64;
        info!(
            chart,
            strategy = %extraction.strategy,
            extracted = report.extracted,
            skipped = report.skipped,
            "extraction finished"
        );
        self.reporter.report(CrawlProgressEvent::Extracted {
            chart: chart.to_string(),
            strategy: extraction.strategy,
            entries: report.extracted,
            skipped: report.skipped,
        });
        if extraction.strategy == Strategy::None {
            warn!(chart, "no entries found by either strategy");
        }

        self.enter(chart, CrawlStage::Normalize);
        let normalized = normalize_batch(extraction.entries);
        report.rejected = normalized.rejected.len() as u64;

        if self.settings.purge == PurgeMode::AfterExtract {
            if normalized.entries.is_empty() {
                info!(chart, "empty batch, keeping existing records");
                return report;
            }
            self.enter(chart, CrawlStage::PurgeChart);
            match purge_chart(store, chart).await {
                Ok(n) => report.purged = n,
                Err(e) => return report.failed(CrawlStage::PurgeChart, format!("{:#}", e)),
            }
        }

        self.enter(chart, CrawlStage::Upsert);
        let total = normalized.entries.len() as u64;
        self.reporter.report(CrawlProgressEvent::Upserting {
            chart: chart.to_string(),
            n: 0,
            total,
        });
        match reconcile(store, normalized.entries, Utc::now()).await {
            Ok(upserted) => report.upserted = upserted,
            Err(e) => return report.failed(CrawlStage::Upsert, format!("{:#}", e)),
        }
        self.reporter.report(CrawlProgressEvent::Upserting {
            chart: chart.to_string(),
            n: report.upserted.written(),
            total,
        });

        if self.settings.auto_cleanup {
            self.enter(chart, CrawlStage::PostCleanup);
            let charts: Vec<&String> = self.charts.keys().collect();
            match auto_cleanup(store, &charts).await {
                Ok(cleanup) => report.cleanup = Some(cleanup),
                Err(e) => return report.failed(CrawlStage::PostCleanup, format!("{:#}", e)),
            }
        }

        info!(
            chart,
            inserted = report.upserted.inserted,
            updated = report.upserted.updated,
            "crawl run completed"
        );
        report
    }

    /// Crawl every chart flagged `include_in_all`, concurrently.
    ///
    /// Reports come back in configuration order.
    pub async fn crawl_all(&self) -> Vec<CrawlReport> {
        let charts = self.charts_in_all();
        let mut tasks = JoinSet::new();
        for (index, chart) in charts.iter().enumerate() {
            let crawler = self.clone();
            let chart = chart.clone();
            tasks.spawn(async move {
                let report = match crawler.crawl_chart(&chart).await {
                    Ok(report) => report,
                    Err(e) => CrawlReport::new(&chart).failed(CrawlStage::Idle, e),
                };
                (index, report)
            });
        }

        let mut slots: Vec<Option<CrawlReport>> = vec![None; charts.len()];
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((index, report)) => slots[index] = Some(report),
                Err(e) => error!(error = %e, "crawl task panicked"),
            }
        }

        slots
            .into_iter()
            .zip(charts)
            .map(|(slot, chart)| {
                slot.unwrap_or_else(|| {
                    CrawlReport::new(&chart).failed(CrawlStage::Idle, "crawl task panicked")
                })
            })
            .collect()
    }
}

/// Print a report the way `charts crawl` shows it.
pub fn print_report(report: &CrawlReport) {
    println!("crawl {}", report.chart);
    match &report.status {
        CrawlStatus::Busy => {
            println!("  busy: another run is in flight");
            return;
        }
        CrawlStatus::Failed { stage, reason } => {
            println!("  failed at {}: {}", stage, reason);
        }
        CrawlStatus::Completed => {}
    }
    if report.purged > 0 {
        println!("  purged: {}", report.purged);
    }
    if let Some(strategy) = report.strategy {
        println!("  strategy: {}", strategy);
        println!("  extracted: {}", report.extracted);
        println!("  skipped rows: {}", report.skipped);
        println!("  rejected: {}", report.rejected);
    }
    if report.upserted.written() > 0 || report.upserted.collapsed > 0 {
        println!("  inserted: {}", report.upserted.inserted);
        println!("  updated: {}", report.upserted.updated);
        println!("  collapsed by rank: {}", report.upserted.collapsed);
    }
    if let Some(cleanup) = &report.cleanup {
        println!("  cleanup deleted: {}", cleanup.total());
    }
    if !report.is_failed() {
        println!("ok");
    }
}
