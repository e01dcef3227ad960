//! TOML configuration parsing and validation.
//!
//! ```toml
//! [db]
//! path = "./data/charts.sqlite"
//!
//! [fetch]
//! timeout_secs = 30
//!
//! [crawl]
//! purge = "before-fetch"
//! auto_cleanup = true
//! lease_stale_secs = 900
//!
//! [charts.billboard-japan]
//! extractor = "billboard-japan"
//! url = "https://www.billboard-japan.com/charts/detail?a=hot100"
//! ceiling = 50
//! fallback_ceiling = 20
//! ```
//!
//! When `[charts]` is omitted the built-in chart table from
//! [`default_charts`] is used.

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::extract::ExtractorRegistry;

/// Crawl target meaning every chart with `include_in_all`.
pub const ALL_CHARTS: &str = "all";

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub db: DbConfig,
    #[serde(default)]
    pub fetch: FetchConfig,
    #[serde(default)]
    pub crawl: CrawlConfig,
    #[serde(default = "default_charts")]
    pub charts: BTreeMap<String, ChartSourceConfig>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct FetchConfig {
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            user_agent: default_user_agent(),
        }
    }
}

fn default_timeout_secs() -> u64 {
    30
}
fn default_user_agent() -> String {
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36".to_string()
}

/// When the target chart is purged during a crawl run.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum PurgeMode {
    /// Delete the chart before fetching. A failed fetch leaves it empty
    /// until the next successful run.
    #[default]
    BeforeFetch,
    /// Delete the chart only once a non-empty normalized batch exists.
    AfterExtract,
}

#[derive(Debug, Deserialize, Clone)]
pub struct CrawlConfig {
    #[serde(default)]
    pub purge: PurgeMode,
    #[serde(default = "default_true")]
    pub auto_cleanup: bool,
    /// Age after which a crawl lease left by a dead process is taken over.
    #[serde(default = "default_lease_stale_secs")]
    pub lease_stale_secs: u64,
}

impl Default for CrawlConfig {
    fn default() -> Self {
        Self {
            purge: PurgeMode::default(),
            auto_cleanup: true,
            lease_stale_secs: default_lease_stale_secs(),
        }
    }
}

fn default_lease_stale_secs() -> u64 {
    900
}

const MAX_LEASE_STALE_SECS: u64 = 7 * 24 * 3600;

impl CrawlConfig {
    pub fn lease_stale_after(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.lease_stale_secs.min(MAX_LEASE_STALE_SECS) as i64)
    }
}

fn default_true() -> bool {
    true
}

/// One chart source: where to fetch it and how to read it.
#[derive(Debug, Deserialize, Clone)]
pub struct ChartSourceConfig {
    /// Extractor variant name (see [`ExtractorRegistry`]).
    pub extractor: String,
    /// `http(s)://`, `file://`, or `builtin:sample`.
    pub url: String,
    #[serde(default = "default_ceiling")]
    pub ceiling: u32,
    #[serde(default = "default_fallback_ceiling")]
    pub fallback_ceiling: u32,
    /// Whether `crawl all` includes this chart.
    #[serde(default = "default_true")]
    pub include_in_all: bool,
}

fn default_ceiling() -> u32 {
    50
}
fn default_fallback_ceiling() -> u32 {
    20
}

/// The built-in chart table.
pub fn default_charts() -> BTreeMap<String, ChartSourceConfig> {
    let mut charts = BTreeMap::new();
    charts.insert(
        "billboard-japan".to_string(),
        ChartSourceConfig {
            extractor: "billboard-japan".to_string(),
            url: "https://www.billboard-japan.com/charts/detail?a=hot100".to_string(),
            ceiling: 50,
            fallback_ceiling: 20,
            include_in_all: true,
        },
    );
    charts.insert(
        "oricon".to_string(),
        ChartSourceConfig {
            extractor: "oricon".to_string(),
            url: "https://www.oricon.co.jp/music/rankinglab/cos/2025-08-18/".to_string(),
            ceiling: 50,
            fallback_ceiling: 20,
            include_in_all: true,
        },
    );
    charts.insert(
        "test-chart".to_string(),
        ChartSourceConfig {
            extractor: "sample".to_string(),
            url: "builtin:sample".to_string(),
            ceiling: 50,
            fallback_ceiling: 20,
            include_in_all: false,
        },
    );
    charts
}

impl Config {
    /// A config with defaults everywhere and the database at `db_path`.
    pub fn with_db(db_path: impl Into<PathBuf>) -> Self {
        Self {
            db: DbConfig {
                path: db_path.into(),
            },
            fetch: FetchConfig::default(),
            crawl: CrawlConfig::default(),
            charts: default_charts(),
        }
    }

    /// Chart ids in configuration order.
    pub fn chart_ids(&self) -> Vec<String> {
        self.charts.keys().cloned().collect()
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

pub fn validate(config: &Config) -> Result<()> {
    if config.fetch.timeout_secs == 0 {
        bail!("fetch.timeout_secs must be > 0");
    }

    if !(1..=MAX_LEASE_STALE_SECS).contains(&config.crawl.lease_stale_secs) {
        bail!(
            "crawl.lease_stale_secs must be between 1 and {}",
            MAX_LEASE_STALE_SECS
        );
    }

    if config.charts.is_empty() {
        bail!("at least one [charts.<id>] section is required");
    }

    let registry = ExtractorRegistry::builtin();
    for (id, chart) in &config.charts {
        if id.trim().is_empty() {
            bail!("chart ids must not be blank");
        }
        if id == ALL_CHARTS {
            bail!(
                "'{}' is reserved for `charts crawl all` and cannot be a chart id",
                ALL_CHARTS
            );
        }
        if registry.get(&chart.extractor).is_none() {
            bail!(
                "charts.{}.extractor: unknown extractor '{}'. Available: {}",
                id,
                chart.extractor,
                registry.names().join(", ")
            );
        }
        if chart.url.trim().is_empty() {
            bail!("charts.{}.url must not be empty", id);
        }
        if chart.ceiling == 0 {
            bail!("charts.{}.ceiling must be > 0", id);
        }
        if chart.fallback_ceiling == 0 {
            bail!("charts.{}.fallback_ceiling must be > 0", id);
        }
    }

    Ok(())
}
