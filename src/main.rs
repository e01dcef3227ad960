//! # Chart Harness CLI (`charts`)
//!
//! The `charts` binary is the trigger surface for Chart Harness: database
//! initialization, crawl runs, cleanup passes, the read model and the
//! status probe. Scheduling is left to cron or systemd timers invoking
//! these commands.
//!
//! ## Usage
//!
//! ```bash
//! charts --config ./config/charts.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `charts init` | Create the SQLite database and schema |
//! | `charts crawl <chart>` | Crawl one chart (`all` for every chart in the "all" set) |
//! | `charts cleanup <pass>` | Run one cleanup pass or `auto` |
//! | `charts list` | Show stored songs |
//! | `charts add` | Add or re-rank one song by hand |
//! | `charts status` | Configured charts and what the store holds |
//!
//! ## Logging
//!
//! Diagnostics go to stderr through `tracing`, filtered by `RUST_LOG`
//! (default `info`). Reports go to stdout.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

use chart_harness_core::models::UpsertOutcome;

use chart_harness::cleanup_cmd::{self, CleanupTarget};
use chart_harness::config::{self, Config, ALL_CHARTS};
use chart_harness::crawl::{self, Crawler};
use chart_harness::fetch::SourceFetcher;
use chart_harness::lease::SqliteChartLeases;
use chart_harness::progress::ProgressMode;
use chart_harness::sqlite_store::SqliteChartStore;
use chart_harness::{db, migrate, songs, status};

/// Chart Harness CLI: crawl, normalize and clean music charts.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/charts.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "charts",
    about = "Chart Harness: a music chart crawler with identity-keyed upserts and cleanup passes",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/charts.toml")]
    config: PathBuf,

    /// Crawl progress on stderr. `auto` shows human progress on a TTY.
    #[arg(long, global = true, value_enum, default_value_t = ProgressArg::Auto)]
    progress: ProgressArg,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum ProgressArg {
    Auto,
    Off,
    Human,
    Json,
}

impl ProgressArg {
    fn mode(self) -> ProgressMode {
        match self {
            ProgressArg::Auto => ProgressMode::default_for_tty(),
            ProgressArg::Off => ProgressMode::Off,
            ProgressArg::Human => ProgressMode::Human,
            ProgressArg::Json => ProgressMode::Json,
        }
    }
}

/// Top-level CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema.
    ///
    /// Creates the SQLite database file and the `songs` table. This
    /// command is idempotent.
    Init,

    /// Crawl a chart: purge, fetch, extract, normalize, upsert, clean up.
    ///
    /// Exits non-zero if any run failed. A chart whose previous run is
    /// still in flight (in any process) is reported as busy.
    Crawl {
        /// Chart id from `[charts.<id>]`, or `all`.
        chart: String,
    },

    /// Run a cleanup pass.
    Cleanup {
        #[command(subcommand)]
        action: CleanupAction,
    },

    /// List stored songs.
    List {
        /// Only this chart, ordered by ranking.
        #[arg(long)]
        chart: Option<String>,

        /// Print JSON instead of a table.
        #[arg(long)]
        json: bool,
    },

    /// Add one song by hand (identity-keyed upsert).
    Add {
        #[arg(long)]
        title: String,
        #[arg(long)]
        artist: String,
        #[arg(long)]
        rank: u32,
        #[arg(long)]
        chart: String,
    },

    /// Show configured charts with record counts.
    Status,
}

/// Cleanup subcommands.
#[derive(Subcommand)]
enum CleanupAction {
    /// Delete records whose artist is "Unknown".
    Unknown,
    /// Keep only the newest record per (title, artist, chart).
    Duplicates,
    /// Keep only the newest record per ranking within one chart.
    SameRank { chart: String },
    /// Delete blank, one-character, or title == artist records.
    Invalid,
    /// Run every pass over all configured charts.
    Auto,
    /// Delete every record of one chart.
    Chart { chart: String },
    /// Delete every record.
    All {
        /// Required: confirm the full purge.
        #[arg(long)]
        yes: bool,
    },
}

impl CleanupAction {
    fn target(self) -> CleanupTarget {
        match self {
            CleanupAction::Unknown => CleanupTarget::Unknown,
            CleanupAction::Duplicates => CleanupTarget::Duplicates,
            CleanupAction::SameRank { chart } => CleanupTarget::SameRank(chart),
            CleanupAction::Invalid => CleanupTarget::Invalid,
            CleanupAction::Auto => CleanupTarget::Auto,
            CleanupAction::Chart { chart } => CleanupTarget::Chart(chart),
            CleanupAction::All { yes } => CleanupTarget::All { confirmed: yes },
        }
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

async fn open_store(cfg: &Config) -> Result<SqliteChartStore> {
    let pool = db::connect(cfg).await?;
    migrate::apply_schema(&pool).await?;
    Ok(SqliteChartStore::new(pool))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing();

    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            migrate::run_migrations(&cfg).await?;
            println!("Database initialized successfully.");
        }
        Commands::Crawl { chart } => {
            let store = open_store(&cfg).await?;
            let pool = store.pool().clone();
            let fetcher = SourceFetcher::new(&cfg.fetch).context("Failed to build HTTP client")?;
            let leases = SqliteChartLeases::new(pool.clone(), cfg.crawl.lease_stale_after());
            let crawler = Crawler::new(&cfg, Arc::new(store), Arc::new(fetcher))
                .with_reporter(Arc::from(cli.progress.mode().reporter()))
                .with_leases(Arc::new(leases));

            let reports = if chart == ALL_CHARTS {
                crawler.crawl_all().await
            } else {
                vec![crawler.crawl_chart(&chart).await?]
            };
            for report in &reports {
                crawl::print_report(report);
            }
            pool.close().await;

            let failed = reports.iter().filter(|r| r.is_failed()).count();
            if failed > 0 {
                anyhow::bail!("{} of {} crawl runs failed", failed, reports.len());
            }
        }
        Commands::Cleanup { action } => {
            let store = open_store(&cfg).await?;
            let outcome =
                cleanup_cmd::run_cleanup(&store, &action.target(), &cfg.chart_ids()).await?;
            cleanup_cmd::print_outcome(&outcome);
            store.pool().close().await;
        }
        Commands::List { chart, json } => {
            let store = open_store(&cfg).await?;
            let records = songs::list_songs(&store, chart.as_deref()).await?;
            songs::print_songs(&records, json)?;
            store.pool().close().await;
        }
        Commands::Add {
            title,
            artist,
            rank,
            chart,
        } => {
            let store = open_store(&cfg).await?;
            let outcome =
                songs::add_song(&store, &title, &artist, rank, &chart, Utc::now()).await?;
            match outcome {
                UpsertOutcome::Inserted(id) => println!("added song {}", id),
                UpsertOutcome::Updated(id) => println!("updated song {}", id),
            }
            store.pool().close().await;
        }
        Commands::Status => {
            let store = open_store(&cfg).await?;
            let rows = status::chart_status(&cfg, &store).await?;
            status::print_status(&rows);
            store.pool().close().await;
        }
    }

    Ok(())
}
