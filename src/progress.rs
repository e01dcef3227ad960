//! Crawl progress reporting.
//!
//! Reports observable progress during `charts crawl` so users see which
//! stage each chart is in, which extraction strategy matched, and how far
//! the upsert has come. Progress is emitted on **stderr** so stdout remains
//! parseable for scripts.

use std::io::Write;

use crate::crawl::CrawlStage;
use crate::extract::Strategy;

/// A single progress event for a crawl run.
#[derive(Clone, Debug)]
pub enum CrawlProgressEvent {
    /// The run for `chart` entered `stage`.
    Stage { chart: String, stage: CrawlStage },
    /// Extraction finished.
    Extracted {
        chart: String,
        strategy: Strategy,
        entries: u64,
        skipped: u64,
    },
    /// Upsert phase: n entries written out of total.
    Upserting { chart: String, n: u64, total: u64 },
}

/// Reports crawl progress. Implementations write to stderr (human or JSON).
pub trait CrawlProgressReporter: Send + Sync {
    /// Emit a progress event. Called from the crawl orchestrator.
    fn report(&self, event: CrawlProgressEvent);
}

/// Human-friendly progress on stderr: "crawl oricon  upsert  12 / 50 entries".
pub struct StderrProgress;

impl StderrProgress {
    fn line(event: &CrawlProgressEvent) -> String {
        match event {
            CrawlProgressEvent::Stage { chart, stage } => format!("crawl {}  {}...\n", chart, stage),
            CrawlProgressEvent::Extracted {
                chart,
                strategy,
                entries,
                skipped,
            } => format!(
                "crawl {}  extracted  {} entries ({} strategy, {} skipped)\n",
                chart,
                format_number(*entries),
                strategy,
                format_number(*skipped)
            ),
            CrawlProgressEvent::Upserting { chart, n, total } => format!(
                "crawl {}  upsert  {} / {} entries\n",
                chart,
                format_number(*n),
                format_number(*total)
            ),
        }
    }
}

impl CrawlProgressReporter for StderrProgress {
    fn report(&self, event: CrawlProgressEvent) {
        let line = Self::line(&event);
        let mut stderr = std::io::stderr().lock();
        let _ = stderr.write_all(line.as_bytes());
        let _ = stderr.flush();
    }
}

/// Machine-readable progress: one JSON object per line on stderr.
pub struct JsonProgress;

impl JsonProgress {
    fn object(event: &CrawlProgressEvent) -> serde_json::Value {
        match event {
            CrawlProgressEvent::Stage { chart, stage } => serde_json::json!({
                "event": "stage",
                "chart": chart,
                "stage": stage.as_str(),
            }),
            CrawlProgressEvent::Extracted {
                chart,
                strategy,
                entries,
                skipped,
            } => serde_json::json!({
                "event": "extracted",
                "chart": chart,
                "strategy": strategy,
                "entries": entries,
                "skipped": skipped,
            }),
            CrawlProgressEvent::Upserting { chart, n, total } => serde_json::json!({
                "event": "progress",
                "chart": chart,
                "stage": CrawlStage::Upsert.as_str(),
                "n": n,
                "total": total,
            }),
        }
    }
}

impl CrawlProgressReporter for JsonProgress {
    fn report(&self, event: CrawlProgressEvent) {
        if let Ok(line) = serde_json::to_string(&Self::object(&event)) {
            let mut stderr = std::io::stderr().lock();
            let _ = writeln!(stderr, "{}", line);
            let _ = stderr.flush();
        }
    }
}

/// No-op reporter when progress is disabled.
pub struct NoProgress;

impl CrawlProgressReporter for NoProgress {
    fn report(&self, _event: CrawlProgressEvent) {}
}

fn format_number(n: u64) -> String {
    let s = n.to_string();
    let mut result = String::with_capacity(s.len() + (s.len() - 1) / 3);
    for (i, c) in s.chars().rev().enumerate() {
        if i > 0 && i % 3 == 0 {
            result.push(',');
        }
        result.push(c);
    }
    result.chars().rev().collect()
}

/// Progress mode for the CLI: off, human (stderr), or JSON (stderr).
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ProgressMode {
    Off,
    Human,
    Json,
}

impl ProgressMode {
    /// Default: human progress when stderr is a TTY, otherwise off.
    pub fn default_for_tty() -> Self {
        if atty::is(atty::Stream::Stderr) {
            ProgressMode::Human
        } else {
            ProgressMode::Off
        }
    }

    pub fn reporter(&self) -> Box<dyn CrawlProgressReporter> {
        match self {
            ProgressMode::Off => Box::new(NoProgress),
            ProgressMode::Human => Box::new(StderrProgress),
            ProgressMode::Json => Box::new(JsonProgress),
        }
    }
}
