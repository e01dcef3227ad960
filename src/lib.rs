//! # Chart Harness
//!
//! A music chart crawler. Chart Harness fetches chart pages, extracts
//! ranked song entries from their markup, normalizes them, upserts them into
//! SQLite keyed by `(title, artist, chart)`, and keeps the store clean with
//! a multi-pass cleanup engine.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌───────────┐   ┌───────────┐   ┌───────────┐   ┌─────────┐
//! │ Fetcher  │──▶│ Extractor │──▶│ Normalize │──▶│ Reconcile │──▶│ Cleanup │
//! │ http/file│   │ primary + │   │  (core)   │   │  (core)   │   │ (core)  │
//! └──────────┘   │ fallback  │   └───────────┘   └─────┬─────┘   └────┬────┘
//!                └───────────┘                         ▼              ▼
//!                                                  ┌──────────────────────┐
//!                                                  │   SQLite (songs)     │
//!                                                  └──────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! charts init                   # create database
//! charts crawl test-chart       # crawl the built-in sample chart
//! charts crawl all              # crawl every configured chart
//! charts list --chart oricon    # read one chart by ranking
//! charts cleanup auto           # run every cleanup pass
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema migrations |
//! | [`sqlite_store`] | SQLite [`ChartStore`](chart_harness_core::store::ChartStore) |
//! | [`fetch`] | Document fetching |
//! | [`extract`] | Extractor trait, helpers and registry |
//! | [`crawl`] | Crawl orchestration |
//! | [`lease`] | Per-chart crawl leases |
//! | [`progress`] | Crawl progress on stderr |
//! | [`cleanup_cmd`] | `charts cleanup` |
//! | [`songs`] | `charts list` / `charts add` |
//! | [`status`] | `charts status` |

pub mod cleanup_cmd;
pub mod config;
pub mod crawl;
pub mod db;
pub mod extract;
pub mod extract_billboard;
pub mod extract_oricon;
pub mod extract_sample;
pub mod fetch;
pub mod lease;
pub mod migrate;
pub mod progress;
pub mod songs;
pub mod sqlite_store;
pub mod status;
