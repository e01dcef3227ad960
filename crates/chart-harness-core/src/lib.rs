//! # Chart Harness Core
//!
//! Shared, I/O-free logic for Chart Harness: chart data models, entry
//! normalization, the store abstraction, the identity-keyed upsert engine,
//! and the multi-pass cleanup engine.
//!
//! This crate contains no tokio, sqlx, HTTP, or filesystem dependencies.
//! Every operation runs against the [`store::ChartStore`] trait, so the
//! whole reconcile/cleanup pipeline is testable with
//! [`store::memory::InMemoryChartStore`].

pub mod cleanup;
pub mod models;
pub mod normalize;
pub mod reconcile;
pub mod store;
