//! limiteds - new-item detection and idempotent post rendering
//!
//! A run-once batch job that fetches limited item metadata from the public
//! catalog/economy APIs, records which ids it has seen before, and renders
//! one Markdown post per qualifying item.
//!
//! # Architecture
//!
//! A run is a straight pipeline:
//! - Load the known-set (id -> first-seen date)
//! - Fetch the current items from the configured feed
//! - Reconcile: new ids get a first-seen date, known ids keep theirs
//! - Select: ids new in this run, or first seen within a recency window
//! - Clean (window mode) or keep (append mode) the output directory
//! - Render one artifact per selected item
//! - Persist the known-set
//!
//! Nothing happens at load time; [`Orchestrator::run`] does all the work.
//!
//! # Modules
//!
//! - `adapters`: Upstream feeds and rate-limit handling
//! - `core`: Slugs, known-set, recency, rendering, orchestration
//! - `domain`: Data structures (ItemRecord, RunReport)
//! - `config`: Config file and environment resolution
//! - `cli`: Command-line interface
//!
//! # Usage
//!
//! ```bash
//! # Run with discovered config (.limiteds/config.yaml) or defaults
//! limiteds
//!
//! # Append-only mode, only ids new in this run
//! limiteds run --mode append --window-days 0
//!
//! # Inspect the known-set
//! limiteds known --limit 10
//! ```

pub mod adapters;
pub mod cli;
pub mod config;
pub mod core;
pub mod domain;

// Re-export main types at crate root for convenience
pub use adapters::{FetchError, ItemSource};
pub use core::{KnownSet, Mode, Orchestrator, RunSettings, Selection};
pub use domain::{ItemRecord, RawFeed, RunReport};
