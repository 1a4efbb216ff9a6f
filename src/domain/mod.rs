//! Domain types for the limiteds feed.
//!
//! This module contains the core data structures:
//! - Items: normalized upstream records and the raw feed shapes
//! - Run: run phases and the end-of-run report

pub mod item;
pub mod run;

// Re-export commonly used types
pub use item::{Demand, ItemRecord, RawFeed, Trend};
pub use run::{RenderFailure, RunPhase, RunReport};
