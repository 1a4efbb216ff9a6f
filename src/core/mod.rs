//! Core run logic.
//!
//! This module contains:
//! - Slug: display name -> filename-safe identifier
//! - KnownSet: persisted id -> first-seen date store
//! - Recency: which ids qualify for rendering
//! - Renderer: one Markdown artifact per item
//! - Lock: run-level mutual exclusion
//! - Orchestrator: the run sequence

pub mod known_set;
pub mod lock;
pub mod orchestrator;
pub mod recency;
pub mod renderer;
pub mod slug;

// Re-export commonly used types
pub use known_set::{legacy_first_seen, DatePolicy, KnownSet, LoadOutcome, StoreError};
pub use lock::{LockError, RunLock};
pub use orchestrator::{Mode, Orchestrator, RunSettings, SettingsError};
pub use recency::{select, Selection};
pub use renderer::{render, render_document, ExistingPolicy, RenderError, RenderOutcome};
pub use slug::slugify;
