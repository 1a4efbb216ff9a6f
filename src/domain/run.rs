//! Run phases and the end-of-run report.
//!
//! A run is a single pass: fetch, reconcile, clean or keep the output
//! directory, render, persist.

use std::fmt;
use std::path::PathBuf;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Phase of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunPhase {
    Idle,
    Fetching,
    Reconciling,
    /// Wipe the output directory except the keep-list
    Cleaning,
    /// Leave existing artifacts in place
    Keeping,
    Rendering,
    Persisting,
}

impl RunPhase {
    /// Whether `next` is a legal successor of this phase
    pub fn can_advance_to(self, next: RunPhase) -> bool {
        use RunPhase::*;
        matches!(
            (self, next),
            (Idle, Fetching)
                | (Fetching, Reconciling)
                | (Reconciling, Cleaning)
                | (Reconciling, Keeping)
                | (Cleaning, Rendering)
                | (Keeping, Rendering)
                | (Rendering, Persisting)
                | (Persisting, Idle)
        )
    }
}

impl fmt::Display for RunPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RunPhase::Idle => "idle",
            RunPhase::Fetching => "fetching",
            RunPhase::Reconciling => "reconciling",
            RunPhase::Cleaning => "cleaning",
            RunPhase::Keeping => "keeping",
            RunPhase::Rendering => "rendering",
            RunPhase::Persisting => "persisting",
        };
        write!(f, "{}", name)
    }
}

/// An item whose artifact could not be written
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenderFailure {
    pub item_id: String,
    pub error: String,
}

/// Outcome of one completed run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub run_id: Uuid,

    /// UTC calendar date the run was evaluated against
    pub today: NaiveDate,

    /// Items returned by the feed after normalization
    pub fetched: usize,

    /// Ids inserted into the known-set by this run
    pub new_ids: Vec<String>,

    /// Ids chosen for rendering
    pub selected: Vec<String>,

    /// Artifacts written
    pub rendered: Vec<PathBuf>,

    /// Artifacts left alone because they already existed
    pub skipped: Vec<PathBuf>,

    /// Artifacts removed by the clean rule
    pub removed: usize,

    /// Selected ids absent from the current feed
    pub missing: Vec<String>,

    pub failed: Vec<RenderFailure>,

    /// Set when the known-set could not be written
    pub persist_error: Option<String>,
}

impl RunReport {
    pub fn new(run_id: Uuid, today: NaiveDate) -> Self {
        Self {
            run_id,
            today,
            fetched: 0,
            new_ids: Vec::new(),
            selected: Vec::new(),
            rendered: Vec::new(),
            skipped: Vec::new(),
            removed: 0,
            missing: Vec::new(),
            failed: Vec::new(),
            persist_error: None,
        }
    }

    /// True when every artifact was written and the known-set persisted
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty() && self.persist_error.is_none()
    }
}
