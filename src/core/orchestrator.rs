//! Run orchestrator.
//!
//! Sequences one run: load the known-set, fetch, reconcile, clean or keep the
//! output directory, render the selected items, persist the known-set.
//!
//! A fetch failure ends the run before anything on disk changes. Render
//! failures are collected per item and the run continues. A persist failure
//! is recorded in the report; artifacts already written stay in place.

use std::collections::HashSet;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use glob::Pattern;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use crate::adapters::ItemSource;
use crate::domain::{RenderFailure, RunPhase, RunReport};

use super::known_set::{DatePolicy, KnownSet, LoadOutcome};
use super::lock::RunLock;
use super::recency::Selection;
use super::renderer::{clean_output, render, ExistingPolicy, RenderOutcome};

/// Operating mode, fixed per deployment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    /// Rolling window, clean-slate render. First-seen is the observation date.
    Window,
    /// Append-only, skip existing. First-seen trusts the upstream timestamp.
    Append,
}

impl Mode {
    pub fn date_policy(self) -> DatePolicy {
        match self {
            Mode::Window => DatePolicy::Observed,
            Mode::Append => DatePolicy::Upstream,
        }
    }

    pub fn existing_policy(self) -> ExistingPolicy {
        match self {
            Mode::Window => ExistingPolicy::Overwrite,
            Mode::Append => ExistingPolicy::Skip,
        }
    }

    /// Whether the output directory is wiped before rendering
    pub fn cleans_output(self) -> bool {
        matches!(self, Mode::Window)
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mode::Window => write!(f, "window"),
            Mode::Append => write!(f, "append"),
        }
    }
}

impl FromStr for Mode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "window" | "a" | "rolling" => Ok(Mode::Window),
            "append" | "b" | "append-only" => Ok(Mode::Append),
            _ => anyhow::bail!("Unknown mode: {}", s),
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SettingsError {
    #[error("window mode renders the recency window and needs window_days > 0")]
    WindowModeWithoutWindow,

    #[error("invalid keep pattern '{pattern}': {reason}")]
    KeepPattern { pattern: String, reason: String },
}

/// Everything a run needs besides the item source
#[derive(Debug, Clone)]
pub struct RunSettings {
    pub mode: Mode,
    pub selection: Selection,
    pub known_file: PathBuf,
    pub posts_dir: PathBuf,
    /// Glob patterns of file names the clean rule preserves
    pub keep: Vec<String>,
    /// Hold an exclusive lock for the whole run
    pub lock: bool,
}

impl RunSettings {
    /// Check mode/selection compatibility and compile the keep-list
    pub fn validate(&self) -> Result<Vec<Pattern>, SettingsError> {
        if self.mode == Mode::Window && self.selection == Selection::NewOnly {
            return Err(SettingsError::WindowModeWithoutWindow);
        }

        self.keep
            .iter()
            .map(|p| {
                Pattern::new(p).map_err(|e| SettingsError::KeepPattern {
                    pattern: p.clone(),
                    reason: e.to_string(),
                })
            })
            .collect()
    }
}

/// Main run orchestrator
pub struct Orchestrator {
    source: Box<dyn ItemSource>,
    settings: RunSettings,
    keep: Vec<Pattern>,
}

impl Orchestrator {
    /// Create an orchestrator, rejecting invalid settings up front
    pub fn new(source: Box<dyn ItemSource>, settings: RunSettings) -> Result<Self, SettingsError> {
        let keep = settings.validate()?;
        Ok(Self {
            source,
            settings,
            keep,
        })
    }

    pub fn settings(&self) -> &RunSettings {
        &self.settings
    }

    /// Execute one run evaluated against `today`
    #[instrument(skip(self), fields(feed = self.source.name(), mode = %self.settings.mode))]
    pub async fn run(&self, today: NaiveDate) -> Result<RunReport> {
        let run_id = Uuid::new_v4();
        let mut report = RunReport::new(run_id, today);
        let mut phase = RunPhase::Idle;
        info!(%run_id, %today, "Starting run");

        let _lock = if self.settings.lock {
            let path = RunLock::path_for(&self.settings.known_file);
            Some(RunLock::acquire(&path)?)
        } else {
            None
        };

        let (mut known, outcome) = KnownSet::load(&self.settings.known_file)
            .context("Failed to load known-set")?;
        debug!(?outcome, entries = known.len(), "Loaded known-set");
        if outcome == LoadOutcome::Legacy {
            info!("Known-set is in legacy id-list form; it will be rewritten with dates");
        }

        advance(&mut phase, RunPhase::Fetching);
        let raw = self
            .source
            .fetch_items()
            .await
            .with_context(|| format!("Failed to fetch items from {}", self.source.name()))?;
        let items = raw.normalize();
        report.fetched = items.len();
        info!(fetched = report.fetched, "Fetched items");

        advance(&mut phase, RunPhase::Reconciling);
        let reconciliation = known.reconcile(&items, today, self.settings.mode.date_policy());
        let selected = self
            .settings
            .selection
            .apply(&known.dated(), &reconciliation.inserted, today);
        report.new_ids = reconciliation.inserted.iter().cloned().collect();
        report.selected = selected.iter().cloned().collect();
        info!(
            new = report.new_ids.len(),
            qualifying = report.selected.len(),
            backfilled = reconciliation.backfilled,
            "Reconciled known-set"
        );

        let posts_dir = &self.settings.posts_dir;
        std::fs::create_dir_all(posts_dir)
            .with_context(|| format!("Failed to create posts directory: {}", posts_dir.display()))?;

        if self.settings.mode.cleans_output() {
            advance(&mut phase, RunPhase::Cleaning);
            report.removed = clean_output(posts_dir, &self.keep)
                .with_context(|| format!("Failed to clean posts directory: {}", posts_dir.display()))?;
            info!(removed = report.removed, "Cleaned posts directory");
        } else {
            advance(&mut phase, RunPhase::Keeping);
        }

        advance(&mut phase, RunPhase::Rendering);
        let policy = self.settings.mode.existing_policy();
        let mut touched: HashSet<PathBuf> = HashSet::new();

        for id in &selected {
            let Some(item) = items.get(id) else {
                warn!(item_id = %id, "Selected item missing from current feed, not rendered");
                report.missing.push(id.clone());
                continue;
            };
            let Some(first_seen) = known.first_seen(id) else {
                continue;
            };

            match render(item, first_seen, posts_dir, policy) {
                Ok(outcome) => {
                    if !touched.insert(outcome.path().to_path_buf()) {
                        warn!(
                            item_id = %id,
                            path = %outcome.path().display(),
                            "Artifact name collides with another item rendered this run"
                        );
                    }
                    match outcome {
                        RenderOutcome::Written(path) => {
                            debug!(item_id = %id, path = %path.display(), "Rendered artifact");
                            report.rendered.push(path);
                        }
                        RenderOutcome::Skipped(path) => {
                            debug!(item_id = %id, path = %path.display(), "Artifact exists, skipped");
                            report.skipped.push(path);
                        }
                    }
                }
                Err(e) => {
                    warn!(item_id = %id, error = %e, "Failed to render artifact");
                    report.failed.push(RenderFailure {
                        item_id: id.clone(),
                        error: e.to_string(),
                    });
                }
            }
        }
        info!(
            rendered = report.rendered.len(),
            skipped = report.skipped.len(),
            failed = report.failed.len(),
            "Rendered artifacts"
        );

        advance(&mut phase, RunPhase::Persisting);
        if let Err(e) = known.save(&self.settings.known_file) {
            error!(error = %e, "Failed to persist known-set; rendered artifacts stand");
            report.persist_error = Some(e.to_string());
        }

        advance(&mut phase, RunPhase::Idle);
        info!(%run_id, "Run completed");
        Ok(report)
    }
}

fn advance(phase: &mut RunPhase, next: RunPhase) {
    debug_assert!(phase.can_advance_to(next), "illegal transition {} -> {}", phase, next);
    debug!(from = %phase, to = %next, "Run phase");
    *phase = next;
}
