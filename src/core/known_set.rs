//! Persisted record of every item id ever observed.
//!
//! The file is a single JSON document. Two shapes are accepted on load:
//!
//! ```text
//! ["100", "200"]                                  # legacy: seen-or-not
//! {"100": "2024-01-10", "200": "2024-01-03"}      # id -> first-seen date
//! ```
//!
//! Save always writes the object shape. Entries are never pruned and a
//! stored first-seen date is never changed.

use std::collections::{BTreeMap, BTreeSet};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, NaiveDate};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tempfile::NamedTempFile;
use thiserror::Error;
use tracing::{debug, warn};

use super::renderer::make_world_readable;
use crate::domain::ItemRecord;

/// Errors reading or writing the known-set file
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to read known-set {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to write known-set {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to serialize known-set: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// What `load` found on disk
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadOutcome {
    /// No file; starting empty
    Missing,
    /// Array of ids without dates
    Legacy,
    /// Object of id -> date
    Dated,
    /// Unreadable payload; starting empty
    Malformed(String),
}

/// Where a newly inserted id gets its first-seen date from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DatePolicy {
    /// The run date of the run that first saw the id
    Observed,
    /// The upstream creation date when present, else the run date
    Upstream,
}

/// First-seen date given to ids loaded from a legacy (undated) file.
///
/// They were seen at some unknown earlier time, so they sort before any
/// recency window and are never treated as new.
pub fn legacy_first_seen() -> NaiveDate {
    NaiveDate::from_ymd_opt(1970, 1, 1).unwrap_or(NaiveDate::MIN)
}

/// Result of merging one fetch into the store
#[derive(Debug, Clone, Default)]
pub struct Reconciliation {
    /// Ids added by this fetch
    pub inserted: BTreeSet<String>,
    /// Legacy ids given [`legacy_first_seen`]
    pub backfilled: usize,
}

/// In-memory known-set
#[derive(Debug, Clone, Default, PartialEq)]
pub struct KnownSet {
    entries: BTreeMap<String, Option<NaiveDate>>,
}

impl KnownSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load from disk. A missing or malformed file yields an empty store.
    pub fn load(path: &Path) -> Result<(Self, LoadOutcome), StoreError> {
        let content = match std::fs::read(path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "No known-set file, starting empty");
                return Ok((Self::new(), LoadOutcome::Missing));
            }
            Err(source) => {
                return Err(StoreError::Read {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };

        let (set, outcome) = Self::from_slice(&content);
        if let LoadOutcome::Malformed(ref reason) = outcome {
            warn!(path = %path.display(), %reason, "Malformed known-set, starting empty");
        }
        Ok((set, outcome))
    }

    /// Parse either accepted shape
    pub fn from_json(content: &str) -> (Self, LoadOutcome) {
        Self::from_slice(content.as_bytes())
    }

    /// Parse raw file bytes; invalid UTF-8 counts as malformed
    pub fn from_slice(content: &[u8]) -> (Self, LoadOutcome) {
        let value: Value = match serde_json::from_slice(content) {
            Ok(value) => value,
            Err(e) => return (Self::new(), LoadOutcome::Malformed(e.to_string())),
        };

        match value {
            Value::Array(ids) => {
                let mut entries = BTreeMap::new();
                for id in ids {
                    match id {
                        Value::String(id) => {
                            entries.insert(id, None);
                        }
                        other => {
                            return (
                                Self::new(),
                                LoadOutcome::Malformed(format!("non-string id in array: {}", other)),
                            )
                        }
                    }
                }
                (Self { entries }, LoadOutcome::Legacy)
            }
            Value::Object(map) => {
                let entries = map
                    .into_iter()
                    .map(|(id, date)| {
                        let parsed = date.as_str().and_then(parse_date);
                        if parsed.is_none() {
                            warn!(item_id = %id, value = %date, "Unreadable first-seen date");
                        }
                        (id, parsed)
                    })
                    .collect();
                (Self { entries }, LoadOutcome::Dated)
            }
            other => (
                Self::new(),
                LoadOutcome::Malformed(format!("expected array or object, found {}", kind(&other))),
            ),
        }
    }

    /// Merge a fetch into the store.
    ///
    /// Unknown ids are inserted with a date chosen by `policy`; known ids keep
    /// their stored date whatever the upstream record says. Undated entries
    /// are backfilled with [`legacy_first_seen`].
    pub fn reconcile(
        &mut self,
        items: &BTreeMap<String, ItemRecord>,
        today: NaiveDate,
        policy: DatePolicy,
    ) -> Reconciliation {
        let mut result = Reconciliation::default();

        for date in self.entries.values_mut().filter(|d| d.is_none()) {
            *date = Some(legacy_first_seen());
            result.backfilled += 1;
        }

        for (id, item) in items {
            if self.entries.contains_key(id) {
                continue;
            }
            let first_seen = match policy {
                DatePolicy::Observed => today,
                DatePolicy::Upstream => item
                    .created_at
                    .map(|at| at.date_naive())
                    .unwrap_or(today),
            };
            self.entries.insert(id.clone(), Some(first_seen));
            result.inserted.insert(id.clone());
        }

        result
    }

    /// First-seen date of an id, if known and dated
    pub fn first_seen(&self, id: &str) -> Option<NaiveDate> {
        self.entries.get(id).copied().flatten()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.entries.contains_key(id)
    }

    /// Dated entries only
    pub fn dated(&self) -> BTreeMap<String, NaiveDate> {
        self.entries
            .iter()
            .filter_map(|(id, date)| date.map(|d| (id.clone(), d)))
            .collect()
    }

    /// Every entry, undated ones included
    pub fn entries(&self) -> impl Iterator<Item = (&str, Option<NaiveDate>)> + '_ {
        self.entries.iter().map(|(id, date)| (id.as_str(), *date))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Serialize to the object shape; undated entries get [`legacy_first_seen`]
    pub fn to_json(&self) -> Result<String, StoreError> {
        let map: BTreeMap<&str, NaiveDate> = self
            .entries
            .iter()
            .map(|(id, date)| (id.as_str(), date.unwrap_or_else(legacy_first_seen)))
            .collect();
        Ok(serde_json::to_string_pretty(&map)?)
    }

    /// Write the full mapping, replacing the file atomically
    pub fn save(&self, path: &Path) -> Result<(), StoreError> {
        let content = self.to_json()?;
        let write_err = |source: io::Error| StoreError::Write {
            path: path.to_path_buf(),
            source,
        };

        let parent = match path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };
        std::fs::create_dir_all(parent).map_err(write_err)?;

        let mut tmp = NamedTempFile::new_in(parent).map_err(write_err)?;
        tmp.write_all(content.as_bytes()).map_err(write_err)?;
        tmp.write_all(b"\n").map_err(write_err)?;
        make_world_readable(tmp.as_file()).map_err(write_err)?;
        tmp.as_file().sync_all().map_err(write_err)?;
        tmp.persist(path).map_err(|e| write_err(e.error))?;

        debug!(path = %path.display(), entries = self.len(), "Saved known-set");
        Ok(())
    }
}

/// Accept `YYYY-MM-DD` or a full RFC 3339 timestamp
fn parse_date(value: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .or_else(|| {
            DateTime::parse_from_rfc3339(value)
                .ok()
                .map(|dt| dt.date_naive())
        })
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
