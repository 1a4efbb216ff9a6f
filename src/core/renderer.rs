//! Markdown artifacts, one per item.
//!
//! Each artifact is named `{date}-{slug}.md` and carries a small front-matter
//! block followed by one bullet per populated item field:
//!
//! ```text
//! ---
//! title: 'Red Hat'
//! date: 2024-01-10T00:00:00Z
//! ---
//! - **ID**: 100
//! - **RAP**: 50
//! - **Value**: 60
//! ```
//!
//! The document is built in memory and written through a temp file in the
//! output directory, then renamed into place.

use std::fmt::Write as _;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use chrono::{NaiveDate, SecondsFormat};
use glob::Pattern;
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use thiserror::Error;
use tracing::debug;

use super::slug::slugify;
use crate::domain::ItemRecord;

/// What to do when the target file already exists
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExistingPolicy {
    /// Leave the file alone and report `Skipped`
    Skip,
    /// Replace it
    Overwrite,
}

/// Result of a single render
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenderOutcome {
    Written(PathBuf),
    Skipped(PathBuf),
}

impl RenderOutcome {
    pub fn path(&self) -> &Path {
        match self {
            RenderOutcome::Written(p) | RenderOutcome::Skipped(p) => p,
        }
    }
}

#[derive(Debug, Error)]
#[error("failed to write artifact {path}: {source}")]
pub struct RenderError {
    pub path: PathBuf,
    #[source]
    pub source: io::Error,
}

/// `{date}-{slug}.md`; falls back to `item-{id}` when the name slugs to nothing
pub fn artifact_filename(item: &ItemRecord, date: NaiveDate) -> String {
    let mut slug = slugify(&item.name);
    if slug.is_empty() {
        slug = format!("item-{}", slugify(&item.id));
    }
    format!("{}-{}.md", date.format("%Y-%m-%d"), slug)
}

/// Double every single quote so the title stays a valid quoted scalar
pub fn escape_title(name: &str) -> String {
    name.replace('\'', "''")
}

/// Build the full document text
pub fn render_document(item: &ItemRecord, date: NaiveDate) -> String {
    let mut doc = String::new();
    doc.push_str("---\n");
    let _ = writeln!(doc, "title: '{}'", escape_title(&item.name));
    let _ = writeln!(doc, "date: {}T00:00:00Z", date.format("%Y-%m-%d"));
    doc.push_str("---\n");

    let mut bullet = |label: &str, value: String| {
        let _ = writeln!(doc, "- **{}**: {}", label, value);
    };

    bullet("ID", item.id.clone());
    if let Some(rap) = item.rap {
        bullet("RAP", rap.to_string());
    }
    if let Some(value) = item.value {
        bullet("Value", value.to_string());
    }
    if let Some(demand) = item.demand {
        bullet("Demand", demand.to_string());
    }
    if let Some(trend) = item.trend {
        bullet("Trend", trend.to_string());
    }
    if let Some(projected) = item.projected {
        bullet("Projected", projected.to_string());
    }
    if let Some(hyped) = item.hyped {
        bullet("Hyped", hyped.to_string());
    }
    if let Some(rare) = item.rare {
        bullet("Rare", rare.to_string());
    }
    if let Some(price) = item.price {
        bullet("Price", format!("{} Robux", price));
    }
    if let Some(remaining) = item.remaining {
        bullet("Remaining", remaining.to_string());
    }
    if let Some(created_at) = item.created_at {
        bullet("Created", created_at.to_rfc3339_opts(SecondsFormat::Secs, true));
    }

    doc
}

/// Render one item into `output_dir`
pub fn render(
    item: &ItemRecord,
    effective_date: NaiveDate,
    output_dir: &Path,
    policy: ExistingPolicy,
) -> Result<RenderOutcome, RenderError> {
    let path = output_dir.join(artifact_filename(item, effective_date));
    if policy == ExistingPolicy::Skip && path.exists() {
        return Ok(RenderOutcome::Skipped(path));
    }

    let content = render_document(item, effective_date);
    let err = |source: io::Error| RenderError {
        path: path.clone(),
        source,
    };

    let mut tmp = NamedTempFile::new_in(output_dir).map_err(err)?;
    tmp.write_all(content.as_bytes()).map_err(err)?;
    tmp.flush().map_err(err)?;
    make_world_readable(tmp.as_file()).map_err(err)?;

    match policy {
        ExistingPolicy::Overwrite => {
            tmp.persist(&path).map_err(|e| err(e.error))?;
        }
        ExistingPolicy::Skip => match tmp.persist_noclobber(&path) {
            Ok(_) => {}
            Err(e) if e.error.kind() == io::ErrorKind::AlreadyExists => {
                return Ok(RenderOutcome::Skipped(path));
            }
            Err(e) => return Err(err(e.error)),
        },
    }

    Ok(RenderOutcome::Written(path))
}

/// Temp files are created owner-only; published files should not be
#[cfg(unix)]
pub(crate) fn make_world_readable(file: &std::fs::File) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    file.set_permissions(std::fs::Permissions::from_mode(0o644))
}

#[cfg(not(unix))]
pub(crate) fn make_world_readable(_file: &std::fs::File) -> io::Result<()> {
    Ok(())
}

/// Remove every regular file in `dir` whose name matches none of `keep`.
///
/// Subdirectories are left alone. Returns the number of files removed.
pub fn clean_output(dir: &Path, keep: &[Pattern]) -> io::Result<usize> {
    let mut removed = 0;
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        let name = entry.file_name();
        let name = name.to_string_lossy();
        if keep.iter().any(|p| p.matches(&name)) {
            debug!(file = %name, "Keeping file");
            continue;
        }
        std::fs::remove_file(entry.path())?;
        removed += 1;
    }
    Ok(removed)
}
