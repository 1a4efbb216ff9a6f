//! Configuration for limiteds runs.
//!
//! Configuration sources (highest priority first):
//! 1. CLI flags (applied by the caller on top of the resolved config)
//! 2. Environment variables (LIMITEDS_KNOWN_FILE, LIMITEDS_POSTS_DIR, LIMITEDS_MODE,
//!    LIMITEDS_WINDOW_DAYS)
//! 3. Config file (.limiteds/config.yaml)
//! 4. Defaults
//!
//! Config file discovery:
//! - Searches current directory and parents for .limiteds/config.yaml
//! - Falls back to <user config dir>/limiteds/config.yaml
//! - Paths in a project config file are relative to the project root (the
//!   parent of .limiteds/); paths in the user config are relative to the
//!   current directory

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::adapters::catalog::CatalogOptions;
use crate::adapters::{CatalogSource, ItemDetailsSource, ItemSource, RateLimitPolicy, DEFAULT_USER_AGENT};
use crate::core::{Mode, RunSettings, Selection};

const DEFAULT_WINDOW_DAYS: u32 = 7;
const DEFAULT_KNOWN_FILE: &str = "known_ids.json";
const DEFAULT_POSTS_DIR: &str = "_posts";

/// Which upstream feed to read
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeedKind {
    /// id -> value tuple mapping
    ItemDetails,
    /// Catalog search + economy details
    Catalog,
}

impl std::fmt::Display for FeedKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FeedKind::ItemDetails => write!(f, "item_details"),
            FeedKind::Catalog => write!(f, "catalog"),
        }
    }
}

/// Raw config file schema (matches YAML structure)
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConfigFile {
    #[serde(default)]
    pub version: Option<String>,
    pub feed: Option<FeedKind>,
    pub mode: Option<Mode>,
    /// 0 selects "new only"
    pub window_days: Option<u32>,
    pub known_file: Option<String>,
    pub posts_dir: Option<String>,
    /// Glob patterns the clean rule preserves
    pub keep: Option<Vec<String>>,
    pub lock: Option<bool>,
    pub user_agent: Option<String>,
    #[serde(default)]
    pub rate_limit: RateLimitPolicy,
    #[serde(default)]
    pub catalog: CatalogOptions,
}

/// Resolved configuration with concrete paths
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub feed: FeedKind,
    pub mode: Mode,
    pub window_days: Option<u32>,
    pub known_file: PathBuf,
    pub posts_dir: PathBuf,
    pub keep: Vec<String>,
    pub lock: bool,
    pub user_agent: String,
    pub rate_limit: RateLimitPolicy,
    pub catalog: CatalogOptions,
    /// Path to config file (if found)
    pub config_file: Option<PathBuf>,
}

impl ResolvedConfig {
    /// Built-in defaults with paths relative to `base_dir`
    pub fn with_defaults(base_dir: &Path) -> Self {
        Self {
            feed: FeedKind::ItemDetails,
            mode: Mode::Window,
            window_days: Some(DEFAULT_WINDOW_DAYS),
            known_file: base_dir.join(DEFAULT_KNOWN_FILE),
            posts_dir: base_dir.join(DEFAULT_POSTS_DIR),
            keep: vec![".gitkeep".to_string()],
            lock: true,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            rate_limit: RateLimitPolicy::default(),
            catalog: CatalogOptions::default(),
            config_file: None,
        }
    }

    /// Selection policy implied by `window_days`
    pub fn selection(&self) -> Selection {
        Selection::from_window_days(self.window_days)
    }

    /// Settings handed to the orchestrator
    pub fn run_settings(&self) -> RunSettings {
        RunSettings {
            mode: self.mode,
            selection: self.selection(),
            known_file: self.known_file.clone(),
            posts_dir: self.posts_dir.clone(),
            keep: self.keep.clone(),
            lock: self.lock,
        }
    }

    /// Build the configured item source
    pub fn item_source(&self) -> Box<dyn ItemSource> {
        match self.feed {
            FeedKind::ItemDetails => Box::new(ItemDetailsSource::new(
                &self.user_agent,
                self.rate_limit.clone(),
            )),
            FeedKind::Catalog => Box::new(CatalogSource::new(
                self.catalog.clone(),
                &self.user_agent,
                self.rate_limit.clone(),
            )),
        }
    }
}

/// Find config file by searching `start` and its parents
fn find_config_file(start: &Path) -> Option<PathBuf> {
    let mut current = start.to_path_buf();

    loop {
        let config_path = current.join(".limiteds").join("config.yaml");
        if config_path.exists() {
            return Some(config_path);
        }

        if !current.pop() {
            break;
        }
    }

    None
}

/// User-level config file, if present
fn user_config_file() -> Option<PathBuf> {
    let path = dirs::config_dir()?.join("limiteds").join("config.yaml");
    path.exists().then_some(path)
}

/// Load and parse config file
fn load_config_file(path: &Path) -> Result<ConfigFile> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    serde_yaml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))
}

/// Resolve a path that may be relative to `base`
fn resolve_path(base: &Path, path_str: &str) -> PathBuf {
    let path = PathBuf::from(path_str);
    if path.is_absolute() {
        path
    } else {
        base.join(path)
    }
}

/// Combine a parsed config file with environment overrides
fn resolve<F>(file: ConfigFile, base_dir: &Path, config_file: Option<PathBuf>, env: F) -> Result<ResolvedConfig>
where
    F: Fn(&str) -> Option<String>,
{
    let mut config = ResolvedConfig::with_defaults(base_dir);
    config.config_file = config_file;

    if let Some(feed) = file.feed {
        config.feed = feed;
    }
    if let Some(mode) = file.mode {
        config.mode = mode;
    }
    if let Some(days) = file.window_days {
        config.window_days = Some(days);
    }
    if let Some(ref path) = file.known_file {
        config.known_file = resolve_path(base_dir, path);
    }
    if let Some(ref path) = file.posts_dir {
        config.posts_dir = resolve_path(base_dir, path);
    }
    if let Some(keep) = file.keep {
        config.keep = keep;
    }
    if let Some(lock) = file.lock {
        config.lock = lock;
    }
    if let Some(agent) = file.user_agent {
        config.user_agent = agent;
    }
    config.rate_limit = file.rate_limit;
    config.catalog = file.catalog;

    if let Some(path) = env("LIMITEDS_KNOWN_FILE") {
        config.known_file = PathBuf::from(path);
    }
    if let Some(path) = env("LIMITEDS_POSTS_DIR") {
        config.posts_dir = PathBuf::from(path);
    }
    if let Some(mode) = env("LIMITEDS_MODE") {
        config.mode = mode.parse().context("Invalid LIMITEDS_MODE")?;
    }
    if let Some(days) = env("LIMITEDS_WINDOW_DAYS") {
        let days = days.trim().parse::<u32>().context("Invalid LIMITEDS_WINDOW_DAYS")?;
        config.window_days = Some(days);
    }

    Ok(config)
}

/// Load configuration from all sources
pub fn load_config() -> Result<ResolvedConfig> {
    let cwd = std::env::current_dir().context("Failed to determine current directory")?;

    if let Some(config_path) = find_config_file(&cwd) {
        let file = load_config_file(&config_path)?;
        // Base directory is the parent of .limiteds/
        let base_dir = config_path
            .parent()
            .and_then(|p| p.parent())
            .unwrap_or(Path::new("."))
            .to_path_buf();
        return resolve(file, &base_dir, Some(config_path), |k| std::env::var(k).ok());
    }

    if let Some(config_path) = user_config_file() {
        let file = load_config_file(&config_path)?;
        return resolve(file, &cwd, Some(config_path), |k| std::env::var(k).ok());
    }

    resolve(ConfigFile::default(), &cwd, None, |k| std::env::var(k).ok())
}
