//! Command-line interface for limiteds.
//!
//! Runs the fetch/reconcile/render job, shows the resolved configuration,
//! and lists the known-set.

use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::{NaiveDate, Utc};
use clap::{Args, Parser, Subcommand, ValueEnum};

use crate::config::{load_config, FeedKind, ResolvedConfig};
use crate::core::{KnownSet, Mode, Orchestrator};
use crate::domain::RunReport;

/// limiteds - render newly-seen limited items as site posts
#[derive(Parser, Debug)]
#[command(name = "limiteds")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Fetch items, update the known-set and render posts (default)
    Run(RunArgs),

    /// Show resolved configuration
    Config,

    /// List known items, newest first
    Known {
        /// Maximum number of entries to show
        #[arg(short, long, default_value = "20")]
        limit: usize,
    },
}

/// Overrides for a single run
#[derive(Args, Debug, Default)]
pub struct RunArgs {
    /// Upstream feed
    #[arg(long, value_enum)]
    pub feed: Option<FeedArg>,

    /// Operating mode
    #[arg(long, value_enum)]
    pub mode: Option<ModeArg>,

    /// Recency window in days (0 = only ids new in this run)
    #[arg(long)]
    pub window_days: Option<u32>,

    /// Known-set file
    #[arg(long)]
    pub known_file: Option<PathBuf>,

    /// Output directory for posts
    #[arg(long)]
    pub posts_dir: Option<PathBuf>,

    /// Evaluate the run as of this UTC date (YYYY-MM-DD)
    #[arg(long)]
    pub today: Option<NaiveDate>,

    /// Do not take the run lock
    #[arg(long)]
    pub no_lock: bool,
}

/// Feed for CLI (maps to FeedKind)
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum FeedArg {
    /// id -> value tuple mapping
    ItemDetails,

    /// Catalog search + economy details
    Catalog,
}

impl From<FeedArg> for FeedKind {
    fn from(f: FeedArg) -> Self {
        match f {
            FeedArg::ItemDetails => FeedKind::ItemDetails,
            FeedArg::Catalog => FeedKind::Catalog,
        }
    }
}

/// Mode for CLI (maps to Mode)
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum ModeArg {
    /// Rolling window, clean-slate render
    Window,

    /// Append-only, skip existing
    Append,
}

impl From<ModeArg> for Mode {
    fn from(m: ModeArg) -> Self {
        match m {
            ModeArg::Window => Mode::Window,
            ModeArg::Append => Mode::Append,
        }
    }
}

impl RunArgs {
    /// Layer flags over the resolved config
    pub fn apply(&self, config: &mut ResolvedConfig) {
        if let Some(feed) = self.feed {
            config.feed = feed.into();
        }
        if let Some(mode) = self.mode {
            config.mode = mode.into();
        }
        if let Some(days) = self.window_days {
            config.window_days = Some(days);
        }
        if let Some(ref path) = self.known_file {
            config.known_file = path.clone();
        }
        if let Some(ref path) = self.posts_dir {
            config.posts_dir = path.clone();
        }
        if self.no_lock {
            config.lock = false;
        }
    }
}

impl Cli {
    /// Execute the CLI command
    pub async fn execute(self) -> Result<()> {
        match self.command.unwrap_or(Commands::Run(RunArgs::default())) {
            Commands::Run(args) => run(args).await,
            Commands::Config => show_config(),
            Commands::Known { limit } => list_known(limit),
        }
    }
}

/// Run the job once
async fn run(args: RunArgs) -> Result<()> {
    let mut config = load_config()?;
    args.apply(&mut config);
    let today = args.today.unwrap_or_else(|| Utc::now().date_naive());

    println!(
        "Starting limiteds run ({} mode, {} feed, {})",
        config.mode, config.feed, today
    );

    let orchestrator = Orchestrator::new(config.item_source(), config.run_settings())?;
    let report = orchestrator.run(today).await?;

    print_summary(&report, &config);

    if let Some(ref error) = report.persist_error {
        anyhow::bail!("Known-set was not saved: {}", error);
    }

    Ok(())
}

fn print_summary(report: &RunReport, config: &ResolvedConfig) {
    println!("Fetched {} item(s)", report.fetched);
    println!(
        "{} new, {} qualifying",
        report.new_ids.len(),
        report.selected.len()
    );
    for path in &report.rendered {
        println!("  + {}", path.display());
    }
    if !report.skipped.is_empty() {
        println!("Skipped {} existing post(s)", report.skipped.len());
    }
    if !report.missing.is_empty() {
        println!(
            "{} qualifying item(s) absent from the feed: {}",
            report.missing.len(),
            report.missing.join(", ")
        );
    }
    for failure in &report.failed {
        eprintln!("  ! {}: {}", failure.item_id, failure.error);
    }

    let window = match config.selection() {
        crate::core::Selection::Window { days } => format!("the last {} days", days),
        crate::core::Selection::NewOnly => "new items".to_string(),
    };
    println!(
        "[Run {} completed: generated {} post(s) for {}]",
        report.run_id,
        report.rendered.len(),
        window
    );
}

/// Show resolved configuration
fn show_config() -> Result<()> {
    let cfg = load_config()?;

    println!("Limiteds Configuration");
    println!();
    println!(
        "Config file: {}",
        cfg.config_file
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "(none - using defaults)".to_string())
    );
    println!();
    println!("Feed:        {}", cfg.feed);
    println!("Mode:        {}", cfg.mode);
    println!("Selection:   {:?}", cfg.selection());
    println!("Lock:        {}", cfg.lock);
    println!();
    println!("Paths:");
    println!("  Known-set: {}", cfg.known_file.display());
    println!("  Posts:     {}", cfg.posts_dir.display());
    println!("  Keep:      {}", cfg.keep.join(", "));
    println!();
    println!("Upstream:");
    println!("  User agent:        {}", cfg.user_agent);
    println!("  Rate-limit wait:   {}s", cfg.rate_limit.default_wait_seconds);
    println!("  Catalog items:     {}", cfg.catalog.num_items);
    println!("  Catalog creator:   {}", cfg.catalog.creator_id);

    Ok(())
}

/// List known-set entries, newest first
fn list_known(limit: usize) -> Result<()> {
    let cfg = load_config()?;
    let (known, _) = KnownSet::load(&cfg.known_file)
        .with_context(|| format!("Failed to load {}", cfg.known_file.display()))?;

    if known.is_empty() {
        println!("No known items");
        return Ok(());
    }

    let rows = known_rows(&known);

    println!("{:<20} {:<12}", "ITEM ID", "FIRST SEEN");
    println!("{}", "-".repeat(33));
    for (id, first_seen) in rows.iter().take(limit) {
        println!("{:<20} {:<12}", id, first_seen);
    }
    if rows.len() > limit {
        println!("... {} more", rows.len() - limit);
    }

    Ok(())
}

/// Newest first, then undated legacy entries
fn known_rows(known: &KnownSet) -> Vec<(String, String)> {
    let mut entries: Vec<(&str, Option<NaiveDate>)> = known.entries().collect();
    // None sorts below every date, so reversing puts undated entries last
    entries.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));

    entries
        .into_iter()
        .map(|(id, date)| {
            let shown = date
                .map(|d| d.to_string())
                .unwrap_or_else(|| "(legacy)".to_string());
            (id.to_string(), shown)
        })
        .collect()
}
