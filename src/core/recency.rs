//! Which known items qualify for rendering in a run.
//!
//! Two policies, chosen by configuration:
//! - `NewOnly`: exactly the ids inserted by this run
//! - `Window { days }`: every id first seen on or after `today - days`

use std::collections::{BTreeMap, BTreeSet};

use chrono::{Days, NaiveDate};
use serde::{Deserialize, Serialize};

/// Selection policy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Selection {
    NewOnly,
    Window { days: u32 },
}

impl Selection {
    /// Map a configured window length to a policy; 0 or absent means `NewOnly`
    pub fn from_window_days(days: Option<u32>) -> Self {
        match days {
            Some(days) if days > 0 => Self::Window { days },
            _ => Self::NewOnly,
        }
    }

    /// Apply the policy
    pub fn apply(
        &self,
        known: &BTreeMap<String, NaiveDate>,
        inserted: &BTreeSet<String>,
        today: NaiveDate,
    ) -> BTreeSet<String> {
        match *self {
            Selection::NewOnly => inserted.clone(),
            Selection::Window { days } => select(known, days, today),
        }
    }
}

/// Earliest first-seen date still inside a window of `days`.
///
/// Windows reaching past the earliest representable date start there.
pub fn window_start(days: u32, today: NaiveDate) -> NaiveDate {
    today
        .checked_sub_days(Days::new(u64::from(days)))
        .unwrap_or(NaiveDate::MIN)
}

/// Ids whose first-seen date is on or after `today - window_days`
pub fn select(
    known: &BTreeMap<String, NaiveDate>,
    window_days: u32,
    today: NaiveDate,
) -> BTreeSet<String> {
    let cutoff = window_start(window_days, today);
    known
        .iter()
        .filter(|(_, first_seen)| **first_seen >= cutoff)
        .map(|(id, _)| id.clone())
        .collect()
}
