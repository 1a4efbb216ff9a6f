//! Item records as seen in a single run.
//!
//! Upstream feeds come in two shapes: a mapping of id to a positional value
//! tuple, or a sequence of already-structured records. Both are normalized
//! into [`ItemRecord`] before anything else looks at them.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

/// One upstream item's attributes for a given run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemRecord {
    /// Opaque identifier, stable across runs
    pub id: String,

    /// Display name
    pub name: String,

    /// Recent average price
    pub rap: Option<i64>,

    /// Community value
    pub value: Option<i64>,

    pub demand: Option<Demand>,

    pub trend: Option<Trend>,

    pub projected: Option<bool>,

    pub hyped: Option<bool>,

    pub rare: Option<bool>,

    /// Original sale price in Robux
    pub price: Option<i64>,

    /// Copies left for sale
    pub remaining: Option<i64>,

    /// Upstream creation timestamp
    pub created_at: Option<DateTime<Utc>>,
}

impl ItemRecord {
    /// Create a record with only the required fields set
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            rap: None,
            value: None,
            demand: None,
            trend: None,
            projected: None,
            hyped: None,
            rare: None,
            price: None,
            remaining: None,
            created_at: None,
        }
    }

    /// Set RAP and value
    pub fn with_prices(mut self, rap: i64, value: i64) -> Self {
        self.rap = Some(rap);
        self.value = Some(value);
        self
    }

    /// Set the upstream creation timestamp
    pub fn with_created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = Some(created_at);
        self
    }

    /// Build a record from an item-details tuple:
    /// `[name, acronym, rap, value, default_value, demand, trend, projected, hyped, rare]`
    ///
    /// Returns `None` when the tuple has no string name.
    pub fn from_tuple(id: &str, fields: &[Value]) -> Option<Self> {
        let name = fields.first()?.as_str()?;
        let number = |idx: usize| {
            fields
                .get(idx)
                .and_then(Value::as_i64)
                .filter(|n| *n >= 0)
        };
        let code = |idx: usize| fields.get(idx).and_then(Value::as_i64);

        Some(Self {
            rap: number(2),
            value: number(3),
            demand: code(5).and_then(Demand::from_code),
            trend: code(6).and_then(Trend::from_code),
            projected: code(7).and_then(flag),
            hyped: code(8).and_then(flag),
            rare: code(9).and_then(flag),
            ..Self::new(id, name)
        })
    }
}

/// Upstream encodes booleans as 1 / -1
fn flag(code: i64) -> Option<bool> {
    match code {
        1 => Some(true),
        -1 => Some(false),
        _ => None,
    }
}

/// Demand rating
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Demand {
    Terrible,
    Low,
    Normal,
    High,
    Amazing,
}

impl Demand {
    /// Decode the upstream numeric code (`-1` means unrated)
    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            0 => Some(Self::Terrible),
            1 => Some(Self::Low),
            2 => Some(Self::Normal),
            3 => Some(Self::High),
            4 => Some(Self::Amazing),
            _ => None,
        }
    }
}

impl fmt::Display for Demand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Demand::Terrible => write!(f, "Terrible"),
            Demand::Low => write!(f, "Low"),
            Demand::Normal => write!(f, "Normal"),
            Demand::High => write!(f, "High"),
            Demand::Amazing => write!(f, "Amazing"),
        }
    }
}

/// Price trend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Trend {
    Lowering,
    Unstable,
    Stable,
    Raising,
    Fluctuating,
}

impl Trend {
    /// Decode the upstream numeric code (`-1` means unrated)
    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            0 => Some(Self::Lowering),
            1 => Some(Self::Unstable),
            2 => Some(Self::Stable),
            3 => Some(Self::Raising),
            4 => Some(Self::Fluctuating),
            _ => None,
        }
    }
}

impl fmt::Display for Trend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Trend::Lowering => write!(f, "Lowering"),
            Trend::Unstable => write!(f, "Unstable"),
            Trend::Stable => write!(f, "Stable"),
            Trend::Raising => write!(f, "Raising"),
            Trend::Fluctuating => write!(f, "Fluctuating"),
        }
    }
}

/// Raw payload from an item source, before normalization
#[derive(Debug, Clone)]
pub enum RawFeed {
    /// id -> positional value tuple
    Tuples(BTreeMap<String, Vec<Value>>),

    /// Already-structured records
    Records(Vec<ItemRecord>),
}

impl RawFeed {
    /// Normalize either shape into records keyed by id.
    ///
    /// Duplicate ids keep the last record seen.
    pub fn normalize(self) -> BTreeMap<String, ItemRecord> {
        match self {
            RawFeed::Tuples(tuples) => tuples
                .into_iter()
                .filter_map(|(id, fields)| {
                    let record = ItemRecord::from_tuple(&id, &fields);
                    if record.is_none() {
                        warn!(item_id = %id, "Dropping item tuple without a name");
                    }
                    record.map(|r| (id, r))
                })
                .collect(),
            RawFeed::Records(records) => records.into_iter().map(|r| (r.id.clone(), r)).collect(),
        }
    }

    /// Number of raw entries
    pub fn len(&self) -> usize {
        match self {
            RawFeed::Tuples(t) => t.len(),
            RawFeed::Records(r) => r.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
