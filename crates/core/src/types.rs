use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::{Path, PathBuf};

/// Where a touchpoint sits in its order's journey.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PositionName {
    /// First touchpoint of the order.
    Originator,
    /// Touchpoint that converted the order.
    Converter,
    /// Any other label, kept verbatim.
    Intermediate(String),
}

impl PositionName {
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();
        match trimmed.to_ascii_uppercase().as_str() {
            "ORIGINATOR" => Self::Originator,
            "CONVERTER" => Self::Converter,
            _ => Self::Intermediate(trimmed.to_string()),
        }
    }
}

impl fmt::Display for PositionName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Originator => f.write_str("ORIGINATOR"),
            Self::Converter => f.write_str("CONVERTER"),
            Self::Intermediate(label) => f.write_str(label),
        }
    }
}

/// New-customer flag (`Y` / `N` in the source sheet).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CustomerFlag {
    New,
    Returning,
}

impl CustomerFlag {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_uppercase().as_str() {
            "Y" => Some(Self::New),
            "N" => Some(Self::Returning),
            _ => None,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            Self::New => "Y",
            Self::Returning => "N",
        }
    }
}

impl fmt::Display for CustomerFlag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// One marketing-channel interaction recorded against an order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Touchpoint {
    pub order_id: String,
    pub order_time: NaiveDateTime,
    /// Channel group name.
    pub channel: String,
    /// 0 for the first touch of the order.
    pub position: u32,
    pub position_name: PositionName,
    /// Only meaningful on the converting touchpoint.
    pub sale_amount: Option<f64>,
    pub new_customer: CustomerFlag,
    pub days_to_convert: Option<f64>,
}

/// Credit-assignment policy tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttributionPolicy {
    Last,
    First,
    LastNew,
    FirstNew,
    LastOld,
    FirstOld,
    TimeDecay,
}

impl AttributionPolicy {
    pub const ALL: [AttributionPolicy; 7] = [
        Self::Last,
        Self::First,
        Self::LastNew,
        Self::FirstNew,
        Self::LastOld,
        Self::FirstOld,
        Self::TimeDecay,
    ];

    pub fn tag(&self) -> &'static str {
        match self {
            Self::Last => "last",
            Self::First => "first",
            Self::LastNew => "last_new",
            Self::FirstNew => "first_new",
            Self::LastOld => "last_old",
            Self::FirstOld => "first_old",
            Self::TimeDecay => "time_decay",
        }
    }

    /// Customer segment the policy is restricted to, if any.
    pub fn segment(&self) -> Option<CustomerFlag> {
        match self {
            Self::LastNew | Self::FirstNew => Some(CustomerFlag::New),
            Self::LastOld | Self::FirstOld => Some(CustomerFlag::Returning),
            _ => None,
        }
    }

    /// Label used for the credit column when tables are compared.
    /// Segmented policies share the label of their unsegmented model.
    pub fn column_label(&self) -> String {
        let model = match self {
            Self::Last | Self::LastNew | Self::LastOld => "last",
            Self::First | Self::FirstNew | Self::FirstOld => "first",
            Self::TimeDecay => "time_decay",
        };
        format!("Credit_{model}")
    }
}

impl fmt::Display for AttributionPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// The loaded dataset. Read-only once built.
#[derive(Debug, Clone)]
pub struct TouchpointTable {
    source: PathBuf,
    rows: Vec<Touchpoint>,
}

impl TouchpointTable {
    pub fn new(source: impl Into<PathBuf>, rows: Vec<Touchpoint>) -> Self {
        Self {
            source: source.into(),
            rows,
        }
    }

    pub fn source(&self) -> &Path {
        &self.source
    }

    pub fn rows(&self) -> &[Touchpoint] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Number of distinct order ids.
    pub fn order_count(&self) -> usize {
        self.rows
            .iter()
            .map(|t| t.order_id.as_str())
            .collect::<BTreeSet<_>>()
            .len()
    }

    /// Earliest and latest order timestamp.
    pub fn time_range(&self) -> Option<(NaiveDateTime, NaiveDateTime)> {
        let min = self.rows.iter().map(|t| t.order_time).min()?;
        let max = self.rows.iter().map(|t| t.order_time).max()?;
        Some((min, max))
    }

    /// Rows at position 0, one per order.
    pub fn first_touches(&self) -> impl Iterator<Item = &Touchpoint> {
        self.rows.iter().filter(|t| t.position == 0)
    }

    /// Touchpoints grouped by order id, each group ordered by position.
    pub fn orders(&self) -> BTreeMap<&str, Vec<&Touchpoint>> {
        let mut orders: BTreeMap<&str, Vec<&Touchpoint>> = BTreeMap::new();
        for touch in &self.rows {
            orders.entry(touch.order_id.as_str()).or_default().push(touch);
        }
        for touches in orders.values_mut() {
            touches.sort_by_key(|t| t.position);
        }
        orders
    }
}
