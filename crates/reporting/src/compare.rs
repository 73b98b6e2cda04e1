//! Side-by-side comparison of two credit tables (full outer join on channel).

use crate::attribution::CreditTable;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparisonRow {
    pub channel: String,
    pub left: f64,
    pub right: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparisonTable {
    pub title: String,
    pub left_label: String,
    pub right_label: String,
    pub rows: Vec<ComparisonRow>,
}

/// Outer-join `left` and `right` on channel name. Channels missing from
/// either side get 0.0 credit. Rows are in channel-name order.
pub fn compare(title: impl Into<String>, left: &CreditTable, right: &CreditTable) -> ComparisonTable {
    let channels: BTreeSet<&str> = left.channels().chain(right.channels()).collect();

    let rows = channels
        .into_iter()
        .map(|channel| ComparisonRow {
            channel: channel.to_string(),
            left: left.share(channel),
            right: right.share(channel),
        })
        .collect();

    ComparisonTable {
        title: title.into(),
        left_label: left.model.column_label(),
        right_label: right.model.column_label(),
        rows,
    }
}

impl ComparisonTable {
    /// Display copy with every credit rounded to `precision` decimals.
    pub fn rounded(&self, precision: usize) -> ComparisonTable {
        ComparisonTable {
            rows: self
                .rows
                .iter()
                .map(|row| ComparisonRow {
                    channel: row.channel.clone(),
                    left: round_to(row.left, precision),
                    right: round_to(row.right, precision),
                })
                .collect(),
            ..self.clone()
        }
    }

    pub fn row(&self, channel: &str) -> Option<&ComparisonRow> {
        self.rows.iter().find(|r| r.channel == channel)
    }
}

pub fn round_to(value: f64, precision: usize) -> f64 {
    let factor = 10f64.powi(precision.min(15) as i32);
    (value * factor).round() / factor
}

#[cfg(test)]
mod tests {
    use super::*;
    use attribution_core::types::AttributionPolicy;
    use std::collections::BTreeMap;

    fn table(model: AttributionPolicy, shares: &[(&str, f64)]) -> CreditTable {
        CreditTable::new(
            model,
            shares
                .iter()
                .map(|(c, s)| (c.to_string(), *s))
                .collect::<BTreeMap<_, _>>(),
        )
    }

    #[test]
    fn test_outer_join_fills_zero() {
        let first = table(AttributionPolicy::First, &[("Search", 0.4), ("Email", 0.6)]);
        let last = table(AttributionPolicy::Last, &[("Search", 0.7), ("Display", 0.3)]);

        let merged = compare("first vs last", &first, &last);
        assert_eq!(merged.left_label, "Credit_first");
        assert_eq!(merged.right_label, "Credit_last");

        let channels: Vec<_> = merged.rows.iter().map(|r| r.channel.as_str()).collect();
        assert_eq!(channels, vec!["Display", "Email", "Search"]);

        let email = merged.row("Email").unwrap();
        assert_eq!((email.left, email.right), (0.6, 0.0));
        let display = merged.row("Display").unwrap();
        assert_eq!((display.left, display.right), (0.0, 0.3));
    }

    #[test]
    fn test_disjoint_tables_have_one_nonzero_column() {
        let a = table(AttributionPolicy::TimeDecay, &[("X", 0.5), ("Y", 0.5)]);
        let b = table(AttributionPolicy::Last, &[("Z", 1.0)]);

        let merged = compare("disjoint", &a, &b);
        assert_eq!(merged.rows.len(), 3);
        for row in &merged.rows {
            let nonzero = [row.left, row.right].iter().filter(|v| **v != 0.0).count();
            assert_eq!(nonzero, 1, "row {}", row.channel);
        }
    }

    #[test]
    fn test_rounding_is_display_only() {
        let a = table(AttributionPolicy::First, &[("Search", 2.0 / 3.0)]);
        let b = table(AttributionPolicy::Last, &[("Search", 1.0 / 3.0)]);
        let merged = compare("rounding", &a, &b);

        let shown = merged.rounded(3);
        assert_eq!(shown.rows[0].left, 0.667);
        assert_eq!(shown.rows[0].right, 0.333);
        assert!((merged.rows[0].left - 2.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_round_to() {
        assert_eq!(round_to(1.23456, 2), 1.23);
        assert_eq!(round_to(0.0005, 3), 0.001);
        assert_eq!(round_to(7.0, 0), 7.0);
    }
}
