//! Channel attribution: last-touch, first-touch and time-decay credit tables,
//! optionally restricted to new or returning customers.

use attribution_core::config::{AttributionConfig, ZeroWeightPolicy};
use attribution_core::error::{AttributionError, AttributionResult};
use attribution_core::types::{AttributionPolicy, CustomerFlag, PositionName, TouchpointTable};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, warn};

/// Channel → credit share for one attribution model.
///
/// Channels that received no credit are absent; [`CreditTable::share`]
/// reads them as 0.0.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreditTable {
    pub model: AttributionPolicy,
    pub shares: BTreeMap<String, f64>,
}

impl CreditTable {
    pub fn new(model: AttributionPolicy, shares: BTreeMap<String, f64>) -> Self {
        Self { model, shares }
    }

    pub fn share(&self, channel: &str) -> f64 {
        self.shares.get(channel).copied().unwrap_or(0.0)
    }

    pub fn total(&self) -> f64 {
        self.shares.values().sum()
    }

    /// Channels in name order.
    pub fn channels(&self) -> impl Iterator<Item = &str> {
        self.shares.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.shares.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shares.is_empty()
    }
}

/// Compute the credit table for `policy`.
pub fn attribute(
    table: &TouchpointTable,
    policy: AttributionPolicy,
    config: &AttributionConfig,
) -> AttributionResult<CreditTable> {
    match policy {
        AttributionPolicy::Last => last_touch(table),
        AttributionPolicy::First => first_touch(table),
        AttributionPolicy::LastNew => segmented_last_touch(table, CustomerFlag::New),
        AttributionPolicy::FirstNew => segmented_first_touch(table, CustomerFlag::New),
        AttributionPolicy::LastOld => segmented_last_touch(table, CustomerFlag::Returning),
        AttributionPolicy::FirstOld => segmented_first_touch(table, CustomerFlag::Returning),
        AttributionPolicy::TimeDecay => time_decay(table, config),
    }
}

/// Share of orders whose converting touchpoint came from each channel.
pub fn last_touch(table: &TouchpointTable) -> AttributionResult<CreditTable> {
    let orders = table.order_count();
    positional(table, PositionName::Converter, None, orders, AttributionPolicy::Last)
}

/// Share of orders whose originating touchpoint came from each channel.
pub fn first_touch(table: &TouchpointTable) -> AttributionResult<CreditTable> {
    let orders = table.order_count();
    positional(table, PositionName::Originator, None, orders, AttributionPolicy::First)
}

/// Last-touch restricted to one customer segment, normalized by the
/// segment's converting orders.
pub fn segmented_last_touch(
    table: &TouchpointTable,
    segment: CustomerFlag,
) -> AttributionResult<CreditTable> {
    let policy = match segment {
        CustomerFlag::New => AttributionPolicy::LastNew,
        CustomerFlag::Returning => AttributionPolicy::LastOld,
    };
    let converting = converting_orders(table, segment);
    positional(table, PositionName::Converter, Some(segment), converting, policy)
}

/// First-touch restricted to one customer segment, normalized by the
/// segment's converting orders.
pub fn segmented_first_touch(
    table: &TouchpointTable,
    segment: CustomerFlag,
) -> AttributionResult<CreditTable> {
    let policy = match segment {
        CustomerFlag::New => AttributionPolicy::FirstNew,
        CustomerFlag::Returning => AttributionPolicy::FirstOld,
    };
    let converting = converting_orders(table, segment);
    positional(table, PositionName::Originator, Some(segment), converting, policy)
}

/// Number of CONVERTER rows carrying `segment`.
pub fn converting_orders(table: &TouchpointTable, segment: CustomerFlag) -> usize {
    table
        .rows()
        .iter()
        .filter(|t| t.position_name == PositionName::Converter && t.new_customer == segment)
        .count()
}

fn positional(
    table: &TouchpointTable,
    position: PositionName,
    segment: Option<CustomerFlag>,
    denominator: usize,
    model: AttributionPolicy,
) -> AttributionResult<CreditTable> {
    if denominator == 0 {
        let scope = match segment {
            Some(CustomerFlag::New) => "new-customer segment has no converting orders",
            Some(CustomerFlag::Returning) => "returning-customer segment has no converting orders",
            None => "dataset has no orders",
        };
        return Err(AttributionError::DivideByZero(format!("{model} attribution: {scope}")));
    }

    let mut counts: BTreeMap<String, usize> = BTreeMap::new();
    for touch in table.rows().iter().filter(|t| {
        t.position_name == position && segment.map_or(true, |s| t.new_customer == s)
    }) {
        *counts.entry(touch.channel.clone()).or_default() += 1;
    }

    let shares = counts
        .into_iter()
        .map(|(channel, count)| (channel, count as f64 / denominator as f64))
        .collect();

    debug!(model = %model, denominator, "Positional attribution computed");
    Ok(CreditTable::new(model, shares))
}

/// Raw decay weight: halves every `half_life_days` before conversion.
/// Missing or non-finite day counts weigh nothing.
pub fn decay_weight(days_to_convert: Option<f64>, half_life_days: f64) -> f64 {
    match days_to_convert {
        Some(days) if days.is_finite() => 2f64.powf(-days / half_life_days),
        _ => 0.0,
    }
}

/// Per-order normalized decay credits, keyed by order id, in the order's
/// position sequence as `(channel, credit)`.
///
/// Orders whose raw weights sum to zero follow the configured
/// [`ZeroWeightPolicy`]; skipped orders map to an empty vector. A weight
/// total that overflows (e.g. a large negative day count) cannot be
/// normalized and fails with `DivideByZero` naming the order.
pub fn normalized_decay_credits<'a>(
    table: &'a TouchpointTable,
    config: &AttributionConfig,
) -> AttributionResult<BTreeMap<&'a str, Vec<(&'a str, f64)>>> {
    let mut credits = BTreeMap::new();

    for (order_id, touches) in table.orders() {
        let weights: Vec<f64> = touches
            .iter()
            .map(|t| decay_weight(t.days_to_convert, config.half_life_days))
            .collect();
        let total: f64 = weights.iter().sum();

        if !total.is_finite() {
            return Err(AttributionError::DivideByZero(format!(
                "time_decay attribution: order {order_id} has a non-finite decay weight total"
            )));
        }

        let normalized: Vec<(&str, f64)> = if total > 0.0 {
            touches
                .iter()
                .zip(&weights)
                .map(|(t, w)| (t.channel.as_str(), w / total))
                .collect()
        } else {
            match config.zero_weight_policy {
                ZeroWeightPolicy::Uniform => {
                    warn!(order_id, "Order has zero decay weight; splitting credit uniformly");
                    let even = 1.0 / touches.len() as f64;
                    touches.iter().map(|t| (t.channel.as_str(), even)).collect()
                }
                ZeroWeightPolicy::Skip => {
                    warn!(order_id, "Order has zero decay weight; skipping its credit");
                    Vec::new()
                }
            }
        };

        credits.insert(order_id, normalized);
    }

    Ok(credits)
}

/// Sum of normalized decay credits per order (1.0 unless skipped).
pub fn order_credit_sums<'a>(
    table: &'a TouchpointTable,
    config: &AttributionConfig,
) -> AttributionResult<BTreeMap<&'a str, f64>> {
    Ok(normalized_decay_credits(table, config)?
        .into_iter()
        .map(|(order_id, credits)| (order_id, credits.iter().map(|(_, c)| c).sum()))
        .collect())
}

/// Time-decay attribution: normalized per-order credits summed per channel
/// and divided by the total order count.
pub fn time_decay(
    table: &TouchpointTable,
    config: &AttributionConfig,
) -> AttributionResult<CreditTable> {
    let orders = table.order_count();
    if orders == 0 {
        return Err(AttributionError::DivideByZero(
            "time_decay attribution: dataset has no orders".to_string(),
        ));
    }

    let mut sums: BTreeMap<String, f64> = BTreeMap::new();
    for credits in normalized_decay_credits(table, config)?.into_values() {
        for (channel, credit) in credits {
            *sums.entry(channel.to_string()).or_default() += credit;
        }
    }

    for share in sums.values_mut() {
        *share /= orders as f64;
    }

    debug!(
        orders,
        half_life_days = config.half_life_days,
        "Time-decay attribution computed"
    );
    Ok(CreditTable::new(AttributionPolicy::TimeDecay, sums))
}

#[cfg(test)]
mod tests {
    use super::*;
    use attribution_core::types::Touchpoint;
    use chrono::NaiveDate;

    const EPS: f64 = 1e-9;

    fn touch(
        order: &str,
        position: u32,
        name: PositionName,
        channel: &str,
        flag: CustomerFlag,
        days: Option<f64>,
    ) -> Touchpoint {
        Touchpoint {
            order_id: order.to_string(),
            order_time: NaiveDate::from_ymd_opt(2024, 1, 1)
                .unwrap()
                .and_hms_opt(0, 0, 0)
                .unwrap(),
            channel: channel.to_string(),
            position,
            position_name: name,
            sale_amount: Some(100.0),
            new_customer: flag,
            days_to_convert: days,
        }
    }

    /// Orders A (Search→Search), B (Display→Search), C (Display→Display).
    fn three_orders() -> TouchpointTable {
        use CustomerFlag::*;
        use PositionName::*;
        TouchpointTable::new(
            "three.csv",
            vec![
                touch("A", 0, Originator, "Search", New, Some(2.0)),
                touch("A", 1, Converter, "Search", New, Some(0.0)),
                touch("B", 0, Originator, "Display", New, Some(7.0)),
                touch("B", 1, Converter, "Search", New, Some(0.0)),
                touch("C", 0, Originator, "Display", Returning, Some(1.0)),
                touch("C", 1, Converter, "Display", Returning, Some(0.0)),
            ],
        )
    }

    #[test]
    fn test_last_touch_three_orders() {
        let table = last_touch(&three_orders()).unwrap();
        assert!((table.share("Search") - 2.0 / 3.0).abs() < EPS);
        assert!((table.share("Display") - 1.0 / 3.0).abs() < EPS);
        assert!((table.total() - 1.0).abs() < 0.001);
        assert_eq!(table.channels().collect::<Vec<_>>(), vec!["Display", "Search"]);
    }

    #[test]
    fn test_first_touch_three_orders() {
        let table = first_touch(&three_orders()).unwrap();
        assert!((table.share("Search") - 1.0 / 3.0).abs() < EPS);
        assert!((table.share("Display") - 2.0 / 3.0).abs() < EPS);
        assert_eq!(table.model, AttributionPolicy::First);
    }

    #[test]
    fn test_absent_channel_reads_as_zero() {
        let table = last_touch(&three_orders()).unwrap();
        assert_eq!(table.len(), 2);
        assert_eq!(table.share("Email"), 0.0);
    }

    #[test]
    fn test_segmented_tables_normalize_by_segment() {
        let data = three_orders();

        let last_new = segmented_last_touch(&data, CustomerFlag::New).unwrap();
        assert_eq!(last_new.model, AttributionPolicy::LastNew);
        assert!((last_new.share("Search") - 1.0).abs() < EPS);
        assert!((last_new.total() - 1.0).abs() < 0.001);

        let first_new = segmented_first_touch(&data, CustomerFlag::New).unwrap();
        assert!((first_new.share("Search") - 0.5).abs() < EPS);
        assert!((first_new.share("Display") - 0.5).abs() < EPS);

        let last_old = segmented_last_touch(&data, CustomerFlag::Returning).unwrap();
        assert!((last_old.share("Display") - 1.0).abs() < EPS);
        assert_eq!(converting_orders(&data, CustomerFlag::Returning), 1);
    }

    #[test]
    fn test_empty_segment_is_divide_by_zero() {
        use CustomerFlag::*;
        use PositionName::*;
        let data = TouchpointTable::new(
            "only-new.csv",
            vec![touch("A", 0, Converter, "Search", New, Some(0.0))],
        );
        let err = segmented_first_touch(&data, Returning).unwrap_err();
        assert!(matches!(err, AttributionError::DivideByZero(_)));
        assert!(err.to_string().contains("returning-customer"));
    }

    #[test]
    fn test_empty_dataset_is_divide_by_zero() {
        let data = TouchpointTable::new("empty.csv", Vec::new());
        assert!(matches!(last_touch(&data), Err(AttributionError::DivideByZero(_))));
        assert!(matches!(
            time_decay(&data, &AttributionConfig::default()),
            Err(AttributionError::DivideByZero(_))
        ));
    }

    #[test]
    fn test_decay_weight_half_life() {
        assert!((decay_weight(Some(0.0), 7.0) - 1.0).abs() < EPS);
        assert!((decay_weight(Some(7.0), 7.0) - 0.5).abs() < EPS);
        assert!((decay_weight(Some(14.0), 7.0) - 0.25).abs() < EPS);
        assert!(decay_weight(Some(3.0), 7.0) > decay_weight(Some(4.0), 7.0));
        assert_eq!(decay_weight(None, 7.0), 0.0);
        assert_eq!(decay_weight(Some(f64::NAN), 7.0), 0.0);
    }

    #[test]
    fn test_time_decay_two_touch_order() {
        use CustomerFlag::*;
        use PositionName::*;
        let data = TouchpointTable::new(
            "single.csv",
            vec![
                touch("A", 0, Originator, "Y", New, Some(7.0)),
                touch("A", 1, Converter, "X", New, Some(0.0)),
            ],
        );
        let table = time_decay(&data, &AttributionConfig::default()).unwrap();
        assert!((table.share("X") - 2.0 / 3.0).abs() < EPS);
        assert!((table.share("Y") - 1.0 / 3.0).abs() < EPS);
    }

    #[test]
    fn test_time_decay_per_order_sums() {
        let data = three_orders();
        let config = AttributionConfig::default();
        for (order, sum) in order_credit_sums(&data, &config).unwrap() {
            assert!((sum - 1.0).abs() < EPS, "order {order} sums to {sum}");
        }
        let table = time_decay(&data, &config).unwrap();
        assert!((table.total() - 1.0).abs() < 0.001);
    }

    #[test]
    fn test_zero_weight_order_policies() {
        use CustomerFlag::*;
        use PositionName::*;
        let data = TouchpointTable::new(
            "missing-days.csv",
            vec![
                touch("A", 0, Originator, "Search", New, None),
                touch("A", 1, Converter, "Email", New, None),
                touch("B", 0, Converter, "Email", New, Some(0.0)),
            ],
        );

        let uniform = AttributionConfig::default();
        let table = time_decay(&data, &uniform).unwrap();
        assert!((table.share("Search") - 0.25).abs() < EPS);
        assert!((table.share("Email") - 0.75).abs() < EPS);
        assert!(table.shares.values().all(|s| s.is_finite()));

        let skip = AttributionConfig {
            zero_weight_policy: ZeroWeightPolicy::Skip,
            ..AttributionConfig::default()
        };
        let table = time_decay(&data, &skip).unwrap();
        assert_eq!(table.share("Search"), 0.0);
        assert!((table.share("Email") - 0.5).abs() < EPS);
        assert_eq!(order_credit_sums(&data, &skip).unwrap()["A"], 0.0);
    }

    #[test]
    fn test_attribute_dispatch() {
        let data = three_orders();
        let config = AttributionConfig::default();
        for policy in AttributionPolicy::ALL {
            let table = attribute(&data, policy, &config).unwrap();
            assert_eq!(table.model, policy);
        }
    }

    #[test]
    fn test_overflowing_decay_weight_is_an_error() {
        use CustomerFlag::*;
        use PositionName::*;
        let data = TouchpointTable::new(
            "negative-days.csv",
            vec![
                touch("A", 0, Originator, "X", New, Some(-8000.0)),
                touch("A", 1, Converter, "Y", New, Some(0.0)),
            ],
        );

        let err = time_decay(&data, &AttributionConfig::default()).unwrap_err();
        assert!(matches!(err, AttributionError::DivideByZero(_)));
        assert!(err.to_string().contains("order A"), "{err}");
        assert!(order_credit_sums(&data, &AttributionConfig::default()).is_err());
    }
}
