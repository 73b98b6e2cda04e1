//! Dataset summary: time range, volume, order-level sale statistics and
//! customer mix, computed from each order's first touchpoint.

use crate::compare::round_to;
use attribution_core::error::{AttributionError, AttributionResult};
use attribution_core::types::{CustomerFlag, TouchpointTable};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use statrs::statistics::Statistics;
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetSummary {
    pub first_order_time: Option<NaiveDateTime>,
    pub last_order_time: Option<NaiveDateTime>,
    pub touchpoints: usize,
    pub orders: usize,
    /// Rounded to 2 decimals.
    pub touchpoints_per_order: f64,
    /// `None` when no first touchpoint carries a sale amount.
    pub sale_amount: Option<DescriptiveStats>,
    pub customer_mix: Vec<FlagCount>,
    pub histogram: Histogram,
}

/// count / mean / std / min / quartiles / max.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DescriptiveStats {
    pub count: usize,
    pub mean: f64,
    /// Sample standard deviation; `None` for fewer than two values.
    pub std: Option<f64>,
    pub min: f64,
    pub p25: f64,
    pub p50: f64,
    pub p75: f64,
    pub max: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlagCount {
    pub flag: CustomerFlag,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistogramBin {
    pub lower: f64,
    pub upper: f64,
    pub count: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Histogram {
    pub bins: Vec<HistogramBin>,
}

impl Histogram {
    /// Equal-width bins spanning `[min, max]`; the last bin is closed on the
    /// right. A single distinct value gets the range `value ± 0.5`.
    pub fn build(values: &[f64], bins: usize) -> Self {
        if values.is_empty() || bins == 0 {
            return Self::default();
        }

        let mut lo = values.iter().copied().fold(f64::INFINITY, f64::min);
        let mut hi = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        if lo == hi {
            lo -= 0.5;
            hi += 0.5;
        }
        // Edges are computed at half scale so `hi - lo` stays finite even
        // when the values span most of the f64 range.
        let half_lo = lo / 2.0;
        let half_width = (hi / 2.0 - half_lo) / bins as f64;
        let edge = |i: usize| 2.0 * (half_lo + half_width * i as f64);

        let mut counts = vec![0usize; bins];
        for v in values {
            let idx = (((v / 2.0 - half_lo) / half_width).floor() as usize).min(bins - 1);
            counts[idx] += 1;
        }

        Self {
            bins: counts
                .into_iter()
                .enumerate()
                .map(|(i, count)| HistogramBin {
                    lower: edge(i),
                    upper: if i + 1 == bins { hi } else { edge(i + 1) },
                    count,
                })
                .collect(),
        }
    }

    pub fn total(&self) -> usize {
        self.bins.iter().map(|b| b.count).sum()
    }

    pub fn max_count(&self) -> usize {
        self.bins.iter().map(|b| b.count).max().unwrap_or(0)
    }
}

impl DescriptiveStats {
    pub fn from_values(values: &[f64]) -> Option<Self> {
        if values.is_empty() {
            return None;
        }
        let mut sorted = values.to_vec();
        sorted.sort_by(|a, b| a.total_cmp(b));

        let std = if sorted.len() > 1 {
            Some(sorted.iter().std_dev())
        } else {
            None
        };

        Some(Self {
            count: sorted.len(),
            mean: sorted.iter().mean(),
            std,
            min: sorted[0],
            p25: quantile(&sorted, 0.25),
            p50: quantile(&sorted, 0.50),
            p75: quantile(&sorted, 0.75),
            max: sorted[sorted.len() - 1],
        })
    }
}

/// Linear interpolation between closest ranks on sorted input.
fn quantile(sorted: &[f64], q: f64) -> f64 {
    let pos = q * (sorted.len() - 1) as f64;
    let lower = pos.floor() as usize;
    let upper = pos.ceil() as usize;
    sorted[lower] + (sorted[upper] - sorted[lower]) * (pos - lower as f64)
}

/// Summarize the dataset. Order-level figures use position-0 rows so each
/// order is counted once.
pub fn summarize(table: &TouchpointTable, histogram_bins: usize) -> AttributionResult<DatasetSummary> {
    let orders = table.order_count();
    if orders == 0 {
        return Err(AttributionError::DivideByZero(format!(
            "touchpoints per order: no orders in {}",
            table.source().display()
        )));
    }

    let sales: Vec<f64> = table
        .first_touches()
        .filter_map(|t| t.sale_amount)
        .filter(|v| v.is_finite())
        .collect();

    let mut mix: BTreeMap<CustomerFlag, usize> = BTreeMap::new();
    for touch in table.first_touches() {
        *mix.entry(touch.new_customer).or_default() += 1;
    }
    let mut customer_mix: Vec<FlagCount> = mix
        .into_iter()
        .map(|(flag, count)| FlagCount { flag, count })
        .collect();
    customer_mix.sort_by(|a, b| b.count.cmp(&a.count).then(a.flag.cmp(&b.flag)));

    let range = table.time_range();

    Ok(DatasetSummary {
        first_order_time: range.map(|(min, _)| min),
        last_order_time: range.map(|(_, max)| max),
        touchpoints: table.len(),
        orders,
        touchpoints_per_order: round_to(table.len() as f64 / orders as f64, 2),
        sale_amount: DescriptiveStats::from_values(&sales),
        customer_mix,
        histogram: Histogram::build(&sales, histogram_bins),
    })
}
