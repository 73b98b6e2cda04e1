//! Attribution report: runs the full analysis over a loaded dataset:
//! summary, positional and segmented models, time decay, and comparisons.

use crate::attribution::{self, CreditTable};
use crate::compare::{compare, ComparisonTable};
use crate::loader::load_touchpoints;
use crate::render;
use crate::summary::{summarize, DatasetSummary};
use attribution_core::config::AppConfig;
use attribution_core::error::AttributionResult;
use attribution_core::types::{AttributionPolicy, TouchpointTable};
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::Path;
use tracing::info;

/// Everything one run produces.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportOutput {
    pub source: String,
    pub summary: DatasetSummary,
    pub credit_tables: Vec<CreditTable>,
    pub comparisons: Vec<ComparisonTable>,
}

impl ReportOutput {
    pub fn credit_table(&self, policy: AttributionPolicy) -> Option<&CreditTable> {
        self.credit_tables.iter().find(|t| t.model == policy)
    }

    pub fn comparison(&self, title: &str) -> Option<&ComparisonTable> {
        self.comparisons.iter().find(|c| c.title == title)
    }
}

pub const FIRST_VS_LAST: &str = "First-touch vs last-touch";
pub const NEW_FIRST_VS_LAST: &str = "New customers: first-touch vs last-touch";
pub const RETURNING_FIRST_VS_LAST: &str = "Returning customers: first-touch vs last-touch";
pub const TIME_DECAY_VS_LAST: &str = "Time decay vs last-touch";

pub struct AttributionReport {
    config: AppConfig,
}

impl AttributionReport {
    pub fn new(config: AppConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Load `path` with the configured column mapping and run the report.
    pub fn run_file(&self, path: &Path) -> AttributionResult<ReportOutput> {
        let table = load_touchpoints(path, &self.config.columns)?;
        self.run(&table)
    }

    pub fn run(&self, table: &TouchpointTable) -> AttributionResult<ReportOutput> {
        let summary = summarize(table, self.config.render.histogram_bins)?;
        info!(
            touchpoints = summary.touchpoints,
            orders = summary.orders,
            touchpoints_per_order = summary.touchpoints_per_order,
            "Dataset summarized"
        );

        let compute = |policy: AttributionPolicy| -> AttributionResult<CreditTable> {
            let credits = attribution::attribute(table, policy, &self.config.attribution)?;
            info!(
                model = %policy,
                channels = credits.len(),
                total = credits.total(),
                "Credit table computed"
            );
            Ok(credits)
        };

        let last = compute(AttributionPolicy::Last)?;
        let first = compute(AttributionPolicy::First)?;
        let last_new = compute(AttributionPolicy::LastNew)?;
        let first_new = compute(AttributionPolicy::FirstNew)?;
        let last_old = compute(AttributionPolicy::LastOld)?;
        let first_old = compute(AttributionPolicy::FirstOld)?;
        let time_decay = compute(AttributionPolicy::TimeDecay)?;

        let comparisons = vec![
            compare(FIRST_VS_LAST, &first, &last),
            compare(NEW_FIRST_VS_LAST, &first_new, &last_new),
            compare(RETURNING_FIRST_VS_LAST, &first_old, &last_old),
            compare(TIME_DECAY_VS_LAST, &time_decay, &last),
        ];
        let credit_tables = vec![last, first, last_new, first_new, last_old, first_old, time_decay];

        Ok(ReportOutput {
            source: table.source().display().to_string(),
            summary,
            credit_tables,
            comparisons,
        })
    }

    /// Write `output` to `out` in the configured format.
    pub fn render<W: Write>(&self, output: &ReportOutput, out: &mut W) -> AttributionResult<()> {
        render::write_report(out, output, &self.config.render)
    }
}
