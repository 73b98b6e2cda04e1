//! Console rendering of a report: comfy-table tables and a text histogram,
//! or a single JSON document.

use crate::attribution::CreditTable;
use crate::compare::ComparisonTable;
use crate::report::ReportOutput;
use crate::summary::{DatasetSummary, Histogram};
use attribution_core::config::{OutputFormat, RenderConfig};
use attribution_core::error::AttributionResult;
use attribution_core::types::AttributionPolicy;
use comfy_table::{Cell, CellAlignment, ContentArrangement, Table};
use std::io::Write;

const BAR: char = '█';

pub fn write_report<W: Write>(
    out: &mut W,
    report: &ReportOutput,
    config: &RenderConfig,
) -> AttributionResult<()> {
    match config.format {
        OutputFormat::Json => {
            serde_json::to_writer_pretty(&mut *out, report)?;
            writeln!(out)?;
        }
        OutputFormat::Table => {
            writeln!(out, "Source: {}", report.source)?;
            write_summary(out, &report.summary, config)?;

            for policy in [
                AttributionPolicy::Last,
                AttributionPolicy::First,
                AttributionPolicy::TimeDecay,
            ] {
                if let Some(credits) = report.credit_table(policy) {
                    write_credit_table(out, credits, config)?;
                }
            }
            for comparison in &report.comparisons {
                write_comparison(out, comparison, config)?;
            }
        }
    }
    Ok(())
}

fn new_table(config: &RenderConfig) -> Table {
    let mut table = Table::new();
    table.load_preset(comfy_table::presets::UTF8_FULL);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_width(config.table_width);
    table
}

fn number(value: f64, precision: usize) -> Cell {
    Cell::new(format!("{value:.precision$}")).set_alignment(CellAlignment::Right)
}

pub fn write_summary<W: Write>(
    out: &mut W,
    summary: &DatasetSummary,
    config: &RenderConfig,
) -> AttributionResult<()> {
    let precision = config.summary_precision;

    match (summary.first_order_time, summary.last_order_time) {
        (Some(first), Some(last)) => writeln!(out, "Time range: {first} to {last}")?,
        _ => writeln!(out, "Time range: n/a")?,
    }
    writeln!(out, "Number of touchpoints: {}", summary.touchpoints)?;
    writeln!(out, "Number of orders: {}", summary.orders)?;
    writeln!(
        out,
        "Number of touchpoints per order: {:.2}",
        summary.touchpoints_per_order
    )?;

    writeln!(out, "\nSale amount per order (first touchpoints)")?;
    match &summary.sale_amount {
        Some(stats) => {
            let mut table = new_table(config);
            table.set_header(vec![Cell::new("statistic"), Cell::new("Sale Amount")]);
            table.add_row(vec![
                Cell::new("count"),
                Cell::new(stats.count).set_alignment(CellAlignment::Right),
            ]);
            table.add_row(vec![Cell::new("mean"), number(stats.mean, precision)]);
            table.add_row(vec![
                Cell::new("std"),
                match stats.std {
                    Some(std) => number(std, precision),
                    None => Cell::new("n/a").set_alignment(CellAlignment::Right),
                },
            ]);
            table.add_row(vec![Cell::new("min"), number(stats.min, precision)]);
            table.add_row(vec![Cell::new("25%"), number(stats.p25, precision)]);
            table.add_row(vec![Cell::new("50%"), number(stats.p50, precision)]);
            table.add_row(vec![Cell::new("75%"), number(stats.p75, precision)]);
            table.add_row(vec![Cell::new("max"), number(stats.max, precision)]);
            writeln!(out, "{table}")?;
        }
        None => writeln!(out, "no sale amounts recorded")?,
    }

    let mut mix = new_table(config);
    mix.set_header(vec![Cell::new("New Customer"), Cell::new("orders")]);
    for entry in &summary.customer_mix {
        mix.add_row(vec![
            Cell::new(entry.flag.code()),
            Cell::new(entry.count).set_alignment(CellAlignment::Right),
        ]);
    }
    writeln!(out, "\nCustomer mix (first touchpoints)")?;
    writeln!(out, "{mix}")?;

    writeln!(
        out,
        "\nSale amount distribution ({} bins)",
        summary.histogram.bins.len()
    )?;
    write_histogram(out, &summary.histogram, config.histogram_width)?;
    Ok(())
}

/// One line per bin: `[lower, upper) bar count`.
pub fn write_histogram<W: Write>(
    out: &mut W,
    histogram: &Histogram,
    width: usize,
) -> AttributionResult<()> {
    let max = histogram.max_count();
    if max == 0 {
        writeln!(out, "(no data)")?;
        return Ok(());
    }

    for bin in &histogram.bins {
        let len = (bin.count * width + max / 2) / max;
        let bar: String = std::iter::repeat(BAR).take(len).collect();
        writeln!(
            out,
            "[{:>12.2}, {:>12.2}) {:<width$} {}",
            bin.lower, bin.upper, bar, bin.count
        )?;
    }
    Ok(())
}

fn credit_title(policy: AttributionPolicy) -> &'static str {
    match policy {
        AttributionPolicy::Last => "Last-touch attribution",
        AttributionPolicy::First => "First-touch attribution",
        AttributionPolicy::LastNew => "Last-touch attribution (new customers)",
        AttributionPolicy::FirstNew => "First-touch attribution (new customers)",
        AttributionPolicy::LastOld => "Last-touch attribution (returning customers)",
        AttributionPolicy::FirstOld => "First-touch attribution (returning customers)",
        AttributionPolicy::TimeDecay => "Time-decay attribution",
    }
}

pub fn write_credit_table<W: Write>(
    out: &mut W,
    credits: &CreditTable,
    config: &RenderConfig,
) -> AttributionResult<()> {
    let mut table = new_table(config);
    table.set_header(vec![Cell::new("Group Name"), Cell::new(credits.model.column_label())]);
    for (channel, share) in &credits.shares {
        table.add_row(vec![
            Cell::new(channel),
            number(*share, config.display_precision),
        ]);
    }

    writeln!(out, "\n{}", credit_title(credits.model))?;
    writeln!(out, "{table}")?;
    Ok(())
}

pub fn write_comparison<W: Write>(
    out: &mut W,
    comparison: &ComparisonTable,
    config: &RenderConfig,
) -> AttributionResult<()> {
    let shown = comparison.rounded(config.display_precision);

    let mut table = new_table(config);
    table.set_header(vec![
        Cell::new("Group Name"),
        Cell::new(&shown.left_label),
        Cell::new(&shown.right_label),
    ]);
    for row in &shown.rows {
        table.add_row(vec![
            Cell::new(&row.channel),
            number(row.left, config.display_precision),
            number(row.right, config.display_precision),
        ]);
    }

    writeln!(out, "\n{}", shown.title)?;
    writeln!(out, "{table}")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::summary::HistogramBin;
    use std::collections::BTreeMap;

    fn render_to_string(f: impl FnOnce(&mut Vec<u8>) -> AttributionResult<()>) -> String {
        let mut buf = Vec::new();
        f(&mut buf).unwrap();
        String::from_utf8(buf).unwrap()
    }

    #[test]
    fn test_credit_table_uses_display_precision() {
        let credits = CreditTable::new(
            AttributionPolicy::Last,
            BTreeMap::from([("Search".to_string(), 2.0 / 3.0)]),
        );
        let config = RenderConfig {
            display_precision: 2,
            ..RenderConfig::default()
        };

        let text = render_to_string(|buf| write_credit_table(buf, &credits, &config));
        assert!(text.contains("Last-touch attribution"));
        assert!(text.contains("Credit_last"));
        assert!(text.contains("0.67"));
        assert!(!text.contains("0.667"));
    }

    #[test]
    fn test_histogram_bars_scale_to_width() {
        let histogram = Histogram {
            bins: vec![
                HistogramBin { lower: 0.0, upper: 1.0, count: 4 },
                HistogramBin { lower: 1.0, upper: 2.0, count: 2 },
                HistogramBin { lower: 2.0, upper: 3.0, count: 0 },
            ],
        };

        let text = render_to_string(|buf| write_histogram(buf, &histogram, 10));
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0].matches(BAR).count(), 10);
        assert_eq!(lines[1].matches(BAR).count(), 5);
        assert_eq!(lines[2].matches(BAR).count(), 0);
    }

    #[test]
    fn test_empty_histogram() {
        let text = render_to_string(|buf| write_histogram(buf, &Histogram::default(), 10));
        assert_eq!(text.trim(), "(no data)");
    }
}
