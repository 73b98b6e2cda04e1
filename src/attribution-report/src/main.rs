//! Attribution Report: first-touch, last-touch and time-decay channel
//! attribution over a spreadsheet of order touchpoints.
//!
//! Main entry point: loads configuration, reads the sheet, and prints the report.

use attribution_core::config::{AppConfig, OutputFormat, ZeroWeightPolicy};
use attribution_reporting::AttributionReport;
use clap::Parser;
use std::path::PathBuf;
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(name = "attribution-report")]
#[command(about = "Marketing attribution analysis over a touchpoint spreadsheet")]
#[command(version)]
struct Cli {
    /// Touchpoint sheet (.xlsx, .xls, .ods or .csv)
    input: PathBuf,

    /// TOML config file
    #[arg(long, env = "ATTRIBUTION_REPORT_CONFIG")]
    config: Option<PathBuf>,

    /// Decay half-life in days (overrides config)
    #[arg(long, env = "ATTRIBUTION_REPORT__ATTRIBUTION__HALF_LIFE_DAYS")]
    half_life_days: Option<f64>,

    /// Zero-weight order handling: uniform or skip (overrides config)
    #[arg(long, env = "ATTRIBUTION_REPORT__ATTRIBUTION__ZERO_WEIGHT_POLICY")]
    zero_weight_policy: Option<ZeroWeightPolicy>,

    /// Histogram bin count (overrides config)
    #[arg(long, env = "ATTRIBUTION_REPORT__RENDER__HISTOGRAM_BINS")]
    histogram_bins: Option<usize>,

    /// Decimal places for credit shares (overrides config)
    #[arg(long, env = "ATTRIBUTION_REPORT__RENDER__DISPLAY_PRECISION")]
    display_precision: Option<usize>,

    /// Output format: table or json (overrides config)
    #[arg(long, env = "ATTRIBUTION_REPORT__RENDER__FORMAT")]
    format: Option<OutputFormat>,

    /// Emit logs as JSON
    #[arg(long, default_value_t = false)]
    log_json: bool,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize tracing; stdout is reserved for the report itself
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "attribution_report=info,attribution_reporting=info".into());
    if cli.log_json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    }

    info!("Attribution report starting");

    let mut config = AppConfig::load(cli.config.as_deref())?;

    // Apply CLI overrides
    if let Some(half_life) = cli.half_life_days {
        config.attribution.half_life_days = half_life;
    }
    if let Some(policy) = cli.zero_weight_policy {
        config.attribution.zero_weight_policy = policy;
    }
    if let Some(bins) = cli.histogram_bins {
        config.render.histogram_bins = bins;
    }
    if let Some(precision) = cli.display_precision {
        config.render.display_precision = precision;
    }
    if let Some(format) = cli.format {
        config.render.format = format;
    }
    config.validate()?;

    info!(
        input = %cli.input.display(),
        half_life_days = config.attribution.half_life_days,
        zero_weight_policy = %config.attribution.zero_weight_policy,
        histogram_bins = config.render.histogram_bins,
        display_precision = config.render.display_precision,
        "Configuration loaded"
    );

    let report = AttributionReport::new(config);
    let output = report.run_file(&cli.input).inspect_err(|e| {
        error!(error = %e, "Attribution run failed");
    })?;

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    report.render(&output, &mut out)?;

    info!("Attribution report complete");
    Ok(())
}
