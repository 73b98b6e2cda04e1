use crate::error::{AttributionError, AttributionResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use tracing::debug;

/// Upper bound on histogram bins accepted from config or flags.
pub const MAX_HISTOGRAM_BINS: usize = 1_000;

/// Root application configuration. Loaded from an optional TOML file and
/// environment variables with the prefix `ATTRIBUTION_REPORT__`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub attribution: AttributionConfig,
    #[serde(default)]
    pub render: RenderConfig,
    #[serde(default)]
    pub columns: ColumnMapping,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AttributionConfig {
    /// Days after which a touchpoint's decay weight halves.
    #[serde(default = "default_half_life_days")]
    pub half_life_days: f64,
    #[serde(default)]
    pub zero_weight_policy: ZeroWeightPolicy,
}

/// What to do with an order whose decay weights sum to zero.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ZeroWeightPolicy {
    /// Split the order's credit evenly across its touchpoints.
    #[default]
    Uniform,
    /// Drop the order's credit.
    Skip,
}

/// Explicit rendering options for the console report.
#[derive(Debug, Clone, Deserialize)]
pub struct RenderConfig {
    #[serde(default = "default_histogram_bins")]
    pub histogram_bins: usize,
    /// Decimal places for credit shares.
    #[serde(default = "default_display_precision")]
    pub display_precision: usize,
    /// Decimal places for summary statistics.
    #[serde(default = "default_summary_precision")]
    pub summary_precision: usize,
    /// Width in characters of the longest histogram bar.
    #[serde(default = "default_histogram_width")]
    pub histogram_width: usize,
    #[serde(default = "default_table_width")]
    pub table_width: u16,
    #[serde(default)]
    pub format: OutputFormat,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Table,
    Json,
}

/// Header names of the input sheet, so renamed columns can be mapped
/// without touching code.
#[derive(Debug, Clone, Deserialize)]
pub struct ColumnMapping {
    #[serde(default = "default_order_id_column")]
    pub order_id: String,
    #[serde(default = "default_order_time_column")]
    pub order_time: String,
    #[serde(default = "default_position_column")]
    pub position: String,
    #[serde(default = "default_position_name_column")]
    pub position_name: String,
    #[serde(default = "default_channel_column")]
    pub channel: String,
    #[serde(default = "default_sale_amount_column")]
    pub sale_amount: String,
    #[serde(default = "default_new_customer_column")]
    pub new_customer: String,
    #[serde(default = "default_days_to_convert_column")]
    pub days_to_convert: String,
}

// Default functions
fn default_half_life_days() -> f64 {
    7.0
}
fn default_histogram_bins() -> usize {
    30
}
fn default_display_precision() -> usize {
    3
}
fn default_summary_precision() -> usize {
    3
}
fn default_histogram_width() -> usize {
    50
}
fn default_table_width() -> u16 {
    100
}
fn default_order_id_column() -> String {
    "Order Id".to_string()
}
fn default_order_time_column() -> String {
    "Order Date Time".to_string()
}
fn default_position_column() -> String {
    "Position".to_string()
}
fn default_position_name_column() -> String {
    "Position Name".to_string()
}
fn default_channel_column() -> String {
    "Group Name".to_string()
}
fn default_sale_amount_column() -> String {
    "Sale Amount".to_string()
}
fn default_new_customer_column() -> String {
    "New Customer".to_string()
}
fn default_days_to_convert_column() -> String {
    "Time to Convert (Days)".to_string()
}

impl Default for AttributionConfig {
    fn default() -> Self {
        Self {
            half_life_days: default_half_life_days(),
            zero_weight_policy: ZeroWeightPolicy::default(),
        }
    }
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            histogram_bins: default_histogram_bins(),
            display_precision: default_display_precision(),
            summary_precision: default_summary_precision(),
            histogram_width: default_histogram_width(),
            table_width: default_table_width(),
            format: OutputFormat::default(),
        }
    }
}

impl Default for ColumnMapping {
    fn default() -> Self {
        Self {
            order_id: default_order_id_column(),
            order_time: default_order_time_column(),
            position: default_position_column(),
            position_name: default_position_name_column(),
            channel: default_channel_column(),
            sale_amount: default_sale_amount_column(),
            new_customer: default_new_customer_column(),
            days_to_convert: default_days_to_convert_column(),
        }
    }
}

impl FromStr for ZeroWeightPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "uniform" => Ok(Self::Uniform),
            "skip" => Ok(Self::Skip),
            other => Err(format!("unknown zero-weight policy '{other}' (expected uniform or skip)")),
        }
    }
}

impl fmt::Display for ZeroWeightPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Uniform => f.write_str("uniform"),
            Self::Skip => f.write_str("skip"),
        }
    }
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "table" => Ok(Self::Table),
            "json" => Ok(Self::Json),
            other => Err(format!("unknown output format '{other}' (expected table or json)")),
        }
    }
}

impl ColumnMapping {
    /// `(field, header)` pairs in sheet order.
    pub fn headers(&self) -> [(&'static str, &str); 8] {
        [
            ("order_id", self.order_id.as_str()),
            ("order_time", self.order_time.as_str()),
            ("position", self.position.as_str()),
            ("position_name", self.position_name.as_str()),
            ("channel", self.channel.as_str()),
            ("sale_amount", self.sale_amount.as_str()),
            ("new_customer", self.new_customer.as_str()),
            ("days_to_convert", self.days_to_convert.as_str()),
        ]
    }
}

impl AppConfig {
    /// Load configuration from an optional config file and environment variables.
    pub fn load(path: Option<&Path>) -> AttributionResult<Self> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path).required(true));
        }
        builder = builder.add_source(
            config::Environment::with_prefix("ATTRIBUTION_REPORT")
                .separator("__")
                .try_parsing(true),
        );

        let config: AppConfig = builder.build()?.try_deserialize()?;
        config.validate()?;
        debug!(
            file = ?path,
            half_life_days = config.attribution.half_life_days,
            zero_weight_policy = %config.attribution.zero_weight_policy,
            histogram_bins = config.render.histogram_bins,
            display_precision = config.render.display_precision,
            "Configuration resolved"
        );
        Ok(config)
    }

    pub fn validate(&self) -> AttributionResult<()> {
        let half_life = self.attribution.half_life_days;
        if !half_life.is_finite() || half_life <= 0.0 {
            return Err(AttributionError::Config(format!(
                "half_life_days must be a positive number, got {half_life}"
            )));
        }
        let bins = self.render.histogram_bins;
        if bins == 0 || bins > MAX_HISTOGRAM_BINS {
            return Err(AttributionError::Config(format!(
                "histogram_bins must be between 1 and {MAX_HISTOGRAM_BINS}, got {bins}"
            )));
        }
        for (field, header) in self.columns.headers() {
            if header.trim().is_empty() {
                return Err(AttributionError::Config(format!(
                    "column mapping for '{field}' is empty"
                )));
            }
        }
        Ok(())
    }
}
