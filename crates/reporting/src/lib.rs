//! Marketing attribution reporting: loads touchpoint sheets, summarizes
//! them, and assigns conversion credit to channels under first-touch,
//! last-touch and time-decay models.

pub mod attribution;
pub mod compare;
pub mod loader;
pub mod render;
pub mod report;
pub mod summary;

pub use attribution::CreditTable;
pub use compare::ComparisonTable;
pub use loader::load_touchpoints;
pub use report::{AttributionReport, ReportOutput};
pub use summary::DatasetSummary;
