//! Wire models for the cloud Open API and PVOutput records.
//!
//! These types mirror the JSON the cloud returns. Summary values
//! (energy totals, peaks) are computed client-side from the raw series.

pub mod device;
pub mod history;
pub mod output;
pub mod report;
pub mod response;
pub mod variable;

pub use device::{DeviceDetail, DeviceSummary, GenerationTotals, ModelInfo};
pub use history::{HistorySeries, HistorySummary, Sample};
pub use output::{OutputRecord, TouSplits};
pub use report::{Dimension, ReportSeries, ReportValue, ReportVariable};
pub use response::{ApiResponse, Paged};
pub use variable::Variable;
