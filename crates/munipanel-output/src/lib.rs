#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/factordynamics/munipanel/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod export;
pub mod report;
pub mod summary;

pub use export::{
    ArtifactWriter, CoefficientRow, ExportError, ExportFormat, Exporter, LinearTestRow,
    ModelStatsRecord, Result, WaldRow, sort_coefficients,
};
pub use report::RegressionReport;
pub use summary::{DescriptiveStats, PanelProfile, describe, describe_table};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
