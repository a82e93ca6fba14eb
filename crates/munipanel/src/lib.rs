#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/factordynamics/munipanel/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod catalog;
pub mod config;
pub mod error;
pub mod pipeline;
pub mod suite;

// Re-export sub-crates
pub use munipanel_data as data;
pub use munipanel_output as output;
pub use munipanel_panel as panel;
pub use munipanel_regression as regression;

pub use catalog::{Analysis, Clustering, Form, ModelSpec, TestSpec, standard_catalog};
pub use config::{OutputConfig, PipelineConfig};
pub use error::{PipelineError, Result};
pub use pipeline::{PanelStage, Pipeline, RunSummary, SourceFrames, SourceTables};
pub use suite::{ModelOutcome, ModelSuite, PanelFrames};

/// Version information.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
