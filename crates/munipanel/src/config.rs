//! Pipeline configuration.
//!
//! Every section has defaults, so an empty JSON object is a valid
//! configuration:
//!
//! ```json
//! {
//!   "deflator": { "reference_year": 2021, "first_year": 2002, "last_year": 2023 },
//!   "panel": { "max_lag": 3, "max_lead": 2 },
//!   "fit": { "covariance": { "clustered": "entity" }, "confidence": 0.95 },
//!   "output": { "dir": "output", "format": "csv", "overwrite": true }
//! }
//! ```

use crate::{PipelineError, Result};
use munipanel_data::{AggregationConfig, DeflatorConfig, ResolverConfig};
use munipanel_output::ExportFormat;
use munipanel_panel::PanelConfig;
use munipanel_regression::FitConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Where and how artifacts are written.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Output directory (default: `output`)
    pub dir: PathBuf,

    /// Table format for coefficients and tests (default: csv)
    pub format: ExportFormat,

    /// Replace existing artifacts (default: true)
    pub overwrite: bool,

    /// Write the panel variants as Parquet (default: true)
    pub write_panels: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("output"),
            format: ExportFormat::Csv,
            overwrite: true,
            write_panels: true,
        }
    }
}

/// Configuration of a full pipeline run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Entity resolver
    pub resolver: ResolverConfig,

    /// Chain-index deflators
    pub deflator: DeflatorConfig,

    /// Disbursement aggregation
    pub aggregation: AggregationConfig,

    /// Panel assembly
    pub panel: PanelConfig,

    /// Base estimation settings; each catalogue entry sets its own covariance
    pub fit: FitConfig,

    /// Artifact output
    pub output: OutputConfig,
}

impl PipelineConfig {
    /// Parse from a JSON string.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Read from a JSON file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    /// Check cross-section consistency.
    pub fn validate(&self) -> Result<()> {
        let d = &self.deflator;
        if d.reference_year < d.first_year || d.reference_year > d.last_year {
            return Err(PipelineError::Config(format!(
                "reference year {} outside deflator window {}..={}",
                d.reference_year, d.first_year, d.last_year
            )));
        }
        if self.panel.first_year > self.panel.last_year {
            return Err(PipelineError::Config(format!(
                "empty panel window {}..={}",
                self.panel.first_year, self.panel.last_year
            )));
        }
        if !(self.fit.confidence > 0.0 && self.fit.confidence < 1.0) {
            return Err(PipelineError::Config(format!(
                "confidence level {} outside (0, 1)",
                self.fit.confidence
            )));
        }
        if self.output.format == ExportFormat::Parquet {
            return Err(PipelineError::Config(
                "tables are written as csv or json".to_string(),
            ));
        }
        Ok(())
    }
}
