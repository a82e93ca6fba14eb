//! Tabular exports of fitted models and panels.
//!
//! Downstream reporting keys off these column names, so the record layouts
//! are stable:
//!
//! ```text
//! coefficients  model, var, coef, std_err, t, p, ci_low, ci_high
//! statistics    model, depvar, nobs, entities, time_periods, rsq_within, rsq_between,
//!               rsq_overall, cov_type, entity_effects, time_effects, f_stat, f_pval,
//!               f_df_num, f_df_denom, loglik
//! wald tests    model, test, stat, pval, df
//! linear tests  model, test, estimate, std_err, stat, alternative, pval, pval_greater, pval_less
//! ```

use munipanel_regression::{Alternative, FittedModel, LinearTest, WaldTest};
use polars::prelude::{DataFrame, ParquetWriter, PolarsError};
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::info;

/// Export errors.
#[derive(Debug, Error)]
pub enum ExportError {
    /// CSV serialization error
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// Parquet write error
    #[error("Polars error: {0}")]
    Polars(#[from] PolarsError),

    /// Target exists and overwriting is disabled
    #[error("Refusing to overwrite existing artifact {}", path.display())]
    AlreadyExists {
        /// Existing file
        path: PathBuf,
    },

    /// Format not supported for this export
    #[error("Invalid format: {0}")]
    InvalidFormat(String),
}

/// Result alias for exports.
pub type Result<T> = std::result::Result<T, ExportError>;

/// Supported export formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExportFormat {
    /// Comma-separated values
    Csv,
    /// Compact JSON
    Json,
    /// Indented JSON
    PrettyJson,
    /// Columnar Parquet (panels only)
    Parquet,
}

impl ExportFormat {
    /// File extension for the format.
    pub const fn extension(&self) -> &'static str {
        match self {
            Self::Csv => "csv",
            Self::Json | Self::PrettyJson => "json",
            Self::Parquet => "parquet",
        }
    }
}

/// One coefficient of one model, long format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoefficientRow {
    /// Model name
    pub model: String,
    /// Regressor name
    pub var: String,
    /// Point estimate
    pub coef: f64,
    /// Standard error
    pub std_err: f64,
    /// Test statistic
    pub t: f64,
    /// Two-sided p-value
    pub p: f64,
    /// Lower confidence bound
    pub ci_low: f64,
    /// Upper confidence bound
    pub ci_high: f64,
}

impl CoefficientRow {
    /// Rows of a fitted model, sorted by variable name.
    pub fn from_fitted(fitted: &FittedModel) -> Vec<Self> {
        let mut rows: Vec<Self> = fitted
            .coefficients()
            .iter()
            .map(|c| Self {
                model: fitted.name().to_string(),
                var: c.name.clone(),
                coef: c.estimate,
                std_err: c.std_err,
                t: c.t_stat,
                p: c.p_value,
                ci_low: c.ci_low,
                ci_high: c.ci_high,
            })
            .collect();
        sort_coefficients(&mut rows);
        rows
    }
}

/// Sorts coefficient rows by (model, var).
pub fn sort_coefficients(rows: &mut [CoefficientRow]) {
    rows.sort_by(|a, b| a.model.cmp(&b.model).then_with(|| a.var.cmp(&b.var)));
}

/// Flat summary of a fitted model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelStatsRecord {
    /// Model name
    pub model: String,
    /// Dependent variable
    pub depvar: String,
    /// Observations used
    pub nobs: usize,
    /// Distinct entities
    pub entities: usize,
    /// Distinct time periods
    pub time_periods: usize,
    /// Within R²
    pub rsq_within: f64,
    /// Between R²
    pub rsq_between: f64,
    /// Overall R²
    pub rsq_overall: f64,
    /// Covariance label, e.g. `clustered(entity)`
    pub cov_type: String,
    /// Entity effects absorbed
    pub entity_effects: bool,
    /// Time effects absorbed
    pub time_effects: bool,
    /// Overall F statistic
    pub f_stat: f64,
    /// F p-value
    pub f_pval: f64,
    /// Numerator degrees of freedom
    pub f_df_num: usize,
    /// Denominator degrees of freedom
    pub f_df_denom: usize,
    /// Gaussian log-likelihood
    pub loglik: f64,
}

impl ModelStatsRecord {
    /// Collects the statistics of a fitted model.
    pub fn from_fitted(fitted: &FittedModel) -> Self {
        let f = fitted.f_test();
        let effects = fitted.effects();
        Self {
            model: fitted.name().to_string(),
            depvar: fitted.dependent().to_string(),
            nobs: fitted.nobs(),
            entities: fitted.entities(),
            time_periods: fitted.time_periods(),
            rsq_within: fitted.rsq_within(),
            rsq_between: fitted.rsq_between(),
            rsq_overall: fitted.rsq_overall(),
            cov_type: fitted.cov_type().to_string(),
            entity_effects: effects.entity,
            time_effects: effects.time,
            f_stat: f.statistic,
            f_pval: f.p_value,
            f_df_num: f.df_num,
            f_df_denom: f.df_denom,
            loglik: fitted.loglik(),
        }
    }
}

/// One hypothesis test of one model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WaldRow {
    /// Model name
    pub model: String,
    /// Test name
    pub test: String,
    /// Test statistic
    pub stat: f64,
    /// p-value
    pub pval: f64,
    /// Degrees of freedom (number of restrictions)
    pub df: usize,
}

impl WaldRow {
    /// Row for a Wald test on the named model.
    pub fn new(model: impl Into<String>, test: &WaldTest) -> Self {
        Self {
            model: model.into(),
            test: test.name.clone(),
            stat: test.statistic,
            pval: test.p_value,
            df: test.df,
        }
    }
}

/// One signed single-restriction test of one model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinearTestRow {
    /// Model name
    pub model: String,
    /// Test name
    pub test: String,
    /// Restriction value at the estimate, `c'β̂ − q`
    pub estimate: f64,
    /// Standard error of the estimate
    pub std_err: f64,
    /// t-statistic
    pub stat: f64,
    /// Alternative the test was run under
    pub alternative: Alternative,
    /// p-value under `alternative`
    pub pval: f64,
    /// p-value against `c'β > q`
    pub pval_greater: f64,
    /// p-value against `c'β < q`
    pub pval_less: f64,
}

impl LinearTestRow {
    /// Row for a linear test on the named model.
    pub fn new(model: impl Into<String>, test: &LinearTest) -> Self {
        let one_sided = |alt: Alternative| alt.p_value(test.p_value_two_sided, test.estimate);
        Self {
            model: model.into(),
            test: test.name.clone(),
            estimate: test.estimate,
            std_err: test.std_err,
            stat: test.statistic,
            alternative: test.alternative,
            pval: test.p_value,
            pval_greater: one_sided(Alternative::Greater),
            pval_less: one_sided(Alternative::Less),
        }
    }
}

/// Types that can be written as a tabular artifact.
pub trait Exporter {
    /// Export to a string in the given format.
    fn export_to_string(&self, format: ExportFormat) -> Result<String>;

    /// Export to a file in the given format.
    fn export_to_file(&self, path: &Path, format: ExportFormat) -> Result<()> {
        let content = self.export_to_string(format)?;
        let mut file = File::create(path)?;
        file.write_all(content.as_bytes())?;
        Ok(())
    }
}

fn rows_to_csv<T: Serialize>(rows: &[T]) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    for row in rows {
        wtr.serialize(row)?;
    }
    let bytes = wtr.into_inner().map_err(|e| ExportError::Io(e.into_error()))?;
    String::from_utf8(bytes).map_err(|e| ExportError::InvalidFormat(e.to_string()))
}

fn to_json<T: Serialize + ?Sized>(value: &T, pretty: bool) -> Result<String> {
    Ok(if pretty {
        serde_json::to_string_pretty(value)?
    } else {
        serde_json::to_string(value)?
    })
}

pub(crate) fn export_rows<T: Serialize>(rows: &[T], format: ExportFormat) -> Result<String> {
    match format {
        ExportFormat::Csv => rows_to_csv(rows),
        ExportFormat::Json => to_json(rows, false),
        ExportFormat::PrettyJson => to_json(rows, true),
        ExportFormat::Parquet => Err(ExportError::InvalidFormat(
            "parquet is only supported for panel frames".to_string(),
        )),
    }
}

impl Exporter for Vec<CoefficientRow> {
    fn export_to_string(&self, format: ExportFormat) -> Result<String> {
        export_rows(self, format)
    }
}

impl Exporter for Vec<WaldRow> {
    fn export_to_string(&self, format: ExportFormat) -> Result<String> {
        export_rows(self, format)
    }
}

impl Exporter for Vec<LinearTestRow> {
    fn export_to_string(&self, format: ExportFormat) -> Result<String> {
        export_rows(self, format)
    }
}

impl Exporter for ModelStatsRecord {
    fn export_to_string(&self, format: ExportFormat) -> Result<String> {
        match format {
            ExportFormat::Csv => rows_to_csv(std::slice::from_ref(self)),
            ExportFormat::Json => to_json(self, false),
            ExportFormat::PrettyJson => to_json(self, true),
            ExportFormat::Parquet => Err(ExportError::InvalidFormat(
                "parquet is only supported for panel frames".to_string(),
            )),
        }
    }
}

/// Writes model and panel artifacts into one output directory.
///
/// File names:
///
/// ```text
/// {model}_coef.{csv|json}
/// {model}_stats.json
/// {model}_wald_tests.{csv|json}
/// {model}_linear_tests.{csv|json}
/// {variant}.parquet
/// ```
#[derive(Debug, Clone)]
pub struct ArtifactWriter {
    dir: PathBuf,
    format: ExportFormat,
    overwrite: bool,
}

impl ArtifactWriter {
    /// Writer for `dir` producing CSV tables; existing files are kept.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            format: ExportFormat::Csv,
            overwrite: false,
        }
    }

    /// Table format for coefficient and test files (CSV or JSON).
    pub fn with_format(mut self, format: ExportFormat) -> Result<Self> {
        if format == ExportFormat::Parquet {
            return Err(ExportError::InvalidFormat(
                "tables are written as csv or json".to_string(),
            ));
        }
        self.format = format;
        Ok(self)
    }

    /// Allow replacing existing files.
    pub const fn with_overwrite(mut self, overwrite: bool) -> Self {
        self.overwrite = overwrite;
        self
    }

    /// Output directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn target(&self, file_name: String) -> Result<PathBuf> {
        fs::create_dir_all(&self.dir)?;
        let path = self.dir.join(file_name);
        if !self.overwrite && path.exists() {
            return Err(ExportError::AlreadyExists { path });
        }
        Ok(path)
    }

    /// Writes `{model}_coef.{ext}`.
    pub fn write_coefficients(&self, model: &str, rows: &[CoefficientRow]) -> Result<PathBuf> {
        let path = self.target(format!("{model}_coef.{}", self.format.extension()))?;
        let mut rows = rows.to_vec();
        sort_coefficients(&mut rows);
        rows.export_to_file(&path, self.format)?;
        Ok(path)
    }

    /// Writes `{model}_stats.json`.
    pub fn write_stats(&self, record: &ModelStatsRecord) -> Result<PathBuf> {
        let path = self.target(format!("{}_stats.json", record.model))?;
        record.export_to_file(&path, ExportFormat::PrettyJson)?;
        Ok(path)
    }

    /// Writes `{model}_wald_tests.{ext}`.
    pub fn write_wald_tests(&self, model: &str, rows: &[WaldRow]) -> Result<PathBuf> {
        let path = self.target(format!("{model}_wald_tests.{}", self.format.extension()))?;
        rows.to_vec().export_to_file(&path, self.format)?;
        Ok(path)
    }

    /// Writes `{model}_linear_tests.{ext}`.
    pub fn write_linear_tests(&self, model: &str, rows: &[LinearTestRow]) -> Result<PathBuf> {
        let path = self.target(format!("{model}_linear_tests.{}", self.format.extension()))?;
        rows.to_vec().export_to_file(&path, self.format)?;
        Ok(path)
    }

    /// Writes coefficients, statistics, joint and signed tests of one fit.
    pub fn write_model(
        &self,
        fitted: &FittedModel,
        tests: &[WaldTest],
        linear: &[LinearTest],
    ) -> Result<Vec<PathBuf>> {
        let name = fitted.name();
        let wald: Vec<WaldRow> = tests.iter().map(|t| WaldRow::new(name, t)).collect();
        let signed: Vec<LinearTestRow> = linear.iter().map(|t| LinearTestRow::new(name, t)).collect();
        let paths = vec![
            self.write_coefficients(name, &CoefficientRow::from_fitted(fitted))?,
            self.write_stats(&ModelStatsRecord::from_fitted(fitted))?,
            self.write_wald_tests(name, &wald)?,
            self.write_linear_tests(name, &signed)?,
        ];
        info!(model = name, files = paths.len(), "model artifacts written");
        Ok(paths)
    }

    /// Writes `{variant}.parquet`.
    pub fn write_panel(&self, variant: &str, df: &mut DataFrame) -> Result<PathBuf> {
        let path = self.target(format!("{variant}.{}", ExportFormat::Parquet.extension()))?;
        let file = File::create(&path)?;
        ParquetWriter::new(file).finish(df)?;
        info!(variant, rows = df.height(), columns = df.width(), "panel written");
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn coefficient(model: &str, var: &str) -> CoefficientRow {
        CoefficientRow {
            model: model.to_string(),
            var: var.to_string(),
            coef: 0.5,
            std_err: 0.1,
            t: 5.0,
            p: 1e-6,
            ci_low: 0.3,
            ci_high: 0.7,
        }
    }

    #[test]
    fn test_extensions() {
        assert_eq!(ExportFormat::Csv.extension(), "csv");
        assert_eq!(ExportFormat::PrettyJson.extension(), "json");
        assert_eq!(ExportFormat::Parquet.extension(), "parquet");
    }

    #[test]
    fn test_coefficient_csv_header() {
        let rows = vec![coefficient("gdp", "share_disbursement")];
        let csv = rows.export_to_string(ExportFormat::Csv).unwrap();
        let header = csv.lines().next().unwrap();
        assert_eq!(header, "model,var,coef,std_err,t,p,ci_low,ci_high");
        assert!(csv.contains("gdp,share_disbursement,0.5"));
    }

    #[test]
    fn test_sort_by_model_then_var() {
        let mut rows = vec![
            coefficient("b", "x"),
            coefficient("a", "z"),
            coefficient("a", "y"),
        ];
        sort_coefficients(&mut rows);
        let keys: Vec<_> = rows.iter().map(|r| (r.model.as_str(), r.var.as_str())).collect();
        assert_eq!(keys, vec![("a", "y"), ("a", "z"), ("b", "x")]);
    }

    #[test]
    fn test_wald_json_fields() {
        let rows = vec![WaldRow {
            model: "gdp".to_string(),
            test: "joint_betas".to_string(),
            stat: 3.2,
            pval: 0.02,
            df: 4,
        }];
        let json = rows.export_to_string(ExportFormat::Json).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value[0]["test"], "joint_betas");
        assert_eq!(value[0]["df"], 4);
    }

    #[test]
    fn test_linear_row_carries_both_tails() {
        let test = LinearTest {
            name: "cumulative".to_string(),
            estimate: 0.4,
            std_err: 0.2,
            statistic: 2.0,
            p_value_two_sided: 0.06,
            p_value: 0.06,
            alternative: Alternative::TwoSided,
        };
        let row = LinearTestRow::new("gdp", &test);
        assert_eq!(row.alternative, Alternative::TwoSided);
        assert!((row.pval_greater - 0.03).abs() < 1e-12);
        assert!((row.pval_less - 0.97).abs() < 1e-12);

        let csv = vec![row].export_to_string(ExportFormat::Csv).unwrap();
        let mut lines = csv.lines();
        assert_eq!(
            lines.next().unwrap(),
            "model,test,estimate,std_err,stat,alternative,pval,pval_greater,pval_less"
        );
        assert!(lines.next().unwrap().starts_with("gdp,cumulative,0.4,0.2,2.0,two_sided,0.06,"));
    }

    #[test]
    fn test_parquet_rejected_for_tables() {
        let rows = vec![coefficient("gdp", "x")];
        assert!(matches!(
            rows.export_to_string(ExportFormat::Parquet),
            Err(ExportError::InvalidFormat(_))
        ));
        assert!(ArtifactWriter::new("out").with_format(ExportFormat::Parquet).is_err());
    }
}
