//! Descriptive statistics and structural profile of a panel frame.
//!
//! Quantiles use linear interpolation between order statistics and the
//! standard deviation uses `n - 1` in the denominator:
//!
//! ```text
//! q(p) = x[floor(h)] + (h - floor(h)) * (x[floor(h) + 1] - x[floor(h)]),  h = (n - 1) * p
//! sd   = sqrt(sum (x - mean)^2 / (n - 1))
//! ```

use crate::export::{ExportFormat, Exporter, Result as ExportResult, export_rows};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fmt;

/// Summary of one numeric column over its non-missing, finite values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DescriptiveStats {
    /// Column name
    pub variable: String,
    /// Non-missing observations
    pub n: usize,
    /// Arithmetic mean
    pub mean: f64,
    /// Sample standard deviation
    pub sd: f64,
    /// 25th percentile
    pub p25: f64,
    /// Median
    pub median: f64,
    /// 75th percentile
    pub p75: f64,
}

impl DescriptiveStats {
    /// Statistics of a sample; NaN entries are ignored.
    pub fn from_values(variable: impl Into<String>, values: &[f64]) -> Self {
        let mut sorted: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
        sorted.sort_by(f64::total_cmp);
        let n = sorted.len();
        let mean = if n == 0 {
            f64::NAN
        } else {
            sorted.iter().sum::<f64>() / n as f64
        };
        let sd = if n < 2 {
            f64::NAN
        } else {
            let ss: f64 = sorted.iter().map(|v| (v - mean).powi(2)).sum();
            (ss / (n - 1) as f64).sqrt()
        };
        Self {
            variable: variable.into(),
            n,
            mean,
            sd,
            p25: quantile(&sorted, 0.25),
            median: quantile(&sorted, 0.5),
            p75: quantile(&sorted, 0.75),
        }
    }
}

fn quantile(sorted: &[f64], p: f64) -> f64 {
    match sorted.len() {
        0 => f64::NAN,
        1 => sorted[0],
        n => {
            let h = (n - 1) as f64 * p;
            let lo = h.floor() as usize;
            let hi = (lo + 1).min(n - 1);
            sorted[lo] + (h - lo as f64) * (sorted[hi] - sorted[lo])
        }
    }
}

/// Descriptive statistics for the named columns of a frame.
pub fn describe(df: &DataFrame, columns: &[&str]) -> PolarsResult<Vec<DescriptiveStats>> {
    columns
        .iter()
        .map(|&name| {
            let series = df.column(name)?.as_materialized_series().cast(&DataType::Float64)?;
            let values: Vec<f64> = series.f64()?.into_iter().flatten().collect();
            Ok(DescriptiveStats::from_values(name, &values))
        })
        .collect()
}

impl Exporter for Vec<DescriptiveStats> {
    fn export_to_string(&self, format: ExportFormat) -> ExportResult<String> {
        export_rows(self, format)
    }
}

/// Row count, column count, entities and missingness of a panel frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PanelProfile {
    /// Number of rows
    pub rows: usize,
    /// Number of columns
    pub columns: usize,
    /// Distinct entities over the key columns
    pub entities: usize,
    /// Missing values per column (nulls plus NaN)
    pub null_counts: BTreeMap<String, usize>,
}

impl PanelProfile {
    /// Profiles `df`, counting entities over `entity_columns` (e.g. `code`, `state`).
    pub fn from_frame(df: &DataFrame, entity_columns: &[&str]) -> PolarsResult<Self> {
        let keys = entity_columns
            .iter()
            .map(|&name| {
                let series = df.column(name)?.as_materialized_series().cast(&DataType::String)?;
                Ok(series
                    .str()?
                    .into_iter()
                    .map(|v| v.map(str::to_string))
                    .collect::<Vec<_>>())
            })
            .collect::<PolarsResult<Vec<_>>>()?;
        let entities: HashSet<Vec<Option<String>>> = (0..df.height())
            .map(|i| keys.iter().map(|column| column[i].clone()).collect())
            .collect();

        let mut null_counts = BTreeMap::new();
        for column in df.get_columns() {
            let series = column.as_materialized_series();
            let mut missing = series.null_count();
            if let Ok(values) = series.f64() {
                missing += values.into_iter().flatten().filter(|v| v.is_nan()).count();
            }
            null_counts.insert(column.name().to_string(), missing);
        }

        Ok(Self {
            rows: df.height(),
            columns: df.width(),
            entities: if entity_columns.is_empty() { 0 } else { entities.len() },
            null_counts,
        })
    }

    /// Columns with at least one missing value.
    pub fn incomplete_columns(&self) -> Vec<&str> {
        self.null_counts
            .iter()
            .filter(|(_, count)| **count > 0)
            .map(|(name, _)| name.as_str())
            .collect()
    }
}

impl fmt::Display for PanelProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "{} rows x {} columns, {} entities",
            self.rows, self.columns, self.entities
        )?;
        for (name, count) in &self.null_counts {
            if *count > 0 {
                writeln!(f, "  {name:<40} {count:>8} missing")?;
            }
        }
        Ok(())
    }
}

/// ASCII table of descriptive statistics.
pub fn describe_table(stats: &[DescriptiveStats]) -> String {
    let mut output = String::new();
    output.push_str(&format!(
        "{:<40} {:>8} {:>12} {:>12} {:>12} {:>12} {:>12}\n",
        "Variable", "N", "Mean", "SD", "P25", "Median", "P75"
    ));
    output.push_str(&"-".repeat(114));
    output.push('\n');
    for s in stats {
        output.push_str(&format!(
            "{:<40} {:>8} {:>12.4} {:>12.4} {:>12.4} {:>12.4} {:>12.4}\n",
            s.variable, s.n, s.mean, s.sd, s.p25, s.median, s.p75
        ));
    }
    output
}
