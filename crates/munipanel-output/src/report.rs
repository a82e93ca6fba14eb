//! Plain-text regression reports.

use crate::export::{CoefficientRow, ModelStatsRecord, Result, WaldRow};
use chrono::{DateTime, Utc};
use munipanel_regression::{FittedModel, WaldTest};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A fitted model with its hypothesis tests, ready for display.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegressionReport {
    /// Report generation timestamp
    pub timestamp: DateTime<Utc>,

    /// Model statistics
    pub stats: ModelStatsRecord,

    /// Coefficients in regressor order
    pub coefficients: Vec<CoefficientRow>,

    /// Hypothesis tests
    pub tests: Vec<WaldRow>,
}

impl RegressionReport {
    /// Builds a report from a fit and its tests.
    pub fn new(fitted: &FittedModel, tests: &[WaldTest]) -> Self {
        let mut coefficients = CoefficientRow::from_fitted(fitted);
        coefficients.sort_by_key(|row| fitted.names().iter().position(|name| *name == row.var));
        Self {
            timestamp: Utc::now(),
            stats: ModelStatsRecord::from_fitted(fitted),
            coefficients,
            tests: tests.iter().map(|t| WaldRow::new(fitted.name(), t)).collect(),
        }
    }

    /// Pretty JSON rendering.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

fn effect_label(present: bool) -> &'static str {
    if present { "yes" } else { "no" }
}

impl fmt::Display for RegressionReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = &self.stats;
        let rule = "=".repeat(88);
        let thin = "-".repeat(88);

        writeln!(f, "{rule}")?;
        writeln!(f, "Panel regression: {}", s.model)?;
        writeln!(f, "Generated {}", self.timestamp.format("%Y-%m-%d %H:%M:%S UTC"))?;
        writeln!(f, "{rule}")?;
        writeln!(f, "{:<22} {:>20}   {:<18} {:>20}", "Dep. variable:", s.depvar, "R² (within):", format!("{:.4}", s.rsq_within))?;
        writeln!(f, "{:<22} {:>20}   {:<18} {:>20}", "Observations:", s.nobs, "R² (between):", format!("{:.4}", s.rsq_between))?;
        writeln!(f, "{:<22} {:>20}   {:<18} {:>20}", "Entities:", s.entities, "R² (overall):", format!("{:.4}", s.rsq_overall))?;
        writeln!(f, "{:<22} {:>20}   {:<18} {:>20}", "Time periods:", s.time_periods, "Log-likelihood:", format!("{:.3}", s.loglik))?;
        writeln!(f, "{:<22} {:>20}   {:<18} {:>20}", "Covariance:", s.cov_type, "F statistic:", format!("{:.4}", s.f_stat))?;
        writeln!(
            f,
            "{:<22} {:>20}   {:<18} {:>20}",
            "Entity effects:",
            effect_label(s.entity_effects),
            "P-value (F):",
            format!("{:.4}", s.f_pval)
        )?;
        writeln!(
            f,
            "{:<22} {:>20}   {:<18} {:>20}",
            "Time effects:",
            effect_label(s.time_effects),
            "F df:",
            format!("({}, {})", s.f_df_num, s.f_df_denom)
        )?;
        writeln!(f, "{thin}")?;
        writeln!(
            f,
            "{:<32} {:>10} {:>10} {:>8} {:>8} {:>8} {:>8}",
            "", "Estimate", "Std. Err.", "T-stat", "P-value", "Lower", "Upper"
        )?;
        writeln!(f, "{thin}")?;
        for c in &self.coefficients {
            writeln!(
                f,
                "{:<32} {:>10.4} {:>10.4} {:>8.3} {:>8.4} {:>8.4} {:>8.4}",
                c.var, c.coef, c.std_err, c.t, c.p, c.ci_low, c.ci_high
            )?;
        }
        if !self.tests.is_empty() {
            writeln!(f, "{thin}")?;
            writeln!(f, "{:<32} {:>10} {:>10} {:>8}", "Test", "Statistic", "P-value", "df")?;
            for t in &self.tests {
                writeln!(f, "{:<32} {:>10.4} {:>10.4} {:>8}", t.test, t.stat, t.pval, t.df)?;
            }
        }
        write!(f, "{rule}")
    }
}
