//! Linear hypothesis tests on a fitted model
//!
//! Restrictions `Rβ = q` are tested with the Wald statistic built from the
//! model's own estimates and covariance:
//! ```text
//! W = (Rβ̂ − q)' (R V R')^{-1} (Rβ̂ − q)  ~  χ²(rank R)
//! F = W / rank R                          ~  F(rank R, df_resid)
//! ```
//! A single restriction `c'β = q` (a coefficient, a difference, a sum of
//! lag coefficients) is also reported as a signed statistic
//! `(c'β̂ − q) / √(c'Vc)` so that one-sided alternatives can be evaluated.

use crate::distribution::{chi_squared_sf, f_sf};
use crate::linalg::{Cholesky, DEFAULT_RANK_TOLERANCE};
use crate::model::FittedModel;
use crate::{RegressionError, Result};
use ndarray::{Array1, Array2};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::LazyLock;

static TERM: LazyLock<std::result::Result<Regex, regex::Error>> = LazyLock::new(|| {
    Regex::new(r"^([+-]?)(?:(\d+(?:\.\d*)?(?:[eE][+-]?\d+)?)\*)?([A-Za-z_][A-Za-z0-9_]*)")
});

/// One linear restriction `Σ c_j β_j = q`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinearRestriction {
    /// `(coefficient name, weight)` pairs
    pub terms: Vec<(String, f64)>,
    /// Right-hand side
    pub value: f64,
}

impl LinearRestriction {
    /// `β_name = 0`
    pub fn zero(name: impl Into<String>) -> Self {
        Self {
            terms: vec![(name.into(), 1.0)],
            value: 0.0,
        }
    }

    /// `Σ β_name = 0`
    pub fn sum<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            terms: names.into_iter().map(|n| (n.into(), 1.0)).collect(),
            value: 0.0,
        }
    }

    /// Parse `"a + b = 0"`, `"2*a - b = 1"` or `"a"` (meaning `a = 0`).
    pub fn parse(formula: &str) -> Result<Self> {
        let invalid = |reason: &str| RegressionError::InvalidRestriction {
            formula: formula.to_string(),
            reason: reason.to_string(),
        };
        let compact: String = formula.chars().filter(|c| !c.is_whitespace()).collect();
        let (lhs, rhs) = match compact.split_once('=') {
            Some((l, r)) => (l.to_string(), r.to_string()),
            None => (compact.clone(), "0".to_string()),
        };
        if rhs.contains('=') {
            return Err(invalid("more than one '='"));
        }
        let value: f64 = rhs
            .parse()
            .map_err(|_| invalid("right-hand side must be a number"))?;

        let term = TERM.as_ref().map_err(|e| invalid(&e.to_string()))?;
        let mut rest = lhs.as_str();
        let mut terms: Vec<(String, f64)> = Vec::new();
        while !rest.is_empty() {
            let caps = term
                .captures(rest)
                .ok_or_else(|| invalid(&format!("cannot parse term at '{rest}'")))?;
            let sign = caps.get(1).map_or("", |m| m.as_str());
            if sign.is_empty() && !terms.is_empty() {
                return Err(invalid("terms must be joined by '+' or '-'"));
            }
            let weight = caps
                .get(2)
                .map_or(Ok(1.0), |m| m.as_str().parse::<f64>())
                .map_err(|_| invalid("bad weight"))?;
            let weight = if sign == "-" { -weight } else { weight };
            let name = caps.get(3).map_or("", |m| m.as_str()).to_string();
            match terms.iter_mut().find(|(n, _)| *n == name) {
                Some((_, w)) => *w += weight,
                None => terms.push((name, weight)),
            }
            rest = &rest[caps.get(0).map_or(rest.len(), |m| m.end())..];
        }
        if terms.is_empty() {
            return Err(invalid("no coefficients"));
        }
        Ok(Self { terms, value })
    }

    /// Row of `R` and the value of `q` for a fitted model.
    fn row(&self, fitted: &FittedModel) -> Result<Array1<f64>> {
        let mut row = Array1::<f64>::zeros(fitted.names().len());
        for (name, weight) in &self.terms {
            row[fitted.index_of(name)?] += weight;
        }
        Ok(row)
    }
}

impl fmt::Display for LinearRestriction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (name, weight)) in self.terms.iter().enumerate() {
            let sign = if *weight < 0.0 { "-" } else { "+" };
            let magnitude = weight.abs();
            match (i, magnitude == 1.0) {
                (0, true) if sign == "+" => write!(f, "{name}")?,
                (0, true) => write!(f, "-{name}")?,
                (0, false) if sign == "+" => write!(f, "{magnitude}*{name}")?,
                (0, false) => write!(f, "-{magnitude}*{name}")?,
                (_, true) => write!(f, " {sign} {name}")?,
                (_, false) => write!(f, " {sign} {magnitude}*{name}")?,
            }
        }
        write!(f, " = {}", self.value)
    }
}

/// A set of linear restrictions tested jointly.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Restriction {
    rows: Vec<LinearRestriction>,
}

impl Restriction {
    /// Build from individual restrictions.
    pub const fn new(rows: Vec<LinearRestriction>) -> Self {
        Self { rows }
    }

    /// Every named coefficient is zero.
    pub fn zeros<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            rows: names.into_iter().map(LinearRestriction::zero).collect(),
        }
    }

    /// The named coefficients sum to zero.
    pub fn sum<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            rows: vec![LinearRestriction::sum(names)],
        }
    }

    /// Parse one formula per restriction.
    pub fn parse<I, S>(formulas: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let rows = formulas
            .into_iter()
            .map(|f| LinearRestriction::parse(f.as_ref()))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { rows })
    }

    /// Individual restrictions.
    pub fn rows(&self) -> &[LinearRestriction] {
        &self.rows
    }

    /// Number of restrictions.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether there are no restrictions.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    fn system(&self, fitted: &FittedModel) -> Result<(Array2<f64>, Array1<f64>)> {
        let k = fitted.names().len();
        let mut r = Array2::<f64>::zeros((self.rows.len(), k));
        let mut q = Array1::<f64>::zeros(self.rows.len());
        for (i, restriction) in self.rows.iter().enumerate() {
            r.row_mut(i).assign(&restriction.row(fitted)?);
            q[i] = restriction.value;
        }
        Ok((r, q))
    }
}

/// Alternative hypothesis for a single restriction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Alternative {
    /// `c'β ≠ q`
    #[default]
    TwoSided,
    /// `c'β > q`
    Greater,
    /// `c'β < q`
    Less,
}

impl Alternative {
    /// One-sided p-value from a two-sided one.
    ///
    /// Half the two-sided p-value when the estimate lies on the side of the
    /// alternative, one minus that half otherwise.
    pub fn p_value(&self, two_sided: f64, estimate: f64) -> f64 {
        let half = two_sided / 2.0;
        match self {
            Self::TwoSided => two_sided,
            Self::Greater if estimate > 0.0 => half,
            Self::Less if estimate < 0.0 => half,
            Self::Greater | Self::Less => 1.0 - half,
        }
    }
}

/// Reference distribution of a Wald statistic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WaldDistribution {
    /// `W ~ χ²(df)`
    ChiSquared,
    /// `W / df ~ F(df, df_denom)`
    F {
        /// Denominator degrees of freedom
        df_denom: usize,
    },
}

/// Result of a joint Wald test.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WaldTest {
    /// Test name
    pub name: String,
    /// Statistic (χ² form, or F form for [`WaldDistribution::F`])
    pub statistic: f64,
    /// Number of restrictions
    pub df: usize,
    /// p-value
    pub p_value: f64,
    /// Reference distribution
    pub distribution: WaldDistribution,
    /// Restrictions as written
    pub restrictions: Vec<String>,
}

/// Result of a single-restriction test.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinearTest {
    /// Test name
    pub name: String,
    /// `c'β̂ − q`
    pub estimate: f64,
    /// `√(c'Vc)`
    pub std_err: f64,
    /// `estimate / std_err`
    pub statistic: f64,
    /// Two-sided p-value
    pub p_value_two_sided: f64,
    /// p-value under `alternative`
    pub p_value: f64,
    /// Alternative hypothesis
    pub alternative: Alternative,
}

impl LinearTest {
    /// The same test under another alternative.
    pub fn with_alternative(&self, alternative: Alternative) -> Self {
        Self {
            p_value: alternative.p_value(self.p_value_two_sided, self.estimate),
            alternative,
            ..self.clone()
        }
    }
}

impl FittedModel {
    /// Joint Wald test, χ² form.
    pub fn wald_test(&self, name: &str, restriction: &Restriction) -> Result<WaldTest> {
        let (statistic, df, labels) = self.wald_statistic(restriction)?;
        Ok(WaldTest {
            name: name.to_string(),
            statistic,
            df,
            p_value: chi_squared_sf(statistic, df)?,
            distribution: WaldDistribution::ChiSquared,
            restrictions: labels,
        })
    }

    /// Joint Wald test, F form with the residual degrees of freedom.
    pub fn wald_test_f(&self, name: &str, restriction: &Restriction) -> Result<WaldTest> {
        let (chi2, df, labels) = self.wald_statistic(restriction)?;
        let statistic = chi2 / df as f64;
        Ok(WaldTest {
            name: name.to_string(),
            statistic,
            df,
            p_value: f_sf(statistic, df, self.df_resid())?,
            distribution: WaldDistribution::F {
                df_denom: self.df_resid(),
            },
            restrictions: labels,
        })
    }

    /// Test a single coefficient against zero.
    pub fn test_coefficient(&self, name: &str, alternative: Alternative) -> Result<LinearTest> {
        self.test_linear(name, &LinearRestriction::zero(name), alternative)
    }

    /// Test a single linear restriction, e.g. a sum of lag coefficients.
    pub fn test_linear(
        &self,
        name: &str,
        restriction: &LinearRestriction,
        alternative: Alternative,
    ) -> Result<LinearTest> {
        let c = restriction.row(self)?;
        let estimate = c.dot(self.params()) - restriction.value;
        let variance = c.dot(&self.cov().dot(&c));
        let std_err = variance.max(0.0).sqrt();
        let statistic = estimate / std_err;
        let two_sided = self.distribution().two_sided_p(statistic, self.df_resid())?;
        Ok(LinearTest {
            name: name.to_string(),
            estimate,
            std_err,
            statistic,
            p_value_two_sided: two_sided,
            p_value: alternative.p_value(two_sided, estimate),
            alternative,
        })
    }

    fn wald_statistic(&self, restriction: &Restriction) -> Result<(f64, usize, Vec<String>)> {
        if restriction.is_empty() {
            return Err(RegressionError::InvalidParameter(
                "no restrictions to test".to_string(),
            ));
        }
        let labels: Vec<String> = restriction.rows().iter().map(ToString::to_string).collect();
        let (r, q) = restriction.system(self)?;
        let d = r.dot(self.params()) - &q;
        let middle = r.dot(self.cov()).dot(&r.t());
        let chol = Cholesky::factor(&middle, DEFAULT_RANK_TOLERANCE).map_err(|dropped| {
            RegressionError::DependentRestrictions {
                rows: dropped.iter().map(|&i| labels[i].clone()).collect(),
            }
        })?;
        let statistic = d.dot(&chol.solve(&d));
        Ok((statistic, restriction.len(), labels))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("a + b = 0", vec![("a", 1.0), ("b", 1.0)], 0.0)]
    #[case("2*a - b = 1", vec![("a", 2.0), ("b", -1.0)], 1.0)]
    #[case("share_lag1", vec![("share_lag1", 1.0)], 0.0)]
    #[case("-x + 0.5*y + x = -2", vec![("x", 0.0), ("y", 0.5)], -2.0)]
    fn test_parse(#[case] formula: &str, #[case] terms: Vec<(&str, f64)>, #[case] value: f64) {
        let parsed = LinearRestriction::parse(formula).unwrap();
        let expected: Vec<(String, f64)> = terms.into_iter().map(|(n, w)| (n.to_string(), w)).collect();
        assert_eq!(parsed.terms, expected);
        assert_eq!(parsed.value, value);
    }

    #[rstest]
    #[case("a*b = 0")]
    #[case("a + = 0")]
    #[case("a = b")]
    #[case("= 1")]
    #[case("a = 0 = 1")]
    fn test_parse_rejects(#[case] formula: &str) {
        assert!(matches!(
            LinearRestriction::parse(formula),
            Err(RegressionError::InvalidRestriction { .. })
        ));
    }

    #[test]
    fn test_display() {
        let r = LinearRestriction::parse("2*a - b + c = 1").unwrap();
        assert_eq!(r.to_string(), "2*a - b + c = 1");
        assert_eq!(LinearRestriction::sum(["x", "y"]).to_string(), "x + y = 0");
    }

    #[rstest]
    #[case(Alternative::TwoSided, 0.08, 1.0, 0.08)]
    #[case(Alternative::Greater, 0.08, 1.0, 0.04)]
    #[case(Alternative::Greater, 0.08, -1.0, 0.96)]
    #[case(Alternative::Less, 0.08, -1.0, 0.04)]
    #[case(Alternative::Less, 0.08, 1.0, 0.96)]
    fn test_one_sided(#[case] alt: Alternative, #[case] p: f64, #[case] est: f64, #[case] expected: f64) {
        assert!((alt.p_value(p, est) - expected).abs() < 1e-12);
    }
}
