//! Regression designs extracted from panel tables.
//!
//! Each specification gets its own sample: a row survives only if the
//! dependent variable, every regressor, the panel identifiers and (when
//! requested) the cluster column are all present and finite. Singletons are
//! kept.

use crate::{RegressionError, Result};
use ndarray::{Array1, Array2};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Identifier columns of a panel table.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DesignColumns {
    /// Columns jointly identifying an entity (default: code, state)
    pub entity: Vec<String>,

    /// Time column (default: year)
    pub time: String,
}

impl Default for DesignColumns {
    fn default() -> Self {
        Self {
            entity: vec!["code".to_string(), "state".to_string()],
            time: "year".to_string(),
        }
    }
}

/// Observations grouped under labels, mapped to dense 0-based indices.
#[derive(Debug, Clone)]
pub struct Grouping {
    name: String,
    ids: Vec<usize>,
    labels: Vec<String>,
}

impl Grouping {
    /// Index observations by label, in sorted label order.
    pub fn from_labels<S: AsRef<str>>(name: impl Into<String>, labels: &[S]) -> Self {
        let mut index = BTreeMap::new();
        for label in labels {
            index.entry(label.as_ref()).or_insert(0usize);
        }
        for (i, slot) in index.values_mut().enumerate() {
            *slot = i;
        }
        let ids = labels.iter().map(|l| index[l.as_ref()]).collect();
        let labels = index.keys().map(|s| s.to_string()).collect();
        Self {
            name: name.into(),
            ids,
            labels,
        }
    }

    /// Grouping name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Group index of every observation.
    pub fn ids(&self) -> &[usize] {
        &self.ids
    }

    /// Distinct labels, indexed by group id.
    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    /// Number of distinct groups.
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    /// Whether there are no groups.
    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}

/// Dependent vector, regressor matrix and panel structure for one fit.
#[derive(Debug, Clone)]
pub struct PanelDesign {
    dependent: String,
    regressors: Vec<String>,
    y: Array1<f64>,
    x: Array2<f64>,
    entity: Grouping,
    time: Grouping,
    clusters: Option<Grouping>,
    dropped: usize,
}

impl PanelDesign {
    /// Build a design from in-memory arrays.
    pub fn new<S: AsRef<str>, T: AsRef<str>>(
        dependent: impl Into<String>,
        regressors: Vec<String>,
        y: Array1<f64>,
        x: Array2<f64>,
        entity: &[S],
        time: &[T],
    ) -> Result<Self> {
        let n = y.len();
        for len in [x.nrows(), entity.len(), time.len()] {
            if len != n {
                return Err(RegressionError::DimensionMismatch {
                    expected: n,
                    actual: len,
                });
            }
        }
        if x.ncols() != regressors.len() {
            return Err(RegressionError::DimensionMismatch {
                expected: regressors.len(),
                actual: x.ncols(),
            });
        }
        Ok(Self {
            dependent: dependent.into(),
            regressors,
            y,
            x,
            entity: Grouping::from_labels("entity", entity),
            time: Grouping::from_labels("time", time),
            clusters: None,
            dropped: 0,
        })
    }

    /// Attach a custom clustering, one label per observation.
    pub fn with_clusters<S: AsRef<str>>(mut self, name: impl Into<String>, labels: &[S]) -> Result<Self> {
        if labels.len() != self.nobs() {
            return Err(RegressionError::DimensionMismatch {
                expected: self.nobs(),
                actual: labels.len(),
            });
        }
        self.clusters = Some(Grouping::from_labels(name, labels));
        Ok(self)
    }

    /// Extract the complete-case sample of a specification from a panel table.
    pub fn from_frame(
        df: &DataFrame,
        dependent: &str,
        regressors: &[String],
        columns: &DesignColumns,
        cluster_column: Option<&str>,
    ) -> Result<Self> {
        let height = df.height();
        let mut keep = vec![true; height];

        let mut numeric = |name: &str| -> Result<Vec<f64>> {
            let values = float_column(df, name)?;
            for (flag, v) in keep.iter_mut().zip(&values) {
                *flag &= v.is_finite();
            }
            Ok(values)
        };
        let y_all = numeric(dependent)?;
        let x_all = regressors
            .iter()
            .map(|name| numeric(name))
            .collect::<Result<Vec<_>>>()?;

        let entity_all = joined_labels(df, &columns.entity, &mut keep)?;
        let time_all = joined_labels(df, std::slice::from_ref(&columns.time), &mut keep)?;
        let cluster_all = cluster_column
            .map(|name| joined_labels(df, &[name.to_string()], &mut keep))
            .transpose()?;

        let rows: Vec<usize> = (0..height).filter(|&i| keep[i]).collect();
        let n = rows.len();

        let y = rows.iter().map(|&i| y_all[i]).collect::<Array1<f64>>();
        let mut x = Array2::<f64>::zeros((n, regressors.len()));
        for (j, column) in x_all.iter().enumerate() {
            for (r, &i) in rows.iter().enumerate() {
                x[[r, j]] = column[i];
            }
        }
        let pick = |labels: &[String]| -> Vec<String> { rows.iter().map(|&i| labels[i].clone()).collect() };

        let mut design = Self::new(
            dependent,
            regressors.to_vec(),
            y,
            x,
            &pick(&entity_all),
            &pick(&time_all),
        )?;
        if let (Some(name), Some(labels)) = (cluster_column, cluster_all) {
            design = design.with_clusters(name, &pick(&labels))?;
        }
        design.dropped = height - n;
        Ok(design)
    }

    /// Dependent variable name.
    pub fn dependent(&self) -> &str {
        &self.dependent
    }

    /// Regressor names, in column order.
    pub fn regressors(&self) -> &[String] {
        &self.regressors
    }

    /// Dependent vector.
    pub const fn y(&self) -> &Array1<f64> {
        &self.y
    }

    /// Regressor matrix.
    pub const fn x(&self) -> &Array2<f64> {
        &self.x
    }

    /// Entity grouping.
    pub const fn entity(&self) -> &Grouping {
        &self.entity
    }

    /// Time grouping.
    pub const fn time(&self) -> &Grouping {
        &self.time
    }

    /// Custom clustering, if attached.
    pub const fn clusters(&self) -> Option<&Grouping> {
        self.clusters.as_ref()
    }

    /// Number of observations.
    pub fn nobs(&self) -> usize {
        self.y.len()
    }

    /// Rows of the source table excluded for missing values.
    pub const fn dropped(&self) -> usize {
        self.dropped
    }
}

fn require<'a>(df: &'a DataFrame, name: &str) -> Result<&'a Series> {
    if df.get_column_index(name).is_none() {
        return Err(RegressionError::UnknownColumn(name.to_string()));
    }
    Ok(df.column(name)?.as_materialized_series())
}

fn float_column(df: &DataFrame, name: &str) -> Result<Vec<f64>> {
    let series = require(df, name)?.cast(&DataType::Float64)?;
    Ok(series
        .f64()?
        .into_iter()
        .map(|v| v.unwrap_or(f64::NAN))
        .collect())
}

/// Labels built by joining several identifier columns with `-`.
fn joined_labels(df: &DataFrame, names: &[String], keep: &mut [bool]) -> Result<Vec<String>> {
    let mut labels = vec![String::new(); df.height()];
    for (k, name) in names.iter().enumerate() {
        let series = require(df, name)?.cast(&DataType::String)?;
        for (i, value) in series.str()?.into_iter().enumerate() {
            match value {
                Some(v) => {
                    if k > 0 {
                        labels[i].push('-');
                    }
                    labels[i].push_str(v);
                }
                None => keep[i] = false,
            }
        }
    }
    Ok(labels)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame() -> DataFrame {
        DataFrame::new(vec![
            Column::new("code".into(), ["1", "1", "2", "2", "3"]),
            Column::new("state".into(), ["SP", "SP", "SP", "SP", "RJ"]),
            Column::new("year".into(), [2010i32, 2011, 2010, 2011, 2011]),
            Column::new("y".into(), [Some(1.0), Some(2.0), None, Some(4.0), Some(5.0)]),
            Column::new("x".into(), [Some(0.5), Some(f64::NAN), Some(1.0), Some(2.0), Some(3.0)]),
        ])
        .unwrap()
    }

    #[test]
    fn test_listwise_deletion() {
        let design = PanelDesign::from_frame(
            &frame(),
            "y",
            &["x".to_string()],
            &DesignColumns::default(),
            Some("state"),
        )
        .unwrap();
        assert_eq!(design.nobs(), 3);
        assert_eq!(design.dropped(), 2);
        assert_eq!(design.entity().labels(), &["1-SP", "2-SP", "3-RJ"]);
        assert_eq!(design.entity().ids(), &[0, 1, 2]);
        assert_eq!(design.time().labels(), &["2010", "2011"]);
        assert_eq!(design.clusters().unwrap().len(), 2);
        assert_eq!(design.x()[[2, 0]], 3.0);
    }

    #[test]
    fn test_unknown_column() {
        let err = PanelDesign::from_frame(
            &frame(),
            "y",
            &["missing".to_string()],
            &DesignColumns::default(),
            None,
        )
        .unwrap_err();
        assert!(matches!(err, RegressionError::UnknownColumn(name) if name == "missing"));
    }

    #[test]
    fn test_grouping_is_sorted() {
        let g = Grouping::from_labels("state", &["SP", "BA", "SP", "AC"]);
        assert_eq!(g.labels(), &["AC", "BA", "SP"]);
        assert_eq!(g.ids(), &[2, 1, 2, 0]);
    }
}
