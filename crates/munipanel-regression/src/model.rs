//! Fixed-effects estimation
//!
//! Fits
//! ```text
//! y_it = x_it'β + α_i + λ_t + ε_it
//! ```
//! by least squares on within-transformed data. The fixed effects are never
//! estimated; they are absorbed by demeaning `y` and every column of `X`.
//!
//! Degrees of freedom:
//! ```text
//! df_resid = N − K − absorbed
//! absorbed = (#entities) + (#periods) − (#connected components)   two-way
//! ```
//!
//! Goodness of fit, given the estimated β:
//! ```text
//! R²_within  = 1 − Σ (ÿ − ẍβ)² / Σ ÿ²                 (entity-demeaned)
//! R²_between = 1 − Σ (ȳ_i − c − x̄_iβ)² / Σ (ȳ_i − mean ȳ)²
//! R²_overall = 1 − Σ (y − c − xβ)² / Σ (y − ȳ)²
//! ```

use crate::covariance::{
    ClusterBy, ClusterConfig, ClusteredEstimator, CovarianceEstimator, CovarianceType,
    PositiveDefiniteConfig, RobustEstimator, SandwichInputs, TwoWayClusteredEstimator,
    UnadjustedEstimator, condition_number,
};
use crate::design::{DesignColumns, PanelDesign};
use crate::distribution::{Distribution, f_sf};
use crate::linalg::{Cholesky, DEFAULT_RANK_TOLERANCE};
use crate::within::{Effects, WithinConfig, WithinTransform};
use crate::{RegressionError, Result};
use ndarray::{Array1, Array2};
use polars::prelude::DataFrame;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// A regression specification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PanelModel {
    /// Specification name
    pub name: String,
    /// Dependent column
    pub dependent: String,
    /// Regressor columns, in order
    pub regressors: Vec<String>,
    /// Absorbed effects
    pub effects: Effects,
}

impl PanelModel {
    /// Two-way fixed-effects specification.
    pub fn new<I, S>(name: impl Into<String>, dependent: impl Into<String>, regressors: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            dependent: dependent.into(),
            regressors: regressors.into_iter().map(Into::into).collect(),
            effects: Effects::TWO_WAY,
        }
    }

    /// Replace the absorbed effects.
    pub const fn with_effects(mut self, effects: Effects) -> Self {
        self.effects = effects;
        self
    }
}

/// Estimation configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FitConfig {
    /// Covariance estimator (default: clustered by entity)
    pub covariance: CovarianceType,

    /// Confidence level for intervals (default: 0.95)
    pub confidence: f64,

    /// Small-sample rescaling of robust (`n/df_resid`) and clustered
    /// (`(n−1)/df_resid`) covariances (default: true)
    pub debiased: bool,

    /// Extra `G/(G−1)` factor on clustered covariances (default: false)
    pub group_debias: bool,

    /// Eigenvalue floor for two-way clustered covariances; `None` disables it
    /// (default: floor at 0)
    pub psd_correction: Option<PositiveDefiniteConfig>,

    /// Reference distribution for t-statistics (default: Student-t)
    pub distribution: Distribution,

    /// Alternating-projection settings
    pub within: WithinConfig,

    /// Relative pivot tolerance for rank detection (default: 1e-9)
    pub rank_tolerance: f64,

    /// Identifier columns used when fitting from a table
    pub columns: DesignColumns,
}

impl Default for FitConfig {
    fn default() -> Self {
        Self {
            covariance: CovarianceType::default(),
            confidence: 0.95,
            debiased: true,
            group_debias: false,
            psd_correction: Some(PositiveDefiniteConfig::default()),
            distribution: Distribution::default(),
            within: WithinConfig::default(),
            rank_tolerance: DEFAULT_RANK_TOLERANCE,
            columns: DesignColumns::default(),
        }
    }
}

/// One estimated coefficient.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Coefficient {
    /// Regressor name
    pub name: String,
    /// Point estimate
    pub estimate: f64,
    /// Standard error
    pub std_err: f64,
    /// t-statistic
    pub t_stat: f64,
    /// Two-sided p-value
    pub p_value: f64,
    /// Lower confidence bound
    pub ci_low: f64,
    /// Upper confidence bound
    pub ci_high: f64,
}

/// Overall-significance F test.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FTest {
    /// Statistic
    pub statistic: f64,
    /// p-value
    pub p_value: f64,
    /// Numerator degrees of freedom
    pub df_num: usize,
    /// Denominator degrees of freedom
    pub df_denom: usize,
}

/// A fitted fixed-effects model.
#[derive(Debug, Clone)]
pub struct FittedModel {
    pub(crate) name: String,
    pub(crate) dependent: String,
    pub(crate) names: Vec<String>,
    pub(crate) params: Array1<f64>,
    pub(crate) cov: Array2<f64>,
    pub(crate) coefficients: Vec<Coefficient>,
    pub(crate) effects: Effects,
    pub(crate) cov_type: String,
    pub(crate) distribution: Distribution,
    pub(crate) nobs: usize,
    pub(crate) entities: usize,
    pub(crate) time_periods: usize,
    pub(crate) absorbed: usize,
    pub(crate) df_resid: usize,
    pub(crate) rsq: f64,
    pub(crate) rsq_within: f64,
    pub(crate) rsq_between: f64,
    pub(crate) rsq_overall: f64,
    pub(crate) f_test: FTest,
    pub(crate) f_test_robust: FTest,
    pub(crate) loglik: f64,
    pub(crate) rss: f64,
    pub(crate) residuals: Array1<f64>,
}

impl FittedModel {
    /// Specification name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Dependent variable.
    pub fn dependent(&self) -> &str {
        &self.dependent
    }

    /// Regressor names.
    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// Coefficient vector.
    pub const fn params(&self) -> &Array1<f64> {
        &self.params
    }

    /// Parameter covariance.
    pub const fn cov(&self) -> &Array2<f64> {
        &self.cov
    }

    /// Coefficient table, in regressor order.
    pub fn coefficients(&self) -> &[Coefficient] {
        &self.coefficients
    }

    /// Coefficient by regressor name.
    pub fn coefficient(&self, name: &str) -> Option<&Coefficient> {
        self.coefficients.iter().find(|c| c.name == name)
    }

    /// Position of a regressor.
    pub fn index_of(&self, name: &str) -> Result<usize> {
        self.names
            .iter()
            .position(|n| n == name)
            .ok_or_else(|| RegressionError::UnknownCoefficient(name.to_string()))
    }

    /// Absorbed effects.
    pub const fn effects(&self) -> Effects {
        self.effects
    }

    /// Covariance label.
    pub fn cov_type(&self) -> &str {
        &self.cov_type
    }

    /// Reference distribution of the t-statistics.
    pub const fn distribution(&self) -> Distribution {
        self.distribution
    }

    /// Observations used.
    pub const fn nobs(&self) -> usize {
        self.nobs
    }

    /// Distinct entities in the sample.
    pub const fn entities(&self) -> usize {
        self.entities
    }

    /// Distinct periods in the sample.
    pub const fn time_periods(&self) -> usize {
        self.time_periods
    }

    /// Parameters absorbed by the fixed effects.
    pub const fn absorbed_dof(&self) -> usize {
        self.absorbed
    }

    /// Residual degrees of freedom.
    pub const fn df_resid(&self) -> usize {
        self.df_resid
    }

    /// R² of the demeaned regression.
    pub const fn rsq(&self) -> f64 {
        self.rsq
    }

    /// Within (entity-demeaned) R².
    pub const fn rsq_within(&self) -> f64 {
        self.rsq_within
    }

    /// Between (entity means) R².
    pub const fn rsq_between(&self) -> f64 {
        self.rsq_between
    }

    /// Overall R².
    pub const fn rsq_overall(&self) -> f64 {
        self.rsq_overall
    }

    /// Classic F test that every slope is zero.
    pub const fn f_test(&self) -> FTest {
        self.f_test
    }

    /// Covariance-consistent F test that every slope is zero.
    pub const fn f_test_robust(&self) -> FTest {
        self.f_test_robust
    }

    /// Gaussian log-likelihood.
    pub const fn loglik(&self) -> f64 {
        self.loglik
    }

    /// Residual sum of squares.
    pub const fn rss(&self) -> f64 {
        self.rss
    }

    /// Residuals of the demeaned regression.
    pub const fn residuals(&self) -> &Array1<f64> {
        &self.residuals
    }
}

/// Two-way fixed-effects estimator
#[derive(Debug, Clone, Default)]
pub struct FixedEffectsEstimator {
    config: FitConfig,
}

impl FixedEffectsEstimator {
    /// Create an estimator.
    pub const fn new(config: FitConfig) -> Self {
        Self { config }
    }

    /// Configuration.
    pub const fn config(&self) -> &FitConfig {
        &self.config
    }

    /// Extract the model's sample from a panel table and fit it.
    pub fn fit_frame(&self, model: &PanelModel, df: &DataFrame) -> Result<FittedModel> {
        let cluster_column = match self.config.covariance.clustering() {
            Some(ClusterBy::Column(name)) => Some(name.as_str()),
            _ => None,
        };
        let design = PanelDesign::from_frame(
            df,
            &model.dependent,
            &model.regressors,
            &self.config.columns,
            cluster_column,
        )?;
        debug!(
            model = %model.name,
            nobs = design.nobs(),
            dropped = design.dropped(),
            "design extracted"
        );
        self.fit(model, &design)
    }

    /// Fit a specification on a prepared design.
    pub fn fit(&self, model: &PanelModel, design: &PanelDesign) -> Result<FittedModel> {
        let names = design.regressors().to_vec();
        let k = names.len();
        let n = design.nobs();
        if k == 0 {
            return Err(RegressionError::InvalidParameter(format!(
                "model '{}' has no regressors",
                model.name
            )));
        }

        let within = WithinTransform::new(
            design.entity().ids(),
            design.time().ids(),
            model.effects,
            self.config.within,
        )?;
        let absorbed = within.absorbed_dof();
        if n <= k + absorbed {
            return Err(RegressionError::InsufficientObservations {
                nobs: n,
                params: k,
                absorbed,
            });
        }
        let df_resid = n - k - absorbed;

        let y = within.transform(design.y())?;
        let x = within.transform_matrix(design.x())?;

        let xtx = x.t().dot(&x);
        let scales: Vec<f64> = design
            .x()
            .columns()
            .into_iter()
            .map(|c| c.iter().map(|v| v * v).sum::<f64>())
            .collect();
        let chol = Cholesky::factor_scaled(&xtx, &scales, self.config.rank_tolerance).map_err(|dropped| {
            RegressionError::RankDeficient {
                columns: dropped.iter().map(|&j| names[j].clone()).collect(),
            }
        })?;

        let params = chol.solve(&x.t().dot(&y));
        let bread = chol.inverse();
        debug!(
            model = %model.name,
            condition = condition_number(&xtx),
            "normal equations solved"
        );

        let residuals = &y - &x.dot(&params);
        let rss = residuals.dot(&residuals);
        let tss = y.dot(&y);

        let inputs = SandwichInputs {
            x: &x,
            residuals: &residuals,
            bread: &bread,
            df_resid,
        };
        let (cov, cov_type) = self.covariance(&inputs, design)?;

        let coefficients = self.coefficient_table(&names, &params, &cov, df_resid)?;

        let df_num = k;
        let f_classic = if rss > 0.0 {
            ((tss - rss) / df_num as f64) / (rss / df_resid as f64)
        } else {
            f64::INFINITY
        };
        let f_test = FTest {
            statistic: f_classic,
            p_value: f_sf(f_classic, df_num, df_resid)?,
            df_num,
            df_denom: df_resid,
        };
        let f_robust = Cholesky::factor(&cov, self.config.rank_tolerance)
            .map(|c| params.dot(&c.solve(&params)) / df_num as f64)
            .unwrap_or(f64::NAN);
        let f_test_robust = FTest {
            statistic: f_robust,
            p_value: f_sf(f_robust, df_num, df_resid)?,
            df_num,
            df_denom: df_resid,
        };

        let (rsq_within, rsq_between, rsq_overall) = goodness_of_fit(design, &params, self.config.within)?;
        let nf = n as f64;
        let loglik = -0.5 * nf * ((2.0 * std::f64::consts::PI).ln() + (rss / nf).ln() + 1.0);

        debug!(
            model = %model.name,
            nobs = n,
            entities = design.entity().len(),
            periods = design.time().len(),
            absorbed,
            df_resid,
            cov_type = %cov_type,
            "model fitted"
        );

        Ok(FittedModel {
            name: model.name.clone(),
            dependent: design.dependent().to_string(),
            names,
            params,
            cov,
            coefficients,
            effects: model.effects,
            cov_type,
            distribution: self.config.distribution,
            nobs: n,
            entities: design.entity().len(),
            time_periods: design.time().len(),
            absorbed,
            df_resid,
            rsq: if tss > 0.0 { 1.0 - rss / tss } else { f64::NAN },
            rsq_within,
            rsq_between,
            rsq_overall,
            f_test,
            f_test_robust,
            loglik,
            rss,
            residuals,
        })
    }

    fn covariance(&self, inputs: &SandwichInputs<'_>, design: &PanelDesign) -> Result<(Array2<f64>, String)> {
        let cluster = ClusterConfig {
            debiased: self.config.debiased,
            group_debias: self.config.group_debias,
            psd_correction: self.config.psd_correction,
        };
        let cov = match &self.config.covariance {
            CovarianceType::Unadjusted => UnadjustedEstimator.estimate(inputs)?,
            CovarianceType::Robust => RobustEstimator::new(self.config.debiased).estimate(inputs)?,
            CovarianceType::Clustered(ClusterBy::Entity) => {
                ClusteredEstimator::new(cluster, "entity", design.entity().ids()).estimate(inputs)?
            }
            CovarianceType::Clustered(ClusterBy::Time) => {
                ClusteredEstimator::new(cluster, "time", design.time().ids()).estimate(inputs)?
            }
            CovarianceType::Clustered(ClusterBy::EntityAndTime) => TwoWayClusteredEstimator::new(
                cluster,
                ("entity", design.entity().ids()),
                ("time", design.time().ids()),
            )
            .estimate(inputs)?,
            CovarianceType::Clustered(ClusterBy::Column(name)) => {
                let groups = design
                    .clusters()
                    .filter(|g| g.name() == name)
                    .ok_or_else(|| RegressionError::UnknownColumn(name.clone()))?;
                ClusteredEstimator::new(cluster, name.as_str(), groups.ids()).estimate(inputs)?
            }
        };
        Ok((cov, self.config.covariance.label()))
    }

    fn coefficient_table(
        &self,
        names: &[String],
        params: &Array1<f64>,
        cov: &Array2<f64>,
        df_resid: usize,
    ) -> Result<Vec<Coefficient>> {
        let dist = self.config.distribution;
        let critical = dist.critical_value(self.config.confidence, df_resid)?;
        names
            .iter()
            .enumerate()
            .map(|(j, name)| {
                let estimate = params[j];
                let std_err = cov[[j, j]].max(0.0).sqrt();
                let t_stat = estimate / std_err;
                Ok(Coefficient {
                    name: name.clone(),
                    estimate,
                    std_err,
                    t_stat,
                    p_value: dist.two_sided_p(t_stat, df_resid)?,
                    ci_low: estimate - critical * std_err,
                    ci_high: estimate + critical * std_err,
                })
            })
            .collect()
    }
}

/// R² within, between and overall at the estimated slopes.
fn goodness_of_fit(design: &PanelDesign, params: &Array1<f64>, config: WithinConfig) -> Result<(f64, f64, f64)> {
    let y = design.y();
    let xb = design.x().dot(params);
    let entity = design.entity();

    let by_entity = WithinTransform::new(entity.ids(), design.time().ids(), Effects::ENTITY, config)?;
    let y_w = by_entity.transform(y)?;
    let xb_w = by_entity.transform(&xb)?;
    let within = r_squared(&(&y_w - &xb_w), &y_w);

    let groups = entity.len();
    let mut counts = vec![0.0; groups];
    let mut y_mean = vec![0.0; groups];
    let mut xb_mean = vec![0.0; groups];
    for (i, &g) in entity.ids().iter().enumerate() {
        counts[g] += 1.0;
        y_mean[g] += y[i];
        xb_mean[g] += xb[i];
    }
    let y_bar = Array1::from_iter(y_mean.iter().zip(&counts).map(|(s, c)| s / c));
    let xb_bar = Array1::from_iter(xb_mean.iter().zip(&counts).map(|(s, c)| s / c));
    let between = r_squared_with_intercept(&y_bar, &xb_bar);

    let overall = r_squared_with_intercept(y, &xb);
    Ok((within, between, overall))
}

fn r_squared(resid: &Array1<f64>, centered: &Array1<f64>) -> f64 {
    let tss = centered.dot(centered);
    if tss > 0.0 { 1.0 - resid.dot(resid) / tss } else { f64::NAN }
}

fn r_squared_with_intercept(y: &Array1<f64>, fitted: &Array1<f64>) -> f64 {
    let n = y.len().max(1) as f64;
    let c = (y.sum() - fitted.sum()) / n;
    let resid = y - fitted - c;
    let centered = y - y.sum() / n;
    r_squared(&resid, &centered)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    fn toy_design(x2: [f64; 6]) -> PanelDesign {
        let entity = ["a", "a", "a", "b", "b", "b"];
        let time = ["1", "2", "3", "1", "2", "3"];
        let x1 = [0.1, 0.9, 0.4, 0.7, 0.2, 0.8];
        let y = Array1::from_iter((0..6).map(|i| 2.0 * x1[i] + if i < 3 { 1.0 } else { -3.0 } + 0.05 * i as f64));
        let mut x = Array2::zeros((6, 2));
        for i in 0..6 {
            x[[i, 0]] = x1[i];
            x[[i, 1]] = x2[i];
        }
        PanelDesign::new("y", vec!["x1".into(), "x2".into()], y, x, &entity, &time).unwrap()
    }

    #[test]
    fn test_entity_constant_regressor_is_rank_deficient() {
        let design = toy_design([5.0, 5.0, 5.0, 7.0, 7.0, 7.0]);
        let model = PanelModel::new("toy", "y", ["x1", "x2"]).with_effects(Effects::ENTITY);
        let err = FixedEffectsEstimator::default().fit(&model, &design).unwrap_err();
        match err {
            RegressionError::RankDeficient { columns } => assert_eq!(columns, vec!["x2".to_string()]),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_fit_statistics_are_consistent() {
        let design = toy_design([0.3, -0.2, 0.5, 0.1, 0.4, -0.6]);
        let model = PanelModel::new("toy", "y", ["x1", "x2"]).with_effects(Effects::ENTITY);
        let config = FitConfig {
            covariance: CovarianceType::Unadjusted,
            ..Default::default()
        };
        let fitted = FixedEffectsEstimator::new(config).fit(&model, &design).unwrap();
        assert_eq!(fitted.nobs(), 6);
        assert_eq!(fitted.absorbed_dof(), 2);
        assert_eq!(fitted.df_resid(), 2);
        assert_eq!(fitted.cov_type(), "unadjusted");

        let c = fitted.coefficient("x1").unwrap();
        assert_abs_diff_eq!(c.t_stat, c.estimate / c.std_err, epsilon = 1e-12);
        assert!(c.ci_low < c.estimate && c.estimate < c.ci_high);
        assert!(fitted.rsq_within() > 0.9);
        // With entity effects only the model R² is the within R².
        assert_abs_diff_eq!(fitted.rsq(), fitted.rsq_within(), epsilon = 1e-12);
        assert!(fitted.f_test().statistic > 0.0);
        assert!(fitted.loglik().is_finite());
        assert!(fitted.index_of("nope").is_err());
    }

    #[test]
    fn test_default_inference_is_debiased_student_t() {
        let design = toy_design([0.3, -0.2, 0.5, 0.1, 0.4, -0.6]);
        let model = PanelModel::new("toy", "y", ["x1", "x2"]).with_effects(Effects::ENTITY);
        let fit = |debiased: bool| {
            FixedEffectsEstimator::new(FitConfig {
                covariance: CovarianceType::Clustered(ClusterBy::Time),
                debiased,
                ..Default::default()
            })
            .fit(&model, &design)
            .unwrap()
        };
        let default = fit(FitConfig::default().debiased);
        let raw = fit(false);

        // 6 rows, 2 regressors, 2 entity effects: (N−1)/df_resid = 5/2
        assert_eq!(default.df_resid(), 2);
        for (d, r) in default.cov().iter().zip(raw.cov().iter()) {
            assert_abs_diff_eq!(*d, r * 2.5, epsilon = 1e-12);
        }

        let c = default.coefficient("x1").unwrap();
        assert_eq!(default.distribution(), Distribution::StudentT);
        assert_abs_diff_eq!(
            c.p_value,
            Distribution::StudentT.two_sided_p(c.t_stat, 2).unwrap(),
            epsilon = 1e-12
        );
    }

    #[test]
    fn test_exact_fit_recovers_slope() {
        let entity = ["a", "a", "b", "b", "c", "c"];
        let time = ["1", "2", "1", "2", "1", "2"];
        let x = array![[1.0], [2.0], [0.5], [3.0], [2.0], [1.5]];
        let alpha = [10.0, -4.0, 0.5];
        let lambda = [0.0, 2.0];
        let y = Array1::from_iter((0..6).map(|i| 1.5 * x[[i, 0]] + alpha[i / 2] + lambda[i % 2]));
        let design = PanelDesign::new("y", vec!["x".into()], y, x, &entity, &time).unwrap();
        let model = PanelModel::new("exact", "y", ["x"]);
        let fitted = FixedEffectsEstimator::new(FitConfig {
            covariance: CovarianceType::Robust,
            ..Default::default()
        })
        .fit(&model, &design)
        .unwrap();
        assert_abs_diff_eq!(fitted.params()[0], 1.5, epsilon = 1e-9);
        assert!(fitted.rss() < 1e-15);
    }

    #[test]
    fn test_insufficient_observations() {
        let design = PanelDesign::new(
            "y",
            vec!["x".into()],
            array![1.0, 2.0],
            array![[1.0], [3.0]],
            &["a", "b"],
            &["1", "1"],
        )
        .unwrap();
        let model = PanelModel::new("tiny", "y", ["x"]).with_effects(Effects::ENTITY);
        assert!(matches!(
            FixedEffectsEstimator::default().fit(&model, &design),
            Err(RegressionError::InsufficientObservations { .. })
        ));
    }
}
