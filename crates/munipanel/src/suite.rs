//! Parallel estimation of independent model specifications.

use crate::catalog::ModelSpec;
use crate::{PipelineError, Result};
use munipanel_panel::PanelVariant;
use munipanel_regression::{
    Alternative, FitConfig, FittedModel, FixedEffectsEstimator, LinearRestriction, LinearTest,
    RegressionError, WaldTest,
};
use polars::prelude::DataFrame;
use rayon::prelude::*;
use tracing::{debug, info, warn};

/// The panel variants as frames, shared read-only by every fit.
#[derive(Debug, Clone)]
pub struct PanelFrames {
    /// Lags only
    pub lagged: DataFrame,
    /// Lags and leads
    pub lagged_with_leads: DataFrame,
}

impl PanelFrames {
    /// Frame of a variant.
    pub const fn get(&self, variant: PanelVariant) -> &DataFrame {
        match variant {
            PanelVariant::Lagged => &self.lagged,
            PanelVariant::LaggedWithLeads => &self.lagged_with_leads,
        }
    }
}

/// A successfully fitted specification with its tests.
#[derive(Debug, Clone)]
pub struct ModelOutcome {
    /// The fit
    pub fitted: FittedModel,
    /// Wald tests in catalogue order
    pub tests: Vec<WaldTest>,
    /// Signed test of the cumulative effect
    pub cumulative: LinearTest,
}

impl ModelOutcome {
    /// Model name.
    pub fn name(&self) -> &str {
        self.fitted.name()
    }

    /// Wald test by name.
    pub fn test(&self, name: &str) -> Option<&WaldTest> {
        self.tests.iter().find(|t| t.name == name)
    }
}

/// A set of specifications fitted concurrently with shared settings.
#[derive(Debug, Clone)]
pub struct ModelSuite {
    specs: Vec<ModelSpec>,
    config: FitConfig,
}

impl ModelSuite {
    /// Suite over `specs`; `config` supplies everything except the covariance.
    pub const fn new(specs: Vec<ModelSpec>, config: FitConfig) -> Self {
        Self { specs, config }
    }

    /// Specifications in run order.
    pub fn specs(&self) -> &[ModelSpec] {
        &self.specs
    }

    /// Fit every specification on worker threads.
    ///
    /// Results come back in specification order; a failure names its model
    /// and leaves the others untouched.
    pub fn run(&self, frames: &PanelFrames) -> Vec<Result<ModelOutcome>> {
        let results: Vec<Result<ModelOutcome>> = self
            .specs
            .par_iter()
            .map(|spec| self.fit_one(spec, frames.get(spec.variant())))
            .collect();

        let failed = results.iter().filter(|r| r.is_err()).count();
        info!(
            models = results.len(),
            fitted = results.len() - failed,
            failed,
            "model suite finished"
        );
        results
    }

    /// Fit one specification and evaluate its hypotheses.
    pub fn fit_one(&self, spec: &ModelSpec, df: &DataFrame) -> Result<ModelOutcome> {
        let wrap = |source: RegressionError| PipelineError::Model {
            model: spec.name().to_string(),
            source,
        };
        let outcome = estimate(spec, &self.config, df).map_err(wrap);
        match &outcome {
            Ok(o) => debug!(
                model = spec.name(),
                nobs = o.fitted.nobs(),
                rsq_within = o.fitted.rsq_within(),
                "model fitted"
            ),
            Err(e) => warn!(model = spec.name(), error = %e, "model failed"),
        }
        outcome
    }
}

fn estimate(
    spec: &ModelSpec,
    base: &FitConfig,
    df: &DataFrame,
) -> std::result::Result<ModelOutcome, RegressionError> {
    let fitted = FixedEffectsEstimator::new(spec.fit_config(base)).fit_frame(&spec.model, df)?;
    let tests = spec
        .tests
        .iter()
        .map(|t| fitted.wald_test(&t.name, &t.restriction))
        .collect::<std::result::Result<Vec<_>, _>>()?;
    let cumulative = fitted.test_linear(
        "cumulative",
        &LinearRestriction::sum(&spec.cumulative_terms),
        Alternative::TwoSided,
    )?;
    Ok(ModelOutcome {
        fitted,
        tests,
        cumulative,
    })
}
