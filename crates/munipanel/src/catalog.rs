//! The model specifications estimated by the pipeline.
//!
//! Four analyses relate an outcome to the disbursement share and its lags:
//!
//! ```text
//! y_it = Σ_{k=0..K} β_k share_{i,t-k} + γ' controls_{i,t-1} + α_i + λ_t + ε_it
//! ```
//!
//! The complementary form adds leads of the share (pre-trend check). Every
//! form is fitted twice, with errors clustered by municipality and by state.
//!
//! Tests attached to each specification:
//!
//! ```text
//! joint_betas   β_0 = β_1 = ... = β_K = 0
//! cumulative    β_0 + β_1 + ... + β_K = 0
//! leads         θ_1 = ... = θ_L = 0          (complementary form)
//! ```

use munipanel_panel::variables::*;
use munipanel_panel::{PanelVariant, lag_name, lead_name};
use munipanel_regression::{ClusterBy, CovarianceType, FitConfig, PanelModel, Restriction};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Outcome and credit measure of one analysis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Analysis {
    /// Real GDP growth on total disbursements
    Gdp,
    /// Industrial value added on industrial disbursements
    IndustryValueAdded,
    /// Agricultural value added on agricultural disbursements
    AgricultureValueAdded,
    /// Real GDP per capita growth on total disbursements
    GdpPerCapita,
}

impl Analysis {
    /// All analyses in catalogue order.
    pub const ALL: [Self; 4] = [
        Self::Gdp,
        Self::IndustryValueAdded,
        Self::AgricultureValueAdded,
        Self::GdpPerCapita,
    ];

    /// Position in the catalogue, starting at 1.
    pub const fn number(&self) -> u8 {
        match self {
            Self::Gdp => 1,
            Self::IndustryValueAdded => 2,
            Self::AgricultureValueAdded => 3,
            Self::GdpPerCapita => 4,
        }
    }

    /// Short label used in model names.
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Gdp => "gdp",
            Self::IndustryValueAdded => "va_industry",
            Self::AgricultureValueAdded => "va_agriculture",
            Self::GdpPerCapita => "gdp_pc",
        }
    }

    /// Dependent variable.
    pub const fn outcome(&self) -> &'static str {
        match self {
            Self::Gdp => DELTA_LOG_GDP_REAL,
            Self::IndustryValueAdded => DELTA_ASINH_VA_INDUSTRY_REAL,
            Self::AgricultureValueAdded => DELTA_ASINH_VA_AGRICULTURE_REAL,
            Self::GdpPerCapita => DELTA_LOG_GDP_PC_REAL,
        }
    }

    /// Disbursement share whose lags are tested.
    pub const fn share(&self) -> &'static str {
        match self {
            Self::Gdp | Self::GdpPerCapita => SHARE_DISBURSEMENT,
            Self::IndustryValueAdded => SHARE_DISBURSEMENT_INDUSTRY,
            Self::AgricultureValueAdded => SHARE_DISBURSEMENT_AGRICULTURE,
        }
    }

    /// Lagged controls; the per-capita outcome already scales by population.
    pub fn controls(&self) -> Vec<String> {
        let mut controls = vec![
            lag_name(LOG_GDP_PC_REAL, 1),
            lag_name(SHARE_INDUSTRY, 1),
            lag_name(SHARE_AGRICULTURE, 1),
        ];
        if *self != Self::GdpPerCapita {
            controls.push(lag_name(LOG_POPULATION, 1));
        }
        controls
    }
}

impl fmt::Display for Analysis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// Principal or complementary (with leads) specification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Form {
    /// Share and lags
    Principal,
    /// Share, lags and leads
    Complementary,
}

impl Form {
    /// Label used in model names.
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Principal => "principal",
            Self::Complementary => "complementary",
        }
    }

    /// Panel variant carrying the required columns.
    pub const fn variant(&self) -> PanelVariant {
        match self {
            Self::Principal => PanelVariant::Lagged,
            Self::Complementary => PanelVariant::LaggedWithLeads,
        }
    }
}

/// Cluster dimension of the standard errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Clustering {
    /// By municipality
    Entity,
    /// By federative unit
    State,
}

impl Clustering {
    /// Covariance estimator for this dimension.
    pub fn covariance(&self) -> CovarianceType {
        match self {
            Self::Entity => CovarianceType::Clustered(ClusterBy::Entity),
            Self::State => CovarianceType::Clustered(ClusterBy::Column(STATE.to_string())),
        }
    }

    const fn suffix(&self) -> &'static str {
        match self {
            Self::Entity => "",
            Self::State => "_state_cluster",
        }
    }
}

/// A named linear hypothesis attached to a specification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestSpec {
    /// Test name, e.g. `joint_betas`
    pub name: String,
    /// Restrictions tested jointly
    pub restriction: Restriction,
}

/// One entry of the catalogue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelSpec {
    /// Analysis
    pub analysis: Analysis,
    /// Form
    pub form: Form,
    /// Cluster dimension
    pub clustering: Clustering,
    /// Regression
    pub model: PanelModel,
    /// Hypotheses
    pub tests: Vec<TestSpec>,
    /// Terms summed by the cumulative test
    pub cumulative_terms: Vec<String>,
}

impl ModelSpec {
    /// Build a specification with `max_lag` lags and, for the complementary
    /// form, `max_lead` leads of the share.
    pub fn new(
        analysis: Analysis,
        form: Form,
        clustering: Clustering,
        max_lag: u32,
        max_lead: u32,
    ) -> Self {
        let share = analysis.share();
        let mut betas = vec![share.to_string()];
        betas.extend((1..=max_lag).map(|k| lag_name(share, k)));
        let leads: Vec<String> = match form {
            Form::Principal => Vec::new(),
            Form::Complementary => (1..=max_lead).map(|k| lead_name(share, k)).collect(),
        };

        let suffix = match form {
            Form::Principal => "",
            Form::Complementary => "c",
        };
        let name = format!(
            "model{}{}_{}_{}{}",
            analysis.number(),
            suffix,
            analysis.label(),
            form.label(),
            clustering.suffix()
        );

        let regressors = betas
            .iter()
            .chain(&leads)
            .cloned()
            .chain(analysis.controls());
        let model = PanelModel::new(name, analysis.outcome(), regressors);

        let mut tests = vec![
            TestSpec {
                name: "joint_betas".to_string(),
                restriction: Restriction::zeros(&betas),
            },
            TestSpec {
                name: "cumulative".to_string(),
                restriction: Restriction::sum(&betas),
            },
        ];
        if !leads.is_empty() {
            tests.push(TestSpec {
                name: "leads".to_string(),
                restriction: Restriction::zeros(&leads),
            });
        }

        Self {
            analysis,
            form,
            clustering,
            model,
            tests,
            cumulative_terms: betas,
        }
    }

    /// Model name, also the artifact file stem.
    pub fn name(&self) -> &str {
        &self.model.name
    }

    /// Panel variant the model is fitted on.
    pub const fn variant(&self) -> PanelVariant {
        self.form.variant()
    }

    /// `base` with this specification's covariance estimator.
    pub fn fit_config(&self, base: &FitConfig) -> FitConfig {
        FitConfig {
            covariance: self.clustering.covariance(),
            ..base.clone()
        }
    }

    /// Columns read from the panel frame.
    pub fn required_columns(&self) -> Vec<&str> {
        let mut columns = vec![CODE, STATE, YEAR, self.model.dependent.as_str()];
        columns.extend(self.model.regressors.iter().map(String::as_str));
        columns
    }
}

/// The sixteen specifications: four analyses, two forms, two cluster
/// dimensions.
pub fn standard_catalog(max_lag: u32, max_lead: u32) -> Vec<ModelSpec> {
    let mut specs = Vec::with_capacity(16);
    for analysis in Analysis::ALL {
        for form in [Form::Principal, Form::Complementary] {
            for clustering in [Clustering::Entity, Clustering::State] {
                specs.push(ModelSpec::new(analysis, form, clustering, max_lag, max_lead));
            }
        }
    }
    specs
}

/// Look up a specification by name.
pub fn find<'a>(specs: &'a [ModelSpec], name: &str) -> Option<&'a ModelSpec> {
    specs.iter().find(|spec| spec.name() == name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::collections::HashSet;

    #[test]
    fn test_sixteen_unique_names() {
        let specs = standard_catalog(3, 2);
        assert_eq!(specs.len(), 16);
        let names: HashSet<_> = specs.iter().map(ModelSpec::name).collect();
        assert_eq!(names.len(), 16);
        assert!(names.contains("model1_gdp_principal"));
        assert!(names.contains("model1c_gdp_complementary_state_cluster"));
        assert!(names.contains("model4_gdp_pc_principal"));
    }

    #[test]
    fn test_principal_gdp_regressors() {
        let spec = ModelSpec::new(Analysis::Gdp, Form::Principal, Clustering::Entity, 3, 2);
        assert_eq!(spec.model.dependent, "delta_log_gdp_real");
        assert_eq!(
            spec.model.regressors,
            vec![
                "share_disbursement",
                "share_disbursement_lag1",
                "share_disbursement_lag2",
                "share_disbursement_lag3",
                "log_gdp_pc_real_lag1",
                "share_industry_lag1",
                "share_agriculture_lag1",
                "log_population_lag1",
            ]
        );
        assert_eq!(spec.variant(), PanelVariant::Lagged);
        let tests: Vec<_> = spec.tests.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(tests, vec!["joint_betas", "cumulative"]);
        assert_eq!(spec.tests[0].restriction.len(), 4);
        assert_eq!(spec.tests[1].restriction.len(), 1);
    }

    #[test]
    fn test_complementary_adds_leads_and_test() {
        let spec = ModelSpec::new(
            Analysis::IndustryValueAdded,
            Form::Complementary,
            Clustering::State,
            3,
            2,
        );
        assert_eq!(spec.name(), "model2c_va_industry_complementary_state_cluster");
        assert!(spec.model.regressors.contains(&"share_disbursement_industry_lead2".to_string()));
        assert_eq!(spec.variant(), PanelVariant::LaggedWithLeads);
        let leads = spec.tests.iter().find(|t| t.name == "leads").unwrap();
        assert_eq!(leads.restriction.len(), 2);
        assert_eq!(
            spec.fit_config(&FitConfig::default()).covariance,
            CovarianceType::Clustered(ClusterBy::Column("state".to_string()))
        );
    }

    #[rstest]
    #[case(Analysis::Gdp, true)]
    #[case(Analysis::IndustryValueAdded, true)]
    #[case(Analysis::AgricultureValueAdded, true)]
    #[case(Analysis::GdpPerCapita, false)]
    fn test_population_control(#[case] analysis: Analysis, #[case] expected: bool) {
        assert_eq!(
            analysis.controls().contains(&"log_population_lag1".to_string()),
            expected
        );
    }

    #[test]
    fn test_find_and_required_columns() {
        let specs = standard_catalog(2, 1);
        let spec = find(&specs, "model3_va_agriculture_principal").unwrap();
        let columns = spec.required_columns();
        assert_eq!(&columns[..4], &["code", "state", "year", "delta_asinh_va_agriculture_real"]);
        assert!(columns.contains(&"share_disbursement_agriculture_lag2"));
        assert!(!columns.contains(&"share_disbursement_agriculture_lag3"));
        assert!(find(&specs, "model9").is_none());
    }
}
