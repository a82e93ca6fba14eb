#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/factordynamics/munipanel/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod covariance;
pub mod design;
pub mod distribution;
pub mod error;
pub mod hypothesis;
pub mod linalg;
pub mod model;
pub mod within;

pub use covariance::{ClusterBy, CovarianceError, CovarianceEstimator, CovarianceType};
pub use design::{DesignColumns, Grouping, PanelDesign};
pub use distribution::Distribution;
pub use error::{RegressionError, Result};
pub use hypothesis::{
    Alternative, LinearRestriction, LinearTest, Restriction, WaldDistribution, WaldTest,
};
pub use model::{Coefficient, FTest, FitConfig, FittedModel, FixedEffectsEstimator, PanelModel};
pub use within::{Effects, WithinConfig, WithinTransform};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
