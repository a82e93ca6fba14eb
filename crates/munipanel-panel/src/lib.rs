#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/factordynamics/munipanel/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod arena;
pub mod assemble;
pub mod error;
pub mod frame;
mod integrity;
pub mod transforms;
pub mod variables;

pub use arena::{
    ConversionAudit, ConversionEntry, Divisor, EntityKey, EntitySeries, Panel, TemporalColumn,
    lag_name, lead_name,
};
pub use assemble::{Assembly, AssemblyAudit, PanelAssembler, PanelConfig, PanelInputs};
pub use error::{PanelError, Result};
pub use frame::PanelVariant;
pub use transforms::ValuePolicy;
pub use variables::{
    VariableCategory, VariableInfo, available_variables, get_variable_info, variables_by_category,
};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
