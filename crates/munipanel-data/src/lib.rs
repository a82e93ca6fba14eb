#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/factordynamics/munipanel/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod deflator;
pub mod disbursement;
pub mod error;
pub mod geo;
pub mod resolve;
pub mod sector;
pub mod sources;

pub use deflator::{
    ChainEntry, ChainIndex, DeflatorConfig, DeflatorSet, PricePoint, PriceScope, PriceSources,
};
pub use disbursement::{AggregationConfig, DisbursementAggregate, DisbursementTotals, aggregate};
pub use error::{DataError, Result};
pub use geo::State;
pub use resolve::{
    MatchKey, NameOverride, ResolutionReport, ResolvedSource, Resolver, ResolverConfig,
};
pub use sector::{RawSector, Sector, SectorScope, Subsector};
pub use sources::{
    DisbursementRecord, GdpRow, PopulationRow, UNLOCATED_CODE, disbursements_from_frame,
    gdp_from_frame, municipality_code6, population_from_wide, prices_from_frame, wide_to_long,
};

/// Version information.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
