//! Chain-linked price indices.
//!
//! Each input year carries a value at current prices and the same value at
//! prior-year prices. Their ratio is the implicit price change into that year:
//! ```text
//! r(t)     = nominal(t) / constant(t)
//! I(t_ref) = 100
//! I(t)     = I(t + 1) / r(t + 1)     for t < t_ref
//! I(t)     = I(t - 1) * r(t)         for t > t_ref
//! real(t)  = nominal(t) * 100 / I(t)
//! ```
//!
//! The chain is built in one pass outward from the anchor. A link exists only
//! between consecutive calendar years with a valid (finite, positive) ratio;
//! every year beyond a broken link is undefined.
//!
//! # References
//! - IBGE, Sistema de Contas Nacionais: tabelas sinóticas 6 e 10.1
//!   (valores correntes e a preços do ano anterior).

use crate::{DataError, Result};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use tracing::{info, warn};

/// Economic scope of a price index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum PriceScope {
    /// Whole-economy GDP deflator
    Headline,
    /// Industrial value-added deflator
    Industry,
    /// Agricultural value-added deflator
    Agriculture,
}

impl PriceScope {
    /// Returns all scopes.
    pub fn all() -> Vec<Self> {
        vec![Self::Headline, Self::Industry, Self::Agriculture]
    }

    /// Returns the short scope name.
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Headline => "headline",
            Self::Industry => "industry",
            Self::Agriculture => "agriculture",
        }
    }
}

impl fmt::Display for PriceScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Deflator configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeflatorConfig {
    /// Year anchored at 100 (default: 2021)
    pub reference_year: i32,

    /// First year kept from the source tables (default: 2002)
    pub first_year: i32,

    /// Last year kept from the source tables (default: 2023)
    pub last_year: i32,
}

impl Default for DeflatorConfig {
    fn default() -> Self {
        Self {
            reference_year: 2021,
            first_year: 2002,
            last_year: 2023,
        }
    }
}

/// One year of a price source table.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PricePoint {
    /// Calendar year
    pub year: i32,
    /// Value at current prices
    pub nominal: Option<f64>,
    /// Same value at prior-year prices
    pub constant: Option<f64>,
}

impl PricePoint {
    /// Create a point with both values present.
    pub const fn new(year: i32, nominal: f64, constant: f64) -> Self {
        Self {
            year,
            nominal: Some(nominal),
            constant: Some(constant),
        }
    }

    /// Period-over-period ratio, if valid.
    pub fn ratio(&self) -> Option<f64> {
        let r = self.nominal? / self.constant?;
        (r.is_finite() && r > 0.0).then_some(r)
    }
}

/// One year of a built chain index.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ChainEntry {
    /// Calendar year
    pub year: i32,
    /// Period-over-period ratio r(t)
    pub ratio: Option<f64>,
    /// Chain index value I(t)
    pub index: Option<f64>,
}

/// A chain-linked price index anchored at 100.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChainIndex {
    series: String,
    reference_year: i32,
    entries: BTreeMap<i32, ChainEntry>,
}

impl ChainIndex {
    /// Build the index from a price table.
    ///
    /// Fails if the reference year is absent or a year is repeated.
    pub fn build(series: &str, points: &[PricePoint], config: &DeflatorConfig) -> Result<Self> {
        let mut sorted: Vec<PricePoint> = points
            .iter()
            .copied()
            .filter(|p| p.year >= config.first_year && p.year <= config.last_year)
            .collect();
        sorted.sort_by_key(|p| p.year);

        if let Some(w) = sorted.windows(2).find(|w| w[0].year == w[1].year) {
            return Err(DataError::DuplicateYear {
                series: series.to_string(),
                year: w[0].year,
            });
        }

        let anchor = sorted
            .iter()
            .position(|p| p.year == config.reference_year)
            .ok_or_else(|| DataError::AnchorYearMissing {
                series: series.to_string(),
                year: config.reference_year,
            })?;

        let ratios: Vec<Option<f64>> = sorted.iter().map(PricePoint::ratio).collect();
        let mut index: Vec<Option<f64>> = vec![None; sorted.len()];
        index[anchor] = Some(100.0);

        let linked = |later: usize| sorted[later].year == sorted[later - 1].year + 1;

        for i in (0..anchor).rev() {
            index[i] = match (index[i + 1], ratios[i + 1]) {
                (Some(next), Some(r)) if linked(i + 1) => Some(next / r),
                _ => None,
            };
        }
        for i in anchor + 1..sorted.len() {
            index[i] = match (index[i - 1], ratios[i]) {
                (Some(prev), Some(r)) if linked(i) => Some(prev * r),
                _ => None,
            };
        }

        let entries: BTreeMap<i32, ChainEntry> = sorted
            .iter()
            .zip(ratios.iter().zip(index.iter()))
            .map(|(p, (&ratio, &index))| {
                (
                    p.year,
                    ChainEntry {
                        year: p.year,
                        ratio,
                        index,
                    },
                )
            })
            .collect();

        let undefined: Vec<i32> = entries
            .values()
            .filter(|e| e.index.is_none())
            .map(|e| e.year)
            .collect();
        if undefined.is_empty() {
            info!(series, years = entries.len(), "chain index built");
        } else {
            warn!(series, ?undefined, "chain index undefined for some years");
        }

        Ok(Self {
            series: series.to_string(),
            reference_year: config.reference_year,
            entries,
        })
    }

    /// Series name.
    pub fn series(&self) -> &str {
        &self.series
    }

    /// Anchor year.
    pub const fn reference_year(&self) -> i32 {
        self.reference_year
    }

    /// Index value I(t).
    pub fn index(&self, year: i32) -> Option<f64> {
        self.entries.get(&year).and_then(|e| e.index)
    }

    /// Ratio r(t).
    pub fn ratio(&self, year: i32) -> Option<f64> {
        self.entries.get(&year).and_then(|e| e.ratio)
    }

    /// Convert a nominal value into reference-year prices.
    pub fn deflate(&self, year: i32, nominal: f64) -> Option<f64> {
        let real = nominal * 100.0 / self.index(year)?;
        real.is_finite().then_some(real)
    }

    /// Convert a reference-year value back into current prices.
    pub fn inflate(&self, year: i32, real: f64) -> Option<f64> {
        let nominal = real * self.index(year)? / 100.0;
        nominal.is_finite().then_some(nominal)
    }

    /// All entries in year order.
    pub fn entries(&self) -> impl Iterator<Item = &ChainEntry> {
        self.entries.values()
    }

    /// Export `(year, ratio, index)` as a DataFrame.
    pub fn to_dataframe(&self) -> Result<DataFrame> {
        let years: Vec<i32> = self.entries.keys().copied().collect();
        let ratios: Vec<Option<f64>> = self.entries.values().map(|e| e.ratio).collect();
        let index: Vec<Option<f64>> = self.entries.values().map(|e| e.index).collect();
        Ok(DataFrame::new(vec![
            Column::new("year".into(), years),
            Column::new("ratio".into(), ratios),
            Column::new(format!("index_{}", self.reference_year).into(), index),
        ])?)
    }
}

/// Price tables for the three scopes.
#[derive(Debug, Clone, Default)]
pub struct PriceSources {
    /// Headline (GDP) table
    pub headline: Vec<PricePoint>,
    /// Industrial value-added table
    pub industry: Vec<PricePoint>,
    /// Agricultural value-added table
    pub agriculture: Vec<PricePoint>,
}

/// The three deflators of a run; a failed scope is `None`.
#[derive(Debug, Clone, Default)]
pub struct DeflatorSet {
    headline: Option<ChainIndex>,
    industry: Option<ChainIndex>,
    agriculture: Option<ChainIndex>,
    failures: Vec<(PriceScope, String)>,
}

impl DeflatorSet {
    /// Build all three indices concurrently.
    ///
    /// An anchoring failure disables only its own scope.
    pub fn build(sources: &PriceSources, config: &DeflatorConfig) -> Self {
        let build = |scope: PriceScope, points: &[PricePoint]| {
            ChainIndex::build(scope.name(), points, config).map_err(|e| (scope, e.to_string()))
        };
        let (headline, (industry, agriculture)) = rayon::join(
            || build(PriceScope::Headline, &sources.headline),
            || {
                rayon::join(
                    || build(PriceScope::Industry, &sources.industry),
                    || build(PriceScope::Agriculture, &sources.agriculture),
                )
            },
        );

        let mut set = Self::default();
        for outcome in [headline, industry, agriculture] {
            match outcome {
                Ok(index) => set.insert(index),
                Err((scope, reason)) => {
                    warn!(scope = %scope, %reason, "deflator disabled");
                    set.failures.push((scope, reason));
                }
            }
        }
        set
    }

    /// Assemble a set from already-built indices.
    pub fn from_indices(
        headline: Option<ChainIndex>,
        industry: Option<ChainIndex>,
        agriculture: Option<ChainIndex>,
    ) -> Self {
        Self {
            headline,
            industry,
            agriculture,
            failures: Vec::new(),
        }
    }

    fn insert(&mut self, index: ChainIndex) {
        match index.series() {
            "industry" => self.industry = Some(index),
            "agriculture" => self.agriculture = Some(index),
            _ => self.headline = Some(index),
        }
    }

    /// Index for a scope, if it could be anchored.
    pub const fn get(&self, scope: PriceScope) -> Option<&ChainIndex> {
        match scope {
            PriceScope::Headline => self.headline.as_ref(),
            PriceScope::Industry => self.industry.as_ref(),
            PriceScope::Agriculture => self.agriculture.as_ref(),
        }
    }

    /// Deflate a nominal value; undefined when the scope or year is.
    pub fn deflate(&self, scope: PriceScope, year: i32, nominal: f64) -> Option<f64> {
        self.get(scope)?.deflate(year, nominal)
    }

    /// Scopes that failed to build, with the reason.
    pub fn failures(&self) -> &[(PriceScope, String)] {
        &self.failures
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn config(reference_year: i32) -> DeflatorConfig {
        DeflatorConfig {
            reference_year,
            first_year: 2000,
            last_year: 2030,
        }
    }

    fn points(pairs: &[(i32, f64)]) -> Vec<PricePoint> {
        pairs
            .iter()
            .map(|&(year, r)| PricePoint::new(year, 100.0 * r, 100.0))
            .collect()
    }

    #[test]
    fn test_anchor_is_exactly_100() {
        let index = ChainIndex::build(
            "headline",
            &points(&[(2019, 1.04), (2020, 1.05), (2021, 1.10)]),
            &config(2020),
        )
        .unwrap();
        assert_eq!(index.index(2020), Some(100.0));
    }

    #[test]
    fn test_forward_and_backward_links() {
        let index = ChainIndex::build(
            "headline",
            &points(&[(2019, 1.04), (2020, 1.05), (2021, 1.10), (2022, 1.02)]),
            &config(2020),
        )
        .unwrap();
        assert_relative_eq!(index.index(2019).unwrap(), 100.0 / 1.05, epsilon = 1e-12);
        assert_relative_eq!(index.index(2021).unwrap(), 110.0, epsilon = 1e-12);
        assert_relative_eq!(index.index(2022).unwrap(), 112.2, epsilon = 1e-12);
    }

    #[test]
    fn test_round_trip_consistency() {
        let index = ChainIndex::build(
            "headline",
            &points(&[(2010, 1.07), (2011, 1.08), (2012, 1.06), (2013, 1.09), (2014, 1.05)]),
            &config(2012),
        )
        .unwrap();
        for year in 2010..2014 {
            let linked = index.index(year).unwrap() * index.ratio(year + 1).unwrap();
            assert_relative_eq!(linked, index.index(year + 1).unwrap(), epsilon = 1e-10);
        }
    }

    #[test]
    fn test_scenario_index() {
        let index = ChainIndex::build(
            "headline",
            &points(&[(2010, 1.0), (2011, 1.05), (2012, 1.05)]),
            &config(2010),
        )
        .unwrap();
        assert_relative_eq!(index.index(2011).unwrap(), 105.0, epsilon = 1e-12);
        assert_relative_eq!(index.index(2012).unwrap(), 110.25, epsilon = 1e-12);
        assert_relative_eq!(index.deflate(2011, 110.0).unwrap(), 104.7619, epsilon = 1e-4);
        assert_relative_eq!(index.deflate(2012, 121.0).unwrap(), 109.7506, epsilon = 1e-4);
    }

    #[test]
    fn test_deflation_round_trip() {
        let index = ChainIndex::build(
            "headline",
            &points(&[(2015, 1.09), (2016, 1.07), (2017, 1.04)]),
            &config(2016),
        )
        .unwrap();
        for year in 2015..=2017 {
            let real = index.deflate(year, 1234.5).unwrap();
            assert_relative_eq!(index.inflate(year, real).unwrap(), 1234.5, epsilon = 1e-9);
        }
    }

    #[test]
    fn test_missing_anchor_fails() {
        let err = ChainIndex::build("industry", &points(&[(2019, 1.0), (2020, 1.1)]), &config(2021))
            .unwrap_err();
        assert!(matches!(err, DataError::AnchorYearMissing { year: 2021, .. }));
    }

    #[test]
    fn test_duplicate_year_fails() {
        let err = ChainIndex::build("headline", &points(&[(2020, 1.0), (2020, 1.1)]), &config(2020))
            .unwrap_err();
        assert!(matches!(err, DataError::DuplicateYear { year: 2020, .. }));
    }

    #[test]
    fn test_gap_breaks_chain() {
        let index = ChainIndex::build(
            "headline",
            &points(&[(2016, 1.1), (2017, 1.1), (2019, 1.1), (2020, 1.1), (2021, 1.1)]),
            &config(2020),
        )
        .unwrap();
        assert!(index.index(2019).is_some());
        assert_eq!(index.index(2017), None);
        assert_eq!(index.index(2016), None);
        assert!(index.index(2021).is_some());
        assert_eq!(index.deflate(2017, 50.0), None);
    }

    #[test]
    fn test_invalid_ratio_breaks_chain() {
        let mut pts = points(&[(2019, 1.1), (2020, 1.1), (2021, 1.1), (2022, 1.1)]);
        pts[3].constant = None;
        pts[1].constant = Some(0.0);
        let index = ChainIndex::build("agriculture", &pts, &config(2020)).unwrap();
        assert_eq!(index.index(2020), Some(100.0));
        // r(2020) is invalid, so 2019 cannot be reached backwards.
        assert_eq!(index.index(2019), None);
        assert!(index.index(2021).is_some());
        assert_eq!(index.index(2022), None);
    }

    #[test]
    fn test_window_filter() {
        let cfg = DeflatorConfig {
            reference_year: 2021,
            first_year: 2020,
            last_year: 2021,
        };
        let index =
            ChainIndex::build("headline", &points(&[(2019, 1.0), (2020, 1.1), (2021, 1.2)]), &cfg)
                .unwrap();
        assert_eq!(index.entries().count(), 2);
        assert_eq!(index.index(2019), None);
    }

    #[test]
    fn test_set_isolates_failed_scope() {
        let sources = PriceSources {
            headline: points(&[(2020, 1.1), (2021, 1.1)]),
            industry: points(&[(2019, 1.1), (2020, 1.1)]),
            agriculture: points(&[(2020, 1.2), (2021, 1.3)]),
        };
        let set = DeflatorSet::build(&sources, &config(2021));
        assert!(set.get(PriceScope::Headline).is_some());
        assert!(set.get(PriceScope::Industry).is_none());
        assert!(set.get(PriceScope::Agriculture).is_some());
        assert_eq!(set.failures().len(), 1);
        assert_eq!(set.failures()[0].0, PriceScope::Industry);
        assert_eq!(set.deflate(PriceScope::Industry, 2021, 10.0), None);
        assert_relative_eq!(
            set.deflate(PriceScope::Agriculture, 2021, 10.0).unwrap(),
            10.0,
            epsilon = 1e-12
        );
    }

    #[test]
    fn test_to_dataframe() {
        let index =
            ChainIndex::build("headline", &points(&[(2020, 1.1), (2021, 1.1)]), &config(2021))
                .unwrap();
        let df = index.to_dataframe().unwrap();
        assert_eq!(df.height(), 2);
        assert!(df.column("index_2021").is_ok());
    }
}
