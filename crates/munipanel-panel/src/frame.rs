//! Panel variants as polars `DataFrame`s.

use crate::arena::Panel;
use crate::variables::{CODE, NAME, STATE, YEAR};
use crate::Result;
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Column set of an exported panel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PanelVariant {
    /// Contemporaneous values and lags (dynamic models)
    Lagged,
    /// Lags plus forward-looking leads (pre-trend tests)
    LaggedWithLeads,
}

impl PanelVariant {
    /// Returns all variants.
    pub fn all() -> Vec<Self> {
        vec![Self::Lagged, Self::LaggedWithLeads]
    }

    /// File stem of the variant.
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Lagged => "panel_lagged",
            Self::LaggedWithLeads => "panel_lagged_leads",
        }
    }

    /// Whether lead columns are included.
    pub const fn includes_leads(&self) -> bool {
        matches!(self, Self::LaggedWithLeads)
    }
}

impl fmt::Display for PanelVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl Panel {
    /// Value columns of a variant, in derivation order.
    pub fn variant_columns(&self, variant: PanelVariant) -> Vec<&str> {
        self.column_names()
            .iter()
            .filter(|name| {
                variant.includes_leads()
                    || !self
                        .temporal_columns()
                        .iter()
                        .any(|t| t.is_lead() && &t.name == *name)
            })
            .map(String::as_str)
            .collect()
    }

    /// One row per (entity, year), sorted by code, state and year.
    pub fn to_dataframe(&self, variant: PanelVariant) -> Result<DataFrame> {
        let rows = self.row_count();
        let mut codes = Vec::with_capacity(rows);
        let mut states = Vec::with_capacity(rows);
        let mut names = Vec::with_capacity(rows);
        let mut years = Vec::with_capacity(rows);

        for series in self.entities() {
            for &year in series.years() {
                codes.push(series.key().code.as_str());
                states.push(series.key().state.abbreviation());
                names.push(series.name());
                years.push(year);
            }
        }

        let mut columns = vec![
            Column::new(CODE.into(), codes),
            Column::new(STATE.into(), states),
            Column::new(NAME.into(), names),
            Column::new(YEAR.into(), years),
        ];
        for name in self.variant_columns(variant) {
            let mut values: Vec<Option<f64>> = Vec::with_capacity(rows);
            for series in self.entities() {
                match series.column(name) {
                    Some(column) => values.extend_from_slice(column),
                    None => values.extend(std::iter::repeat_n(None, series.len())),
                }
            }
            columns.push(Column::new(name.into(), values));
        }

        Ok(DataFrame::new(columns)?)
    }
}
