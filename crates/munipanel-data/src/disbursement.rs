//! Aggregation of monthly disbursements to municipality-year totals.

use crate::geo::State;
use crate::sector::SectorScope;
use crate::sources::{DisbursementRecord, UNLOCATED_CODE, f64_values, i32_values, string_values};
use crate::{DataError, Result};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// Aggregation configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AggregationConfig {
    /// Multiplier applied to raw amounts (default: 0.001, reais to thousands)
    pub scale: f64,

    /// First year kept (default: 2002)
    pub first_year: i32,

    /// Last year kept (default: 2023)
    pub last_year: i32,
}

impl Default for AggregationConfig {
    fn default() -> Self {
        Self {
            scale: 1e-3,
            first_year: 2002,
            last_year: 2023,
        }
    }
}

/// Yearly disbursement totals of one municipality, in scaled units.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DisbursementTotals {
    /// 6-digit municipality code
    pub code: String,
    /// State
    pub state: State,
    /// Calendar year
    pub year: i32,
    /// All sectors
    pub total: f64,
    /// Industrial sectors after reclassification
    pub industry: f64,
    /// Agricultural sector
    pub agriculture: f64,
}

/// Output of [`aggregate`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DisbursementAggregate {
    /// Totals sorted by (code, state, year)
    pub totals: Vec<DisbursementTotals>,
    /// Scaled amount of records without a locatable municipality
    pub unlocated_total: f64,
    /// Number of monthly records kept
    pub records_used: usize,
    /// Number of records outside the year window
    pub records_out_of_window: usize,
}

impl DisbursementAggregate {
    /// Sum of `total` over all municipality-years.
    pub fn grand_total(&self) -> f64 {
        self.totals.iter().map(|t| t.total).sum()
    }
}

const fn scope_label(scope: SectorScope) -> &'static str {
    match scope {
        SectorScope::Industry => "industry",
        SectorScope::Agriculture => "agriculture",
        SectorScope::Other => "other",
    }
}

/// Sum monthly records per (code, state, year) into total, industrial and
/// agricultural amounts; absent sector sums are zero.
pub fn aggregate(
    records: &[DisbursementRecord],
    config: &AggregationConfig,
) -> Result<DisbursementAggregate> {
    let mut codes = Vec::with_capacity(records.len());
    let mut states = Vec::with_capacity(records.len());
    let mut years = Vec::with_capacity(records.len());
    let mut scopes = Vec::with_capacity(records.len());
    let mut amounts = Vec::with_capacity(records.len());
    let mut unlocated_total = 0.0;
    let mut records_out_of_window = 0;

    for record in records {
        if record.year < config.first_year || record.year > config.last_year {
            records_out_of_window += 1;
            continue;
        }
        let amount = record.amount * config.scale;
        let state = if record.code == UNLOCATED_CODE {
            None
        } else {
            record
                .state
                .or_else(|| State::from_municipality_code(&record.code))
        };
        let Some(state) = state else {
            unlocated_total += amount;
            continue;
        };
        codes.push(record.code.as_str());
        states.push(state.abbreviation());
        years.push(record.year);
        scopes.push(scope_label(record.sector.scope()));
        amounts.push(amount);
    }
    let records_used = codes.len();

    if unlocated_total > 0.0 {
        warn!(unlocated_total, "disbursements without a locatable municipality");
    }

    let df = DataFrame::new(vec![
        Column::new("code".into(), codes),
        Column::new("state".into(), states),
        Column::new("year".into(), years),
        Column::new("scope".into(), scopes),
        Column::new("amount".into(), amounts),
    ])?;

    let grouped = df
        .lazy()
        .group_by([col("code"), col("state"), col("year")])
        .agg([
            col("amount").sum().alias("total"),
            col("amount")
                .filter(col("scope").eq(lit(scope_label(SectorScope::Industry))))
                .sum()
                .alias("industry"),
            col("amount")
                .filter(col("scope").eq(lit(scope_label(SectorScope::Agriculture))))
                .sum()
                .alias("agriculture"),
        ])
        .with_columns([
            col("industry").fill_null(lit(0.0)),
            col("agriculture").fill_null(lit(0.0)),
        ])
        .sort(["code", "state", "year"], Default::default())
        .collect()?;

    let totals = totals_from_frame(&grouped)?;
    info!(
        records_used,
        municipality_years = totals.len(),
        "aggregated disbursements"
    );

    Ok(DisbursementAggregate {
        totals,
        unlocated_total,
        records_used,
        records_out_of_window,
    })
}

fn totals_from_frame(df: &DataFrame) -> Result<Vec<DisbursementTotals>> {
    let codes = string_values(df, "disbursement totals", "code")?;
    let states = string_values(df, "disbursement totals", "state")?;
    let years = i32_values(df, "disbursement totals", "year")?;
    let total = f64_values(df, "disbursement totals", "total")?;
    let industry = f64_values(df, "disbursement totals", "industry")?;
    let agriculture = f64_values(df, "disbursement totals", "agriculture")?;

    (0..df.height())
        .map(|i| {
            let code = codes[i].clone().unwrap_or_default();
            let state = states[i]
                .as_deref()
                .and_then(State::from_abbreviation)
                .ok_or_else(|| DataError::UnknownState {
                    source_name: "disbursement totals".to_string(),
                    row: i,
                    value: states[i].clone().unwrap_or_default(),
                })?;
            let year = years[i].ok_or_else(|| DataError::Parse(format!("row {i} has no year")))?;
            Ok(DisbursementTotals {
                code,
                state,
                year,
                total: total[i].unwrap_or(0.0),
                industry: industry[i].unwrap_or(0.0),
                agriculture: agriculture[i].unwrap_or(0.0),
            })
        })
        .collect()
}
