//! Typed source tables and their columnar representation.
//!
//! Parsing raw files is left to the caller; the functions here accept
//! polars [`DataFrame`]s with named columns and turn them into typed rows.
//!
//! | Source        | Shape | Columns                                                        |
//! |---------------|-------|----------------------------------------------------------------|
//! | population    | wide  | `code`, `name`, one column per year                            |
//! | GDP           | long  | `municipality` (`NAME (ST)`), `year`, `gdp`, `va_industry`, `va_agriculture` |
//! | disbursements | long  | `code`, `municipality`, `state`, `year`, `month`, `sector`, `subsector`, `amount` |
//! | prices        | long  | `year`, `nominal`, `constant`                                  |

use crate::deflator::PricePoint;
use crate::geo::State;
use crate::resolve::Resolver;
use crate::sector::Sector;
use crate::{DataError, Result};
use polars::prelude::*;
use serde::{Deserialize, Serialize};

/// Municipality code used for disbursements that cannot be located.
pub const UNLOCATED_CODE: &str = "999999";

/// Truncate a municipality code to its 6-digit IBGE prefix.
///
/// Seven-digit codes carry a trailing check digit.
pub fn municipality_code6(code: &str) -> Option<String> {
    let digits: String = code.chars().filter(char::is_ascii_digit).collect();
    (digits.len() >= 6).then(|| digits[..6].to_string())
}

/// One (municipality, year) population observation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PopulationRow {
    /// 6-digit municipality code
    pub code: String,
    /// Name as recorded by the source
    pub name: String,
    /// State derived from the code prefix
    pub state: State,
    /// Calendar year
    pub year: i32,
    /// Resident population
    pub population: Option<f64>,
}

/// One (municipality, year) GDP observation in current prices.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GdpRow {
    /// Name as recorded by the source, usually with a state suffix
    pub name: String,
    /// State derived from the parenthetical suffix
    pub state: State,
    /// Calendar year
    pub year: i32,
    /// Gross domestic product, thousands of reais
    pub gdp: Option<f64>,
    /// Industrial gross value added, thousands of reais
    pub va_industry: Option<f64>,
    /// Agricultural gross value added, thousands of reais
    pub va_agriculture: Option<f64>,
}

/// One monthly disbursement record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DisbursementRecord {
    /// 6-digit municipality code
    pub code: String,
    /// Municipality name as recorded by the bank
    pub municipality: String,
    /// State derived from the state-name column
    pub state: Option<State>,
    /// Calendar year
    pub year: i32,
    /// Calendar month (1-12)
    pub month: u32,
    /// Reclassified sector
    pub sector: Sector,
    /// Disbursed amount in reais
    pub amount: f64,
}

fn column<'a>(df: &'a DataFrame, source: &str, name: &str) -> Result<&'a Column> {
    df.column(name).map_err(|_| DataError::MissingColumn {
        source_name: source.to_string(),
        column: name.to_string(),
    })
}

pub(crate) fn f64_values(df: &DataFrame, source: &str, name: &str) -> Result<Vec<Option<f64>>> {
    let cast = column(df, source, name)?.cast(&DataType::Float64)?;
    Ok(cast.as_materialized_series().f64()?.into_iter().collect())
}

pub(crate) fn i32_values(df: &DataFrame, source: &str, name: &str) -> Result<Vec<Option<i32>>> {
    let cast = column(df, source, name)?.cast(&DataType::Int32)?;
    Ok(cast.as_materialized_series().i32()?.into_iter().collect())
}

pub(crate) fn string_values(df: &DataFrame, source: &str, name: &str) -> Result<Vec<Option<String>>> {
    let cast = column(df, source, name)?.cast(&DataType::String)?;
    Ok(cast
        .as_materialized_series()
        .str()?
        .into_iter()
        .map(|v| v.map(str::to_string))
        .collect())
}

/// Reshape a wide table (one column per year) into long form.
///
/// Every column not in `id_columns` must be named by a year. The output has
/// the id columns (as strings), an `i32` `year` column and an `f64` column
/// called `value_name`.
pub fn wide_to_long(df: &DataFrame, id_columns: &[&str], value_name: &str) -> Result<DataFrame> {
    let ids: Vec<Vec<Option<String>>> = id_columns
        .iter()
        .map(|c| string_values(df, "wide table", c))
        .collect::<Result<_>>()?;

    let mut year_columns = Vec::new();
    for name in df.get_column_names() {
        if id_columns.contains(&name.as_str()) {
            continue;
        }
        let year: i32 = name
            .trim()
            .parse()
            .map_err(|_| DataError::Parse(format!("column {name} is not a year")))?;
        year_columns.push((year, f64_values(df, "wide table", name.as_str())?));
    }

    let height = df.height();
    let capacity = height * year_columns.len();
    let mut out_ids: Vec<Vec<Option<String>>> = vec![Vec::with_capacity(capacity); id_columns.len()];
    let mut out_years = Vec::with_capacity(capacity);
    let mut out_values = Vec::with_capacity(capacity);

    for row in 0..height {
        for (year, values) in &year_columns {
            for (out, id) in out_ids.iter_mut().zip(&ids) {
                out.push(id[row].clone());
            }
            out_years.push(*year);
            out_values.push(values[row]);
        }
    }

    let mut columns: Vec<Column> = id_columns
        .iter()
        .zip(out_ids)
        .map(|(name, values)| Column::new((*name).into(), values))
        .collect();
    columns.push(Column::new("year".into(), out_years));
    columns.push(Column::new(value_name.into(), out_values));
    Ok(DataFrame::new(columns)?)
}

/// Read the wide population table.
///
/// Rows without a parseable code are skipped; an unknown state prefix is
/// an error.
pub fn population_from_wide(df: &DataFrame) -> Result<Vec<PopulationRow>> {
    let long = wide_to_long(df, &["code", "name"], "population")?;
    let codes = string_values(&long, "population", "code")?;
    let names = string_values(&long, "population", "name")?;
    let years = i32_values(&long, "population", "year")?;
    let values = f64_values(&long, "population", "population")?;

    let mut rows = Vec::with_capacity(long.height());
    for (i, (((code, name), year), population)) in
        codes.into_iter().zip(names).zip(years).zip(values).enumerate()
    {
        let (Some(code), Some(name), Some(year)) = (code, name, year) else {
            continue;
        };
        let Some(code) = municipality_code6(&code) else {
            continue;
        };
        let state =
            State::from_municipality_code(&code).ok_or_else(|| DataError::UnknownState {
                source_name: "population".to_string(),
                row: i,
                value: code.clone(),
            })?;
        rows.push(PopulationRow {
            code,
            name: name.trim().to_string(),
            state,
            year,
            population,
        });
    }
    Ok(rows)
}

/// Read the long GDP table; the state comes from the name suffix.
pub fn gdp_from_frame(df: &DataFrame, resolver: &Resolver) -> Result<Vec<GdpRow>> {
    let names = string_values(df, "gdp", "municipality")?;
    let years = i32_values(df, "gdp", "year")?;
    let gdp = f64_values(df, "gdp", "gdp")?;
    let va_industry = f64_values(df, "gdp", "va_industry")?;
    let va_agriculture = f64_values(df, "gdp", "va_agriculture")?;

    let mut rows = Vec::with_capacity(df.height());
    for i in 0..df.height() {
        let (Some(name), Some(year)) = (&names[i], years[i]) else {
            continue;
        };
        let state = resolver
            .state_from_suffix(name)
            .ok_or_else(|| DataError::UnknownState {
                source_name: "gdp".to_string(),
                row: i,
                value: name.clone(),
            })?;
        rows.push(GdpRow {
            name: name.trim().to_string(),
            state,
            year,
            gdp: gdp[i],
            va_industry: va_industry[i],
            va_agriculture: va_agriculture[i],
        });
    }
    Ok(rows)
}

/// Read monthly disbursement records and reclassify their sectors.
///
/// Rows without code, year or amount are skipped. The state stays `None`
/// when the state-name column is blank or unknown.
pub fn disbursements_from_frame(df: &DataFrame) -> Result<Vec<DisbursementRecord>> {
    let codes = string_values(df, "disbursements", "code")?;
    let names = string_values(df, "disbursements", "municipality")?;
    let states = string_values(df, "disbursements", "state")?;
    let years = i32_values(df, "disbursements", "year")?;
    let months = i32_values(df, "disbursements", "month")?;
    let sectors = string_values(df, "disbursements", "sector")?;
    let subsectors = string_values(df, "disbursements", "subsector")?;
    let amounts = f64_values(df, "disbursements", "amount")?;

    let mut rows = Vec::with_capacity(df.height());
    for i in 0..df.height() {
        let (Some(code), Some(year), Some(amount)) = (&codes[i], years[i], amounts[i]) else {
            continue;
        };
        let Some(code) = municipality_code6(code) else {
            continue;
        };
        let sector = Sector::from_labels(
            sectors[i].as_deref().unwrap_or_default(),
            subsectors[i].as_deref().unwrap_or_default(),
        );
        rows.push(DisbursementRecord {
            code,
            municipality: names[i].clone().unwrap_or_default(),
            state: states[i].as_deref().and_then(State::from_name),
            year,
            month: months[i].and_then(|m| u32::try_from(m).ok()).unwrap_or(0),
            sector,
            amount,
        });
    }
    Ok(rows)
}

/// Read a `(year, nominal, constant)` price table.
pub fn prices_from_frame(df: &DataFrame) -> Result<Vec<PricePoint>> {
    let years = i32_values(df, "prices", "year")?;
    let nominal = f64_values(df, "prices", "nominal")?;
    let constant = f64_values(df, "prices", "constant")?;
    Ok(years
        .into_iter()
        .zip(nominal.into_iter().zip(constant))
        .filter_map(|(year, (nominal, constant))| {
            year.map(|year| PricePoint {
                year,
                nominal,
                constant,
            })
        })
        .collect())
}
