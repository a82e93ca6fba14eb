//! Variable Registry
//!
//! Names of every panel column and metadata describing how each is derived.
//! Downstream exporters and model specifications key off these names.

use serde::Serialize;

/// 6-digit municipality code
pub const CODE: &str = "code";
/// State abbreviation
pub const STATE: &str = "state";
/// Municipality name
pub const NAME: &str = "name";
/// Calendar year
pub const YEAR: &str = "year";

/// Resident population
pub const POPULATION: &str = "population";
/// Nominal GDP
pub const GDP_NOMINAL: &str = "gdp_nominal";
/// Nominal industrial value added
pub const VA_INDUSTRY_NOMINAL: &str = "va_industry_nominal";
/// Nominal agricultural value added
pub const VA_AGRICULTURE_NOMINAL: &str = "va_agriculture_nominal";
/// Nominal disbursements, all sectors
pub const DISBURSEMENT_NOMINAL: &str = "disbursement_nominal";
/// Nominal disbursements to industry
pub const DISBURSEMENT_INDUSTRY_NOMINAL: &str = "disbursement_industry_nominal";
/// Nominal disbursements to agriculture
pub const DISBURSEMENT_AGRICULTURE_NOMINAL: &str = "disbursement_agriculture_nominal";

/// Real GDP
pub const GDP_REAL: &str = "gdp_real";
/// Industrial value added, industrial deflator
pub const VA_INDUSTRY_REAL: &str = "va_industry_real";
/// Agricultural value added, agricultural deflator
pub const VA_AGRICULTURE_REAL: &str = "va_agriculture_real";
/// Industrial value added, headline deflator
pub const VA_INDUSTRY_REAL_GDP: &str = "va_industry_real_gdp";
/// Agricultural value added, headline deflator
pub const VA_AGRICULTURE_REAL_GDP: &str = "va_agriculture_real_gdp";
/// Real disbursements
pub const DISBURSEMENT_REAL: &str = "disbursement_real";
/// Real industrial disbursements, headline deflator
pub const DISBURSEMENT_INDUSTRY_REAL: &str = "disbursement_industry_real";
/// Real agricultural disbursements, headline deflator
pub const DISBURSEMENT_AGRICULTURE_REAL: &str = "disbursement_agriculture_real";
/// Real industrial disbursements, industrial deflator
pub const DISBURSEMENT_INDUSTRY_REAL_VA: &str = "disbursement_industry_real_va";
/// Real agricultural disbursements, agricultural deflator
pub const DISBURSEMENT_AGRICULTURE_REAL_VA: &str = "disbursement_agriculture_real_va";

/// ln(real GDP)
pub const LOG_GDP_REAL: &str = "log_gdp_real";
/// Real GDP per capita
pub const GDP_PC_REAL: &str = "gdp_pc_real";
/// ln(real GDP per capita)
pub const LOG_GDP_PC_REAL: &str = "log_gdp_pc_real";
/// ln(population)
pub const LOG_POPULATION: &str = "log_population";
/// asinh(industrial value added)
pub const ASINH_VA_INDUSTRY_REAL: &str = "asinh_va_industry_real";
/// asinh(agricultural value added)
pub const ASINH_VA_AGRICULTURE_REAL: &str = "asinh_va_agriculture_real";
/// asinh(industrial value added, headline deflator)
pub const ASINH_VA_INDUSTRY_REAL_GDP: &str = "asinh_va_industry_real_gdp";
/// asinh(agricultural value added, headline deflator)
pub const ASINH_VA_AGRICULTURE_REAL_GDP: &str = "asinh_va_agriculture_real_gdp";

/// Growth of ln(real GDP)
pub const DELTA_LOG_GDP_REAL: &str = "delta_log_gdp_real";
/// Growth of ln(real GDP per capita)
pub const DELTA_LOG_GDP_PC_REAL: &str = "delta_log_gdp_pc_real";
/// Change of asinh(industrial value added)
pub const DELTA_ASINH_VA_INDUSTRY_REAL: &str = "delta_asinh_va_industry_real";
/// Change of asinh(agricultural value added)
pub const DELTA_ASINH_VA_AGRICULTURE_REAL: &str = "delta_asinh_va_agriculture_real";
/// Change of asinh(industrial value added, headline deflator)
pub const DELTA_ASINH_VA_INDUSTRY_REAL_GDP: &str = "delta_asinh_va_industry_real_gdp";
/// Change of asinh(agricultural value added, headline deflator)
pub const DELTA_ASINH_VA_AGRICULTURE_REAL_GDP: &str = "delta_asinh_va_agriculture_real_gdp";

/// Disbursements over prior-year real GDP
pub const SHARE_DISBURSEMENT: &str = "share_disbursement";
/// Industrial disbursements over prior-year real GDP
pub const SHARE_DISBURSEMENT_INDUSTRY: &str = "share_disbursement_industry";
/// Agricultural disbursements over prior-year real GDP
pub const SHARE_DISBURSEMENT_AGRICULTURE: &str = "share_disbursement_agriculture";
/// Per-capita disbursements over prior-year real GDP
pub const SHARE_DISBURSEMENT_PC: &str = "share_disbursement_pc";
/// Industrial value added over real GDP
pub const SHARE_INDUSTRY: &str = "share_industry";
/// Agricultural value added over real GDP
pub const SHARE_AGRICULTURE: &str = "share_agriculture";

/// Prior-year real GDP with t-2 fallback; working column, not exported
pub(crate) const GDP_REAL_PRIOR: &str = "gdp_real_prior";

/// The four disbursement shares.
pub const SHARES: [&str; 4] = [
    SHARE_DISBURSEMENT,
    SHARE_DISBURSEMENT_INDUSTRY,
    SHARE_DISBURSEMENT_AGRICULTURE,
    SHARE_DISBURSEMENT_PC,
];

/// Outcomes whose lags are carried in the panel.
pub const LAGGED_OUTCOMES: [&str; 3] = [
    DELTA_LOG_GDP_REAL,
    DELTA_ASINH_VA_INDUSTRY_REAL,
    DELTA_ASINH_VA_AGRICULTURE_REAL,
];

/// Controls carried with a single lag.
pub const LAGGED_CONTROLS: [&str; 4] = [LOG_POPULATION, LOG_GDP_PC_REAL, SHARE_INDUSTRY, SHARE_AGRICULTURE];

/// Shares carried with leads in the lead variant, with the real
/// disbursement each lead reads forward.
pub const LEADED_SHARES: [(&str, &str); 3] = [
    (SHARE_DISBURSEMENT, DISBURSEMENT_REAL),
    (SHARE_DISBURSEMENT_INDUSTRY, DISBURSEMENT_INDUSTRY_REAL),
    (SHARE_DISBURSEMENT_AGRICULTURE, DISBURSEMENT_AGRICULTURE_REAL),
];

pub use crate::arena::{lag_name, lead_name};

/// Variable categories
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum VariableCategory {
    /// Source levels in current prices
    Level,
    /// Deflated levels
    Real,
    /// Log, asinh and per-capita transforms
    Transform,
    /// First differences
    Growth,
    /// Ratios
    Share,
}

/// Variable metadata
#[derive(Debug, Clone, Serialize)]
pub struct VariableInfo {
    /// Column name (unique identifier)
    pub name: &'static str,
    /// Variable category
    pub category: VariableCategory,
    /// Brief description of the variable
    pub description: &'static str,
    /// Columns it is computed from
    pub inputs: &'static [&'static str],
}

const fn info(
    name: &'static str,
    category: VariableCategory,
    description: &'static str,
    inputs: &'static [&'static str],
) -> VariableInfo {
    VariableInfo {
        name,
        category,
        description,
        inputs,
    }
}

/// Get all derived variables except lags and leads, in derivation order
pub fn available_variables() -> Vec<VariableInfo> {
    use VariableCategory::*;
    vec![
        info(POPULATION, Level, "Resident population, strictly positive", &[]),
        info(GDP_NOMINAL, Level, "GDP in current prices, strictly positive", &[]),
        info(VA_INDUSTRY_NOMINAL, Level, "Industrial value added in current prices", &[]),
        info(VA_AGRICULTURE_NOMINAL, Level, "Agricultural value added in current prices", &[]),
        info(DISBURSEMENT_NOMINAL, Level, "Disbursements in thousands of current reais, zero when absent", &[]),
        info(DISBURSEMENT_INDUSTRY_NOMINAL, Level, "Industrial disbursements, zero when absent", &[]),
        info(DISBURSEMENT_AGRICULTURE_NOMINAL, Level, "Agricultural disbursements, zero when absent", &[]),
        info(GDP_REAL, Real, "GDP at reference-year prices", &[GDP_NOMINAL]),
        info(VA_INDUSTRY_REAL, Real, "Industrial value added, industrial deflator", &[VA_INDUSTRY_NOMINAL]),
        info(VA_AGRICULTURE_REAL, Real, "Agricultural value added, agricultural deflator", &[VA_AGRICULTURE_NOMINAL]),
        info(VA_INDUSTRY_REAL_GDP, Real, "Industrial value added, headline deflator", &[VA_INDUSTRY_NOMINAL]),
        info(VA_AGRICULTURE_REAL_GDP, Real, "Agricultural value added, headline deflator", &[VA_AGRICULTURE_NOMINAL]),
        info(DISBURSEMENT_REAL, Real, "Disbursements, headline deflator", &[DISBURSEMENT_NOMINAL]),
        info(DISBURSEMENT_INDUSTRY_REAL, Real, "Industrial disbursements, headline deflator", &[DISBURSEMENT_INDUSTRY_NOMINAL]),
        info(DISBURSEMENT_AGRICULTURE_REAL, Real, "Agricultural disbursements, headline deflator", &[DISBURSEMENT_AGRICULTURE_NOMINAL]),
        info(DISBURSEMENT_INDUSTRY_REAL_VA, Real, "Industrial disbursements, industrial deflator", &[DISBURSEMENT_INDUSTRY_NOMINAL]),
        info(DISBURSEMENT_AGRICULTURE_REAL_VA, Real, "Agricultural disbursements, agricultural deflator", &[DISBURSEMENT_AGRICULTURE_NOMINAL]),
        info(LOG_GDP_REAL, Transform, "Natural log of real GDP", &[GDP_REAL]),
        info(GDP_PC_REAL, Transform, "Real GDP per resident", &[GDP_REAL, POPULATION]),
        info(LOG_GDP_PC_REAL, Transform, "Natural log of real GDP per resident", &[GDP_PC_REAL]),
        info(LOG_POPULATION, Transform, "Natural log of population", &[POPULATION]),
        info(ASINH_VA_INDUSTRY_REAL, Transform, "Inverse hyperbolic sine of industrial value added", &[VA_INDUSTRY_REAL]),
        info(ASINH_VA_AGRICULTURE_REAL, Transform, "Inverse hyperbolic sine of agricultural value added", &[VA_AGRICULTURE_REAL]),
        info(ASINH_VA_INDUSTRY_REAL_GDP, Transform, "Inverse hyperbolic sine of industrial value added, headline deflator", &[VA_INDUSTRY_REAL_GDP]),
        info(ASINH_VA_AGRICULTURE_REAL_GDP, Transform, "Inverse hyperbolic sine of agricultural value added, headline deflator", &[VA_AGRICULTURE_REAL_GDP]),
        info(DELTA_LOG_GDP_REAL, Growth, "Real GDP growth in log points", &[LOG_GDP_REAL]),
        info(DELTA_LOG_GDP_PC_REAL, Growth, "Real GDP per capita growth in log points", &[LOG_GDP_PC_REAL]),
        info(DELTA_ASINH_VA_INDUSTRY_REAL, Growth, "Change of asinh industrial value added", &[ASINH_VA_INDUSTRY_REAL]),
        info(DELTA_ASINH_VA_AGRICULTURE_REAL, Growth, "Change of asinh agricultural value added", &[ASINH_VA_AGRICULTURE_REAL]),
        info(DELTA_ASINH_VA_INDUSTRY_REAL_GDP, Growth, "Change of asinh industrial value added, headline deflator", &[ASINH_VA_INDUSTRY_REAL_GDP]),
        info(DELTA_ASINH_VA_AGRICULTURE_REAL_GDP, Growth, "Change of asinh agricultural value added, headline deflator", &[ASINH_VA_AGRICULTURE_REAL_GDP]),
        info(SHARE_DISBURSEMENT, Share, "Real disbursements over prior-year real GDP", &[DISBURSEMENT_REAL, GDP_REAL]),
        info(SHARE_DISBURSEMENT_INDUSTRY, Share, "Real industrial disbursements over prior-year real GDP", &[DISBURSEMENT_INDUSTRY_REAL, GDP_REAL]),
        info(SHARE_DISBURSEMENT_AGRICULTURE, Share, "Real agricultural disbursements over prior-year real GDP", &[DISBURSEMENT_AGRICULTURE_REAL, GDP_REAL]),
        info(SHARE_DISBURSEMENT_PC, Share, "Real disbursements per resident over prior-year real GDP", &[DISBURSEMENT_REAL, POPULATION, GDP_REAL]),
        info(SHARE_INDUSTRY, Share, "Industrial value added over real GDP", &[VA_INDUSTRY_REAL, GDP_REAL]),
        info(SHARE_AGRICULTURE, Share, "Agricultural value added over real GDP", &[VA_AGRICULTURE_REAL, GDP_REAL]),
    ]
}

/// Get variables by category
pub fn variables_by_category(category: VariableCategory) -> Vec<VariableInfo> {
    available_variables()
        .into_iter()
        .filter(|v| v.category == category)
        .collect()
}

/// Get variable info by name
pub fn get_variable_info(name: &str) -> Option<VariableInfo> {
    available_variables().into_iter().find(|v| v.name == name)
}
