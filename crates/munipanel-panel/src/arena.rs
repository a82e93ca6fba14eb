//! Entity arena: one year-sorted column store per municipality.
//!
//! Temporal features read only from the entity's own vectors, addressed by
//! calendar year:
//! ```text
//! lag_k(x)[e, t]  = x[e, t - k]   if entity e has a row for t - k, else missing
//! lead_k(x)[e, t] = x[e, t + k]   if entity e has a row for t + k, else missing
//! ```
//! With no gaps this is the previous (next) row of the entity; across a gap
//! or before the entity's first year the value is missing, never borrowed
//! from another entity. A forward ratio reads its divisor at its own offset:
//! ```text
//! lead_k(x / d)[e, t] = x[e, t + k] / d[e, t + k - 1]
//! ```

use crate::transforms::ratio;
use crate::{PanelError, Result};
use derive_more::Display;
use munipanel_data::State;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, warn};

/// Immutable municipality key.
#[derive(
    Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Display,
)]
#[display("{code}-{state}")]
pub struct EntityKey {
    /// 6-digit IBGE code
    pub code: String,
    /// State
    pub state: State,
}

impl EntityKey {
    /// Create a key.
    pub fn new(code: impl Into<String>, state: State) -> Self {
        Self {
            code: code.into(),
            state,
        }
    }
}

/// A column derived from another one by a fixed calendar offset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemporalColumn {
    /// Derived column name
    pub name: String,
    /// Source column name
    pub base: String,
    /// Offset in years (negative = lag, positive = lead)
    pub offset: i32,
    /// Divisor of a forward ratio; `None` for a plain shift
    pub divisor: Option<Divisor>,
}

/// Denominator of a forward ratio, read at its own calendar offset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Divisor {
    /// Column name
    pub column: String,
    /// Offset in years
    pub offset: i32,
}

impl TemporalColumn {
    /// Whether the column looks forward in time.
    pub const fn is_lead(&self) -> bool {
        self.offset > 0
    }

    /// Value the column must hold for `series` in `year`.
    pub fn expected(&self, series: &EntitySeries, year: i32) -> Option<f64> {
        let value = series.value(&self.base, year.checked_add(self.offset)?)?;
        match &self.divisor {
            None => Some(value),
            Some(d) => forward_ratio(value, series.value(&d.column, year.checked_add(d.offset)?)?),
        }
    }
}

fn forward_ratio(numerator: f64, divisor: f64) -> Option<f64> {
    ratio(numerator, divisor).filter(|v| v.is_finite())
}

fn offset_of(column: &str, k: u32) -> Result<i32> {
    i32::try_from(k).map_err(|_| PanelError::OffsetOutOfRange {
        column: column.to_string(),
        k,
    })
}

/// Record of a value turned into missing at the point of computation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversionEntry {
    /// Entity
    pub entity: EntityKey,
    /// Year
    pub year: i32,
    /// Column being computed
    pub column: String,
}

/// Audit of missing-value conversions.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversionAudit {
    entries: Vec<ConversionEntry>,
}

impl ConversionAudit {
    /// Record one conversion.
    pub fn record(&mut self, entity: &EntityKey, year: i32, column: &str) {
        debug!(entity = %entity, year, column, "value converted to missing");
        self.entries.push(ConversionEntry {
            entity: entity.clone(),
            year,
            column: column.to_string(),
        });
    }

    /// All recorded conversions.
    pub fn entries(&self) -> &[ConversionEntry] {
        &self.entries
    }

    /// Number of conversions per column.
    pub fn counts(&self) -> BTreeMap<&str, usize> {
        let mut counts = BTreeMap::new();
        for entry in &self.entries {
            *counts.entry(entry.column.as_str()).or_insert(0) += 1;
        }
        counts
    }

    /// Total number of conversions.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing was converted.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Year-indexed columns of one entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntitySeries {
    key: EntityKey,
    name: String,
    years: Vec<i32>,
    columns: BTreeMap<String, Vec<Option<f64>>>,
}

impl EntitySeries {
    /// Create an entity with the given years, which must be strictly increasing.
    pub fn new(key: EntityKey, name: impl Into<String>, years: Vec<i32>) -> Result<Self> {
        if let Some(w) = years.windows(2).find(|w| w[0] >= w[1]) {
            return Err(if w[0] == w[1] {
                PanelError::DuplicateKey {
                    entity: key.to_string(),
                    year: w[0],
                    context: "entity series".to_string(),
                }
            } else {
                PanelError::UnsortedYears {
                    entity: key.to_string(),
                }
            });
        }
        Ok(Self {
            key,
            name: name.into(),
            years,
            columns: BTreeMap::new(),
        })
    }

    /// Entity key.
    pub const fn key(&self) -> &EntityKey {
        &self.key
    }

    /// Name as recorded by the backbone source.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Observed years, strictly increasing.
    pub fn years(&self) -> &[i32] {
        &self.years
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.years.len()
    }

    /// Whether the entity has no rows.
    pub fn is_empty(&self) -> bool {
        self.years.is_empty()
    }

    /// Values of a column.
    pub fn column(&self, name: &str) -> Option<&[Option<f64>]> {
        self.columns.get(name).map(Vec::as_slice)
    }

    fn require(&self, name: &str) -> Result<&[Option<f64>]> {
        self.column(name)
            .ok_or_else(|| PanelError::UnknownColumn(name.to_string()))
    }

    /// Value of a column in a given year.
    pub fn value(&self, name: &str, year: i32) -> Option<f64> {
        let pos = self.position(year)?;
        self.column(name)?[pos]
    }

    /// Row index of a year.
    pub fn position(&self, year: i32) -> Option<usize> {
        self.years.binary_search(&year).ok()
    }

    /// Insert or replace a column.
    pub fn set_column(&mut self, name: impl Into<String>, values: Vec<Option<f64>>) -> Result<()> {
        let name = name.into();
        if values.len() != self.years.len() {
            return Err(PanelError::LengthMismatch {
                entity: self.key.to_string(),
                column: name,
                expected: self.years.len(),
                actual: values.len(),
            });
        }
        self.columns.insert(name, values);
        Ok(())
    }

    /// Values of `name` shifted by a calendar offset.
    pub fn shifted(&self, name: &str, offset: i32) -> Result<Vec<Option<f64>>> {
        let values = self.require(name)?;
        Ok(self
            .years
            .iter()
            .map(|&year| {
                year.checked_add(offset)
                    .and_then(|target| self.position(target))
                    .and_then(|pos| values[pos])
            })
            .collect())
    }
}

/// The panel arena.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Panel {
    entities: BTreeMap<EntityKey, EntitySeries>,
    columns: Vec<String>,
    temporal: Vec<TemporalColumn>,
}

impl Panel {
    /// Create an empty panel.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an entity; its key must be new.
    pub fn insert(&mut self, series: EntitySeries) -> Result<()> {
        if let Some(existing) = self.entities.get(series.key()) {
            return Err(PanelError::DuplicateKey {
                entity: existing.key().to_string(),
                year: existing.years().first().copied().unwrap_or_default(),
                context: "panel insert".to_string(),
            });
        }
        self.entities.insert(series.key().clone(), series);
        Ok(())
    }

    /// Entities in key order.
    pub fn entities(&self) -> impl Iterator<Item = &EntitySeries> {
        self.entities.values()
    }

    /// Look up one entity.
    pub fn entity(&self, key: &EntityKey) -> Option<&EntitySeries> {
        self.entities.get(key)
    }

    /// Number of entities.
    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }

    /// Number of (entity, year) rows.
    pub fn row_count(&self) -> usize {
        self.entities.values().map(EntitySeries::len).sum()
    }

    /// Column names in creation order.
    pub fn column_names(&self) -> &[String] {
        &self.columns
    }

    /// Lag and lead columns with their base and offset.
    pub fn temporal_columns(&self) -> &[TemporalColumn] {
        &self.temporal
    }

    /// Whether a column exists.
    pub fn has_column(&self, name: &str) -> bool {
        self.columns.iter().any(|c| c == name)
    }

    pub(crate) fn register(&mut self, name: &str) {
        if !self.has_column(name) {
            self.columns.push(name.to_string());
        }
    }

    /// Set a column entity by entity from a closure over the series.
    pub fn derive<F>(&mut self, name: &str, f: F) -> Result<()>
    where
        F: Fn(&EntitySeries) -> Result<Vec<Option<f64>>>,
    {
        for series in self.entities.values_mut() {
            let values = f(series)?;
            series.set_column(name, values)?;
        }
        self.register(name);
        Ok(())
    }

    /// Row-wise computation from input columns.
    ///
    /// A row with any missing input yields missing. A row whose inputs are
    /// present but whose result is missing or non-finite is recorded in
    /// `audit`.
    pub fn compute<F>(
        &mut self,
        name: &str,
        inputs: &[&str],
        audit: &mut ConversionAudit,
        f: F,
    ) -> Result<()>
    where
        F: Fn(i32, &[f64]) -> Option<f64>,
    {
        let mut converted = 0usize;
        for series in self.entities.values_mut() {
            let columns: Vec<&[Option<f64>]> = inputs
                .iter()
                .map(|c| series.require(c))
                .collect::<Result<_>>()?;

            let mut args = vec![0.0; inputs.len()];
            let mut values = Vec::with_capacity(series.len());
            for (row, &year) in series.years().iter().enumerate() {
                let mut complete = true;
                for (arg, column) in args.iter_mut().zip(&columns) {
                    match column[row] {
                        Some(v) => *arg = v,
                        None => complete = false,
                    }
                }
                let value = if complete {
                    let value = f(year, &args).filter(|v| v.is_finite());
                    if value.is_none() {
                        audit.record(series.key(), year, name);
                        converted += 1;
                    }
                    value
                } else {
                    None
                };
                values.push(value);
            }
            series.set_column(name, values)?;
        }
        if converted > 0 {
            warn!(column = name, converted, "values converted to missing");
        }
        self.register(name);
        Ok(())
    }

    fn track(&mut self, column: TemporalColumn) -> String {
        self.temporal.retain(|t| t.name != column.name);
        let name = column.name.clone();
        self.temporal.push(column);
        name
    }

    fn shift(&mut self, base: &str, name: String, offset: i32) -> Result<String> {
        self.derive(&name, |series| series.shifted(base, offset))?;
        Ok(self.track(TemporalColumn {
            name,
            base: base.to_string(),
            offset,
            divisor: None,
        }))
    }

    /// Add `{base}_lag{k}`; returns the new column name.
    pub fn lag(&mut self, base: &str, k: u32) -> Result<String> {
        let name = lag_name(base, k);
        let offset = offset_of(&name, k)?;
        self.shift(base, name, -offset)
    }

    /// Add `{base}_lead{k}`; returns the new column name.
    pub fn lead(&mut self, base: &str, k: u32) -> Result<String> {
        let name = lead_name(base, k);
        let offset = offset_of(&name, k)?;
        self.shift(base, name, offset)
    }

    /// Add `{name}_lead{k}` = `numerator(t + k) / divisor(t + k - 1)`.
    ///
    /// Missing when either side is missing or the divisor is zero; there is
    /// no fallback to an earlier divisor.
    pub fn lead_ratio(&mut self, name: &str, numerator: &str, divisor: &str, k: u32) -> Result<String> {
        let column = lead_name(name, k);
        let offset = offset_of(&column, k)?;
        let divisor_offset = offset - 1;
        self.derive(&column, |series| {
            let top = series.shifted(numerator, offset)?;
            let bottom = series.shifted(divisor, divisor_offset)?;
            Ok(top
                .into_iter()
                .zip(bottom)
                .map(|(n, d)| forward_ratio(n?, d?))
                .collect())
        })?;
        Ok(self.track(TemporalColumn {
            name: column,
            base: numerator.to_string(),
            offset,
            divisor: Some(Divisor {
                column: divisor.to_string(),
                offset: divisor_offset,
            }),
        }))
    }

    /// Add `x(t) - x(t-1)` under a new name.
    pub fn delta(&mut self, base: &str, name: &str) -> Result<()> {
        self.derive(name, |series| {
            let current = series.require(base)?;
            let previous = series.shifted(base, -1)?;
            Ok(current
                .iter()
                .zip(previous)
                .map(|(x, prev)| Some(x.as_ref()? - prev?))
                .collect())
        })
    }

    /// Add `x(t-1)`, falling back to `x(t-2)` when `x(t-1)` is missing or zero.
    pub fn prior_with_fallback(&mut self, base: &str, name: &str) -> Result<()> {
        self.derive(name, |series| {
            let lag1 = series.shifted(base, -1)?;
            let lag2 = series.shifted(base, -2)?;
            Ok(lag1
                .into_iter()
                .zip(lag2)
                .map(|(l1, l2)| match l1 {
                    Some(v) if v != 0.0 => Some(v),
                    _ => l2,
                })
                .collect())
        })
    }

    /// Drop a column from every entity.
    pub fn remove_column(&mut self, name: &str) {
        for series in self.entities.values_mut() {
            series.columns.remove(name);
        }
        self.columns.retain(|c| c != name);
        self.temporal.retain(|t| t.name != name);
    }
}

/// Name of the `k`-th lag of `base`.
pub fn lag_name(base: &str, k: u32) -> String {
    format!("{base}_lag{k}")
}

/// Name of the `k`-th lead of `base`.
pub fn lead_name(base: &str, k: u32) -> String {
    format!("{base}_lead{k}")
}
