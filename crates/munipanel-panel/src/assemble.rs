//! Panel assembly: join resolved sources, deflate and derive features.
//!
//! The population source is the backbone and fixes the entity keys. GDP
//! rows are attached through the resolver's match key, disbursement totals
//! through the municipality code. A backbone row without a disbursement
//! record carries zero disbursement; a backbone row without GDP carries
//! missing GDP.

use crate::arena::{ConversionAudit, EntityKey, EntitySeries, Panel};
use crate::transforms::{ValuePolicy, asinh, ln, ratio};
use crate::variables::*;
use crate::{PanelError, Result};
use munipanel_data::{
    DeflatorSet, DisbursementAggregate, GdpRow, MatchKey, PopulationRow, PriceScope,
    ResolutionReport, ResolvedSource, Resolver,
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use tracing::{info, warn};

/// Panel assembly configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PanelConfig {
    /// First year kept (default: 2002)
    pub first_year: i32,

    /// Last year kept (default: 2023)
    pub last_year: i32,

    /// Number of lags of shares and outcomes (default: 3)
    pub max_lag: u32,

    /// Number of leads of shares (default: 2)
    pub max_lead: u32,

    /// Proceed when the sources do not resolve to the same entities
    /// (default: false)
    pub accept_partial_coverage: bool,

    /// Match keys allowed to be present in only one source (default: empty)
    pub accepted_unmatched: Vec<MatchKey>,
}

impl Default for PanelConfig {
    fn default() -> Self {
        Self {
            first_year: 2002,
            last_year: 2023,
            max_lag: 3,
            max_lead: 2,
            accept_partial_coverage: false,
            accepted_unmatched: Vec::new(),
        }
    }
}

/// Typed source tables handed to the assembler.
#[derive(Debug, Clone, Copy)]
pub struct PanelInputs<'a> {
    /// Long-form population rows
    pub population: &'a [PopulationRow],
    /// GDP and value-added rows
    pub gdp: &'a [GdpRow],
    /// Aggregated disbursements
    pub disbursements: &'a DisbursementAggregate,
}

/// Counts describing what the join kept and dropped.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AssemblyAudit {
    /// Entities in the panel
    pub entities: usize,
    /// (entity, year) rows in the panel
    pub rows: usize,
    /// Backbone rows dropped because population and GDP are both missing
    pub empty_rows_dropped: usize,
    /// GDP rows whose match key has no population entity
    pub gdp_rows_unmatched: usize,
    /// Disbursement totals attached to a backbone row
    pub disbursement_rows_matched: usize,
    /// Disbursement totals without a backbone row
    pub disbursement_rows_unmatched: usize,
    /// Amount of unattached disbursements, including unlocated ones
    pub disbursement_unmatched_total: f64,
    /// Amount of disbursements without a locatable municipality
    pub unlocated_total: f64,
    /// Entities observed in every year of the window
    pub complete_entities: usize,
    /// Entities missing at least one year
    pub incomplete_entities: usize,
    /// Deflator scopes that could not be built
    pub undefined_deflators: Vec<PriceScope>,
    /// Values turned into missing, by entity, year and column
    pub conversions: ConversionAudit,
}

/// Output of [`PanelAssembler::assemble`].
#[derive(Debug, Clone)]
pub struct Assembly {
    /// The assembled panel
    pub panel: Panel,
    /// Join statistics
    pub audit: AssemblyAudit,
    /// Population versus GDP entity comparison
    pub resolution: ResolutionReport,
}

#[derive(Debug, Clone, Copy, Default)]
struct BackboneRow {
    population: Option<f64>,
    gdp: Option<f64>,
    va_industry: Option<f64>,
    va_agriculture: Option<f64>,
    disbursement: [Option<f64>; 3],
    has_population: bool,
    has_gdp: bool,
}

impl BackboneRow {
    const fn zero_disbursement() -> Self {
        Self {
            population: None,
            gdp: None,
            va_industry: None,
            va_agriculture: None,
            disbursement: [Some(0.0); 3],
            has_population: false,
            has_gdp: false,
        }
    }
}

type Backbone = BTreeMap<EntityKey, BTreeMap<i32, BackboneRow>>;

/// Builds the municipality-year panel.
#[derive(Debug)]
pub struct PanelAssembler {
    config: PanelConfig,
    resolver: Resolver,
}

impl PanelAssembler {
    /// Create an assembler.
    pub const fn new(config: PanelConfig, resolver: Resolver) -> Self {
        Self { config, resolver }
    }

    /// Assembler configuration.
    pub const fn config(&self) -> &PanelConfig {
        &self.config
    }

    /// Join, deflate and derive every column of the panel.
    pub fn assemble(&self, inputs: &PanelInputs<'_>, deflators: &DeflatorSet) -> Result<Assembly> {
        let mut audit = AssemblyAudit {
            unlocated_total: inputs.disbursements.unlocated_total,
            disbursement_unmatched_total: inputs.disbursements.unlocated_total,
            ..Default::default()
        };

        let mut names: BTreeMap<EntityKey, String> = BTreeMap::new();
        for row in inputs.population {
            names
                .entry(EntityKey::new(&row.code, row.state))
                .or_insert_with(|| row.name.clone());
        }
        let (by_match_key, gdp_source, resolution) = self.resolve(&names, inputs.gdp)?;

        let mut backbone = self.backbone(inputs, &names, &by_match_key, &gdp_source, &mut audit)?;
        self.attach_disbursements(inputs.disbursements, &mut backbone, &mut audit);

        let mut panel = Panel::new();
        for (entity, rows) in backbone {
            if rows.is_empty() {
                continue;
            }
            let name = names.get(&entity).cloned().unwrap_or_default();
            let years = rows.keys().copied().collect();
            let mut series = EntitySeries::new(entity, name, years)?;
            let levels: [(&str, fn(&BackboneRow) -> Option<f64>); 7] = [
                (POPULATION, |r| r.population),
                (GDP_NOMINAL, |r| r.gdp),
                (VA_INDUSTRY_NOMINAL, |r| r.va_industry),
                (VA_AGRICULTURE_NOMINAL, |r| r.va_agriculture),
                (DISBURSEMENT_NOMINAL, |r| r.disbursement[0]),
                (DISBURSEMENT_INDUSTRY_NOMINAL, |r| r.disbursement[1]),
                (DISBURSEMENT_AGRICULTURE_NOMINAL, |r| r.disbursement[2]),
            ];
            for (column, get) in levels {
                series.set_column(column, rows.values().map(get).collect())?;
            }
            panel.insert(series)?;
        }
        for column in [
            POPULATION,
            GDP_NOMINAL,
            VA_INDUSTRY_NOMINAL,
            VA_AGRICULTURE_NOMINAL,
            DISBURSEMENT_NOMINAL,
            DISBURSEMENT_INDUSTRY_NOMINAL,
            DISBURSEMENT_AGRICULTURE_NOMINAL,
        ] {
            panel.register(column);
        }

        audit.undefined_deflators = PriceScope::all()
            .into_iter()
            .filter(|scope| deflators.get(*scope).is_none())
            .collect();
        self.derive(&mut panel, deflators, &mut audit.conversions)?;
        panel.verify()?;

        let span = usize::try_from(self.config.last_year - self.config.first_year + 1).unwrap_or(0);
        audit.entities = panel.entity_count();
        audit.rows = panel.row_count();
        audit.complete_entities = panel.entities().filter(|s| s.len() == span).count();
        audit.incomplete_entities = audit.entities - audit.complete_entities;

        info!(
            entities = audit.entities,
            rows = audit.rows,
            complete = audit.complete_entities,
            conversions = audit.conversions.len(),
            "assembled panel"
        );

        Ok(Assembly {
            panel,
            audit,
            resolution,
        })
    }

    fn resolve(
        &self,
        names: &BTreeMap<EntityKey, String>,
        gdp: &[GdpRow],
    ) -> Result<(BTreeMap<MatchKey, EntityKey>, ResolvedSource, ResolutionReport)> {
        let population = self.resolver.resolve_source(
            "population",
            names.iter().map(|(entity, name)| (name.as_str(), entity.state)),
        )?;

        let mut by_match_key: BTreeMap<MatchKey, EntityKey> = BTreeMap::new();
        for (entity, key) in names.keys().zip(population.row_keys()) {
            if let Some(first) = by_match_key.insert(key.clone(), entity.clone()) {
                return Err(PanelError::ConflictingEntity {
                    key: key.to_string(),
                    first: first.to_string(),
                    second: entity.to_string(),
                });
            }
        }

        let gdp = self
            .resolver
            .resolve_source("gdp", gdp.iter().map(|row| (row.name.as_str(), row.state)))?;
        let resolution = population.compare(&gdp);

        if self.config.accept_partial_coverage {
            if !resolution.is_complete() {
                warn!(
                    only_population = resolution.only_left.len(),
                    only_gdp = resolution.only_right.len(),
                    "accepting partial entity coverage"
                );
            }
        } else {
            let accepted: BTreeSet<MatchKey> = self.config.accepted_unmatched.iter().cloned().collect();
            resolution.ensure_complete(&accepted)?;
        }

        Ok((by_match_key, gdp, resolution))
    }

    fn backbone(
        &self,
        inputs: &PanelInputs<'_>,
        names: &BTreeMap<EntityKey, String>,
        by_match_key: &BTreeMap<MatchKey, EntityKey>,
        gdp_source: &ResolvedSource,
        audit: &mut AssemblyAudit,
    ) -> Result<Backbone> {
        let window = self.config.first_year..=self.config.last_year;
        let conversions = &mut audit.conversions;
        let mut admit = |policy: ValuePolicy, value: Option<f64>, entity: &EntityKey, year: i32, column: &str| {
            let raw = value?;
            let admitted = policy.admit(raw);
            if admitted.is_none() {
                conversions.record(entity, year, column);
            }
            admitted
        };

        let mut backbone: Backbone = names.keys().map(|k| (k.clone(), BTreeMap::new())).collect();

        for row in inputs.population {
            if !window.contains(&row.year) {
                continue;
            }
            let entity = EntityKey::new(&row.code, row.state);
            let slot = backbone
                .entry(entity.clone())
                .or_default()
                .entry(row.year)
                .or_insert_with(BackboneRow::zero_disbursement);
            if slot.has_population {
                return Err(PanelError::DuplicateKey {
                    entity: entity.to_string(),
                    year: row.year,
                    context: "population source".to_string(),
                });
            }
            slot.has_population = true;
            slot.population = admit(ValuePolicy::StrictlyPositive, row.population, &entity, row.year, POPULATION);
        }

        for (row, key) in inputs.gdp.iter().zip(gdp_source.row_keys()) {
            if !window.contains(&row.year) {
                continue;
            }
            let Some(entity) = by_match_key.get(key) else {
                audit.gdp_rows_unmatched += 1;
                continue;
            };
            let slot = backbone
                .entry(entity.clone())
                .or_default()
                .entry(row.year)
                .or_insert_with(BackboneRow::zero_disbursement);
            if slot.has_gdp {
                return Err(PanelError::DuplicateKey {
                    entity: entity.to_string(),
                    year: row.year,
                    context: "gdp source".to_string(),
                });
            }
            slot.has_gdp = true;
            slot.gdp = admit(ValuePolicy::StrictlyPositive, row.gdp, entity, row.year, GDP_NOMINAL);
            slot.va_industry = admit(ValuePolicy::AnyFinite, row.va_industry, entity, row.year, VA_INDUSTRY_NOMINAL);
            slot.va_agriculture =
                admit(ValuePolicy::AnyFinite, row.va_agriculture, entity, row.year, VA_AGRICULTURE_NOMINAL);
        }

        for rows in backbone.values_mut() {
            let before = rows.len();
            rows.retain(|_, row| row.population.is_some() || row.gdp.is_some());
            audit.empty_rows_dropped += before - rows.len();
        }
        if audit.gdp_rows_unmatched > 0 {
            warn!(rows = audit.gdp_rows_unmatched, "gdp rows without a population entity");
        }
        Ok(backbone)
    }

    fn attach_disbursements(
        &self,
        disbursements: &DisbursementAggregate,
        backbone: &mut Backbone,
        audit: &mut AssemblyAudit,
    ) {
        for totals in &disbursements.totals {
            let entity = EntityKey::new(&totals.code, totals.state);
            let slot = backbone
                .get_mut(&entity)
                .and_then(|rows| rows.get_mut(&totals.year));
            let Some(slot) = slot else {
                audit.disbursement_rows_unmatched += 1;
                audit.disbursement_unmatched_total += totals.total;
                continue;
            };
            audit.disbursement_rows_matched += 1;
            let amounts = [totals.total, totals.industry, totals.agriculture];
            let columns = [
                DISBURSEMENT_NOMINAL,
                DISBURSEMENT_INDUSTRY_NOMINAL,
                DISBURSEMENT_AGRICULTURE_NOMINAL,
            ];
            for ((value, amount), column) in slot.disbursement.iter_mut().zip(amounts).zip(columns) {
                *value = ValuePolicy::NonNegative.admit(amount);
                if value.is_none() {
                    audit.conversions.record(&entity, totals.year, column);
                }
            }
        }
        if audit.disbursement_rows_unmatched > 0 {
            warn!(
                rows = audit.disbursement_rows_unmatched,
                total = audit.disbursement_unmatched_total,
                "disbursements without a panel row"
            );
        }
    }

    fn derive(&self, panel: &mut Panel, deflators: &DeflatorSet, audit: &mut ConversionAudit) -> Result<()> {
        use PriceScope::{Agriculture, Headline, Industry};
        use ValuePolicy::{AnyFinite, NonNegative, StrictlyPositive};

        let reals = [
            (GDP_REAL, GDP_NOMINAL, Headline, StrictlyPositive),
            (VA_INDUSTRY_REAL, VA_INDUSTRY_NOMINAL, Industry, AnyFinite),
            (VA_AGRICULTURE_REAL, VA_AGRICULTURE_NOMINAL, Agriculture, AnyFinite),
            (VA_INDUSTRY_REAL_GDP, VA_INDUSTRY_NOMINAL, Headline, AnyFinite),
            (VA_AGRICULTURE_REAL_GDP, VA_AGRICULTURE_NOMINAL, Headline, AnyFinite),
            (DISBURSEMENT_REAL, DISBURSEMENT_NOMINAL, Headline, NonNegative),
            (DISBURSEMENT_INDUSTRY_REAL, DISBURSEMENT_INDUSTRY_NOMINAL, Headline, NonNegative),
            (DISBURSEMENT_AGRICULTURE_REAL, DISBURSEMENT_AGRICULTURE_NOMINAL, Headline, NonNegative),
            (DISBURSEMENT_INDUSTRY_REAL_VA, DISBURSEMENT_INDUSTRY_NOMINAL, Industry, NonNegative),
            (DISBURSEMENT_AGRICULTURE_REAL_VA, DISBURSEMENT_AGRICULTURE_NOMINAL, Agriculture, NonNegative),
        ];
        for (target, source, scope, policy) in reals {
            deflate(panel, audit, deflators, scope, source, target, policy)?;
        }

        panel.compute(LOG_GDP_REAL, &[GDP_REAL], audit, |_, v| ln(v[0]))?;
        panel.compute(GDP_PC_REAL, &[GDP_REAL, POPULATION], audit, |_, v| ratio(v[0], v[1]))?;
        panel.compute(LOG_GDP_PC_REAL, &[GDP_PC_REAL], audit, |_, v| ln(v[0]))?;
        panel.compute(LOG_POPULATION, &[POPULATION], audit, |_, v| ln(v[0]))?;
        for (target, source) in [
            (ASINH_VA_INDUSTRY_REAL, VA_INDUSTRY_REAL),
            (ASINH_VA_AGRICULTURE_REAL, VA_AGRICULTURE_REAL),
            (ASINH_VA_INDUSTRY_REAL_GDP, VA_INDUSTRY_REAL_GDP),
            (ASINH_VA_AGRICULTURE_REAL_GDP, VA_AGRICULTURE_REAL_GDP),
        ] {
            panel.compute(target, &[source], audit, |_, v| asinh(v[0]))?;
        }

        for (target, source) in [
            (DELTA_LOG_GDP_REAL, LOG_GDP_REAL),
            (DELTA_LOG_GDP_PC_REAL, LOG_GDP_PC_REAL),
            (DELTA_ASINH_VA_INDUSTRY_REAL, ASINH_VA_INDUSTRY_REAL),
            (DELTA_ASINH_VA_AGRICULTURE_REAL, ASINH_VA_AGRICULTURE_REAL),
            (DELTA_ASINH_VA_INDUSTRY_REAL_GDP, ASINH_VA_INDUSTRY_REAL_GDP),
            (DELTA_ASINH_VA_AGRICULTURE_REAL_GDP, ASINH_VA_AGRICULTURE_REAL_GDP),
        ] {
            panel.delta(source, target)?;
        }

        // Real GDP is floored to missing above, so the prior never sees a
        // non-positive value: the t-2 fallback fires on missing t-1 only.
        panel.prior_with_fallback(GDP_REAL, GDP_REAL_PRIOR)?;
        for (target, source) in [
            (SHARE_DISBURSEMENT, DISBURSEMENT_REAL),
            (SHARE_DISBURSEMENT_INDUSTRY, DISBURSEMENT_INDUSTRY_REAL),
            (SHARE_DISBURSEMENT_AGRICULTURE, DISBURSEMENT_AGRICULTURE_REAL),
        ] {
            panel.compute(target, &[source, GDP_REAL_PRIOR], audit, |_, v| ratio(v[0], v[1]))?;
        }
        panel.compute(
            SHARE_DISBURSEMENT_PC,
            &[DISBURSEMENT_REAL, POPULATION, GDP_REAL_PRIOR],
            audit,
            |_, v| ratio(v[0] / v[1], v[2]),
        )?;
        panel.compute(SHARE_INDUSTRY, &[VA_INDUSTRY_REAL, GDP_REAL], audit, |_, v| ratio(v[0], v[1]))?;
        panel.compute(SHARE_AGRICULTURE, &[VA_AGRICULTURE_REAL, GDP_REAL], audit, |_, v| {
            ratio(v[0], v[1])
        })?;
        panel.remove_column(GDP_REAL_PRIOR);

        for base in SHARES.into_iter().chain(LAGGED_OUTCOMES) {
            for k in 1..=self.config.max_lag {
                panel.lag(base, k)?;
            }
        }
        if self.config.max_lag > 0 {
            for base in LAGGED_CONTROLS {
                panel.lag(base, 1)?;
            }
        }
        for (share, disbursement) in LEADED_SHARES {
            for k in 1..=self.config.max_lead {
                panel.lead_ratio(share, disbursement, GDP_REAL, k)?;
            }
        }
        Ok(())
    }
}

fn deflate(
    panel: &mut Panel,
    audit: &mut ConversionAudit,
    deflators: &DeflatorSet,
    scope: PriceScope,
    source: &str,
    target: &str,
    policy: ValuePolicy,
) -> Result<()> {
    match deflators.get(scope) {
        Some(index) => panel.compute(target, &[source], audit, |year, v| {
            policy.admit(index.deflate(year, v[0])?)
        }),
        None => {
            warn!(scope = %scope, column = target, "deflator undefined, real series left missing");
            panel.derive(target, |series| Ok(vec![None; series.len()]))
        }
    }
}
