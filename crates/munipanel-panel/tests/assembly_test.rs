//! End-to-end assembly on small hand-built sources.

use approx::assert_relative_eq;
use munipanel_data::{
    ChainIndex, DataError, DeflatorConfig, DeflatorSet, DisbursementAggregate, DisbursementTotals,
    GdpRow, PopulationRow, PricePoint, Resolver, State,
};
use munipanel_panel::variables::*;
use munipanel_panel::{EntityKey, PanelAssembler, PanelConfig, PanelError, PanelInputs, PanelVariant};

fn config() -> PanelConfig {
    PanelConfig {
        first_year: 2010,
        last_year: 2012,
        ..Default::default()
    }
}

/// Headline index 100, 105, 110.25 anchored in 2010; the sector indices are flat.
fn deflators() -> DeflatorSet {
    let config = DeflatorConfig {
        reference_year: 2010,
        first_year: 2010,
        last_year: 2012,
    };
    let growing = [
        PricePoint::new(2010, 1.0, 1.0),
        PricePoint::new(2011, 1.05, 1.0),
        PricePoint::new(2012, 1.05, 1.0),
    ];
    let flat = [
        PricePoint::new(2010, 1.0, 1.0),
        PricePoint::new(2011, 1.0, 1.0),
        PricePoint::new(2012, 1.0, 1.0),
    ];
    DeflatorSet::from_indices(
        Some(ChainIndex::build("headline", &growing, &config).unwrap()),
        Some(ChainIndex::build("industry", &flat, &config).unwrap()),
        Some(ChainIndex::build("agriculture", &flat, &config).unwrap()),
    )
}

fn population(code: &str, name: &str, state: State, values: &[(i32, Option<f64>)]) -> Vec<PopulationRow> {
    values
        .iter()
        .map(|&(year, population)| PopulationRow {
            code: code.to_string(),
            name: name.to_string(),
            state,
            year,
            population,
        })
        .collect()
}

fn gdp(name: &str, state: State, values: &[(i32, Option<f64>)]) -> Vec<GdpRow> {
    values
        .iter()
        .map(|&(year, gdp)| GdpRow {
            name: name.to_string(),
            state,
            year,
            gdp,
            va_industry: gdp.map(|g| g * 0.3),
            va_agriculture: gdp.map(|g| g * 0.1),
        })
        .collect()
}

fn disbursements(rows: &[(&str, State, i32, f64)]) -> DisbursementAggregate {
    DisbursementAggregate {
        totals: rows
            .iter()
            .map(|&(code, state, year, total)| DisbursementTotals {
                code: code.to_string(),
                state,
                year,
                total,
                industry: total / 2.0,
                agriculture: total / 4.0,
            })
            .collect(),
        ..Default::default()
    }
}

fn assembler(config: PanelConfig) -> PanelAssembler {
    PanelAssembler::new(config, Resolver::with_defaults().unwrap())
}

fn alpha() -> EntityKey {
    EntityKey::new("100001", State::SP)
}

#[test]
fn test_alpha_scenario() {
    let pop = population(
        "100001",
        "ALPHA",
        State::SP,
        &[(2010, Some(10.0)), (2011, Some(10.0)), (2012, Some(10.0))],
    );
    let gdp = gdp(
        "ALPHA (SP)",
        State::SP,
        &[(2010, Some(100.0)), (2011, Some(110.0)), (2012, Some(121.0))],
    );
    let disb = disbursements(&[("100001", State::SP, 2011, 21.0)]);
    let inputs = PanelInputs {
        population: &pop,
        gdp: &gdp,
        disbursements: &disb,
    };

    let assembly = assembler(config()).assemble(&inputs, &deflators()).unwrap();
    assert!(assembly.resolution.is_complete());
    assert_eq!(assembly.audit.entities, 1);
    assert_eq!(assembly.audit.complete_entities, 1);
    assert_eq!(assembly.audit.disbursement_rows_matched, 1);

    let series = assembly.panel.entity(&alpha()).unwrap();
    let real = series.column(GDP_REAL).unwrap();
    assert_relative_eq!(real[0].unwrap(), 100.0, epsilon = 1e-9);
    assert_relative_eq!(real[1].unwrap(), 104.7619, epsilon = 1e-4);
    assert_relative_eq!(real[2].unwrap(), 109.7506, epsilon = 1e-4);

    let growth = series.value(DELTA_LOG_GDP_REAL, 2012).unwrap();
    assert_relative_eq!(growth, (real[2].unwrap() / real[1].unwrap()).ln(), epsilon = 1e-12);
    assert!(series.value(DELTA_LOG_GDP_REAL, 2010).is_none());

    // Zero, not missing, where the disbursement source has no record.
    assert_eq!(series.value(DISBURSEMENT_NOMINAL, 2010), Some(0.0));
    assert_eq!(series.value(DISBURSEMENT_NOMINAL, 2012), Some(0.0));

    // Share on prior-year real GDP: 21 deflated by 105, over 100.
    let share = series.value(SHARE_DISBURSEMENT, 2011).unwrap();
    assert_relative_eq!(share, 0.2, epsilon = 1e-12);
    assert_relative_eq!(
        series.value(SHARE_DISBURSEMENT_PC, 2011).unwrap(),
        0.02,
        epsilon = 1e-12
    );
    // Lead reads next year's disbursement over this year's GDP.
    assert_relative_eq!(
        series.value(&lead_name(SHARE_DISBURSEMENT, 1), 2010).unwrap(),
        series.value(DISBURSEMENT_REAL, 2011).unwrap() / real[0].unwrap(),
        epsilon = 1e-15
    );
    assert_relative_eq!(
        series.value(&lead_name(SHARE_DISBURSEMENT, 2), 2010).unwrap(),
        series.value(DISBURSEMENT_REAL, 2012).unwrap() / real[1].unwrap(),
        epsilon = 1e-15
    );
    assert_relative_eq!(
        series.value(&lag_name(SHARE_DISBURSEMENT, 1), 2012).unwrap(),
        share,
        epsilon = 1e-15
    );
}

#[test]
fn test_prior_gdp_falls_back_past_floored_value() {
    let pop = population(
        "100001",
        "ALPHA",
        State::SP,
        &[(2010, Some(10.0)), (2011, Some(10.0)), (2012, Some(10.0))],
    );
    // A negative GDP in 2011 is floored to missing before the share is
    // formed, so 2012 divides by 2010 GDP.
    let gdp = gdp(
        "ALPHA (SP)",
        State::SP,
        &[(2010, Some(100.0)), (2011, Some(-5.0)), (2012, Some(121.0))],
    );
    let disb = disbursements(&[("100001", State::SP, 2012, 11.025)]);
    let inputs = PanelInputs {
        population: &pop,
        gdp: &gdp,
        disbursements: &disb,
    };

    let assembly = assembler(config()).assemble(&inputs, &deflators()).unwrap();
    let series = assembly.panel.entity(&alpha()).unwrap();
    assert!(series.value(GDP_NOMINAL, 2011).is_none());
    assert_relative_eq!(
        series.value(SHARE_DISBURSEMENT, 2012).unwrap(),
        0.1,
        epsilon = 1e-12
    );

    let floored: Vec<_> = assembly
        .audit
        .conversions
        .entries()
        .iter()
        .filter(|e| e.column == GDP_NOMINAL)
        .collect();
    assert_eq!(floored.len(), 1);
    assert_eq!(floored[0].year, 2011);
}

#[test]
fn test_lead_shares_do_not_fall_back_on_missing_gdp() {
    let pop = population(
        "100001",
        "ALPHA",
        State::SP,
        &[(2010, Some(10.0)), (2011, Some(10.0)), (2012, Some(10.0))],
    );
    let gdp = gdp(
        "ALPHA (SP)",
        State::SP,
        &[(2010, Some(100.0)), (2011, Some(-5.0)), (2012, Some(121.0))],
    );
    let disb = disbursements(&[("100001", State::SP, 2012, 11.025)]);
    let inputs = PanelInputs {
        population: &pop,
        gdp: &gdp,
        disbursements: &disb,
    };

    let assembly = assembler(config()).assemble(&inputs, &deflators()).unwrap();
    let series = assembly.panel.entity(&alpha()).unwrap();
    assert!(series.value(GDP_REAL, 2011).is_none());
    // The share itself falls back to 2010 GDP...
    assert_relative_eq!(
        series.value(SHARE_DISBURSEMENT, 2012).unwrap(),
        0.1,
        epsilon = 1e-12
    );
    // ...but the leads divide by GDP of t and t+1 only.
    for share in [SHARE_DISBURSEMENT, SHARE_DISBURSEMENT_INDUSTRY, SHARE_DISBURSEMENT_AGRICULTURE] {
        assert!(series.value(&lead_name(share, 1), 2011).is_none());
        assert!(series.value(&lead_name(share, 2), 2010).is_none());
    }
    assert_eq!(series.value(&lead_name(SHARE_DISBURSEMENT, 1), 2010), Some(0.0));
    assembly.panel.verify().unwrap();
}

#[test]
fn test_unbalanced_entity_keeps_lag_chains_apart() {
    let mut pop = population(
        "100001",
        "ALPHA",
        State::SP,
        &[(2010, Some(10.0)), (2011, Some(10.0)), (2012, Some(10.0))],
    );
    pop.extend(population(
        "100002",
        "BETA",
        State::SP,
        &[(2010, None), (2011, Some(5.0)), (2012, Some(5.0))],
    ));
    let mut gdp_rows = gdp(
        "ALPHA (SP)",
        State::SP,
        &[(2010, Some(100.0)), (2011, Some(110.0)), (2012, Some(121.0))],
    );
    gdp_rows.extend(gdp(
        "BETA (SP)",
        State::SP,
        &[(2010, None), (2011, Some(50.0)), (2012, Some(60.0))],
    ));
    let disb = disbursements(&[
        ("100001", State::SP, 2010, 10.0),
        ("100002", State::SP, 2011, 4.0),
        ("100002", State::SP, 2012, 6.0),
    ]);
    let inputs = PanelInputs {
        population: &pop,
        gdp: &gdp_rows,
        disbursements: &disb,
    };

    let assembly = assembler(config()).assemble(&inputs, &deflators()).unwrap();
    assert_eq!(assembly.audit.empty_rows_dropped, 1);
    assert_eq!(assembly.audit.complete_entities, 1);
    assert_eq!(assembly.audit.incomplete_entities, 1);

    let beta = assembly
        .panel
        .entity(&EntityKey::new("100002", State::SP))
        .unwrap();
    assert_eq!(beta.years(), &[2011, 2012]);
    assert!(beta.value(&lag_name(LOG_POPULATION, 1), 2011).is_none());
    assert!(beta.value(SHARE_DISBURSEMENT, 2011).is_none());

    let alpha = assembly.panel.entity(&alpha()).unwrap();
    let lag = alpha.column(&lag_name(DISBURSEMENT_NOMINAL, 1));
    assert!(lag.is_none(), "levels carry no lags");
    assert!(alpha.value(&lag_name(LOG_POPULATION, 1), 2011).is_some());

    let df = assembly.panel.to_dataframe(PanelVariant::Lagged).unwrap();
    assert_eq!(df.height(), 5);
    assert!(df.column(&lead_name(SHARE_DISBURSEMENT, 1)).is_err());
    let leads = assembly.panel.to_dataframe(PanelVariant::LaggedWithLeads).unwrap();
    assert!(leads.column(&lead_name(SHARE_DISBURSEMENT, 2)).is_ok());
}

#[test]
fn test_resolution_mismatch_is_reported() {
    let pop = population("100001", "ALPHA", State::SP, &[(2010, Some(10.0))]);
    let gdp_rows = gdp("ALFA (SP)", State::SP, &[(2010, Some(100.0))]);
    let disb = disbursements(&[("100009", State::SP, 2010, 3.0)]);
    let inputs = PanelInputs {
        population: &pop,
        gdp: &gdp_rows,
        disbursements: &disb,
    };

    let err = assembler(config())
        .assemble(&inputs, &deflators())
        .unwrap_err();
    match err {
        PanelError::Data(DataError::ResolutionMismatch {
            only_left,
            only_right,
            ..
        }) => {
            assert_eq!(only_left, vec!["ALPHA/SP".to_string()]);
            assert_eq!(only_right, vec!["ALFA/SP".to_string()]);
        }
        other => panic!("unexpected error: {other}"),
    }

    let partial = PanelConfig {
        accept_partial_coverage: true,
        ..config()
    };
    let assembly = assembler(partial).assemble(&inputs, &deflators()).unwrap();
    assert_eq!(assembly.audit.gdp_rows_unmatched, 1);
    assert_eq!(assembly.audit.disbursement_rows_unmatched, 1);
    assert_relative_eq!(assembly.audit.disbursement_unmatched_total, 3.0);
    let series = assembly.panel.entity(&alpha()).unwrap();
    assert!(series.value(GDP_NOMINAL, 2010).is_none());
}

#[test]
fn test_missing_deflator_leaves_reals_missing() {
    let pop = population("100001", "ALPHA", State::SP, &[(2010, Some(10.0)), (2011, Some(10.0))]);
    let gdp_rows = gdp(
        "ALPHA (SP)",
        State::SP,
        &[(2010, Some(100.0)), (2011, Some(110.0))],
    );
    let disb = DisbursementAggregate::default();
    let inputs = PanelInputs {
        population: &pop,
        gdp: &gdp_rows,
        disbursements: &disb,
    };
    let full = deflators();
    let partial = DeflatorSet::from_indices(full.get(munipanel_data::PriceScope::Headline).cloned(), None, None);

    let assembly = assembler(config()).assemble(&inputs, &partial).unwrap();
    assert_eq!(assembly.audit.undefined_deflators.len(), 2);
    let series = assembly.panel.entity(&alpha()).unwrap();
    assert!(series.value(GDP_REAL, 2011).is_some());
    assert!(series.value(VA_INDUSTRY_REAL, 2011).is_none());
    assert!(series.value(VA_INDUSTRY_REAL_GDP, 2011).is_some());
}
