//! Fixed-effects fits on simulated unbalanced panels.

use approx::assert_abs_diff_eq;
use munipanel_regression::covariance::is_positive_semidefinite;
use munipanel_regression::*;
use ndarray::{Array1, Array2};
use polars::prelude::*;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rstest::rstest;

struct Simulated {
    entity: Vec<String>,
    time: Vec<String>,
    state: Vec<String>,
    x: Array2<f64>,
    y: Array1<f64>,
    alpha: Vec<f64>,
    lambda: Vec<f64>,
    entity_id: Vec<usize>,
    time_id: Vec<usize>,
}

/// 40 entities over 10 periods, about a tenth of the cells missing.
fn simulate(seed: u64) -> Simulated {
    let mut rng = StdRng::seed_from_u64(seed);
    let alpha: Vec<f64> = (0..40).map(|_| rng.gen_range(-5.0..5.0)).collect();
    let lambda: Vec<f64> = (0..10).map(|_| rng.gen_range(-1.0..1.0)).collect();

    let mut entity = Vec::new();
    let mut time = Vec::new();
    let mut state = Vec::new();
    let mut rows = Vec::new();
    let mut y = Vec::new();
    let mut entity_id = Vec::new();
    let mut time_id = Vec::new();
    for e in 0..40 {
        for t in 0..10 {
            if rng.gen_bool(0.1) {
                continue;
            }
            let x1 = rng.gen_range(0.0..1.0) + 0.1 * alpha[e];
            let x2 = rng.gen_range(-1.0..1.0) + lambda[t];
            let noise = rng.gen_range(-0.1..0.1);
            y.push(0.7 * x1 - 0.3 * x2 + alpha[e] + lambda[t] + noise);
            rows.push([x1, x2]);
            entity.push(format!("e{e:02}"));
            time.push(format!("{}", 2000 + t));
            state.push(format!("s{}", e % 6));
            entity_id.push(e);
            time_id.push(t);
        }
    }
    let mut x = Array2::zeros((rows.len(), 2));
    for (i, r) in rows.iter().enumerate() {
        x[[i, 0]] = r[0];
        x[[i, 1]] = r[1];
    }
    Simulated {
        entity,
        time,
        state,
        x,
        y: Array1::from_vec(y),
        alpha,
        lambda,
        entity_id,
        time_id,
    }
}

fn design(sim: &Simulated, y: Array1<f64>) -> PanelDesign {
    PanelDesign::new(
        "y",
        vec!["x1".to_string(), "x2".to_string()],
        y,
        sim.x.clone(),
        &sim.entity,
        &sim.time,
    )
    .unwrap()
    .with_clusters("state", &sim.state)
    .unwrap()
}

fn estimator(covariance: CovarianceType) -> FixedEffectsEstimator {
    FixedEffectsEstimator::new(FitConfig {
        covariance,
        ..Default::default()
    })
}

fn model() -> PanelModel {
    PanelModel::new("sim", "y", ["x1", "x2"])
}

#[test]
fn test_slopes_recovered() {
    let sim = simulate(7);
    let fitted = estimator(CovarianceType::default())
        .fit(&model(), &design(&sim, sim.y.clone()))
        .unwrap();
    assert_abs_diff_eq!(fitted.params()[0], 0.7, epsilon = 0.05);
    assert_abs_diff_eq!(fitted.params()[1], -0.3, epsilon = 0.05);
    assert_eq!(fitted.entities(), 40);
    assert_eq!(fitted.time_periods(), 10);
    assert_eq!(fitted.absorbed_dof(), 40 + 10 - 1);
    assert_eq!(fitted.df_resid(), fitted.nobs() - 2 - 49);
}

#[test]
fn test_entity_and_time_shifts_are_absorbed() {
    let sim = simulate(11);
    let base = estimator(CovarianceType::Robust)
        .fit(&model(), &design(&sim, sim.y.clone()))
        .unwrap();

    let shifted: Array1<f64> = sim
        .y
        .iter()
        .enumerate()
        .map(|(i, y)| y + 100.0 * sim.alpha[sim.entity_id[i]] - 40.0 * sim.lambda[sim.time_id[i]] + 3.0)
        .collect();
    let moved = estimator(CovarianceType::Robust)
        .fit(&model(), &design(&sim, shifted))
        .unwrap();

    for j in 0..2 {
        assert_abs_diff_eq!(base.params()[j], moved.params()[j], epsilon = 1e-7);
    }
    assert_abs_diff_eq!(base.rss(), moved.rss(), epsilon = 1e-6);
}

#[rstest]
#[case(CovarianceType::Unadjusted)]
#[case(CovarianceType::Robust)]
#[case(CovarianceType::Clustered(ClusterBy::Entity))]
#[case(CovarianceType::Clustered(ClusterBy::Time))]
#[case(CovarianceType::Clustered(ClusterBy::EntityAndTime))]
#[case(CovarianceType::Clustered(ClusterBy::Column("state".to_string())))]
fn test_covariance_symmetric_with_nonnegative_diagonal(#[case] covariance: CovarianceType) {
    let sim = simulate(3);
    let label = covariance.label();
    let fitted = estimator(covariance)
        .fit(&model(), &design(&sim, sim.y.clone()))
        .unwrap();
    let v = fitted.cov();
    assert_abs_diff_eq!(v[[0, 1]], v[[1, 0]], epsilon = 1e-15);
    assert!(v[[0, 0]] >= 0.0 && v[[1, 1]] >= 0.0);
    assert_eq!(fitted.cov_type(), label);
}

#[test]
fn test_two_way_clustering_is_psd() {
    for seed in 0..5 {
        let sim = simulate(seed);
        let fitted = estimator(CovarianceType::Clustered(ClusterBy::EntityAndTime))
            .fit(&model(), &design(&sim, sim.y.clone()))
            .unwrap();
        assert!(is_positive_semidefinite(fitted.cov(), 1e-10), "seed {seed}");
    }
}

#[test]
fn test_single_restriction_wald_matches_t() {
    let sim = simulate(5);
    let fitted = estimator(CovarianceType::default())
        .fit(&model(), &design(&sim, sim.y.clone()))
        .unwrap();
    let coef = fitted.coefficient("x2").unwrap().clone();
    let wald = fitted.wald_test("x2", &Restriction::zeros(["x2"])).unwrap();
    assert_eq!(wald.df, 1);
    assert_abs_diff_eq!(wald.statistic, coef.t_stat * coef.t_stat, epsilon = 1e-8);
    // F(1, df) is the square of t(df), the default reference distribution.
    let f = fitted.wald_test_f("x2", &Restriction::zeros(["x2"])).unwrap();
    assert_abs_diff_eq!(f.p_value, coef.p_value, epsilon = 1e-8);

    let single = fitted.test_coefficient("x2", Alternative::Less).unwrap();
    assert_abs_diff_eq!(single.statistic, coef.t_stat, epsilon = 1e-12);
    assert_abs_diff_eq!(single.p_value, coef.p_value / 2.0, epsilon = 1e-12);
}

#[test]
fn test_sum_restriction_uses_covariance_block() {
    let sim = simulate(9);
    let fitted = estimator(CovarianceType::default())
        .fit(&model(), &design(&sim, sim.y.clone()))
        .unwrap();
    let v = fitted.cov();
    let sum = fitted
        .test_linear("cumulative", &LinearRestriction::sum(["x1", "x2"]), Alternative::TwoSided)
        .unwrap();
    assert_abs_diff_eq!(sum.estimate, fitted.params()[0] + fitted.params()[1], epsilon = 1e-12);
    assert_abs_diff_eq!(
        sum.std_err * sum.std_err,
        v[[0, 0]] + v[[1, 1]] + 2.0 * v[[0, 1]],
        epsilon = 1e-12
    );
    let wald = fitted.wald_test("cumulative", &Restriction::sum(["x1", "x2"])).unwrap();
    assert_abs_diff_eq!(wald.statistic, sum.statistic * sum.statistic, epsilon = 1e-8);

    let f = fitted.wald_test_f("joint", &Restriction::zeros(["x1", "x2"])).unwrap();
    let chi = fitted.wald_test("joint", &Restriction::zeros(["x1", "x2"])).unwrap();
    assert_abs_diff_eq!(f.statistic * 2.0, chi.statistic, epsilon = 1e-10);
    assert_eq!(f.distribution, WaldDistribution::F { df_denom: fitted.df_resid() });
}

#[test]
fn test_dependent_restrictions_are_rejected() {
    let sim = simulate(2);
    let fitted = estimator(CovarianceType::Robust)
        .fit(&model(), &design(&sim, sim.y.clone()))
        .unwrap();
    let restriction = Restriction::parse(["x1 + x2 = 0", "2*x1 + 2*x2 = 0"]).unwrap();
    match fitted.wald_test("dup", &restriction).unwrap_err() {
        RegressionError::DependentRestrictions { rows } => {
            assert_eq!(rows, vec!["2*x1 + 2*x2 = 0".to_string()]);
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(matches!(
        fitted.wald_test("bad", &Restriction::zeros(["x3"])),
        Err(RegressionError::UnknownCoefficient(_))
    ));
}

#[test]
fn test_collinear_sector_shares_name_the_column() {
    let mut rng = StdRng::seed_from_u64(21);
    let n_entities = 12;
    let years = 6;
    let mut code = Vec::new();
    let mut state = Vec::new();
    let mut year = Vec::new();
    let mut growth = Vec::new();
    let mut industry = Vec::new();
    let mut agriculture = Vec::new();
    let mut other = Vec::new();
    for e in 0..n_entities {
        for t in 0..years {
            let si: f64 = rng.gen_range(0.1..0.4);
            let sa: f64 = rng.gen_range(0.05..0.3);
            code.push(format!("{:06}", 100_000 + e));
            state.push("SP");
            year.push(2010 + t as i32);
            growth.push(rng.gen_range(-0.1..0.1));
            industry.push(si);
            agriculture.push(sa);
            other.push(1.0 - si - sa);
        }
    }
    let df = DataFrame::new(vec![
        Column::new("code".into(), code),
        Column::new("state".into(), state),
        Column::new("year".into(), year),
        Column::new("delta_log_gdp_real".into(), growth),
        Column::new("share_industry".into(), industry),
        Column::new("share_agriculture".into(), agriculture),
        Column::new("share_other".into(), other),
    ])
    .unwrap();

    let spec = PanelModel::new(
        "collinear",
        "delta_log_gdp_real",
        ["share_industry", "share_agriculture", "share_other"],
    );
    let err = FixedEffectsEstimator::default().fit_frame(&spec, &df).unwrap_err();
    match err {
        RegressionError::RankDeficient { columns } => {
            assert_eq!(columns, vec!["share_other".to_string()]);
            let message = RegressionError::RankDeficient { columns }.to_string();
            assert!(message.contains("share_other"));
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn test_fit_frame_with_state_clusters_and_missing_rows() {
    let sim = simulate(4);
    let n = sim.y.len();
    let mut y: Vec<Option<f64>> = sim.y.iter().copied().map(Some).collect();
    y[0] = None;
    y[n - 1] = Some(f64::NAN);
    let codes: Vec<String> = sim.entity.clone();
    let years: Vec<i32> = sim.time.iter().map(|t| t.parse().unwrap()).collect();
    let df = DataFrame::new(vec![
        Column::new("code".into(), codes),
        Column::new("state".into(), sim.state.clone()),
        Column::new("year".into(), years),
        Column::new("y".into(), y),
        Column::new("x1".into(), sim.x.column(0).to_vec()),
        Column::new("x2".into(), sim.x.column(1).to_vec()),
    ])
    .unwrap();

    let fitted = estimator(CovarianceType::Clustered(ClusterBy::Column("state".to_string())))
        .fit_frame(&model(), &df)
        .unwrap();
    assert_eq!(fitted.nobs(), n - 2);
    assert_eq!(fitted.cov_type(), "clustered(state)");

    let missing = estimator(CovarianceType::Clustered(ClusterBy::Column("region".to_string())))
        .fit_frame(&model(), &df)
        .unwrap_err();
    assert!(matches!(missing, RegressionError::UnknownColumn(name) if name == "region"));
}
