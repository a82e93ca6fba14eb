//! Writing model and panel artifacts to disk.

use munipanel_output::*;
use munipanel_regression::{
    Alternative, FittedModel, FixedEffectsEstimator, LinearRestriction, LinearTest, PanelModel,
    Restriction, WaldTest,
};
use polars::prelude::*;
use rstest::rstest;
use std::fs;
use tempfile::TempDir;

fn panel() -> DataFrame {
    let mut code = Vec::new();
    let mut state = Vec::new();
    let mut year = Vec::new();
    let mut x1 = Vec::new();
    let mut x2 = Vec::new();
    let mut y = Vec::new();
    for e in 0..8 {
        for t in 0..6 {
            let a = (e * 7 + t * 3) as f64;
            let v1 = (a * 0.37).sin() + 0.1 * e as f64;
            let v2 = (a * 0.91).cos();
            code.push(format!("{}", 100_000 + e));
            state.push(if e % 2 == 0 { "SP" } else { "MG" });
            year.push(2010 + t);
            x1.push(v1);
            x2.push(v2);
            y.push(0.5 * v1 - 0.2 * v2 + e as f64 + 0.3 * t as f64 + 0.05 * (a * 1.7).sin());
        }
    }
    DataFrame::new(vec![
        Column::new("code".into(), code),
        Column::new("state".into(), state),
        Column::new("year".into(), year),
        Column::new("x1".into(), x1),
        Column::new("x2".into(), x2),
        Column::new("y".into(), y),
    ])
    .unwrap()
}

fn fit() -> (FittedModel, Vec<WaldTest>, Vec<LinearTest>) {
    let model = PanelModel::new("toy", "y", ["x2", "x1"]);
    let fitted = FixedEffectsEstimator::default().fit_frame(&model, &panel()).unwrap();
    let tests = vec![
        fitted.wald_test("joint_betas", &Restriction::zeros(["x1", "x2"])).unwrap(),
        fitted.wald_test("cumulative", &Restriction::sum(["x1", "x2"])).unwrap(),
    ];
    let signed = fitted
        .test_linear("cumulative", &LinearRestriction::sum(["x1", "x2"]), Alternative::Greater)
        .unwrap();
    (fitted, tests, vec![signed])
}

#[test]
fn test_model_artifacts_csv() {
    let dir = TempDir::new().unwrap();
    let (fitted, tests, linear) = fit();
    let writer = ArtifactWriter::new(dir.path());
    let paths = writer.write_model(&fitted, &tests, &linear).unwrap();

    let names: Vec<String> = paths
        .iter()
        .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
        .collect();
    assert_eq!(
        names,
        vec!["toy_coef.csv", "toy_stats.json", "toy_wald_tests.csv", "toy_linear_tests.csv"]
    );

    let coef = fs::read_to_string(&paths[0]).unwrap();
    let mut lines = coef.lines();
    assert_eq!(lines.next().unwrap(), "model,var,coef,std_err,t,p,ci_low,ci_high");
    assert!(lines.next().unwrap().starts_with("toy,x1,"));
    assert!(lines.next().unwrap().starts_with("toy,x2,"));

    let stats: ModelStatsRecord =
        serde_json::from_str(&fs::read_to_string(&paths[1]).unwrap()).unwrap();
    assert_eq!(stats.depvar, "y");
    assert_eq!(stats.nobs, 48);
    assert_eq!(stats.entities, 8);
    assert_eq!(stats.time_periods, 6);
    assert!(stats.entity_effects && stats.time_effects);
    assert_eq!(stats.cov_type, "clustered(entity)");

    let wald = fs::read_to_string(&paths[2]).unwrap();
    assert!(wald.starts_with("model,test,stat,pval,df"));
    assert!(wald.contains("toy,joint_betas,"));
    assert!(wald.contains("toy,cumulative,"));

    // The signed sum test keeps its direction: x1 + x2 ≈ 0.3 > 0.
    let signed = fs::read_to_string(&paths[3]).unwrap();
    let mut lines = signed.lines();
    assert_eq!(
        lines.next().unwrap(),
        "model,test,estimate,std_err,stat,alternative,pval,pval_greater,pval_less"
    );
    let fields: Vec<&str> = lines.next().unwrap().split(',').collect();
    assert_eq!(&fields[..2], &["toy", "cumulative"]);
    assert_eq!(fields[5], "greater");
    let estimate: f64 = fields[2].parse().unwrap();
    let pval: f64 = fields[6].parse().unwrap();
    let greater: f64 = fields[7].parse().unwrap();
    let less: f64 = fields[8].parse().unwrap();
    assert!(estimate > 0.0);
    assert_eq!(pval, greater);
    assert!((greater + less - 1.0).abs() < 1e-12);
    assert!(greater < 0.5);
}

#[rstest]
#[case(false)]
#[case(true)]
fn test_overwrite_guard(#[case] overwrite: bool) {
    let dir = TempDir::new().unwrap();
    let (fitted, tests, linear) = fit();
    let first = ArtifactWriter::new(dir.path());
    first.write_model(&fitted, &tests, &linear).unwrap();

    let second = ArtifactWriter::new(dir.path()).with_overwrite(overwrite);
    let result = second.write_model(&fitted, &tests, &linear);
    if overwrite {
        assert!(result.is_ok());
    } else {
        match result.unwrap_err() {
            ExportError::AlreadyExists { path } => assert!(path.ends_with("toy_coef.csv")),
            other => panic!("unexpected error: {other}"),
        }
    }
}

#[test]
fn test_json_tables() {
    let dir = TempDir::new().unwrap();
    let (fitted, tests, linear) = fit();
    let writer = ArtifactWriter::new(dir.path())
        .with_format(ExportFormat::Json)
        .unwrap();
    writer.write_model(&fitted, &tests, &linear).unwrap();

    let coef: Vec<CoefficientRow> =
        serde_json::from_str(&fs::read_to_string(dir.path().join("toy_coef.json")).unwrap())
            .unwrap();
    assert_eq!(coef.len(), 2);
    assert!(coef.iter().all(|row| row.ci_low < row.coef && row.coef < row.ci_high));
    let wald: Vec<WaldRow> =
        serde_json::from_str(&fs::read_to_string(dir.path().join("toy_wald_tests.json")).unwrap())
            .unwrap();
    assert_eq!(wald[0].df, 2);
    assert_eq!(wald[1].df, 1);
    let signed: Vec<LinearTestRow> = serde_json::from_str(
        &fs::read_to_string(dir.path().join("toy_linear_tests.json")).unwrap(),
    )
    .unwrap();
    assert_eq!(signed.len(), 1);
    assert_eq!(signed[0].alternative, Alternative::Greater);
    assert_eq!(signed[0].test, "cumulative");
}

#[test]
fn test_panel_parquet_round_trip() {
    let dir = TempDir::new().unwrap();
    let mut df = panel();
    let path = ArtifactWriter::new(dir.path())
        .write_panel("panel_lagged", &mut df)
        .unwrap();
    assert!(path.ends_with("panel_lagged.parquet"));

    let read = ParquetReader::new(fs::File::open(&path).unwrap()).finish().unwrap();
    assert_eq!(read.shape(), df.shape());
    let profile = PanelProfile::from_frame(&read, &["code", "state"]).unwrap();
    assert_eq!(profile.entities, 8);
    assert!(profile.incomplete_columns().is_empty());
}

#[test]
fn test_report_lists_coefficients_in_model_order() {
    let (fitted, tests, _) = fit();
    let report = RegressionReport::new(&fitted, &tests);
    assert_eq!(report.coefficients[0].var, "x2");
    let text = report.to_string();
    assert!(text.contains("Panel regression: toy"));
    assert!(text.contains("clustered(entity)"));
    assert!(text.find("x2").unwrap() < text.find("x1").unwrap());
    assert!(text.contains("joint_betas"));
    let json: serde_json::Value = serde_json::from_str(&report.to_json().unwrap()).unwrap();
    assert_eq!(json["stats"]["model"], "toy");
}
