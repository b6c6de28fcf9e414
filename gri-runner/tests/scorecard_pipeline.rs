//! End-to-end scorecard: TOML config, CSV inputs, artifacts on disk.

use std::path::Path;

use gri_runner::export::{load_artifacts, save_artifacts};
use gri_runner::{build_scorecard, ScorecardConfig};

fn write(dir: &Path, name: &str, content: &str) {
    let path = dir.join(name);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(path, content).unwrap();
}

fn participants() -> String {
    let mut csv = String::from("participant_id,country,gender\n");
    let mut id = 0;
    for (country, n) in [("US", 20), ("KE", 12), ("IN", 8)] {
        for i in 0..n {
            id += 1;
            let gender = if i % 2 == 0 { "F" } else { "M" };
            csv.push_str(&format!("{id},{country},{gender}\n"));
        }
    }
    csv
}

const CONFIG: &str = r#"
[simulation]
n_simulations = 50
seed = 42
threads = 2

[[dimensions]]
name = "Country"
columns = ["country"]
benchmark = "benchmarks/country.csv"
simplification = { mode = "formulaic", policy = "top_n", value = 2 }

[[dimensions]]
name = "Country × Gender"
columns = ["country", "gender"]
benchmark = "benchmarks/country_gender.csv"
variance_file = "variances/country_gender.csv"
simplification = { mode = "adaptive", coverage_target = 0.9 }

[[dimensions]]
name = "Religion"
columns = ["religion"]
benchmark = "benchmarks/religion.csv"
"#;

fn fixture(dir: &Path) {
    write(dir, "scorecard.toml", CONFIG);
    write(dir, "participants.csv", &participants());
    write(
        dir,
        "benchmarks/country.csv",
        "country,population_proportion\nUS,0.5\nKE,0.3\nIN,0.15\nBR,0.05\n",
    );
    write(
        dir,
        "benchmarks/country_gender.csv",
        "country,gender,population_proportion\n\
         US,F,0.25\nUS,M,0.25\nKE,F,0.15\nKE,M,0.15\nIN,F,0.075\nIN,M,0.075\nBR,F,0.025\nBR,M,0.025\n",
    );
    write(dir, "variances/country_gender.csv", "stratum,variance\nUS × F,0.1\nUS × M,0.1\n");
    write(dir, "benchmarks/religion.csv", "religion,population_proportion\nA,1.0\n");
}

#[test]
fn scores_every_dimension_and_isolates_failures() {
    let dir = tempfile::tempdir().unwrap();
    fixture(dir.path());
    let config = ScorecardConfig::from_file(&dir.path().join("scorecard.toml")).unwrap();

    let sc = build_scorecard(&config, &dir.path().join("participants.csv")).unwrap();
    assert_eq!(sc.participants, 40);
    assert_eq!(sc.rows.len(), 3);

    let country = sc.row("Country").unwrap();
    assert_eq!(country.error, None);
    assert_eq!(country.sample_size, 40);
    assert_eq!(country.benchmark_strata, 4);
    assert_eq!(country.simplified_strata, 3);
    assert!((country.gri.unwrap() - 0.95).abs() < 1e-12);
    // BR is relevant at 1/(2N) = 0.0125 and unsampled.
    assert!((country.diversity.unwrap() - 0.75).abs() < 1e-12);
    let max_gri = country.max_gri.unwrap();
    assert!(max_gri > country.gri.unwrap());
    assert!(country.gri_pct_of_max.unwrap() < 100.0);
    assert_eq!(country.simulation.as_ref().unwrap().n_simulations, 50);

    let cg = sc.row("Country × Gender").unwrap();
    assert_eq!(cg.error, None);
    assert_eq!(cg.benchmark_strata, 8);
    assert!(cg.simplified_strata <= 8);
    assert!(cg.vwrs.is_some());

    let religion = sc.row("Religion").unwrap();
    assert!(religion.error.as_deref().unwrap().contains("religion"));
    assert_eq!(religion.gri, None);

    let expected = (country.gri.unwrap() + cg.gri.unwrap()) / 2.0;
    assert!((sc.overall.gri.unwrap() - expected).abs() < 1e-12);
}

#[test]
fn artifacts_reload() {
    let dir = tempfile::tempdir().unwrap();
    fixture(dir.path());
    let config = ScorecardConfig::from_file(&dir.path().join("scorecard.toml")).unwrap();
    let sc = build_scorecard(&config, &dir.path().join("participants.csv")).unwrap();

    let out = dir.path().join("results");
    let run_dir = save_artifacts(&sc, &out).unwrap();
    assert!(run_dir.join("vwrs_country.csv").exists());
    assert!(!run_dir.join("vwrs_religion.csv").exists());

    let loaded = load_artifacts(&run_dir).unwrap();
    assert_eq!(loaded.schema_version, sc.schema_version);
    assert_eq!(loaded.generated_at, sc.generated_at);
    assert_eq!(loaded.participants, 40);
    for (got, want) in loaded.rows.iter().zip(&sc.rows) {
        assert_eq!(got.dimension, want.dimension);
        assert_eq!(got.error, want.error);
        match (got.gri, want.gri) {
            (Some(g), Some(w)) => assert!((g - w).abs() < 1e-12),
            (g, w) => assert_eq!(g, w),
        }
    }
    assert_eq!(loaded.rows.len(), sc.rows.len());
}

#[test]
fn same_inputs_same_scores() {
    let dir = tempfile::tempdir().unwrap();
    fixture(dir.path());
    let config = ScorecardConfig::from_file(&dir.path().join("scorecard.toml")).unwrap();
    let a = build_scorecard(&config, &dir.path().join("participants.csv")).unwrap();
    let b = build_scorecard(&config, &dir.path().join("participants.csv")).unwrap();
    assert_eq!(a.rows, b.rows);
}
