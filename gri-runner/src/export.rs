//! Scorecard export: JSON, CSV and Markdown artifacts.
//!
//! - **JSON**: full scorecard with schema versioning
//! - **CSV**: one row per dimension, per-stratum VWRS tables, ceiling curves
//! - **Markdown**: human-readable scorecard summary
//!
//! Persisted scorecards include a `schema_version` field. Unknown versions
//! are rejected on load.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use gri_core::allocation::AllocationPlan;
use gri_core::metrics::VwrsBreakdown;
use gri_core::simulation::CurvePoint;

use crate::scorecard::{DimensionScore, Scorecard, SCHEMA_VERSION};

// ─── JSON export ────────────────────────────────────────────────────

pub fn export_scorecard_json(scorecard: &Scorecard) -> Result<String> {
    serde_json::to_string_pretty(scorecard).context("failed to serialize Scorecard to JSON")
}

/// Deserialize a `Scorecard`, rejecting unknown schema versions.
pub fn import_scorecard_json(json: &str) -> Result<Scorecard> {
    let scorecard: Scorecard =
        serde_json::from_str(json).context("failed to deserialize Scorecard from JSON")?;
    if scorecard.schema_version > SCHEMA_VERSION {
        bail!(
            "unsupported schema version {} (max supported: {})",
            scorecard.schema_version,
            SCHEMA_VERSION
        );
    }
    Ok(scorecard)
}

// ─── CSV export ─────────────────────────────────────────────────────

fn opt(v: Option<f64>) -> String {
    v.map(|x| format!("{x:.6}")).unwrap_or_default()
}

fn finish(wtr: csv::Writer<Vec<u8>>) -> Result<String> {
    let bytes = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(bytes).context("CSV output is not valid UTF-8")
}

/// Columns: dimension, columns, sample_size, benchmark_strata,
/// simplified_strata, gri, diversity, sri, vwrs, max_gri, max_diversity,
/// gri_pct_of_max, diversity_pct_of_max, error. The overall row comes last.
pub fn export_scorecard_csv(scorecard: &Scorecard) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record([
        "dimension",
        "columns",
        "sample_size",
        "benchmark_strata",
        "simplified_strata",
        "gri",
        "diversity",
        "sri",
        "vwrs",
        "max_gri",
        "max_diversity",
        "gri_pct_of_max",
        "diversity_pct_of_max",
        "error",
    ])?;
    for row in scorecard.rows.iter().chain(std::iter::once(&scorecard.overall)) {
        wtr.write_record([
            row.dimension.clone(),
            row.columns.join(";"),
            row.sample_size.to_string(),
            row.benchmark_strata.to_string(),
            row.simplified_strata.to_string(),
            opt(row.gri),
            opt(row.diversity),
            opt(row.sri),
            opt(row.vwrs),
            opt(row.max_gri),
            opt(row.max_diversity),
            opt(row.gri_pct_of_max),
            opt(row.diversity_pct_of_max),
            row.error.clone().unwrap_or_default(),
        ])?;
    }
    finish(wtr)
}

pub fn export_vwrs_breakdown_csv(breakdown: &VwrsBreakdown) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record([
        "stratum",
        "population_proportion",
        "sample_proportion",
        "sample_count",
        "standard_error",
        "reliability",
        "weight",
        "absolute_deviation",
        "gri_contribution",
        "weighted_error",
    ])?;
    for r in &breakdown.rows {
        wtr.write_record([
            r.key.joined(),
            format!("{:.6}", r.population_proportion),
            format!("{:.6}", r.sample_proportion),
            r.sample_count.to_string(),
            format!("{:.6}", r.standard_error),
            format!("{:.6}", r.reliability),
            format!("{:.8}", r.weight),
            format!("{:.6}", r.absolute_deviation),
            format!("{:.6}", r.gri_contribution),
            format!("{:.8}", r.weighted_error),
        ])?;
    }
    finish(wtr)
}

pub fn export_curve_csv(curve: &[CurvePoint]) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record([
        "sample_size",
        "max_gri_mean",
        "max_gri_std",
        "max_diversity_mean",
        "max_diversity_std",
        "total_strata",
        "relevant_strata",
    ])?;
    for p in curve {
        wtr.write_record([
            p.sample_size.to_string(),
            format!("{:.6}", p.max_gri_mean),
            format!("{:.6}", p.max_gri_std),
            format!("{:.6}", p.max_diversity_mean),
            format!("{:.6}", p.max_diversity_std),
            p.total_strata.to_string(),
            p.relevant_strata.to_string(),
        ])?;
    }
    finish(wtr)
}

pub fn export_allocation_csv(plan: &AllocationPlan) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record(["stratum", "count"])?;
    for a in &plan.rows {
        wtr.write_record([a.key.joined(), a.count.to_string()])?;
    }
    finish(wtr)
}

// ─── Artifacts ──────────────────────────────────────────────────────

fn slug(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    for c in name.chars() {
        if c.is_ascii_alphanumeric() {
            out.push(c.to_ascii_lowercase());
        } else if !out.ends_with('_') {
            out.push('_');
        }
    }
    out.trim_matches('_').to_string()
}

/// Write `scorecard.json`, `scorecard.csv`, `scorecard.md` and one
/// `vwrs_<dimension>.csv` per scored dimension into a timestamped
/// directory under `output_dir`. Returns that directory.
pub fn save_artifacts(scorecard: &Scorecard, output_dir: &Path) -> Result<PathBuf> {
    let dirname = format!("scorecard_{}", scorecard.generated_at.format("%Y%m%d_%H%M%S"));
    let run_dir = output_dir.join(dirname);
    std::fs::create_dir_all(&run_dir)
        .with_context(|| format!("failed to create artifact dir: {}", run_dir.display()))?;

    std::fs::write(run_dir.join("scorecard.json"), export_scorecard_json(scorecard)?)?;
    std::fs::write(run_dir.join("scorecard.csv"), export_scorecard_csv(scorecard)?)?;
    std::fs::write(run_dir.join("scorecard.md"), generate_report(scorecard))?;

    for row in &scorecard.rows {
        if let Some(breakdown) = &row.vwrs_breakdown {
            let path = run_dir.join(format!("vwrs_{}.csv", slug(&row.dimension)));
            std::fs::write(&path, export_vwrs_breakdown_csv(breakdown)?)
                .with_context(|| format!("failed to write {}", path.display()))?;
        }
    }
    Ok(run_dir)
}

/// Load a `Scorecard` from an artifact directory's scorecard.json.
pub fn load_artifacts(dir: &Path) -> Result<Scorecard> {
    let path = dir.join("scorecard.json");
    let json = std::fs::read_to_string(&path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    import_scorecard_json(&json)
}

// ─── Markdown reports ───────────────────────────────────────────────

fn cell(v: Option<f64>) -> String {
    v.map(|x| format!("{x:.4}")).unwrap_or_else(|| "—".to_string())
}

fn report_row(md: &mut String, row: &DimensionScore) {
    md.push_str(&format!(
        "| {} | {} | {} | {} | {} | {} | {} |\n",
        row.dimension,
        row.sample_size,
        cell(row.gri),
        cell(row.diversity),
        cell(row.sri),
        cell(row.vwrs),
        cell(row.gri_pct_of_max.map(|p| p / 100.0)),
    ));
}

/// Markdown summary of a scorecard.
pub fn generate_report(scorecard: &Scorecard) -> String {
    let mut md = String::with_capacity(2048);
    md.push_str("# Representativeness Scorecard\n\n");
    md.push_str(&format!(
        "Generated {} from `{}` ({} participants).\n\n",
        scorecard.generated_at.format("%Y-%m-%d %H:%M:%S UTC"),
        scorecard.participants_path.display(),
        scorecard.participants
    ));
    md.push_str("| Dimension | N | GRI | Diversity | SRI | VWRS | GRI / max |\n");
    md.push_str("|---|---:|---:|---:|---:|---:|---:|\n");
    for row in &scorecard.rows {
        report_row(&mut md, row);
    }
    report_row(&mut md, &scorecard.overall);

    let failed: Vec<&DimensionScore> = scorecard.failed().collect();
    if !failed.is_empty() {
        md.push_str("\n## Errors\n\n");
        for row in failed {
            md.push_str(&format!(
                "- **{}**: {}\n",
                row.dimension,
                row.error.as_deref().unwrap_or("")
            ));
        }
    }
    let with_issues: Vec<&DimensionScore> = scorecard.rows.iter().filter(|r| !r.issues.is_empty()).collect();
    if !with_issues.is_empty() {
        md.push_str("\n## Data quality\n\n");
        for row in with_issues {
            for issue in &row.issues {
                md.push_str(&format!("- {}: {}\n", row.dimension, issue));
            }
        }
    }
    md
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use gri_core::domain::StratumKey;
    use gri_core::metrics::VwrsRow;

    fn scorecard() -> Scorecard {
        let ok = DimensionScore {
            dimension: "Country × Gender".into(),
            columns: vec!["country".into(), "gender".into()],
            sample_size: 40,
            gri: Some(0.75),
            vwrs: Some(0.9),
            vwrs_breakdown: Some(VwrsBreakdown {
                total_weight: 0.1,
                weighted_error: 0.01,
                rows: vec![VwrsRow {
                    key: StratumKey::new(["US", "F"]),
                    population_proportion: 0.5,
                    sample_proportion: 0.4,
                    sample_count: 16,
                    standard_error: 0.12,
                    reliability: 0.75,
                    weight: 0.045,
                    absolute_deviation: 0.1,
                    gri_contribution: 0.05,
                    weighted_error: 0.0045,
                }],
            }),
            ..DimensionScore::default()
        };
        let failed = DimensionScore {
            dimension: "Religion".into(),
            error: Some("missing columns [\"religion\"]".into()),
            ..DimensionScore::default()
        };
        Scorecard {
            schema_version: SCHEMA_VERSION,
            generated_at: Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap(),
            participants_path: PathBuf::from("participants.csv"),
            participants: 40,
            rows: vec![ok, failed],
            overall: DimensionScore {
                dimension: "Overall (Average)".into(),
                gri: Some(0.75),
                ..DimensionScore::default()
            },
        }
    }

    #[test]
    fn json_roundtrip_and_version_gate() {
        let sc = scorecard();
        let json = export_scorecard_json(&sc).unwrap();
        assert_eq!(import_scorecard_json(&json).unwrap(), sc);

        let mut future = sc.clone();
        future.schema_version = SCHEMA_VERSION + 1;
        let json = export_scorecard_json(&future).unwrap();
        assert!(import_scorecard_json(&json).is_err());
    }

    #[test]
    fn scorecard_csv_has_overall_last() {
        let csv = export_scorecard_csv(&scorecard()).unwrap();
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines.len(), 4);
        assert!(lines[0].starts_with("dimension,columns,sample_size"));
        assert!(lines[1].contains("country;gender"));
        assert!(lines[1].contains("0.750000"));
        assert!(lines[3].starts_with("Overall (Average)"));
    }

    #[test]
    fn vwrs_csv_rows() {
        let sc = scorecard();
        let csv = export_vwrs_breakdown_csv(sc.rows[0].vwrs_breakdown.as_ref().unwrap()).unwrap();
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[1].starts_with("US × F,0.500000,0.400000,16,"));
    }

    #[test]
    fn report_lists_errors() {
        let md = generate_report(&scorecard());
        assert!(md.contains("| Country × Gender | 40 | 0.7500 |"));
        assert!(md.contains("## Errors"));
        assert!(md.contains("**Religion**"));
    }

    #[test]
    fn report_layout_and_data_quality() {
        let mut sc = scorecard();
        sc.rows[0].issues.push("benchmark total 0.9950 outside 1 ± 0.01".into());
        let md = generate_report(&sc);
        let lines: Vec<&str> = md.lines().collect();
        assert_eq!(lines[0], "# Representativeness Scorecard");
        assert_eq!(lines[1], "");
        assert!(lines[2].starts_with("Generated 2026-03-01 12:00:00 UTC"));
        assert!(md.contains("\n| Overall (Average) | 0 | 0.7500 |"));
        assert!(md.contains("- **Religion**: missing columns [\"religion\"]\n"));
        assert!(md.contains("## Data quality\n\n- Country × Gender: benchmark total 0.9950"));
        assert!(md.ends_with('\n'));
    }

    #[test]
    fn artifacts_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let sc = scorecard();
        let run_dir = save_artifacts(&sc, dir.path()).unwrap();
        assert!(run_dir.ends_with("scorecard_20260301_120000"));
        assert!(run_dir.join("scorecard.csv").exists());
        assert!(run_dir.join("scorecard.md").exists());
        assert!(run_dir.join("vwrs_country_gender.csv").exists());
        assert_eq!(load_artifacts(&run_dir).unwrap(), sc);
    }

    #[test]
    fn slugs() {
        assert_eq!(slug("Country × Gender × Age"), "country_gender_age");
        assert_eq!(slug("Overall (Average)"), "overall_average");
    }
}
