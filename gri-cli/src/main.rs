//! GRI CLI: scorecards, ceilings, allocation and benchmark simplification.
//!
//! Commands:
//! - `score`: score a participant CSV on every dimension of a TOML config
//! - `max-scores`: Monte Carlo ceiling curve for a benchmark across sample sizes
//! - `allocate`: Neyman allocation of a target sample size
//! - `simplify`: merge small benchmark strata into "Others"

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use gri_core::allocation::{compare_allocation_methods, optimal_allocation};
use gri_core::domain::{Dimension, KEY_SEPARATOR};
use gri_core::simplify::{analyze_simplification_impact, simplify_benchmark, SimplificationPolicy};
use gri_core::simulation::{generate_sample_size_curve, SimulationConfig};
use gri_core::validation::validate_benchmark;
use gri_runner::data_loader::write_benchmark_csv;
use gri_runner::export::{export_allocation_csv, export_curve_csv, save_artifacts};
use gri_runner::{build_scorecard, load_benchmark, load_variances, Scorecard, ScorecardConfig};

#[derive(Parser)]
#[command(
    name = "gri",
    about = "GRI CLI: representativeness scoring for survey samples"
)]
struct Cli {
    /// Log filter used when RUST_LOG is unset (e.g. info, debug, gri_runner=trace).
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Score a participant CSV on every dimension of a scorecard config.
    Score {
        /// Path to the scorecard TOML.
        #[arg(long)]
        config: PathBuf,

        /// Participant CSV, one row per respondent.
        #[arg(long)]
        sample: PathBuf,

        /// Output directory for scorecard artifacts.
        #[arg(long, default_value = "results")]
        output_dir: PathBuf,
    },
    /// Expected maximum GRI and Diversity across sample sizes.
    MaxScores {
        #[command(flatten)]
        benchmark: BenchmarkArgs,

        /// Comma-separated sample sizes (e.g. 100,500,1000).
        #[arg(long, value_delimiter = ',', required = true)]
        sizes: Vec<u64>,

        #[arg(long, default_value_t = 1000)]
        simulations: usize,

        #[arg(long, default_value_t = 42)]
        seed: u64,

        /// Worker threads for the trial loop.
        #[arg(long, default_value_t = 1)]
        threads: usize,

        /// Write the curve as CSV.
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Neyman allocation of a target sample size.
    Allocate {
        #[command(flatten)]
        benchmark: BenchmarkArgs,

        /// Target total sample size.
        #[arg(long)]
        n: u64,

        /// Optional `stratum,variance` CSV.
        #[arg(long)]
        variances: Option<PathBuf>,

        /// Also print proportional vs square-root allocation.
        #[arg(long)]
        compare: bool,

        /// Write the plan as CSV.
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Merge small benchmark strata into a single "Others" stratum.
    Simplify {
        #[command(flatten)]
        benchmark: BenchmarkArgs,

        #[command(flatten)]
        policy: PolicyArgs,

        #[arg(long, default_value = "Others")]
        others_label: String,

        /// Write the simplified benchmark as CSV.
        #[arg(long)]
        output: Option<PathBuf>,
    },
}

#[derive(Args)]
struct BenchmarkArgs {
    /// Benchmark CSV with the dimension columns and population_proportion.
    #[arg(long)]
    benchmark: PathBuf,

    /// Comma-separated dimension columns (e.g. country,gender).
    #[arg(long, value_delimiter = ',', required = true)]
    columns: Vec<String>,
}

impl BenchmarkArgs {
    fn dimension(&self) -> Dimension {
        Dimension::new(self.columns.join(KEY_SEPARATOR), self.columns.iter().cloned())
    }
}

#[derive(Args)]
#[group(required = true, multiple = false)]
struct PolicyArgs {
    /// Keep the N largest strata.
    #[arg(long)]
    top_n: Option<usize>,

    /// Keep strata with proportion >= T.
    #[arg(long)]
    threshold: Option<f64>,

    /// Keep the largest strata until cumulative proportion reaches C.
    #[arg(long)]
    min_coverage: Option<f64>,
}

impl PolicyArgs {
    fn policy(&self) -> Result<SimplificationPolicy> {
        match (self.top_n, self.threshold, self.min_coverage) {
            (Some(n), None, None) => Ok(SimplificationPolicy::TopN(n)),
            (None, Some(t), None) => Ok(SimplificationPolicy::Threshold(t)),
            (None, None, Some(c)) => Ok(SimplificationPolicy::MinCoverage(c)),
            _ => bail!("exactly one of --top-n, --threshold or --min-coverage is required"),
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level)))
        .init();

    match cli.command {
        Commands::Score {
            config,
            sample,
            output_dir,
        } => run_score(&config, &sample, &output_dir),
        Commands::MaxScores {
            benchmark,
            sizes,
            simulations,
            seed,
            threads,
            output,
        } => {
            let config = SimulationConfig {
                n_simulations: simulations,
                seed,
                threads,
            };
            run_max_scores(&benchmark, &sizes, &config, output.as_deref())
        }
        Commands::Allocate {
            benchmark,
            n,
            variances,
            compare,
            output,
        } => run_allocate(&benchmark, n, variances.as_deref(), compare, output.as_deref()),
        Commands::Simplify {
            benchmark,
            policy,
            others_label,
            output,
        } => run_simplify(&benchmark, policy.policy()?, &others_label, output.as_deref()),
    }
}

fn run_score(config_path: &Path, sample: &Path, output_dir: &Path) -> Result<()> {
    let config = ScorecardConfig::from_file(config_path)?;
    let scorecard = build_scorecard(&config, sample)?;
    print_scorecard(&scorecard);

    let run_dir = save_artifacts(&scorecard, output_dir)?;
    println!("Artifacts saved to: {}", run_dir.display());
    Ok(())
}

fn fmt_opt(v: Option<f64>) -> String {
    v.map(|x| format!("{x:.4}")).unwrap_or_else(|| "-".to_string())
}

fn print_scorecard(scorecard: &Scorecard) {
    println!(
        "{:<32} {:>6} {:>8} {:>9} {:>8} {:>8} {:>8}",
        "Dimension", "N", "GRI", "Diversity", "SRI", "VWRS", "Max GRI"
    );
    for row in scorecard.rows.iter().chain(std::iter::once(&scorecard.overall)) {
        println!(
            "{:<32} {:>6} {:>8} {:>9} {:>8} {:>8} {:>8}",
            row.dimension,
            row.sample_size,
            fmt_opt(row.gri),
            fmt_opt(row.diversity),
            fmt_opt(row.sri),
            fmt_opt(row.vwrs),
            fmt_opt(row.max_gri),
        );
    }
    for row in scorecard.failed() {
        eprintln!("Error for {}: {}", row.dimension, row.error.as_deref().unwrap_or(""));
    }
}

fn load(args: &BenchmarkArgs) -> Result<gri_core::Benchmark> {
    let dimension = args.dimension();
    let benchmark = load_benchmark(&args.benchmark, &dimension)?;
    for issue in validate_benchmark(&benchmark) {
        tracing::warn!(%issue, "benchmark issue");
    }
    info!(strata = benchmark.len(), dimension = %dimension, "benchmark loaded");
    Ok(benchmark)
}

fn write_output(path: Option<&Path>, content: &str) -> Result<()> {
    if let Some(path) = path {
        std::fs::write(path, content).with_context(|| format!("failed to write {}", path.display()))?;
        println!("Written to: {}", path.display());
    }
    Ok(())
}

fn run_max_scores(
    args: &BenchmarkArgs,
    sizes: &[u64],
    config: &SimulationConfig,
    output: Option<&Path>,
) -> Result<()> {
    let benchmark = load(args)?;
    info!(
        sizes = sizes.len(),
        simulations = config.n_simulations,
        threads = config.threads,
        "running ceiling simulations"
    );
    let curve = generate_sample_size_curve(&benchmark, sizes, config)?;

    println!(
        "{:>8} {:>10} {:>8} {:>10} {:>8} {:>9}",
        "N", "Max GRI", "± std", "Max Div", "± std", "Relevant"
    );
    for p in &curve {
        println!(
            "{:>8} {:>10.4} {:>8.4} {:>10.4} {:>8.4} {:>5}/{:<3}",
            p.sample_size,
            p.max_gri_mean,
            p.max_gri_std,
            p.max_diversity_mean,
            p.max_diversity_std,
            p.relevant_strata,
            p.total_strata
        );
    }
    write_output(output, &export_curve_csv(&curve)?)
}

fn run_allocate(
    args: &BenchmarkArgs,
    n: u64,
    variances: Option<&Path>,
    compare: bool,
    output: Option<&Path>,
) -> Result<()> {
    let benchmark = load(args)?;
    let variances = variances
        .map(|p| load_variances(p, benchmark.dimension()))
        .transpose()?;
    let plan = optimal_allocation(&benchmark, n, variances.as_ref())?;

    println!("{:<40} {:>8}", "Stratum", "Count");
    for a in &plan.rows {
        println!("{:<40} {:>8}", a.key.joined(), a.count);
    }
    println!("{:<40} {:>8}", "Total", plan.total());

    if compare {
        println!();
        println!(
            "{:<40} {:>10} {:>12} {:>10} {:>8}",
            "Stratum", "Proportional", "Square-root", "Diff", "Boost"
        );
        for row in compare_allocation_methods(&benchmark, n) {
            println!(
                "{:<40} {:>10} {:>12} {:>+10} {:>8}",
                row.key.joined(),
                row.proportional_n,
                row.strategic_n,
                row.difference,
                row.strategic_boost
                    .map(|b| format!("{b:.2}x"))
                    .unwrap_or_else(|| "-".to_string()),
            );
        }
    }
    write_output(output, &export_allocation_csv(&plan)?)
}

fn run_simplify(
    args: &BenchmarkArgs,
    policy: SimplificationPolicy,
    others_label: &str,
    output: Option<&Path>,
) -> Result<()> {
    let benchmark = load(args)?;
    let simplified = simplify_benchmark(&benchmark, policy, others_label)?;
    let impact = analyze_simplification_impact(&benchmark, &simplified, others_label);

    for s in simplified.strata() {
        println!("{:<40} {:>10.6}", s.key.joined(), s.population_proportion);
    }
    println!(
        "\n{} → {} strata ({:.1}% reduction), \"{}\" holds {:.2}% of the population",
        impact.original_strata,
        impact.simplified_strata,
        impact.reduction_ratio * 100.0,
        others_label,
        impact.others_proportion * 100.0
    );
    write_output(output, &write_benchmark_csv(&simplified)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn simplify_requires_exactly_one_policy() {
        let base = ["gri", "simplify", "--benchmark", "b.csv", "--columns", "country"];
        assert!(Cli::try_parse_from(base).is_err());
        assert!(Cli::try_parse_from(base.iter().chain(&["--top-n", "3", "--threshold", "0.1"])).is_err());

        let cli = Cli::try_parse_from(base.iter().chain(&["--min-coverage", "0.9"])).unwrap();
        match cli.command {
            Commands::Simplify { policy, .. } => {
                assert_eq!(policy.policy().unwrap(), SimplificationPolicy::MinCoverage(0.9));
            }
            _ => panic!("expected simplify"),
        }
    }

    #[test]
    fn max_scores_parses_lists() {
        let cli = Cli::try_parse_from([
            "gri",
            "max-scores",
            "--benchmark",
            "b.csv",
            "--columns",
            "country,gender",
            "--sizes",
            "100,500",
            "--log-level",
            "debug",
        ])
        .unwrap();
        assert_eq!(cli.log_level, "debug");
        match cli.command {
            Commands::MaxScores {
                benchmark, sizes, simulations, ..
            } => {
                assert_eq!(sizes, vec![100, 500]);
                assert_eq!(simulations, 1000);
                assert_eq!(benchmark.dimension().name, "country × gender");
            }
            _ => panic!("expected max-scores"),
        }
    }
}
