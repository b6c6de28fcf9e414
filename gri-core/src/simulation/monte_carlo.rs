use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};

use super::sampling::generate_optimal_sample;
use super::{normalize, SimulationConfig, SimulationError};
use crate::domain::Benchmark;
use crate::rng::trial_seed;
use crate::stats::ScoreSummary;

/// Aggregated ceiling scores for one benchmark at one sample size.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationResult {
    pub sample_size: u64,
    pub n_simulations: usize,
    pub completed_simulations: usize,
    /// True when cancellation stopped the run before every trial finished.
    pub partial: bool,
    pub total_strata: usize,
    pub relevant_strata: usize,
    pub threshold: f64,
    pub max_gri: ScoreSummary,
    pub max_diversity: ScoreSummary,
}

/// Relevance threshold inside simulations: `1/N`, or 0 when `N = 0`.
pub fn simulation_threshold(sample_size: u64) -> f64 {
    if sample_size > 0 {
        1.0 / sample_size as f64
    } else {
        0.0
    }
}

/// GRI of integer `counts` against `proportions`; 0.0 when no units.
pub fn max_gri(proportions: &[f64], counts: &[u64]) -> f64 {
    let total: u64 = counts.iter().sum();
    if total == 0 {
        return 0.0;
    }
    let n = total as f64;
    let tvd = 0.5
        * proportions
            .iter()
            .zip(counts)
            .map(|(&p, &c)| (c as f64 / n - p).abs())
            .sum::<f64>();
    1.0 - tvd
}

/// Share of strata with `p > threshold` that hold at least one unit.
///
/// Returns 0.0 when no stratum is relevant.
pub fn max_diversity(proportions: &[f64], counts: &[u64], threshold: f64) -> f64 {
    let mut relevant = 0usize;
    let mut covered = 0usize;
    for (&p, &c) in proportions.iter().zip(counts) {
        if p > threshold {
            relevant += 1;
            if c > 0 {
                covered += 1;
            }
        }
    }
    if relevant == 0 {
        return 0.0;
    }
    covered as f64 / relevant as f64
}

/// The scores of one finished trial, as reported to [`TrialHooks::on_trial`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrialOutcome {
    pub trial: usize,
    pub max_gri: f64,
    pub max_diversity: f64,
}

/// Optional controls for a Monte Carlo run.
///
/// - `pool`: run trials on this pool instead of building one from `threads`
/// - `cancel`: checked before each trial; once set, remaining trials are skipped
/// - `on_trial`: called after every completed trial, from the worker that ran it
#[derive(Clone, Copy, Default)]
pub struct TrialHooks<'a> {
    pub pool: Option<&'a rayon::ThreadPool>,
    pub cancel: Option<&'a AtomicBool>,
    pub on_trial: Option<&'a (dyn Fn(&TrialOutcome) + Sync)>,
}

/// A dedicated pool for `threads > 1`, `None` for sequential runs.
pub fn build_thread_pool(threads: usize) -> Result<Option<rayon::ThreadPool>, SimulationError> {
    if threads <= 1 {
        return Ok(None);
    }
    rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build()
        .map(Some)
        .map_err(|e| SimulationError::ThreadPool(e.to_string()))
}

/// Run `config.n_simulations` independent trials at `sample_size`.
///
/// Trial `i` draws with seed `config.seed + i`. With `threads > 1` trials
/// run on a dedicated pool; scores are gathered in trial order either way.
/// Once `cancel` is set, trials not yet started are skipped and the result
/// is marked partial. Errors name the benchmark's dimension.
pub fn monte_carlo_max_scores(
    benchmark: &Benchmark,
    sample_size: u64,
    config: &SimulationConfig,
    cancel: Option<&AtomicBool>,
) -> Result<SimulationResult, SimulationError> {
    let hooks = TrialHooks {
        cancel,
        ..TrialHooks::default()
    };
    monte_carlo_with_hooks(benchmark, sample_size, config, hooks)
}

/// [`monte_carlo_max_scores`] with an optional shared pool and a per-trial callback.
pub fn monte_carlo_with_hooks(
    benchmark: &Benchmark,
    sample_size: u64,
    config: &SimulationConfig,
    hooks: TrialHooks<'_>,
) -> Result<SimulationResult, SimulationError> {
    run_trials(benchmark, sample_size, config, hooks)
        .map_err(|e| e.in_dimension(&benchmark.dimension().name))
}

fn run_trials(
    benchmark: &Benchmark,
    sample_size: u64,
    config: &SimulationConfig,
    hooks: TrialHooks<'_>,
) -> Result<SimulationResult, SimulationError> {
    if config.n_simulations == 0 {
        return Err(SimulationError::NoTrials);
    }
    let proportions = normalize(&benchmark.proportions(), sample_size)?;
    let threshold = simulation_threshold(sample_size);

    let run_trial = |i: usize| -> Result<Option<(f64, f64)>, SimulationError> {
        if hooks.cancel.is_some_and(|f| f.load(Ordering::Relaxed)) {
            return Ok(None);
        }
        let seed = trial_seed(config.seed, i as u64);
        let counts = generate_optimal_sample(&proportions, sample_size, seed)?;
        let outcome = TrialOutcome {
            trial: i,
            max_gri: max_gri(&proportions, &counts),
            max_diversity: max_diversity(&proportions, &counts, threshold),
        };
        if let Some(cb) = hooks.on_trial {
            cb(&outcome);
        }
        Ok(Some((outcome.max_gri, outcome.max_diversity)))
    };

    let run_parallel = |pool: &rayon::ThreadPool| {
        pool.install(|| {
            (0..config.n_simulations)
                .into_par_iter()
                .map(run_trial)
                .collect::<Result<Vec<_>, _>>()
        })
    };

    let owned_pool = match hooks.pool {
        Some(_) => None,
        None => build_thread_pool(config.threads)?,
    };
    let trials: Vec<Option<(f64, f64)>> = match hooks.pool.or(owned_pool.as_ref()) {
        Some(pool) => run_parallel(pool)?,
        None => (0..config.n_simulations)
            .map(run_trial)
            .collect::<Result<_, _>>()?,
    };

    let (gri_scores, diversity_scores): (Vec<f64>, Vec<f64>) = trials.into_iter().flatten().unzip();
    if gri_scores.is_empty() {
        return Err(SimulationError::Cancelled);
    }

    Ok(SimulationResult {
        sample_size,
        n_simulations: config.n_simulations,
        completed_simulations: gri_scores.len(),
        partial: gri_scores.len() < config.n_simulations,
        total_strata: proportions.len(),
        relevant_strata: proportions.iter().filter(|&&p| p > threshold).count(),
        threshold,
        max_gri: ScoreSummary::from_values(&gri_scores),
        max_diversity: ScoreSummary::from_values(&diversity_scores),
    })
}

/// Expected ceiling GRI at `sample_size`: the mean over all trials.
pub fn max_possible_gri(
    benchmark: &Benchmark,
    sample_size: u64,
    config: &SimulationConfig,
) -> Result<f64, SimulationError> {
    Ok(monte_carlo_max_scores(benchmark, sample_size, config, None)?
        .max_gri
        .mean)
}

/// `actual / max`, capped at 1; 0.0 when `max <= 0`.
pub fn efficiency_ratio(actual: f64, max: f64) -> f64 {
    if max <= 0.0 {
        return 0.0;
    }
    (actual / max).min(1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Dimension;
    use std::sync::Mutex;

    fn bench(pairs: &[(&str, f64)]) -> Benchmark {
        Benchmark::from_pairs(Dimension::new("Country", ["country"]), pairs.iter().copied())
            .unwrap()
    }

    fn long_tail() -> Benchmark {
        let mut pairs: Vec<(String, f64)> = vec![("Big".into(), 0.6)];
        pairs.extend((0..200).map(|i| (format!("T{i}"), 0.002)));
        Benchmark::from_pairs(
            Dimension::new("Country", ["country"]),
            pairs.iter().map(|(k, p)| (k.as_str(), *p)),
        )
        .unwrap()
    }

    fn config(n: usize, threads: usize) -> SimulationConfig {
        SimulationConfig {
            n_simulations: n,
            seed: 42,
            threads,
        }
    }

    #[test]
    fn max_gri_of_exact_counts() {
        assert_eq!(max_gri(&[0.5, 0.5], &[5, 5]), 1.0);
        assert!((max_gri(&[0.6, 0.4], &[0, 100]) - 0.4).abs() < 1e-12);
        assert_eq!(max_gri(&[1.0], &[0]), 0.0);
    }

    #[test]
    fn max_diversity_without_relevant_strata_is_zero() {
        assert_eq!(max_diversity(&[0.01, 0.01], &[1, 0], 0.5), 0.0);
        assert_eq!(max_diversity(&[0.6, 0.4], &[1, 0], 0.1), 0.5);
    }

    #[test]
    fn divisible_benchmark_reaches_perfect_ceiling() {
        let b = bench(&[("A", 0.5), ("B", 0.3), ("C", 0.2)]);
        let r = monte_carlo_max_scores(&b, 100, &config(50, 1), None).unwrap();
        assert_eq!(r.max_gri.mean, 1.0);
        assert_eq!(r.max_gri.std, 0.0);
        assert_eq!(r.max_diversity.mean, 1.0);
        assert_eq!(r.completed_simulations, 50);
        assert!(!r.partial);
        assert_eq!(r.threshold, 0.01);
        assert_eq!((r.total_strata, r.relevant_strata), (3, 3));
    }

    #[test]
    fn long_tail_caps_the_ceiling() {
        let r = monte_carlo_max_scores(&long_tail(), 100, &config(200, 1), None).unwrap();
        assert!(r.max_gri.mean < 1.0);
        assert!(r.max_gri.min <= r.max_gri.q25 && r.max_gri.q75 <= r.max_gri.max);
        // Only "Big" clears 1/N = 0.01.
        assert_eq!(r.relevant_strata, 1);
        assert_eq!(r.max_diversity.mean, 1.0);
    }

    #[test]
    fn parallel_matches_sequential() {
        let b = long_tail();
        let seq = monte_carlo_max_scores(&b, 150, &config(64, 1), None).unwrap();
        let par = monte_carlo_max_scores(&b, 150, &config(64, 4), None).unwrap();
        assert_eq!(seq, par);
    }

    #[test]
    fn reproducible_across_runs() {
        let b = long_tail();
        let a = monte_carlo_max_scores(&b, 80, &config(30, 1), None).unwrap();
        let c = monte_carlo_max_scores(&b, 80, &config(30, 1), None).unwrap();
        assert_eq!(a, c);
    }

    #[test]
    fn cancelled_before_start() {
        let flag = AtomicBool::new(true);
        let err = monte_carlo_max_scores(&long_tail(), 50, &config(10, 1), Some(&flag)).unwrap_err();
        assert_eq!(err.cause(), &SimulationError::Cancelled);
        assert!(err.to_string().contains("Country"));
    }

    fn gri_of(outcomes: &[TrialOutcome]) -> Vec<f64> {
        outcomes.iter().map(|o| o.max_gri).collect()
    }

    fn diversity_of(outcomes: &[TrialOutcome]) -> Vec<f64> {
        outcomes.iter().map(|o| o.max_diversity).collect()
    }

    #[test]
    fn cancel_mid_run_summarizes_completed_trials_only() {
        let b = long_tail();
        let flag = AtomicBool::new(false);
        let seen = Mutex::new(Vec::new());
        let on_trial: &(dyn Fn(&TrialOutcome) + Sync) = &|o| {
            let mut seen = seen.lock().unwrap();
            seen.push(*o);
            if seen.len() == 7 {
                flag.store(true, Ordering::Relaxed);
            }
        };
        let hooks = TrialHooks {
            cancel: Some(&flag),
            on_trial: Some(on_trial),
            ..TrialHooks::default()
        };
        let r = monte_carlo_with_hooks(&b, 100, &config(50, 1), hooks).unwrap();

        assert!(r.partial);
        assert_eq!(r.n_simulations, 50);
        assert_eq!(r.completed_simulations, 7);
        let seen = seen.into_inner().unwrap();
        assert_eq!(
            seen.iter().map(|o| o.trial).collect::<Vec<_>>(),
            (0..7).collect::<Vec<_>>()
        );
        assert_eq!(r.max_gri, ScoreSummary::from_values(&gri_of(&seen)));
        assert_eq!(r.max_diversity, ScoreSummary::from_values(&diversity_of(&seen)));

        // Same trials as an uncancelled seven-trial run.
        let full = monte_carlo_max_scores(&b, 100, &config(7, 1), None).unwrap();
        assert_eq!(r.max_gri, full.max_gri);
        assert!(!full.partial);
    }

    #[test]
    fn cancel_mid_run_on_pool() {
        let b = long_tail();
        let flag = AtomicBool::new(false);
        let seen = Mutex::new(Vec::new());
        let on_trial: &(dyn Fn(&TrialOutcome) + Sync) = &|o| {
            seen.lock().unwrap().push(*o);
            flag.store(true, Ordering::Relaxed);
        };
        let hooks = TrialHooks {
            cancel: Some(&flag),
            on_trial: Some(on_trial),
            ..TrialHooks::default()
        };
        let r = monte_carlo_with_hooks(&b, 100, &config(400, 4), hooks).unwrap();

        let mut seen = seen.into_inner().unwrap();
        seen.sort_by_key(|o| o.trial);
        assert!(r.partial);
        assert!(r.completed_simulations > 0 && r.completed_simulations < 400);
        assert_eq!(r.completed_simulations, seen.len());
        assert_eq!(r.max_gri, ScoreSummary::from_values(&gri_of(&seen)));
        assert_eq!(r.max_diversity, ScoreSummary::from_values(&diversity_of(&seen)));
    }

    #[test]
    fn shared_pool_matches_sequential() {
        let b = long_tail();
        let pool = build_thread_pool(3).unwrap();
        assert!(pool.is_some());
        assert!(build_thread_pool(1).unwrap().is_none());
        let hooks = TrialHooks {
            pool: pool.as_ref(),
            ..TrialHooks::default()
        };
        let pooled = monte_carlo_with_hooks(&b, 150, &config(64, 1), hooks).unwrap();
        let seq = monte_carlo_max_scores(&b, 150, &config(64, 1), None).unwrap();
        assert_eq!(pooled, seq);
    }

    #[test]
    fn degenerate_benchmark_errors_name_the_dimension() {
        let zero = bench(&[("A", 0.0), ("B", 0.0)]);
        let err = monte_carlo_max_scores(&zero, 100, &SimulationConfig::default(), None).unwrap_err();
        assert!(err.to_string().contains("Country"));
        assert!(matches!(err.cause(), SimulationError::ZeroMass { .. }));

        let empty = Benchmark::new(Dimension::new("Country", ["country"]), vec![]).unwrap();
        let err = monte_carlo_max_scores(&empty, 10, &config(5, 1), None).unwrap_err();
        assert_eq!(
            err,
            SimulationError::Dimension {
                dimension: "Country".into(),
                source: Box::new(SimulationError::NoStrata { sample_size: 10 }),
            }
        );
    }

    #[test]
    fn ceiling_is_computed_on_rescaled_benchmark() {
        // Sums to 0.995; the simulation sees 0.5/0.995 etc.
        let drifted = bench(&[("A", 0.5), ("B", 0.3), ("C", 0.195)]);
        let rescaled = bench(&[("A", 0.5 / 0.995), ("B", 0.3 / 0.995), ("C", 0.195 / 0.995)]);
        let a = monte_carlo_max_scores(&drifted, 60, &config(30, 1), None).unwrap();
        let b = monte_carlo_max_scores(&rescaled, 60, &config(30, 1), None).unwrap();
        assert!((a.max_gri.mean - b.max_gri.mean).abs() < 1e-12);
        assert!((a.max_gri.max - b.max_gri.max).abs() < 1e-12);
        assert_eq!(a.max_diversity.mean, b.max_diversity.mean);
        assert_eq!(a.relevant_strata, b.relevant_strata);
    }

    #[test]
    fn zero_trials_rejected() {
        let b = bench(&[("A", 1.0)]);
        let err = monte_carlo_max_scores(&b, 10, &config(0, 1), None).unwrap_err();
        assert_eq!(err.cause(), &SimulationError::NoTrials);
    }

    #[test]
    fn efficiency() {
        assert_eq!(efficiency_ratio(0.45, 0.9), 0.5);
        assert_eq!(efficiency_ratio(0.95, 0.9), 1.0);
        assert_eq!(efficiency_ratio(0.5, 0.0), 0.0);
    }

    #[test]
    fn max_possible_gri_is_the_mean() {
        let b = long_tail();
        let c = config(40, 1);
        let r = monte_carlo_max_scores(&b, 120, &c, None).unwrap();
        assert_eq!(max_possible_gri(&b, 120, &c).unwrap(), r.max_gri.mean);
    }
}
