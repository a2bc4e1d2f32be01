//! Parameter sweep
//!
//! Runs one simulation per grid combination on a fixed-size rayon pool,
//! collects the results in submission order, picks the best by ending cash
//! and re-runs the winner with full tracing.

use indicatif::ProgressBar;
use rayon::prelude::*;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::{Duration, Instant};
use tracing::{debug, info};

use crate::backtest::{SimulationOptions, Simulator};
use crate::config::SweepConfig;
use crate::error::SweepError;
use crate::grid::format_params;
use crate::{PriceSeries, RunResult, StrategyParams};

/// Everything a sweep produces
#[derive(Debug, Clone)]
pub struct SweepOutcome {
    /// One result per combination, in submission order, without traces
    pub results: Vec<RunResult>,
    /// Position of the winner in `results`
    pub best_index: usize,
    /// The winner re-run with tracing enabled
    pub best: RunResult,
    pub start_index: usize,
    pub elapsed: Duration,
}

/// Progress bar plus a throttled log line, shared by the workers
struct SweepProgress {
    bar: ProgressBar,
    total: usize,
    done: AtomicUsize,
    started: Instant,
    last_report_secs: AtomicU64,
}

impl SweepProgress {
    fn new(total: usize, bar: ProgressBar) -> Self {
        bar.set_length(total as u64);
        bar.enable_steady_tick(Duration::from_secs(1));
        SweepProgress {
            bar,
            total,
            done: AtomicUsize::new(0),
            started: Instant::now(),
            last_report_secs: AtomicU64::new(0),
        }
    }

    fn completed(&self) {
        self.bar.inc(1);
        let done = self.done.fetch_add(1, Ordering::Relaxed) + 1;

        let secs = self.started.elapsed().as_secs();
        let last = self.last_report_secs.load(Ordering::Relaxed);
        if secs > last
            && self
                .last_report_secs
                .compare_exchange(last, secs, Ordering::Relaxed, Ordering::Relaxed)
                .is_ok()
        {
            info!(
                "{:.3}s: {}/{} completed...",
                self.started.elapsed().as_secs_f64(),
                done,
                self.total
            );
        }
    }

    fn finish(&self) -> Duration {
        let elapsed = self.started.elapsed();
        self.bar.finish_with_message("done");
        info!(
            "{:.3}s: {}/{} completed",
            elapsed.as_secs_f64(),
            self.done.load(Ordering::Relaxed),
            self.total
        );
        elapsed
    }
}

/// Sweep orchestrator
pub struct Optimizer {
    config: SweepConfig,
}

impl Optimizer {
    pub fn new(config: SweepConfig) -> Self {
        Optimizer { config }
    }

    pub fn config(&self) -> &SweepConfig {
        &self.config
    }

    /// Run the sweep without a visible progress bar
    pub fn run(&self, series: &PriceSeries) -> Result<SweepOutcome, SweepError> {
        self.run_with_progress(series, ProgressBar::hidden())
    }

    /// Run the sweep, advancing `progress_bar` once per finished combination
    pub fn run_with_progress(
        &self,
        series: &PriceSeries,
        progress_bar: ProgressBar,
    ) -> Result<SweepOutcome, SweepError> {
        self.config.validate()?;
        let grid = self.config.parameter_grid()?;
        let combinations = grid.generate(&self.config.base_params());
        if combinations.is_empty() {
            return Err(SweepError::EmptyGrid);
        }

        let start_index = self.config.effective_start_index(&grid);
        let options = SimulationOptions::new(start_index).with_debug(self.config.debug);
        info!(
            "Testing {} parameter combinations on {} bars from bar {} ({})",
            combinations.len(),
            series.len(),
            start_index,
            if self.config.sequential {
                "sequential".to_string()
            } else {
                format!("{} workers", self.config.workers)
            }
        );

        let progress = SweepProgress::new(combinations.len(), progress_bar);
        let results = if self.config.sequential {
            evaluate_sequential(series, &combinations, options, &progress)
        } else {
            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(self.config.workers)
                .thread_name(|i| format!("sweep-worker-{}", i))
                .build()?;
            pool.install(|| evaluate_parallel(series, &combinations, options, &progress))
        };
        let elapsed = progress.finish();

        let best_index = select_best(&results).ok_or(SweepError::NoValidConfiguration {
            evaluated: results.len(),
        })?;
        let winner = results[best_index].params;
        info!(
            "Best configuration: {} final_cash={:.2}",
            format_params(&winner),
            results[best_index].final_cash
        );

        let best = Simulator::new(winner, options.traced()).run(series);

        Ok(SweepOutcome {
            results,
            best_index,
            best,
            start_index,
            elapsed,
        })
    }
}

fn evaluate_parallel(
    series: &PriceSeries,
    combinations: &[StrategyParams],
    options: SimulationOptions,
    progress: &SweepProgress,
) -> Vec<RunResult> {
    // Indexed collect keeps submission order whatever the completion order
    combinations
        .par_iter()
        .map(|params| {
            let result = Simulator::new(*params, options).run(series);
            progress.completed();
            result
        })
        .collect()
}

fn evaluate_sequential(
    series: &PriceSeries,
    combinations: &[StrategyParams],
    options: SimulationOptions,
    progress: &SweepProgress,
) -> Vec<RunResult> {
    combinations
        .iter()
        .map(|params| {
            let result = Simulator::new(*params, options).run(series);
            progress.completed();
            result
        })
        .collect()
}

/// Index of the result with the highest ending cash.
///
/// Infeasible runs and NaN metrics never qualify. A later result must be
/// strictly greater to replace the incumbent, so ties keep the first.
pub fn select_best(results: &[RunResult]) -> Option<usize> {
    let mut best: Option<(usize, f64)> = None;

    for (i, result) in results.iter().enumerate() {
        if !result.feasible || result.final_cash.is_nan() {
            continue;
        }
        match best {
            Some((_, incumbent)) if result.final_cash <= incumbent => {}
            _ => {
                debug!(
                    "found a better configuration: {} final_cash={}",
                    format_params(&result.params),
                    result.final_cash
                );
                best = Some((i, result.final_cash));
            }
        }
    }

    best.map(|(i, _)| i)
}

/// Indices of `results` ordered by the given metric, best first.
///
/// Metrics: `cash` (default), `balance`, `trades`, `avg_win`. The sort is
/// stable, so equal values stay in submission order.
pub fn rank_results(results: &[RunResult], sort_by: &str) -> Vec<usize> {
    let metric = |r: &RunResult| match sort_by {
        "balance" => r.final_balance,
        "trades" => r.trades as f64,
        "avg_win" => r.avg_win,
        _ => r.final_cash,
    };

    let mut order: Vec<usize> = (0..results.len()).filter(|&i| results[i].feasible).collect();
    order.sort_by(|&a, &b| {
        metric(&results[b])
            .partial_cmp(&metric(&results[a]))
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    order
}
