//! Configuration management
//!
//! A sweep is configured from an optional JSON file; command-line flags
//! override individual values afterwards.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::error::SweepError;
use crate::grid::ParameterGrid;
use crate::StrategyParams;

/// Main sweep configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SweepConfig {
    /// Worker threads in the sweep pool
    pub workers: usize,
    pub start_coin: f64,
    pub start_cash: f64,
    /// Proportional fee charged on every conversion
    pub fee: f64,
    /// Smallest buy / sell window swept (inclusive)
    pub min_window: usize,
    /// Upper bound of the window span (exclusive)
    pub max_window: usize,
    /// First evaluated bar; defaults to the largest window so every run
    /// starts on the same bar
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_index: Option<usize>,
    pub debug: bool,
    /// Render the winning run as a chart
    pub figure: bool,
    /// Evaluate on the calling thread instead of the pool
    pub sequential: bool,
    pub output_dir: String,
    pub stop_percentages: Vec<f64>,
    pub go_percentages: Vec<f64>,
    pub bad_percentages: Vec<f64>,
    /// Grid overrides in `"axis=v1,v2"` form, applied last
    pub overrides: Vec<String>,
}

impl Default for SweepConfig {
    fn default() -> Self {
        let grid = ParameterGrid::default();
        SweepConfig {
            workers: std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1),
            start_coin: 0.0,
            start_cash: 1000.0,
            fee: 0.0,
            min_window: 7,
            max_window: 15,
            start_index: None,
            debug: false,
            figure: false,
            sequential: false,
            output_dir: ".".to_string(),
            stop_percentages: grid.stop_percentages,
            go_percentages: grid.go_percentages,
            bad_percentages: grid.bad_percentages,
            overrides: Vec::new(),
        }
    }
}

impl SweepConfig {
    /// Load configuration from JSON file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let contents = fs::read_to_string(path.as_ref()).context("Failed to read config file")?;
        let config: SweepConfig =
            serde_json::from_str(&contents).context("Failed to parse config JSON")?;
        Ok(config)
    }

    /// Grid of swept values: window span plus percentage axes, then overrides
    pub fn parameter_grid(&self) -> Result<ParameterGrid, SweepError> {
        let mut grid = ParameterGrid::from_window_span(self.min_window, self.max_window);
        grid.stop_percentages = self.stop_percentages.clone();
        grid.go_percentages = self.go_percentages.clone();
        grid.bad_percentages = self.bad_percentages.clone();
        grid.apply_overrides(&self.overrides)?;
        Ok(grid)
    }

    /// Holdings and fee shared by every combination
    pub fn base_params(&self) -> StrategyParams {
        StrategyParams {
            start_coin: self.start_coin,
            start_cash: self.start_cash,
            fee: self.fee,
            ..Default::default()
        }
    }

    /// Start bar for the sweep: explicit, else the window span's upper bound
    /// (raised if an override asks for a longer window).
    pub fn effective_start_index(&self, grid: &ParameterGrid) -> usize {
        self.start_index.unwrap_or_else(|| {
            self.max_window
                .max(grid.max_lookback().saturating_sub(1))
        })
    }

    fn overrides_axis(&self, axis: &str) -> bool {
        self.overrides
            .iter()
            .filter_map(|o| o.split_once('='))
            .any(|(key, _)| key.trim() == axis)
    }

    pub fn validate(&self) -> Result<(), SweepError> {
        if self.workers == 0 {
            return Err(SweepError::invalid("workers", "must be at least 1"));
        }
        // The span only feeds window axes that no override replaces
        if !(self.overrides_axis("buy_window") && self.overrides_axis("sell_window")) {
            if self.min_window == 0 {
                return Err(SweepError::invalid("min_window", "must be at least 1"));
            }
            if self.max_window <= self.min_window {
                return Err(SweepError::invalid(
                    "max_window",
                    format!(
                        "must be greater than min_window ({} <= {})",
                        self.max_window, self.min_window
                    ),
                ));
            }
        }
        validate_holdings(self.start_coin, self.start_cash, self.fee)?;
        self.parameter_grid()?.validate()
    }
}

/// Checks shared by sweeps and single runs.
///
/// Exactly one of coin / cash must be held at the start; the position state
/// machine is all-coin or all-cash.
pub fn validate_holdings(start_coin: f64, start_cash: f64, fee: f64) -> Result<(), SweepError> {
    for (field, value) in [("start_coin", start_coin), ("start_cash", start_cash)] {
        if !value.is_finite() || value < 0.0 {
            return Err(SweepError::invalid(
                field,
                format!("{} must be a finite, non-negative amount", value),
            ));
        }
    }
    if start_coin > 0.0 && start_cash > 0.0 {
        return Err(SweepError::invalid(
            "start_coin",
            "start with either coin or cash, not both",
        ));
    }
    if start_coin == 0.0 && start_cash == 0.0 {
        return Err(SweepError::invalid(
            "start_cash",
            "nothing to trade: start_coin and start_cash are both zero",
        ));
    }
    if !fee.is_finite() || !(0.0..1.0).contains(&fee) {
        return Err(SweepError::invalid("fee", format!("{} is outside [0, 1)", fee)));
    }
    Ok(())
}

/// Validate a single configuration for a one-off run
pub fn validate_params(params: &StrategyParams) -> Result<(), SweepError> {
    validate_holdings(params.start_coin, params.start_cash, params.fee)?;
    let grid = ParameterGrid {
        stop_percentages: vec![params.stop_percentage],
        buy_windows: vec![params.buy_window],
        sell_windows: vec![params.sell_window],
        go_percentages: vec![params.go_percentage],
        bad_percentages: vec![params.bad_percentage],
    };
    grid.validate()
}
