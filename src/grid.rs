//! Grid search parameter generation
//!
//! Enumerates the cross-product of the five swept axes into
//! [`StrategyParams`] values for the sweep.

use itertools::iproduct;
use serde::{Deserialize, Serialize};

use crate::error::SweepError;
use crate::StrategyParams;

/// Axis names accepted by [`ParameterGrid::apply_override`]
pub const AXES: &[&str] = &[
    "stop_percentage",
    "buy_window",
    "sell_window",
    "go_percentage",
    "bad_percentage",
];

/// Candidate values for every swept parameter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterGrid {
    pub stop_percentages: Vec<f64>,
    pub buy_windows: Vec<usize>,
    pub sell_windows: Vec<usize>,
    pub go_percentages: Vec<f64>,
    pub bad_percentages: Vec<f64>,
}

impl Default for ParameterGrid {
    fn default() -> Self {
        Self::from_window_span(7, 15)
    }
}

impl ParameterGrid {
    /// Default percentages with buy and sell windows spanning `min_window..max_window`
    pub fn from_window_span(min_window: usize, max_window: usize) -> Self {
        let windows: Vec<usize> = (min_window..max_window).collect();
        ParameterGrid {
            stop_percentages: vec![0.1, 0.2, 0.3],
            buy_windows: windows.clone(),
            sell_windows: windows,
            go_percentages: vec![0.1, 1.0, 2.0, 3.0, 4.0, 5.0],
            bad_percentages: vec![0.1, 1.0, 2.0, 3.0, 4.0, 5.0],
        }
    }

    pub fn total_combinations(&self) -> usize {
        self.stop_percentages.len()
            * self.buy_windows.len()
            * self.sell_windows.len()
            * self.go_percentages.len()
            * self.bad_percentages.len()
    }

    /// Largest window on either axis
    pub fn max_lookback(&self) -> usize {
        self.buy_windows
            .iter()
            .chain(&self.sell_windows)
            .copied()
            .max()
            .unwrap_or(0)
    }

    /// Every combination, holdings and fee taken from `base`.
    ///
    /// Nesting order is stop, buy window, sell window, go, bad; the sweep
    /// reports in this order.
    pub fn generate(&self, base: &StrategyParams) -> Vec<StrategyParams> {
        iproduct!(
            &self.stop_percentages,
            &self.buy_windows,
            &self.sell_windows,
            &self.go_percentages,
            &self.bad_percentages
        )
        .map(|(&stop, &buy, &sell, &go, &bad)| StrategyParams {
            stop_percentage: stop,
            buy_window: buy,
            sell_window: sell,
            go_percentage: go,
            bad_percentage: bad,
            ..*base
        })
        .collect()
    }

    /// Apply a CLI override of the form `"axis=v1,v2,v3"`
    pub fn apply_override(&mut self, input: &str) -> Result<(), SweepError> {
        let invalid = |reason: String| SweepError::InvalidOverride {
            input: input.to_string(),
            reason,
        };

        let (key, values) = input
            .split_once('=')
            .ok_or_else(|| invalid("expected `axis=v1,v2,...`".to_string()))?;
        let key = key.trim();
        let values: Vec<&str> = values
            .split(',')
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .collect();
        if values.is_empty() {
            return Err(invalid("no values given".to_string()));
        }

        match key {
            "stop_percentage" => self.stop_percentages = parse_values(&values).map_err(invalid)?,
            "buy_window" => self.buy_windows = parse_values(&values).map_err(invalid)?,
            "sell_window" => self.sell_windows = parse_values(&values).map_err(invalid)?,
            "go_percentage" => self.go_percentages = parse_values(&values).map_err(invalid)?,
            "bad_percentage" => self.bad_percentages = parse_values(&values).map_err(invalid)?,
            other => {
                return Err(invalid(format!(
                    "unknown axis `{}` (expected one of {})",
                    other,
                    AXES.join(", ")
                )))
            }
        }
        Ok(())
    }

    pub fn apply_overrides(&mut self, overrides: &[String]) -> Result<(), SweepError> {
        overrides.iter().try_for_each(|o| self.apply_override(o))
    }

    /// Structural checks run before any simulation
    pub fn validate(&self) -> Result<(), SweepError> {
        if self.total_combinations() == 0 {
            return Err(SweepError::EmptyGrid);
        }
        if self.buy_windows.iter().chain(&self.sell_windows).any(|&w| w == 0) {
            return Err(SweepError::invalid("window", "windows must be at least 1"));
        }
        if let Some(stop) = self
            .stop_percentages
            .iter()
            .find(|s| !s.is_finite() || **s < 0.0 || **s >= 1.0)
        {
            return Err(SweepError::invalid(
                "stop_percentage",
                format!("{} is outside [0, 1)", stop),
            ));
        }
        for (field, values) in [
            ("go_percentage", &self.go_percentages),
            ("bad_percentage", &self.bad_percentages),
        ] {
            if let Some(v) = values.iter().find(|v| !v.is_finite() || **v < 0.0) {
                return Err(SweepError::invalid(
                    field,
                    format!("{} must be a finite, non-negative fraction", v),
                ));
            }
        }
        Ok(())
    }
}

fn parse_values<T: std::str::FromStr>(values: &[&str]) -> Result<Vec<T>, String> {
    values
        .iter()
        .map(|v| v.parse().map_err(|_| format!("cannot parse `{}`", v)))
        .collect()
}

/// Format params for display
pub fn format_params(params: &StrategyParams) -> String {
    format!(
        "stop={} bw={} sw={} go={} bad={}",
        params.stop_percentage,
        params.buy_window,
        params.sell_window,
        params.go_percentage,
        params.bad_percentage
    )
}
