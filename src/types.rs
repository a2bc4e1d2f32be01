//! Core data types used across the simulator and the sweep

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Validation errors for bar data
#[derive(Debug, Error)]
pub enum BarValidationError {
    #[error("close ({0}) must be positive")]
    NonPositiveClose(f64),

    #[error("high ({high}) must be >= low ({low})")]
    HighLessThanLow { high: f64, low: f64 },

    #[error("volume ({0}) must be >= 0")]
    NegativeVolume(f64),
}

/// One OHLCV sample. `index` is the position in its series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub index: usize,
    pub datetime: Option<DateTime<Utc>>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl Bar {
    /// Create a new bar with validation
    pub fn new(
        index: usize,
        datetime: Option<DateTime<Utc>>,
        open: f64,
        high: f64,
        low: f64,
        close: f64,
        volume: f64,
    ) -> Result<Self, BarValidationError> {
        let bar = Self {
            index,
            datetime,
            open,
            high,
            low,
            close,
            volume,
        };
        bar.validate()?;
        Ok(bar)
    }

    /// Only the columns the simulation and the charts depend on are checked.
    /// Open may sit outside the high / low range, as some exports round it.
    pub fn validate(&self) -> Result<(), BarValidationError> {
        if self.close <= 0.0 {
            return Err(BarValidationError::NonPositiveClose(self.close));
        }
        if self.high < self.low {
            return Err(BarValidationError::HighLessThanLow {
                high: self.high,
                low: self.low,
            });
        }
        if self.volume < 0.0 {
            return Err(BarValidationError::NegativeVolume(self.volume));
        }
        Ok(())
    }
}

/// Immutable, time-ordered bar table shared read-only by every simulation.
///
/// The close column is kept contiguous next to the bars because every run
/// windows over it.
#[derive(Debug, Clone, Default)]
pub struct PriceSeries {
    bars: Vec<Bar>,
    closes: Vec<f64>,
}

impl PriceSeries {
    /// Build a series, renumbering `index` to the sequence position.
    pub fn new(mut bars: Vec<Bar>) -> Self {
        for (i, bar) in bars.iter_mut().enumerate() {
            bar.index = i;
        }
        let closes = bars.iter().map(|b| b.close).collect();
        PriceSeries { bars, closes }
    }

    /// Synthetic series where open, high, low and close are all the given close.
    pub fn from_closes(closes: &[f64]) -> Self {
        let bars = closes
            .iter()
            .enumerate()
            .map(|(index, &close)| Bar {
                index,
                datetime: None,
                open: close,
                high: close,
                low: close,
                close,
                volume: 0.0,
            })
            .collect();
        Self::new(bars)
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn bars(&self) -> &[Bar] {
        &self.bars
    }

    pub fn closes(&self) -> &[f64] {
        &self.closes
    }

    pub fn last_close(&self) -> Option<f64> {
        self.closes.last().copied()
    }
}

/// One strategy configuration
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StrategyParams {
    /// Trailing-stop drawdown tolerance (fraction)
    pub stop_percentage: f64,
    /// Lookback for breakout-high detection
    pub buy_window: usize,
    /// Lookback for breakdown-low detection
    pub sell_window: usize,
    /// Target excess over the last buy price before taking profit
    pub go_percentage: f64,
    /// Tolerance band over the last sell price for re-entry
    pub bad_percentage: f64,
    pub start_coin: f64,
    pub start_cash: f64,
    /// Proportional fee charged on every conversion
    #[serde(default)]
    pub fee: f64,
}

impl Default for StrategyParams {
    fn default() -> Self {
        StrategyParams {
            stop_percentage: 0.1,
            buy_window: 14,
            sell_window: 14,
            go_percentage: 1.0,
            bad_percentage: 1.0,
            start_coin: 0.0,
            start_cash: 1000.0,
            fee: 0.0,
        }
    }
}

impl StrategyParams {
    /// Bars of history the trailing windows need, the current bar included.
    pub fn required_lookback(&self) -> usize {
        self.buy_window.max(self.sell_window)
    }
}

/// `(bar index, value)` sample of a traced quantity
pub type Point = (usize, f64);

/// Full per-bar history of one run, kept only when tracing is requested
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Trace {
    pub balance: Vec<Point>,
    pub close: Vec<Point>,
    pub volume: Vec<Point>,
    pub buy_signals: Vec<Point>,
    pub sell_signals: Vec<Point>,
    pub min_range: Vec<Point>,
    pub max_range: Vec<Point>,
    pub stop_price: Vec<Point>,
    pub go_price: Vec<Point>,
    pub bad_price: Vec<Point>,
}

impl Trace {
    pub fn with_capacity(bars: usize) -> Self {
        Trace {
            balance: Vec::with_capacity(bars),
            close: Vec::with_capacity(bars),
            volume: Vec::with_capacity(bars),
            buy_signals: Vec::new(),
            sell_signals: Vec::new(),
            min_range: Vec::with_capacity(bars),
            max_range: Vec::with_capacity(bars),
            stop_price: Vec::with_capacity(bars),
            go_price: Vec::with_capacity(bars),
            bad_price: Vec::with_capacity(bars),
        }
    }
}

/// Aggregated outcome of one simulation run
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunResult {
    pub params: StrategyParams,
    /// False when the windows could not fit before the start index
    pub feasible: bool,
    pub bars_evaluated: usize,
    pub end_coin: f64,
    pub end_cash: f64,
    /// Holdings valued in coin: `coin + cash / close`
    pub final_balance: f64,
    /// Holdings valued in cash: `coin * close + cash`
    pub final_cash: f64,
    pub trades: usize,
    pub buys: usize,
    pub sells: usize,
    pub buy_good: usize,
    pub buy_bad: usize,
    pub sell_good: usize,
    pub sell_bad: usize,
    /// Profit of every winning sell; filled only for traced runs
    pub wins: Vec<f64>,
    /// Loss of every losing sell; filled only for traced runs
    pub losses: Vec<f64>,
    pub avg_win: f64,
    pub avg_loss: f64,
    #[serde(skip)]
    pub trace: Option<Trace>,
}

impl RunResult {
    /// Number of trades that had a reference price to be judged against
    pub fn classified_trades(&self) -> usize {
        self.buy_good + self.buy_bad + self.sell_good + self.sell_bad
    }
}
