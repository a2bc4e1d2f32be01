//! Rolling extrema powered by the `ta` crate
//!
//! The breakout and breakdown triggers compare the current close with the
//! highest / lowest close of a trailing window that includes the current bar.

use ta::indicators::{Maximum, Minimum};
use ta::Next;

/// Incremental breakout / breakdown range for one run.
///
/// `max_range` spans `buy_window` closes and `min_range` spans `sell_window`
/// closes, both ending at the bar last passed to [`TrailingRange::next`].
#[derive(Debug, Clone)]
pub struct TrailingRange {
    max: Maximum,
    min: Minimum,
}

impl TrailingRange {
    /// Returns `None` for a zero-length window.
    pub fn new(buy_window: usize, sell_window: usize) -> Option<Self> {
        Some(TrailingRange {
            max: Maximum::new(buy_window).ok()?,
            min: Minimum::new(sell_window).ok()?,
        })
    }

    /// Feed history that precedes the first evaluated bar.
    pub fn prime(&mut self, history: &[f64]) {
        for &close in history {
            self.max.next(close);
            self.min.next(close);
        }
    }

    /// Push the current close and return `(min_range, max_range)`.
    pub fn next(&mut self, close: f64) -> (f64, f64) {
        let max_range = self.max.next(close);
        let min_range = self.min.next(close);
        (min_range, max_range)
    }
}
