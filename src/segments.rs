//! Bull / bear / bull market segmentation
//!
//! Splits a series at the highest close of its first half and the lowest
//! close of its second half. Useful for picking sub-ranges to sweep on.

use serde::Serialize;

use crate::PriceSeries;

/// Segment boundaries as bar indices
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MarketSegments {
    /// Last bar of the first bull run (max close of the first half)
    pub bull_end: usize,
    /// Last bar of the bear run (min close of the second half)
    pub bear_end: usize,
    /// Final bar of the series
    pub last: usize,
}

/// Index of the first occurrence of the extreme value picked by `better`
fn first_extreme(values: &[f64], offset: usize, better: impl Fn(f64, f64) -> bool) -> usize {
    let mut best = 0;
    for (i, &v) in values.iter().enumerate().skip(1) {
        if better(v, values[best]) {
            best = i;
        }
    }
    offset + best
}

/// `None` when the series has fewer than two bars
pub fn find_segments(series: &PriceSeries) -> Option<MarketSegments> {
    let closes = series.closes();
    if closes.len() < 2 {
        return None;
    }

    let half = closes.len() / 2;
    let (first, second) = closes.split_at(half);

    Some(MarketSegments {
        bull_end: first_extreme(first, 0, |a, b| a > b),
        bear_end: first_extreme(second, half, |a, b| a < b),
        last: closes.len() - 1,
    })
}
