//! Simulation engine
//!
//! Runs one strategy configuration bar by bar over a [`PriceSeries`]. The
//! position is either all coin or all cash: a breakout above the trailing
//! high buys, a breakdown below the trailing low, the trailing stop or the
//! go price sells, and after a sell a dip under the bad price re-enters.

use tracing::debug;

use crate::indicators::TrailingRange;
use crate::{PriceSeries, RunResult, StrategyParams, Trace};

/// Per-invocation knobs that are not part of the strategy itself
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SimulationOptions {
    /// First bar evaluated; earlier bars only feed the trailing windows
    pub start_index: usize,
    /// Keep the full per-bar history in [`RunResult::trace`]
    pub trace: bool,
    /// Log every bar and every trade at debug level
    pub debug: bool,
}

impl SimulationOptions {
    pub fn new(start_index: usize) -> Self {
        SimulationOptions {
            start_index,
            trace: false,
            debug: false,
        }
    }

    pub fn traced(mut self) -> Self {
        self.trace = true;
        self
    }

    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Decision {
    Hold,
    Buy,
    Sell,
}

/// Holdings and the price levels that drive exits and re-entries
#[derive(Debug, Clone)]
struct Position {
    coin: f64,
    cash: f64,
    highest_price: f64,
    stop_price: f64,
    go_price: f64,
    bad_price: f64,
    last_buy_price: Option<f64>,
    last_sell_price: Option<f64>,
}

impl Position {
    fn new(params: &StrategyParams) -> Self {
        Position {
            coin: params.start_coin,
            cash: params.start_cash,
            highest_price: 0.0,
            stop_price: 0.0,
            go_price: 0.0,
            bad_price: 0.0,
            last_buy_price: None,
            last_sell_price: None,
        }
    }

    fn mark_to_market(&self, close: f64) -> f64 {
        self.coin * close + self.cash
    }

    fn step(
        &mut self,
        close: f64,
        min_range: f64,
        max_range: f64,
        params: &StrategyParams,
        ledger: &mut Ledger,
    ) -> Decision {
        if self.coin > 0.0 {
            if close > self.highest_price {
                self.highest_price = close;
            }
            self.stop_price = self.highest_price * (1.0 - params.stop_percentage);

            let take_profit = self.last_buy_price.is_some() && close >= self.go_price;
            if close <= min_range || close <= self.stop_price || take_profit {
                // Proceeds join any cash held alongside coin at start
                self.cash += self.coin * close * (1.0 - params.fee);
                self.coin = 0.0;
                self.bad_price = close * (1.0 + params.bad_percentage);
                ledger.record_sell(close, self.last_buy_price);
                self.last_sell_price = Some(close);
                return Decision::Sell;
            }
        } else if self.cash > 0.0 {
            let re_entry = self.last_sell_price.is_some() && close <= self.bad_price;
            if close >= max_range || re_entry {
                self.coin = self.cash / close * (1.0 - params.fee);
                self.cash = 0.0;
                self.highest_price = close;
                self.stop_price = close * (1.0 - params.stop_percentage);
                self.go_price = close * (1.0 + params.go_percentage);
                ledger.record_buy(close, self.last_sell_price);
                self.last_buy_price = Some(close);
                return Decision::Buy;
            }
        }

        Decision::Hold
    }
}

/// Trade counters and win / loss aggregates.
///
/// The individual win and loss amounts are kept only when `keep_trades` is
/// set; sweep runs need the means alone.
#[derive(Debug, Default)]
struct Ledger {
    trades: usize,
    buys: usize,
    sells: usize,
    buy_good: usize,
    buy_bad: usize,
    sell_good: usize,
    sell_bad: usize,
    win_total: f64,
    loss_total: f64,
    keep_trades: bool,
    wins: Vec<f64>,
    losses: Vec<f64>,
}

impl Ledger {
    fn new(keep_trades: bool) -> Self {
        Ledger {
            keep_trades,
            ..Default::default()
        }
    }

    fn record_sell(&mut self, close: f64, last_buy_price: Option<f64>) {
        self.trades += 1;
        self.sells += 1;
        if let Some(entry) = last_buy_price {
            let profit = close - entry;
            if profit >= 0.0 {
                self.sell_good += 1;
                self.win_total += profit;
                if self.keep_trades {
                    self.wins.push(profit);
                }
            } else {
                self.sell_bad += 1;
                self.loss_total += profit;
                if self.keep_trades {
                    self.losses.push(profit);
                }
            }
        }
    }

    fn record_buy(&mut self, close: f64, last_sell_price: Option<f64>) {
        self.trades += 1;
        self.buys += 1;
        if let Some(exit) = last_sell_price {
            if close - exit >= 0.0 {
                self.buy_good += 1;
            } else {
                self.buy_bad += 1;
            }
        }
    }

    fn avg_win(&self) -> f64 {
        mean(self.win_total, self.sell_good)
    }

    fn avg_loss(&self) -> f64 {
        mean(self.loss_total, self.sell_bad)
    }
}

fn mean(total: f64, count: usize) -> f64 {
    if count == 0 {
        0.0
    } else {
        total / count as f64
    }
}

/// `(coin + cash / close, coin * close + cash)`; zero without a price
fn valuation(coin: f64, cash: f64, close: Option<f64>) -> (f64, f64) {
    match close {
        Some(close) => (coin + cash / close, coin * close + cash),
        None => (0.0, 0.0),
    }
}

/// Simulation engine for a single configuration
#[derive(Debug, Clone)]
pub struct Simulator {
    params: StrategyParams,
    options: SimulationOptions,
}

impl Simulator {
    pub fn new(params: StrategyParams, options: SimulationOptions) -> Self {
        Simulator { params, options }
    }

    /// Whether both trailing windows fit inside the history available at the start bar
    pub fn is_feasible(&self, series: &PriceSeries) -> bool {
        let p = &self.params;
        let start = self.options.start_index;
        p.buy_window > 0
            && p.sell_window > 0
            && start < series.len()
            && start + 1 >= p.required_lookback()
    }

    /// Run the state machine over `series[start_index..]`
    pub fn run(&self, series: &PriceSeries) -> RunResult {
        if !self.is_feasible(series) {
            return self.infeasible(series);
        }
        let p = &self.params;
        let Some(mut range) = TrailingRange::new(p.buy_window, p.sell_window) else {
            return self.infeasible(series);
        };

        let start = self.options.start_index;
        let closes = series.closes();
        range.prime(&closes[start + 1 - p.required_lookback()..start]);

        let mut position = Position::new(p);
        let mut ledger = Ledger::new(self.options.trace);
        let mut trace = self
            .options
            .trace
            .then(|| Trace::with_capacity(series.len() - start));
        let mut close = closes[start];

        for bar in &series.bars()[start..] {
            close = bar.close;
            if let Some(t) = trace.as_mut() {
                t.close.push((bar.index, close));
                t.volume.push((bar.index, bar.volume));
                t.balance.push((bar.index, position.mark_to_market(close)));
            }

            let (min_range, max_range) = range.next(close);
            let decision = position.step(close, min_range, max_range, p, &mut ledger);

            if self.options.debug {
                match decision {
                    Decision::Buy => debug!(
                        "trade #{} buy {} coin at {} (high={}, low={})",
                        ledger.trades, position.coin, close, bar.high, bar.low
                    ),
                    Decision::Sell => debug!(
                        "trade #{} sell at {} for ${} (high={}, low={})",
                        ledger.trades, close, position.cash, bar.high, bar.low
                    ),
                    Decision::Hold => {}
                }
                debug!(
                    bar = bar.index,
                    close,
                    min_range,
                    max_range,
                    coin = position.coin,
                    cash = position.cash,
                    trades = ledger.trades,
                    ?decision,
                    "bar"
                );
            }

            if let Some(t) = trace.as_mut() {
                match decision {
                    Decision::Buy => t.buy_signals.push((bar.index, close)),
                    Decision::Sell => t.sell_signals.push((bar.index, close)),
                    Decision::Hold => {}
                }
                t.min_range.push((bar.index, min_range));
                t.max_range.push((bar.index, max_range));
                t.stop_price.push((bar.index, position.stop_price));
                t.go_price.push((bar.index, position.go_price));
                t.bad_price.push((bar.index, position.bad_price));
            }
        }

        let (final_balance, final_cash) =
            valuation(position.coin, position.cash, Some(close));

        RunResult {
            params: *p,
            feasible: true,
            bars_evaluated: series.len() - start,
            end_coin: position.coin,
            end_cash: position.cash,
            final_balance,
            final_cash,
            trades: ledger.trades,
            buys: ledger.buys,
            sells: ledger.sells,
            buy_good: ledger.buy_good,
            buy_bad: ledger.buy_bad,
            sell_good: ledger.sell_good,
            sell_bad: ledger.sell_bad,
            avg_win: ledger.avg_win(),
            avg_loss: ledger.avg_loss(),
            wins: ledger.wins,
            losses: ledger.losses,
            trace,
        }
    }

    /// Degenerate result: nothing traded, holdings valued at the last close
    fn infeasible(&self, series: &PriceSeries) -> RunResult {
        let p = &self.params;
        let (final_balance, final_cash) =
            valuation(p.start_coin, p.start_cash, series.last_close());

        RunResult {
            params: *p,
            feasible: false,
            end_coin: p.start_coin,
            end_cash: p.start_cash,
            final_balance,
            final_cash,
            trace: self.options.trace.then(Trace::default),
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn params(buy_window: usize, sell_window: usize) -> StrategyParams {
        StrategyParams {
            stop_percentage: 0.1,
            buy_window,
            sell_window,
            go_percentage: 1.0,
            bad_percentage: 1.0,
            start_coin: 0.0,
            start_cash: 1000.0,
            fee: 0.0,
        }
    }

    fn rising_series() -> PriceSeries {
        let closes: Vec<f64> = (0..20).map(|i| 100.0 + i as f64).collect();
        PriceSeries::from_closes(&closes)
    }

    #[test]
    fn test_monotonic_rise_buys_once_and_holds() {
        let series = rising_series();
        let sim = Simulator::new(params(3, 3), SimulationOptions::new(2).traced());
        let result = sim.run(&series);

        assert!(result.feasible);
        assert_eq!(result.trades, 1);
        assert_eq!(result.buys, 1);
        assert_eq!(result.sells, 0);
        assert_eq!(result.end_cash, 0.0);
        assert_relative_eq!(result.end_coin, 1000.0 / 102.0);
        assert_relative_eq!(result.final_cash, 1000.0 / 102.0 * 119.0);

        let trace = result.trace.unwrap();
        assert_eq!(trace.buy_signals, vec![(2, 102.0)]);
        assert!(trace.sell_signals.is_empty());
        assert_eq!(trace.close.len(), 18);
    }

    #[test]
    fn test_windows_beyond_history_are_degenerate() {
        let series = PriceSeries::from_closes(&[10.0; 10]);
        let sim = Simulator::new(params(1000, 1000), SimulationOptions::new(9));
        let result = sim.run(&series);

        assert!(!result.feasible);
        assert_eq!(result.trades, 0);
        assert_eq!(result.end_coin, 0.0);
        assert_eq!(result.end_cash, 1000.0);
        assert_eq!(result.final_cash, 1000.0);
        assert_eq!(result.bars_evaluated, 0);
    }

    #[test]
    fn test_start_past_end_is_degenerate() {
        let series = PriceSeries::from_closes(&[10.0, 11.0]);
        let result = Simulator::new(params(1, 1), SimulationOptions::new(2)).run(&series);
        assert!(!result.feasible);

        let empty = PriceSeries::default();
        let result = Simulator::new(params(1, 1), SimulationOptions::new(0)).run(&empty);
        assert!(!result.feasible);
        assert_eq!(result.end_cash, 1000.0);
        assert_eq!(result.final_cash, 0.0);
    }

    #[test]
    fn test_zero_window_is_degenerate() {
        let series = rising_series();
        let result = Simulator::new(params(0, 3), SimulationOptions::new(5)).run(&series);
        assert!(!result.feasible);
        assert_eq!(result.trades, 0);
    }

    #[test]
    fn test_trailing_stop_exit() {
        let series =
            PriceSeries::from_closes(&[100.0, 101.0, 102.0, 110.0, 120.0, 107.0, 112.0, 125.0]);
        let mut p = params(3, 4);
        p.go_percentage = 10.0;
        p.bad_percentage = 0.0;
        let result = Simulator::new(p, SimulationOptions::new(3).traced()).run(&series);

        let trace = result.trace.as_ref().unwrap();
        assert_eq!(trace.buy_signals, vec![(3, 110.0), (7, 125.0)]);
        assert_eq!(trace.sell_signals, vec![(5, 107.0)]);
        assert_eq!(result.trades, 3);
        assert_eq!(result.sell_bad, 1);
        assert_eq!(result.buy_good, 1);
        assert_eq!(result.losses, vec![-3.0]);
        assert_relative_eq!(result.avg_loss, -3.0);
        assert_relative_eq!(result.final_cash, 1000.0 * 107.0 / 110.0, epsilon = 1e-9);

        // stop follows the highest close: 110 * 0.9, then 120 * 0.9
        assert_relative_eq!(trace.stop_price[0].1, 99.0);
        assert_relative_eq!(trace.stop_price[1].1, 108.0);
    }

    #[test]
    fn test_go_price_takes_profit() {
        let series = PriceSeries::from_closes(&[100.0, 101.0, 102.0, 110.0, 115.0]);
        let mut p = params(3, 3);
        p.stop_percentage = 0.5;
        p.go_percentage = 0.1;
        let result = Simulator::new(p, SimulationOptions::new(2).traced()).run(&series);

        let trace = result.trace.as_ref().unwrap();
        assert_eq!(trace.sell_signals, vec![(4, 115.0)]);
        assert_eq!(result.sell_good, 1);
        assert_eq!(result.wins, vec![13.0]);
        assert_relative_eq!(result.avg_win, 13.0);
        assert_relative_eq!(result.end_cash, 1000.0 / 102.0 * 115.0, epsilon = 1e-9);
        assert_eq!(result.end_coin, 0.0);
    }

    #[test]
    fn test_breakdown_then_bad_price_re_entry() {
        let series = PriceSeries::from_closes(&[100.0, 101.0, 102.0, 101.5, 101.0]);
        let mut p = params(3, 2);
        p.stop_percentage = 0.5;
        p.go_percentage = 10.0;
        p.bad_percentage = 0.01;
        let result = Simulator::new(p, SimulationOptions::new(2).traced()).run(&series);

        let trace = result.trace.as_ref().unwrap();
        assert_eq!(trace.buy_signals, vec![(2, 102.0), (4, 101.0)]);
        assert_eq!(trace.sell_signals, vec![(3, 101.5)]);
        assert_eq!(result.trades, 3);
        assert_eq!(result.sell_bad, 1);
        assert_eq!(result.buy_bad, 1);
        assert_eq!(result.classified_trades(), 2);
        assert_relative_eq!(trace.bad_price[1].1, 101.5 * 1.01);
    }

    #[test]
    fn test_initial_coin_sells_without_classification() {
        let series = PriceSeries::from_closes(&[100.0, 99.0]);
        let p = StrategyParams {
            start_coin: 10.0,
            start_cash: 0.0,
            ..params(1, 2)
        };
        let result = Simulator::new(p, SimulationOptions::new(1)).run(&series);

        assert_eq!(result.trades, 1);
        assert_eq!(result.sells, 1);
        assert_eq!(result.classified_trades(), 0);
        assert_relative_eq!(result.end_cash, 990.0);
        assert_relative_eq!(result.final_balance, 10.0);
    }

    #[test]
    fn test_fee_reduces_conversion() {
        let series = rising_series();
        let p = StrategyParams {
            fee: 0.01,
            ..params(3, 3)
        };
        let result = Simulator::new(p, SimulationOptions::new(2)).run(&series);
        assert_relative_eq!(result.end_coin, 1000.0 / 102.0 * 0.99);
    }

    #[test]
    fn test_flat_series_never_changes_balance() {
        let series = PriceSeries::from_closes(&[50.0; 12]);
        let result = Simulator::new(params(3, 3), SimulationOptions::new(2).traced()).run(&series);

        assert!(result.trades > 0);
        assert_relative_eq!(result.final_cash, 1000.0);
        assert!(result.losses.is_empty());
        let trace = result.trace.unwrap();
        assert!(trace.balance.iter().all(|&(_, b)| (b - 1000.0).abs() < 1e-9));
    }

    #[test]
    fn test_both_holdings_sell_branch_keeps_cash() {
        let series = PriceSeries::from_closes(&[100.0, 90.0]);
        let p = StrategyParams {
            start_coin: 1.0,
            start_cash: 50.0,
            ..params(1, 2)
        };
        let result = Simulator::new(p, SimulationOptions::new(1)).run(&series);
        assert_eq!(result.sells, 1);
        assert_relative_eq!(result.end_cash, 140.0);
    }

    #[test]
    fn test_tracing_does_not_change_metrics() {
        let series =
            PriceSeries::from_closes(&[100.0, 103.0, 99.0, 105.0, 98.0, 110.0, 104.0, 95.0, 120.0]);
        let p = StrategyParams {
            stop_percentage: 0.05,
            go_percentage: 0.08,
            bad_percentage: 0.02,
            ..params(2, 2)
        };
        let plain = Simulator::new(p, SimulationOptions::new(1)).run(&series);
        let traced = Simulator::new(p, SimulationOptions::new(1).traced()).run(&series);

        assert!(plain.trace.is_none());
        assert_eq!(plain.final_cash.to_bits(), traced.final_cash.to_bits());
        assert_eq!(plain.trades, traced.trades);
        assert_eq!(plain.avg_win.to_bits(), traced.avg_win.to_bits());
        assert_eq!(plain.avg_loss.to_bits(), traced.avg_loss.to_bits());
    }

    #[test]
    fn test_untraced_run_keeps_only_aggregates() {
        let series =
            PriceSeries::from_closes(&[100.0, 101.0, 102.0, 110.0, 120.0, 107.0, 112.0, 125.0]);
        let mut p = params(3, 4);
        p.go_percentage = 10.0;
        p.bad_percentage = 0.0;

        let plain = Simulator::new(p, SimulationOptions::new(3)).run(&series);
        assert_eq!(plain.sell_bad, 1);
        assert!(plain.wins.is_empty());
        assert!(plain.losses.is_empty());
        assert_relative_eq!(plain.avg_loss, -3.0);

        let traced = Simulator::new(p, SimulationOptions::new(3).traced()).run(&series);
        assert_eq!(traced.losses, vec![-3.0]);
    }
}
