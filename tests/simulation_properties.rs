//! Property tests for the simulation engine

use breakout_sweep::{PriceSeries, RunResult, SimulationOptions, Simulator, StrategyParams};
use proptest::prelude::*;

fn arb_params() -> impl Strategy<Value = StrategyParams> {
    (
        0.0f64..0.9,
        1usize..12,
        1usize..12,
        0.0f64..3.0,
        0.0f64..3.0,
        prop::bool::ANY,
        0.0f64..0.01,
    )
        .prop_map(|(stop, buy, sell, go, bad, start_in_coin, fee)| StrategyParams {
            stop_percentage: stop,
            buy_window: buy,
            sell_window: sell,
            go_percentage: go,
            bad_percentage: bad,
            start_coin: if start_in_coin { 5.0 } else { 0.0 },
            start_cash: if start_in_coin { 0.0 } else { 1000.0 },
            fee,
        })
}

fn arb_closes() -> impl Strategy<Value = Vec<f64>> {
    prop::collection::vec(1.0f64..500.0, 2..80)
}

fn run(params: StrategyParams, closes: &[f64], start: usize, traced: bool) -> RunResult {
    let mut options = SimulationOptions::new(start);
    if traced {
        options = options.traced();
    }
    Simulator::new(params, options).run(&PriceSeries::from_closes(closes))
}

proptest! {
    #[test]
    fn position_is_all_coin_or_all_cash(
        params in arb_params(),
        closes in arb_closes(),
        start in 0usize..20,
    ) {
        // Every prefix ends on a bar boundary, so checking each prefix checks each bar
        for end in 1..=closes.len() {
            let result = run(params, &closes[..end], start, false);
            prop_assert!(result.end_coin == 0.0 || result.end_cash == 0.0);
        }
    }

    #[test]
    fn trade_accounting(
        params in arb_params(),
        closes in arb_closes(),
        start in 0usize..20,
    ) {
        let result = run(params, &closes, start, true);
        let trace = result.trace.as_ref().unwrap();

        prop_assert_eq!(result.trades, result.buys + result.sells);
        prop_assert_eq!(
            result.trades,
            trace.buy_signals.len() + trace.sell_signals.len()
        );
        prop_assert!(result.classified_trades() <= result.trades);
        prop_assert_eq!(result.wins.len() + result.losses.len(), result.sell_good + result.sell_bad);

        if result.feasible {
            prop_assert_eq!(trace.close.len(), closes.len() - start);
            prop_assert_eq!(trace.balance.len(), trace.close.len());
        } else {
            prop_assert_eq!(result.trades, 0);
            prop_assert_eq!(result.end_coin, params.start_coin);
            prop_assert_eq!(result.end_cash, params.start_cash);
        }
    }

    #[test]
    fn buys_and_sells_alternate(
        params in arb_params(),
        closes in arb_closes(),
        start in 0usize..20,
    ) {
        let result = run(params, &closes, start, true);
        let trace = result.trace.as_ref().unwrap();

        let mut markers: Vec<(usize, bool)> = trace
            .buy_signals
            .iter()
            .map(|&(bar, _)| (bar, true))
            .chain(trace.sell_signals.iter().map(|&(bar, _)| (bar, false)))
            .collect();
        markers.sort();

        let mut holding_coin = params.start_coin > 0.0;
        for (_, is_buy) in markers {
            prop_assert_eq!(is_buy, !holding_coin);
            holding_coin = is_buy;
        }
    }

    #[test]
    fn tracing_does_not_change_metrics(
        params in arb_params(),
        closes in arb_closes(),
        start in 0usize..20,
    ) {
        let plain = run(params, &closes, start, false);
        let traced = run(params, &closes, start, true);

        prop_assert!(plain.trace.is_none());
        prop_assert_eq!(plain.final_cash.to_bits(), traced.final_cash.to_bits());
        prop_assert_eq!(plain.final_balance.to_bits(), traced.final_balance.to_bits());
        prop_assert_eq!(plain.trades, traced.trades);
        prop_assert_eq!(plain.avg_win.to_bits(), traced.avg_win.to_bits());
        prop_assert_eq!(plain.avg_loss.to_bits(), traced.avg_loss.to_bits());
        prop_assert!(plain.wins.is_empty() && plain.losses.is_empty());
    }

    #[test]
    fn runs_are_idempotent(
        params in arb_params(),
        closes in arb_closes(),
        start in 0usize..20,
    ) {
        let first = run(params, &closes, start, false);
        let second = run(params, &closes, start, false);

        prop_assert_eq!(first.final_cash.to_bits(), second.final_cash.to_bits());
        prop_assert_eq!(first.end_coin.to_bits(), second.end_coin.to_bits());
        prop_assert_eq!(first.trades, second.trades);
        prop_assert_eq!(first.buy_good, second.buy_good);
        prop_assert_eq!(first.sell_bad, second.sell_bad);
    }

    #[test]
    fn flat_series_keeps_balance(
        params in arb_params(),
        price in 1.0f64..500.0,
        len in 2usize..60,
    ) {
        let params = StrategyParams { fee: 0.0, ..params };
        let closes = vec![price; len];
        let result = run(params, &closes, params.required_lookback(), true);
        let start_value = params.start_coin * price + params.start_cash;

        prop_assert!((result.final_cash - start_value).abs() <= start_value * 1e-9);
        prop_assert!(result.losses.is_empty());
    }
}
