//! Result reporting
//!
//! Flattens [`RunResult`]s into summary rows, prints the ranked table and the
//! winner, and exports every row to CSV.

use anyhow::{Context, Result};
use serde::Serialize;
use std::path::Path;
use std::time::Duration;

use crate::grid::format_params;
use crate::optimizer::rank_results;
use crate::RunResult;

/// One row of sweep output
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunSummary {
    pub stop_percentage: f64,
    pub buy_window: usize,
    pub sell_window: usize,
    pub go_percentage: f64,
    pub bad_percentage: f64,
    pub start_coin: f64,
    pub start_cash: f64,
    pub feasible: bool,
    pub end_coin: f64,
    pub end_cash: f64,
    pub final_balance: f64,
    pub final_cash: f64,
    pub trades: usize,
    pub buy_good: usize,
    pub buy_bad: usize,
    pub sell_good: usize,
    pub sell_bad: usize,
    pub avg_win: f64,
    pub avg_loss: f64,
}

impl From<&RunResult> for RunSummary {
    fn from(r: &RunResult) -> Self {
        RunSummary {
            stop_percentage: r.params.stop_percentage,
            buy_window: r.params.buy_window,
            sell_window: r.params.sell_window,
            go_percentage: r.params.go_percentage,
            bad_percentage: r.params.bad_percentage,
            start_coin: r.params.start_coin,
            start_cash: r.params.start_cash,
            feasible: r.feasible,
            end_coin: r.end_coin,
            end_cash: r.end_cash,
            final_balance: r.final_balance,
            final_cash: r.final_cash,
            trades: r.trades,
            buy_good: r.buy_good,
            buy_bad: r.buy_bad,
            sell_good: r.sell_good,
            sell_bad: r.sell_bad,
            avg_win: r.avg_win,
            avg_loss: r.avg_loss,
        }
    }
}

/// Single-line summary used for the per-combination log
pub fn format_summary(r: &RunResult) -> String {
    format!(
        "{} start_coin={} start_cash={} end_coin={:.6} end_cash={:.2} \
         final_balance={:.6} final_cash={:.2} trades={} \
         buy_good={} buy_bad={} sell_good={} sell_bad={} avg_win={:.4} avg_loss={:.4}{}",
        format_params(&r.params),
        r.params.start_coin,
        r.params.start_cash,
        r.end_coin,
        r.end_cash,
        r.final_balance,
        r.final_cash,
        r.trades,
        r.buy_good,
        r.buy_bad,
        r.sell_good,
        r.sell_bad,
        r.avg_win,
        r.avg_loss,
        if r.feasible { "" } else { " (infeasible)" }
    )
}

/// Print the `top` best feasible results ranked by `sort_by`
pub fn print_top(results: &[RunResult], sort_by: &str, top: usize) {
    let order = rank_results(results, sort_by);
    let display_count = top.min(order.len());

    println!("\n{}", "=".repeat(110));
    println!(
        "TOP {} OF {} CONFIGURATIONS (sorted by {})",
        display_count,
        results.len(),
        sort_by
    );
    println!("{}", "=".repeat(110));
    println!(
        "{:<4} {:>12} {:>12} {:>6} {:>9} {:>9} {:>10} {:>10} | Parameters",
        "Rank", "FinalCash", "FinalCoin", "Trades", "Buy G/B", "Sell G/B", "AvgWin", "AvgLoss"
    );
    println!("{}", "-".repeat(110));

    for (rank, &i) in order.iter().take(top).enumerate() {
        let r = &results[i];
        println!(
            "{:<4} {:>12.2} {:>12.6} {:>6} {:>9} {:>9} {:>10.4} {:>10.4} | {}",
            rank + 1,
            r.final_cash,
            r.final_balance,
            r.trades,
            format!("{}/{}", r.buy_good, r.buy_bad),
            format!("{}/{}", r.sell_good, r.sell_bad),
            r.avg_win,
            r.avg_loss,
            format_params(&r.params)
        );
    }
    println!("{}", "=".repeat(110));
}

/// Print one result under `title`
pub fn print_result(title: &str, result: &RunResult, elapsed: Option<Duration>) {
    let p = &result.params;
    println!("\n{}", "=".repeat(60));
    println!("{}", title);
    println!("{}", "=".repeat(60));
    println!("Stop Percentage:    {}", p.stop_percentage);
    println!("Buy Window:         {}", p.buy_window);
    println!("Sell Window:        {}", p.sell_window);
    println!("Go Percentage:      {}", p.go_percentage);
    println!("Bad Percentage:     {}", p.bad_percentage);
    if !result.feasible {
        println!("Feasible:           no (windows do not fit before the start bar)");
    }
    println!("Final Cash:         {:.2}", result.final_cash);
    println!("Final Balance:      {:.6}", result.final_balance);
    println!("Total Trades:       {}", result.trades);
    println!("Buy Good/Bad:       {}/{}", result.buy_good, result.buy_bad);
    println!("Sell Good/Bad:      {}/{}", result.sell_good, result.sell_bad);
    println!("Average Win:        {:.4}", result.avg_win);
    println!("Average Loss:       {:.4}", result.avg_loss);
    if let Some(elapsed) = elapsed {
        println!("Elapsed Time:       {:.3}s", elapsed.as_secs_f64());
    }
    println!("{}", "=".repeat(60));
}

/// Write one CSV row per result, in the order given
pub fn write_results_csv(path: impl AsRef<Path>, results: &[RunResult]) -> Result<()> {
    let path = path.as_ref();
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("Failed to create results file {}", path.display()))?;
    for result in results {
        writer
            .serialize(RunSummary::from(result))
            .context("Failed to write result row")?;
    }
    writer.flush().context("Failed to flush results file")?;
    Ok(())
}
