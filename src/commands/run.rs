//! Single-configuration run

use anyhow::Result;
use breakout_sweep::config::validate_params;
use breakout_sweep::{chart, data, report, SimulationOptions, Simulator, StrategyParams};
use std::path::PathBuf;
use std::time::Instant;
use tracing::{info, warn};

pub fn run(
    data_path: PathBuf,
    params: StrategyParams,
    start_index: Option<usize>,
    figure: bool,
    output_dir: String,
) -> Result<()> {
    info!("Starting single run");
    validate_params(&params)?;

    let series = data::load_csv(&data_path)?;
    let start_index = start_index.unwrap_or_else(|| params.required_lookback());

    let started = Instant::now();
    let result = Simulator::new(params, SimulationOptions::new(start_index).traced()).run(&series);
    let elapsed = started.elapsed();

    if !result.feasible {
        warn!(
            "Windows {}/{} do not fit before bar {} of {}; nothing was simulated",
            params.buy_window,
            params.sell_window,
            start_index,
            series.len()
        );
    }
    info!("{}", report::format_summary(&result));
    report::print_result("RUN RESULT", &result, Some(elapsed));

    if figure {
        if result.feasible {
            let path = chart::write_chart(&output_dir, &result)?;
            println!("Chart saved to: {}", path.display());
        } else {
            warn!("Skipping chart: run evaluated no bars");
        }
    }

    Ok(())
}
