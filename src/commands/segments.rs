//! Segments command implementation

use anyhow::{Context, Result};
use breakout_sweep::{chart, data, segments};
use std::path::PathBuf;
use tracing::info;

pub fn run(data_path: PathBuf, output: Option<PathBuf>) -> Result<()> {
    let series = data::load_csv(&data_path)?;
    let found = segments::find_segments(&series)
        .with_context(|| format!("{} needs at least two bars", data_path.display()))?;
    info!("Segments: {:?}", found);

    println!("Bull Market #1: start sample = 0, end sample = {}", found.bull_end);
    println!(
        "Bear Market   : start sample = {}, end sample = {}",
        found.bull_end, found.bear_end
    );
    println!(
        "Bull Market #2: start sample = {}, end sample = {}",
        found.bear_end, found.last
    );

    if let Some(path) = output {
        chart::write_segments_chart(&path, &series, &found)?;
        info!("Segments chart written to {}", path.display());
        println!("Chart saved to: {}", path.display());
    }

    Ok(())
}
