//! Sweep command implementation with progress tracking and grid overrides

use anyhow::Result;
use breakout_sweep::optimizer::Optimizer;
use breakout_sweep::{chart, data, report, SweepConfig};
use clap::Args;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;
use tracing::info;

#[derive(Args, Debug)]
pub struct SweepArgs {
    /// OHLCV CSV file
    #[arg(short, long)]
    pub data: PathBuf,

    /// JSON configuration file; flags below override its values
    #[arg(short, long)]
    pub config: Option<String>,

    /// Worker threads
    #[arg(short, long)]
    pub workers: Option<usize>,

    /// Initial coin holdings
    #[arg(long)]
    pub start_coin: Option<f64>,

    /// Initial cash holdings
    #[arg(long)]
    pub start_cash: Option<f64>,

    /// Smallest buy / sell window (inclusive)
    #[arg(long)]
    pub min_window: Option<usize>,

    /// Largest buy / sell window (exclusive)
    #[arg(long)]
    pub max_window: Option<usize>,

    /// First evaluated bar (default: max window)
    #[arg(long)]
    pub start_index: Option<usize>,

    /// Proportional fee per conversion
    #[arg(long)]
    pub fee: Option<f64>,

    /// Log every bar and trade of every run
    #[arg(long)]
    pub debug: bool,

    /// Write an SVG chart of the best run
    #[arg(long)]
    pub figure: bool,

    /// Replace one grid axis, e.g. "stop_percentage=0.05,0.1". Repeatable
    #[arg(short = 'O', long = "override")]
    pub overrides: Vec<String>,

    /// Sort the table by metric (cash, balance, trades, avg_win)
    #[arg(long, default_value = "cash")]
    pub sort_by: String,

    /// Number of top results to show
    #[arg(short, long, default_value = "10")]
    pub top: usize,

    /// Export every result to this CSV file
    #[arg(long)]
    pub results: Option<PathBuf>,

    /// Directory for the chart
    #[arg(long)]
    pub output_dir: Option<String>,

    /// Run sequentially instead of parallel
    #[arg(long)]
    pub sequential: bool,
}

impl SweepArgs {
    /// Layer the command-line flags over `config`
    fn apply(&self, config: &mut SweepConfig) {
        if let Some(workers) = self.workers {
            info!("Overriding workers to: {}", workers);
            config.workers = workers;
        }
        if let Some(start_coin) = self.start_coin {
            config.start_coin = start_coin;
        }
        if let Some(start_cash) = self.start_cash {
            config.start_cash = start_cash;
        }
        if let Some(min_window) = self.min_window {
            config.min_window = min_window;
        }
        if let Some(max_window) = self.max_window {
            config.max_window = max_window;
        }
        if self.start_index.is_some() {
            config.start_index = self.start_index;
        }
        if let Some(fee) = self.fee {
            config.fee = fee;
        }
        if let Some(output_dir) = &self.output_dir {
            config.output_dir = output_dir.clone();
        }
        config.debug |= self.debug;
        config.figure |= self.figure;
        config.sequential |= self.sequential;
        config.overrides.extend(self.overrides.iter().cloned());
    }
}

pub fn run(args: SweepArgs) -> Result<()> {
    info!("Starting sweep");

    let mut config = match &args.config {
        Some(path) => {
            let config = SweepConfig::from_file(path)?;
            info!("Loaded configuration from: {}", path);
            config
        }
        None => SweepConfig::default(),
    };
    args.apply(&mut config);
    config.validate()?;

    let grid = config.parameter_grid()?;
    let series = data::load_csv(&args.data)?;
    let total = grid.total_combinations();

    println!("\n{}", "=".repeat(70));
    println!("SWEEP SUMMARY");
    println!("{}", "=".repeat(70));
    println!("  Data:          {} ({} bars)", args.data.display(), series.len());
    println!(
        "  Windows:       {}..{} (buy and sell)",
        config.min_window, config.max_window
    );
    println!("  Start bar:     {}", config.effective_start_index(&grid));
    println!("  Parameters:    {} combinations", total);
    println!(
        "  Mode:          {}",
        if config.sequential {
            "sequential".to_string()
        } else {
            format!("parallel ({} workers)", config.workers)
        }
    );
    println!("{}\n", "=".repeat(70));

    let pb = ProgressBar::new(total as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("⚡ {percent:>3}%|{bar:40}| {pos}/{len} [{elapsed}<{eta}, {per_sec:.2}] ✓ {msg}")?
            .progress_chars("█░ "),
    );

    let optimizer = Optimizer::new(config);
    let outcome = optimizer.run_with_progress(&series, pb)?;
    println!();

    for result in &outcome.results {
        info!("{}", report::format_summary(result));
    }
    info!("Best: {}", report::format_summary(&outcome.best));

    report::print_top(&outcome.results, &args.sort_by, args.top);
    report::print_result("BEST CONFIGURATION", &outcome.best, Some(outcome.elapsed));

    if let Some(path) = &args.results {
        report::write_results_csv(path, &outcome.results)?;
        println!("Results written to: {}", path.display());
    }

    let config = optimizer.config();
    if config.figure {
        let path = chart::write_chart(&config.output_dir, &outcome.best)?;
        println!("Chart saved to: {}", path.display());
    }

    info!("Sweep completed successfully");

    Ok(())
}
