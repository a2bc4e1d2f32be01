//! Breakout sweep - main entry point
//!
//! This binary provides three subcommands:
//! - sweep: Run the parallel parameter sweep
//! - run: Simulate a single configuration with full tracing
//! - segments: Report the bull / bear / bull boundaries of a series

use anyhow::Result;
use breakout_sweep::SweepError;
use clap::error::ErrorKind;
use clap::{CommandFactory, Parser, Subcommand};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod commands;

#[derive(Parser, Debug)]
#[command(name = "breakout-sweep")]
#[command(about = "Breakout / trailing-stop strategy simulation and parameter sweep", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Sweep every parameter combination and report the best
    Sweep(commands::sweep::SweepArgs),

    /// Simulate one configuration
    Run {
        /// OHLCV CSV file
        #[arg(short, long)]
        data: PathBuf,

        /// Breakout lookback in bars
        #[arg(long)]
        buy_window: usize,

        /// Breakdown lookback in bars
        #[arg(long)]
        sell_window: usize,

        /// Trailing-stop drawdown tolerance (fraction)
        #[arg(long)]
        stop: f64,

        /// Take-profit excess over the last buy price (fraction)
        #[arg(long)]
        go: f64,

        /// Re-entry band over the last sell price (fraction)
        #[arg(long)]
        bad: f64,

        /// Initial coin holdings
        #[arg(long, default_value = "0")]
        start_coin: f64,

        /// Initial cash holdings
        #[arg(long, default_value = "1000")]
        start_cash: f64,

        /// Proportional fee per conversion
        #[arg(long, default_value = "0")]
        fee: f64,

        /// First evaluated bar (default: the larger window)
        #[arg(long)]
        start_index: Option<usize>,

        /// Write an SVG chart of the run
        #[arg(long)]
        figure: bool,

        /// Directory for the chart
        #[arg(long, default_value = ".")]
        output_dir: String,
    },

    /// Print bull / bear / bull market boundaries
    Segments {
        /// OHLCV CSV file
        #[arg(short, long)]
        data: PathBuf,

        /// Write a candlestick chart of the segments to this SVG file
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

fn setup_logging(verbose: bool, command_name: &str, file_only: bool) -> Result<()> {
    // Create logs directory
    std::fs::create_dir_all("logs")?;

    // Create log file with naming pattern: {command}_{date}.log
    let log_filename = format!(
        "{}_{}.log",
        command_name,
        chrono::Local::now().format("%Y-%m-%d_%H-%M-%S")
    );
    let log_path = PathBuf::from("logs").join(&log_filename);

    let level = if verbose { "debug" } else { "info" };
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let file_appender = tracing_appender::rolling::never("logs", &log_filename);

    if file_only {
        // Sweep: only log to file, keep console clean for progress bar
        let file_layer = tracing_subscriber::fmt::layer()
            .with_writer(file_appender)
            .with_target(true)
            .with_thread_names(true)
            .with_line_number(true)
            .with_file(true)
            .with_ansi(false);

        tracing_subscriber::registry()
            .with(env_filter)
            .with(file_layer)
            .init();

        eprintln!("Log file: {}", log_path.display());
    } else {
        let console_layer = tracing_subscriber::fmt::layer()
            .with_target(true)
            .with_thread_ids(false)
            .with_thread_names(false)
            .with_line_number(true)
            .with_file(true)
            .with_ansi(true);

        let file_layer = tracing_subscriber::fmt::layer()
            .with_writer(file_appender)
            .with_target(true)
            .with_line_number(true)
            .with_file(true)
            .with_ansi(false);

        tracing_subscriber::registry()
            .with(env_filter)
            .with(console_layer)
            .with(file_layer)
            .init();

        info!("Logging initialized");
        info!("Log file: {}", log_path.display());
    }

    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Sweep's --debug needs debug-level output to show its per-bar lines
    let (command_name, file_only, verbose) = match &cli.command {
        Commands::Sweep(args) => ("sweep", true, cli.verbose || args.debug),
        Commands::Run { .. } => ("run", false, cli.verbose),
        Commands::Segments { .. } => ("segments", false, cli.verbose),
    };

    setup_logging(verbose, command_name, file_only)?;

    let outcome = match cli.command {
        Commands::Sweep(args) => commands::sweep::run(args),

        Commands::Run {
            data,
            buy_window,
            sell_window,
            stop,
            go,
            bad,
            start_coin,
            start_cash,
            fee,
            start_index,
            figure,
            output_dir,
        } => commands::run::run(
            data,
            breakout_sweep::StrategyParams {
                stop_percentage: stop,
                buy_window,
                sell_window,
                go_percentage: go,
                bad_percentage: bad,
                start_coin,
                start_cash,
                fee,
            },
            start_index,
            figure,
            output_dir,
        ),

        Commands::Segments { data, output } => commands::segments::run(data, output),
    };

    // Configuration mistakes are usage errors (exit 2); everything else exits 1
    if let Err(err) = &outcome {
        if let Some(sweep_err) = err.downcast_ref::<SweepError>() {
            if sweep_err.is_configuration() {
                Cli::command()
                    .error(ErrorKind::ValueValidation, sweep_err)
                    .exit();
            }
        }
    }
    outcome
}
