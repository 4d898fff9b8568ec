//! Command-line driver
//!
//! ```bash
//! # Write a test signal with a 100-sample period
//! shardcorr synth --period 100
//!
//! # Autocorrelate it on 4 workers and print the scatter plan first
//! RUST_LOG=debug shardcorr run --workers 4 --plan
//! ```

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use shardcorr::config::{
    DEFAULT_MAX_PLOT, DEFAULT_MAX_SHIFT, DEFAULT_PLOT_FILE, DEFAULT_SIGNAL_FILE,
    DEFAULT_SIGNAL_LEN,
};
use shardcorr::scatter_plan::scatter_plan;
use shardcorr::{io, partition, run, RunConfig, COORDINATOR};

#[derive(Parser, Debug)]
#[command(name = "shardcorr", version, about = "Sharded autocorrelation benchmark")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Autocorrelate a signal file and write the plot file
    Run(RunArgs),
    /// Write a synthetic sine signal file
    Synth(SynthArgs),
}

#[derive(Args, Debug)]
struct RunArgs {
    /// Raw native-endian f32 signal
    #[arg(long, default_value = DEFAULT_SIGNAL_FILE)]
    input: PathBuf,

    /// Plot output, one "shift , value" line per shift
    #[arg(long, default_value = DEFAULT_PLOT_FILE)]
    output: PathBuf,

    /// Worker count including the coordinator [default: available parallelism]
    #[arg(long)]
    workers: Option<usize>,

    /// Samples to read from the input
    #[arg(long, default_value_t = DEFAULT_SIGNAL_LEN)]
    len: usize,

    /// Number of shifts
    #[arg(long, default_value_t = DEFAULT_MAX_SHIFT)]
    max_shift: usize,

    /// Shifts 1..max_plot are written to the output
    #[arg(long, default_value_t = DEFAULT_MAX_PLOT)]
    max_plot: usize,

    /// Print the scatter plan before running
    #[arg(long)]
    plan: bool,
}

#[derive(Args, Debug)]
struct SynthArgs {
    #[arg(long, default_value = DEFAULT_SIGNAL_FILE)]
    output: PathBuf,

    #[arg(long, default_value_t = DEFAULT_SIGNAL_LEN)]
    len: usize,

    /// Period of the sine wave in samples
    #[arg(long, default_value_t = 100.0)]
    period: f32,

    #[arg(long, default_value_t = 1.0)]
    amplitude: f32,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_names(true)
        .init();

    match Cli::parse().command {
        Command::Run(args) => run_command(args),
        Command::Synth(args) => synth_command(args),
    }
}

fn run_command(args: RunArgs) -> Result<()> {
    let mut config = RunConfig::default()
        .with_signal_len(args.len)
        .with_max_shift(args.max_shift)
        .with_max_plot(args.max_plot);
    if let Some(workers) = args.workers {
        config.workers = workers;
    }
    config.validate().context("invalid run configuration")?;

    if args.plan {
        let partition = partition(config.signal_len, config.workers, config.max_shift)?;
        println!("{}", scatter_plan(&partition, COORDINATOR));
    }

    let samples = io::load_signal(&args.input, config.signal_len)
        .with_context(|| format!("loading {}", args.input.display()))?;

    let outcome = run(samples, &config).context("autocorrelation run failed")?;
    info!("{}", outcome);

    // A missing plot file is reported but does not fail the run
    match io::write_plot(&args.output, &outcome.sums, config.max_plot) {
        Ok(()) => info!(path = %args.output.display(), "wrote plot file"),
        Err(err) => error!(error = %err, "cannot write to plot file"),
    }

    Ok(())
}

fn synth_command(args: SynthArgs) -> Result<()> {
    let samples = io::sine_signal(args.len, args.period, args.amplitude);
    io::write_signal(&args.output, &samples)
        .with_context(|| format!("writing {}", args.output.display()))?;
    info!(
        path = %args.output.display(),
        samples = args.len,
        period = args.period,
        "wrote synthetic signal"
    );
    Ok(())
}
