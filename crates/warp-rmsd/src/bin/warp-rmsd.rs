//! warp-rmsd CLI: batched RMSD, gradients and finite-difference checks.

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use serde::Serialize;
use warp_rmsd::batch_spec::{BatchSpec, PreparedBatch};
use warp_rmsd::padding::unpad_with;
use warp_rmsd::streaming::StreamEmitter;
use warp_rmsd::{
    gradcheck, Coords2Rmsd, GradCheckOptions, GradSpace, RmsdConfig, RmsdError, RmsdResult,
};

#[derive(Parser)]
#[command(
    name = "warp-rmsd",
    version,
    about = "RMSD after optimal superposition, with analytic gradients",
    after_long_help = "\
EXAMPLES:
  # Per-entry RMSD for a JSON batch:
  warp-rmsd rmsd -i batch.json

  # Gradient of the mean-square deviation, quaternion solver:
  warp-rmsd grad -i batch.json --msd -c cfg.yaml

  # Compare analytic and numeric gradients, streaming progress to stderr:
  warp-rmsd gradcheck -i batch.json --stream"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[arg(short, long, global = true)]
    /// JSON or YAML config (capacity, method, max_iterations, gradcheck_*)
    config: Option<PathBuf>,

    #[arg(long, global = true)]
    /// Enable NDJSON streaming progress events to stderr
    stream: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Mean-square deviation and RMSD per entry.
    Rmsd {
        #[arg(short, long)]
        input: PathBuf,
    },
    /// Gradient with respect to the source coordinates, unpadded per entry.
    Grad {
        #[arg(short, long)]
        input: PathBuf,
        /// Differentiate the mean-square deviation instead of the RMSD.
        #[arg(long, default_value_t = false)]
        msd: bool,
    },
    /// Central finite-difference check of the analytic gradient.
    Gradcheck {
        #[arg(short, long)]
        input: PathBuf,
        #[arg(long, default_value_t = false)]
        msd: bool,
        /// Print only the summary, not the per-coordinate rows.
        #[arg(long, default_value_t = false)]
        summary: bool,
    },
}

#[derive(Serialize)]
struct RmsdOutput {
    msd: Vec<f64>,
    rmsd: Vec<f64>,
}

#[derive(Serialize)]
struct GradOutput {
    space: GradSpace,
    value: Vec<f64>,
    gradient: Vec<Vec<f64>>,
}

#[derive(Serialize)]
struct GradCheckSummary {
    space: GradSpace,
    coordinates: usize,
    max_rel_error: f64,
    tolerance: f64,
    passed: bool,
}

fn main() {
    let cli = Cli::parse();
    let emitter = StreamEmitter::new(cli.stream);

    match run(&cli, emitter) {
        Ok(true) => {}
        Ok(false) => std::process::exit(2),
        Err(e) => {
            eprintln!("error: {e}");
            std::process::exit(1);
        }
    }
}

/// Errors raised before the layer runs are streamed here; the layer streams
/// its own.
fn streamed<T>(emitter: StreamEmitter, result: RmsdResult<T>) -> RmsdResult<T> {
    if let Err(e) = &result {
        emitter.emit_error(e.code(), &e.to_string());
    }
    result
}

fn load_config(cli: &Cli) -> RmsdResult<RmsdConfig> {
    let mut cfg = match &cli.config {
        Some(path) => RmsdConfig::from_path(path)?,
        None => RmsdConfig::default(),
    };
    if cli.stream {
        cfg.stream = true;
    }
    cfg.normalized()
}

fn load_batch(path: &Path, cfg: &RmsdConfig) -> RmsdResult<PreparedBatch> {
    BatchSpec::from_file(path)?.prepare(cfg.capacity)
}

fn space_of(msd: bool) -> GradSpace {
    if msd {
        GradSpace::Msd
    } else {
        GradSpace::Rmsd
    }
}

fn print_json<T: Serialize>(value: &T) -> RmsdResult<()> {
    let text = serde_json::to_string_pretty(value)
        .map_err(|e| RmsdError::Parse(format!("failed to serialize output: {e}")))?;
    println!("{text}");
    Ok(())
}

/// Returns `Ok(false)` when a gradient check ran but did not pass.
fn run(cli: &Cli, emitter: StreamEmitter) -> RmsdResult<bool> {
    let cfg = streamed(emitter, load_config(cli))?;
    let emitter = StreamEmitter::new(emitter.is_enabled() || cfg.stream);
    let layer = streamed(emitter, Coords2Rmsd::from_config(&cfg))?;

    match &cli.command {
        Commands::Rmsd { input } => {
            let batch = streamed(emitter, load_batch(input, &cfg))?;
            let out = layer.forward(
                &batch.source.as_tensor()?,
                &batch.target.as_tensor()?,
                batch.counts(),
            )?;
            print_json(&RmsdOutput {
                rmsd: out.rmsd(),
                msd: out.msd,
            })?;
            Ok(true)
        }
        Commands::Grad { input, msd } => {
            let batch = streamed(emitter, load_batch(input, &cfg))?;
            let space = space_of(*msd);
            let out = layer.forward(
                &batch.source.as_tensor()?,
                &batch.target.as_tensor()?,
                batch.counts(),
            )?;
            let value = match space {
                GradSpace::Msd => out.msd.clone(),
                GradSpace::Rmsd => out.rmsd(),
            };
            let mut state = out.into_state();
            let grad = layer.backward_in(space, &batch.grad_output, &mut state)?;
            let gradient = unpad_with(grad.as_slice(), batch.counts(), grad.capacity())?;
            print_json(&GradOutput {
                space,
                value,
                gradient,
            })?;
            Ok(true)
        }
        Commands::Gradcheck {
            input,
            msd,
            summary,
        } => {
            let batch = streamed(emitter, load_batch(input, &cfg))?;
            let options = GradCheckOptions::from_config(&cfg, space_of(*msd));
            let report = gradcheck(
                &layer,
                &batch.source.as_tensor()?,
                &batch.target.as_tensor()?,
                batch.counts(),
                &options,
            )?;
            if *summary {
                print_json(&GradCheckSummary {
                    space: report.space,
                    coordinates: report.rows.len(),
                    max_rel_error: report.max_rel_error,
                    tolerance: report.tolerance,
                    passed: report.passed,
                })?;
            } else {
                print_json(&report)?;
            }
            Ok(report.passed)
        }
    }
}
