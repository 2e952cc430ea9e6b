//! detfeat - detection post-processing for tracking
//!
//! `run` walks a frame directory, replays the detector outputs saved for each
//! frame, appends the kept detections to the log and aggregates it.
//! `aggregate` only rebuilds the table and projection from an existing log.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::io::IsTerminal;
use std::path::PathBuf;

use detection_features::{
    aggregate, scan_frames, FrameWriter, Pipeline, PipelineConfig, ReplayDetector,
};

#[path = "../ui.rs"]
mod ui;

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Path to the TOML config file.
    #[arg(long, global = true, env = "DETFEAT_CONFIG")]
    config: Option<PathBuf>,
    /// UI mode for stderr progress (auto|plain|pretty)
    #[arg(long, global = true, default_value = "auto", value_name = "MODE")]
    ui: String,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Process every frame of a directory, then aggregate the log.
    Run {
        /// Directory holding the frame images.
        #[arg(long)]
        frames: PathBuf,
        /// Directory holding `<frame>.npz` detector outputs.
        #[arg(long)]
        outputs: PathBuf,
        /// Override the configured log path.
        #[arg(long)]
        log: Option<PathBuf>,
        /// Serve detector outputs even when the frame image is missing.
        #[arg(long)]
        skip_frame_check: bool,
        /// Stop after writing the log.
        #[arg(long)]
        no_aggregate: bool,
    },
    /// Build the dense table and projection from an existing log.
    Aggregate {
        /// Override the configured log path.
        #[arg(long)]
        log: Option<PathBuf>,
        /// Override the configured feature dimensionality.
        #[arg(long)]
        feature_dim: Option<usize>,
    },
}

impl Command {
    /// Flags take precedence over the config file and the environment.
    fn apply_overrides(&self, cfg: &mut PipelineConfig) {
        match self {
            Command::Run { log, .. } => {
                if let Some(log) = log {
                    cfg.log_path = log.clone();
                }
            }
            Command::Aggregate { log, feature_dim } => {
                if let Some(log) = log {
                    cfg.log_path = log.clone();
                }
                if let Some(dim) = feature_dim {
                    cfg.feature_dim = *dim;
                }
            }
        }
    }
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let is_tty = std::io::stderr().is_terminal();
    let stdout_is_tty = std::io::stdout().is_terminal();
    let ui = ui::Ui::from_flag(&args.ui, is_tty, stdout_is_tty);

    let cfg = {
        let _stage = ui.stage("Load config");
        let mut cfg = PipelineConfig::resolve(args.config.as_deref())?;
        args.command.apply_overrides(&mut cfg);
        cfg.validate()?;
        cfg
    };

    match args.command {
        Command::Run {
            frames,
            outputs,
            skip_frame_check,
            no_aggregate,
            ..
        } => {
            let frame_list = {
                let mut stage = ui.stage("Scan frames");
                let frame_list = scan_frames(&frames, &cfg.frames)
                    .with_context(|| format!("failed to list frames in {}", frames.display()))?;
                stage.outcome(format_args!("{} frames", frame_list.len()));
                frame_list
            };
            log::info!("{} frames found in {}", frame_list.len(), frames.display());

            let mut detector = ReplayDetector::new(&outputs);
            if skip_frame_check {
                detector = detector.without_frame_check();
            }
            let writer = FrameWriter::open(&cfg.log_path)
                .with_context(|| format!("failed to open log {}", cfg.log_path.display()))?;
            let mut pipeline =
                Pipeline::new(detector, cfg.selection_params()?, cfg.feature_dim, writer)?;

            let summary = {
                let mut stage = ui.stage("Detect frames");
                let tally = ui.frames(frame_list.len());
                let summary = pipeline
                    .run_with(&frame_list, |frame, outcome| tally.record(frame.id(), outcome))?;
                stage.outcome(&tally);
                summary
            };
            println!("{}", serde_json::to_string_pretty(&summary)?);

            if !no_aggregate {
                let mut stage = ui.stage("Aggregate log");
                let aggregated = aggregate(&cfg.aggregate_request())?;
                stage.outcome(format_args!(
                    "{} rows x {} columns",
                    aggregated.rows, aggregated.columns
                ));
                println!("{}", serde_json::to_string_pretty(&aggregated)?);
            }
        }
        Command::Aggregate { .. } => {
            let mut stage = ui.stage("Aggregate log");
            let aggregated = aggregate(&cfg.aggregate_request())
                .with_context(|| format!("aggregation of {} failed", cfg.log_path.display()))?;
            stage.outcome(format_args!(
                "{} rows x {} columns",
                aggregated.rows, aggregated.columns
            ));
            println!("{}", serde_json::to_string_pretty(&aggregated)?);
        }
    }
    Ok(())
}
