//! sdg_render - Render a parameter sweep into an annotated detection dataset.
//!
//! Uses the built-in synthetic renderer. Ctrl-C stops the run after the
//! sample in flight; everything written so far stays indexed.

use anyhow::{Context, Result};
use clap::Parser;
use std::io::IsTerminal;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use sweep_annotate::{Pipeline, SampleEvent, SweepConfig, SyntheticBackend};

#[path = "../ui.rs"]
mod ui;

#[derive(Parser, Debug)]
#[command(
    name = "sdg_render",
    about = "Render a scene parameter sweep into a labelled dataset split"
)]
struct Args {
    /// Path to the sweep config (TOML, or JSON by extension)
    #[arg(long, value_name = "PATH")]
    config: PathBuf,

    /// Resolve the scene and print the planned states without rendering
    #[arg(long)]
    dry_run: bool,

    /// UI mode for stderr progress (auto|plain|pretty)
    #[arg(long, default_value = "auto", value_name = "MODE")]
    ui: String,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let is_tty = std::io::stderr().is_terminal();
    let stdout_is_tty = std::io::stdout().is_terminal();
    let ui = ui::Ui::from_args(Some(&args.ui), is_tty, !stdout_is_tty);

    let config = {
        let _stage = ui.stage("Load config");
        SweepConfig::load(&args.config)
            .with_context(|| format!("loading config {}", args.config.display()))?
    };
    let mut pipeline = {
        let _stage = ui.stage("Open scene");
        Pipeline::new(&config, SyntheticBackend::new())?
    };

    if args.dry_run {
        for state in pipeline.plan().states() {
            println!("{}", serde_json::to_string(&state)?);
        }
        println!("{} states planned", pipeline.plan().len());
        return Ok(());
    }

    let stop = Arc::new(AtomicBool::new(false));
    let handler_stop = Arc::clone(&stop);
    ctrlc::set_handler(move || {
        handler_stop.store(true, Ordering::SeqCst);
    })
    .expect("error setting Ctrl-C handler");

    let summary = {
        let mut progress = ui.samples(pipeline.plan().len());
        pipeline.run_with(&stop, |event| match event {
            SampleEvent::Written { index, id } => progress.written(*index, id),
            SampleEvent::Skipped { index, reason } => {
                progress.skipped(*index, &reason.to_string())
            }
        })?
    };

    println!("run summary:");
    println!("  requested: {}", summary.requested);
    println!("  written: {}", summary.written);
    println!("  skipped: {}", summary.skipped.len());
    for skipped in &summary.skipped {
        println!("    state {}: {}", skipped.index, skipped.reason);
    }
    if summary.cancelled {
        println!("  cancelled: yes ({} states not attempted)", summary.requested - summary.attempted());
    }
    println!("  index: {} ({} records)", summary.index_path.display(), summary.indexed);
    if let Some(path) = &summary.animation {
        println!("  animation: {}", path.display());
    }
    if let Some(err) = &summary.animation_error {
        println!("  animation failed: {}", err);
    }
    Ok(())
}
