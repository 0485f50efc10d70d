//! Run orchestration: plan → apply → project → assemble → write, one sample
//! at a time.
//!
//! A failure confined to one state (the renderer rejecting it, or its
//! artifacts failing to reach disk) skips that state and the run carries on.
//! Failures that would leave the index inconsistent abort the run.

use anyhow::{Context, Result};
use image::RgbImage;
use std::fmt;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::annotate::{project_elements, AnnotationAssembler};
use crate::config::SweepConfig;
use crate::dataset::DatasetWriter;
use crate::scene::{SceneBackend, SceneDriver};
use crate::sweep::{self, SweepPlan};

/// Why a planned state produced no record.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SkipReason {
    Render(String),
    Persistence(String),
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::Render(msg) => write!(f, "render failed: {}", msg),
            SkipReason::Persistence(msg) => write!(f, "write failed: {}", msg),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SkippedSample {
    pub index: u64,
    pub reason: SkipReason,
}

#[derive(Clone, Debug, Default)]
pub struct RunSummary {
    pub requested: u64,
    pub written: u64,
    pub skipped: Vec<SkippedSample>,
    /// Stopped early on request; states after the last attempted one were
    /// never tried.
    pub cancelled: bool,
    pub index_path: PathBuf,
    /// Records in the split's index after compaction.
    pub indexed: usize,
    pub animation: Option<PathBuf>,
    pub animation_error: Option<String>,
}

impl RunSummary {
    pub fn attempted(&self) -> u64 {
        self.written + self.skipped.len() as u64
    }
}

/// Per-sample notification for progress reporting.
#[derive(Debug)]
pub enum SampleEvent<'a> {
    Written { index: u64, id: &'a str },
    Skipped { index: u64, reason: &'a SkipReason },
}

pub struct Pipeline<B: SceneBackend> {
    plan: SweepPlan,
    driver: SceneDriver<B>,
    assembler: AnnotationAssembler,
    writer: DatasetWriter,
}

impl<B: SceneBackend> Pipeline<B> {
    /// Plans the sweep and opens the scene. Every configuration error
    /// surfaces here, before anything is rendered.
    pub fn new(config: &SweepConfig, backend: B) -> Result<Self> {
        let plan = sweep::plan(config).context("planning sweep")?;
        let driver = SceneDriver::open(backend, config)?;
        let assembler = AnnotationAssembler::new(
            config.sweep.seed,
            config.output.split.clone(),
            config.output.debug,
        );
        let writer = DatasetWriter::new(config.split_dir(), config.scene.elements.clone());
        log::info!(
            "planned {} {:?} states over {} parameters, {} backgrounds, writing to {}",
            plan.len(),
            plan.mode(),
            plan.parameters().len(),
            plan.backgrounds().len(),
            writer.split_dir().display()
        );
        Ok(Self {
            plan,
            driver,
            assembler,
            writer,
        })
    }

    pub fn plan(&self) -> &SweepPlan {
        &self.plan
    }

    pub fn run(&mut self, stop: &AtomicBool) -> Result<RunSummary> {
        self.run_with(stop, |_| {})
    }

    /// Runs every planned state, checking `stop` between samples.
    pub fn run_with<F>(&mut self, stop: &AtomicBool, mut observer: F) -> Result<RunSummary>
    where
        F: FnMut(&SampleEvent<'_>),
    {
        let mut summary = RunSummary {
            requested: self.plan.len(),
            index_path: self.writer.index_path(),
            ..RunSummary::default()
        };

        for state in self.plan.states() {
            if stop.load(Ordering::SeqCst) {
                log::info!("stop requested, halting before state {}", state.index);
                summary.cancelled = true;
                break;
            }

            let render = match self.driver.apply(&state) {
                Ok(render) => render,
                Err(err) => {
                    let reason = SkipReason::Render(format!("{:#}", err));
                    log::warn!("skipping state {}: {}", state.index, reason);
                    observer(&SampleEvent::Skipped {
                        index: state.index,
                        reason: &reason,
                    });
                    summary.skipped.push(SkippedSample {
                        index: state.index,
                        reason,
                    });
                    continue;
                }
            };

            let boxes = project_elements(&render);
            let sample = self.assembler.assemble(state.index, render, boxes);
            match self.writer.write(&sample) {
                Ok(()) => {
                    log::debug!("state {} written as {}", state.index, sample.record.id);
                    summary.written += 1;
                    observer(&SampleEvent::Written {
                        index: state.index,
                        id: &sample.record.id,
                    });
                }
                Err(err) => {
                    self.assembler.discard_overlay(&sample.record.id);
                    let reason = SkipReason::Persistence(format!("{:#}", err));
                    log::warn!("skipping state {}: {}", state.index, reason);
                    observer(&SampleEvent::Skipped {
                        index: state.index,
                        reason: &reason,
                    });
                    summary.skipped.push(SkippedSample {
                        index: state.index,
                        reason,
                    });
                }
            }
        }

        let overlays: Vec<&RgbImage> = self.assembler.overlays().collect();
        let report = self
            .writer
            .finish(&overlays)
            .context("finalising dataset index")?;
        summary.indexed = report.indexed;
        summary.animation = report.animation;
        summary.animation_error = report.animation_error;

        log::info!(
            "run finished: {} requested, {} written, {} skipped{}",
            summary.requested,
            summary.written,
            summary.skipped.len(),
            if summary.cancelled { " (cancelled)" } else { "" }
        );
        Ok(summary)
    }
}
