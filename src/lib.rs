//! Sweep-and-annotate engine for synthetic object-detection datasets.
//!
//! A declarative sweep over scene parameters is expanded into a reproducible
//! sequence of scene states. Each state is rendered by an external
//! collaborator, every tracked element is projected to a 2D box, and the
//! results are written as a split-aware dataset.
//!
//! # Invariants
//!
//! 1. **Determinism**: the same config and seed yield the same states, ids
//!    and boxes.
//! 2. **Fail early**: unresolvable element names and invalid ranges abort
//!    before the first render.
//! 3. **Isolation**: a failure confined to one state skips that state only.
//! 4. **One line per id**: the finished index never holds duplicate ids.
//!
//! # Module Structure
//!
//! - `config`: file + environment configuration
//! - `sweep`: parameter ranges and the state planner
//! - `scene`: renderer seam, scene driver and the synthetic renderer
//! - `projection`: camera model and box projection
//! - `annotate`: labels, records, ids and debug overlays
//! - `dataset`: on-disk layout, metadata index and summary animation
//! - `pipeline`: run orchestration

pub mod annotate;
pub mod config;
pub mod dataset;
pub mod pipeline;
pub mod projection;
pub mod scene;
pub mod sweep;

pub use annotate::{AnnotationAssembler, AssembledSample, BoundingBox2D, DatasetRecord};
pub use config::SweepConfig;
pub use dataset::{read_index, DatasetWriter};
pub use pipeline::{Pipeline, RunSummary, SampleEvent, SkipReason, SkippedSample};
pub use projection::{project, CameraModel, Extent, Intrinsics, PixelRect, Projection};
pub use scene::{SceneBackend, SceneDriver, SyntheticBackend};
pub use sweep::{SceneState, SweepPlan};
