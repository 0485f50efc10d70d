//! Seam to the rendering collaborator.
//!
//! - `backend`: the [`SceneBackend`] trait a renderer implements.
//! - `driver`: [`SceneDriver`], the single owner that applies scene states.
//! - `synthetic`: built-in [`SyntheticBackend`] for dry runs and tests.

mod backend;
pub mod description;
mod driver;
mod synthetic;

pub use backend::{ObjectHandle, SceneBackend};
pub use description::{SceneDescription, SceneFile};
pub use driver::{ElementPose, RenderResult, SceneDriver};
pub use synthetic::SyntheticBackend;
