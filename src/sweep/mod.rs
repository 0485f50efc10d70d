//! Sweep planning.
//!
//! Expands the declared parameter ranges into an ordered, reproducible
//! sequence of [`SceneState`]s. The planner never touches the renderer.

mod plan;
mod range;

pub use plan::{plan, Assignment, SamplingMode, SceneState, SceneStates, SweepPlan};
pub use range::{ParamRange, Property, SweepParameter};
