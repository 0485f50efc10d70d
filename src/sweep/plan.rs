use anyhow::{anyhow, Context, Result};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use super::range::{Property, SweepParameter};
use crate::config::SweepConfig;

/// How the sweep space is walked.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SamplingMode {
    /// Cartesian product over every parameter's grid points.
    #[default]
    Grid,
    /// Independent seeded draws per parameter.
    Random,
}

/// One concrete value for one swept parameter.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Assignment {
    pub target: String,
    pub property: Property,
    pub value: f64,
}

/// One point of the sweep space. Identified by `index`, its position in
/// the planned sequence.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SceneState {
    pub index: u64,
    pub assignments: Vec<Assignment>,
    /// `None` selects the renderer's solid-colour fallback.
    pub background: Option<PathBuf>,
}

/// Validated, restartable sweep plan.
///
/// The plan holds only parameter definitions; every call to [`SweepPlan::states`]
/// starts a fresh sequence, so iterating twice yields identical states.
#[derive(Clone, Debug)]
pub struct SweepPlan {
    mode: SamplingMode,
    parameters: Vec<SweepParameter>,
    backgrounds: Vec<PathBuf>,
    seed: u64,
    len: u64,
}

/// Builds the plan described by a loaded configuration.
pub fn plan(config: &SweepConfig) -> Result<SweepPlan> {
    SweepPlan::new(
        config.sweep.mode,
        config.sweep.parameters.clone(),
        config.backgrounds.clone(),
        config.sweep.samples,
        config.sweep.seed,
    )
}

impl SweepPlan {
    pub fn new(
        mode: SamplingMode,
        parameters: Vec<SweepParameter>,
        backgrounds: Vec<PathBuf>,
        samples: Option<u64>,
        seed: u64,
    ) -> Result<Self> {
        for param in &parameters {
            param.range.validate().with_context(|| {
                format!(
                    "sweep parameter {}.{}",
                    param.target,
                    param.property.as_str()
                )
            })?;
        }
        if samples == Some(0) {
            return Err(anyhow!("sweep sample count must be greater than zero"));
        }

        let len = match mode {
            SamplingMode::Grid => {
                let full = grid_size(&parameters, backgrounds.len())?;
                match samples {
                    Some(limit) => limit.min(full),
                    None => full,
                }
            }
            SamplingMode::Random => {
                samples.ok_or_else(|| anyhow!("random sweeps require sweep.samples"))?
            }
        };

        Ok(Self {
            mode,
            parameters,
            backgrounds,
            seed,
            len,
        })
    }

    pub fn mode(&self) -> SamplingMode {
        self.mode
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn parameters(&self) -> &[SweepParameter] {
        &self.parameters
    }

    pub fn backgrounds(&self) -> &[PathBuf] {
        &self.backgrounds
    }

    /// Lazily yields the planned states from the beginning.
    pub fn states(&self) -> SceneStates<'_> {
        let axes = match self.mode {
            SamplingMode::Grid => self
                .parameters
                .iter()
                .map(|p| p.range.grid_points())
                .collect(),
            SamplingMode::Random => Vec::new(),
        };
        SceneStates {
            plan: self,
            axes,
            rng: StdRng::seed_from_u64(self.seed),
            next: 0,
        }
    }

    fn grid_state(&self, axes: &[Vec<f64>], index: u64) -> SceneState {
        // Mixed-radix decode: the last declared dimension varies fastest,
        // backgrounds sit after every parameter.
        let mut rem = index;
        let background = if self.backgrounds.is_empty() {
            None
        } else {
            let n = self.backgrounds.len() as u64;
            let pick = (rem % n) as usize;
            rem /= n;
            Some(self.backgrounds[pick].clone())
        };

        let mut values = vec![0.0; axes.len()];
        for (slot, points) in values.iter_mut().zip(axes).rev() {
            let n = points.len() as u64;
            *slot = points[(rem % n) as usize];
            rem /= n;
        }

        SceneState {
            index,
            assignments: self.assign(values),
            background,
        }
    }

    fn random_state(&self, rng: &mut StdRng, index: u64) -> SceneState {
        let values = self
            .parameters
            .iter()
            .map(|p| p.range.sample(rng))
            .collect();
        let background = if self.backgrounds.is_empty() {
            None
        } else {
            let pick = rng.gen_range(0..self.backgrounds.len());
            Some(self.backgrounds[pick].clone())
        };
        SceneState {
            index,
            assignments: self.assign(values),
            background,
        }
    }

    fn assign(&self, values: Vec<f64>) -> Vec<Assignment> {
        self.parameters
            .iter()
            .zip(values)
            .map(|(p, value)| Assignment {
                target: p.target.clone(),
                property: p.property,
                value,
            })
            .collect()
    }
}

fn grid_size(parameters: &[SweepParameter], backgrounds: usize) -> Result<u64> {
    let mut total: u64 = backgrounds.max(1) as u64;
    for param in parameters {
        let points = param.range.grid_points().len() as u64;
        total = total
            .checked_mul(points)
            .ok_or_else(|| anyhow!("grid sweep size overflows u64"))?;
    }
    Ok(total)
}

/// Iterator over a plan's states. Finite and exact-sized.
pub struct SceneStates<'a> {
    plan: &'a SweepPlan,
    axes: Vec<Vec<f64>>,
    rng: StdRng,
    next: u64,
}

impl Iterator for SceneStates<'_> {
    type Item = SceneState;

    fn next(&mut self) -> Option<SceneState> {
        if self.next >= self.plan.len {
            return None;
        }
        let index = self.next;
        self.next += 1;
        let state = match self.plan.mode {
            SamplingMode::Grid => self.plan.grid_state(&self.axes, index),
            SamplingMode::Random => self.plan.random_state(&mut self.rng, index),
        };
        Some(state)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = (self.plan.len - self.next) as usize;
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for SceneStates<'_> {}
