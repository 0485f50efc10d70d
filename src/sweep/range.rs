use anyhow::{anyhow, Result};
use rand::distributions::{Distribution, WeightedIndex};
use rand::Rng;
use serde::{Deserialize, Serialize};

const DEFAULT_STEPS: u32 = 1;

/// Scene property a sweep parameter drives.
///
/// Rotations are in degrees; `Energy` only applies to light objects.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Property {
    LocationX,
    LocationY,
    LocationZ,
    RotationX,
    RotationY,
    RotationZ,
    Scale,
    Energy,
}

impl Property {
    pub fn as_str(&self) -> &'static str {
        match self {
            Property::LocationX => "location_x",
            Property::LocationY => "location_y",
            Property::LocationZ => "location_z",
            Property::RotationX => "rotation_x",
            Property::RotationY => "rotation_y",
            Property::RotationZ => "rotation_z",
            Property::Scale => "scale",
            Property::Energy => "energy",
        }
    }
}

/// Closed set of value sources for one swept parameter.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ParamRange {
    /// Always the same value.
    Fixed { value: f64 },
    /// Inclusive interval. Grid sweeps visit `steps` evenly spaced points,
    /// random sweeps draw uniformly from `[min, max]`.
    Uniform {
        min: f64,
        max: f64,
        #[serde(default = "default_steps")]
        steps: u32,
    },
    /// Explicit value set, optionally weighted for random sweeps.
    Discrete {
        values: Vec<f64>,
        #[serde(default)]
        weights: Option<Vec<f64>>,
    },
}

fn default_steps() -> u32 {
    DEFAULT_STEPS
}

impl ParamRange {
    pub fn validate(&self) -> Result<()> {
        match self {
            ParamRange::Fixed { value } => {
                if !value.is_finite() {
                    return Err(anyhow!("fixed value must be finite"));
                }
            }
            ParamRange::Uniform { min, max, steps } => {
                if !min.is_finite() || !max.is_finite() {
                    return Err(anyhow!("uniform range bounds must be finite"));
                }
                if min > max {
                    return Err(anyhow!("uniform range min {} exceeds max {}", min, max));
                }
                if *steps == 0 {
                    return Err(anyhow!("uniform range steps must be >= 1"));
                }
            }
            ParamRange::Discrete { values, weights } => {
                if values.is_empty() {
                    return Err(anyhow!("discrete range must list at least one value"));
                }
                if values.iter().any(|v| !v.is_finite()) {
                    return Err(anyhow!("discrete values must be finite"));
                }
                if let Some(weights) = weights {
                    if weights.len() != values.len() {
                        return Err(anyhow!(
                            "discrete range has {} values but {} weights",
                            values.len(),
                            weights.len()
                        ));
                    }
                    WeightedIndex::new(weights)
                        .map_err(|e| anyhow!("invalid discrete weights: {}", e))?;
                }
            }
        }
        Ok(())
    }

    /// Values visited by an exhaustive grid sweep, in ascending step order.
    pub fn grid_points(&self) -> Vec<f64> {
        match self {
            ParamRange::Fixed { value } => vec![*value],
            ParamRange::Uniform { min, max, steps } => {
                if *steps <= 1 {
                    return vec![*min];
                }
                let last = (*steps - 1) as f64;
                (0..*steps)
                    .map(|i| min + (max - min) * (i as f64 / last))
                    .collect()
            }
            ParamRange::Discrete { values, .. } => values.clone(),
        }
    }

    /// Draws one value. Ranges are assumed validated.
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> f64 {
        match self {
            ParamRange::Fixed { value } => *value,
            ParamRange::Uniform { min, max, .. } => {
                if min == max {
                    *min
                } else {
                    rng.gen_range(*min..=*max)
                }
            }
            ParamRange::Discrete { values, weights } => {
                let idx = match weights.as_ref().and_then(|w| WeightedIndex::new(w).ok()) {
                    Some(dist) => dist.sample(rng),
                    None => rng.gen_range(0..values.len()),
                };
                values[idx]
            }
        }
    }
}

/// One declared sweep dimension: which object, which property, which values.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SweepParameter {
    pub target: String,
    pub property: Property,
    pub range: ParamRange,
}
