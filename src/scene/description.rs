//! Scene file format understood by the synthetic backend.
//!
//! ```toml
//! [[scenes]]
//! name = "Scene"
//!
//! [scenes.camera]
//! location = [0.0, 0.0, 10.0]
//! fov = 50.0
//!
//! [[scenes.objects]]
//! name = "Cube"
//! kind = "mesh"
//! extent = { min = [-1.0, -1.0, -1.0], max = [1.0, 1.0, 1.0] }
//! ```

use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;

const DEFAULT_CAMERA_NAME: &str = "Camera";
const DEFAULT_FOV_DEG: f64 = 39.6;
const DEFAULT_NEAR: f64 = 0.1;
const DEFAULT_ENERGY: f64 = 1000.0;
const DEFAULT_BACKGROUND: [u8; 3] = [13, 13, 13];

#[derive(Debug, Clone, Deserialize)]
pub struct SceneFile {
    pub scenes: Vec<SceneDescription>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SceneDescription {
    pub name: String,
    pub camera: CameraDescription,
    #[serde(default)]
    pub objects: Vec<ObjectDescription>,
    #[serde(default = "default_background")]
    pub background_color: [u8; 3],
}

#[derive(Debug, Clone, Deserialize)]
pub struct CameraDescription {
    #[serde(default = "default_camera_name")]
    pub name: String,
    #[serde(default)]
    pub location: [f64; 3],
    /// XYZ Euler angles in degrees.
    #[serde(default)]
    pub rotation: [f64; 3],
    /// Field of view across the larger image dimension, in degrees.
    #[serde(default = "default_fov")]
    pub fov: f64,
    #[serde(default = "default_near")]
    pub near: f64,
    #[serde(default)]
    pub parent: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObjectKind {
    Mesh,
    Light,
    Empty,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ObjectDescription {
    pub name: String,
    pub kind: ObjectKind,
    #[serde(default)]
    pub location: [f64; 3],
    #[serde(default)]
    pub rotation: [f64; 3],
    #[serde(default = "default_scale")]
    pub scale: f64,
    #[serde(default)]
    pub extent: Option<ExtentDescription>,
    #[serde(default)]
    pub parent: Option<String>,
    #[serde(default = "default_energy")]
    pub energy: f64,
    #[serde(default)]
    pub color: Option<[u8; 3]>,
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct ExtentDescription {
    pub min: [f64; 3],
    pub max: [f64; 3],
}

fn default_camera_name() -> String {
    DEFAULT_CAMERA_NAME.to_string()
}

fn default_fov() -> f64 {
    DEFAULT_FOV_DEG
}

fn default_near() -> f64 {
    DEFAULT_NEAR
}

fn default_scale() -> f64 {
    1.0
}

fn default_energy() -> f64 {
    DEFAULT_ENERGY
}

fn default_background() -> [u8; 3] {
    DEFAULT_BACKGROUND
}

impl SceneFile {
    pub fn read(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| anyhow!("failed to read scene file {}: {}", path.display(), e))?;
        toml::from_str(&raw).map_err(|e| anyhow!("invalid scene file {}: {}", path.display(), e))
    }

    pub fn scene(&self, name: &str) -> Result<&SceneDescription> {
        self.scenes
            .iter()
            .find(|scene| scene.name == name)
            .ok_or_else(|| anyhow!("scene {:?} not found in scene file", name))
    }
}

impl SceneDescription {
    /// Checks object names are unique, parents exist and parent chains are acyclic.
    pub fn validate(&self) -> Result<()> {
        let mut parents: HashMap<&str, Option<&str>> = HashMap::new();
        parents.insert(&self.camera.name, self.camera.parent.as_deref());
        for object in &self.objects {
            if parents
                .insert(&object.name, object.parent.as_deref())
                .is_some()
            {
                return Err(anyhow!("duplicate object name {:?}", object.name));
            }
            if !(object.scale.is_finite() && object.scale > 0.0) {
                return Err(anyhow!("object {:?} scale must be positive", object.name));
            }
        }
        if !(self.camera.fov > 0.0 && self.camera.fov < 180.0) {
            return Err(anyhow!("camera fov must be within (0, 180) degrees"));
        }
        if !(self.camera.near > 0.0) {
            return Err(anyhow!("camera near clip must be positive"));
        }

        for (&name, _) in parents.iter() {
            let mut hops = 0;
            let mut current = name;
            while let Some(parent) = parents.get(current).copied().flatten() {
                if !parents.contains_key(parent) {
                    return Err(anyhow!("object {:?} has unknown parent {:?}", current, parent));
                }
                hops += 1;
                if hops > parents.len() {
                    return Err(anyhow!("parent chain of {:?} forms a cycle", name));
                }
                current = parent;
            }
        }
        Ok(())
    }
}
