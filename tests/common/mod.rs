#![allow(dead_code)]

use anyhow::{anyhow, Result};
use glam::DAffine3;
use image::{Rgb, RgbImage};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use sweep_annotate::config::RenderSettings;
use sweep_annotate::scene::ObjectHandle;
use sweep_annotate::sweep::Property;
use sweep_annotate::{CameraModel, Extent, SceneBackend, SyntheticBackend};

/// Camera ten units up +Z looking at the origin; a cube at the origin and a
/// smaller sphere off to the side, both parented to a pivot empty.
pub const SCENE_TOML: &str = r#"
[[scenes]]
name = "Scene"
background_color = [20, 20, 20]

[scenes.camera]
location = [0.0, 0.0, 10.0]
fov = 50.0

[[scenes.objects]]
name = "Pivot"
kind = "empty"

[[scenes.objects]]
name = "Cube"
kind = "mesh"
parent = "Pivot"
extent = { min = [-1.0, -1.0, -1.0], max = [1.0, 1.0, 1.0] }
color = [200, 120, 40]

[[scenes.objects]]
name = "Sphere"
kind = "mesh"
parent = "Pivot"
location = [3.0, 0.0, 0.0]
extent = { min = [-0.5, -0.5, -0.5], max = [0.5, 0.5, 0.5] }

[[scenes.objects]]
name = "Light"
kind = "light"
location = [4.0, 4.0, 6.0]
energy = 1000.0
"#;

pub fn write_scene(dir: &Path) -> Result<PathBuf> {
    let path = dir.join("scene.toml");
    fs::write(&path, SCENE_TOML)?;
    Ok(path)
}

/// Writes `scene.toml` and `sweep.toml` into `dir`; `extra` is appended to
/// the config verbatim. Output goes to `<dir>/out/train`.
pub fn write_config(dir: &Path, extra: &str) -> Result<PathBuf> {
    write_scene(dir)?;
    let config = format!(
        r#"
[scene]
path = "scene.toml"
name = "Scene"
elements = ["Cube", "Sphere"]
light = "Light"
pivot = "Pivot"

[render]
width = 64
height = 48

[output]
target_path = '{}'
split = "train"

{}
"#,
        dir.join("out").display(),
        extra
    );
    let path = dir.join("sweep.toml");
    fs::write(&path, config)?;
    Ok(path)
}

pub fn split_dir(dir: &Path) -> PathBuf {
    dir.join("out").join("train")
}

/// Writes `count` distinct solid-colour PNGs into `<dir>/bg`.
pub fn write_backgrounds(dir: &Path, count: u8, width: u32, height: u32) -> Result<PathBuf> {
    let bg = dir.join("bg");
    fs::create_dir_all(&bg)?;
    for i in 0..count {
        let img = RgbImage::from_pixel(width, height, Rgb([i * 40, 80, 160]));
        img.save(bg.join(format!("bg_{:02}.png", i)))?;
    }
    Ok(bg)
}

pub fn files_in(dir: &Path) -> Result<Vec<String>> {
    let mut names = Vec::new();
    for entry in fs::read_dir(dir)? {
        names.push(entry?.file_name().to_string_lossy().into_owned());
    }
    names.sort();
    Ok(names)
}

/// Synthetic renderer that fails the renders whose ordinal is in `fail_on`.
pub struct FlakyBackend {
    inner: SyntheticBackend,
    fail_on: HashSet<u64>,
    renders: u64,
}

impl FlakyBackend {
    pub fn failing_on(renders: &[u64]) -> Self {
        Self {
            inner: SyntheticBackend::new(),
            fail_on: renders.iter().copied().collect(),
            renders: 0,
        }
    }
}

impl SceneBackend for FlakyBackend {
    fn name(&self) -> &'static str {
        "flaky"
    }

    fn load_scene(&mut self, path: &Path, scene_name: &str) -> Result<()> {
        self.inner.load_scene(path, scene_name)
    }

    fn configure(&mut self, settings: &RenderSettings) -> Result<()> {
        self.inner.configure(settings)
    }

    fn lookup(&self, object_name: &str) -> Option<ObjectHandle> {
        self.inner.lookup(object_name)
    }

    fn set_active_camera(&mut self, camera: ObjectHandle) -> Result<()> {
        self.inner.set_active_camera(camera)
    }

    fn set_parameter(&mut self, target: ObjectHandle, property: Property, value: f64) -> Result<()> {
        self.inner.set_parameter(target, property, value)
    }

    fn set_background(&mut self, image: Option<&Path>) -> Result<()> {
        self.inner.set_background(image)
    }

    fn render(&mut self) -> Result<RgbImage> {
        let ordinal = self.renders;
        self.renders += 1;
        if self.fail_on.contains(&ordinal) {
            return Err(anyhow!("GPU device lost during render {}", ordinal));
        }
        self.inner.render()
    }

    fn get_transform(&self, target: ObjectHandle) -> Result<DAffine3> {
        self.inner.get_transform(target)
    }

    fn get_extent(&self, target: ObjectHandle) -> Result<Option<Extent>> {
        self.inner.get_extent(target)
    }

    fn get_camera(&self) -> Result<CameraModel> {
        self.inner.get_camera()
    }
}
