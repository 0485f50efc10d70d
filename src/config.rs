use anyhow::{anyhow, Result};
use regex::Regex;
use serde::Deserialize;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use crate::sweep::{SamplingMode, SweepParameter};

const DEFAULT_CAMERA_NAME: &str = "Camera";
const DEFAULT_TARGET_PATH: &str = "dataset";
const DEFAULT_SPLIT: &str = "train";
const DEFAULT_WIDTH: u32 = 640;
const DEFAULT_HEIGHT: u32 = 480;
const DEFAULT_RENDER_SAMPLES: u32 = 64;
const BACKGROUND_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "bmp", "tif", "tiff"];

#[derive(Debug, Deserialize, Default)]
struct SweepConfigFile {
    scene: Option<SceneConfigFile>,
    render: Option<RenderConfigFile>,
    output: Option<OutputConfigFile>,
    sweep: Option<SweepSectionFile>,
}

#[derive(Debug, Deserialize, Default)]
struct SceneConfigFile {
    path: Option<PathBuf>,
    name: Option<String>,
    elements: Option<Vec<String>>,
    camera: Option<String>,
    light: Option<String>,
    pivot: Option<String>,
    background_dir: Option<PathBuf>,
    backgrounds: Option<Vec<PathBuf>>,
}

#[derive(Debug, Deserialize, Default)]
struct RenderConfigFile {
    width: Option<u32>,
    height: Option<u32>,
    samples: Option<u32>,
}

#[derive(Debug, Deserialize, Default)]
struct OutputConfigFile {
    target_path: Option<PathBuf>,
    split: Option<String>,
    debug: Option<bool>,
}

#[derive(Debug, Deserialize, Default)]
struct SweepSectionFile {
    mode: Option<SamplingMode>,
    seed: Option<u64>,
    samples: Option<u64>,
    parameters: Option<Vec<SweepParameter>>,
}

/// Validated sweep configuration.
///
/// Relative scene and background paths are resolved against the directory
/// holding the config file; `output.target_path` is used as given.
#[derive(Debug, Clone)]
pub struct SweepConfig {
    pub scene: SceneSettings,
    pub render: RenderSettings,
    pub output: OutputSettings,
    pub sweep: SweepSettings,
    /// Background images, sorted. Empty means solid-colour background.
    pub backgrounds: Vec<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct SceneSettings {
    pub path: PathBuf,
    pub name: String,
    /// Tracked elements in class-id order.
    pub elements: Vec<String>,
    pub camera: String,
    pub light: Option<String>,
    pub pivot: Option<String>,
}

#[derive(Debug, Clone)]
pub struct RenderSettings {
    pub width: u32,
    pub height: u32,
    pub samples: u32,
}

#[derive(Debug, Clone)]
pub struct OutputSettings {
    pub target_path: PathBuf,
    pub split: String,
    pub debug: bool,
}

#[derive(Debug, Clone)]
pub struct SweepSettings {
    pub mode: SamplingMode,
    pub seed: u64,
    pub samples: Option<u64>,
    pub parameters: Vec<SweepParameter>,
}

impl SweepConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let file_cfg = read_config_file(path)?;
        let base_dir = path.parent().unwrap_or_else(|| Path::new(""));
        let mut cfg = Self::from_file(file_cfg, base_dir)?;
        cfg.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn from_file(file: SweepConfigFile, base_dir: &Path) -> Result<Self> {
        let scene_file = file
            .scene
            .ok_or_else(|| anyhow!("missing required [scene] section"))?;
        let scene_path = scene_file
            .path
            .ok_or_else(|| anyhow!("missing required key scene.path"))?;
        let scene_name = scene_file
            .name
            .ok_or_else(|| anyhow!("missing required key scene.name"))?;
        let elements = scene_file
            .elements
            .ok_or_else(|| anyhow!("missing required key scene.elements"))?;

        let mut backgrounds = Vec::new();
        if let Some(dir) = scene_file.background_dir {
            backgrounds.extend(collect_backgrounds(&resolve(base_dir, dir))?);
        }
        if let Some(listed) = scene_file.backgrounds {
            backgrounds.extend(listed.into_iter().map(|p| resolve(base_dir, p)));
        }
        backgrounds.sort();
        backgrounds.dedup();

        let scene = SceneSettings {
            path: resolve(base_dir, scene_path),
            name: scene_name,
            elements,
            camera: scene_file
                .camera
                .unwrap_or_else(|| DEFAULT_CAMERA_NAME.to_string()),
            light: scene_file.light,
            pivot: scene_file.pivot,
        };
        let render = RenderSettings {
            width: file
                .render
                .as_ref()
                .and_then(|r| r.width)
                .unwrap_or(DEFAULT_WIDTH),
            height: file
                .render
                .as_ref()
                .and_then(|r| r.height)
                .unwrap_or(DEFAULT_HEIGHT),
            samples: file
                .render
                .and_then(|r| r.samples)
                .unwrap_or(DEFAULT_RENDER_SAMPLES),
        };
        let output = OutputSettings {
            target_path: file
                .output
                .as_ref()
                .and_then(|o| o.target_path.clone())
                .unwrap_or_else(|| PathBuf::from(DEFAULT_TARGET_PATH)),
            split: file
                .output
                .as_ref()
                .and_then(|o| o.split.clone())
                .unwrap_or_else(|| DEFAULT_SPLIT.to_string()),
            debug: file.output.and_then(|o| o.debug).unwrap_or(false),
        };
        let sweep_file = file.sweep.unwrap_or_default();
        let sweep = SweepSettings {
            mode: sweep_file.mode.unwrap_or_default(),
            seed: sweep_file.seed.unwrap_or(0),
            samples: sweep_file.samples,
            parameters: sweep_file.parameters.unwrap_or_default(),
        };

        Ok(Self {
            scene,
            render,
            output,
            sweep,
            backgrounds,
        })
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Ok(path) = std::env::var("SDG_TARGET_PATH") {
            if !path.trim().is_empty() {
                self.output.target_path = PathBuf::from(path);
            }
        }
        if let Ok(split) = std::env::var("SDG_SPLIT") {
            if !split.trim().is_empty() {
                self.output.split = split.trim().to_string();
            }
        }
        if let Ok(seed) = std::env::var("SDG_SEED") {
            self.sweep.seed = seed
                .trim()
                .parse()
                .map_err(|_| anyhow!("SDG_SEED must be an unsigned integer"))?;
        }
        if let Ok(samples) = std::env::var("SDG_SAMPLES") {
            let samples: u64 = samples
                .trim()
                .parse()
                .map_err(|_| anyhow!("SDG_SAMPLES must be an unsigned integer"))?;
            self.sweep.samples = Some(samples);
        }
        if let Ok(debug) = std::env::var("SDG_DEBUG") {
            self.output.debug = parse_flag(&debug)
                .ok_or_else(|| anyhow!("SDG_DEBUG must be a boolean flag, got {:?}", debug))?;
        }
        Ok(())
    }

    fn validate(&mut self) -> Result<()> {
        if self.scene.name.trim().is_empty() {
            return Err(anyhow!("scene.name cannot be empty"));
        }
        if self.scene.elements.is_empty() {
            return Err(anyhow!("scene.elements must name at least one tracked element"));
        }
        let mut seen = HashSet::new();
        for name in &self.scene.elements {
            if name.trim().is_empty() {
                return Err(anyhow!("tracked element names cannot be empty"));
            }
            if !seen.insert(name.as_str()) {
                return Err(anyhow!("tracked element {:?} listed more than once", name));
            }
        }

        validate_split(&self.output.split)?;

        if self.render.width == 0 || self.render.height == 0 {
            return Err(anyhow!("render resolution must be non-zero"));
        }
        if self.sweep.samples == Some(0) {
            return Err(anyhow!("sweep.samples must be greater than zero"));
        }
        if self.sweep.mode == SamplingMode::Random && self.sweep.samples.is_none() {
            return Err(anyhow!("random sweeps require sweep.samples"));
        }
        for param in &self.sweep.parameters {
            if param.target.trim().is_empty() {
                return Err(anyhow!("sweep parameter target cannot be empty"));
            }
            param.range.validate().map_err(|e| {
                anyhow!(
                    "sweep parameter {}.{}: {}",
                    param.target,
                    param.property.as_str(),
                    e
                )
            })?;
        }
        Ok(())
    }

    /// Directory that receives this run's split.
    pub fn split_dir(&self) -> PathBuf {
        self.output.target_path.join(&self.output.split)
    }

    /// Every scene object name the run must resolve before rendering.
    pub fn referenced_objects(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.scene.elements.iter().map(String::as_str).collect();
        names.push(&self.scene.camera);
        names.extend(self.scene.light.as_deref());
        names.extend(self.scene.pivot.as_deref());
        names.extend(self.sweep.parameters.iter().map(|p| p.target.as_str()));
        let mut seen = HashSet::new();
        names.retain(|name| seen.insert(*name));
        names
    }
}

pub fn validate_split(split: &str) -> Result<()> {
    static SPLIT_RE: OnceLock<Regex> = OnceLock::new();
    let re = SPLIT_RE.get_or_init(|| {
        Regex::new(r"^[a-z0-9_-]{1,64}$").expect("split name regex is valid")
    });
    if !re.is_match(split) {
        return Err(anyhow!(
            "split name {:?} must match [a-z0-9_-]{{1,64}}",
            split
        ));
    }
    Ok(())
}

fn read_config_file(path: &Path) -> Result<SweepConfigFile> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("failed to read config file {}: {}", path.display(), e))?;
    let is_json = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
    let cfg = if is_json {
        serde_json::from_str(&raw)
            .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?
    } else {
        toml::from_str(&raw)
            .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?
    };
    Ok(cfg)
}

fn collect_backgrounds(dir: &Path) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        log::warn!(
            "background directory {} is not a directory; using solid-colour background",
            dir.display()
        );
        return Ok(Vec::new());
    }
    let mut found = Vec::new();
    for entry in std::fs::read_dir(dir)
        .map_err(|e| anyhow!("failed to list backgrounds in {}: {}", dir.display(), e))?
    {
        let path = entry?.path();
        let is_image = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.to_ascii_lowercase())
            .is_some_and(|ext| BACKGROUND_EXTENSIONS.contains(&ext.as_str()));
        if path.is_file() && is_image {
            found.push(path);
        }
    }
    if found.is_empty() {
        log::warn!(
            "no background images found in {}; using solid-colour background",
            dir.display()
        );
    }
    Ok(found)
}

fn resolve(base_dir: &Path, path: PathBuf) -> PathBuf {
    if path.is_absolute() {
        path
    } else {
        base_dir.join(path)
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(raw: &str) -> Result<SweepConfig> {
        let file: SweepConfigFile = toml::from_str(raw)?;
        let mut cfg = SweepConfig::from_file(file, Path::new("/configs"))?;
        cfg.validate()?;
        Ok(cfg)
    }

    #[test]
    fn applies_defaults_and_resolves_scene_path() {
        let cfg = parse(
            r#"
            [scene]
            path = "scenes/demo.toml"
            name = "Scene"
            elements = ["Cube"]
            "#,
        )
        .unwrap();
        assert_eq!(cfg.scene.path, PathBuf::from("/configs/scenes/demo.toml"));
        assert_eq!(cfg.scene.camera, "Camera");
        assert_eq!(cfg.output.split, "train");
        assert_eq!(cfg.render.width, 640);
        assert_eq!(cfg.sweep.mode, SamplingMode::Grid);
        assert!(!cfg.output.debug);
        assert!(cfg.backgrounds.is_empty());
    }

    #[test]
    fn missing_elements_is_an_error() {
        let err = parse(
            r#"
            [scene]
            path = "demo.toml"
            name = "Scene"
            "#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("scene.elements"));
    }

    #[test]
    fn duplicate_elements_are_rejected() {
        assert!(parse(
            r#"
            [scene]
            path = "demo.toml"
            name = "Scene"
            elements = ["Cube", "Cube"]
            "#,
        )
        .is_err());
    }

    #[test]
    fn invalid_split_name_is_rejected() {
        assert!(parse(
            r#"
            [scene]
            path = "demo.toml"
            name = "Scene"
            elements = ["Cube"]
            [output]
            split = "Train Set"
            "#,
        )
        .is_err());
    }

    #[test]
    fn inverted_parameter_range_fails_at_load() {
        let err = parse(
            r#"
            [scene]
            path = "demo.toml"
            name = "Scene"
            elements = ["Cube"]
            [[sweep.parameters]]
            target = "Camera"
            property = "location_z"
            range = { kind = "uniform", min = 9.0, max = 2.0, steps = 3 }
            "#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("Camera.location_z"));
    }

    #[test]
    fn referenced_objects_are_deduplicated() {
        let cfg = parse(
            r#"
            [scene]
            path = "demo.toml"
            name = "Scene"
            elements = ["Cube", "Sphere"]
            pivot = "Axis"
            [[sweep.parameters]]
            target = "Axis"
            property = "rotation_z"
            range = { kind = "fixed", value = 0.0 }
            [[sweep.parameters]]
            target = "Cube"
            property = "scale"
            range = { kind = "discrete", values = [1.0, 2.0] }
            "#,
        )
        .unwrap();
        assert_eq!(
            cfg.referenced_objects(),
            vec!["Cube", "Sphere", "Camera", "Axis"]
        );
    }

    #[test]
    fn parses_boolean_flags() {
        assert_eq!(parse_flag("TRUE"), Some(true));
        assert_eq!(parse_flag(" off "), Some(false));
        assert_eq!(parse_flag("maybe"), None);
    }
}
