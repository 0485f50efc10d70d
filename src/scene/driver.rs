use anyhow::{anyhow, Context, Result};
use glam::DAffine3;
use image::RgbImage;
use std::collections::HashMap;

use super::backend::{ObjectHandle, SceneBackend};
use crate::config::SweepConfig;
use crate::projection::{CameraModel, Extent};
use crate::sweep::SceneState;

/// A tracked element resolved against the loaded scene.
#[derive(Clone, Debug)]
struct TrackedElement {
    name: String,
    class_id: usize,
    handle: ObjectHandle,
}

/// Authoritative pose of one tracked element after a render.
#[derive(Clone, Debug)]
pub struct ElementPose {
    pub name: String,
    pub class_id: usize,
    pub transform: DAffine3,
    pub extent: Option<Extent>,
}

/// Everything one render produced. Consumed by projection and annotation.
#[derive(Clone, Debug)]
pub struct RenderResult {
    pub state_index: u64,
    pub image: RgbImage,
    pub camera: CameraModel,
    pub elements: Vec<ElementPose>,
}

/// Exclusive owner of the rendering collaborator.
///
/// Every name the configuration mentions is resolved in [`SceneDriver::open`],
/// so an unknown element fails before anything is rendered.
pub struct SceneDriver<B: SceneBackend> {
    backend: B,
    elements: Vec<TrackedElement>,
    targets: HashMap<String, ObjectHandle>,
}

impl<B: SceneBackend> SceneDriver<B> {
    pub fn open(mut backend: B, config: &SweepConfig) -> Result<Self> {
        let scene = &config.scene;
        backend
            .load_scene(&scene.path, &scene.name)
            .with_context(|| {
                format!(
                    "loading scene {:?} from {}",
                    scene.name,
                    scene.path.display()
                )
            })?;
        backend.configure(&config.render)?;

        let mut targets = HashMap::new();
        for name in config.referenced_objects() {
            let handle = backend.lookup(name).ok_or_else(|| {
                anyhow!("object {:?} not found in scene {:?}", name, scene.name)
            })?;
            targets.insert(name.to_string(), handle);
        }

        let camera = targets[scene.camera.as_str()];
        backend.set_active_camera(camera)?;

        let elements = scene
            .elements
            .iter()
            .enumerate()
            .map(|(class_id, name)| TrackedElement {
                name: name.clone(),
                class_id,
                handle: targets[name.as_str()],
            })
            .collect();

        log::info!(
            "scene {:?} opened with {} backend, {} tracked elements",
            scene.name,
            backend.name(),
            scene.elements.len()
        );

        Ok(Self {
            backend,
            elements,
            targets,
        })
    }

    /// Applies `state`, renders it and reads back the resolved camera and
    /// element poses.
    pub fn apply(&mut self, state: &SceneState) -> Result<RenderResult> {
        for assignment in &state.assignments {
            let handle = *self.targets.get(&assignment.target).ok_or_else(|| {
                anyhow!("sweep target {:?} was not resolved", assignment.target)
            })?;
            self.backend
                .set_parameter(handle, assignment.property, assignment.value)
                .with_context(|| {
                    format!(
                        "setting {}.{} = {}",
                        assignment.target,
                        assignment.property.as_str(),
                        assignment.value
                    )
                })?;
        }
        self.backend.set_background(state.background.as_deref())?;

        let image = self.backend.render()?;
        let camera = self.backend.get_camera()?;
        if (image.width(), image.height()) != (camera.intrinsics.width, camera.intrinsics.height) {
            return Err(anyhow!(
                "rendered image is {}x{} but camera reports {}x{}",
                image.width(),
                image.height(),
                camera.intrinsics.width,
                camera.intrinsics.height
            ));
        }

        let mut elements = Vec::with_capacity(self.elements.len());
        for element in &self.elements {
            elements.push(ElementPose {
                name: element.name.clone(),
                class_id: element.class_id,
                transform: self.backend.get_transform(element.handle)?,
                extent: self.backend.get_extent(element.handle)?,
            });
        }

        Ok(RenderResult {
            state_index: state.index,
            image,
            camera,
            elements,
        })
    }
}
