use anyhow::Result;
use glam::DAffine3;
use image::RgbImage;
use std::path::Path;

use crate::config::RenderSettings;
use crate::projection::{CameraModel, Extent};
use crate::sweep::Property;

/// Opaque reference to a scene object, valid for the scene it was looked up in.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ObjectHandle(pub(crate) usize);

impl ObjectHandle {
    pub fn new(raw: usize) -> Self {
        Self(raw)
    }

    pub fn raw(&self) -> usize {
        self.0
    }
}

/// Rendering collaborator.
///
/// A backend holds exactly one "current" scene configuration and is not
/// reentrant. The pipeline gives it to a single [`super::SceneDriver`], which
/// is then the only code allowed to mutate it.
///
/// Transforms, extents and the camera must be read back after `render`:
/// backends may adjust requested values (resolution, constraints) while
/// rendering.
pub trait SceneBackend {
    /// Backend identifier.
    fn name(&self) -> &'static str;

    /// Open `scene_name` from the scene file at `path`.
    fn load_scene(&mut self, path: &Path, scene_name: &str) -> Result<()>;

    /// Apply output resolution and sampling settings.
    fn configure(&mut self, settings: &RenderSettings) -> Result<()>;

    /// Resolve an object by name in the loaded scene.
    fn lookup(&self, object_name: &str) -> Option<ObjectHandle>;

    /// Select the camera used by `render` and `get_camera`.
    fn set_active_camera(&mut self, camera: ObjectHandle) -> Result<()>;

    fn set_parameter(&mut self, target: ObjectHandle, property: Property, value: f64)
        -> Result<()>;

    /// `None` restores the solid-colour background.
    fn set_background(&mut self, image: Option<&Path>) -> Result<()>;

    fn render(&mut self) -> Result<RgbImage>;

    /// World transform of an object.
    fn get_transform(&self, target: ObjectHandle) -> Result<DAffine3>;

    /// Local-space extent, `None` for objects without geometry.
    fn get_extent(&self, target: ObjectHandle) -> Result<Option<Extent>>;

    fn get_camera(&self) -> Result<CameraModel>;
}

impl<B: SceneBackend + ?Sized> SceneBackend for Box<B> {
    fn name(&self) -> &'static str {
        (**self).name()
    }

    fn load_scene(&mut self, path: &Path, scene_name: &str) -> Result<()> {
        (**self).load_scene(path, scene_name)
    }

    fn configure(&mut self, settings: &RenderSettings) -> Result<()> {
        (**self).configure(settings)
    }

    fn lookup(&self, object_name: &str) -> Option<ObjectHandle> {
        (**self).lookup(object_name)
    }

    fn set_active_camera(&mut self, camera: ObjectHandle) -> Result<()> {
        (**self).set_active_camera(camera)
    }

    fn set_parameter(
        &mut self,
        target: ObjectHandle,
        property: Property,
        value: f64,
    ) -> Result<()> {
        (**self).set_parameter(target, property, value)
    }

    fn set_background(&mut self, image: Option<&Path>) -> Result<()> {
        (**self).set_background(image)
    }

    fn render(&mut self) -> Result<RgbImage> {
        (**self).render()
    }

    fn get_transform(&self, target: ObjectHandle) -> Result<DAffine3> {
        (**self).get_transform(target)
    }

    fn get_extent(&self, target: ObjectHandle) -> Result<Option<Extent>> {
        (**self).get_extent(target)
    }

    fn get_camera(&self) -> Result<CameraModel> {
        (**self).get_camera()
    }
}
