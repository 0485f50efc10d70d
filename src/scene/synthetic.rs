//! Synthetic rendering backend.
//!
//! Stands in for a real renderer: it loads a [`SceneDescription`], applies
//! parameter updates to an in-memory object table and "renders" each mesh as
//! its flat-shaded projected hull over the background. Useful for dry runs,
//! pipeline tests and for checking annotation geometry without a renderer.

use anyhow::{anyhow, Result};
use glam::{DAffine3, DVec3};
use image::{imageops, Rgb, RgbImage};
use std::path::Path;

use super::backend::{ObjectHandle, SceneBackend};
use super::description::{ObjectKind, SceneDescription, SceneFile};
use crate::config::RenderSettings;
use crate::projection::{self, euler_xyz_degrees, CameraModel, Extent, Intrinsics};
use crate::sweep::Property;

/// Light energy that renders meshes at their nominal colour.
const REFERENCE_ENERGY: f64 = 1000.0;

#[derive(Clone, Debug)]
struct SceneObject {
    name: String,
    kind: SlotKind,
    location: DVec3,
    rotation_deg: DVec3,
    scale: f64,
    extent: Option<Extent>,
    parent: Option<usize>,
    energy: f64,
    color: [u8; 3],
}

#[derive(Clone, Copy, Debug, PartialEq)]
enum SlotKind {
    Camera { fov_deg: f64, near: f64 },
    Object(ObjectKind),
}

pub struct SyntheticBackend {
    objects: Vec<SceneObject>,
    active_camera: Option<usize>,
    background_color: [u8; 3],
    background: Option<RgbImage>,
    configured: (u32, u32),
    resolution: (u32, u32),
}

impl SyntheticBackend {
    pub fn new() -> Self {
        Self {
            objects: Vec::new(),
            active_camera: None,
            background_color: [0, 0, 0],
            background: None,
            configured: (640, 480),
            resolution: (640, 480),
        }
    }

    /// Loads a scene description directly, bypassing the scene file.
    pub fn from_description(scene: &SceneDescription) -> Result<Self> {
        let mut backend = Self::new();
        backend.install(scene)?;
        Ok(backend)
    }

    fn install(&mut self, scene: &SceneDescription) -> Result<()> {
        scene.validate()?;
        let mut objects = Vec::with_capacity(scene.objects.len() + 1);
        let camera = &scene.camera;
        objects.push(SceneObject {
            name: camera.name.clone(),
            kind: SlotKind::Camera {
                fov_deg: camera.fov,
                near: camera.near,
            },
            location: DVec3::from_array(camera.location),
            rotation_deg: DVec3::from_array(camera.rotation),
            scale: 1.0,
            extent: None,
            parent: None,
            energy: 0.0,
            color: [0, 0, 0],
        });
        for object in &scene.objects {
            objects.push(SceneObject {
                name: object.name.clone(),
                kind: SlotKind::Object(object.kind),
                location: DVec3::from_array(object.location),
                rotation_deg: DVec3::from_array(object.rotation),
                scale: object.scale,
                extent: object
                    .extent
                    .map(|e| Extent::new(DVec3::from_array(e.min), DVec3::from_array(e.max))),
                parent: None,
                energy: object.energy,
                color: object.color.unwrap_or_else(|| color_for(&object.name)),
            });
        }

        let parent_names = std::iter::once(camera.parent.as_deref())
            .chain(scene.objects.iter().map(|o| o.parent.as_deref()));
        let mut parents = Vec::with_capacity(objects.len());
        for parent in parent_names {
            let idx = match parent {
                Some(name) => Some(
                    objects
                        .iter()
                        .position(|o| o.name == name)
                        .ok_or_else(|| anyhow!("unknown parent {:?}", name))?,
                ),
                None => None,
            };
            parents.push(idx);
        }
        for (object, parent) in objects.iter_mut().zip(parents) {
            object.parent = parent;
        }

        self.objects = objects;
        self.active_camera = Some(0);
        self.background_color = scene.background_color;
        self.background = None;
        Ok(())
    }

    fn object(&self, handle: ObjectHandle) -> Result<&SceneObject> {
        self.objects
            .get(handle.raw())
            .ok_or_else(|| anyhow!("stale object handle {}", handle.raw()))
    }

    fn world_transform(&self, idx: usize) -> DAffine3 {
        let mut transform = local_transform(&self.objects[idx]);
        let mut parent = self.objects[idx].parent;
        while let Some(p) = parent {
            transform = local_transform(&self.objects[p]) * transform;
            parent = self.objects[p].parent;
        }
        transform
    }

    fn camera_model(&self) -> Result<CameraModel> {
        let idx = self
            .active_camera
            .ok_or_else(|| anyhow!("no scene loaded"))?;
        let SlotKind::Camera { fov_deg, near } = self.objects[idx].kind else {
            return Err(anyhow!("{:?} is not a camera", self.objects[idx].name));
        };
        let world = self.world_transform(idx);
        // Cameras ignore scale so the view stays rigid.
        let (_, rotation, translation) = world.to_scale_rotation_translation();
        Ok(CameraModel {
            world_from_camera: DAffine3::from_rotation_translation(rotation, translation),
            intrinsics: Intrinsics::from_fov(fov_deg.to_radians(), self.resolution.0, self.resolution.1),
            near,
        })
    }

    fn light_factor(&self) -> f64 {
        let energies: Vec<f64> = self
            .objects
            .iter()
            .filter(|o| o.kind == SlotKind::Object(ObjectKind::Light))
            .map(|o| o.energy)
            .collect();
        if energies.is_empty() {
            return 1.0;
        }
        let total: f64 = energies.iter().sum();
        (total / REFERENCE_ENERGY).clamp(0.15, 1.5)
    }
}

impl Default for SyntheticBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl SceneBackend for SyntheticBackend {
    fn name(&self) -> &'static str {
        "synthetic"
    }

    fn load_scene(&mut self, path: &Path, scene_name: &str) -> Result<()> {
        let file = SceneFile::read(path)?;
        let scene = file.scene(scene_name)?;
        self.install(scene)
    }

    fn configure(&mut self, settings: &RenderSettings) -> Result<()> {
        if settings.width == 0 || settings.height == 0 {
            return Err(anyhow!("render resolution must be non-zero"));
        }
        self.configured = (settings.width, settings.height);
        self.resolution = self.configured;
        log::debug!(
            "synthetic backend configured at {}x{} ({} samples ignored)",
            settings.width,
            settings.height,
            settings.samples
        );
        Ok(())
    }

    fn lookup(&self, object_name: &str) -> Option<ObjectHandle> {
        self.objects
            .iter()
            .position(|o| o.name == object_name)
            .map(ObjectHandle::new)
    }

    fn set_active_camera(&mut self, camera: ObjectHandle) -> Result<()> {
        let object = self.object(camera)?;
        if !matches!(object.kind, SlotKind::Camera { .. }) {
            return Err(anyhow!("{:?} is not a camera", object.name));
        }
        self.active_camera = Some(camera.raw());
        Ok(())
    }

    fn set_parameter(
        &mut self,
        target: ObjectHandle,
        property: Property,
        value: f64,
    ) -> Result<()> {
        if !value.is_finite() {
            return Err(anyhow!("parameter value must be finite"));
        }
        self.object(target)?;
        let object = &mut self.objects[target.raw()];
        match property {
            Property::LocationX => object.location.x = value,
            Property::LocationY => object.location.y = value,
            Property::LocationZ => object.location.z = value,
            Property::RotationX => object.rotation_deg.x = value,
            Property::RotationY => object.rotation_deg.y = value,
            Property::RotationZ => object.rotation_deg.z = value,
            Property::Scale => {
                if value <= 0.0 {
                    return Err(anyhow!("scale of {:?} must be positive", object.name));
                }
                object.scale = value;
            }
            Property::Energy => {
                if object.kind != SlotKind::Object(ObjectKind::Light) {
                    return Err(anyhow!("{:?} is not a light", object.name));
                }
                if value < 0.0 {
                    return Err(anyhow!("light energy cannot be negative"));
                }
                object.energy = value;
            }
        }
        Ok(())
    }

    fn set_background(&mut self, image: Option<&Path>) -> Result<()> {
        match image {
            Some(path) => match image::open(path) {
                Ok(img) => {
                    let rgb = img.to_rgb8();
                    self.resolution = rgb.dimensions();
                    self.background = Some(rgb);
                }
                Err(e) => {
                    log::warn!(
                        "could not load background {}: {}; using solid colour",
                        path.display(),
                        e
                    );
                    self.background = None;
                    self.resolution = self.configured;
                }
            },
            None => {
                self.background = None;
                self.resolution = self.configured;
            }
        }
        Ok(())
    }

    fn render(&mut self) -> Result<RgbImage> {
        let camera = self.camera_model()?;
        let (width, height) = self.resolution;
        let mut frame = match &self.background {
            Some(bg) if bg.dimensions() == (width, height) => bg.clone(),
            Some(bg) => imageops::resize(bg, width, height, imageops::FilterType::Triangle),
            None => RgbImage::from_pixel(width, height, Rgb(self.background_color)),
        };

        let mut meshes: Vec<(f64, usize)> = self
            .objects
            .iter()
            .enumerate()
            .filter(|(_, o)| o.kind == SlotKind::Object(ObjectKind::Mesh) && o.extent.is_some())
            .map(|(idx, o)| {
                let center = self.world_transform(idx).transform_point3(
                    o.extent.map(|e| e.center()).unwrap_or_default(),
                );
                (camera.depth_of(center), idx)
            })
            .collect();
        // Painter's order: farthest first.
        meshes.sort_by(|a, b| b.0.total_cmp(&a.0));

        let shade = self.light_factor();
        for (_, idx) in meshes {
            let object = &self.objects[idx];
            let projection =
                projection::project(&self.world_transform(idx), object.extent.as_ref(), &camera);
            let Some(bbox) = projection.rect().copied() else {
                continue;
            };
            let color = Rgb(object.color.map(|c| (c as f64 * shade).min(255.0) as u8));
            let x0 = bbox.xmin.floor() as u32;
            let y0 = bbox.ymin.floor() as u32;
            let x1 = (bbox.xmax.ceil() as u32).min(width);
            let y1 = (bbox.ymax.ceil() as u32).min(height);
            for y in y0..y1 {
                for x in x0..x1 {
                    frame.put_pixel(x, y, color);
                }
            }
        }

        Ok(frame)
    }

    fn get_transform(&self, target: ObjectHandle) -> Result<DAffine3> {
        self.object(target)?;
        Ok(self.world_transform(target.raw()))
    }

    fn get_extent(&self, target: ObjectHandle) -> Result<Option<Extent>> {
        Ok(self.object(target)?.extent)
    }

    fn get_camera(&self) -> Result<CameraModel> {
        self.camera_model()
    }
}

fn local_transform(object: &SceneObject) -> DAffine3 {
    DAffine3::from_scale_rotation_translation(
        DVec3::splat(object.scale),
        euler_xyz_degrees(object.rotation_deg),
        object.location,
    )
}

/// Stable per-name colour so reruns render identical pixels.
fn color_for(name: &str) -> [u8; 3] {
    let hash = name
        .bytes()
        .fold(0x811c_9dc5u32, |acc, b| (acc ^ b as u32).wrapping_mul(0x0100_0193));
    [
        64 + (hash & 0x7f) as u8,
        64 + ((hash >> 8) & 0x7f) as u8,
        64 + ((hash >> 16) & 0x7f) as u8,
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::description::SceneFile;

    fn backend() -> SyntheticBackend {
        let file: SceneFile = toml::from_str(
            r#"
            [[scenes]]
            name = "Scene"
            background_color = [0, 0, 0]
            [scenes.camera]
            location = [0.0, 0.0, 10.0]
            fov = 90.0

            [[scenes.objects]]
            name = "Axis"
            kind = "empty"

            [[scenes.objects]]
            name = "Cube"
            kind = "mesh"
            parent = "Axis"
            location = [2.0, 0.0, 0.0]
            color = [200, 100, 50]
            extent = { min = [-1.0, -1.0, -1.0], max = [1.0, 1.0, 1.0] }

            [[scenes.objects]]
            name = "Light"
            kind = "light"
            "#,
        )
        .unwrap();
        let mut backend = SyntheticBackend::from_description(&file.scenes[0]).unwrap();
        backend
            .configure(&RenderSettings {
                width: 100,
                height: 100,
                samples: 1,
            })
            .unwrap();
        backend
    }

    #[test]
    fn parent_rotation_moves_children() {
        let mut backend = backend();
        let axis = backend.lookup("Axis").unwrap();
        let cube = backend.lookup("Cube").unwrap();
        backend
            .set_parameter(axis, Property::RotationZ, 90.0)
            .unwrap();
        let world = backend.get_transform(cube).unwrap();
        let origin = world.transform_point3(DVec3::ZERO);
        assert!((origin - DVec3::new(0.0, 2.0, 0.0)).length() < 1e-9);
    }

    #[test]
    fn render_paints_mesh_over_background() {
        let mut backend = backend();
        let frame = backend.render().unwrap();
        assert_eq!(frame.dimensions(), (100, 100));
        assert_eq!(frame.get_pixel(0, 0), &Rgb([0, 0, 0]));
        // Cube centre projects to x = 50 + 50 * 2 / 10 = 60.
        assert_eq!(frame.get_pixel(60, 50), &Rgb([200, 100, 50]));
    }

    #[test]
    fn energy_only_applies_to_lights() {
        let mut backend = backend();
        let cube = backend.lookup("Cube").unwrap();
        let light = backend.lookup("Light").unwrap();
        assert!(backend.set_parameter(cube, Property::Energy, 10.0).is_err());
        backend
            .set_parameter(light, Property::Energy, 500.0)
            .unwrap();
        let frame = backend.render().unwrap();
        assert_eq!(frame.get_pixel(60, 50), &Rgb([100, 50, 25]));
    }

    #[test]
    fn background_image_sets_resolution() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("bg.png");
        RgbImage::from_pixel(32, 24, Rgb([9, 9, 9])).save(&path)?;

        let mut backend = backend();
        backend.set_background(Some(&path))?;
        assert_eq!(backend.get_camera()?.intrinsics.width, 32);
        let frame = backend.render()?;
        assert_eq!(frame.dimensions(), (32, 24));

        backend.set_background(Some(&dir.path().join("missing.png")))?;
        assert_eq!(backend.render()?.dimensions(), (100, 100));
        Ok(())
    }

    #[test]
    fn camera_cannot_be_a_mesh() {
        let mut backend = backend();
        let cube = backend.lookup("Cube").unwrap();
        assert!(backend.set_active_camera(cube).is_err());
    }
}
