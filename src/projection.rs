//! Camera model and 3D-to-2D box projection.
//!
//! Cameras follow the usual DCC convention: the camera looks down its local
//! -Z axis with +Y up. Image space has its origin at the top-left corner,
//! x to the right and y down, measured in pixels.

use glam::{DAffine3, DVec3};
use serde::{Deserialize, Serialize, Serializer};

/// Pinhole intrinsics in pixels.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Intrinsics {
    pub fx: f64,
    pub fy: f64,
    pub cx: f64,
    pub cy: f64,
    pub width: u32,
    pub height: u32,
}

impl Intrinsics {
    /// Square-pixel intrinsics where `fov_rad` spans the larger image
    /// dimension (automatic sensor fit).
    pub fn from_fov(fov_rad: f64, width: u32, height: u32) -> Self {
        let span = width.max(height) as f64;
        let f = (span / 2.0) / (fov_rad / 2.0).tan();
        Self {
            fx: f,
            fy: f,
            cx: width as f64 / 2.0,
            cy: height as f64 / 2.0,
            width,
            height,
        }
    }
}

/// Resolved camera of one rendered state.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CameraModel {
    pub world_from_camera: DAffine3,
    pub intrinsics: Intrinsics,
    /// Near clip distance along the viewing axis.
    pub near: f64,
}

impl CameraModel {
    /// Depth of a world point along the viewing direction. Positive is in front.
    pub fn depth_of(&self, world: DVec3) -> f64 {
        -self.world_from_camera.inverse().transform_point3(world).z
    }

    /// Projects a world point to pixel coordinates, or `None` when the point
    /// is not in front of the near plane.
    pub fn project_point(&self, world: DVec3) -> Option<(f64, f64)> {
        self.project_camera_point(self.world_from_camera.inverse().transform_point3(world))
    }

    fn project_camera_point(&self, cam: DVec3) -> Option<(f64, f64)> {
        let depth = -cam.z;
        if !depth.is_finite() || depth <= self.near {
            return None;
        }
        let k = &self.intrinsics;
        let u = k.cx + k.fx * cam.x / depth;
        let v = k.cy - k.fy * cam.y / depth;
        if u.is_finite() && v.is_finite() {
            Some((u, v))
        } else {
            None
        }
    }
}

/// Local-space axis-aligned extent of an element.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Extent {
    pub min: DVec3,
    pub max: DVec3,
}

impl Extent {
    pub fn new(min: DVec3, max: DVec3) -> Self {
        Self {
            min: min.min(max),
            max: min.max(max),
        }
    }

    pub fn corners(&self) -> [DVec3; 8] {
        let (a, b) = (self.min, self.max);
        [
            DVec3::new(a.x, a.y, a.z),
            DVec3::new(b.x, a.y, a.z),
            DVec3::new(a.x, b.y, a.z),
            DVec3::new(b.x, b.y, a.z),
            DVec3::new(a.x, a.y, b.z),
            DVec3::new(b.x, a.y, b.z),
            DVec3::new(a.x, b.y, b.z),
            DVec3::new(b.x, b.y, b.z),
        ]
    }

    pub fn center(&self) -> DVec3 {
        (self.min + self.max) * 0.5
    }
}

/// Axis-aligned pixel rectangle. Coordinates stay unrounded in memory and
/// are rounded only when serialized.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct PixelRect {
    #[serde(serialize_with = "round_coord")]
    pub xmin: f64,
    #[serde(serialize_with = "round_coord")]
    pub ymin: f64,
    #[serde(serialize_with = "round_coord")]
    pub xmax: f64,
    #[serde(serialize_with = "round_coord")]
    pub ymax: f64,
}

impl PixelRect {
    pub fn width(&self) -> f64 {
        self.xmax - self.xmin
    }

    pub fn height(&self) -> f64 {
        self.ymax - self.ymin
    }

    pub fn center(&self) -> (f64, f64) {
        (
            (self.xmin + self.xmax) / 2.0,
            (self.ymin + self.ymax) / 2.0,
        )
    }

    fn clamp_to(&self, width: f64, height: f64) -> PixelRect {
        PixelRect {
            xmin: self.xmin.clamp(0.0, width),
            ymin: self.ymin.clamp(0.0, height),
            xmax: self.xmax.clamp(0.0, width),
            ymax: self.ymax.clamp(0.0, height),
        }
    }

    fn within(&self, width: f64, height: f64) -> bool {
        self.xmin >= 0.0 && self.ymin >= 0.0 && self.xmax <= width && self.ymax <= height
    }
}

fn round_coord<S: Serializer>(value: &f64, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_f64((value * 1000.0).round() / 1000.0)
}

/// Outcome of projecting one element. Absent boxes carry no coordinates.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "visibility", rename_all = "snake_case")]
pub enum Projection {
    Visible { bbox: PixelRect },
    /// Extends past the frame or the near plane; `bbox` is the clamped part.
    PartiallyClipped { bbox: PixelRect },
    Absent,
}

impl Projection {
    pub fn rect(&self) -> Option<&PixelRect> {
        match self {
            Projection::Visible { bbox } | Projection::PartiallyClipped { bbox } => Some(bbox),
            Projection::Absent => None,
        }
    }

    pub fn is_absent(&self) -> bool {
        matches!(self, Projection::Absent)
    }

    pub fn visibility_name(&self) -> &'static str {
        match self {
            Projection::Visible { .. } => "visible",
            Projection::PartiallyClipped { .. } => "partially_clipped",
            Projection::Absent => "absent",
        }
    }
}

/// Projects an element's oriented extent and classifies its visibility.
///
/// Corners at or behind the near plane are dropped from the enclosing
/// rectangle; dropping any of them marks the box partially clipped. A
/// missing extent, all corners dropped, or no positive-area overlap with
/// the frame yields [`Projection::Absent`].
pub fn project(
    element_transform: &DAffine3,
    element_extent: Option<&Extent>,
    camera: &CameraModel,
) -> Projection {
    let Some(extent) = element_extent else {
        return Projection::Absent;
    };
    let camera_from_element = camera.world_from_camera.inverse() * *element_transform;

    let mut rect: Option<PixelRect> = None;
    let mut dropped = false;
    for corner in extent.corners() {
        let cam = camera_from_element.transform_point3(corner);
        let Some((u, v)) = camera.project_camera_point(cam) else {
            dropped = true;
            continue;
        };
        rect = Some(match rect {
            None => PixelRect {
                xmin: u,
                ymin: v,
                xmax: u,
                ymax: v,
            },
            Some(r) => PixelRect {
                xmin: r.xmin.min(u),
                ymin: r.ymin.min(v),
                xmax: r.xmax.max(u),
                ymax: r.ymax.max(v),
            },
        });
    }
    let Some(unclipped) = rect else {
        return Projection::Absent;
    };

    let width = camera.intrinsics.width as f64;
    let height = camera.intrinsics.height as f64;
    let clipped = unclipped.clamp_to(width, height);
    if clipped.width() <= 0.0 || clipped.height() <= 0.0 {
        return Projection::Absent;
    }

    if dropped || !unclipped.within(width, height) {
        Projection::PartiallyClipped { bbox: clipped }
    } else {
        Projection::Visible { bbox: clipped }
    }
}

/// Rotation from XYZ Euler angles in degrees, applied X first then Y then Z.
pub fn euler_xyz_degrees(rotation: DVec3) -> glam::DQuat {
    glam::DQuat::from_rotation_z(rotation.z.to_radians())
        * glam::DQuat::from_rotation_y(rotation.y.to_radians())
        * glam::DQuat::from_rotation_x(rotation.x.to_radians())
}
