// camera.rs — camera intrinsics, pixel/angle mapping and camera pose

use crate::error::ProjectionError;
use crate::geo::Location;
use glam::{DMat3, DVec3};
use serde::{Deserialize, Serialize};

/// Image pixel coordinates, origin at the top left.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PixelPosition {
    pub x: u32,
    pub y: u32,
}

impl PixelPosition {
    pub fn new(x: u32, y: u32) -> Self {
        Self { x, y }
    }
}

/// How the vertical field of view is obtained from the horizontal one.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "policy", content = "deg")]
pub enum VerticalFov {
    /// `hfov * vres / hres`: both axes share one angular resolution.
    #[default]
    ScaledByAspect,
    /// Pinhole with square pixels: `2 atan(tan(hfov / 2) * vres / hres)`.
    SameFocalLength,
    /// Separately calibrated vertical FOV in degrees.
    Explicit(f64),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraParams {
    pub horizontal_resolution: u32,
    pub vertical_resolution: u32,
    pub fov_deg: f64,
    pub vertical_fov: VerticalFov,
}

impl CameraParams {
    pub fn new(horizontal_resolution: u32, vertical_resolution: u32, fov_deg: f64) -> Self {
        Self {
            horizontal_resolution,
            vertical_resolution,
            fov_deg,
            vertical_fov: VerticalFov::default(),
        }
    }

    pub fn with_vertical_fov(mut self, vertical_fov: VerticalFov) -> Self {
        self.vertical_fov = vertical_fov;
        self
    }
}

fn check_fov(name: &str, fov_deg: f64) -> Result<(), ProjectionError> {
    if !fov_deg.is_finite() || fov_deg <= 0.0 || fov_deg >= 180.0 {
        return Err(ProjectionError::InvalidParameter(format!(
            "{name} must be in (0, 180) degrees, got {fov_deg}"
        )));
    }
    Ok(())
}

/// Validated camera intrinsics with both axis FOVs resolved.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraModel {
    width: u32,
    height: u32,
    hfov_deg: f64,
    vfov_deg: f64,
}

impl CameraModel {
    pub fn new(params: CameraParams) -> Result<Self, ProjectionError> {
        let CameraParams {
            horizontal_resolution: width,
            vertical_resolution: height,
            fov_deg,
            vertical_fov,
        } = params;

        if width == 0 || height == 0 {
            return Err(ProjectionError::InvalidParameter(format!(
                "resolution must be positive, got {width}x{height}"
            )));
        }
        check_fov("field of view", fov_deg)?;

        let aspect = height as f64 / width as f64;
        let vfov_deg = match vertical_fov {
            VerticalFov::ScaledByAspect => fov_deg * aspect,
            VerticalFov::SameFocalLength => {
                2.0 * ((fov_deg.to_radians() * 0.5).tan() * aspect).atan().to_degrees()
            }
            VerticalFov::Explicit(v) => v,
        };
        // a very tall sensor can push the scaled value past the limit
        check_fov("vertical field of view", vfov_deg)?;

        Ok(Self {
            width,
            height,
            hfov_deg: fov_deg,
            vfov_deg,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn horizontal_fov_deg(&self) -> f64 {
        self.hfov_deg
    }

    pub fn vertical_fov_deg(&self) -> f64 {
        self.vfov_deg
    }

    /// Degrees per pixel along (x, y).
    pub fn angular_resolution(&self) -> (f64, f64) {
        (
            self.hfov_deg / self.width as f64,
            self.vfov_deg / self.height as f64,
        )
    }

    pub fn contains(&self, pixel: PixelPosition) -> bool {
        pixel.x <= self.width && pixel.y <= self.height
    }

    /// Angular offset (radians) of a pixel from boresight: positive x is right, positive y is
    /// down. Pixel (0, 0) sits on the top-left extreme of the field of view.
    pub fn pixel_angles(&self, x: f64, y: f64) -> (f64, f64) {
        let (res_x, res_y) = self.angular_resolution();
        let ax = (x - self.width as f64 * 0.5) * res_x;
        let ay = (y - self.height as f64 * 0.5) * res_y;
        (ax.to_radians(), ay.to_radians())
    }

    /// Inverse of [`CameraModel::pixel_angles`]; returns sub-pixel coordinates.
    pub fn pixel_for_angles(&self, ax: f64, ay: f64) -> (f64, f64) {
        let (res_x, res_y) = self.angular_resolution();
        (
            ax.to_degrees() / res_x + self.width as f64 * 0.5,
            ay.to_degrees() / res_y + self.height as f64 * 0.5,
        )
    }

    /// Unit ray in the camera frame (forward x, right y, down z) for a pixel.
    pub fn pixel_ray(&self, x: f64, y: f64) -> DVec3 {
        let (ax, ay) = self.pixel_angles(x, y);
        DVec3::new(1.0, ax.tan(), ay.tan()).normalize()
    }

    /// Sub-pixel position seen along a camera-frame ray, `None` if it points backwards.
    pub fn pixel_for_ray(&self, ray: DVec3) -> Option<(f64, f64)> {
        if ray.x <= 0.0 {
            return None;
        }
        Some(self.pixel_for_angles(ray.y.atan2(ray.x), ray.z.atan2(ray.x)))
    }
}

/// Camera mount orientation relative to the airframe, degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MountAngles {
    pub roll: f64,
    pub pitch: f64,
    pub yaw: f64,
}

impl Default for MountAngles {
    fn default() -> Self {
        // straight down, top of the image towards the nose
        Self {
            roll: 0.0,
            pitch: -90.0,
            yaw: 0.0,
        }
    }
}

/// Camera position and orientation at capture time. Angles in degrees, applied yaw, then
/// pitch, then roll in a local north-east-down frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pose {
    pub location: Location,
    pub roll: f64,
    pub pitch: f64,
    pub yaw: f64,
}

impl Pose {
    pub fn new(location: Location, roll: f64, pitch: f64, yaw: f64) -> Self {
        Self {
            location,
            roll,
            pitch,
            yaw,
        }
    }

    pub fn from_mount(location: Location, mount: MountAngles) -> Self {
        Self::new(location, mount.roll, mount.pitch, mount.yaw)
    }

    pub fn validate(&self) -> Result<(), ProjectionError> {
        if !self.location.is_finite() {
            return Err(ProjectionError::InvalidParameter(format!(
                "camera location is not finite: {:?}",
                self.location
            )));
        }
        if !(self.roll.is_finite() && self.pitch.is_finite() && self.yaw.is_finite()) {
            return Err(ProjectionError::InvalidParameter(format!(
                "camera attitude is not finite: roll {} pitch {} yaw {}",
                self.roll, self.pitch, self.yaw
            )));
        }
        Ok(())
    }

    /// Rotation taking camera-frame vectors into the local NED frame.
    pub fn rotation(&self) -> DMat3 {
        DMat3::from_rotation_z(self.yaw.to_radians())
            * DMat3::from_rotation_y(self.pitch.to_radians())
            * DMat3::from_rotation_x(self.roll.to_radians())
    }
}
