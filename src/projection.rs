// projection.rs — camera-to-ground projection by ray marching against terrain
//
// Rays are built in the camera frame (forward, right, down), rotated into local
// north-east-down by the pose and marched outward from the camera in fixed slant-range
// steps. The first step that lands at or below the terrain is refined by bisection.

use crate::camera::{CameraModel, PixelPosition, Pose};
use crate::elevation::ElevationQuery;
use crate::error::ProjectionError;
use crate::geo::Location;
use glam::DVec3;
use log::{debug, trace};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Limits of the terrain intersection search. Together they bound the number of elevation
/// queries per ray to `max_range_m / step_m + max_bisections + 1`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TerrainSearch {
    /// Slant-range distance between successive terrain samples, metres.
    pub step_m: f64,
    /// Give up once the ray is this far from the camera, metres.
    pub max_range_m: f64,
    /// Stop refining when the crossing is bracketed this tightly, metres.
    pub tolerance_m: f64,
    pub max_bisections: u32,
}

impl Default for TerrainSearch {
    fn default() -> Self {
        Self {
            step_m: 10.0,
            max_range_m: 10_000.0,
            tolerance_m: 0.5,
            max_bisections: 32,
        }
    }
}

/// Ceiling on elevation queries per ray. Limits beyond it are rejected so a single pixel
/// lookup stays bounded in time.
pub const MAX_SEARCH_QUERIES: u64 = 100_000;

impl TerrainSearch {
    pub fn validate(&self) -> Result<(), ProjectionError> {
        let positive = |name: &str, v: f64| {
            if v.is_finite() && v > 0.0 {
                Ok(())
            } else {
                Err(ProjectionError::InvalidParameter(format!(
                    "{name} must be positive, got {v}"
                )))
            }
        };
        positive("search step", self.step_m)?;
        positive("search range", self.max_range_m)?;
        positive("search tolerance", self.tolerance_m)?;

        let queries = self.max_queries();
        if queries > MAX_SEARCH_QUERIES {
            return Err(ProjectionError::InvalidParameter(format!(
                "search would need up to {queries} terrain queries per ray, \
                 limit is {MAX_SEARCH_QUERIES}"
            )));
        }
        Ok(())
    }

    /// Upper bound on elevation queries for one ray.
    pub fn max_queries(&self) -> u64 {
        let steps = (self.max_range_m / self.step_m).ceil() as u64;
        steps
            .saturating_add(1)
            .saturating_add(self.max_bisections as u64)
    }
}

enum Sample {
    /// Ray is at or below the terrain; carries the ground point.
    Below(Location),
    Above,
    Unknown,
}

pub struct ProjectionEngine {
    camera: CameraModel,
    terrain: Arc<dyn ElevationQuery + Send + Sync>,
    search: TerrainSearch,
}

impl ProjectionEngine {
    pub fn new(
        camera: CameraModel,
        terrain: Arc<dyn ElevationQuery + Send + Sync>,
        search: TerrainSearch,
    ) -> Result<Self, ProjectionError> {
        search.validate()?;
        Ok(Self {
            camera,
            terrain,
            search,
        })
    }

    pub fn camera(&self) -> &CameraModel {
        &self.camera
    }

    /// Swap in a new camera model after a FOV or resolution change.
    pub fn set_camera(&mut self, camera: CameraModel) {
        self.camera = camera;
    }

    pub fn terrain_source(&self) -> &str {
        self.terrain.source()
    }

    pub fn search(&self) -> &TerrainSearch {
        &self.search
    }

    /// Ground location observed by `pixel` when the camera has the given pose.
    pub fn get_latlonalt_for_pixel(
        &self,
        pixel: PixelPosition,
        pose: &Pose,
    ) -> Result<Location, ProjectionError> {
        if !self.camera.contains(pixel) {
            return Err(ProjectionError::InvalidParameter(format!(
                "pixel ({}, {}) outside {}x{} image",
                pixel.x,
                pixel.y,
                self.camera.width(),
                self.camera.height()
            )));
        }
        pose.validate()?;
        self.locate(pixel.x as f64, pixel.y as f64, pose)
    }

    /// Ground footprint of the whole frame: the four image corners clockwise from the top
    /// left.
    pub fn get_projection(&self, pose: &Pose) -> Result<Vec<Location>, ProjectionError> {
        self.get_projection_with(pose, 1)
    }

    /// Ground footprint sampled with `per_edge` points along each image edge, clockwise
    /// from the top-left corner. Fails as a whole if any vertex fails to resolve.
    pub fn get_projection_with(
        &self,
        pose: &Pose,
        per_edge: u32,
    ) -> Result<Vec<Location>, ProjectionError> {
        if per_edge == 0 {
            return Err(ProjectionError::InvalidParameter(
                "footprint needs at least one point per edge".to_string(),
            ));
        }
        pose.validate()?;

        let w = self.camera.width() as f64;
        let h = self.camera.height() as f64;
        let n = per_edge as f64;

        let mut outline = Vec::with_capacity(4 * per_edge as usize);
        for k in 0..per_edge {
            let f = k as f64 / n;
            outline.push((w * f, 0.0));
        }
        for k in 0..per_edge {
            let f = k as f64 / n;
            outline.push((w, h * f));
        }
        for k in 0..per_edge {
            let f = k as f64 / n;
            outline.push((w - w * f, h));
        }
        for k in 0..per_edge {
            let f = k as f64 / n;
            outline.push((0.0, h - h * f));
        }

        outline
            .into_iter()
            .map(|(x, y)| self.locate(x, y, pose))
            .collect()
    }

    /// Sub-pixel image position at which `location` appears, or `None` if it lies behind
    /// the camera.
    pub fn get_pixel_for_location(&self, location: &Location, pose: &Pose) -> Option<(f64, f64)> {
        let (north, east) = pose.location.north_east_to(location);
        let down = pose.location.altitude - location.altitude;
        let in_camera = pose.rotation().transpose() * DVec3::new(north, east, down);
        self.camera.pixel_for_ray(in_camera)
    }

    fn locate(&self, x: f64, y: f64, pose: &Pose) -> Result<Location, ProjectionError> {
        let ray = pose.rotation() * self.camera.pixel_ray(x, y);
        self.intersect(&pose.location, ray)
    }

    fn sample_at(&self, origin: &Location, ray: DVec3, t: f64) -> Sample {
        let p = ray * t;
        let ground = origin.offset(p.x, p.y);
        let ray_alt = origin.altitude - p.z;
        match self.terrain.elevation(ground.latitude, ground.longitude) {
            Some(h) if ray_alt <= h => Sample::Below(ground.with_altitude(h)),
            Some(_) => Sample::Above,
            None => Sample::Unknown,
        }
    }

    fn intersect(&self, origin: &Location, ray: DVec3) -> Result<Location, ProjectionError> {
        let TerrainSearch {
            step_m,
            max_range_m,
            ..
        } = self.search;

        let steps = (max_range_m / step_m).ceil() as u64;
        let mut above_t = 0.0;
        for i in 0..=steps {
            let t = (i as f64 * step_m).min(max_range_m);
            match self.sample_at(origin, ray, t) {
                Sample::Below(ground) if i == 0 => {
                    debug!("camera is at or below terrain, using the point beneath it");
                    return Ok(ground);
                }
                Sample::Below(ground) => return Ok(self.bisect(origin, ray, above_t, t, ground)),
                // unknown terrain never ends the march
                Sample::Above | Sample::Unknown => above_t = t,
            }
        }

        trace!("ray {ray:?} found no terrain within {max_range_m} m");
        Err(ProjectionError::Unresolved { max_range_m })
    }

    fn bisect(
        &self,
        origin: &Location,
        ray: DVec3,
        mut lo: f64,
        mut hi: f64,
        mut ground: Location,
    ) -> Location {
        for _ in 0..self.search.max_bisections {
            if hi - lo <= self.search.tolerance_m {
                break;
            }
            let mid = 0.5 * (lo + hi);
            match self.sample_at(origin, ray, mid) {
                Sample::Below(g) => {
                    hi = mid;
                    ground = g;
                }
                Sample::Above | Sample::Unknown => lo = mid,
            }
        }
        ground
    }
}
