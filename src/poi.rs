// poi.rs — user-marked rectangular points of interest, one per image

use crate::camera::PixelPosition;
use crate::error::{CaptureError, ProjectionError};
use crate::geo::Location;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Corners closer than this on either axis are treated as an accidental click.
pub const MIN_DRAG_PX: u32 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PoiCorner {
    pub pixel: PixelPosition,
    pub location: Location,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Poi {
    pub corner1: PoiCorner,
    pub corner2: PoiCorner,
}

impl Poi {
    /// Mean of the two corner locations.
    pub fn centre(&self) -> Location {
        let a = &self.corner1.location;
        let b = &self.corner2.location;
        Location::new(
            (a.latitude + b.latitude) * 0.5,
            (a.longitude + b.longitude) * 0.5,
            (a.altitude + b.altitude) * 0.5,
        )
    }

    /// Closed lat/lon ring spanned by the two corners, for map overlays.
    pub fn ground_rectangle(&self) -> [Location; 5] {
        let a = self.corner1.location;
        let b = self.corner2.location;
        let ab = Location::new(a.latitude, b.longitude, a.altitude);
        let ba = Location::new(b.latitude, a.longitude, b.altitude);
        [a, ab, b, ba, a]
    }

    /// Top-left and bottom-right pixel corners regardless of drag direction.
    pub fn pixel_bounds(&self) -> (PixelPosition, PixelPosition) {
        let p1 = self.corner1.pixel;
        let p2 = self.corner2.pixel;
        (
            PixelPosition::new(p1.x.min(p2.x), p1.y.min(p2.y)),
            PixelPosition::new(p1.x.max(p2.x), p1.y.max(p2.y)),
        )
    }
}

/// Token for an in-flight capture. Only the most recent handle can complete.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaptureHandle {
    generation: u64,
}

#[derive(Debug, Clone, Copy)]
struct PendingCapture {
    generation: u64,
    start: PixelPosition,
}

#[derive(Debug, Default)]
pub struct PoiStore {
    pois: BTreeMap<usize, Poi>,
    pending: Option<PendingCapture>,
    generation: u64,
}

impl PoiStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a drag at `pixel`. Replaces any capture already in flight.
    pub fn begin_capture(&mut self, pixel: PixelPosition) -> CaptureHandle {
        self.generation += 1;
        self.pending = Some(PendingCapture {
            generation: self.generation,
            start: pixel,
        });
        CaptureHandle {
            generation: self.generation,
        }
    }

    /// The start pixel of the capture in flight, if any.
    pub fn pending_start(&self) -> Option<PixelPosition> {
        self.pending.map(|p| p.start)
    }

    pub fn cancel_capture(&mut self) {
        self.pending = None;
    }

    /// Finish the drag at `pixel`. Both corners are resolved with `resolve`; the POI is
    /// stored under `image_index` only when both succeed, replacing any earlier one.
    pub fn complete_capture<F>(
        &mut self,
        handle: CaptureHandle,
        pixel: PixelPosition,
        image_index: usize,
        mut resolve: F,
    ) -> Result<Poi, CaptureError>
    where
        F: FnMut(PixelPosition) -> Result<Location, ProjectionError>,
    {
        let start = match self.pending {
            Some(p) if p.generation == handle.generation => p.start,
            _ => return Err(CaptureError::NoPendingCapture),
        };
        self.pending = None;

        if pixel.x.abs_diff(start.x) <= MIN_DRAG_PX || pixel.y.abs_diff(start.y) <= MIN_DRAG_PX {
            return Err(CaptureError::Rejected {
                min_px: MIN_DRAG_PX,
            });
        }

        let loc1 = resolve(start)?;
        let loc2 = resolve(pixel)?;
        let poi = Poi {
            corner1: PoiCorner {
                pixel: start,
                location: loc1,
            },
            corner2: PoiCorner {
                pixel,
                location: loc2,
            },
        };
        self.pois.insert(image_index, poi);
        Ok(poi)
    }

    /// Store a POI captured elsewhere (e.g. announced by a sibling viewer).
    pub fn insert(&mut self, image_index: usize, poi: Poi) {
        self.pois.insert(image_index, poi);
    }

    /// Remove the POI for `image_index`; returns whether one existed.
    pub fn clear(&mut self, image_index: usize) -> bool {
        self.pois.remove(&image_index).is_some()
    }

    pub fn clear_all(&mut self) {
        self.pois.clear();
        self.pending = None;
    }

    pub fn get(&self, image_index: usize) -> Option<&Poi> {
        self.pois.get(&image_index)
    }

    pub fn contains(&self, image_index: usize) -> bool {
        self.pois.contains_key(&image_index)
    }

    pub fn indices(&self) -> impl Iterator<Item = usize> + '_ {
        self.pois.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.pois.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pois.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fake_ground(pixel: PixelPosition) -> Result<Location, ProjectionError> {
        Ok(Location::new(pixel.y as f64 * 1e-5, pixel.x as f64 * 1e-5, 100.0))
    }

    fn unresolved(_: PixelPosition) -> Result<Location, ProjectionError> {
        Err(ProjectionError::Unresolved { max_range_m: 1.0 })
    }

    #[test]
    fn capture_stores_poi() {
        let mut store = PoiStore::new();
        let h = store.begin_capture(PixelPosition::new(10, 20));
        let poi = store
            .complete_capture(h, PixelPosition::new(50, 80), 3, fake_ground)
            .unwrap();

        assert_eq!(store.get(3), Some(&poi));
        assert_eq!(poi.corner1.pixel, PixelPosition::new(10, 20));
        assert_eq!(poi.corner2.location.longitude, 50.0 * 1e-5);
        assert_eq!(store.pending_start(), None);
    }

    #[test]
    fn small_drags_rejected_without_projection() {
        let start = PixelPosition::new(100, 100);
        let mut calls = 0;
        for (dx, dy) in [(0i64, 50i64), (5, 50), (-5, 50), (50, 5), (50, -5), (3, -3), (5, 5)] {
            let mut store = PoiStore::new();
            let h = store.begin_capture(start);
            let end = PixelPosition::new((100 + dx) as u32, (100 + dy) as u32);
            let result = store.complete_capture(h, end, 0, |p| {
                calls += 1;
                fake_ground(p)
            });
            assert_eq!(result, Err(CaptureError::Rejected { min_px: 5 }));
            assert!(store.is_empty());
        }
        assert_eq!(calls, 0);
    }

    #[test]
    fn six_pixels_is_enough() {
        let mut store = PoiStore::new();
        let h = store.begin_capture(PixelPosition::new(100, 100));
        assert!(store
            .complete_capture(h, PixelPosition::new(94, 106), 0, fake_ground)
            .is_ok());
    }

    #[test]
    fn unresolved_corner_stores_nothing() {
        let mut store = PoiStore::new();
        let h = store.begin_capture(PixelPosition::new(0, 0));
        let first = store
            .complete_capture(h, PixelPosition::new(40, 40), 1, fake_ground)
            .unwrap();

        let h = store.begin_capture(PixelPosition::new(0, 0));
        let mut n = 0;
        let result = store.complete_capture(h, PixelPosition::new(90, 90), 1, |p| {
            n += 1;
            if n == 2 {
                unresolved(p)
            } else {
                fake_ground(p)
            }
        });
        assert!(matches!(
            result,
            Err(CaptureError::Projection(ProjectionError::Unresolved { .. }))
        ));
        // earlier POI untouched
        assert_eq!(store.get(1), Some(&first));

        let h = store.begin_capture(PixelPosition::new(0, 0));
        let result = store.complete_capture(h, PixelPosition::new(90, 90), 2, unresolved);
        assert!(result.is_err());
        assert!(!store.contains(2));
    }

    #[test]
    fn invalid_corner_keeps_its_cause() {
        let mut store = PoiStore::new();
        let h = store.begin_capture(PixelPosition::new(0, 0));
        let result = store.complete_capture(h, PixelPosition::new(900, 900), 0, |_| {
            Err(ProjectionError::InvalidParameter("outside image".to_string()))
        });
        assert_eq!(
            result,
            Err(CaptureError::Projection(ProjectionError::InvalidParameter(
                "outside image".to_string()
            )))
        );
        assert!(store.is_empty());
    }

    #[test]
    fn new_capture_overwrites() {
        let mut store = PoiStore::new();
        let h = store.begin_capture(PixelPosition::new(0, 0));
        store
            .complete_capture(h, PixelPosition::new(40, 40), 7, fake_ground)
            .unwrap();
        let h = store.begin_capture(PixelPosition::new(100, 100));
        let second = store
            .complete_capture(h, PixelPosition::new(200, 300), 7, fake_ground)
            .unwrap();
        assert_eq!(store.len(), 1);
        assert_eq!(store.get(7), Some(&second));
    }

    #[test]
    fn second_begin_replaces_pending_start() {
        let mut store = PoiStore::new();
        let stale = store.begin_capture(PixelPosition::new(0, 0));
        let fresh = store.begin_capture(PixelPosition::new(300, 300));
        assert_eq!(store.pending_start(), Some(PixelPosition::new(300, 300)));

        assert_eq!(
            store.complete_capture(stale, PixelPosition::new(100, 100), 0, fake_ground),
            Err(CaptureError::NoPendingCapture)
        );

        let fresh2 = store.begin_capture(PixelPosition::new(300, 300));
        assert_ne!(fresh, fresh2);
        let poi = store
            .complete_capture(fresh2, PixelPosition::new(100, 100), 0, fake_ground)
            .unwrap();
        assert_eq!(poi.corner1.pixel, PixelPosition::new(300, 300));
    }

    #[test]
    fn cancel_drops_pending() {
        let mut store = PoiStore::new();
        let h = store.begin_capture(PixelPosition::new(0, 0));
        store.cancel_capture();
        assert_eq!(
            store.complete_capture(h, PixelPosition::new(100, 100), 0, fake_ground),
            Err(CaptureError::NoPendingCapture)
        );
    }

    #[test]
    fn clear_missing_is_noop() {
        let mut store = PoiStore::new();
        assert!(!store.clear(42));
        store.insert(
            42,
            Poi {
                corner1: PoiCorner {
                    pixel: PixelPosition::new(0, 0),
                    location: Location::new(1.0, 2.0, 3.0),
                },
                corner2: PoiCorner {
                    pixel: PixelPosition::new(10, 10),
                    location: Location::new(3.0, 4.0, 5.0),
                },
            },
        );
        assert!(store.clear(42));
        assert!(!store.clear(42));
        assert!(store.is_empty());
    }

    #[test]
    fn centre_and_rectangle() {
        let poi = Poi {
            corner1: PoiCorner {
                pixel: PixelPosition::new(50, 10),
                location: Location::new(1.0, 2.0, 100.0),
            },
            corner2: PoiCorner {
                pixel: PixelPosition::new(10, 60),
                location: Location::new(3.0, 6.0, 110.0),
            },
        };
        assert_eq!(poi.centre(), Location::new(2.0, 4.0, 105.0));

        let ring = poi.ground_rectangle();
        assert_eq!(ring[0], ring[4]);
        assert_eq!((ring[1].latitude, ring[1].longitude), (1.0, 6.0));
        assert_eq!((ring[3].latitude, ring[3].longitude), (3.0, 2.0));

        assert_eq!(
            poi.pixel_bounds(),
            (PixelPosition::new(10, 10), PixelPosition::new(50, 60))
        );
    }
}
