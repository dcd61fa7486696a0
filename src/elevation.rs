// elevation.rs — terrain elevation sources
//
// Every query may hit the disk; callers never assume data is preloaded.

use log::{debug, warn};
use std::{
    collections::HashMap,
    path::{Path, PathBuf},
    sync::{Arc, Mutex, MutexGuard},
};

/// Ground elevation lookup. `None` means the height is unknown (no data, void, ocean tile).
pub trait ElevationQuery {
    /// Identifier of the elevation data set, e.g. "SRTM3".
    fn source(&self) -> &str;

    /// Terrain height in metres AMSL at the given coordinate.
    fn elevation(&self, latitude: f64, longitude: f64) -> Option<f64>;
}

/// Constant-height terrain.
#[derive(Debug, Clone)]
pub struct FlatTerrain {
    source: String,
    height: f64,
}

impl FlatTerrain {
    pub fn new(height: f64) -> Self {
        Self {
            source: "flat".to_string(),
            height,
        }
    }
}

impl ElevationQuery for FlatTerrain {
    fn source(&self) -> &str {
        &self.source
    }

    fn elevation(&self, _latitude: f64, _longitude: f64) -> Option<f64> {
        Some(self.height)
    }
}

const SRTM_VOID: i16 = -32768;

#[derive(Debug)]
struct HgtTile {
    samples: usize,
    heights: Vec<i16>,
}

impl HgtTile {
    fn parse(bytes: &[u8]) -> Option<Self> {
        let count = bytes.len() / 2;
        let samples = (count as f64).sqrt().round() as usize;
        if samples < 2 || samples * samples * 2 != bytes.len() {
            return None;
        }
        let heights = bytes
            .chunks_exact(2)
            .map(|b| i16::from_be_bytes([b[0], b[1]]))
            .collect();
        Some(Self { samples, heights })
    }

    fn sample(&self, row: usize, col: usize) -> Option<f64> {
        let h = self.heights[row * self.samples + col];
        (h != SRTM_VOID).then_some(h as f64)
    }

    /// Bilinear height at fractional offsets inside the tile: `north_frac` measured down
    /// from the top (north) edge, `east_frac` from the west edge, both in [0, 1].
    fn height(&self, north_frac: f64, east_frac: f64) -> Option<f64> {
        let last = (self.samples - 1) as f64;
        let r = (north_frac * last).clamp(0.0, last);
        let c = (east_frac * last).clamp(0.0, last);

        let r0 = r.floor() as usize;
        let c0 = c.floor() as usize;
        let r1 = (r0 + 1).min(self.samples - 1);
        let c1 = (c0 + 1).min(self.samples - 1);
        let fr = r - r0 as f64;
        let fc = c - c0 as f64;

        let h00 = self.sample(r0, c0)?;
        let h01 = self.sample(r0, c1)?;
        let h10 = self.sample(r1, c0)?;
        let h11 = self.sample(r1, c1)?;

        let top = h00 + (h01 - h00) * fc;
        let bottom = h10 + (h11 - h10) * fc;
        Some(top + (bottom - top) * fr)
    }
}

/// SRTM `.hgt` tiles read from one directory, e.g. `S36E149.hgt`.
///
/// Tiles are loaded on first use and kept for the lifetime of the query. Missing or
/// unreadable tiles are remembered as absent.
pub struct SrtmTiles {
    source: String,
    dir: PathBuf,
    tiles: Mutex<HashMap<(i32, i32), Option<Arc<HgtTile>>>>,
}

impl SrtmTiles {
    pub fn new(source: impl Into<String>, dir: impl Into<PathBuf>) -> Self {
        Self {
            source: source.into(),
            dir: dir.into(),
            tiles: Mutex::new(HashMap::new()),
        }
    }

    pub fn tile_name(lat_floor: i32, lon_floor: i32) -> String {
        format!(
            "{}{:02}{}{:03}.hgt",
            if lat_floor < 0 { 'S' } else { 'N' },
            lat_floor.abs(),
            if lon_floor < 0 { 'W' } else { 'E' },
            lon_floor.abs()
        )
    }

    fn load(dir: &Path, key: (i32, i32)) -> Option<Arc<HgtTile>> {
        let path = dir.join(Self::tile_name(key.0, key.1));
        let bytes = match std::fs::read(&path) {
            Ok(b) => b,
            Err(e) => {
                debug!("no elevation tile {}: {}", path.display(), e);
                return None;
            }
        };
        match HgtTile::parse(&bytes) {
            Some(tile) => Some(Arc::new(tile)),
            None => {
                warn!("ignoring malformed elevation tile {}", path.display());
                None
            }
        }
    }

    fn cache(&self) -> MutexGuard<'_, HashMap<(i32, i32), Option<Arc<HgtTile>>>> {
        match self.tiles.lock() {
            Ok(t) => t,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Cached tile, read from disk on first use. The file is read without holding the cache
    /// lock; if two threads race on the same tile the first insert wins.
    fn tile(&self, key: (i32, i32)) -> Option<Arc<HgtTile>> {
        if let Some(cached) = self.cache().get(&key) {
            return cached.clone();
        }
        let loaded = Self::load(&self.dir, key);
        self.cache().entry(key).or_insert(loaded).clone()
    }

    #[cfg(test)]
    fn cached_tiles(&self) -> usize {
        self.cache().len()
    }
}

impl ElevationQuery for SrtmTiles {
    fn source(&self) -> &str {
        &self.source
    }

    fn elevation(&self, latitude: f64, longitude: f64) -> Option<f64> {
        if !latitude.is_finite() || !longitude.is_finite() {
            return None;
        }
        let lat_floor = latitude.floor();
        let lon_floor = longitude.floor();
        let tile = self.tile((lat_floor as i32, lon_floor as i32))?;

        let north_frac = 1.0 - (latitude - lat_floor);
        let east_frac = longitude - lon_floor;
        tile.height(north_frac, east_frac)
    }
}
