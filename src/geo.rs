// geo.rs — geodetic locations and small-displacement helpers on a spherical earth

use serde::{Deserialize, Serialize};

pub const EARTH_RADIUS_M: f64 = 6_378_100.0;

/// A point on or above the earth. Altitude is metres AMSL everywhere in this crate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub latitude: f64,
    pub longitude: f64,
    pub altitude: f64,
}

impl Location {
    pub fn new(latitude: f64, longitude: f64, altitude: f64) -> Self {
        Self {
            latitude,
            longitude,
            altitude,
        }
    }

    pub fn is_finite(&self) -> bool {
        self.latitude.is_finite() && self.longitude.is_finite() && self.altitude.is_finite()
    }

    pub fn with_altitude(self, altitude: f64) -> Self {
        Self { altitude, ..self }
    }

    /// Location reached by travelling `distance` metres along an initial `bearing` (degrees
    /// clockwise from north). Altitude is carried over unchanged.
    pub fn destination(&self, bearing_deg: f64, distance: f64) -> Self {
        let lat1 = self.latitude.to_radians();
        let lon1 = self.longitude.to_radians();
        let brng = bearing_deg.to_radians();
        let dr = distance / EARTH_RADIUS_M;

        let lat2 = (lat1.sin() * dr.cos() + lat1.cos() * dr.sin() * brng.cos()).asin();
        let lon2 = lon1
            + (brng.sin() * dr.sin() * lat1.cos()).atan2(dr.cos() - lat1.sin() * lat2.sin());

        Self {
            latitude: lat2.to_degrees(),
            longitude: wrap_longitude(lon2.to_degrees()),
            altitude: self.altitude,
        }
    }

    /// Apply a local north/east displacement in metres.
    pub fn offset(&self, north: f64, east: f64) -> Self {
        let distance = north.hypot(east);
        if distance == 0.0 {
            return *self;
        }
        self.destination(east.atan2(north).to_degrees(), distance)
    }

    /// Great-circle (haversine) ground distance in metres; altitude ignored.
    pub fn distance_to(&self, other: &Location) -> f64 {
        let lat1 = self.latitude.to_radians();
        let lat2 = other.latitude.to_radians();
        let dlat = lat2 - lat1;
        let dlon = (other.longitude - self.longitude).to_radians();

        let a = (dlat * 0.5).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon * 0.5).sin().powi(2);
        2.0 * EARTH_RADIUS_M * a.sqrt().min(1.0).asin()
    }

    /// Initial bearing towards `other` in degrees, normalised to [0, 360).
    pub fn bearing_to(&self, other: &Location) -> f64 {
        let lat1 = self.latitude.to_radians();
        let lat2 = other.latitude.to_radians();
        let dlon = (other.longitude - self.longitude).to_radians();

        let y = dlon.sin() * lat2.cos();
        let x = lat1.cos() * lat2.sin() - lat1.sin() * lat2.cos() * dlon.cos();
        y.atan2(x).to_degrees().rem_euclid(360.0)
    }

    /// Local (north, east) displacement in metres towards `other`.
    pub fn north_east_to(&self, other: &Location) -> (f64, f64) {
        let distance = self.distance_to(other);
        let bearing = self.bearing_to(other).to_radians();
        (distance * bearing.cos(), distance * bearing.sin())
    }
}

fn wrap_longitude(lon: f64) -> f64 {
    (lon + 540.0).rem_euclid(360.0) - 180.0
}
