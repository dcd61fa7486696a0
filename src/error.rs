// error.rs — error types for projection, capture, geotag and settings

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ProjectionError {
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("ray did not reach terrain within {max_range_m} m")]
    Unresolved { max_range_m: f64 },
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum CaptureError {
    /// Drag was too short on at least one axis. Expected user behaviour, not a fault.
    #[error("capture rejected: corners closer than {min_px} px on one axis")]
    Rejected { min_px: u32 },

    #[error("no capture in progress")]
    NoPendingCapture,

    #[error("capture failed: {0}")]
    Projection(#[from] ProjectionError),
}

#[derive(Debug, Error)]
pub enum GeotagError {
    #[error("failed to read image: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed exif data: {0}")]
    Malformed(&'static str),
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("no images to show")]
    NoImages,

    #[error(transparent)]
    Settings(#[from] SettingsError),
}

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("failed to read settings: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse settings: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid setting {name}: {reason}")]
    Invalid { name: &'static str, reason: String },
}
