//! Headless core of a geotagged-photo viewer: projects camera pixels onto terrain, captures
//! points of interest and keeps a viewer and its mosaic in sync over typed messages.

pub mod camera;
pub mod elevation;
pub mod error;
pub mod event;
pub mod exif;
pub mod files;
pub mod geo;
pub mod message;
pub mod mosaic;
pub mod overlay;
pub mod poi;
pub mod projection;
pub mod session;
pub mod settings;
