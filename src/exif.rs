// exif.rs — camera position from the GPS block of a JPEG's EXIF data
//
// Only what the viewer needs is decoded: IFD0 -> GPSInfo pointer -> latitude, longitude
// and altitude with their reference tags.

use crate::error::GeotagError;
use crate::geo::Location;
use log::debug;
use std::path::Path;

/// EXIF RATIONAL as (numerator, denominator).
pub type Rational = (u32, u32);

/// Convert a degrees/minutes/seconds triple to signed decimal degrees. A hemisphere of
/// `S` or `W` (either case) makes the result negative; anything else is positive.
pub fn dms_to_decimal(
    degrees: Rational,
    minutes: Rational,
    seconds: Rational,
    hemisphere: u8,
) -> f64 {
    let value = |(num, den): Rational| num as f64 / den as f64;
    let sign = if b"SWsw".contains(&hemisphere) {
        -1.0
    } else {
        1.0
    };
    sign * (value(degrees) + value(minutes) / 60.0 + value(seconds) / 3600.0)
}

/// Camera position recorded in the image, altitude metres AMSL.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Geotag {
    pub latitude: f64,
    pub longitude: f64,
    pub altitude: f64,
}

impl Geotag {
    pub fn location(&self) -> Location {
        Location::new(self.latitude, self.longitude, self.altitude)
    }
}

/// Read the geotag of a JPEG file. `Ok(None)` if the image carries no usable GPS block.
pub fn read_geotag(path: &Path) -> Result<Option<Geotag>, GeotagError> {
    let bytes = std::fs::read(path)?;
    geotag_from_jpeg(&bytes)
}

const EXIF_HEADER: &[u8] = b"Exif\0\0";

pub fn geotag_from_jpeg(bytes: &[u8]) -> Result<Option<Geotag>, GeotagError> {
    if bytes.len() < 4 || bytes[0] != 0xFF || bytes[1] != 0xD8 {
        return Err(GeotagError::Malformed("missing jpeg start marker"));
    }

    let mut pos = 2;
    while pos + 1 < bytes.len() {
        if bytes[pos] != 0xFF {
            return Err(GeotagError::Malformed("expected jpeg marker"));
        }
        let marker = bytes[pos + 1];
        match marker {
            // fill byte
            0xFF => {
                pos += 1;
                continue;
            }
            // start of scan / end of image: no metadata past this point
            0xDA | 0xD9 => break,
            0x01 | 0xD0..=0xD7 => {
                pos += 2;
                continue;
            }
            _ => {}
        }

        let len = read_u16(bytes, pos + 2, false)? as usize;
        if len < 2 {
            return Err(GeotagError::Malformed("bad jpeg segment length"));
        }
        let end = pos + 2 + len;
        let segment = bytes
            .get(pos + 4..end)
            .ok_or(GeotagError::Malformed("truncated jpeg segment"))?;

        if marker == 0xE1 && segment.starts_with(EXIF_HEADER) {
            return geotag_from_tiff(&segment[EXIF_HEADER.len()..]);
        }
        pos = end;
    }

    debug!("no exif segment found");
    Ok(None)
}

fn read_u16(data: &[u8], at: usize, little_endian: bool) -> Result<u16, GeotagError> {
    let b = data
        .get(at..at + 2)
        .ok_or(GeotagError::Malformed("unexpected end of data"))?;
    Ok(if little_endian {
        u16::from_le_bytes([b[0], b[1]])
    } else {
        u16::from_be_bytes([b[0], b[1]])
    })
}

fn read_u32(data: &[u8], at: usize, little_endian: bool) -> Result<u32, GeotagError> {
    let b = data
        .get(at..at + 4)
        .ok_or(GeotagError::Malformed("unexpected end of data"))?;
    let b = [b[0], b[1], b[2], b[3]];
    Ok(if little_endian {
        u32::from_le_bytes(b)
    } else {
        u32::from_be_bytes(b)
    })
}

const TAG_GPS_IFD: u16 = 0x8825;
const TAG_LATITUDE_REF: u16 = 1;
const TAG_LATITUDE: u16 = 2;
const TAG_LONGITUDE_REF: u16 = 3;
const TAG_LONGITUDE: u16 = 4;
const TAG_ALTITUDE_REF: u16 = 5;
const TAG_ALTITUDE: u16 = 6;

#[derive(Debug, Clone, Copy)]
struct IfdEntry {
    tag: u16,
    kind: u16,
    count: u32,
    /// Offset of the 4-byte value/offset field within the TIFF data.
    field: usize,
}

struct Tiff<'a> {
    data: &'a [u8],
    little_endian: bool,
}

impl<'a> Tiff<'a> {
    fn new(data: &'a [u8]) -> Result<Self, GeotagError> {
        let little_endian = match data.get(0..2) {
            Some(b"II") => true,
            Some(b"MM") => false,
            _ => return Err(GeotagError::Malformed("bad tiff byte order")),
        };
        let tiff = Self {
            data,
            little_endian,
        };
        if tiff.u16(2)? != 42 {
            return Err(GeotagError::Malformed("bad tiff magic"));
        }
        Ok(tiff)
    }

    fn u16(&self, at: usize) -> Result<u16, GeotagError> {
        read_u16(self.data, at, self.little_endian)
    }

    fn u32(&self, at: usize) -> Result<u32, GeotagError> {
        read_u32(self.data, at, self.little_endian)
    }

    fn first_ifd(&self) -> Result<usize, GeotagError> {
        Ok(self.u32(4)? as usize)
    }

    fn entries(&self, ifd: usize) -> Result<Vec<IfdEntry>, GeotagError> {
        let count = self.u16(ifd)? as usize;
        (0..count)
            .map(|i| {
                let at = ifd + 2 + i * 12;
                Ok(IfdEntry {
                    tag: self.u16(at)?,
                    kind: self.u16(at + 2)?,
                    count: self.u32(at + 4)?,
                    field: at + 8,
                })
            })
            .collect()
    }

    /// Start of an entry's value bytes: inline when they fit in four bytes.
    fn value_start(&self, entry: &IfdEntry) -> Result<usize, GeotagError> {
        let unit = match entry.kind {
            1 | 2 | 6 | 7 => 1,
            3 | 8 => 2,
            4 | 9 => 4,
            5 | 10 => 8,
            _ => return Err(GeotagError::Malformed("unknown tiff field type")),
        };
        let size = unit * entry.count as usize;
        if size <= 4 {
            Ok(entry.field)
        } else {
            Ok(self.u32(entry.field)? as usize)
        }
    }

    fn first_byte(&self, entry: &IfdEntry) -> Result<u8, GeotagError> {
        let at = self.value_start(entry)?;
        self.data
            .get(at)
            .copied()
            .ok_or(GeotagError::Malformed("unexpected end of data"))
    }

    fn rationals(&self, entry: &IfdEntry) -> Result<Vec<Rational>, GeotagError> {
        if entry.kind != 5 {
            return Err(GeotagError::Malformed("expected rational field"));
        }
        let start = self.value_start(entry)?;
        (0..entry.count as usize)
            .map(|i| {
                let at = start + i * 8;
                let r = (self.u32(at)?, self.u32(at + 4)?);
                if r.1 == 0 {
                    return Err(GeotagError::Malformed("zero denominator"));
                }
                Ok(r)
            })
            .collect()
    }
}

fn dms_field(tiff: &Tiff, entry: &IfdEntry, hemisphere: u8) -> Result<f64, GeotagError> {
    match tiff.rationals(entry)?.as_slice() {
        [d, m, s, ..] => Ok(dms_to_decimal(*d, *m, *s, hemisphere)),
        _ => Err(GeotagError::Malformed("expected degrees, minutes and seconds")),
    }
}

/// Geotag from raw TIFF-structured EXIF data (the APP1 payload after `Exif\0\0`).
pub fn geotag_from_tiff(data: &[u8]) -> Result<Option<Geotag>, GeotagError> {
    let tiff = Tiff::new(data)?;
    let ifd0 = tiff.entries(tiff.first_ifd()?)?;
    let Some(gps_ptr) = ifd0.iter().find(|e| e.tag == TAG_GPS_IFD) else {
        debug!("exif has no gps block");
        return Ok(None);
    };
    let gps_ifd = tiff.u32(gps_ptr.field)? as usize;
    let gps = tiff.entries(gps_ifd)?;
    let find = |tag: u16| gps.iter().find(|e| e.tag == tag);

    let (Some(lat_ref), Some(lat), Some(lon_ref), Some(lon), Some(alt)) = (
        find(TAG_LATITUDE_REF),
        find(TAG_LATITUDE),
        find(TAG_LONGITUDE_REF),
        find(TAG_LONGITUDE),
        find(TAG_ALTITUDE),
    ) else {
        debug!("gps block is missing position tags");
        return Ok(None);
    };

    let latitude = dms_field(&tiff, lat, tiff.first_byte(lat_ref)?)?;
    let longitude = dms_field(&tiff, lon, tiff.first_byte(lon_ref)?)?;

    let (num, den) = *tiff
        .rationals(alt)?
        .first()
        .ok_or(GeotagError::Malformed("empty altitude"))?;
    let mut altitude = num as f64 / den as f64;
    // reference 1 means below sea level
    if let Some(alt_ref) = find(TAG_ALTITUDE_REF) {
        if tiff.first_byte(alt_ref)? == 1 {
            altitude = -altitude;
        }
    }

    Ok(Some(Geotag {
        latitude,
        longitude,
        altitude,
    }))
}
