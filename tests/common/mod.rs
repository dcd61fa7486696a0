#![allow(dead_code)]

use image::{DynamicImage, ImageOutputFormat, Rgb, RgbImage};
use std::io::Cursor;
use std::path::{Path, PathBuf};

fn dms(value: f64) -> [(u32, u32); 3] {
    let v = value.abs();
    let deg = v.floor();
    let min = ((v - deg) * 60.0).floor();
    let sec = ((v - deg) * 60.0 - min) * 60.0;
    [(deg as u32, 1), (min as u32, 1), ((sec * 10_000.0).round() as u32, 10_000)]
}

/// Little-endian EXIF TIFF block holding only a GPS IFD.
pub fn gps_tiff(lat: f64, lon: f64, alt: f64) -> Vec<u8> {
    let mut t = Vec::new();
    let u16le = |t: &mut Vec<u8>, v: u16| t.extend_from_slice(&v.to_le_bytes());
    let u32le = |t: &mut Vec<u8>, v: u32| t.extend_from_slice(&v.to_le_bytes());

    // header, IFD0 at 8
    t.extend_from_slice(b"II");
    u16le(&mut t, 42);
    u32le(&mut t, 8);

    // IFD0: one entry pointing at the GPS IFD (offset 26)
    u16le(&mut t, 1);
    u16le(&mut t, 0x8825);
    u16le(&mut t, 4);
    u32le(&mut t, 1);
    u32le(&mut t, 26);
    u32le(&mut t, 0);

    // GPS IFD: six entries, rationals stored from offset 104
    let entry = |t: &mut Vec<u8>, tag: u16, kind: u16, count: u32, field: [u8; 4]| {
        t.extend_from_slice(&tag.to_le_bytes());
        t.extend_from_slice(&kind.to_le_bytes());
        t.extend_from_slice(&count.to_le_bytes());
        t.extend_from_slice(&field);
    };
    let lat_ref = if lat < 0.0 { b'S' } else { b'N' };
    let lon_ref = if lon < 0.0 { b'W' } else { b'E' };
    let alt_ref = u8::from(alt < 0.0);
    u16le(&mut t, 6);
    entry(&mut t, 1, 2, 2, [lat_ref, 0, 0, 0]);
    entry(&mut t, 2, 5, 3, 104u32.to_le_bytes());
    entry(&mut t, 3, 2, 2, [lon_ref, 0, 0, 0]);
    entry(&mut t, 4, 5, 3, 128u32.to_le_bytes());
    entry(&mut t, 5, 1, 1, [alt_ref, 0, 0, 0]);
    entry(&mut t, 6, 5, 1, 152u32.to_le_bytes());
    u32le(&mut t, 0);
    assert_eq!(t.len(), 104);

    for (num, den) in dms(lat).into_iter().chain(dms(lon)) {
        u32le(&mut t, num);
        u32le(&mut t, den);
    }
    u32le(&mut t, (alt.abs() * 100.0).round() as u32);
    u32le(&mut t, 100);
    t
}

/// Splice an APP1 EXIF segment in right after the start-of-image marker.
pub fn with_exif(jpeg: &[u8], tiff: &[u8]) -> Vec<u8> {
    let len = (2 + 6 + tiff.len()) as u16;
    let mut out = jpeg[..2].to_vec();
    out.extend_from_slice(&[0xFF, 0xE1]);
    out.extend_from_slice(&len.to_be_bytes());
    out.extend_from_slice(b"Exif\0\0");
    out.extend_from_slice(tiff);
    out.extend_from_slice(&jpeg[2..]);
    out
}

pub fn plain_jpeg(width: u32, height: u32) -> Vec<u8> {
    let img = RgbImage::from_pixel(width, height, Rgb([90, 140, 60]));
    let mut buf = Cursor::new(Vec::new());
    DynamicImage::ImageRgb8(img)
        .write_to(&mut buf, ImageOutputFormat::Jpeg(90))
        .unwrap();
    buf.into_inner()
}

pub fn geotagged_jpeg(width: u32, height: u32, lat: f64, lon: f64, alt: f64) -> Vec<u8> {
    with_exif(&plain_jpeg(width, height), &gps_tiff(lat, lon, alt))
}

pub fn write_file(dir: &Path, name: &str, bytes: &[u8]) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, bytes).unwrap();
    path
}
