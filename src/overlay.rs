// overlay.rs — draw POI rectangles onto the displayed image

use crate::camera::PixelPosition;
use crate::poi::Poi;
use image::{Rgba, RgbaImage};

pub const POI_COLOUR: Rgba<u8> = Rgba([0, 0, 255, 255]);
pub const POI_THICKNESS: u32 = 2;

/// Outline the axis-aligned rectangle spanned by `a` and `b`, clipped to the image.
/// The outline grows inwards from the given corners.
pub fn draw_rectangle(
    image: &mut RgbaImage,
    a: PixelPosition,
    b: PixelPosition,
    colour: Rgba<u8>,
    thickness: u32,
) {
    let (w, h) = image.dimensions();
    if w == 0 || h == 0 || thickness == 0 {
        return;
    }
    let x0 = a.x.min(b.x);
    let x1 = a.x.max(b.x);
    let y0 = a.y.min(b.y);
    let y1 = a.y.max(b.y);

    let mut put = |x: u32, y: u32| {
        if x < w && y < h {
            image.put_pixel(x, y, colour);
        }
    };

    for t in 0..thickness {
        let (top, bottom) = (y0.saturating_add(t), y1.saturating_sub(t));
        let (left, right) = (x0.saturating_add(t), x1.saturating_sub(t));
        if left > right || top > bottom {
            break;
        }
        for x in left..=right.min(w.saturating_sub(1)) {
            put(x, top);
            put(x, bottom);
        }
        for y in top..=bottom.min(h.saturating_sub(1)) {
            put(left, y);
            put(right, y);
        }
    }
}

pub fn draw_poi(image: &mut RgbaImage, poi: &Poi) {
    let (a, b) = poi.pixel_bounds();
    draw_rectangle(image, a, b, POI_COLOUR, POI_THICKNESS);
}
