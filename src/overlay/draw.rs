//! Pixel-level drawing primitives on RGBA canvases.
//!
//! Coordinates are physical pixels. A pixel is covered by a shape when its
//! centre lies inside it; everything is clipped to the canvas.

use font8x8::{UnicodeFonts, BASIC_FONTS};
use image::{Rgba, RgbaImage};

use super::PixelRect;

/// Source-over compositing of `src` onto `dst`.
pub(super) fn blend_pixel(dst: Rgba<u8>, src: Rgba<u8>) -> Rgba<u8> {
    let a = f64::from(src[3]) / 255.0;
    if a <= 0.0 {
        return dst;
    }
    let inv = 1.0 - a;
    let mix = |d: u8, s: u8| (f64::from(d) * inv + f64::from(s) * a).round().clamp(0.0, 255.0) as u8;
    let out_a = (f64::from(dst[3]) + f64::from(src[3]) * inv)
        .round()
        .clamp(0.0, 255.0) as u8;
    Rgba([mix(dst[0], src[0]), mix(dst[1], src[1]), mix(dst[2], src[2]), out_a])
}

fn blend_at(img: &mut RgbaImage, x: u32, y: u32, color: Rgba<u8>) {
    let dst = *img.get_pixel(x, y);
    img.put_pixel(x, y, blend_pixel(dst, color));
}

/// Pixel index range whose centres fall in `[from, to)`, clipped to `limit`.
fn covered(from: f64, to: f64, limit: u32) -> std::ops::Range<u32> {
    let start = (from - 0.5).ceil().max(0.0);
    let end = (to - 0.5).ceil().max(0.0).min(f64::from(limit));
    if end <= start {
        return 0..0;
    }
    start as u32..end as u32
}

pub(super) fn fill_rect_alpha(img: &mut RgbaImage, rect: &PixelRect, color: Rgba<u8>) {
    if color[3] == 0 {
        return;
    }
    let xs = covered(rect.x, rect.x + rect.width, img.width());
    let ys = covered(rect.y, rect.y + rect.height, img.height());
    for y in ys {
        for x in xs.clone() {
            blend_at(img, x, y, color);
        }
    }
}

/// Outline `rect` with a stroke `thickness` pixels wide, centred on its edges.
pub(super) fn stroke_rect(img: &mut RgbaImage, rect: &PixelRect, color: Rgba<u8>, thickness: u32) {
    let half = f64::from(thickness.max(1)) / 2.0;
    let (left, right) = (rect.x, rect.x + rect.width);
    let (top, bottom) = (rect.y, rect.y + rect.height);

    let xs = covered(left - half, right + half, img.width());
    let ys = covered(top - half, bottom + half, img.height());
    for y in ys {
        let cy = f64::from(y) + 0.5;
        let in_band_y = cy < top + half || cy >= bottom - half;
        for x in xs.clone() {
            let cx = f64::from(x) + 0.5;
            if in_band_y || cx < left + half || cx >= right - half {
                blend_at(img, x, y, color);
            }
        }
    }
}

/// Draw `text` with the 8x8 bitmap font, each glyph pixel a
/// `scale` x `scale` block; `(x, y)` is the top-left of the first glyph.
pub(super) fn draw_bitmap_text(img: &mut RgbaImage, x: i32, y: i32, text: &str, color: Rgba<u8>, scale: u32) {
    let scale_i = scale.max(1) as i32;
    let (width, height) = (img.width() as i32, img.height() as i32);
    let mut cursor_x = x;
    for ch in text.chars() {
        let Some(glyph) = BASIC_FONTS.get(ch).or_else(|| BASIC_FONTS.get('?')) else {
            cursor_x += 8 * scale_i;
            continue;
        };
        for (row_idx, row) in glyph.iter().enumerate() {
            for col_idx in 0..8 {
                if (*row >> col_idx) & 1 == 0 {
                    continue;
                }
                let px = cursor_x + col_idx * scale_i;
                let py = y + row_idx as i32 * scale_i;
                for sy in 0..scale_i {
                    for sx in 0..scale_i {
                        let (tx, ty) = (px + sx, py + sy);
                        if tx >= 0 && ty >= 0 && tx < width && ty < height {
                            blend_at(img, tx as u32, ty as u32, color);
                        }
                    }
                }
            }
        }
        cursor_x += 8 * scale_i;
    }
}
