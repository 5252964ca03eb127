//! Crop-area overlay rendering.
//!
//! Crop areas are stored as fractions of the page with a bottom-left
//! origin. Rendering maps them onto the raster page scan (top-left origin),
//! scales the result by the zoom level and the output pixel density, and
//! paints a translucent fill, a solid outline and a 1-based label for each
//! area, in the order the areas are stored.
//!
//! # Surface geometry
//!
//! ```text
//! logical  = round(image * zoom)
//! physical = round(logical * density)
//! scale    = zoom * density        (image px -> physical px)
//! ```
//!
//! The page scan is resampled to the physical size; every drawing
//! dimension (stroke width, label size and offset) is multiplied by
//! `scale` so the overlay looks the same at any zoom or density.

mod draw;
mod viewer;

pub use viewer::{CropViewer, LoadedPage, OverlayView, PageView};

use anyhow::{bail, Result};
use image::imageops::FilterType;
use image::{DynamicImage, ImageFormat, Rgba, RgbaImage};
use std::io::Cursor;

use crate::config::OverlayConfig;
use crate::error::ClipError;
use crate::models::CropArea;

pub const MIN_ZOOM: f64 = 0.25;
pub const MAX_ZOOM: f64 = 4.0;
pub const ZOOM_STEP: f64 = 0.25;

/// Label font size in image pixels, and the label's offset from the
/// rectangle's top-left corner to its baseline.
const LABEL_SIZE: f64 = 20.0;
const LABEL_OFFSET: (f64, f64) = (5.0, 25.0);

/// Largest canvas `render_overlay` will allocate, in physical pixels.
pub const MAX_SURFACE_PIXELS: u64 = 1 << 28;

/// Zoom level, always within [`MIN_ZOOM`, `MAX_ZOOM`] and a multiple of
/// [`ZOOM_STEP`].
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub struct Zoom(f64);

impl Zoom {
    /// Clamp and snap `value` to the nearest valid level.
    pub fn new(value: f64) -> Self {
        if !value.is_finite() {
            return Self::default();
        }
        let snapped = (value / ZOOM_STEP).round() * ZOOM_STEP;
        Self(snapped.clamp(MIN_ZOOM, MAX_ZOOM))
    }

    pub fn value(self) -> f64 {
        self.0
    }

    pub fn zoom_in(self) -> Self {
        Self::new(self.0 + ZOOM_STEP)
    }

    pub fn zoom_out(self) -> Self {
        Self::new(self.0 - ZOOM_STEP)
    }

    /// Zoom as a rounded percentage, e.g. `125`.
    pub fn percent(self) -> u32 {
        (self.0 * 100.0).round() as u32
    }
}

impl Default for Zoom {
    fn default() -> Self {
        Self(1.0)
    }
}

/// A rectangle in page pixels, top-left origin.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PixelRect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl PixelRect {
    /// Map a normalized, bottom-left-origin area onto a `page_width` x
    /// `page_height` raster.
    pub fn from_normalized(area: &CropArea, page_width: f64, page_height: f64) -> Self {
        Self {
            x: area.x * page_width,
            y: (1.0 - area.y) * page_height,
            width: area.width * page_width,
            height: area.height * page_height,
        }
    }

    /// Inverse of [`PixelRect::from_normalized`]: `(x, y, width, height)`
    /// as page fractions.
    pub fn to_normalized(&self, page_width: f64, page_height: f64) -> (f64, f64, f64, f64) {
        (
            self.x / page_width,
            1.0 - self.y / page_height,
            self.width / page_width,
            self.height / page_height,
        )
    }

    pub fn scaled(&self, factor: f64) -> Self {
        Self {
            x: self.x * factor,
            y: self.y * factor,
            width: self.width * factor,
            height: self.height * factor,
        }
    }
}

/// Output dimensions for one page at one zoom level and density.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Surface {
    pub logical: (u32, u32),
    pub physical: (u32, u32),
    pub scale: f64,
}

impl Surface {
    pub fn new(image_width: u32, image_height: u32, zoom: Zoom, density: f64) -> Self {
        let density = if density.is_finite() && density > 0.0 {
            density
        } else {
            1.0
        };
        let dim = |v: f64| (v.round() as u32).max(1);
        let logical = (
            dim(f64::from(image_width) * zoom.value()),
            dim(f64::from(image_height) * zoom.value()),
        );
        let physical = (
            dim(f64::from(logical.0) * density),
            dim(f64::from(logical.1) * density),
        );
        Self {
            logical,
            physical,
            scale: zoom.value() * density,
        }
    }

    pub fn pixel_count(&self) -> u64 {
        u64::from(self.physical.0) * u64::from(self.physical.1)
    }
}

/// Colors and line widths of the overlay, in image pixels.
#[derive(Debug, Clone, PartialEq)]
pub struct OverlayStyle {
    pub color: Rgba<u8>,
    pub stroke_width: f64,
    pub fill_alpha: f64,
}

impl Default for OverlayStyle {
    fn default() -> Self {
        Self {
            color: Rgba([255, 0, 0, 255]),
            stroke_width: 3.0,
            fill_alpha: 0.1,
        }
    }
}

impl OverlayStyle {
    pub fn from_config(config: &OverlayConfig) -> Result<Self> {
        Ok(Self {
            color: parse_hex_color(&config.color)?,
            stroke_width: config.stroke_width,
            fill_alpha: config.fill_alpha.clamp(0.0, 1.0),
        })
    }

    fn fill(&self) -> Rgba<u8> {
        let [r, g, b, _] = self.color.0;
        Rgba([r, g, b, (self.fill_alpha * 255.0).round() as u8])
    }
}

/// Parse `#rrggbb` or `#rrggbbaa`.
pub fn parse_hex_color(value: &str) -> Result<Rgba<u8>> {
    let s = value.trim();
    let Some(hex) = s.strip_prefix('#') else {
        bail!("color must start with '#': {}", s);
    };
    if !(hex.len() == 6 || hex.len() == 8) || !hex.is_ascii() {
        bail!("color must be #rrggbb or #rrggbbaa: {}", s);
    }
    let channel = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16);
    let r = channel(0)?;
    let g = channel(2)?;
    let b = channel(4)?;
    let a = if hex.len() == 8 { channel(6)? } else { 255 };
    Ok(Rgba([r, g, b, a]))
}

/// Draw `areas` over the scan of `page` at the given zoom and density.
///
/// Fails with [`ClipError::RenderFailure`] when the output would exceed
/// [`MAX_SURFACE_PIXELS`].
pub fn render_overlay(
    scan: &DynamicImage,
    page: &str,
    areas: &[CropArea],
    zoom: Zoom,
    density: f64,
    style: &OverlayStyle,
) -> Result<RgbaImage, ClipError> {
    let (width, height) = (scan.width(), scan.height());
    let surface = Surface::new(width, height, zoom, density);
    if surface.pixel_count() > MAX_SURFACE_PIXELS {
        return Err(ClipError::RenderFailure {
            page: page.to_string(),
            reason: format!(
                "{}x{} output exceeds {} pixels",
                surface.physical.0, surface.physical.1, MAX_SURFACE_PIXELS
            ),
        });
    }
    let mut canvas = if surface.physical == (width, height) {
        scan.to_rgba8()
    } else {
        scan.resize_exact(surface.physical.0, surface.physical.1, FilterType::Triangle)
            .to_rgba8()
    };

    let scale = surface.scale;
    let stroke = ((style.stroke_width * scale).round() as u32).max(1);
    let glyph_scale = ((LABEL_SIZE * scale / 8.0).round() as u32).max(1);
    let fill = style.fill();

    for (index, area) in areas.iter().enumerate() {
        let rect = PixelRect::from_normalized(area, f64::from(width), f64::from(height)).scaled(scale);
        draw::stroke_rect(&mut canvas, &rect, style.color, stroke);
        draw::fill_rect_alpha(&mut canvas, &rect, fill);

        let label = (index + 1).to_string();
        let left = (rect.x + LABEL_OFFSET.0 * scale).round() as i32;
        let baseline = (rect.y + LABEL_OFFSET.1 * scale).round() as i32;
        let top = baseline - 8 * glyph_scale as i32;
        // Bold: second pass one physical pixel to the right.
        draw::draw_bitmap_text(&mut canvas, left, top, &label, style.color, glyph_scale);
        draw::draw_bitmap_text(&mut canvas, left + 1, top, &label, style.color, glyph_scale);
    }
    Ok(canvas)
}

/// Encode a rendered page as PNG.
pub fn encode_png(image: &RgbaImage, page: &str) -> Result<Vec<u8>, ClipError> {
    let mut buf = Vec::new();
    image
        .write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
        .map_err(|e| ClipError::RenderFailure {
            page: page.to_string(),
            reason: e.to_string(),
        })?;
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn area(x: f64, y: f64, width: f64, height: f64) -> CropArea {
        CropArea {
            page: "1".into(),
            x,
            y,
            width,
            height,
            order: None,
        }
    }

    fn white(width: u32, height: u32) -> DynamicImage {
        DynamicImage::ImageRgba8(RgbaImage::from_pixel(width, height, Rgba([255, 255, 255, 255])))
    }

    #[test]
    fn normalized_area_flips_y() {
        let rect = PixelRect::from_normalized(&area(0.1, 0.9, 0.5, 0.2), 1000.0, 2000.0);
        assert_eq!(rect.x, 100.0);
        assert!((rect.y - 200.0).abs() < 1e-9);
        assert_eq!(rect.width, 500.0);
        assert!((rect.height - 400.0).abs() < 1e-9);
    }

    #[test]
    fn to_normalized_inverts_mapping() {
        let a = area(0.25, 0.75, 0.4, 0.1);
        let (x, y, w, h) = PixelRect::from_normalized(&a, 800.0, 600.0).to_normalized(800.0, 600.0);
        for (got, want) in [(x, a.x), (y, a.y), (w, a.width), (h, a.height)] {
            assert!((got - want).abs() < 1e-9, "{} != {}", got, want);
        }
    }

    #[test]
    fn zoom_clamps_and_snaps() {
        assert_eq!(Zoom::new(9.0).value(), MAX_ZOOM);
        assert_eq!(Zoom::new(0.0).value(), MIN_ZOOM);
        assert_eq!(Zoom::new(1.1).value(), 1.0);
        assert_eq!(Zoom::new(f64::NAN), Zoom::default());
        assert_eq!(Zoom::new(MAX_ZOOM).zoom_in().value(), MAX_ZOOM);
        assert_eq!(Zoom::new(MIN_ZOOM).zoom_out().value(), MIN_ZOOM);
        assert_eq!(Zoom::default().zoom_in().percent(), 125);
        assert_eq!(Zoom::default().zoom_out().zoom_out().percent(), 50);
    }

    #[test]
    fn surface_rounds_logical_then_physical() {
        let s = Surface::new(200, 100, Zoom::new(1.5), 2.0);
        assert_eq!(s.logical, (300, 150));
        assert_eq!(s.physical, (600, 300));
        assert_eq!(s.scale, 3.0);

        let s = Surface::new(101, 3, Zoom::new(0.25), 2.0);
        assert_eq!(s.logical, (25, 1));
        assert_eq!(s.physical, (50, 2));
    }

    #[test]
    fn render_output_matches_surface() {
        let img = render_overlay(&white(200, 100), "1", &[], Zoom::new(1.5), 2.0, &OverlayStyle::default())
            .unwrap();
        assert_eq!(img.dimensions(), (600, 300));
    }

    #[test]
    fn oversized_surface_is_a_render_failure() {
        let err = render_overlay(&white(200, 100), "3", &[], Zoom::new(4.0), 1000.0, &OverlayStyle::default())
            .unwrap_err();
        assert!(matches!(err, ClipError::RenderFailure { ref page, .. } if page == "3"));
        assert!(Surface::new(200, 100, Zoom::new(4.0), 1000.0).pixel_count() > MAX_SURFACE_PIXELS);
    }

    #[test]
    fn fill_is_composited_over_the_stroke() {
        let style = OverlayStyle {
            color: Rgba([255, 0, 0, 128]),
            ..OverlayStyle::default()
        };
        let areas = [area(0.1, 0.9, 0.5, 0.5)];
        let img = render_overlay(&white(100, 100), "1", &areas, Zoom::default(), 1.0, &style).unwrap();

        let paper = Rgba([255, 255, 255, 255]);
        let stroked = draw::blend_pixel(paper, style.color);
        // Pixel 9 is outer stroke only; pixel 10 is inner stroke, then fill.
        assert_eq!(*img.get_pixel(9, 40), stroked);
        assert_eq!(*img.get_pixel(10, 40), draw::blend_pixel(stroked, style.fill()));
    }

    #[test]
    fn render_draws_fill_stroke_and_label() {
        let areas = [area(0.1, 0.9, 0.5, 0.5)];
        let img = render_overlay(&white(100, 100), "1", &areas, Zoom::default(), 1.0, &OverlayStyle::default())
            .unwrap();

        // Left edge of the outline at x = 10.
        assert_eq!(img.get_pixel(10, 40).0, [255, 0, 0, 255]);
        // Interior: faint red tint.
        let inside = img.get_pixel(45, 50).0;
        assert_eq!(inside[0], 255);
        assert!(inside[1] > 200 && inside[1] < 255);
        // Outside the rectangle: untouched.
        assert_eq!(img.get_pixel(90, 90).0, [255, 255, 255, 255]);
        // Label "1" near the top-left corner.
        let label_pixels = (15..40)
            .flat_map(|x| (14..34).map(move |y| (x, y)))
            .filter(|&(x, y)| img.get_pixel(x, y).0 == [255, 0, 0, 255])
            .count();
        assert!(label_pixels > 0);
    }

    #[test]
    fn density_scales_stroke() {
        let areas = [area(0.1, 0.9, 0.5, 0.5)];
        let img = render_overlay(&white(100, 100), "1", &areas, Zoom::default(), 2.0, &OverlayStyle::default())
            .unwrap();
        assert_eq!(img.dimensions(), (200, 200));
        // Six physical pixels wide, centred on x = 20.
        for x in 17..23 {
            assert_eq!(img.get_pixel(x, 80).0, [255, 0, 0, 255], "x = {}", x);
        }
        assert_ne!(img.get_pixel(24, 80).0, [255, 0, 0, 255]);
    }

    #[test]
    fn hex_colors() {
        assert_eq!(parse_hex_color("#ff0000").unwrap(), Rgba([255, 0, 0, 255]));
        assert_eq!(parse_hex_color("#00ff0080").unwrap(), Rgba([0, 255, 0, 128]));
        assert!(parse_hex_color("red").is_err());
        assert!(parse_hex_color("#ff00").is_err());
        assert!(parse_hex_color("#gg0000").is_err());
    }

    #[test]
    fn png_encoding_produces_signature() {
        let png = encode_png(&RgbaImage::new(2, 2), "1").unwrap();
        assert_eq!(&png[..8], b"\x89PNG\r\n\x1a\n");
    }
}
