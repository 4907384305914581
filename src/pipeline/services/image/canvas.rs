use std::path::Path;
use std::sync::Arc;

use ab_glyph::{Font, FontArc, PxScale, ScaleFont};
use image::{Rgb, RgbImage};
use imageproc::drawing::{
    draw_filled_rect_mut, draw_hollow_circle_mut, draw_hollow_rect_mut, draw_text_mut,
};
use imageproc::point::Point;
use imageproc::rect::Rect;
use tracing::{info, warn};

/// Label size for object annotations.
pub const LABEL_SCALE: f32 = 20.0;
/// Label size for the shape tally summary.
pub const SUMMARY_SCALE: f32 = 24.0;

/// DejaVu Sans, compiled in so labels render without any configuration.
static BUNDLED_FONT: &[u8] =
    include_bytes!(concat!(env!("CARGO_MANIFEST_DIR"), "/assets/DejaVuSans.ttf"));

/// Font shared by every request. Loaded once at startup.
#[derive(Clone)]
pub struct LabelFont(FontArc);

impl LabelFont {
    pub fn bundled() -> Option<Self> {
        match FontArc::try_from_slice(BUNDLED_FONT) {
            Ok(font) => Some(Self(font)),
            Err(e) => {
                warn!("Bundled label font is unusable: {}", e);
                None
            }
        }
    }

    /// The font at `path` when one is configured and loads, otherwise the bundled one.
    pub fn resolve(path: Option<&Path>) -> Option<Self> {
        path.and_then(Self::load).or_else(Self::bundled)
    }

    pub fn load(path: &Path) -> Option<Self> {
        let bytes = match std::fs::read(path) {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!("Failed to read label font {}: {}", path.display(), e);
                return None;
            }
        };
        match FontArc::try_from_vec(bytes) {
            Ok(font) => {
                info!("Loaded label font from {}", path.display());
                Some(Self(font))
            }
            Err(e) => {
                warn!("Invalid label font {}: {}", path.display(), e);
                None
            }
        }
    }
}

/// The request's image buffer plus the drawing primitives detectors annotate with.
///
/// Strokes wider than one pixel are built from concentric one-pixel outlines,
/// centered on the nominal geometry. Text is anchored at its baseline's left
/// end and skipped when the canvas has no font.
pub struct Canvas {
    image: RgbImage,
    font: Option<Arc<LabelFont>>,
}

impl Canvas {
    pub fn new(image: RgbImage, font: Option<Arc<LabelFont>>) -> Self {
        Self { image, font }
    }

    pub fn image(&self) -> &RgbImage {
        &self.image
    }

    pub fn into_image(self) -> RgbImage {
        self.image
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.image.dimensions()
    }

    pub fn rectangle(&mut self, x: i32, y: i32, width: u32, height: u32, color: Rgb<u8>, thickness: u32) {
        for offset in stroke_offsets(thickness) {
            let w = width as i64 + 2 * offset as i64;
            let h = height as i64 + 2 * offset as i64;
            if w <= 0 || h <= 0 {
                continue;
            }
            let rect = Rect::at(x - offset, y - offset).of_size(w as u32, h as u32);
            draw_hollow_rect_mut(&mut self.image, rect, color);
        }
    }

    pub fn circle(&mut self, center: (i32, i32), radius: i32, color: Rgb<u8>, thickness: u32) {
        for offset in stroke_offsets(thickness) {
            let r = radius + offset;
            if r > 0 {
                draw_hollow_circle_mut(&mut self.image, center, r, color);
            }
        }
    }

    /// Traces a contour's boundary pixels with a square pen of `thickness` px.
    pub fn contour(&mut self, points: &[Point<i32>], color: Rgb<u8>, thickness: u32) {
        let pen = thickness.max(1);
        for p in points {
            draw_filled_rect_mut(&mut self.image, Rect::at(p.x, p.y).of_size(pen, pen), color);
        }
    }

    pub fn text(&mut self, text: &str, baseline: (i32, i32), scale: f32, color: Rgb<u8>) {
        let Some(font) = &self.font else {
            return;
        };
        let scale = PxScale::from(scale);
        // Glyphs are laid out with the baseline `ascent` px below the origin.
        let ascent = font.0.as_scaled(scale).ascent().round() as i32;
        draw_text_mut(
            &mut self.image,
            color,
            baseline.0,
            baseline.1 - ascent,
            scale,
            &font.0,
            text,
        );
    }

}

fn stroke_offsets(thickness: u32) -> std::ops::RangeInclusive<i32> {
    let thickness = thickness.max(1) as i32;
    -((thickness - 1) / 2)..=thickness / 2
}
