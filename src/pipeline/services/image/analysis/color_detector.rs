use std::time::Instant;

use image::{GrayImage, Luma, Rgb, RgbImage};
use imageproc::morphology::{grayscale_dilate, grayscale_open, Mask};
use tracing::debug;

use super::config::DetectionConfig;
use super::core::{DetectionResult, Detector, ImageRegion};
use super::geometry::{bounding_rect, contour_area, external_contours};
use crate::error::AppError;
use crate::pipeline::services::image::canvas::{Canvas, LABEL_SCALE};

/// Named HSV band. Hue uses the 8-bit 0..=180 convention, saturation and
/// value are 0..=255. Both bounds are inclusive.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ColorRange {
    pub name: &'static str,
    pub lower: [u8; 3],
    pub upper: [u8; 3],
    pub box_color: Rgb<u8>,
}

impl ColorRange {
    const fn new(name: &'static str, lower: [u8; 3], upper: [u8; 3], box_color: [u8; 3]) -> Self {
        Self {
            name,
            lower,
            upper,
            box_color: Rgb(box_color),
        }
    }

    pub fn contains(&self, hsv: [u8; 3]) -> bool {
        (0..3).all(|i| self.lower[i] <= hsv[i] && hsv[i] <= self.upper[i])
    }
}

/// Palette scanned in order. Red appears twice to cover the hue wrap at 0/180.
pub const PALETTE: [ColorRange; 12] = [
    ColorRange::new("Red", [0, 120, 70], [10, 255, 255], [255, 0, 0]),
    ColorRange::new("Red", [170, 120, 70], [180, 255, 255], [255, 0, 0]),
    ColorRange::new("Orange", [11, 100, 100], [25, 255, 255], [255, 165, 0]),
    ColorRange::new("Yellow", [26, 100, 100], [35, 255, 255], [255, 255, 0]),
    ColorRange::new("Green", [36, 50, 70], [89, 255, 255], [0, 255, 0]),
    ColorRange::new("Cyan", [80, 100, 100], [95, 255, 255], [0, 255, 255]),
    ColorRange::new("Blue", [96, 50, 70], [128, 255, 255], [0, 0, 255]),
    ColorRange::new("Purple", [129, 50, 70], [158, 255, 255], [255, 0, 255]),
    ColorRange::new("Pink", [159, 50, 70], [169, 255, 255], [255, 192, 203]),
    ColorRange::new("Brown", [10, 100, 20], [20, 255, 200], [165, 42, 42]),
    ColorRange::new("White", [0, 0, 200], [180, 30, 255], [255, 255, 255]),
    ColorRange::new("Black", [0, 0, 0], [180, 255, 50], [0, 0, 0]),
];

/// A boxed region of one palette color
#[derive(Debug, Clone, PartialEq)]
pub struct ColorRegion {
    pub name: &'static str,
    pub area: f64,
    pub bounds: ImageRegion,
}

/// 8-bit HSV: H = degrees / 2, S and V scaled to 0..=255.
pub fn rgb_to_hsv(pixel: &Rgb<u8>) -> [u8; 3] {
    let [r, g, b] = pixel.0.map(f32::from);
    let max = r.max(g).max(b);
    let min = r.min(g).min(b);
    let delta = max - min;

    let saturation = if max == 0.0 { 0.0 } else { 255.0 * delta / max };
    let mut hue = if delta == 0.0 {
        0.0
    } else if max == r {
        60.0 * (g - b) / delta
    } else if max == g {
        120.0 + 60.0 * (b - r) / delta
    } else {
        240.0 + 60.0 * (r - g) / delta
    };
    if hue < 0.0 {
        hue += 360.0;
    }

    [(hue / 2.0).round() as u8, saturation.round() as u8, max as u8]
}

/// Packed HSV image, one `[h, s, v]` triple per pixel
fn to_hsv(image: &RgbImage) -> RgbImage {
    let mut hsv = RgbImage::new(image.width(), image.height());
    for (x, y, pixel) in image.enumerate_pixels() {
        hsv.put_pixel(x, y, Rgb(rgb_to_hsv(pixel)));
    }
    hsv
}

/// 5×5 ellipse, the same footprint OpenCV builds for `MORPH_ELLIPSE`.
fn ellipse_kernel() -> Mask {
    const ROWS: [[u8; 5]; 5] = [
        [0, 0, 1, 0, 0],
        [1, 1, 1, 1, 1],
        [1, 1, 1, 1, 1],
        [1, 1, 1, 1, 1],
        [0, 0, 1, 0, 0],
    ];
    let footprint = GrayImage::from_fn(5, 5, |x, y| Luma([ROWS[y as usize][x as usize] * 255]));
    Mask::from_image(&footprint, 2, 2)
}

pub struct ColorDetector {
    min_area: f64,
    kernel: Mask,
}

impl ColorDetector {
    pub fn new(config: &DetectionConfig) -> Self {
        Self {
            min_area: config.color_min_area,
            kernel: ellipse_kernel(),
        }
    }

    fn mask_for(&self, hsv: &RgbImage, range: &ColorRange) -> GrayImage {
        let mut mask = GrayImage::new(hsv.width(), hsv.height());
        for (x, y, pixel) in hsv.enumerate_pixels() {
            if range.contains(pixel.0) {
                mask.put_pixel(x, y, Luma([255]));
            }
        }
        let opened = grayscale_open(&mask, &self.kernel);
        grayscale_dilate(&opened, &self.kernel)
    }

    fn regions_for(&self, hsv: &RgbImage, range: &ColorRange) -> Vec<ColorRegion> {
        let mask = self.mask_for(hsv, range);
        external_contours(&mask)
            .iter()
            .filter_map(|contour| {
                let area = contour_area(&contour.points);
                (area > self.min_area).then(|| ColorRegion {
                    name: range.name,
                    area,
                    bounds: bounding_rect(&contour.points),
                })
            })
            .collect()
    }
}

impl Detector for ColorDetector {
    type Output = Vec<ColorRegion>;

    fn detect(&self, canvas: &mut Canvas) -> Result<DetectionResult<Self::Output>, AppError> {
        let start_time = Instant::now();
        let hsv = to_hsv(canvas.image());
        let mut regions = Vec::new();

        for range in PALETTE.iter() {
            let found = self.regions_for(&hsv, range);
            for region in &found {
                let b = region.bounds;
                canvas.rectangle(b.x as i32, b.y as i32, b.width, b.height, range.box_color, 3);
                canvas.text(
                    &format!("{} Object", range.name),
                    (b.x as i32, b.y as i32 - 10),
                    LABEL_SCALE,
                    range.box_color,
                );
            }
            regions.extend(found);
        }

        debug!("{}: {} regions boxed", self.name(), regions.len());
        Ok(DetectionResult::new(regions).with_timing(start_time))
    }

    fn name(&self) -> &'static str {
        "ColorDetector"
    }
}
