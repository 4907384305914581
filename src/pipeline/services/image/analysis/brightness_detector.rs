use std::time::Instant;

use image::{GrayImage, Rgb};
use tracing::debug;

use super::core::{DetectionResult, Detector};
use crate::error::AppError;
use crate::pipeline::services::image::canvas::{Canvas, LABEL_SCALE};
use crate::pipeline::services::image::codec::to_luma;

const MARKER_RADIUS: i32 = 20;
const MARKER_COLOR: Rgb<u8> = Rgb([255, 255, 0]);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BrightSpot {
    pub x: u32,
    pub y: u32,
    pub intensity: u8,
}

/// Location of the maximum intensity. The first maximum in row-major order
/// wins ties. `None` only for an empty image.
pub fn brightest_point(gray: &GrayImage) -> Option<BrightSpot> {
    let mut best: Option<BrightSpot> = None;
    for (x, y, pixel) in gray.enumerate_pixels() {
        let intensity = pixel[0];
        if best.map_or(true, |b| intensity > b.intensity) {
            best = Some(BrightSpot { x, y, intensity });
        }
    }
    best
}

pub struct BrightnessDetector;

impl BrightnessDetector {
    pub fn new() -> Self {
        Self
    }
}

impl Default for BrightnessDetector {
    fn default() -> Self {
        Self::new()
    }
}

impl Detector for BrightnessDetector {
    type Output = Option<BrightSpot>;

    fn detect(&self, canvas: &mut Canvas) -> Result<DetectionResult<Self::Output>, AppError> {
        let start_time = Instant::now();
        let gray = to_luma(canvas.image());
        let spot = brightest_point(&gray);

        if let Some(spot) = spot {
            let (x, y) = (spot.x as i32, spot.y as i32);
            canvas.circle((x, y), MARKER_RADIUS, MARKER_COLOR, 3);
            canvas.text("Brightest", (x + 10, y - 10), LABEL_SCALE, MARKER_COLOR);
            debug!(
                "{}: brightest pixel {} at ({}, {})",
                self.name(),
                spot.intensity,
                spot.x,
                spot.y
            );
        }

        Ok(DetectionResult::new(spot).with_timing(start_time))
    }

    fn name(&self) -> &'static str {
        "BrightnessDetector"
    }
}
