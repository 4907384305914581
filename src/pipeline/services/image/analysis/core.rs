use std::time::Instant;

use crate::error::AppError;
use crate::pipeline::services::image::canvas::Canvas;

/// Result of one detector run plus how long it took
#[derive(Debug, Clone)]
pub struct DetectionResult<T> {
    pub result: T,
    pub processing_time_us: u64,
}

impl<T> DetectionResult<T> {
    pub fn new(result: T) -> Self {
        Self {
            result,
            processing_time_us: 0,
        }
    }

    pub fn with_timing(mut self, start_time: Instant) -> Self {
        self.processing_time_us = start_time.elapsed().as_micros() as u64;
        self
    }
}

/// Axis-aligned rectangle in image pixel coordinates
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageRegion {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl ImageRegion {
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Width over height; a zero height yields 0 so callers never see NaN.
    pub fn aspect_ratio(&self) -> f64 {
        if self.height == 0 {
            0.0
        } else {
            self.width as f64 / self.height as f64
        }
    }
}

/// One annotation pipeline. Each run owns the canvas for its duration and
/// draws its findings onto it.
pub trait Detector: Send + Sync {
    type Output;

    fn detect(&self, canvas: &mut Canvas) -> Result<DetectionResult<Self::Output>, AppError>;
    fn name(&self) -> &'static str;
}
