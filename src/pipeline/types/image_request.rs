use uuid::Uuid;

use super::mode::Mode;
use crate::pipeline::services::image::analysis::{BrightSpot, ColorRegion, Detection, ShapeReport};

/// Raw upload plus the mode it asked for
#[derive(Debug, Clone)]
pub struct ImageRequest {
    pub id: Uuid,
    pub bytes: Vec<u8>,
    pub mode: Mode,
}

impl ImageRequest {
    pub fn new(bytes: Vec<u8>, mode: Mode) -> Self {
        Self {
            id: Uuid::new_v4(),
            bytes,
            mode,
        }
    }
}

/// What the selected detector found, alongside the pixels it drew
#[derive(Debug, Clone, PartialEq)]
pub enum DetectionReport {
    Colors(Vec<ColorRegion>),
    Brightest(Option<BrightSpot>),
    Shapes(ShapeReport),
    Objects(Vec<Detection>),
    Passthrough,
}

impl DetectionReport {
    pub fn annotation_count(&self) -> usize {
        match self {
            DetectionReport::Colors(regions) => regions.len(),
            DetectionReport::Brightest(spot) => usize::from(spot.is_some()),
            DetectionReport::Shapes(report) => report.shapes.len(),
            DetectionReport::Objects(detections) => detections.len(),
            DetectionReport::Passthrough => 0,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ProcessedImage {
    pub id: Uuid,
    pub mode: Mode,
    pub png: Vec<u8>,
    pub report: DetectionReport,
    pub processing_time_us: u64,
}
