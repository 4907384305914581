use std::sync::Arc;
use std::time::Instant;

use image::Rgb;
use tracing::{debug, info, warn};

use super::backend::{InferenceBackend, OrtBackend};
use super::decode::{decode_table, preprocess, DecodeThresholds, Detection};
use crate::config::ModelConfig;
use crate::error::AppError;
use crate::pipeline::services::image::analysis::config::DetectionConfig;
use crate::pipeline::services::image::analysis::core::{DetectionResult, Detector};
use crate::pipeline::services::image::canvas::{Canvas, LABEL_SCALE};

const BOX_COLOR: Rgb<u8> = Rgb([0, 255, 0]);

/// Process-wide handle to the detection network.
///
/// Loaded once before the server accepts requests. A load failure is kept
/// as a reason string so only the sharp mode is affected.
#[derive(Clone)]
pub enum DetectionModel {
    Ready(Arc<dyn InferenceBackend>),
    Unavailable(Arc<str>),
}

impl DetectionModel {
    pub fn load(config: &ModelConfig) -> Self {
        match OrtBackend::load(&config.path) {
            Ok(backend) => DetectionModel::Ready(Arc::new(backend)),
            Err(e) => {
                warn!("Sharp object detection disabled: {}", e);
                DetectionModel::Unavailable(e.to_string().into())
            }
        }
    }

    pub fn is_ready(&self) -> bool {
        matches!(self, DetectionModel::Ready(_))
    }

    pub fn backend(&self) -> Result<&Arc<dyn InferenceBackend>, AppError> {
        match self {
            DetectionModel::Ready(backend) => Ok(backend),
            DetectionModel::Unavailable(reason) => {
                Err(AppError::ModelUnavailable(reason.to_string()))
            }
        }
    }

    pub fn shutdown(&self) {
        if let DetectionModel::Ready(backend) = self {
            info!("Shutting down {}", backend.name());
            backend.shutdown();
        }
    }
}

pub struct SharpObjectDetector {
    model: DetectionModel,
    input_size: u32,
    thresholds: DecodeThresholds,
    sharp_only: bool,
}

impl SharpObjectDetector {
    pub fn new(model: DetectionModel, input_size: u32, config: &DetectionConfig) -> Self {
        Self {
            model,
            input_size,
            thresholds: DecodeThresholds {
                objectness: config.objectness_threshold,
                class_score: config.class_score_threshold,
            },
            sharp_only: config.sharp_only,
        }
    }

    pub fn model(&self) -> &DetectionModel {
        &self.model
    }
}

impl Detector for SharpObjectDetector {
    type Output = Vec<Detection>;

    fn detect(&self, canvas: &mut Canvas) -> Result<DetectionResult<Self::Output>, AppError> {
        let start_time = Instant::now();
        let backend = self.model.backend()?;
        let (width, height) = canvas.dimensions();

        let tables = backend.infer(preprocess(canvas.image(), self.input_size))?;
        let mut detections = Vec::new();
        for table in &tables {
            detections.extend(
                decode_table(table, width, height, self.thresholds)?
                    .into_iter()
                    .filter(|d| !self.sharp_only || d.is_sharp),
            );
        }

        for detection in &detections {
            let Some((left, top, box_width, box_height)) = detection.bounds.clip_to(width, height)
            else {
                continue;
            };
            canvas.rectangle(left, top, box_width, box_height, BOX_COLOR, 2);
            canvas.text(detection.label, (left, top - 5), LABEL_SCALE, BOX_COLOR);
        }

        debug!(
            "{}: {} detections ({} sharp) from {} output tables",
            self.name(),
            detections.len(),
            detections.iter().filter(|d| d.is_sharp).count(),
            tables.len()
        );
        Ok(DetectionResult::new(detections).with_timing(start_time))
    }

    fn name(&self) -> &'static str {
        "SharpObjectDetector"
    }
}
