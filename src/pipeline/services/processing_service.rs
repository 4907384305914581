use std::{
    future::Future,
    pin::Pin,
    sync::Arc,
    task::{Context, Poll},
};

use tower::Service;
use tracing::{debug, info};

use crate::config::Configuration;
use crate::error::AppError;
use crate::pipeline::services::image::analysis::{
    BrightnessDetector, ColorDetector, DetectionModel, DetectionResult, Detector, ShapeDetector,
    SharpObjectDetector,
};
use crate::pipeline::services::image::canvas::{Canvas, LabelFont};
use crate::pipeline::services::image::codec::{decode_image, encode_png};
use crate::pipeline::types::{DetectionReport, ImageRequest, Mode, ProcessedImage};

/// Every detector plus the shared rendering resources, built once per process
pub struct DetectorSet {
    color: ColorDetector,
    bright: BrightnessDetector,
    shape: ShapeDetector,
    sharp: SharpObjectDetector,
    font: Option<Arc<LabelFont>>,
}

impl DetectorSet {
    pub fn new(configuration: &Configuration, model: DetectionModel) -> Self {
        let font = LabelFont::resolve(configuration.render.font_path.as_deref()).map(Arc::new);
        Self::with_font(configuration, model, font)
    }

    pub fn with_font(
        configuration: &Configuration,
        model: DetectionModel,
        font: Option<Arc<LabelFont>>,
    ) -> Self {
        let detection = &configuration.detection;
        Self {
            color: ColorDetector::new(detection),
            bright: BrightnessDetector::new(),
            shape: ShapeDetector::new(detection),
            sharp: SharpObjectDetector::new(model, configuration.model.input_size, detection),
            font,
        }
    }

    pub fn model_ready(&self) -> bool {
        self.sharp.model().is_ready()
    }

    pub fn shutdown(&self) {
        self.sharp.model().shutdown();
    }

    /// Decode, run the one detector the mode selects, re-encode as PNG.
    pub fn process(&self, request: ImageRequest) -> Result<ProcessedImage, AppError> {
        let image = decode_image(&request.bytes)?;
        let (width, height) = image.dimensions();
        debug!("Decoded {}x{} image for {} mode", width, height, request.mode);

        let mut canvas = Canvas::new(image, self.font.clone());
        let (report, processing_time_us) = match request.mode {
            Mode::Color => Self::run(&self.color, &mut canvas, DetectionReport::Colors)?,
            Mode::Bright => Self::run(&self.bright, &mut canvas, DetectionReport::Brightest)?,
            Mode::Shape => Self::run(&self.shape, &mut canvas, DetectionReport::Shapes)?,
            Mode::Sharp => Self::run(&self.sharp, &mut canvas, DetectionReport::Objects)?,
            Mode::Passthrough => (DetectionReport::Passthrough, 0),
        };

        let png = encode_png(canvas.image())?;
        info!(
            "{} mode drew {} annotations in {}us",
            request.mode,
            report.annotation_count(),
            processing_time_us
        );

        Ok(ProcessedImage {
            id: request.id,
            mode: request.mode,
            png,
            report,
            processing_time_us,
        })
    }

    fn run<D: Detector>(
        detector: &D,
        canvas: &mut Canvas,
        wrap: impl FnOnce(D::Output) -> DetectionReport,
    ) -> Result<(DetectionReport, u64), AppError> {
        let DetectionResult {
            result,
            processing_time_us,
        } = detector.detect(canvas)?;
        Ok((wrap(result), processing_time_us))
    }
}

/// Runs requests on the blocking pool; detector work never yields.
#[derive(Clone)]
pub struct ProcessingService {
    detectors: Arc<DetectorSet>,
}

impl ProcessingService {
    pub fn new(detectors: Arc<DetectorSet>) -> Self {
        Self { detectors }
    }

    pub fn detectors(&self) -> &Arc<DetectorSet> {
        &self.detectors
    }
}

impl Service<ImageRequest> for ProcessingService {
    type Response = ProcessedImage;
    type Error = AppError;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), AppError>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, request: ImageRequest) -> Self::Future {
        let detectors = self.detectors.clone();
        Box::pin(async move { tokio::task::spawn_blocking(move || detectors.process(request)).await? })
    }
}
