pub mod brightness_detector;
pub mod color_detector;
pub mod config;
pub mod core;
pub mod geometry;
pub mod neural;
pub mod shape_detector;

pub use brightness_detector::{BrightSpot, BrightnessDetector};
pub use color_detector::{ColorDetector, ColorRange, ColorRegion, PALETTE};
pub use config::DetectionConfig;
pub use core::{DetectionResult, Detector, ImageRegion};
pub use neural::{Detection, DetectionModel, InferenceBackend, SharpObjectDetector};
pub use shape_detector::{Shape, ShapeDetector, ShapeReport, ShapeTally};
