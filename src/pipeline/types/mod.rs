pub mod image_request;
pub mod mode;

pub use image_request::{DetectionReport, ImageRequest, ProcessedImage};
pub use mode::Mode;
