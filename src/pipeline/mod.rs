pub mod services;
pub mod types;

pub use services::{DetectorSet, ProcessingService};
pub use types::{DetectionReport, ImageRequest, Mode, ProcessedImage};
