pub mod image;
pub mod processing_service;

pub use processing_service::{DetectorSet, ProcessingService};
