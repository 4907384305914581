use thiserror::Error;

// Main Application Error Type

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Bad request: {0}")]
    BadRequest(String),
    #[error("Failed to decode image: {0}")]
    Decode(#[source] image::ImageError),
    #[error("Invalid image data: decoded to {width}x{height}")]
    InvalidImage { width: u32, height: u32 },
    #[error("Failed to encode PNG: {0}")]
    Encode(#[source] image::ImageError),
    #[error("Detection model unavailable: {0}")]
    ModelUnavailable(String),
    #[error("Inference failed: {0}")]
    Inference(String),
    #[error("Model output malformed: {0}")]
    MalformedOutput(String),
    #[error("Configuration error: {0}")]
    Configuration(#[from] config::ConfigError),
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("Failed to bind to {1}: {0}")]
    Bind(std::io::Error, String),
    #[error("Server error: {0}")]
    Serve(std::io::Error),
    #[error("Worker task failed: {0}")]
    Worker(#[from] tokio::task::JoinError),
}

impl From<ort::Error> for AppError {
    fn from(e: ort::Error) -> Self {
        AppError::Inference(e.to_string())
    }
}
