pub mod config;
pub mod error;
pub mod pipeline;
pub mod server;

pub use config::Configuration;
pub use error::AppError;
pub use pipeline::{DetectorSet, ImageRequest, Mode, ProcessingService};
pub use server::{create_router, AppState, Server};
