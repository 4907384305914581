use std::sync::Arc;

use detection_service::pipeline::services::image::DetectionModel;
use detection_service::server::{shutdown_signal, Server};
use detection_service::{AppError, Configuration, DetectorSet, ProcessingService};
use tracing::info;
use tracing_subscriber::EnvFilter;

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

#[tokio::main]
async fn main() -> Result<(), AppError> {
    init_logging();
    let configuration = Configuration::load()?;

    let model = DetectionModel::load(&configuration.model);
    let detectors = Arc::new(DetectorSet::new(&configuration, model));
    let service = ProcessingService::new(detectors.clone());

    let server = Server::new(configuration.server.clone(), service);
    let served = server.start(shutdown_signal()).await;

    detectors.shutdown();
    info!("Detection model released");
    served
}
