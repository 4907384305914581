use std::path::PathBuf;

use serde::Deserialize;

use crate::error::AppError;
pub use crate::pipeline::services::image::analysis::DetectionConfig;

/// File looked up when `DETECTOR_CONFIG` is not set. Any format the `config`
/// crate understands works (`detector.toml`, `detector.yaml`, ...).
const DEFAULT_CONFIG_FILE: &str = "detector";
const ENV_PREFIX: &str = "DETECTOR";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Configuration {
    pub server: ServerConfig,
    pub model: ModelConfig,
    pub render: RenderConfig,
    pub detection: DetectionConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub max_upload_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            max_upload_bytes: 20 * 1024 * 1024,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    pub path: PathBuf,
    pub input_size: u32,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("models/yolov5m.onnx"),
            input_size: 640,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    /// TrueType font overriding the bundled DejaVu Sans for annotation labels.
    pub font_path: Option<PathBuf>,
}

impl Configuration {
    /// Defaults, then the optional config file, then `DETECTOR__*` environment variables.
    pub fn load() -> Result<Self, AppError> {
        let file = std::env::var("DETECTOR_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_FILE.into());
        let settings = config::Config::builder()
            .add_source(config::File::with_name(&file).required(false))
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let configuration: Configuration = settings.try_deserialize()?;
        configuration.validate()?;
        Ok(configuration)
    }

    pub fn validate(&self) -> Result<(), AppError> {
        if self.server.max_upload_bytes == 0 {
            return Err(AppError::InvalidConfig(
                "server.max_upload_bytes must be greater than 0".to_string(),
            ));
        }
        if self.model.input_size == 0 {
            return Err(AppError::InvalidConfig(
                "model.input_size must be greater than 0".to_string(),
            ));
        }
        self.detection.validate().map_err(AppError::InvalidConfig)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let configuration = Configuration::default();
        assert!(configuration.validate().is_ok());
        assert_eq!(configuration.server.port, 8080);
        assert_eq!(configuration.model.input_size, 640);
        assert!(configuration.render.font_path.is_none());
    }

    #[test]
    fn test_partial_source_keeps_defaults() {
        let settings = config::Config::builder()
            .set_override("server.port", 9000)
            .unwrap()
            .set_override("detection.sharp_only", true)
            .unwrap()
            .build()
            .unwrap();
        let configuration: Configuration = settings.try_deserialize().unwrap();

        assert_eq!(configuration.server.port, 9000);
        assert_eq!(configuration.server.host, "0.0.0.0");
        assert!(configuration.detection.sharp_only);
        assert_eq!(configuration.detection.color_min_area, 500.0);
    }

    #[test]
    fn test_zero_input_size_is_rejected() {
        let mut configuration = Configuration::default();
        configuration.model.input_size = 0;
        assert!(matches!(
            configuration.validate(),
            Err(AppError::InvalidConfig(_))
        ));
    }
}
