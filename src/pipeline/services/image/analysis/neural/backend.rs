use std::path::Path;
use std::sync::Mutex;

use ort::session::Session;
use ort::value::Tensor;
use tracing::{debug, info, instrument};

use super::decode::{InputTensor, OutputTable};
use crate::error::AppError;

/// Something that can run the detection network's forward pass.
pub trait InferenceBackend: Send + Sync {
    fn infer(&self, input: InputTensor) -> Result<Vec<OutputTable>, AppError>;

    /// Release the network. Later calls to `infer` fail.
    fn shutdown(&self) {}

    fn name(&self) -> &'static str;
}

/// ONNX Runtime session loaded once per process.
///
/// Runs are serialized through the mutex; the slot is emptied on shutdown.
pub struct OrtBackend {
    session: Mutex<Option<Session>>,
}

impl OrtBackend {
    #[instrument(skip_all, fields(model = %model_path.display()))]
    pub fn load(model_path: &Path) -> Result<Self, AppError> {
        if !model_path.is_file() {
            return Err(AppError::ModelUnavailable(format!(
                "no model file at {}",
                model_path.display()
            )));
        }
        let session = Session::builder()?.commit_from_file(model_path)?;
        info!("Loaded detection network from {}", model_path.display());
        Ok(Self {
            session: Mutex::new(Some(session)),
        })
    }
}

impl InferenceBackend for OrtBackend {
    fn infer(&self, input: InputTensor) -> Result<Vec<OutputTable>, AppError> {
        let tensor = Tensor::from_array((input.shape, input.data.into_boxed_slice()))?;

        let mut guard = self
            .session
            .lock()
            .map_err(|_| AppError::Inference("session lock poisoned".to_string()))?;
        let session = guard
            .as_mut()
            .ok_or_else(|| AppError::ModelUnavailable("network has been shut down".to_string()))?;

        let outputs = session.run(ort::inputs![tensor])?;
        let mut tables = Vec::new();
        for (name, value) in outputs.iter() {
            let (shape, data) = value.try_extract_tensor::<f32>()?;
            let dims: Vec<i64> = shape.iter().copied().collect();
            debug!("Output {} has shape {:?}", name, dims);
            tables.push(OutputTable::from_shape(&dims, data.to_vec())?);
        }
        Ok(tables)
    }

    fn shutdown(&self) {
        if let Ok(mut guard) = self.session.lock() {
            if guard.take().is_some() {
                info!("Released detection network");
            }
        }
    }

    fn name(&self) -> &'static str {
        "OrtBackend"
    }
}
