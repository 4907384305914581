pub mod backend;
pub mod decode;
pub mod labels;
pub mod sharp_object_detector;

pub use backend::{InferenceBackend, OrtBackend};
pub use decode::{decode_table, preprocess, Detection, InputTensor, OutputTable, PixelBox};
pub use labels::{CLASS_LABELS, SHARP_LABELS};
pub use sharp_object_detector::{DetectionModel, SharpObjectDetector};
