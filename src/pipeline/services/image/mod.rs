pub mod analysis;
pub mod canvas;
pub mod codec;

pub use analysis::{DetectionConfig, DetectionModel};
pub use canvas::{Canvas, LabelFont};
pub use codec::{decode_image, encode_png, to_luma};
