pub mod lens;
pub mod upc;

pub use lens::{VisionClient, VisionConfig, VisionError};
