mod backend;
pub mod backends;
mod output;

pub use backend::Detector;
pub use backends::ReplayDetector;
pub use output::{RegionOutputs, ShapeError};
