//! Spatial rendering: distance attenuation, HRTF convolution with
//! nearest-neighbor interpolation, an equal-power panner fallback, and
//! the stereo width stage.

pub mod hrtf;
pub mod stage;
pub mod width;

pub use hrtf::{compute_hrtf_targets, HrtfTarget};
pub use stage::{distance_gain, HrtfLoadRequest, SpatialStage};
pub use width::WidthStage;
