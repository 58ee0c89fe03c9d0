//! Reverberation stage: early-reflection network plus double-buffered
//! late-reverb convolution with crossfaded preset switching.

pub mod early;
pub mod stage;

pub use early::EarlyReflections;
pub use stage::{PresetLoad, ReverbStage, CROSSFADE_SECS};
