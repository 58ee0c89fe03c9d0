// Soundfield: spatial audio and convolution reverb engine
// Expose public modules for use in integration tests

pub mod engine;
pub mod graph;

// Re-export commonly used types for convenience
pub use engine::{Engine, EngineSession, SceneDelta};
pub use graph::PlaybackGraph;
