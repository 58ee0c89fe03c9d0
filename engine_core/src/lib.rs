//! Shared types for the soundfield engine.
//!
//! This crate holds the value types, identifiers and the unified error
//! type used by every other crate in the workspace.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

pub mod geometry;
pub mod scene;

pub use geometry::{Orientation, Vec3};
pub use scene::{ListenerState, ReverbConfig, SceneState, SourceState};

/// Unique identifier for a playback session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(Uuid);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Display only the first 8 characters for brevity
        write!(f, "{}", &self.0.to_string()[..8])
    }
}

/// Unified error type for the engine.
#[derive(Error, Debug)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Asset error: {0}")]
    Asset(String),

    #[error("Decode error: {0}")]
    Decode(String),

    #[error("Audio error: {0}")]
    Audio(String),

    #[error("Runtime capability missing: {0}")]
    Capability(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Frames per render quantum; the render clock consumes audio in
/// blocks of this size.
pub const BLOCK_SIZE: usize = 128;

/// Sample rate assumed when an asset does not declare one.
pub const DEFAULT_SAMPLE_RATE: u32 = 48000;

/// Decoded planar audio: one `Vec<f32>` per channel.
#[derive(Debug, Clone, Default)]
pub struct AudioData {
    pub sample_rate: u32,
    pub channels: Vec<Vec<f32>>,
}

impl AudioData {
    pub fn new(sample_rate: u32, channels: Vec<Vec<f32>>) -> Self {
        Self {
            sample_rate,
            channels,
        }
    }

    /// Number of frames (samples per channel).
    pub fn frames(&self) -> usize {
        self.channels.first().map(|c| c.len()).unwrap_or(0)
    }

    pub fn duration_secs(&self) -> f32 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.frames() as f32 / self.sample_rate as f32
    }

    /// Left/right channel views; a mono buffer serves both sides.
    pub fn stereo(&self) -> Option<(&[f32], &[f32])> {
        match self.channels.len() {
            0 => None,
            1 => Some((&self.channels[0], &self.channels[0])),
            _ => Some((&self.channels[0], &self.channels[1])),
        }
    }
}
