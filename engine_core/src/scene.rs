//! Scene and reverb configuration state.

use serde::{Deserialize, Serialize};

use crate::geometry::{Orientation, Vec3};

/// A sound source in the scene. Velocity is derived per frame from the
/// position delta, never authored directly.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SourceState {
    pub position: Vec3,
    pub velocity: Vec3,
    /// Previous frame's position, used only for finite-difference
    /// velocity estimation.
    pub last_position: Vec3,
}

impl SourceState {
    pub fn at(position: Vec3) -> Self {
        Self {
            position,
            velocity: Vec3::ZERO,
            last_position: position,
        }
    }
}

/// The listener's pose. One per scene.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ListenerState {
    pub position: Vec3,
    pub orientation: Orientation,
}

/// One primary source plus the listener. The stages take these as
/// values, so nothing here precludes rendering several sources.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SceneState {
    pub source: SourceState,
    pub listener: ListenerState,
}

/// Reverb send configuration. All fields are clamped to their declared
/// ranges on application rather than rejected.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReverbConfig {
    pub preset_id: Option<String>,
    /// Early-reflection mix gain, 0..=1.2.
    pub early_mix: f32,
    /// Late-reverb mix gain, 0..=1.5.
    pub late_mix: f32,
    /// Multiplies `late_mix` to obtain the final late send, 0.2..=1.8.
    pub decay: f32,
    /// Seconds of silence before the late tail, 0..=0.25.
    pub pre_delay: f32,
    /// Stereo width factor, 0..=1.8.
    pub stereo_width: f32,
}

impl Default for ReverbConfig {
    fn default() -> Self {
        Self {
            preset_id: None,
            early_mix: 0.5,
            late_mix: 0.6,
            decay: 1.0,
            pre_delay: 0.02,
            stereo_width: 1.0,
        }
    }
}

pub const EARLY_MIX_RANGE: (f32, f32) = (0.0, 1.2);
pub const LATE_MIX_RANGE: (f32, f32) = (0.0, 1.5);
pub const DECAY_RANGE: (f32, f32) = (0.2, 1.8);
pub const PRE_DELAY_RANGE: (f32, f32) = (0.0, 0.25);
pub const STEREO_WIDTH_RANGE: (f32, f32) = (0.0, 1.8);

impl ReverbConfig {
    /// Copy of the config with every field pulled into range.
    pub fn clamped(&self) -> Self {
        Self {
            preset_id: self.preset_id.clone(),
            early_mix: self.early_mix.clamp(EARLY_MIX_RANGE.0, EARLY_MIX_RANGE.1),
            late_mix: self.late_mix.clamp(LATE_MIX_RANGE.0, LATE_MIX_RANGE.1),
            decay: self.decay.clamp(DECAY_RANGE.0, DECAY_RANGE.1),
            pre_delay: self.pre_delay.clamp(PRE_DELAY_RANGE.0, PRE_DELAY_RANGE.1),
            stereo_width: self
                .stereo_width
                .clamp(STEREO_WIDTH_RANGE.0, STEREO_WIDTH_RANGE.1),
        }
    }
}
