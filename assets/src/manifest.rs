//! Manifest formats for impulse-response and HRTF catalogs.

use serde::{Deserialize, Serialize};

/// One selectable room preset. Loaded once from the impulse manifest,
/// immutable afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImpulsePresetDescriptor {
    pub id: String,
    pub label: String,
    #[serde(default)]
    pub description: String,
    /// Audio file path relative to the asset base.
    pub file: String,
    pub decay_seconds: f32,
    pub recommended_pre_delay: f32,
    pub default_early_mix: f32,
    pub default_reverb_mix: f32,
    pub default_width: f32,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ImpulseManifest {
    pub presets: Vec<ImpulsePresetDescriptor>,
}

/// One measured HRTF position: a stereo impulse pair for a direction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HrtfPositionDescriptor {
    /// Degrees, -180..180.
    pub azimuth: f32,
    /// Degrees, -90..90.
    pub elevation: f32,
    /// Audio file path relative to the asset base.
    pub file: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HrtfManifest {
    pub positions: Vec<HrtfPositionDescriptor>,
}
