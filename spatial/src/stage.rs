//! Distance attenuation, HRTF slot blending, and the equal-power panner
//! fallback.
//!
//! Geometry updates arrive at control rate and only move [`Parameter`]
//! targets; the audio path reads smoothed per-sample values, so source
//! motion never steps the output.

use std::f32::consts::FRAC_PI_4;
use std::sync::{Arc, Mutex};

use engine_core::geometry::{compute_angles, Vec3};
use engine_core::scene::ListenerState;
use engine_core::{AudioData, BLOCK_SIZE};

use dsp::{AutomationMode, Convolver, Parameter};

use crate::hrtf::{compute_hrtf_targets, HrtfTarget};
use assets::HrtfPositionDescriptor;

/// Distance attenuation with a close-range plateau. Inverse-distance
/// with rolloff 1.05 and reference 1.1 m, flat inside the reference and
/// clamped at 32 m.
pub fn distance_gain(distance: f32) -> f32 {
    const REF: f32 = 1.1;
    const ROLLOFF: f32 = 1.05;
    const MAX: f32 = 32.0;
    let d = distance.clamp(REF, MAX);
    REF / (REF + ROLLOFF * (d - REF))
}

const HRTF_SLOTS: usize = 2;
const HRTF_FADE_TC: f32 = 0.18 / 3.0;
const BYPASS_FADE_TC: f32 = 0.12 / 3.0;
const DRY_TC: f32 = 0.05;
const PAN_TC: f32 = 0.05;

/// A convolver slot paired with the catalog file it holds and its
/// smoothed blend gain.
struct HrtfSlot {
    conv: Arc<Mutex<Convolver>>,
    gain: Parameter,
    key: Option<String>,
}

/// Asset fetch the caller should run for a slot that was assigned a new
/// catalog position. Install the decoded pair via
/// [`SpatialStage::install_hrtf`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HrtfLoadRequest {
    pub slot: usize,
    pub file: String,
}

struct Scratch {
    in_l: Vec<f32>,
    in_r: Vec<f32>,
    mono: Vec<f32>,
    pan_l: Vec<f32>,
    pan_r: Vec<f32>,
    conv_l: Vec<f32>,
    conv_r: Vec<f32>,
    gain: Vec<f32>,
    mix: Vec<f32>,
    hrtf: Vec<f32>,
    pan: Vec<f32>,
}

/// Positions a source in the stereo field. Two independent blends:
/// `spatial_mix` crossfades the processed rendering against the
/// untouched input (the on/off toggle), while `hrtf_mix` crossfades
/// the processed rendering between HRTF convolution and the
/// equal-power panner, tracking whether an impulse is installed.
pub struct SpatialStage {
    catalog: Vec<HrtfPositionDescriptor>,
    slots: Vec<HrtfSlot>,
    pan: Parameter,
    spatial_mix: Parameter,
    hrtf_mix: Parameter,
    dry_gain: Parameter,
    wet_gain: Parameter,
    enabled: bool,
    scratch: Scratch,
}

impl SpatialStage {
    pub fn new(sample_rate: f32, mode: AutomationMode) -> Self {
        let slots = (0..HRTF_SLOTS)
            .map(|_| HrtfSlot {
                conv: Arc::new(Mutex::new(Convolver::new())),
                gain: Parameter::new(0.0, 0.0, 1.0, sample_rate, mode),
                key: None,
            })
            .collect();
        Self {
            catalog: Vec::new(),
            slots,
            pan: Parameter::new(0.0, -1.0, 1.0, sample_rate, mode),
            spatial_mix: Parameter::new(1.0, 0.0, 1.0, sample_rate, mode),
            hrtf_mix: Parameter::new(0.0, 0.0, 1.0, sample_rate, mode),
            dry_gain: Parameter::new(1.0, 0.0, 1.0, sample_rate, mode),
            wet_gain: Parameter::new(1.0, 0.0, 1.5, sample_rate, mode),
            enabled: true,
            scratch: Scratch {
                in_l: vec![0.0; BLOCK_SIZE],
                in_r: vec![0.0; BLOCK_SIZE],
                mono: vec![0.0; BLOCK_SIZE],
                pan_l: vec![0.0; BLOCK_SIZE],
                pan_r: vec![0.0; BLOCK_SIZE],
                conv_l: vec![0.0; BLOCK_SIZE],
                conv_r: vec![0.0; BLOCK_SIZE],
                gain: vec![0.0; BLOCK_SIZE],
                mix: vec![0.0; BLOCK_SIZE],
                hrtf: vec![0.0; BLOCK_SIZE],
                pan: vec![0.0; BLOCK_SIZE],
            },
        }
    }

    pub fn set_catalog(&mut self, catalog: Vec<HrtfPositionDescriptor>) {
        self.catalog = catalog;
    }

    pub fn catalog_is_empty(&self) -> bool {
        self.catalog.is_empty()
    }

    /// Enable or disable spatialization. Crossfades between the
    /// processed rendering and the untouched input over 120 ms.
    pub fn set_enabled(&mut self, enabled: bool) {
        if self.enabled == enabled {
            return;
        }
        self.enabled = enabled;
        let target = if enabled { 1.0 } else { 0.0 };
        self.spatial_mix.ramp(target, BYPASS_FADE_TC);
    }

    /// Permanently fall back to the panner for this session, used when
    /// an HRTF asset fails to load. Spatialization stays on.
    pub fn disable_hrtf(&mut self) {
        self.catalog.clear();
        for slot in &mut self.slots {
            slot.key = None;
            if let Ok(mut conv) = slot.conv.lock() {
                conv.clear();
            }
        }
    }

    /// Handle for the source's distance gain, applied to the dry path
    /// by the caller.
    pub fn dry_gain(&self) -> Parameter {
        self.dry_gain.clone()
    }

    /// Handle for the reverb send gain, which tracks distance so far
    /// sources sound more reverberant.
    pub fn wet_gain(&self) -> Parameter {
        self.wet_gain.clone()
    }

    /// Control-rate geometry update. Moves pan, dry and wet targets and
    /// reassigns HRTF slots; returns the asset fetches needed for slots
    /// that changed position.
    pub fn update_pose(
        &mut self,
        listener: &ListenerState,
        source_pos: Vec3,
    ) -> Vec<HrtfLoadRequest> {
        let offset = source_pos.sub(listener.position);
        let distance = offset.length();
        let dry = distance_gain(distance);
        self.dry_gain.ramp(dry, DRY_TC);
        self.wet_gain.ramp(0.35 + 0.65 * dry, DRY_TC);

        let (azimuth, elevation) =
            compute_angles(listener.position, listener.orientation, source_pos);
        self.pan.ramp(azimuth.to_radians().sin(), PAN_TC);

        if self.catalog.is_empty() {
            return Vec::new();
        }
        let targets = compute_hrtf_targets(&self.catalog, azimuth, elevation);
        self.assign_slots(&targets)
    }

    /// Map targets onto slots, reusing any slot that already holds a
    /// wanted file so only genuinely new positions trigger a fetch.
    fn assign_slots(&mut self, targets: &[HrtfTarget]) -> Vec<HrtfLoadRequest> {
        let mut requests = Vec::new();
        let mut claimed = [false; HRTF_SLOTS];

        let mut assignments: Vec<(usize, &HrtfTarget)> = Vec::new();
        for target in targets {
            if let Some(idx) = self.slots.iter().enumerate().position(|(i, s)| {
                !claimed[i] && s.key.as_deref() == Some(target.file.as_str())
            }) {
                claimed[idx] = true;
                assignments.push((idx, target));
            }
        }
        for target in targets {
            if assignments.iter().any(|(_, t)| t.file == target.file) {
                continue;
            }
            let Some(idx) = (0..self.slots.len()).find(|i| !claimed[*i]) else {
                break;
            };
            claimed[idx] = true;
            self.slots[idx].key = Some(target.file.clone());
            if let Ok(mut conv) = self.slots[idx].conv.lock() {
                conv.clear();
            }
            requests.push(HrtfLoadRequest {
                slot: idx,
                file: target.file.clone(),
            });
            assignments.push((idx, target));
        }

        for (i, slot) in self.slots.iter().enumerate() {
            let weight = assignments
                .iter()
                .find(|(idx, _)| *idx == i)
                .map(|(_, t)| t.weight)
                .unwrap_or(0.0);
            slot.gain.ramp(weight, HRTF_FADE_TC);
        }
        requests
    }

    /// Install a decoded impulse pair into a slot. Ignored if the slot
    /// has since been reassigned to a different file.
    pub fn install_hrtf(&mut self, slot: usize, file: &str, data: &AudioData) {
        let Some(entry) = self.slots.get_mut(slot) else {
            return;
        };
        if entry.key.as_deref() != Some(file) {
            return;
        }
        if let (Some((left, right)), Ok(mut conv)) = (data.stereo(), entry.conv.lock()) {
            conv.set_ir(left, right);
        }
    }

    fn any_slot_active(&self) -> bool {
        self.slots
            .iter()
            .any(|s| s.conv.lock().map(|c| c.is_active()).unwrap_or(false))
    }

    /// Render one block in place.
    pub fn process(&mut self, left: &mut [f32], right: &mut [f32]) {
        let n = left.len().min(right.len()).min(BLOCK_SIZE);
        let conv_active = self.any_slot_active();

        // The HRTF blend chases impulse availability so an install or a
        // failure never steps the output.
        let hrtf_target = if conv_active { 1.0 } else { 0.0 };
        if (self.hrtf_mix.target() - hrtf_target).abs() > 1e-6 {
            self.hrtf_mix.ramp(hrtf_target, HRTF_FADE_TC);
        }

        let s = &mut self.scratch;
        s.in_l[..n].copy_from_slice(&left[..n]);
        s.in_r[..n].copy_from_slice(&right[..n]);
        for i in 0..n {
            s.mono[i] = 0.5 * (left[i] + right[i]);
        }

        self.pan.fill(&mut s.pan[..n]);
        for i in 0..n {
            let angle = (s.pan[i] + 1.0) * FRAC_PI_4;
            s.pan_l[i] = s.mono[i] * angle.cos();
            s.pan_r[i] = s.mono[i] * angle.sin();
        }

        if conv_active || self.hrtf_mix.value() > 1e-4 {
            left[..n].fill(0.0);
            right[..n].fill(0.0);
            for slot in &self.slots {
                let Ok(mut conv) = slot.conv.lock() else {
                    continue;
                };
                if !conv.is_active() {
                    slot.gain.advance(n);
                    continue;
                }
                conv.process(&s.mono[..n], &mut s.conv_l[..n], &mut s.conv_r[..n]);
                slot.gain.fill(&mut s.gain[..n]);
                for i in 0..n {
                    left[i] += s.conv_l[i] * s.gain[i];
                    right[i] += s.conv_r[i] * s.gain[i];
                }
            }
            self.hrtf_mix.fill(&mut s.hrtf[..n]);
            for i in 0..n {
                let h = s.hrtf[i];
                left[i] = left[i] * h + s.pan_l[i] * (1.0 - h);
                right[i] = right[i] * h + s.pan_r[i] * (1.0 - h);
            }
        } else {
            self.hrtf_mix.advance(n);
            for slot in &self.slots {
                slot.gain.advance(n);
            }
            left[..n].copy_from_slice(&s.pan_l[..n]);
            right[..n].copy_from_slice(&s.pan_r[..n]);
        }

        // On/off toggle: fade the processed rendering against the
        // input as it arrived.
        self.spatial_mix.fill(&mut s.mix[..n]);
        for i in 0..n {
            let m = s.mix[i];
            left[i] = left[i] * m + s.in_l[i] * (1.0 - m);
            right[i] = right[i] * m + s.in_r[i] * (1.0 - m);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use engine_core::geometry::Orientation;
    use std::f32::consts::FRAC_1_SQRT_2;

    fn listener() -> ListenerState {
        ListenerState {
            position: Vec3::default(),
            orientation: Orientation::default(),
        }
    }

    fn catalog() -> Vec<HrtfPositionDescriptor> {
        vec![
            HrtfPositionDescriptor {
                azimuth: 0.0,
                elevation: 0.0,
                file: "front.wav".into(),
            },
            HrtfPositionDescriptor {
                azimuth: 90.0,
                elevation: 0.0,
                file: "right.wav".into(),
            },
            HrtfPositionDescriptor {
                azimuth: -90.0,
                elevation: 0.0,
                file: "left.wav".into(),
            },
        ]
    }

    #[test]
    fn distance_gain_plateaus_close_in() {
        assert!((distance_gain(0.0) - 1.0).abs() < 1e-6);
        assert!((distance_gain(1.1) - 1.0).abs() < 1e-6);
        assert!(distance_gain(2.0) < 1.0);
    }

    #[test]
    fn distance_gain_monotonic_and_clamped() {
        // Strictly decreasing between the reference plateau and the
        // 32 m clamp.
        let mut prev = distance_gain(1.1);
        for step in 1..=30 {
            let g = distance_gain(1.1 + step as f32);
            assert!(g < prev, "gain not strictly decreasing at {} m", 1.1 + step as f32);
            prev = g;
        }
        assert!((distance_gain(32.0) - distance_gain(500.0)).abs() < 1e-6);
    }

    #[test]
    fn pose_update_requests_needed_files_once() {
        let mut stage = SpatialStage::new(48_000.0, AutomationMode::Immediate);
        stage.set_catalog(catalog());
        let requests = stage.update_pose(&listener(), Vec3::new(0.0, 0.0, -2.0));
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].file, "front.wav");

        // Same pose again: the slot already holds the file.
        let requests = stage.update_pose(&listener(), Vec3::new(0.0, 0.0, -2.0));
        assert!(requests.is_empty());
    }

    #[test]
    fn slot_reuse_across_adjacent_directions() {
        let mut stage = SpatialStage::new(48_000.0, AutomationMode::Immediate);
        stage.set_catalog(catalog());
        stage.update_pose(&listener(), Vec3::new(0.0, 0.0, -2.0));
        // Between front and right: front slot is kept, right is fetched.
        let requests = stage.update_pose(&listener(), Vec3::new(2.0, 0.0, -2.0));
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].file, "right.wav");
    }

    #[test]
    fn stale_install_is_ignored() {
        let mut stage = SpatialStage::new(48_000.0, AutomationMode::Immediate);
        stage.set_catalog(catalog());
        let requests = stage.update_pose(&listener(), Vec3::new(0.0, 0.0, -2.0));
        let slot = requests[0].slot;
        // Reassign the slot before the fetch completes.
        stage.slots[slot].key = Some("left.wav".to_string());
        let ir = AudioData::new(48_000, vec![vec![1.0], vec![1.0]]);
        stage.install_hrtf(slot, "front.wav", &ir);
        assert!(!stage.any_slot_active());
    }

    #[test]
    fn panner_fallback_follows_azimuth() {
        let mut stage = SpatialStage::new(48_000.0, AutomationMode::Immediate);
        // Hard right.
        stage.update_pose(&listener(), Vec3::new(2.0, 0.0, 0.0));
        let mut l = vec![1.0; BLOCK_SIZE];
        let mut r = vec![1.0; BLOCK_SIZE];
        stage.process(&mut l, &mut r);
        assert!(r[0] > l[0] * 10.0, "l={} r={}", l[0], r[0]);
    }

    #[test]
    fn centered_panner_is_equal_power() {
        let mut stage = SpatialStage::new(48_000.0, AutomationMode::Immediate);
        stage.update_pose(&listener(), Vec3::new(0.0, 0.0, -2.0));
        let mut l = vec![1.0; BLOCK_SIZE];
        let mut r = vec![1.0; BLOCK_SIZE];
        stage.process(&mut l, &mut r);
        assert!((l[0] - r[0]).abs() < 1e-6);
        assert!((l[0] - FRAC_1_SQRT_2).abs() < 1e-3, "l={}", l[0]);
    }

    #[test]
    fn installed_impulse_renders_through_slot() {
        let mut stage = SpatialStage::new(48_000.0, AutomationMode::Immediate);
        stage.set_catalog(catalog());
        let requests = stage.update_pose(&listener(), Vec3::new(0.0, 0.0, -2.0));
        let ir = AudioData::new(48_000, vec![vec![1.0], vec![0.5]]);
        stage.install_hrtf(requests[0].slot, "front.wav", &ir);
        assert!(stage.any_slot_active());

        let mut l = vec![0.0; BLOCK_SIZE];
        let mut r = vec![0.0; BLOCK_SIZE];
        l[0] = 1.0;
        r[0] = 1.0;
        stage.process(&mut l, &mut r);
        // Unit-delta mono input through a delta pair: left passes,
        // right is halved.
        assert!((l[0] - 1.0).abs() < 1e-4, "l={}", l[0]);
        assert!((r[0] - 0.5).abs() < 1e-4, "r={}", r[0]);
    }

    #[test]
    fn disabled_stage_passes_input_through() {
        let mut stage = SpatialStage::new(48_000.0, AutomationMode::Immediate);
        stage.update_pose(&listener(), Vec3::new(2.0, 0.0, 0.0));
        stage.set_enabled(false);
        let mut l = vec![1.0; BLOCK_SIZE];
        let mut r = vec![0.0; BLOCK_SIZE];
        stage.process(&mut l, &mut r);
        for i in 0..BLOCK_SIZE {
            assert!((l[i] - 1.0).abs() < 1e-6, "l[{}]={}", i, l[i]);
            assert!(r[i].abs() < 1e-6, "r[{}]={}", i, r[i]);
        }
    }

    #[test]
    fn disabled_stage_bypasses_installed_hrtf() {
        let mut stage = SpatialStage::new(48_000.0, AutomationMode::Immediate);
        stage.set_catalog(catalog());
        let requests = stage.update_pose(&listener(), Vec3::new(0.0, 0.0, -2.0));
        let ir = AudioData::new(48_000, vec![vec![1.0], vec![0.5]]);
        stage.install_hrtf(requests[0].slot, "front.wav", &ir);
        stage.set_enabled(false);
        let mut l = vec![0.25; BLOCK_SIZE];
        let mut r = vec![0.75; BLOCK_SIZE];
        stage.process(&mut l, &mut r);
        assert!((l[0] - 0.25).abs() < 1e-6, "l={}", l[0]);
        assert!((r[0] - 0.75).abs() < 1e-6, "r={}", r[0]);
    }

    #[test]
    fn disable_clears_slots() {
        let mut stage = SpatialStage::new(48_000.0, AutomationMode::Immediate);
        stage.set_catalog(catalog());
        let requests = stage.update_pose(&listener(), Vec3::new(0.0, 0.0, -2.0));
        let ir = AudioData::new(48_000, vec![vec![1.0], vec![1.0]]);
        stage.install_hrtf(requests[0].slot, "front.wav", &ir);
        stage.disable_hrtf();
        assert!(!stage.any_slot_active());
        assert!(stage.catalog_is_empty());
    }
}
