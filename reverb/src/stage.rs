//! Late-reverb convolution with double-buffered preset switching.
//!
//! Two convolution slots run in parallel. Loading a preset installs
//! the new impulse into the slot that does not already hold it, then
//! crossfades slot weights, so the room character changes mid-playback
//! without a silent gap or a click.

use dsp::{AutomationMode, Convolver, DelayLine, Parameter};
use engine_core::scene::{
    DECAY_RANGE, EARLY_MIX_RANGE, LATE_MIX_RANGE, PRE_DELAY_RANGE,
};
use engine_core::AudioData;
use log::debug;
use std::sync::{Arc, Mutex};

/// Crossfade window for preset switches.
pub const CROSSFADE_SECS: f32 = 0.22;
/// Time constant chosen so the exponential ramp is effectively settled
/// within the crossfade window.
const CROSSFADE_TC: f32 = CROSSFADE_SECS / 3.0;

/// Smoothing applied to ordinary mix-parameter changes.
const PARAM_TC: f32 = 0.05;

pub const DIFFUSION_RANGE: (f32, f32) = (0.0, 0.9);
pub const DEFAULT_DIFFUSION: f32 = 0.35;

struct ReverbSlot {
    conv: Arc<Mutex<Convolver>>,
    /// Crossfade weight in [0, 1]; the late send applies
    /// `late_mix * decay` on top.
    weight: Parameter,
    preset: Option<String>,
}

/// Outcome of a preset-load request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PresetLoad {
    /// The preset is already active and nothing is loading.
    AlreadyActive,
    /// The same preset is already being loaded; await that load.
    InFlight,
    /// Fetch the impulse, then call `finish_preset_load` for this slot.
    Start { slot: usize },
}

pub struct ReverbStage {
    early: crate::EarlyReflections,
    early_mix: Parameter,
    late_mix: Parameter,
    decay: Parameter,
    diffusion: Parameter,
    pre_delay: Parameter,
    sample_rate: f32,
    predelay_lines: [DelayLine; 2],
    slots: [ReverbSlot; 2],
    active_preset: Option<String>,
    in_flight: Option<String>,
    // Block scratch, allocated once.
    scratch: Scratch,
}

struct Scratch {
    diffusion: Vec<f32>,
    early_l: Vec<f32>,
    early_r: Vec<f32>,
    early_mix: Vec<f32>,
    mono: Vec<f32>,
    conv_l: Vec<f32>,
    conv_r: Vec<f32>,
    weight: Vec<f32>,
    late_l: Vec<f32>,
    late_r: Vec<f32>,
    late_mix: Vec<f32>,
    decay: Vec<f32>,
}

impl Scratch {
    fn new(block: usize) -> Self {
        Self {
            diffusion: vec![0.0; block],
            early_l: vec![0.0; block],
            early_r: vec![0.0; block],
            early_mix: vec![0.0; block],
            mono: vec![0.0; block],
            conv_l: vec![0.0; block],
            conv_r: vec![0.0; block],
            weight: vec![0.0; block],
            late_l: vec![0.0; block],
            late_r: vec![0.0; block],
            late_mix: vec![0.0; block],
            decay: vec![0.0; block],
        }
    }
}

impl ReverbStage {
    pub fn new(sample_rate: f32, block_size: usize, mode: AutomationMode) -> Self {
        let max_predelay = (PRE_DELAY_RANGE.1 * sample_rate) as usize + 1;
        let make_slot = || ReverbSlot {
            conv: Arc::new(Mutex::new(Convolver::new())),
            weight: Parameter::new(0.0, 0.0, 1.0, sample_rate, mode),
            preset: None,
        };
        Self {
            early: crate::EarlyReflections::new(sample_rate),
            early_mix: Parameter::new(
                0.5,
                EARLY_MIX_RANGE.0,
                EARLY_MIX_RANGE.1,
                sample_rate,
                mode,
            ),
            late_mix: Parameter::new(0.6, LATE_MIX_RANGE.0, LATE_MIX_RANGE.1, sample_rate, mode),
            decay: Parameter::new(1.0, DECAY_RANGE.0, DECAY_RANGE.1, sample_rate, mode),
            diffusion: Parameter::new(
                DEFAULT_DIFFUSION,
                DIFFUSION_RANGE.0,
                DIFFUSION_RANGE.1,
                sample_rate,
                mode,
            ),
            pre_delay: Parameter::new(
                0.02,
                PRE_DELAY_RANGE.0,
                PRE_DELAY_RANGE.1,
                sample_rate,
                mode,
            ),
            sample_rate,
            predelay_lines: [DelayLine::new(max_predelay), DelayLine::new(max_predelay)],
            slots: [make_slot(), make_slot()],
            active_preset: None,
            in_flight: None,
            scratch: Scratch::new(block_size),
        }
    }

    pub fn set_early_mix(&self, value: f32) {
        self.early_mix.ramp(value, PARAM_TC);
    }

    pub fn set_late_mix(&self, value: f32) {
        self.late_mix.ramp(value, PARAM_TC);
    }

    pub fn set_decay(&self, value: f32) {
        self.decay.ramp(value, PARAM_TC);
    }

    pub fn set_diffusion(&self, value: f32) {
        self.diffusion.ramp(value, PARAM_TC);
    }

    pub fn set_pre_delay(&self, value: f32) {
        self.pre_delay.ramp(value, PARAM_TC);
    }

    /// Apply initial values without smoothing, so the first rendered
    /// block is not silently ramping from defaults.
    pub fn apply_initial(&self, early_mix: f32, late_mix: f32, decay: f32, pre_delay: f32) {
        self.early_mix.set(early_mix);
        self.late_mix.set(late_mix);
        self.decay.set(decay);
        self.pre_delay.set(pre_delay);
    }

    pub fn active_preset(&self) -> Option<&str> {
        self.active_preset.as_deref()
    }

    /// First half of the preset-switch protocol; the caller fetches
    /// the impulse for `Start` outcomes and then calls
    /// [`finish_preset_load`](Self::finish_preset_load).
    pub fn begin_preset_load(&mut self, id: &str) -> PresetLoad {
        if self.active_preset.as_deref() == Some(id) && self.in_flight.is_none() {
            return PresetLoad::AlreadyActive;
        }
        if self.in_flight.as_deref() == Some(id) {
            return PresetLoad::InFlight;
        }
        // Pick the slot not tagged with this preset, preferring idle.
        let slot = self
            .slots
            .iter()
            .position(|s| s.preset.is_none())
            .unwrap_or_else(|| {
                self.slots
                    .iter()
                    .position(|s| s.preset.as_deref() != Some(id))
                    .unwrap_or(0)
            });
        self.in_flight = Some(id.to_string());
        PresetLoad::Start { slot }
    }

    /// Install a fetched impulse and start the crossfade. A load that
    /// was superseded by a newer request is dropped silently.
    pub fn finish_preset_load(&mut self, id: &str, slot: usize, impulse: &AudioData) {
        if self.in_flight.as_deref() != Some(id) {
            debug!("preset load '{}' superseded, discarding", id);
            return;
        }
        let (left, right) = match impulse.stereo() {
            Some(pair) => pair,
            None => {
                debug!("preset '{}' impulse is empty, keeping current slots", id);
                self.in_flight = None;
                return;
            }
        };
        self.slots[slot].conv.lock().unwrap().set_ir(left, right);
        self.slots[slot].preset = Some(id.to_string());

        // Only now does the old slot begin fading out: no silent gap,
        // and both slots overlap only for the crossfade window.
        for (i, s) in self.slots.iter().enumerate() {
            let target = if i == slot { 1.0 } else { 0.0 };
            s.weight.ramp(target, CROSSFADE_TC);
        }
        self.active_preset = Some(id.to_string());
        self.in_flight = None;
        debug!("reverb preset '{}' active in slot {}", id, slot);
    }

    /// Per-slot (preset tag, effective send gain) pairs: the crossfade
    /// weight scaled by `late_mix * decay`.
    pub fn slot_state(&self) -> [(Option<String>, f32); 2] {
        let send = self.late_mix.value() * self.decay.value();
        [
            (
                self.slots[0].preset.clone(),
                self.slots[0].weight.value() * send,
            ),
            (
                self.slots[1].preset.clone(),
                self.slots[1].weight.value() * send,
            ),
        ]
    }

    /// Frames of tail the stage keeps producing after its input goes
    /// silent.
    pub fn tail_frames(&self) -> usize {
        let ir = self
            .slots
            .iter()
            .map(|s| s.conv.lock().unwrap().ir_frames())
            .max()
            .unwrap_or(0);
        ir + (PRE_DELAY_RANGE.1 * self.sample_rate) as usize
    }

    /// Render one block of wet signal (early + late) from the block of
    /// input. Output buffers are overwritten.
    pub fn process(&mut self, in_l: &[f32], in_r: &[f32], out_l: &mut [f32], out_r: &mut [f32]) {
        let n = in_l.len();
        let s = &mut self.scratch;

        // Early reflections.
        self.diffusion.fill(&mut s.diffusion[..n]);
        self.early.process(
            in_l,
            in_r,
            &mut s.early_l[..n],
            &mut s.early_r[..n],
            &s.diffusion[..n],
        );
        self.early_mix.fill(&mut s.early_mix[..n]);
        for i in 0..n {
            out_l[i] = s.early_l[i] * s.early_mix[i];
            out_r[i] = s.early_r[i] * s.early_mix[i];
        }

        // Pre-delay, then mono-sum feeding both convolution slots.
        let delay_samples = (self.pre_delay.advance(n) * self.sample_rate) as usize;
        for i in 0..n {
            self.predelay_lines[0].push(in_l[i]);
            self.predelay_lines[1].push(in_r[i]);
            let pl = self.predelay_lines[0].tap(delay_samples);
            let pr = self.predelay_lines[1].tap(delay_samples);
            s.mono[i] = 0.5 * (pl + pr);
        }

        s.late_l[..n].fill(0.0);
        s.late_r[..n].fill(0.0);
        for slot in self.slots.iter() {
            let mut conv = slot.conv.lock().unwrap();
            if !conv.is_active() {
                // Still advance the weight so crossfades stay in sync.
                slot.weight.advance(n);
                continue;
            }
            conv.process(&s.mono[..n], &mut s.conv_l[..n], &mut s.conv_r[..n]);
            slot.weight.fill(&mut s.weight[..n]);
            for i in 0..n {
                s.late_l[i] += s.conv_l[i] * s.weight[i];
                s.late_r[i] += s.conv_r[i] * s.weight[i];
            }
        }

        self.late_mix.fill(&mut s.late_mix[..n]);
        self.decay.fill(&mut s.decay[..n]);
        for i in 0..n {
            let send = s.late_mix[i] * s.decay[i];
            out_l[i] += s.late_l[i] * send;
            out_r[i] += s.late_r[i] * send;
        }
    }
}
