//! Per-session signal graph.
//!
//! One graph exists per playback session. The control loop mutates it
//! only through smoothed parameters and short critical sections; the
//! render side pulls 128-frame blocks.

pub mod eq;
pub mod source;
pub mod tone;

pub use eq::{EqBank, EQ_BANDS, EQ_GAIN_DB_RANGE};
pub use source::BufferSource;
pub use tone::ToneChain;

use std::sync::Arc;

use log::warn;

use dsp::{AutomationMode, Parameter};
use engine_core::scene::ReverbConfig;
use engine_core::{AudioData, BLOCK_SIZE};
use reverb::ReverbStage;
use spatial::{SpatialStage, WidthStage};

struct Scratch {
    wet_l: Vec<f32>,
    wet_r: Vec<f32>,
    rev_l: Vec<f32>,
    rev_r: Vec<f32>,
    dry: Vec<f32>,
    wet: Vec<f32>,
    master: Vec<f32>,
}

/// source → EQ → dry/wet split (wet: tone → reverb) → spatial → width
/// → master.
pub struct PlaybackGraph {
    source: BufferSource,
    eq: EqBank,
    tone: ToneChain,
    reverb: ReverbStage,
    spatial: SpatialStage,
    width: WidthStage,
    master: Parameter,
    dry_gain: Parameter,
    wet_gain: Parameter,
    scratch: Scratch,
    tail_remaining: Option<usize>,
}

impl PlaybackGraph {
    pub fn new(data: Arc<AudioData>, sample_rate: f32, mode: AutomationMode) -> Self {
        let spatial = SpatialStage::new(sample_rate, mode);
        let dry_gain = spatial.dry_gain();
        let wet_gain = spatial.wet_gain();
        Self {
            source: BufferSource::new(data, sample_rate, mode, BLOCK_SIZE),
            eq: EqBank::new(sample_rate, mode),
            tone: ToneChain::new(sample_rate, mode, BLOCK_SIZE),
            reverb: ReverbStage::new(sample_rate, BLOCK_SIZE, mode),
            spatial,
            width: WidthStage::new(sample_rate, mode, BLOCK_SIZE),
            master: Parameter::new(0.9, 0.0, 1.5, sample_rate, mode),
            dry_gain,
            wet_gain,
            scratch: Scratch {
                wet_l: vec![0.0; BLOCK_SIZE],
                wet_r: vec![0.0; BLOCK_SIZE],
                rev_l: vec![0.0; BLOCK_SIZE],
                rev_r: vec![0.0; BLOCK_SIZE],
                dry: vec![0.0; BLOCK_SIZE],
                wet: vec![0.0; BLOCK_SIZE],
                master: vec![0.0; BLOCK_SIZE],
            },
            tail_remaining: None,
        }
    }

    /// Apply a configuration snapshot at session start, without
    /// smoothing.
    pub fn apply_config(&mut self, config: &ReverbConfig) {
        let c = config.clamped();
        self.reverb
            .apply_initial(c.early_mix, c.late_mix, c.decay, c.pre_delay);
        self.width.set_width(c.stereo_width, None);
    }

    /// Named reverb/mix parameter write, clamped by the receiving
    /// stage. Unknown names log and are otherwise ignored.
    pub fn set_reverb_param(&mut self, name: &str, value: f32) {
        match name {
            "earlyMix" => self.reverb.set_early_mix(value),
            "reverbMix" | "lateMix" => self.reverb.set_late_mix(value),
            "decay" => self.reverb.set_decay(value),
            "diffusion" => self.reverb.set_diffusion(value),
            "preDelay" => self.reverb.set_pre_delay(value),
            "stereoWidth" | "width" => self.width.set_width(value, None),
            "master" => self.master.ramp(value, 0.05),
            other => warn!("ignoring unknown reverb parameter '{}'", other),
        }
    }

    pub fn set_eq_gain(&mut self, band: usize, gain_db: f32) {
        self.eq.set_gain_db(band, gain_db);
    }

    pub fn set_tone_enabled(&mut self, enabled: bool) {
        self.tone.set_enabled(enabled);
    }

    pub fn set_looping(&mut self, looping: bool) {
        self.source.set_looping(looping);
    }

    pub fn playback_rate(&self) -> Parameter {
        self.source.rate()
    }

    pub fn spatial(&mut self) -> &mut SpatialStage {
        &mut self.spatial
    }

    pub fn reverb(&mut self) -> &mut ReverbStage {
        &mut self.reverb
    }

    /// Render one block of interleave-ready stereo. Returns false once
    /// the source has ended and the reverb tail has drained.
    pub fn render_block(&mut self, out_l: &mut [f32], out_r: &mut [f32]) -> bool {
        let n = out_l.len().min(out_r.len()).min(BLOCK_SIZE);
        let s = &mut self.scratch;

        let produced = self.source.render(&mut out_l[..n], &mut out_r[..n]);
        self.eq.process(&mut out_l[..n], &mut out_r[..n]);

        // Wet branch.
        s.wet_l[..n].copy_from_slice(&out_l[..n]);
        s.wet_r[..n].copy_from_slice(&out_r[..n]);
        self.tone.process(&mut s.wet_l[..n], &mut s.wet_r[..n]);
        self.reverb
            .process(&s.wet_l[..n], &s.wet_r[..n], &mut s.rev_l[..n], &mut s.rev_r[..n]);

        self.dry_gain.fill(&mut s.dry[..n]);
        self.wet_gain.fill(&mut s.wet[..n]);
        for i in 0..n {
            out_l[i] = out_l[i] * s.dry[i] + s.rev_l[i] * s.wet[i];
            out_r[i] = out_r[i] * s.dry[i] + s.rev_r[i] * s.wet[i];
        }

        self.spatial.process(&mut out_l[..n], &mut out_r[..n]);
        self.width.process(&mut out_l[..n], &mut out_r[..n]);

        self.master.fill(&mut s.master[..n]);
        for i in 0..n {
            out_l[i] *= s.master[i];
            out_r[i] *= s.master[i];
        }

        if self.source.finished() {
            let remaining = self
                .tail_remaining
                .get_or_insert_with(|| self.reverb.tail_frames());
            *remaining = remaining.saturating_sub(n - produced.min(n));
            *remaining > 0
        } else {
            true
        }
    }
}
