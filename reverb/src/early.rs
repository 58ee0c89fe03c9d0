//! Early-reflection network.
//!
//! Four fixed tap delays, each low-passed with a decreasing cutoff and
//! gain so later reflections sound duller and quieter, plus a small
//! feedback diffusion loop at 60 ms.

use dsp::{DelayLine, OnePole};

const TAP_MS: [f32; 4] = [12.0, 21.0, 33.0, 47.0];
const TAP_CUTOFF_HZ: [f32; 4] = [4200.0, 3200.0, 2600.0, 1800.0];
const TAP_GAIN: [f32; 4] = [0.58, 0.44, 0.36, 0.28];
const DIFFUSION_MS: f32 = 60.0;

struct EarlyChannel {
    line: DelayLine,
    filters: [OnePole; 4],
}

pub struct EarlyReflections {
    channels: [EarlyChannel; 2],
    tap_samples: [usize; 4],
    diffusion_samples: usize,
}

impl EarlyReflections {
    pub fn new(sample_rate: f32) -> Self {
        let to_samples = |ms: f32| ((ms / 1000.0) * sample_rate).round() as usize;
        let tap_samples = [
            to_samples(TAP_MS[0]),
            to_samples(TAP_MS[1]),
            to_samples(TAP_MS[2]),
            to_samples(TAP_MS[3]),
        ];
        let diffusion_samples = to_samples(DIFFUSION_MS);
        let capacity = diffusion_samples.max(tap_samples[3]) + 1;
        let make_channel = || EarlyChannel {
            line: DelayLine::new(capacity),
            filters: [
                OnePole::low_pass(sample_rate, TAP_CUTOFF_HZ[0]),
                OnePole::low_pass(sample_rate, TAP_CUTOFF_HZ[1]),
                OnePole::low_pass(sample_rate, TAP_CUTOFF_HZ[2]),
                OnePole::low_pass(sample_rate, TAP_CUTOFF_HZ[3]),
            ],
        };
        Self {
            channels: [make_channel(), make_channel()],
            tap_samples,
            diffusion_samples,
        }
    }

    fn process_sample(&mut self, ch: usize, x: f32, diffusion: f32) -> f32 {
        let channel = &mut self.channels[ch];
        let mut sum = 0.0;
        for k in 0..4 {
            let tapped = channel.line.tap(self.tap_samples[k]);
            sum += channel.filters[k].process(tapped) * TAP_GAIN[k];
        }
        let feedback = channel.line.tap(self.diffusion_samples) * diffusion;
        channel.line.push(x + feedback);
        sum
    }

    /// Process one stereo block; `diffusion` carries the per-sample
    /// smoothed diffusion amount.
    pub fn process(
        &mut self,
        in_l: &[f32],
        in_r: &[f32],
        out_l: &mut [f32],
        out_r: &mut [f32],
        diffusion: &[f32],
    ) {
        for i in 0..in_l.len() {
            out_l[i] = self.process_sample(0, in_l[i], diffusion[i]);
            out_r[i] = self.process_sample(1, in_r[i], diffusion[i]);
        }
    }

    pub fn reset(&mut self) {
        for channel in self.channels.iter_mut() {
            channel.line.reset();
            for f in channel.filters.iter_mut() {
                f.reset();
            }
        }
    }
}
