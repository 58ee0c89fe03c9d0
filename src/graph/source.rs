//! Buffer playback with a smoothed, Doppler-driven playback rate.

use std::sync::Arc;

use dsp::{AutomationMode, Parameter};
use engine_core::AudioData;

/// Plays a decoded buffer through linear interpolation. The playback
/// rate is a smoothed parameter so Doppler updates glide instead of
/// stepping the pitch.
pub struct BufferSource {
    data: Arc<AudioData>,
    position: f64,
    rate: Parameter,
    looping: bool,
    rate_scratch: Vec<f32>,
}

impl BufferSource {
    pub fn new(
        data: Arc<AudioData>,
        sample_rate: f32,
        mode: AutomationMode,
        block_size: usize,
    ) -> Self {
        Self {
            data,
            position: 0.0,
            rate: Parameter::new(1.0, 0.5, 2.0, sample_rate, mode),
            looping: false,
            rate_scratch: vec![0.0; block_size],
        }
    }

    pub fn set_looping(&mut self, looping: bool) {
        self.looping = looping;
    }

    /// Handle for the playback-rate parameter, ramped by the Doppler
    /// estimator at control rate.
    pub fn rate(&self) -> Parameter {
        self.rate.clone()
    }

    pub fn finished(&self) -> bool {
        !self.looping && self.position >= self.data.frames() as f64
    }

    fn sample(channel: &[f32], pos: f64) -> f32 {
        let i = pos as usize;
        if i + 1 < channel.len() {
            let frac = (pos - i as f64) as f32;
            channel[i] * (1.0 - frac) + channel[i + 1] * frac
        } else if i < channel.len() {
            channel[i]
        } else {
            0.0
        }
    }

    /// Render one block. Returns the number of frames produced; the
    /// remainder of the buffers is zeroed once the source runs out.
    pub fn render(&mut self, left: &mut [f32], right: &mut [f32]) -> usize {
        let n = left.len().min(right.len()).min(self.rate_scratch.len());
        let frames = self.data.frames() as f64;
        let Some((src_l, src_r)) = self.data.stereo() else {
            left[..n].fill(0.0);
            right[..n].fill(0.0);
            return 0;
        };

        self.rate.fill(&mut self.rate_scratch[..n]);
        let mut produced = 0;
        for i in 0..n {
            if self.position >= frames {
                if self.looping && frames > 0.0 {
                    self.position %= frames;
                } else {
                    break;
                }
            }
            left[i] = Self::sample(src_l, self.position);
            right[i] = Self::sample(src_r, self.position);
            self.position += self.rate_scratch[i] as f64;
            produced += 1;
        }
        left[produced..n].fill(0.0);
        right[produced..n].fill(0.0);
        produced
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp_buffer(frames: usize) -> Arc<AudioData> {
        let samples: Vec<f32> = (0..frames).map(|i| i as f32).collect();
        Arc::new(AudioData::new(48_000, vec![samples]))
    }

    #[test]
    fn unit_rate_reads_straight_through() {
        let mut src = BufferSource::new(ramp_buffer(256), 48_000.0, AutomationMode::Immediate, 128);
        let mut l = vec![0.0; 128];
        let mut r = vec![0.0; 128];
        assert_eq!(src.render(&mut l, &mut r), 128);
        assert_eq!(l[0], 0.0);
        assert_eq!(l[127], 127.0);
        // Mono buffers feed both channels.
        assert_eq!(r[64], 64.0);
    }

    #[test]
    fn double_rate_interpolates_and_finishes_early() {
        let mut src = BufferSource::new(ramp_buffer(128), 48_000.0, AutomationMode::Immediate, 128);
        src.rate().set(2.0);
        let mut l = vec![0.0; 128];
        let mut r = vec![0.0; 128];
        let produced = src.render(&mut l, &mut r);
        assert_eq!(produced, 64);
        assert_eq!(l[1], 2.0);
        assert!(src.finished());
        assert_eq!(l[100], 0.0);
    }

    #[test]
    fn fractional_rate_lerps() {
        let mut src = BufferSource::new(ramp_buffer(64), 48_000.0, AutomationMode::Immediate, 128);
        src.rate().set(0.5);
        let mut l = vec![0.0; 8];
        let mut r = vec![0.0; 8];
        src.render(&mut l, &mut r);
        assert!((l[1] - 0.5).abs() < 1e-6);
        assert!((l[3] - 1.5).abs() < 1e-6);
    }

    #[test]
    fn looping_wraps_position() {
        let mut src = BufferSource::new(ramp_buffer(32), 48_000.0, AutomationMode::Immediate, 128);
        src.set_looping(true);
        let mut l = vec![0.0; 128];
        let mut r = vec![0.0; 128];
        assert_eq!(src.render(&mut l, &mut r), 128);
        assert!(!src.finished());
        assert_eq!(l[32], 0.0);
    }
}
