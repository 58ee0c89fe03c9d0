//! Mid/side stereo width control.

use std::f32::consts::{FRAC_1_SQRT_2, SQRT_2};

use dsp::{AutomationMode, Parameter};

const DEFAULT_SMOOTHING: f32 = 0.08;
const INITIAL_SMOOTHING: f32 = 0.001;

/// Scales the side signal of a mid/side decomposition. Width 1 is
/// transparent, 0 folds to mono, above 1 exaggerates separation.
pub struct WidthStage {
    width: Parameter,
    scratch: Vec<f32>,
    applied_once: bool,
}

impl WidthStage {
    pub fn new(sample_rate: f32, mode: AutomationMode, block_size: usize) -> Self {
        Self {
            width: Parameter::new(1.0, 0.0, 1.8, sample_rate, mode),
            scratch: vec![0.0; block_size],
            applied_once: false,
        }
    }

    /// Move the width target. The first call lands almost instantly so
    /// configuration applied at session start does not audibly sweep;
    /// later calls glide over `smoothing` (80 ms by default).
    pub fn set_width(&mut self, value: f32, smoothing: Option<f32>) {
        let tc = if self.applied_once {
            smoothing.unwrap_or(DEFAULT_SMOOTHING)
        } else {
            INITIAL_SMOOTHING
        };
        self.applied_once = true;
        self.width.ramp(value, tc);
    }

    pub fn width(&self) -> f32 {
        self.width.target()
    }

    pub fn process(&mut self, left: &mut [f32], right: &mut [f32]) {
        let n = left.len().min(right.len()).min(self.scratch.len());
        self.width.fill(&mut self.scratch[..n]);
        for i in 0..n {
            let mid = (left[i] + right[i]) * 0.5 * FRAC_1_SQRT_2;
            let side = (left[i] - right[i]) * 0.5 * self.scratch[i];
            left[i] = mid * SQRT_2 + side;
            right[i] = mid * SQRT_2 - side;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unit_width_is_transparent() {
        let mut stage = WidthStage::new(48_000.0, AutomationMode::Immediate, 128);
        let mut l = vec![0.3; 128];
        let mut r = vec![-0.2; 128];
        stage.process(&mut l, &mut r);
        for i in 0..128 {
            assert!((l[i] - 0.3).abs() < 1e-6);
            assert!((r[i] + 0.2).abs() < 1e-6);
        }
    }

    #[test]
    fn zero_width_folds_to_mono() {
        let mut stage = WidthStage::new(48_000.0, AutomationMode::Immediate, 128);
        stage.set_width(0.0, None);
        let mut l = vec![0.8; 128];
        let mut r = vec![0.2; 128];
        stage.process(&mut l, &mut r);
        for i in 0..128 {
            assert!((l[i] - r[i]).abs() < 1e-6);
            assert!((l[i] - 0.5).abs() < 1e-6, "mid level {}", l[i]);
        }
    }

    #[test]
    fn width_target_is_clamped() {
        let mut stage = WidthStage::new(48_000.0, AutomationMode::Immediate, 128);
        stage.set_width(5.0, None);
        assert!((stage.width() - 1.8).abs() < 1e-6);
        stage.set_width(-1.0, None);
        assert!(stage.width().abs() < 1e-6);
    }
}
