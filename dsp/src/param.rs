//! Smoothed parameter automation.
//!
//! Control-rate code steers the live audio graph exclusively through
//! [`Parameter`] handles, which expose exactly two operations: set now,
//! or ramp toward a target with an exponential time constant. The
//! render clock pulls per-sample values out of the same handle. In
//! offline (non-real-time) rendering ramps degrade to immediate
//! writes, since no live listener can hear a step there.

use std::sync::{Arc, Mutex};

/// How a parameter applies ramp requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AutomationMode {
    /// Ramps are smoothed with their exponential time constant.
    Smoothed,
    /// Ramps are applied as instantaneous writes (offline rendering).
    Immediate,
}

#[derive(Debug)]
struct ParamState {
    value: f32,
    target: f32,
    /// Per-sample smoothing coefficient: value moves toward target by
    /// `(target - value) * alpha` each sample.
    alpha: f32,
}

/// A clamped, smoothed scalar parameter shared between the control
/// loop and the render clock.
///
/// Cloning yields another handle onto the same underlying state. The
/// internal lock is held only long enough to copy a few floats, so the
/// render side never blocks on control-rate work in any meaningful way.
#[derive(Debug, Clone)]
pub struct Parameter {
    state: Arc<Mutex<ParamState>>,
    min: f32,
    max: f32,
    sample_rate: f32,
    mode: AutomationMode,
}

impl Parameter {
    pub fn new(initial: f32, min: f32, max: f32, sample_rate: f32, mode: AutomationMode) -> Self {
        let v = initial.clamp(min, max);
        Self {
            state: Arc::new(Mutex::new(ParamState {
                value: v,
                target: v,
                alpha: 1.0,
            })),
            min,
            max,
            sample_rate,
            mode,
        }
    }

    /// Jump to `value` immediately. Out-of-range input is corrected,
    /// not rejected.
    pub fn set(&self, value: f32) {
        let v = value.clamp(self.min, self.max);
        let mut s = self.state.lock().unwrap();
        s.value = v;
        s.target = v;
        s.alpha = 1.0;
    }

    /// Approach `value` exponentially with the given time constant in
    /// seconds. A non-positive time constant, or offline mode, falls
    /// back to an immediate write.
    pub fn ramp(&self, value: f32, time_constant: f32) {
        if self.mode == AutomationMode::Immediate || time_constant <= 0.0 {
            self.set(value);
            return;
        }
        let v = value.clamp(self.min, self.max);
        let alpha = 1.0 - (-1.0 / (time_constant * self.sample_rate)).exp();
        let mut s = self.state.lock().unwrap();
        s.target = v;
        s.alpha = alpha;
    }

    /// Current smoothed value (control-side peek; used by tests and
    /// for deriving dependent targets).
    pub fn value(&self) -> f32 {
        self.state.lock().unwrap().value
    }

    /// Value the parameter is converging toward.
    pub fn target(&self) -> f32 {
        self.state.lock().unwrap().target
    }

    /// Render side: fill `out` with per-sample values, advancing the
    /// smoothing state by `out.len()` samples.
    pub fn fill(&self, out: &mut [f32]) {
        let mut s = self.state.lock().unwrap();
        if s.alpha >= 1.0 || (s.target - s.value).abs() < 1e-9 {
            s.value = s.target;
            out.fill(s.target);
            return;
        }
        let mut v = s.value;
        for sample in out.iter_mut() {
            v += (s.target - v) * s.alpha;
            *sample = v;
        }
        s.value = v;
    }

    /// Render side: advance the smoothing state by `samples` and
    /// return the value at the end of the block. Used where one value
    /// per block is enough (e.g. playback rate).
    pub fn advance(&self, samples: usize) -> f32 {
        let mut s = self.state.lock().unwrap();
        if s.alpha >= 1.0 {
            s.value = s.target;
            return s.value;
        }
        let decay = (1.0 - s.alpha).powi(samples as i32);
        s.value = s.target + (s.value - s.target) * decay;
        s.value
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_clamps_and_jumps() {
        let p = Parameter::new(0.5, 0.0, 1.0, 48000.0, AutomationMode::Smoothed);
        p.set(7.0);
        assert_eq!(p.value(), 1.0);
        p.set(-3.0);
        assert_eq!(p.value(), 0.0);
    }

    #[test]
    fn ramp_converges_within_a_few_time_constants() {
        let p = Parameter::new(0.0, 0.0, 1.0, 48000.0, AutomationMode::Smoothed);
        p.ramp(1.0, 0.1);
        // After one time constant the value should be ~63% of the way.
        let one_tc = p.advance(4800);
        assert!((one_tc - 0.632).abs() < 0.01, "got {}", one_tc);
        // After four more it is effectively settled.
        let settled = p.advance(4 * 4800);
        assert!(settled > 0.99, "got {}", settled);
    }

    #[test]
    fn fill_matches_advance() {
        let a = Parameter::new(0.0, 0.0, 1.0, 1000.0, AutomationMode::Smoothed);
        let b = Parameter::new(0.0, 0.0, 1.0, 1000.0, AutomationMode::Smoothed);
        a.ramp(1.0, 0.05);
        b.ramp(1.0, 0.05);
        let mut buf = [0.0f32; 256];
        a.fill(&mut buf);
        let end = b.advance(256);
        assert!((buf[255] - end).abs() < 1e-4);
        // Values must be monotonically rising toward the target.
        assert!(buf.windows(2).all(|w| w[1] >= w[0]));
    }

    #[test]
    fn immediate_mode_ignores_smoothing() {
        let p = Parameter::new(0.0, 0.0, 1.0, 48000.0, AutomationMode::Immediate);
        p.ramp(0.8, 0.5);
        assert_eq!(p.value(), 0.8);
    }

    #[test]
    fn clone_shares_state() {
        let p = Parameter::new(0.2, 0.0, 1.0, 48000.0, AutomationMode::Smoothed);
        let q = p.clone();
        p.set(0.9);
        assert_eq!(q.value(), 0.9);
    }
}
