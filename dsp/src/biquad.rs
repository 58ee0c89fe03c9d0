//! One-pole and RBJ biquad filters.

use std::f32::consts::PI;

/// One-pole low-pass, used by the early-reflection taps.
#[derive(Debug, Clone, Copy)]
pub struct OnePole {
    a: f32,
    z: f32,
}

impl OnePole {
    pub fn low_pass(sample_rate: f32, cutoff: f32) -> Self {
        let a = (-2.0 * PI * (cutoff / sample_rate).clamp(0.0, 0.49)).exp();
        Self { a, z: 0.0 }
    }

    pub fn process(&mut self, x: f32) -> f32 {
        self.z = (1.0 - self.a) * x + self.a * self.z;
        self.z
    }

    pub fn reset(&mut self) {
        self.z = 0.0;
    }
}

/// RBJ cookbook biquad, transposed direct form II.
#[derive(Debug, Clone, Copy)]
pub struct Biquad {
    b0: f32,
    b1: f32,
    b2: f32,
    a1: f32,
    a2: f32,
    z1: f32,
    z2: f32,
}

impl Biquad {
    pub fn identity() -> Self {
        Self {
            b0: 1.0,
            b1: 0.0,
            b2: 0.0,
            a1: 0.0,
            a2: 0.0,
            z1: 0.0,
            z2: 0.0,
        }
    }

    pub fn peaking(sample_rate: f32, freq: f32, q: f32, gain_db: f32) -> Self {
        let mut f = Self::identity();
        f.set_peaking(sample_rate, freq, q, gain_db);
        f
    }

    pub fn low_shelf(sample_rate: f32, freq: f32, gain_db: f32) -> Self {
        let a = 10.0f32.powf(gain_db / 40.0);
        let w0 = 2.0 * PI * (freq / sample_rate).clamp(0.0, 0.49);
        let (sin, cos) = w0.sin_cos();
        let beta = 2.0 * a.sqrt() * (sin / 2.0) * 2.0f32.sqrt();
        let b0 = a * ((a + 1.0) - (a - 1.0) * cos + beta);
        let b1 = 2.0 * a * ((a - 1.0) - (a + 1.0) * cos);
        let b2 = a * ((a + 1.0) - (a - 1.0) * cos - beta);
        let a0 = (a + 1.0) + (a - 1.0) * cos + beta;
        let a1 = -2.0 * ((a - 1.0) + (a + 1.0) * cos);
        let a2 = (a + 1.0) + (a - 1.0) * cos - beta;
        Self::normalized(b0, b1, b2, a0, a1, a2)
    }

    pub fn high_shelf(sample_rate: f32, freq: f32, gain_db: f32) -> Self {
        let a = 10.0f32.powf(gain_db / 40.0);
        let w0 = 2.0 * PI * (freq / sample_rate).clamp(0.0, 0.49);
        let (sin, cos) = w0.sin_cos();
        let beta = 2.0 * a.sqrt() * (sin / 2.0) * 2.0f32.sqrt();
        let b0 = a * ((a + 1.0) + (a - 1.0) * cos + beta);
        let b1 = -2.0 * a * ((a - 1.0) + (a + 1.0) * cos);
        let b2 = a * ((a + 1.0) + (a - 1.0) * cos - beta);
        let a0 = (a + 1.0) - (a - 1.0) * cos + beta;
        let a1 = 2.0 * ((a - 1.0) - (a + 1.0) * cos);
        let a2 = (a + 1.0) - (a - 1.0) * cos - beta;
        Self::normalized(b0, b1, b2, a0, a1, a2)
    }

    /// Update peaking coefficients in place, preserving filter state so
    /// smoothed gain changes do not click.
    pub fn set_peaking(&mut self, sample_rate: f32, freq: f32, q: f32, gain_db: f32) {
        if gain_db.abs() < 1e-3 {
            self.b0 = 1.0;
            self.b1 = 0.0;
            self.b2 = 0.0;
            self.a1 = 0.0;
            self.a2 = 0.0;
            return;
        }
        let a = 10.0f32.powf(gain_db / 40.0);
        let w0 = 2.0 * PI * (freq / sample_rate).clamp(0.0, 0.49);
        let (sin, cos) = w0.sin_cos();
        let alpha = sin / (2.0 * q.max(0.1));
        let b0 = 1.0 + alpha * a;
        let b1 = -2.0 * cos;
        let b2 = 1.0 - alpha * a;
        let a0 = 1.0 + alpha / a;
        let a1 = -2.0 * cos;
        let a2 = 1.0 - alpha / a;
        self.b0 = b0 / a0;
        self.b1 = b1 / a0;
        self.b2 = b2 / a0;
        self.a1 = a1 / a0;
        self.a2 = a2 / a0;
    }

    fn normalized(b0: f32, b1: f32, b2: f32, a0: f32, a1: f32, a2: f32) -> Self {
        Self {
            b0: b0 / a0,
            b1: b1 / a0,
            b2: b2 / a0,
            a1: a1 / a0,
            a2: a2 / a0,
            z1: 0.0,
            z2: 0.0,
        }
    }

    #[inline]
    pub fn process(&mut self, x: f32) -> f32 {
        let y = self.b0 * x + self.z1;
        self.z1 = self.b1 * x - self.a1 * y + self.z2;
        self.z2 = self.b2 * x - self.a2 * y;
        y
    }

    pub fn process_block(&mut self, samples: &mut [f32]) {
        for s in samples.iter_mut() {
            *s = self.process(*s);
        }
    }

    pub fn reset(&mut self) {
        self.z1 = 0.0;
        self.z2 = 0.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_gain_peaking_is_transparent() {
        let mut f = Biquad::peaking(48000.0, 1000.0, 1.0, 0.0);
        for i in 0..64 {
            let x = ((i as f32) * 0.37).sin();
            assert!((f.process(x) - x).abs() < 1e-6);
        }
    }

    #[test]
    fn boosted_peaking_amplifies_center_frequency() {
        let sr = 48000.0;
        let mut f = Biquad::peaking(sr, 1000.0, 1.0, 12.0);
        let mut energy_in = 0.0;
        let mut energy_out = 0.0;
        for i in 0..4800 {
            let x = (2.0 * PI * 1000.0 * i as f32 / sr).sin();
            let y = f.process(x);
            // Skip the transient before measuring.
            if i > 480 {
                energy_in += x * x;
                energy_out += y * y;
            }
        }
        assert!(energy_out > energy_in * 2.0);
    }

    #[test]
    fn one_pole_attenuates_high_frequencies() {
        let sr = 48000.0;
        let mut f = OnePole::low_pass(sr, 1000.0);
        let mut out_rms = 0.0;
        for i in 0..4800 {
            let x = (2.0 * PI * 12000.0 * i as f32 / sr).sin();
            let y = f.process(x);
            if i > 480 {
                out_rms += y * y;
            }
        }
        // A 12 kHz tone through a 1 kHz one-pole loses most energy.
        assert!(out_rms / 4320.0 < 0.05);
    }

    #[test]
    fn shelf_filters_are_stable() {
        let mut lo = Biquad::low_shelf(48000.0, 120.0, 4.0);
        let mut hi = Biquad::high_shelf(48000.0, 8000.0, 3.0);
        let mut peak = 0.0f32;
        for i in 0..48000 {
            let x = if i == 0 { 1.0 } else { 0.0 };
            let y = hi.process(lo.process(x));
            peak = peak.max(y.abs());
            if i > 4000 {
                assert!(y.abs() < 1e-3, "impulse response fails to decay");
            }
        }
        assert!(peak.is_finite());
    }
}
