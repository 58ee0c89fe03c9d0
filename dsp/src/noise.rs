//! Procedural impulse-response fallback.
//!
//! When a room impulse cannot be fetched or decoded, the reverb keeps
//! working on a synthetic one: decaying stereo noise from a fixed-seed
//! PRNG, so the fallback is reproducible in tests.

use engine_core::AudioData;
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

/// Seed for the fallback impulse generator.
pub const FALLBACK_SEED: u64 = 0x5EED_0F1E_1D01;

/// Length of the generated impulse in seconds.
pub const FALLBACK_SECONDS: f32 = 0.9;

/// Envelope exponent: amplitude follows (1 - t)^3.2.
const ENVELOPE_POWER: f32 = 3.2;

/// Generate the fallback impulse: two channels of enveloped noise that
/// read as a plausible decaying room response.
pub fn procedural_impulse(sample_rate: u32) -> AudioData {
    let frames = (FALLBACK_SECONDS * sample_rate as f32) as usize;
    let mut rng = SmallRng::seed_from_u64(FALLBACK_SEED);
    let mut channels = vec![Vec::with_capacity(frames), Vec::with_capacity(frames)];
    for i in 0..frames {
        let t = i as f32 / frames as f32;
        let env = (1.0 - t).powf(ENVELOPE_POWER);
        for ch in channels.iter_mut() {
            ch.push(rng.gen_range(-1.0f32..1.0) * env);
        }
    }
    AudioData::new(sample_rate, channels)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fallback_is_deterministic() {
        let a = procedural_impulse(48000);
        let b = procedural_impulse(48000);
        assert_eq!(a.channels, b.channels);
    }

    #[test]
    fn fallback_shape() {
        let imp = procedural_impulse(48000);
        assert_eq!(imp.channels.len(), 2);
        assert_eq!(imp.frames(), (0.9 * 48000.0) as usize);
        // Envelope decays: late samples are much quieter than early ones.
        let left = &imp.channels[0];
        let head: f32 = left[..4800].iter().map(|s| s.abs()).sum();
        let tail: f32 = left[left.len() - 4800..].iter().map(|s| s.abs()).sum();
        assert!(tail < head * 0.05);
        // And the final sample reaches silence.
        assert!(left.last().unwrap().abs() < 1e-3);
    }
}
