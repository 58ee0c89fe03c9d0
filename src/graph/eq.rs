//! Six-band graphic EQ over fixed center frequencies.

use dsp::{AutomationMode, Biquad, Parameter};

pub const EQ_BANDS: [f32; 6] = [60.0, 170.0, 350.0, 1000.0, 3500.0, 10_000.0];
pub const EQ_GAIN_DB_RANGE: (f32, f32) = (-12.0, 12.0);

const BAND_Q: f32 = 1.1;
const GAIN_TC: f32 = 0.03;

struct Band {
    gain_db: Parameter,
    /// Coefficients last pushed into the filters, so quiescent bands
    /// skip the recompute.
    applied_db: f32,
    filters: [Biquad; 2],
}

/// Peaking filters at {60, 170, 350, 1000, 3500, 10000} Hz with
/// smoothed gains in ±12 dB. Gain moves are applied as one coefficient
/// update per block, which at 128-frame blocks is finer than any
/// audible zipper.
pub struct EqBank {
    bands: Vec<Band>,
    sample_rate: f32,
}

impl EqBank {
    pub fn new(sample_rate: f32, mode: AutomationMode) -> Self {
        let bands = EQ_BANDS
            .iter()
            .map(|_| Band {
                gain_db: Parameter::new(
                    0.0,
                    EQ_GAIN_DB_RANGE.0,
                    EQ_GAIN_DB_RANGE.1,
                    sample_rate,
                    mode,
                ),
                applied_db: 0.0,
                filters: [Biquad::identity(), Biquad::identity()],
            })
            .collect();
        Self { bands, sample_rate }
    }

    /// Ramp one band's gain. Out-of-range indices are ignored.
    pub fn set_gain_db(&self, band: usize, gain_db: f32) {
        if let Some(b) = self.bands.get(band) {
            b.gain_db.ramp(gain_db, GAIN_TC);
        }
    }

    pub fn gain_db(&self, band: usize) -> f32 {
        self.bands.get(band).map(|b| b.gain_db.target()).unwrap_or(0.0)
    }

    pub fn process(&mut self, left: &mut [f32], right: &mut [f32]) {
        let n = left.len().min(right.len());
        for (i, band) in self.bands.iter_mut().enumerate() {
            let db = band.gain_db.advance(n);
            if (db - band.applied_db).abs() > 1e-3 {
                for f in &mut band.filters {
                    f.set_peaking(self.sample_rate, EQ_BANDS[i], BAND_Q, db);
                }
                band.applied_db = db;
            }
            if band.applied_db.abs() > 1e-3 {
                band.filters[0].process_block(&mut left[..n]);
                band.filters[1].process_block(&mut right[..n]);
            }
        }
    }
}
