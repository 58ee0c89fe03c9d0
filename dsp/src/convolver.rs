//! Uniform partitioned convolution.
//!
//! Overlap-save FFT convolution with a frequency-domain delay line, so
//! impulse responses of arbitrary length cost one forward FFT, one
//! inverse FFT and a complex multiply-accumulate per block. Input is
//! mono, the impulse response is stereo (left/right pair), output is
//! stereo; both the late-reverb slots and the HRTF slots are built on
//! this.

use rustfft::num_complex::Complex;
use rustfft::{Fft, FftPlanner};
use std::collections::VecDeque;
use std::sync::Arc;

/// Samples per input block. Callers must process in blocks of exactly
/// this many frames.
pub const PARTITION: usize = 128;

const FFT_SIZE: usize = PARTITION * 2;

pub struct Convolver {
    fft: Arc<dyn Fft<f32>>,
    ifft: Arc<dyn Fft<f32>>,
    scratch: Vec<Complex<f32>>,
    /// Impulse-response partitions in the frequency domain, per channel.
    parts: [Vec<Vec<Complex<f32>>>; 2],
    /// Spectra of recent input blocks, newest first.
    fdl: VecDeque<Vec<Complex<f32>>>,
    prev_block: Vec<f32>,
    time_buf: Vec<Complex<f32>>,
    accum: [Vec<Complex<f32>>; 2],
    ir_frames: usize,
}

impl Convolver {
    pub fn new() -> Self {
        let mut planner = FftPlanner::new();
        let fft = planner.plan_fft_forward(FFT_SIZE);
        let ifft = planner.plan_fft_inverse(FFT_SIZE);
        let scratch_len = fft
            .get_inplace_scratch_len()
            .max(ifft.get_inplace_scratch_len());
        Self {
            fft,
            ifft,
            scratch: vec![Complex::new(0.0, 0.0); scratch_len],
            parts: [Vec::new(), Vec::new()],
            fdl: VecDeque::new(),
            prev_block: vec![0.0; PARTITION],
            time_buf: vec![Complex::new(0.0, 0.0); FFT_SIZE],
            accum: [
                vec![Complex::new(0.0, 0.0); FFT_SIZE],
                vec![Complex::new(0.0, 0.0); FFT_SIZE],
            ],
            ir_frames: 0,
        }
    }

    /// Whether an impulse response is currently installed.
    pub fn is_active(&self) -> bool {
        !self.parts[0].is_empty()
    }

    /// Length of the installed impulse response in frames.
    pub fn ir_frames(&self) -> usize {
        self.ir_frames
    }

    /// Install a stereo impulse response, replacing any previous one
    /// and clearing convolution history.
    pub fn set_ir(&mut self, left: &[f32], right: &[f32]) {
        let ir_len = left.len().max(right.len()).max(1);
        let num_parts = ir_len.div_ceil(PARTITION);

        self.parts = [
            self.partition_channel(left, num_parts),
            self.partition_channel(right, num_parts),
        ];
        self.fdl = (0..num_parts)
            .map(|_| vec![Complex::new(0.0, 0.0); FFT_SIZE])
            .collect();
        self.prev_block.fill(0.0);
        self.ir_frames = ir_len;
    }

    /// Drop the impulse response; the convolver outputs silence.
    pub fn clear(&mut self) {
        self.parts = [Vec::new(), Vec::new()];
        self.fdl.clear();
        self.prev_block.fill(0.0);
        self.ir_frames = 0;
    }

    fn partition_channel(&mut self, ir: &[f32], num_parts: usize) -> Vec<Vec<Complex<f32>>> {
        let mut parts = Vec::with_capacity(num_parts);
        for p in 0..num_parts {
            let start = p * PARTITION;
            let mut buf = vec![Complex::new(0.0, 0.0); FFT_SIZE];
            for (i, slot) in buf.iter_mut().take(PARTITION).enumerate() {
                if let Some(&s) = ir.get(start + i) {
                    *slot = Complex::new(s, 0.0);
                }
            }
            self.fft.process_with_scratch(&mut buf, &mut self.scratch);
            parts.push(buf);
        }
        parts
    }

    /// Convolve one mono block into stereo output. `input`, `out_l`
    /// and `out_r` must all be [`PARTITION`] samples long.
    pub fn process(&mut self, input: &[f32], out_l: &mut [f32], out_r: &mut [f32]) {
        debug_assert_eq!(input.len(), PARTITION);
        if !self.is_active() {
            out_l.fill(0.0);
            out_r.fill(0.0);
            return;
        }

        // Overlap-save: transform [previous block | current block].
        for i in 0..PARTITION {
            self.time_buf[i] = Complex::new(self.prev_block[i], 0.0);
            self.time_buf[PARTITION + i] = Complex::new(input[i], 0.0);
        }
        self.fft
            .process_with_scratch(&mut self.time_buf, &mut self.scratch);

        // Rotate the frequency delay line, reusing the oldest buffer.
        let mut newest = self.fdl.pop_back().expect("fdl sized to partition count");
        newest.copy_from_slice(&self.time_buf);
        self.fdl.push_front(newest);

        for ch in 0..2 {
            self.accum[ch].fill(Complex::new(0.0, 0.0));
            for (p, part) in self.parts[ch].iter().enumerate() {
                let x = &self.fdl[p];
                for ((acc, &xs), &hs) in self.accum[ch].iter_mut().zip(x.iter()).zip(part.iter()) {
                    *acc += xs * hs;
                }
            }
            self.ifft
                .process_with_scratch(&mut self.accum[ch], &mut self.scratch);
        }

        let norm = 1.0 / FFT_SIZE as f32;
        for i in 0..PARTITION {
            out_l[i] = self.accum[0][PARTITION + i].re * norm;
            out_r[i] = self.accum[1][PARTITION + i].re * norm;
        }
        self.prev_block.copy_from_slice(input);
    }
}

impl Default for Convolver {
    fn default() -> Self {
        Self::new()
    }
}
