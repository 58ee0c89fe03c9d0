//! Fixed-capacity delay line with multi-tap reads.

/// Ring-buffer delay line. Capacity is fixed at construction; taps can
/// read at any delay up to that capacity.
#[derive(Debug, Clone)]
pub struct DelayLine {
    buf: Vec<f32>,
    write: usize,
}

impl DelayLine {
    pub fn new(max_samples: usize) -> Self {
        Self {
            buf: vec![0.0; max_samples.max(1)],
            write: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.buf.len()
    }

    /// Read the sample written `delay` samples ago. A delay of 0 reads
    /// the most recently pushed sample.
    pub fn tap(&self, delay: usize) -> f32 {
        let d = delay.min(self.buf.len() - 1);
        let idx = (self.write + self.buf.len() - 1 - d) % self.buf.len();
        self.buf[idx]
    }

    pub fn push(&mut self, x: f32) {
        self.buf[self.write] = x;
        self.write = (self.write + 1) % self.buf.len();
    }

    pub fn reset(&mut self) {
        self.buf.fill(0.0);
        self.write = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tap_reads_delayed_samples() {
        let mut line = DelayLine::new(8);
        for i in 0..8 {
            line.push(i as f32);
        }
        assert_eq!(line.tap(0), 7.0);
        assert_eq!(line.tap(3), 4.0);
        assert_eq!(line.tap(7), 0.0);
    }

    #[test]
    fn wraps_around_capacity() {
        let mut line = DelayLine::new(4);
        for i in 0..10 {
            line.push(i as f32);
        }
        assert_eq!(line.tap(0), 9.0);
        assert_eq!(line.tap(3), 6.0);
    }

    #[test]
    fn overlong_delay_is_clamped() {
        let mut line = DelayLine::new(4);
        line.push(1.0);
        assert_eq!(line.tap(100), line.tap(3));
    }
}
