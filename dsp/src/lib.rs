//! Signal-processing building blocks for the soundfield engine.
//!
//! Everything here is render-clock code: small, allocation-free in the
//! processing path, and driven one block at a time.

pub mod biquad;
pub mod convolver;
pub mod delay;
pub mod noise;
pub mod param;

pub use biquad::{Biquad, OnePole};
pub use convolver::Convolver;
pub use delay::DelayLine;
pub use param::{AutomationMode, Parameter};
