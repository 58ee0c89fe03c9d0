//! Audio input/output for the soundfield engine.
//!
//! Decoding of source and impulse assets (symphonia), 16-bit PCM WAVE
//! encoding of rendered output, and the cpal playback sink that acts
//! as the real-time render clock.

pub mod decode;
pub mod playback;
pub mod wav;

pub use decode::{decode_bytes, decode_file};
pub use playback::{output_available, PlaybackSink};
pub use wav::{encode_stereo_pcm16, parse_header, WavHeader};
