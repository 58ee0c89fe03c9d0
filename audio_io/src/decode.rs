//! Asset decoding via symphonia.

use engine_core::{AudioData, Error, DEFAULT_SAMPLE_RATE};
use log::debug;
use std::io::Cursor;
use std::path::Path;
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::DecoderOptions;
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

/// Decode an in-memory audio asset (WAV, MP3, OGG, FLAC, ...) into
/// planar float channels. The optional extension helps the probe pick
/// a demuxer faster but is not required.
pub fn decode_bytes(data: Vec<u8>, extension: Option<&str>) -> Result<AudioData, Error> {
    let stream = MediaSourceStream::new(Box::new(Cursor::new(data)), Default::default());
    let mut hint = Hint::new();
    if let Some(ext) = extension {
        hint.with_extension(ext);
    }

    let probed = symphonia::default::get_probe()
        .format(
            &hint,
            stream,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )
        .map_err(|e| Error::Decode(format!("unrecognized audio container: {}", e)))?;
    let mut format = probed.format;

    let track = format
        .default_track()
        .ok_or_else(|| Error::Decode("no audio track".to_string()))?;
    let track_id = track.id;
    let mut decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .map_err(|e| Error::Decode(format!("unsupported codec: {}", e)))?;

    let mut sample_rate = track.codec_params.sample_rate.unwrap_or(DEFAULT_SAMPLE_RATE);
    let mut channels: Vec<Vec<f32>> = Vec::new();

    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::IoError(e))
                if e.kind() == std::io::ErrorKind::UnexpectedEof =>
            {
                break;
            }
            Err(e) => return Err(Error::Decode(format!("demux error: {}", e))),
        };
        if packet.track_id() != track_id {
            continue;
        }
        let decoded = match decoder.decode(&packet) {
            Ok(decoded) => decoded,
            // Recoverable corruption: skip the packet.
            Err(SymphoniaError::DecodeError(e)) => {
                debug!("skipping undecodable packet: {}", e);
                continue;
            }
            Err(e) => return Err(Error::Decode(format!("decode error: {}", e))),
        };

        let spec = *decoded.spec();
        sample_rate = spec.rate;
        let num_channels = spec.channels.count();
        if channels.is_empty() {
            channels = vec![Vec::new(); num_channels.max(1)];
        }

        let mut buf = SampleBuffer::<f32>::new(decoded.capacity() as u64, spec);
        buf.copy_interleaved_ref(decoded);
        for frame in buf.samples().chunks_exact(num_channels.max(1)) {
            for (ch, &sample) in channels.iter_mut().zip(frame.iter()) {
                ch.push(sample);
            }
        }
    }

    if channels.is_empty() || channels[0].is_empty() {
        return Err(Error::Decode("no audio frames decoded".to_string()));
    }
    debug!(
        "decoded {} frames, {} channels at {} Hz",
        channels[0].len(),
        channels.len(),
        sample_rate
    );
    Ok(AudioData::new(sample_rate, channels))
}

/// Decode an audio file from disk.
pub fn decode_file<P: AsRef<Path>>(path: P) -> Result<AudioData, Error> {
    let path = path.as_ref();
    let ext = path.extension().and_then(|e| e.to_str()).map(str::to_owned);
    let data = std::fs::read(path)?;
    decode_bytes(data, ext.as_deref())
}
