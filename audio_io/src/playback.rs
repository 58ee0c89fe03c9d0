//! Real-time playback sink.
//!
//! The render side pushes interleaved stereo samples into a lock-free
//! ring buffer; a dedicated thread owns the cpal output stream (cpal
//! streams are not `Send`) and its callback drains the ring buffer,
//! substituting silence on underrun.

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use engine_core::Error;
use log::{info, warn};
use ringbuf::HeapConsumer;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc};
use std::thread;
use std::time::Duration;

/// Whether a default output device exists. Checked before any graph
/// construction so capability errors surface early.
pub fn output_available() -> bool {
    cpal::default_host().default_output_device().is_some()
}

/// Handle to the playback thread. Dropping it stops the stream.
pub struct PlaybackSink {
    stop: Arc<AtomicBool>,
    thread: Option<thread::JoinHandle<()>>,
}

impl PlaybackSink {
    /// Open the default output device at the given sample rate and
    /// start draining `consumer`.
    pub fn start(sample_rate: u32, consumer: HeapConsumer<f32>) -> Result<Self, Error> {
        let stop = Arc::new(AtomicBool::new(false));
        let stop_flag = stop.clone();
        let (ready_tx, ready_rx) = mpsc::channel::<Result<(), String>>();

        let thread = thread::spawn(move || {
            let stream = match build_stream(sample_rate, consumer) {
                Ok(stream) => {
                    let _ = ready_tx.send(Ok(()));
                    stream
                }
                Err(e) => {
                    let _ = ready_tx.send(Err(e));
                    return;
                }
            };
            if let Err(e) = stream.play() {
                warn!("failed to start output stream: {}", e);
                return;
            }
            while !stop_flag.load(Ordering::Relaxed) {
                thread::sleep(Duration::from_millis(20));
            }
            // Stream drops here, stopping the callback.
        });

        match ready_rx.recv() {
            Ok(Ok(())) => {
                info!("output stream running at {} Hz", sample_rate);
                Ok(Self {
                    stop,
                    thread: Some(thread),
                })
            }
            Ok(Err(e)) => Err(Error::Capability(e)),
            Err(_) => Err(Error::Capability(
                "playback thread exited before reporting readiness".to_string(),
            )),
        }
    }

    pub fn stop(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
        if let Some(handle) = self.thread.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for PlaybackSink {
    fn drop(&mut self) {
        self.stop();
    }
}

fn build_stream(
    sample_rate: u32,
    mut consumer: HeapConsumer<f32>,
) -> Result<cpal::Stream, String> {
    let device = cpal::default_host()
        .default_output_device()
        .ok_or_else(|| "no default output device".to_string())?;

    let config = cpal::StreamConfig {
        channels: 2,
        sample_rate: cpal::SampleRate(sample_rate),
        buffer_size: cpal::BufferSize::Default,
    };

    device
        .build_output_stream(
            &config,
            move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                let filled = consumer.pop_slice(data);
                data[filled..].fill(0.0);
            },
            |err| warn!("output stream error: {}", err),
            None,
        )
        .map_err(|e| format!("failed to open stereo output at {} Hz: {}", sample_rate, e))
}
