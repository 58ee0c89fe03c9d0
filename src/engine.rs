//! Session lifecycle and the control-rate loop.
//!
//! The engine owns the asset caches and hands out one live session at a
//! time. A session couples a [`PlaybackGraph`] (rendered block by block
//! on a feeder thread into the output ring buffer) with a tokio control
//! task that advances scene dynamics at roughly display rate and steers
//! the graph through smoothed parameters only.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};
use std::thread;
use std::time::{Duration, Instant};

use log::{debug, info, warn};
use ringbuf::HeapRb;
use tokio::sync::Mutex as AsyncMutex;
use tokio::task::JoinHandle;

use assets::{FsFetcher, HrtfCache, ImpulseCache};
use audio_io::{output_available, PlaybackSink};
use dsp::AutomationMode;
use engine_core::geometry::{Orientation, Vec3};
use engine_core::scene::{ListenerState, ReverbConfig, SceneState, SourceState};
use engine_core::{AudioData, Error, SessionId, BLOCK_SIZE};
use reverb::PresetLoad;
use scene::SceneDynamics;
use settings::Settings;

use crate::graph::PlaybackGraph;

const CONTROL_INTERVAL: Duration = Duration::from_millis(16);
const DOPPLER_TC: f32 = 0.12;
const RING_BLOCKS: usize = 16;

/// Partial scene update from a control surface; unset fields keep
/// their current value.
#[derive(Debug, Clone, Copy, Default)]
pub struct SceneDelta {
    pub source_position: Option<Vec3>,
    pub listener_position: Option<Vec3>,
    pub listener_orientation: Option<Orientation>,
    pub preview: Option<bool>,
}

/// A live playback session. Sessions are torn down on drop; the engine
/// also invalidates them when a newer session starts.
pub struct EngineSession {
    pub id: SessionId,
    generation: u64,
    graph: Arc<Mutex<PlaybackGraph>>,
    dynamics: Arc<Mutex<SceneDynamics>>,
    stop: Arc<AtomicBool>,
    control: Option<JoinHandle<()>>,
    sink: Option<PlaybackSink>,
    feeder: Option<thread::JoinHandle<()>>,
    preset_lock: Arc<AsyncMutex<()>>,
}

impl EngineSession {
    fn shutdown(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
        if let Some(control) = self.control.take() {
            control.abort();
        }
        if let Some(mut sink) = self.sink.take() {
            sink.stop();
        }
        if let Some(feeder) = self.feeder.take() {
            let _ = feeder.join();
        }
        debug!("session {} shut down", self.id);
    }
}

impl Drop for EngineSession {
    fn drop(&mut self) {
        self.shutdown();
    }
}

pub struct Engine {
    settings: Settings,
    impulses: Arc<ImpulseCache>,
    hrtfs: Arc<HrtfCache>,
    /// Bumped on every session start; stale async completions compare
    /// against it and drop themselves.
    generation: Arc<AtomicU64>,
    /// Stop flag of the most recently started session, fired when a
    /// newer one starts so its feeder and control loop wind down even
    /// if the caller still holds the old handle.
    active_stop: Mutex<Weak<AtomicBool>>,
}

impl Engine {
    pub fn new(settings: Settings) -> Self {
        let fetcher = Arc::new(FsFetcher::new(settings.asset_dir.clone()));
        let impulses = Arc::new(ImpulseCache::new(
            fetcher.clone(),
            &settings.impulse_manifest,
            settings.sample_rate,
        ));
        let hrtfs = Arc::new(HrtfCache::new(fetcher, &settings.hrtf_manifest));
        Self {
            settings,
            impulses,
            hrtfs,
            generation: Arc::new(AtomicU64::new(0)),
            active_stop: Mutex::new(Weak::new()),
        }
    }

    /// Signal the previous session's threads to stop. Its feeder exits
    /// on the next block and the control loop on the next tick.
    fn stop_active_session(&self) {
        if let Some(stop) = self.active_stop.lock().unwrap().upgrade() {
            stop.store(true, Ordering::Relaxed);
            debug!("superseded previous session");
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn impulses(&self) -> &ImpulseCache {
        &self.impulses
    }

    /// Start a live session for a decoded buffer. Any prior session is
    /// implicitly invalidated: its async completions are discarded once
    /// the generation advances, and callers are expected to drop it.
    pub async fn start_session(
        &self,
        data: Arc<AudioData>,
        config: &ReverbConfig,
    ) -> Result<EngineSession, Error> {
        if !output_available() {
            return Err(Error::Capability(
                "no audio output device available".to_string(),
            ));
        }
        if data.frames() == 0 {
            return Err(Error::Decode("source buffer is empty".to_string()));
        }

        self.stop_active_session();
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let id = SessionId::new();
        let sample_rate = self.settings.sample_rate;

        let mut graph = PlaybackGraph::new(data, sample_rate as f32, AutomationMode::Smoothed);
        graph.apply_config(config);

        // Without a catalog the stage spatializes with the panner.
        if self.settings.hrtf_enabled {
            let hrtf_catalog = self.hrtfs.catalog().await.to_vec();
            if !hrtf_catalog.is_empty() {
                graph.spatial().set_catalog(hrtf_catalog);
            }
        }

        // The initial preset is awaited before audio starts so the
        // first audible block already carries the configured room.
        let initial_preset = config
            .preset_id
            .clone()
            .or_else(|| self.settings.default_preset.clone());
        if let Some(preset) = initial_preset {
            if let PresetLoad::Start { slot } = graph.reverb().begin_preset_load(&preset) {
                let impulse = self.impulses.impulse(&preset).await;
                graph.reverb().finish_preset_load(&preset, slot, &impulse);
            }
        }

        let graph = Arc::new(Mutex::new(graph));
        let dynamics = Arc::new(Mutex::new(SceneDynamics::new(SceneState {
            source: SourceState::at(Vec3::new(0.0, 0.0, -2.0)),
            listener: ListenerState::default(),
        })));
        let stop = Arc::new(AtomicBool::new(false));
        *self.active_stop.lock().unwrap() = Arc::downgrade(&stop);

        let ring = HeapRb::<f32>::new(BLOCK_SIZE * 2 * RING_BLOCKS);
        let (mut producer, consumer) = ring.split();
        let sink = PlaybackSink::start(sample_rate, consumer)?;

        let feeder = {
            let graph = graph.clone();
            let stop = stop.clone();
            thread::spawn(move || {
                let mut left = [0.0f32; BLOCK_SIZE];
                let mut right = [0.0f32; BLOCK_SIZE];
                let mut interleaved = [0.0f32; BLOCK_SIZE * 2];
                while !stop.load(Ordering::Relaxed) {
                    if producer.free_len() < BLOCK_SIZE * 2 {
                        thread::sleep(Duration::from_millis(1));
                        continue;
                    }
                    let live = graph.lock().unwrap().render_block(&mut left, &mut right);
                    for i in 0..BLOCK_SIZE {
                        interleaved[2 * i] = left[i];
                        interleaved[2 * i + 1] = right[i];
                    }
                    let _ = producer.push_slice(&interleaved);
                    if !live {
                        break;
                    }
                }
            })
        };

        let control = tokio::spawn(Self::control_loop(
            graph.clone(),
            dynamics.clone(),
            stop.clone(),
            self.hrtfs.clone(),
            self.generation.clone(),
            generation,
        ));

        info!("session {} started (generation {})", id, generation);
        Ok(EngineSession {
            id,
            generation,
            graph,
            dynamics,
            stop,
            control: Some(control),
            sink: Some(sink),
            feeder: Some(feeder),
            preset_lock: Arc::new(AsyncMutex::new(())),
        })
    }

    async fn control_loop(
        graph: Arc<Mutex<PlaybackGraph>>,
        dynamics: Arc<Mutex<SceneDynamics>>,
        stop: Arc<AtomicBool>,
        hrtfs: Arc<HrtfCache>,
        current_generation: Arc<AtomicU64>,
        generation: u64,
    ) {
        let mut ticker = tokio::time::interval(CONTROL_INTERVAL);
        let mut last = Instant::now();
        while !stop.load(Ordering::Relaxed) {
            ticker.tick().await;
            let now = Instant::now();
            let dt = now.duration_since(last).as_secs_f32();
            last = now;

            let (state, doppler) = {
                let mut dynamics = dynamics.lock().unwrap();
                dynamics.step(dt);
                (*dynamics.state(), dynamics.doppler())
            };

            let requests = {
                let mut graph = graph.lock().unwrap();
                graph.playback_rate().ramp(doppler, DOPPLER_TC);
                graph
                    .spatial()
                    .update_pose(&state.listener, state.source.position)
            };

            for request in requests {
                let graph = graph.clone();
                let hrtfs = hrtfs.clone();
                let current_generation = current_generation.clone();
                tokio::spawn(async move {
                    match hrtfs.pair(&request.file).await {
                        Ok(pair) => {
                            // A newer session may own the convolver
                            // slots by now; stale loads are dropped.
                            if current_generation.load(Ordering::SeqCst) != generation {
                                return;
                            }
                            graph.lock().unwrap().spatial().install_hrtf(
                                request.slot,
                                &request.file,
                                &pair,
                            );
                        }
                        Err(e) => {
                            warn!("HRTF '{}' unavailable, using panner: {}", request.file, e);
                            if current_generation.load(Ordering::SeqCst) == generation {
                                graph.lock().unwrap().spatial().disable_hrtf();
                            }
                        }
                    }
                });
            }
        }
    }

    fn check_current(&self, session: &EngineSession) -> Result<(), Error> {
        if self.generation.load(Ordering::SeqCst) != session.generation {
            return Err(Error::InvalidState(format!(
                "session {} has been superseded",
                session.id
            )));
        }
        Ok(())
    }

    /// Apply a partial scene update.
    pub fn update_scene(&self, session: &EngineSession, delta: SceneDelta) -> Result<(), Error> {
        self.check_current(session)?;
        let mut dynamics = session.dynamics.lock().unwrap();
        if let Some(preview) = delta.preview {
            dynamics.set_preview(preview);
        }
        let mut listener = dynamics.state().listener;
        if let Some(pos) = delta.listener_position {
            listener.position = pos;
        }
        if let Some(orientation) = delta.listener_orientation {
            listener.orientation = orientation;
        }
        let source = delta
            .source_position
            .unwrap_or(dynamics.state().source.position);
        dynamics.set_pose(source, listener);
        Ok(())
    }

    /// Named parameter write; the value is clamped by the owning stage.
    pub fn set_reverb_param(
        &self,
        session: &EngineSession,
        name: &str,
        value: f32,
    ) -> Result<(), Error> {
        self.check_current(session)?;
        session.graph.lock().unwrap().set_reverb_param(name, value);
        Ok(())
    }

    pub fn set_eq_gain(
        &self,
        session: &EngineSession,
        band: usize,
        gain_db: f32,
    ) -> Result<(), Error> {
        self.check_current(session)?;
        session.graph.lock().unwrap().set_eq_gain(band, gain_db);
        Ok(())
    }

    pub fn set_tone_enabled(&self, session: &EngineSession, enabled: bool) -> Result<(), Error> {
        self.check_current(session)?;
        session.graph.lock().unwrap().set_tone_enabled(enabled);
        Ok(())
    }

    pub fn set_spatial_enabled(&self, session: &EngineSession, enabled: bool) -> Result<(), Error> {
        self.check_current(session)?;
        session.graph.lock().unwrap().spatial().set_enabled(enabled);
        Ok(())
    }

    pub fn set_looping(&self, session: &EngineSession, looping: bool) -> Result<(), Error> {
        self.check_current(session)?;
        session.graph.lock().unwrap().set_looping(looping);
        Ok(())
    }

    /// Switch the reverb room. Loads for one session are serialized so
    /// a repeated request for the preset already being fetched simply
    /// waits for it; a different preset supersedes the fetch in flight.
    pub async fn load_reverb_preset(
        &self,
        session: &EngineSession,
        id: &str,
    ) -> Result<(), Error> {
        self.check_current(session)?;
        let _serialized = session.preset_lock.lock().await;

        let action = session.graph.lock().unwrap().reverb().begin_preset_load(id);
        let slot = match action {
            PresetLoad::AlreadyActive | PresetLoad::InFlight => return Ok(()),
            PresetLoad::Start { slot } => slot,
        };

        let impulse = self.impulses.impulse(id).await;
        self.check_current(session)?;
        session
            .graph
            .lock()
            .unwrap()
            .reverb()
            .finish_preset_load(id, slot, &impulse);
        Ok(())
    }

    /// Stop and dismantle a session.
    pub fn teardown(&self, mut session: EngineSession) {
        session.shutdown();
    }

    /// Render the full graph for a buffer without a device or clock.
    /// Parameters apply instantaneously since no listener hears the
    /// steps.
    pub async fn render_offline(
        &self,
        data: Arc<AudioData>,
        config: &ReverbConfig,
    ) -> Result<AudioData, Error> {
        if data.frames() == 0 {
            return Err(Error::Decode("source buffer is empty".to_string()));
        }
        let sample_rate = self.settings.sample_rate;
        let mut graph = PlaybackGraph::new(data, sample_rate as f32, AutomationMode::Immediate);
        graph.apply_config(config);

        if let Some(preset) = config
            .preset_id
            .clone()
            .or_else(|| self.settings.default_preset.clone())
        {
            if let PresetLoad::Start { slot } = graph.reverb().begin_preset_load(&preset) {
                let impulse = self.impulses.impulse(&preset).await;
                graph.reverb().finish_preset_load(&preset, slot, &impulse);
            }
        }

        let mut left_out = Vec::new();
        let mut right_out = Vec::new();
        let mut left = [0.0f32; BLOCK_SIZE];
        let mut right = [0.0f32; BLOCK_SIZE];
        loop {
            let live = graph.render_block(&mut left, &mut right);
            left_out.extend_from_slice(&left);
            right_out.extend_from_slice(&right);
            if !live {
                break;
            }
        }
        info!(
            "offline render produced {} frames at {} Hz",
            left_out.len(),
            sample_rate
        );
        Ok(AudioData::new(sample_rate, vec![left_out, right_out]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starting_session_fires_previous_stop_flag() {
        let engine = Engine::new(Settings::default());
        let stop = Arc::new(AtomicBool::new(false));
        *engine.active_stop.lock().unwrap() = Arc::downgrade(&stop);

        engine.stop_active_session();
        assert!(stop.load(Ordering::Relaxed));
    }

    #[test]
    fn dropped_session_leaves_no_dangling_stop() {
        let engine = Engine::new(Settings::default());
        {
            let stop = Arc::new(AtomicBool::new(false));
            *engine.active_stop.lock().unwrap() = Arc::downgrade(&stop);
        }
        // The session is gone; the weak reference no longer upgrades.
        assert!(engine.active_stop.lock().unwrap().upgrade().is_none());
        engine.stop_active_session();
    }
}
