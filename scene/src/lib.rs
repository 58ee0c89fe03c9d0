//! Control-rate scene dynamics: finite-difference velocity estimation,
//! Doppler factor computation, and an authored preview motion.

use engine_core::geometry::{Orientation, Vec3};
use engine_core::scene::{SceneState, SourceState};

pub const SPEED_OF_SOUND: f32 = 343.0;
const MAX_RADIAL_SPEED: f32 = 0.45 * SPEED_OF_SOUND;
const DOPPLER_MIN: f32 = 0.78;
const DOPPLER_MAX: f32 = 1.22;

const MAX_FRAME_DT: f32 = 0.1;
const MAX_VELOCITY_DT: f32 = 0.25;

/// Playback-rate multiplier for a given radial velocity in m/s,
/// positive when the source recedes along the listener-to-source axis.
/// Clamped to stay well clear of the `c - v` singularity.
pub fn doppler_factor(radial_velocity: f32) -> f32 {
    let rv = radial_velocity.clamp(-MAX_RADIAL_SPEED, MAX_RADIAL_SPEED);
    (SPEED_OF_SOUND / (SPEED_OF_SOUND - rv)).clamp(DOPPLER_MIN, DOPPLER_MAX)
}

/// Preview-motion shape: the source orbits the listener on an ellipse
/// while the listener's head sweeps sinusoidally.
#[derive(Debug, Clone, Copy)]
pub struct PreviewMotion {
    pub radius_x: f32,
    pub radius_z: f32,
    pub height: f32,
    /// Orbit angular rate in radians per second.
    pub angular_rate: f32,
    pub yaw_amplitude: f32,
    pub yaw_rate: f32,
    pub pitch_amplitude: f32,
    pub pitch_rate: f32,
}

impl Default for PreviewMotion {
    fn default() -> Self {
        Self {
            radius_x: 3.0,
            radius_z: 2.2,
            height: 0.4,
            angular_rate: 0.6,
            yaw_amplitude: 25.0,
            yaw_rate: 0.31,
            pitch_amplitude: 8.0,
            pitch_rate: 0.47,
        }
    }
}

/// Advances the scene once per control frame and derives velocity and
/// Doppler from the position history.
pub struct SceneDynamics {
    state: SceneState,
    preview: Option<PreviewState>,
    motion: PreviewMotion,
}

struct PreviewState {
    /// Pose to restore when preview is switched off.
    saved: SceneState,
    phase: f32,
    elapsed: f32,
}

impl SceneDynamics {
    pub fn new(initial: SceneState) -> Self {
        Self {
            state: initial,
            preview: None,
            motion: PreviewMotion::default(),
        }
    }

    pub fn state(&self) -> &SceneState {
        &self.state
    }

    pub fn preview_active(&self) -> bool {
        self.preview.is_some()
    }

    /// Replace the manual pose. Ignored while preview drives the scene.
    pub fn set_pose(&mut self, source_position: Vec3, listener: engine_core::scene::ListenerState) {
        if self.preview.is_some() {
            return;
        }
        self.state.source.position = source_position;
        self.state.listener = listener;
    }

    /// Toggle the authored preview motion. Entering snapshots the
    /// current pose; leaving restores it, so the toggle is lossless.
    pub fn set_preview(&mut self, enabled: bool) {
        match (enabled, self.preview.take()) {
            (true, None) => {
                log::debug!("preview motion enabled");
                self.preview = Some(PreviewState {
                    saved: self.state,
                    phase: 0.0,
                    elapsed: 0.0,
                });
            }
            (false, Some(prev)) => {
                log::debug!("preview motion disabled, restoring pose");
                self.state = prev.saved;
                self.state.source = SourceState::at(self.state.source.position);
            }
            (true, Some(prev)) => self.preview = Some(prev),
            (false, None) => {}
        }
    }

    /// One control frame. `dt` is seconds since the previous call,
    /// clamped to reject scheduler stalls.
    pub fn step(&mut self, dt: f32) {
        let dt = dt.clamp(0.0, MAX_FRAME_DT);
        if let Some(preview) = &mut self.preview {
            preview.phase += self.motion.angular_rate * dt;
            preview.elapsed += dt;
            let m = &self.motion;
            self.state.source.position = Vec3::new(
                m.radius_x * preview.phase.cos(),
                m.height * (preview.phase * 0.5).sin(),
                -m.radius_z * preview.phase.sin(),
            );
            self.state.listener.orientation = Orientation::new(
                m.yaw_amplitude * (preview.elapsed * m.yaw_rate * std::f32::consts::TAU).sin(),
                m.pitch_amplitude * (preview.elapsed * m.pitch_rate * std::f32::consts::TAU).sin(),
                0.0,
            );
        }

        let source = &mut self.state.source;
        if dt > 0.0 && dt < MAX_VELOCITY_DT {
            source.velocity = source.position.sub(source.last_position).scale(1.0 / dt);
        }
        source.last_position = source.position;
    }

    /// Radial velocity of the source along the listener-to-source axis,
    /// positive when receding.
    pub fn radial_velocity(&self) -> f32 {
        let away = self
            .state
            .source
            .position
            .sub(self.state.listener.position)
            .normalize();
        self.state.source.velocity.dot(away)
    }

    pub fn doppler(&self) -> f32 {
        doppler_factor(self.radial_velocity())
    }
}
