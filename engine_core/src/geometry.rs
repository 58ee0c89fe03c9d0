//! Vector and rotation utilities.
//!
//! Listener-local axes follow the audio convention: forward is -Z,
//! up is +Y. All angles are in degrees.

use serde::{Deserialize, Serialize};

const EPSILON: f32 = 1e-6;

/// 3D position or velocity in meters. Immutable value type.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Vec3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Vec3 {
    pub const ZERO: Vec3 = Vec3 {
        x: 0.0,
        y: 0.0,
        z: 0.0,
    };

    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    pub fn add(self, other: Vec3) -> Vec3 {
        Vec3::new(self.x + other.x, self.y + other.y, self.z + other.z)
    }

    pub fn sub(self, other: Vec3) -> Vec3 {
        Vec3::new(self.x - other.x, self.y - other.y, self.z - other.z)
    }

    pub fn scale(self, s: f32) -> Vec3 {
        Vec3::new(self.x * s, self.y * s, self.z * s)
    }

    pub fn dot(self, other: Vec3) -> f32 {
        self.x * other.x + self.y * other.y + self.z * other.z
    }

    pub fn length(self) -> f32 {
        self.dot(self).sqrt()
    }

    /// Unit vector, or zero when the input is degenerately short.
    pub fn normalize(self) -> Vec3 {
        let len = self.length();
        if len < EPSILON {
            return Vec3::ZERO;
        }
        self.scale(1.0 / len)
    }
}

/// Listener or body orientation as yaw/pitch/roll in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Orientation {
    pub yaw: f32,
    pub pitch: f32,
    pub roll: f32,
}

impl Orientation {
    pub fn new(yaw: f32, pitch: f32, roll: f32) -> Self {
        Self { yaw, pitch, roll }
    }
}

fn rotate_yaw(v: Vec3, deg: f32) -> Vec3 {
    let (s, c) = deg.to_radians().sin_cos();
    Vec3::new(v.x * c + v.z * s, v.y, -v.x * s + v.z * c)
}

fn rotate_pitch(v: Vec3, deg: f32) -> Vec3 {
    let (s, c) = deg.to_radians().sin_cos();
    Vec3::new(v.x, v.y * c - v.z * s, v.y * s + v.z * c)
}

fn rotate_roll(v: Vec3, deg: f32) -> Vec3 {
    let (s, c) = deg.to_radians().sin_cos();
    Vec3::new(v.x * c - v.y * s, v.x * s + v.y * c, v.z)
}

/// Rotate a body-frame vector into world space, applying yaw, then
/// pitch, then roll.
pub fn rotate(v: Vec3, orientation: Orientation) -> Vec3 {
    rotate_roll(
        rotate_pitch(rotate_yaw(v, orientation.yaw), orientation.pitch),
        orientation.roll,
    )
}

/// Map a world-space offset into listener-local axes: the exact
/// inverse of [`rotate`] (negated angles in reverse order).
pub fn world_to_listener(v: Vec3, orientation: Orientation) -> Vec3 {
    rotate_yaw(
        rotate_pitch(rotate_roll(v, -orientation.roll), -orientation.pitch),
        -orientation.yaw,
    )
}

/// Azimuth and elevation of `source_pos` as seen from a listener at
/// `listener_pos` with the given orientation, both in degrees.
///
/// Azimuth is 0 straight ahead, positive to the right; elevation is 0
/// level, positive above.
pub fn compute_angles(
    listener_pos: Vec3,
    listener_orientation: Orientation,
    source_pos: Vec3,
) -> (f32, f32) {
    let local = world_to_listener(source_pos.sub(listener_pos), listener_orientation);
    let azimuth = local.x.atan2(-local.z).to_degrees();
    let horizontal = (local.x * local.x + local.z * local.z).sqrt().max(EPSILON);
    let elevation = local.y.atan2(horizontal).to_degrees();
    (normalize_azimuth(azimuth), elevation)
}

/// Wrap an angle in degrees into (-180, 180].
pub fn normalize_azimuth(angle: f32) -> f32 {
    let mut a = angle % 360.0;
    if a <= -180.0 {
        a += 360.0;
    } else if a > 180.0 {
        a -= 360.0;
    }
    a
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_close(a: f32, b: f32) {
        assert!((a - b).abs() < 1e-4, "{} != {}", a, b);
    }

    #[test]
    fn normalize_azimuth_wraps() {
        assert_close(normalize_azimuth(190.0), -170.0);
        assert_close(normalize_azimuth(-190.0), 170.0);
        assert_close(normalize_azimuth(0.0), 0.0);
        assert_close(normalize_azimuth(540.0), 180.0);
    }

    #[test]
    fn rotate_and_inverse_round_trip() {
        let o = Orientation::new(37.0, -12.0, 55.0);
        let v = Vec3::new(0.3, -1.2, 2.5);
        let back = world_to_listener(rotate(v, o), o);
        assert_close(back.x, v.x);
        assert_close(back.y, v.y);
        assert_close(back.z, v.z);
    }

    #[test]
    fn yaw_turns_forward_vector() {
        // Yawing 90 degrees turns the -Z forward vector to -X.
        let forward = rotate(Vec3::new(0.0, 0.0, -1.0), Orientation::new(90.0, 0.0, 0.0));
        assert_close(forward.x, -1.0);
        assert_close(forward.z, 0.0);
    }

    #[test]
    fn angles_for_cardinal_directions() {
        let listener = Vec3::ZERO;
        let level = Orientation::default();

        let (az, el) = compute_angles(listener, level, Vec3::new(0.0, 0.0, -2.0));
        assert_close(az, 0.0);
        assert_close(el, 0.0);

        let (az, _) = compute_angles(listener, level, Vec3::new(2.0, 0.0, 0.0));
        assert_close(az, 90.0);

        let (az, _) = compute_angles(listener, level, Vec3::new(-2.0, 0.0, 0.0));
        assert_close(az, -90.0);

        let (_, el) = compute_angles(listener, level, Vec3::new(0.0, 3.0, -3.0));
        assert_close(el, 45.0);
    }

    #[test]
    fn coincident_source_is_guarded() {
        let (az, el) = compute_angles(Vec3::ZERO, Orientation::default(), Vec3::ZERO);
        assert!(az.is_finite());
        assert!(el.is_finite());
    }

    #[test]
    fn listener_yaw_shifts_azimuth() {
        // Yaw of 90 degrees swings the forward vector to -X, so a
        // source dead ahead in world space ends up on the right.
        let (az, _) = compute_angles(
            Vec3::ZERO,
            Orientation::new(90.0, 0.0, 0.0),
            Vec3::new(0.0, 0.0, -2.0),
        );
        assert_close(az, 90.0);
    }
}
