//! Selection of HRTF measurement positions for a source direction.
//!
//! The catalog holds impulse responses measured on a sparse grid of
//! azimuth/elevation positions. For an arbitrary source direction we pick
//! the two nearest grid positions and blend them with inverse-distance
//! weights, so a moving source sweeps smoothly across the grid instead of
//! snapping from one measurement to the next.

use assets::HrtfPositionDescriptor;

/// One grid position chosen for the current source direction, with its
/// blend weight. Weights across the returned set sum to 1.
#[derive(Debug, Clone, PartialEq)]
pub struct HrtfTarget {
    pub file: String,
    pub azimuth: f32,
    pub elevation: f32,
    pub weight: f32,
}

const EPSILON: f32 = 1e-6;

fn wrap_degrees(mut a: f32) -> f32 {
    a %= 360.0;
    if a > 180.0 {
        a -= 360.0;
    } else if a <= -180.0 {
        a += 360.0;
    }
    a
}

/// Normalized angular distance between a query direction and a grid
/// position. Azimuth difference wraps across the rear seam and is scaled
/// by 180, elevation by 90, so both axes contribute comparably.
fn angular_distance(az: f32, el: f32, pos: &HrtfPositionDescriptor) -> f32 {
    let daz = wrap_degrees(az - pos.azimuth) / 180.0;
    let del = (el - pos.elevation) / 90.0;
    (daz * daz + del * del).sqrt()
}

/// Pick up to two catalog positions for the given direction.
///
/// The query elevation is clamped to the measured range before matching.
/// An exact hit (or a catalog with a single entry) yields one target with
/// weight 1; otherwise the two nearest positions get inverse-distance
/// weights.
pub fn compute_hrtf_targets(
    positions: &[HrtfPositionDescriptor],
    azimuth: f32,
    elevation: f32,
) -> Vec<HrtfTarget> {
    if positions.is_empty() {
        return Vec::new();
    }
    let az = wrap_degrees(azimuth);
    let el = elevation.clamp(-50.0, 90.0);

    let mut scored: Vec<(f32, &HrtfPositionDescriptor)> = positions
        .iter()
        .map(|p| (angular_distance(az, el, p), p))
        .collect();
    scored.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal));

    let (d0, p0) = (scored[0].0, scored[0].1);
    if d0 <= EPSILON || scored.len() < 2 {
        return vec![HrtfTarget {
            file: p0.file.clone(),
            azimuth: p0.azimuth,
            elevation: p0.elevation,
            weight: 1.0,
        }];
    }
    let (d1, p1) = (scored[1].0, scored[1].1);
    if d1 <= EPSILON {
        return vec![HrtfTarget {
            file: p1.file.clone(),
            azimuth: p1.azimuth,
            elevation: p1.elevation,
            weight: 1.0,
        }];
    }

    let w0 = 1.0 / (d0 + EPSILON);
    let w1 = 1.0 / (d1 + EPSILON);
    let total = w0 + w1;
    vec![
        HrtfTarget {
            file: p0.file.clone(),
            azimuth: p0.azimuth,
            elevation: p0.elevation,
            weight: w0 / total,
        },
        HrtfTarget {
            file: p1.file.clone(),
            azimuth: p1.azimuth,
            elevation: p1.elevation,
            weight: w1 / total,
        },
    ]
}
