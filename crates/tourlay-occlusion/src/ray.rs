//! Segment sampling against collision volumes.
//!
//! Rather than stepping cell boundaries, a ray is probed at evenly spaced
//! interior points; each point that lands inside a collision volume adds a
//! fixed share of occlusion. A distance-weighted environmental term accounts
//! for clutter the coarse volumes do not capture.

use glam::DVec3;
use serde::{Deserialize, Serialize};
use tourlay_scene::SceneGeometry;

/// Interior points probed along every ray.
pub const RAY_SAMPLES: usize = 10;

/// Occlusion at or above this value means the target is not visible.
pub const BLOCKED_THRESHOLD: f64 = 0.8;

/// Distance at which the environmental term reaches full weight.
const ENVIRONMENT_FALLOFF: f64 = 20.0;

/// Weight of the environmental term.
const ENVIRONMENT_WEIGHT: f64 = 0.2;

/// Result of a single ray test.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RayHit {
    /// True when the target is considered visible from the origin.
    pub hit_target: bool,
    /// Occlusion along the segment, in `[0, 1]`.
    pub occlusion_factor: f64,
    /// Segment length.
    pub distance: f64,
    /// Labels of the collision volumes that blocked at least one sample, in
    /// first-hit order.
    pub blocking_objects: Vec<String>,
}

impl RayHit {
    fn from_occlusion(occlusion_factor: f64, distance: f64, blocking_objects: Vec<String>) -> Self {
        let occlusion_factor = occlusion_factor.clamp(0.0, 1.0);
        Self {
            hit_target: occlusion_factor < BLOCKED_THRESHOLD,
            occlusion_factor,
            distance,
            blocking_objects,
        }
    }

    /// Conservative result used when the ray cannot be evaluated.
    pub fn fully_occluded() -> Self {
        Self::from_occlusion(1.0, 0.0, Vec::new())
    }

    /// Visibility score, `1 - occlusion_factor`.
    pub fn visibility(&self) -> f64 {
        1.0 - self.occlusion_factor
    }
}

/// Errors that prevent a ray from being evaluated.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum RayTestError {
    /// An endpoint contains NaN or infinity.
    #[error("ray endpoint is not finite: origin {origin:?}, target {target:?}")]
    NonFiniteEndpoint {
        /// Ray origin.
        origin: [f64; 3],
        /// Ray target.
        target: [f64; 3],
    },
}

/// Cast a ray from `origin` to `target` through the scene's collision volumes.
pub fn try_cast_ray(
    origin: DVec3,
    target: DVec3,
    scene: &SceneGeometry,
) -> Result<RayHit, RayTestError> {
    if !origin.is_finite() || !target.is_finite() {
        return Err(RayTestError::NonFiniteEndpoint {
            origin: origin.to_array(),
            target: target.to_array(),
        });
    }

    let direction = target - origin;
    let distance = direction.length();
    if distance == 0.0 {
        return Ok(RayHit::from_occlusion(0.0, 0.0, Vec::new()));
    }

    let mut occlusion = 0.0;
    let mut blocking_objects: Vec<String> = Vec::new();
    let step = 1.0 / RAY_SAMPLES as f64;

    for i in 1..=RAY_SAMPLES {
        let t = i as f64 / (RAY_SAMPLES + 1) as f64;
        let sample = origin + direction * t;

        let mut blocked = false;
        for (index, volume) in scene.volumes_containing(sample) {
            blocked = true;
            let label = volume.label(index);
            if !blocking_objects.contains(&label) {
                blocking_objects.push(label);
            }
        }
        if blocked {
            occlusion += step;
        }
    }

    let distance_factor = (distance / ENVIRONMENT_FALLOFF).min(1.0);
    occlusion += scene.geometry_complexity() * distance_factor * ENVIRONMENT_WEIGHT;

    Ok(RayHit::from_occlusion(occlusion, distance, blocking_objects))
}

/// Like [`try_cast_ray`], but an unevaluable ray is reported as fully occluded.
pub fn cast_ray(origin: DVec3, target: DVec3, scene: &SceneGeometry) -> RayHit {
    match try_cast_ray(origin, target, scene) {
        Ok(hit) => hit,
        Err(e) => {
            tracing::warn!("ray test failed, treating as occluded: {e}");
            RayHit::fully_occluded()
        }
    }
}
