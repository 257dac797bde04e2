//! Candidate positions for a new anchor, ranked by estimated visibility.

use glam::DVec3;
use serde::{Deserialize, Serialize};
use tourlay_occlusion::center_occlusion;
use tourlay_scene::{AnchorType, SceneGeometry};

use crate::constraints::PlacementConstraints;

const GRID_STEPS: usize = 5;
const MIN_QUALITY: f64 = 0.3;
const MAX_RECOMMENDATIONS: usize = 10;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PlacementRecommendation {
    pub position: DVec3,
    /// `1 - occlusion_score`.
    pub quality_score: f64,
    pub occlusion_score: f64,
    pub anchor_type: AnchorType,
}

/// Sample a 5 x 5 grid across the scene floor plan at the type's preferred
/// height and return the ten best candidates with quality above 0.3, best first.
pub fn placement_recommendations(
    anchor_type: &AnchorType,
    scene: &SceneGeometry,
) -> Vec<PlacementRecommendation> {
    let height = PlacementConstraints::for_type(anchor_type).preferred_height;
    let bounds = &scene.bounds;

    let mut candidates: Vec<PlacementRecommendation> = linspace(bounds.min.x, bounds.max.x)
        .flat_map(|x| linspace(bounds.min.z, bounds.max.z).map(move |z| DVec3::new(x, height, z)))
        .filter_map(|position| {
            let occlusion_score = center_occlusion(position, scene);
            let quality_score = 1.0 - occlusion_score;
            (quality_score > MIN_QUALITY).then(|| PlacementRecommendation {
                position,
                quality_score,
                occlusion_score,
                anchor_type: anchor_type.clone(),
            })
        })
        .collect();

    candidates.sort_by(|a, b| b.quality_score.total_cmp(&a.quality_score));
    candidates.truncate(MAX_RECOMMENDATIONS);
    candidates
}

/// `GRID_STEPS` evenly spaced values from `from` to `to`, both inclusive.
fn linspace(from: f64, to: f64) -> impl Iterator<Item = f64> {
    let step = (to - from) / (GRID_STEPS - 1) as f64;
    (0..GRID_STEPS).map(move |i| from + step * i as f64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tourlay_scene::Aabb;

    fn square_room() -> SceneGeometry {
        SceneGeometry::with_bounds(Aabb::new(
            DVec3::new(-10.0, 0.0, -10.0),
            DVec3::new(10.0, 5.0, 10.0),
        ))
    }

    #[test]
    fn test_best_first_and_capped() {
        let recs = placement_recommendations(&AnchorType::Hotspot, &square_room());
        assert!(!recs.is_empty());
        assert!(recs.len() <= 10);
        assert!(recs.windows(2).all(|w| w[0].quality_score >= w[1].quality_score));
        assert!(recs.iter().all(|r| r.quality_score > 0.3));
        assert_eq!(recs[0].position, DVec3::new(0.0, 1.5, 0.0));
    }

    /// Corners are far from the center and never make the cut.
    #[test]
    fn test_corners_excluded() {
        let recs = placement_recommendations(&AnchorType::Label, &square_room());
        assert!(recs.iter().all(|r| r.position.x.abs() < 10.0 || r.position.z.abs() < 10.0));
        assert!(recs.iter().all(|r| r.position.y == 2.0));
        assert!(recs.iter().all(|r| r.anchor_type == AnchorType::Label));
    }

    #[test]
    fn test_linspace_inclusive() {
        let values: Vec<f64> = linspace(-10.0, 10.0).collect();
        assert_eq!(values, vec![-10.0, -5.0, 0.0, 5.0, 10.0]);
    }
}
