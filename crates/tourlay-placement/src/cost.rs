//! Placement cost terms.

use glam::DVec3;
use tourlay_occlusion::OcclusionAnalyzer;
use tourlay_scene::{AnchorType, SceneGeometry};

use crate::constraints::PlacementConstraints;

pub const DISTANCE_WEIGHT: f64 = 0.3;
pub const HEIGHT_WEIGHT: f64 = 0.2;
pub const OCCLUSION_WEIGHT: f64 = 0.4;
pub const BOUNDARY_PENALTY: f64 = 10.0;
pub const SPACING_WEIGHT: f64 = 0.3;

/// Weighted cost of putting one anchor at a candidate position.
#[derive(Clone, Copy, Debug)]
pub struct PlacementCost<'a> {
    pub scene: &'a SceneGeometry,
    pub anchor_type: &'a AnchorType,
    pub constraints: &'a PlacementConstraints,
    pub desired: DVec3,
    pub analyzer: OcclusionAnalyzer,
}

impl PlacementCost<'_> {
    /// `0.3·distance + 0.2·height error + 0.4·occlusion + 10·boundary overshoot`.
    pub fn evaluate(&self, p: DVec3) -> f64 {
        let distance = p.distance(self.desired);
        let height = (p.y - self.constraints.preferred_height).abs();
        let occlusion = self
            .analyzer
            .placement_occlusion(p, self.scene, self.anchor_type);
        let boundary = self.scene.bounds.violation(p);

        DISTANCE_WEIGHT * distance
            + HEIGHT_WEIGHT * height
            + OCCLUSION_WEIGHT * occlusion
            + BOUNDARY_PENALTY * boundary
    }
}

/// Quadratic penalty over every pair closer than the larger of their two
/// spacing thresholds.
pub fn spacing_penalty(positions: &[DVec3], spacing: &[f64]) -> f64 {
    let mut total = 0.0;
    for i in 0..positions.len() {
        for j in (i + 1)..positions.len() {
            let threshold = spacing[i].max(spacing[j]);
            let shortfall = (threshold - positions[i].distance(positions[j])).max(0.0);
            total += shortfall * shortfall;
        }
    }
    SPACING_WEIGHT * total
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cost_at(desired: DVec3, p: DVec3) -> f64 {
        let scene = SceneGeometry::default();
        let constraints = PlacementConstraints::for_type(&AnchorType::Hotspot);
        PlacementCost {
            scene: &scene,
            anchor_type: &AnchorType::Hotspot,
            constraints: &constraints,
            desired,
            analyzer: OcclusionAnalyzer::new(),
        }
        .evaluate(p)
    }

    #[test]
    fn test_cost_terms_add_up() {
        let desired = DVec3::new(0.0, 1.5, 0.0);
        let p = DVec3::new(3.0, 1.5, 4.0);
        let reach = SceneGeometry::default().bounds.half_diagonal();
        let expected = 0.3 * 5.0 + 0.4 * (p.length() / reach);
        assert!((cost_at(desired, p) - expected).abs() < 1e-12);
    }

    /// Leaving the scene is penalized per unit of overshoot.
    #[test]
    fn test_boundary_violation_dominates() {
        let desired = DVec3::new(49.0, 1.5, 0.0);
        let inside = cost_at(desired, DVec3::new(50.0, 1.5, 0.0));
        let outside = cost_at(desired, DVec3::new(51.0, 1.5, 0.0));
        assert!(outside - inside > 9.0);
    }

    #[test]
    fn test_spacing_penalty_uses_larger_threshold() {
        let positions = [DVec3::ZERO, DVec3::new(1.0, 0.0, 0.0)];
        let penalty = spacing_penalty(&positions, &[3.0, 1.0]);
        assert!((penalty - 0.3 * 4.0).abs() < 1e-12);
        assert_eq!(spacing_penalty(&positions, &[1.0, 0.0]), 0.0);
    }

    #[test]
    fn test_spacing_penalty_single_anchor_is_zero() {
        assert_eq!(spacing_penalty(&[DVec3::ONE], &[5.0]), 0.0);
    }
}
