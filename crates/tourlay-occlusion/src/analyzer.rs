//! Multi-viewpoint occlusion analysis and single-viewpoint checks.

use std::f64::consts::TAU;

use glam::DVec3;
use serde::{Deserialize, Serialize};
use tourlay_scene::{AnchorType, SceneGeometry};

use crate::grid::{GridError, VisibilityGrid};
use crate::ray::cast_ray;
use crate::viewpoints::{Viewpoint, generate_viewpoints};

/// Below this visibility percentage the report carries remediation suggestions.
const RECOMMEND_BELOW_PERCENT: f64 = 50.0;
/// How many of the clearest viewpoints a report lists.
const BEST_VIEWPOINT_COUNT: usize = 3;
/// Share of the way toward the best viewpoint a position suggestion moves.
const APPROACH_FRACTION: f64 = 0.3;
/// Anchors below this height are suggested to move up, others down.
const RAISE_BELOW_HEIGHT: f64 = 3.0;
const RAISE_BY: f64 = 1.0;
const LOWER_BY: f64 = -0.5;
/// Height suggestions need mean occlusion above this.
const HEIGHT_ADJUST_ABOVE: f64 = 0.6;
/// Single-viewpoint checks above this occlusion search for an alternative.
const ALTERNATIVE_SEARCH_ABOVE: f64 = 0.7;
/// An alternative must be at least this visible to be recommended.
const ALTERNATIVE_MIN_VISIBILITY: f64 = 0.5;
const ALTERNATIVE_ANGLES: usize = 8;
const ALTERNATIVE_RADII: [f64; 3] = [0.5, 1.0, 1.5];

/// One viewpoint's ray test within an [`OcclusionReport`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ViewpointSample {
    pub viewpoint: Viewpoint,
    pub visible: bool,
    pub occlusion_factor: f64,
    pub blocking_objects: Vec<String>,
}

/// Kind of remediation a [`Recommendation`] proposes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecommendationKind {
    /// Move toward the clearest viewpoint.
    PositionAdjustment,
    /// Raise or lower the anchor.
    HeightAdjustment,
}

/// A suggested position change for a poorly visible anchor.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    pub kind: RecommendationKind,
    pub description: String,
    pub suggested_position: DVec3,
    /// Rough expected gain in visibility share.
    pub expected_improvement: f64,
}

/// Visibility of a point from every generated viewpoint.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OcclusionReport {
    pub position: DVec3,
    /// Share of viewpoints with a clear line of sight, in `[0, 100]`.
    pub visibility_percentage: f64,
    /// Mean occlusion factor across viewpoints, in `[0, 1]`.
    pub average_occlusion: f64,
    pub viewpoint_count: usize,
    pub visible_viewpoints: usize,
    /// Up to three viewpoints with the lowest occlusion, clearest first.
    pub best_viewpoints: Vec<ViewpointSample>,
    /// Every viewpoint in generation order.
    pub samples: Vec<ViewpointSample>,
    /// Remediation suggestions; empty unless visibility is below 50 %.
    pub recommendations: Vec<Recommendation>,
}

/// Result of checking one anchor against one viewer position.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OcclusionCheck {
    pub anchor_position: DVec3,
    pub viewpoint: DVec3,
    pub distance: f64,
    pub visible: bool,
    /// Visibility score, `1 - occlusion_factor`.
    pub score: f64,
    pub occlusion_factor: f64,
    pub blocking_objects: Vec<String>,
    /// A nearby position that is clearly visible from the same viewpoint,
    /// searched only when the anchor is heavily occluded.
    pub recommended_position: Option<DVec3>,
    /// `score` expressed as a percentage.
    pub visibility_percentage: f64,
}

/// Coarse occlusion estimate from how far `position` sits from the scene
/// center, normalized by the center-to-corner distance and capped at 1.
pub fn center_occlusion(position: DVec3, scene: &SceneGeometry) -> f64 {
    let reach = scene.bounds.half_diagonal();
    if reach <= 0.0 {
        return 0.0;
    }
    ((position - scene.bounds.center()).length() / reach).min(1.0)
}

/// Evaluates anchor visibility against a scene's collision volumes.
#[derive(Clone, Copy, Debug, Default)]
pub struct OcclusionAnalyzer;

impl OcclusionAnalyzer {
    /// Create an analyzer.
    pub fn new() -> Self {
        Self
    }

    /// Ray-test `position` from every viewpoint generated for `anchor_type`.
    pub fn analyze_occlusion(
        &self,
        position: DVec3,
        scene: &SceneGeometry,
        anchor_type: &AnchorType,
    ) -> OcclusionReport {
        let samples: Vec<ViewpointSample> = generate_viewpoints(position, anchor_type)
            .into_iter()
            .map(|viewpoint| {
                let hit = cast_ray(viewpoint.position, position, scene);
                ViewpointSample {
                    viewpoint,
                    visible: hit.hit_target,
                    occlusion_factor: hit.occlusion_factor,
                    blocking_objects: hit.blocking_objects,
                }
            })
            .collect();

        let viewpoint_count = samples.len();
        let visible_viewpoints = samples.iter().filter(|s| s.visible).count();
        let (visibility_percentage, average_occlusion) = if viewpoint_count == 0 {
            (0.0, 1.0)
        } else {
            (
                visible_viewpoints as f64 / viewpoint_count as f64 * 100.0,
                samples.iter().map(|s| s.occlusion_factor).sum::<f64>() / viewpoint_count as f64,
            )
        };

        let mut ranked = samples.clone();
        ranked.sort_by(|a, b| a.occlusion_factor.total_cmp(&b.occlusion_factor));
        ranked.truncate(BEST_VIEWPOINT_COUNT);

        let recommendations = if visibility_percentage < RECOMMEND_BELOW_PERCENT {
            let clearest_visible = samples
                .iter()
                .filter(|s| s.visible)
                .min_by(|a, b| a.occlusion_factor.total_cmp(&b.occlusion_factor));
            remediation(position, clearest_visible, average_occlusion)
        } else {
            Vec::new()
        };

        tracing::debug!(
            visible = visible_viewpoints,
            total = viewpoint_count,
            average_occlusion,
            "occlusion analyzed at {position}"
        );

        OcclusionReport {
            position,
            visibility_percentage,
            average_occlusion,
            viewpoint_count,
            visible_viewpoints,
            best_viewpoints: ranked,
            samples,
            recommendations,
        }
    }

    /// Occlusion term used by the placement cost.
    ///
    /// The larger of the center-distance estimate and the mean ray occlusion
    /// over the type's viewpoints. In a scene without collision volumes the
    /// ray term is zero and the center estimate decides.
    pub fn placement_occlusion(
        &self,
        position: DVec3,
        scene: &SceneGeometry,
        anchor_type: &AnchorType,
    ) -> f64 {
        let heuristic = center_occlusion(position, scene);
        if scene.collision_volumes.is_empty() {
            return heuristic;
        }
        let viewpoints = generate_viewpoints(position, anchor_type);
        let rays = viewpoints
            .iter()
            .map(|vp| cast_ray(vp.position, position, scene).occlusion_factor)
            .sum::<f64>()
            / viewpoints.len().max(1) as f64;
        heuristic.max(rays).clamp(0.0, 1.0)
    }

    /// Test one viewer position against an anchor, searching for a nearby
    /// alternative when the line of sight is heavily blocked.
    pub fn check_occlusion(
        &self,
        anchor_position: DVec3,
        viewpoint: DVec3,
        scene: &SceneGeometry,
    ) -> OcclusionCheck {
        let hit = cast_ray(viewpoint, anchor_position, scene);
        let recommended_position = if hit.occlusion_factor > ALTERNATIVE_SEARCH_ABOVE {
            find_alternative_position(anchor_position, viewpoint, scene)
        } else {
            None
        };
        let score = hit.visibility();

        OcclusionCheck {
            anchor_position,
            viewpoint,
            distance: anchor_position.distance(viewpoint),
            visible: hit.hit_target,
            score,
            occlusion_factor: hit.occlusion_factor,
            blocking_objects: hit.blocking_objects,
            recommended_position,
            visibility_percentage: score * 100.0,
        }
    }

    /// Site-wide heatmap of eye-height visibility. See [`VisibilityGrid::sample`].
    pub fn visibility_grid(
        &self,
        scene: &SceneGeometry,
        resolution: f64,
    ) -> Result<VisibilityGrid, GridError> {
        VisibilityGrid::sample(scene, resolution)
    }
}

/// Suggestions for a poorly visible anchor. `best` must be a visible sample;
/// the height suggestion only applies when mean occlusion is high.
fn remediation(
    position: DVec3,
    best: Option<&ViewpointSample>,
    average_occlusion: f64,
) -> Vec<Recommendation> {
    let mut recommendations = Vec::with_capacity(2);

    if let Some(best) = best {
        let toward = (best.viewpoint.position - position) * APPROACH_FRACTION;
        recommendations.push(Recommendation {
            kind: RecommendationKind::PositionAdjustment,
            description: "Move anchor towards better visibility".to_string(),
            suggested_position: position + toward,
            expected_improvement: 0.3,
        });
    }

    if average_occlusion > HEIGHT_ADJUST_ABOVE {
        let delta = if position.y < RAISE_BELOW_HEIGHT {
            RAISE_BY
        } else {
            LOWER_BY
        };
        recommendations.push(Recommendation {
            kind: RecommendationKind::HeightAdjustment,
            description: format!("Adjust height by {delta}m"),
            suggested_position: position + DVec3::Y * delta,
            expected_improvement: 0.2,
        });
    }

    recommendations
}

fn find_alternative_position(
    anchor_position: DVec3,
    viewpoint: DVec3,
    scene: &SceneGeometry,
) -> Option<DVec3> {
    let mut best: Option<(DVec3, f64)> = None;

    for i in 0..ALTERNATIVE_ANGLES {
        let angle = TAU * i as f64 / ALTERNATIVE_ANGLES as f64;
        for radius in ALTERNATIVE_RADII {
            let candidate =
                anchor_position + DVec3::new(radius * angle.cos(), 0.0, radius * angle.sin());
            let visibility = cast_ray(viewpoint, candidate, scene).visibility();
            if best.is_none_or(|(_, v)| visibility > v) {
                best = Some((candidate, visibility));
            }
        }
    }

    best.filter(|&(_, v)| v > ALTERNATIVE_MIN_VISIBILITY)
        .map(|(p, _)| p)
}
