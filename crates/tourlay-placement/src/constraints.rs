//! Per-type placement constraints and caller overrides.

use serde::{Deserialize, Serialize};
use tourlay_scene::AnchorType;

/// Constraint set applied while solving one anchor's position.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct PlacementConstraints {
    pub min_height: f64,
    pub max_height: f64,
    /// Height the cost pulls toward.
    pub preferred_height: f64,
    pub min_wall_distance: f64,
    /// Horizontal arc, in degrees, the anchor should be visible from.
    pub visibility_angle: f64,
    /// Minimum distance to neighboring anchors. `None` for types without a
    /// spacing rule.
    pub min_spacing: Option<f64>,
}

impl Default for PlacementConstraints {
    /// The set used for unrecognized anchor types.
    fn default() -> Self {
        Self {
            min_height: 0.5,
            max_height: 10.0,
            preferred_height: 1.8,
            min_wall_distance: 0.5,
            visibility_angle: 120.0,
            min_spacing: None,
        }
    }
}

impl PlacementConstraints {
    /// Base constraints for `anchor_type`.
    pub fn for_type(anchor_type: &AnchorType) -> Self {
        let base = Self::default();
        match anchor_type {
            AnchorType::Hotspot => Self {
                preferred_height: 1.5,
                visibility_angle: 360.0,
                min_spacing: Some(3.0),
                ..base
            },
            AnchorType::Label => Self {
                preferred_height: 2.0,
                visibility_angle: 180.0,
                min_spacing: Some(1.0),
                ..base
            },
            AnchorType::GhostReconstruction => Self {
                min_height: 0.0,
                max_height: 20.0,
                preferred_height: 0.0,
                min_spacing: Some(5.0),
                ..base
            },
            AnchorType::Timeline => Self {
                preferred_height: 1.0,
                visibility_angle: 270.0,
                min_spacing: Some(2.0),
                ..base
            },
            AnchorType::Heatmap | AnchorType::Other(_) => base,
        }
    }

    /// Base constraints for `anchor_type` with `overrides` applied on top.
    pub fn resolve(anchor_type: &AnchorType, overrides: Option<&ConstraintOverrides>) -> Self {
        let base = Self::for_type(anchor_type);
        match overrides {
            Some(o) => base.with_overrides(o),
            None => base,
        }
    }

    /// Replace every field the overrides set.
    pub fn with_overrides(self, overrides: &ConstraintOverrides) -> Self {
        Self {
            min_height: overrides.min_height.unwrap_or(self.min_height),
            max_height: overrides.max_height.unwrap_or(self.max_height),
            preferred_height: overrides.preferred_height.unwrap_or(self.preferred_height),
            min_wall_distance: overrides.min_wall_distance.unwrap_or(self.min_wall_distance),
            visibility_angle: overrides.visibility_angle.unwrap_or(self.visibility_angle),
            min_spacing: overrides.min_spacing.or(self.min_spacing),
        }
    }

    /// Spacing threshold for pair penalties; zero when the type has no rule.
    pub fn spacing(&self) -> f64 {
        self.min_spacing.unwrap_or(0.0)
    }
}

/// Caller-supplied replacements for individual constraint fields.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConstraintOverrides {
    pub min_height: Option<f64>,
    pub max_height: Option<f64>,
    pub preferred_height: Option<f64>,
    pub min_wall_distance: Option<f64>,
    pub visibility_angle: Option<f64>,
    pub min_spacing: Option<f64>,
}

impl ConstraintOverrides {
    /// Returns true if any override is NaN or infinite.
    pub fn has_non_finite(&self) -> bool {
        [
            self.min_height,
            self.max_height,
            self.preferred_height,
            self.min_wall_distance,
            self.visibility_angle,
            self.min_spacing,
        ]
        .into_iter()
        .flatten()
        .any(|v| !v.is_finite())
    }
}
