//! LOD tier selection from anchor type, content complexity, scene position
//! and live performance signals.

use glam::DVec3;
use serde::{Deserialize, Serialize};
use tourlay_scene::AnchorType;

/// Coarsest tier [`LodSelector::calculate_lod`] returns.
const STATIC_MAX_LOD: u8 = 2;
/// Coarsest tier [`LodSelector::calculate_dynamic_lod`] returns.
const DYNAMIC_MAX_LOD: u8 = 4;
const EYE_LEVEL: f64 = 1.7;

/// Ordered distance (or complexity) boundaries between LOD levels.
#[derive(Clone, Debug, PartialEq)]
pub struct LodThresholds {
    /// `thresholds[i]` is the largest value still assigned level `i`.
    /// Values beyond the last boundary get `thresholds.len()`.
    thresholds: Vec<f64>,
}

impl LodThresholds {
    /// Viewer distance boundaries: 5, 15 and 50 meters.
    pub fn default_viewer() -> Self {
        Self {
            thresholds: vec![5.0, 15.0, 50.0],
        }
    }

    /// Content complexity boundaries: 1000, 5000 and 20000.
    pub fn default_complexity() -> Self {
        Self {
            thresholds: vec![1000.0, 5000.0, 20000.0],
        }
    }

    pub fn max_lod(&self) -> u8 {
        self.thresholds.len() as u8
    }

    pub fn thresholds(&self) -> &[f64] {
        &self.thresholds
    }

    /// Level for `value`: the first boundary it does not exceed.
    pub fn level_for(&self, value: f64) -> u8 {
        self.thresholds
            .iter()
            .position(|&t| value <= t)
            .map_or(self.max_lod(), |i| i as u8)
    }
}

/// Live rendering load reported by a client.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PerformanceBudget {
    /// GPU utilization in `[0, 1]`.
    pub gpu_usage: f64,
    pub frame_time_ms: f64,
}

impl Default for PerformanceBudget {
    fn default() -> Self {
        Self {
            gpu_usage: 0.5,
            frame_time_ms: 16.0,
        }
    }
}

impl PerformanceBudget {
    fn is_strained(&self) -> bool {
        self.gpu_usage > 0.8 || self.frame_time_ms > 20.0
    }

    fn has_headroom(&self) -> bool {
        self.gpu_usage < 0.4 && self.frame_time_ms < 12.0
    }
}

/// Importance of a scene position in `[0, 1]`: high near the origin and at
/// eye level.
pub fn position_importance(position: DVec3) -> f64 {
    let center = (1.0 - position.length() / 20.0).max(0.0);
    let height = (1.0 - (position.y - EYE_LEVEL).abs() / 5.0).max(0.0);
    (0.6 * center + 0.4 * height).clamp(0.0, 1.0)
}

/// Picks LOD tiers. Level 0 is full detail.
#[derive(Clone, Debug)]
pub struct LodSelector {
    viewer: LodThresholds,
    complexity: LodThresholds,
}

impl Default for LodSelector {
    fn default() -> Self {
        Self::new(LodThresholds::default_viewer())
    }
}

impl LodSelector {
    /// Create a selector with the given viewer distance thresholds.
    pub fn new(viewer: LodThresholds) -> Self {
        Self {
            viewer,
            complexity: LodThresholds::default_complexity(),
        }
    }

    /// Starting tier for an anchor type before any adjustment.
    pub fn type_base_lod(anchor_type: &AnchorType) -> u8 {
        match anchor_type {
            AnchorType::Hotspot => 0,
            AnchorType::Label | AnchorType::Timeline => 1,
            AnchorType::GhostReconstruction | AnchorType::Heatmap => 2,
            AnchorType::Other(_) => 1,
        }
    }

    /// Static tier in `0..=2` for a newly placed anchor.
    ///
    /// Complex content raises the floor, and the position's importance nudges
    /// the tier by one in either direction.
    pub fn calculate_lod(&self, position: DVec3, anchor_type: &AnchorType, complexity: u64) -> u8 {
        let mut lod = Self::type_base_lod(anchor_type);

        // Level 0 of the complexity scale imposes no floor.
        let floor = self.complexity.level_for(complexity as f64).saturating_sub(1);
        lod = lod.max(floor.min(STATIC_MAX_LOD));

        let importance = position_importance(position);
        if importance > 0.8 {
            lod = lod.saturating_sub(1);
        } else if importance < 0.3 {
            lod = (lod + 1).min(STATIC_MAX_LOD);
        }
        lod
    }

    /// Tier in `0..=4` from viewer distance, shifted by one when the client
    /// is strained or has headroom.
    pub fn calculate_dynamic_lod(
        &self,
        anchor_position: DVec3,
        viewer_position: DVec3,
        budget: &PerformanceBudget,
    ) -> u8 {
        let distance = anchor_position.distance(viewer_position);
        let lod = if distance.is_finite() {
            self.viewer.level_for(distance)
        } else {
            self.viewer.max_lod()
        }
        .min(DYNAMIC_MAX_LOD);

        if budget.is_strained() {
            (lod + 1).min(DYNAMIC_MAX_LOD)
        } else if budget.has_headroom() {
            lod.saturating_sub(1)
        } else {
            lod
        }
    }
}
