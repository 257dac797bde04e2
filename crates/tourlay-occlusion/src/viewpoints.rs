//! Synthetic viewpoint rings around an anchor.

use std::f64::consts::TAU;

use glam::DVec3;
use serde::{Deserialize, Serialize};
use tourlay_scene::AnchorType;

/// Height of the elevated ring above the anchor, in meters.
const ELEVATED_RING_HEIGHT: f64 = 2.0;

/// Which ring a viewpoint belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Ring {
    /// Full-radius ring at the type's height offset.
    Primary,
    /// Half-radius ring looking down from above.
    Elevated,
}

/// A transient camera position used only to evaluate visibility.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Viewpoint {
    pub position: DVec3,
    pub ring: Ring,
}

/// Sampling parameters for one anchor type.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ViewpointPattern {
    /// Number of viewpoints on the primary ring.
    pub angles: usize,
    /// Primary ring radius in meters.
    pub radius: f64,
    /// Primary ring height relative to the anchor.
    pub height_offset: f64,
}

impl ViewpointPattern {
    /// The pattern used for `anchor_type`. Unknown types mirror hotspots.
    pub fn for_type(anchor_type: &AnchorType) -> Self {
        let (angles, radius, height_offset) = match anchor_type {
            AnchorType::Label => (6, 3.0, 0.2),
            AnchorType::GhostReconstruction => (12, 10.0, 2.0),
            AnchorType::Timeline => (6, 4.0, 0.5),
            _ => (8, 5.0, 0.0),
        };
        Self {
            angles,
            radius,
            height_offset,
        }
    }

    /// Total viewpoints this pattern produces across both rings.
    pub fn viewpoint_count(&self) -> usize {
        self.angles.max(1) + (self.angles / 2).max(1)
    }
}

/// Lay out viewpoints on two horizontal rings around `position`.
///
/// The primary ring has `angles` points at the pattern radius and height
/// offset; the elevated ring has half as many (at least one) at half the
/// radius, 2 m above the anchor.
pub fn generate_viewpoints(position: DVec3, anchor_type: &AnchorType) -> Vec<Viewpoint> {
    let pattern = ViewpointPattern::for_type(anchor_type);
    let mut viewpoints = Vec::with_capacity(pattern.viewpoint_count());

    push_ring(
        &mut viewpoints,
        position,
        pattern.angles.max(1),
        pattern.radius,
        pattern.height_offset,
        Ring::Primary,
    );
    push_ring(
        &mut viewpoints,
        position,
        (pattern.angles / 2).max(1),
        pattern.radius * 0.5,
        ELEVATED_RING_HEIGHT,
        Ring::Elevated,
    );

    viewpoints
}

fn push_ring(
    out: &mut Vec<Viewpoint>,
    center: DVec3,
    count: usize,
    radius: f64,
    height: f64,
    ring: Ring,
) {
    for i in 0..count {
        let angle = TAU * i as f64 / count as f64;
        out.push(Viewpoint {
            position: DVec3::new(
                center.x + radius * angle.cos(),
                center.y + height,
                center.z + radius * angle.sin(),
            ),
            ring,
        });
    }
}
