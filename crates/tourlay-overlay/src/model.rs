//! Anchor and overlay records, their content, and the request/response types
//! crossing the coordinator boundary.

use std::collections::BTreeMap;
use std::fmt;

use glam::{DQuat, DVec3};
use serde::{Deserialize, Serialize};
use tourlay_lod::{LodStatistics, LodVersion, OverlayGeometry};
use tourlay_occlusion::{OcclusionCheck, OcclusionReport, Recommendation};
use tourlay_placement::{ConstraintOverrides, LayoutIssue, PlacementOutcome};
use tourlay_scene::AnchorType;
use uuid::Uuid;

/// Name recorded in anchor metadata for the placement method.
pub const PLACEMENT_ALGORITHM: &str = "constraint_solver_v1";

macro_rules! record_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub Uuid);

        impl $name {
            /// A fresh random id.
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                fmt::Display::fmt(&self.0, f)
            }
        }
    };
}

record_id!(
    /// Identifier of an [`Anchor`].
    AnchorId
);
record_id!(
    /// Identifier of an [`Overlay`].
    OverlayId
);

/// One entry on a timeline anchor.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TimelineEntry {
    pub date: String,
    pub title: String,
}

/// Type-specific anchor payload.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ContentBody {
    Hotspot {
        title: String,
        #[serde(default)]
        description: String,
        #[serde(default)]
        media: Vec<String>,
    },
    Label {
        text: String,
    },
    GhostReconstruction {
        #[serde(default)]
        time_period: Option<String>,
    },
    Timeline {
        #[serde(default)]
        entries: Vec<TimelineEntry>,
    },
    /// No payload; valid for every type.
    #[default]
    Empty,
}

impl ContentBody {
    /// Returns true if this body may be attached to `anchor_type`.
    pub fn matches(&self, anchor_type: &AnchorType) -> bool {
        matches!(
            (self, anchor_type),
            (ContentBody::Empty, _)
                | (ContentBody::Hotspot { .. }, AnchorType::Hotspot)
                | (ContentBody::Label { .. }, AnchorType::Label)
                | (ContentBody::GhostReconstruction { .. }, AnchorType::GhostReconstruction)
                | (ContentBody::Timeline { .. }, AnchorType::Timeline)
        )
    }
}

/// Anchor content: a typed body plus an optional 3D model.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnchorContent {
    pub body: ContentBody,
    pub model: Option<OverlayGeometry>,
}

impl AnchorContent {
    /// Check the body against the anchor type and the model's structure.
    pub fn validate(&self, anchor_type: &AnchorType) -> Result<(), String> {
        if !self.body.matches(anchor_type) {
            return Err(format!("content does not match anchor type {anchor_type}"));
        }
        if let Some(model) = &self.model {
            if !model.is_finite() {
                return Err("content model has non-finite vertices".to_string());
            }
            if !model.faces_in_range() {
                return Err("content model face references a missing vertex".to_string());
            }
        }
        Ok(())
    }

    /// Rendering complexity of the attached model; zero without one.
    pub fn complexity(&self) -> u64 {
        self.model.as_ref().map_or(0, OverlayGeometry::complexity)
    }
}

/// Condensed occlusion analysis kept with an anchor.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OcclusionSummary {
    pub visibility_percentage: f64,
    pub average_occlusion: f64,
    pub recommendations: Vec<Recommendation>,
}

impl From<&OcclusionReport> for OcclusionSummary {
    fn from(report: &OcclusionReport) -> Self {
        Self {
            visibility_percentage: report.visibility_percentage,
            average_occlusion: report.average_occlusion,
            recommendations: report.recommendations.clone(),
        }
    }
}

/// Placement diagnostics and caller attributes attached to an anchor.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnchorMetadata {
    pub occlusion: Option<OcclusionSummary>,
    pub placement_outcome: Option<PlacementOutcome>,
    pub placement_algorithm: String,
    pub last_optimized_unix_ms: Option<u64>,
    /// Set when the last batch solve could not move this anchor.
    pub optimization_issue: Option<LayoutIssue>,
    /// Set on a batch result when the store refused this anchor's update;
    /// the anchor keeps its prior record.
    pub persist_error: Option<String>,
    pub attributes: BTreeMap<String, String>,
}

impl Default for AnchorMetadata {
    fn default() -> Self {
        Self {
            occlusion: None,
            placement_outcome: None,
            placement_algorithm: PLACEMENT_ALGORITHM.to_string(),
            last_optimized_unix_ms: None,
            optimization_issue: None,
            persist_error: None,
            attributes: BTreeMap::new(),
        }
    }
}

/// A placed piece of overlay content.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Anchor {
    pub id: AnchorId,
    pub tenant_id: String,
    pub site_id: String,
    pub anchor_type: AnchorType,
    /// Always inside the site's scene bounds.
    pub position: DVec3,
    pub rotation: DQuat,
    pub scale: DVec3,
    pub content: AnchorContent,
    pub occlusion_score: f64,
    pub lod_level: u8,
    /// Where the anchor was requested; batch solves pull toward it.
    pub original_position: DVec3,
    pub metadata: AnchorMetadata,
    pub created_unix_ms: u64,
    pub updated_unix_ms: u64,
}

/// Presentation built from a set of anchors.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum OverlayType {
    Heatmap,
    Timeline,
    Route,
    Other(String),
}

impl OverlayType {
    pub fn as_str(&self) -> &str {
        match self {
            OverlayType::Heatmap => "heatmap",
            OverlayType::Timeline => "timeline",
            OverlayType::Route => "route",
            OverlayType::Other(name) => name,
        }
    }
}

impl From<&str> for OverlayType {
    fn from(name: &str) -> Self {
        match name {
            "heatmap" => OverlayType::Heatmap,
            "timeline" => OverlayType::Timeline,
            "route" => OverlayType::Route,
            other => OverlayType::Other(other.to_string()),
        }
    }
}

impl From<String> for OverlayType {
    fn from(name: String) -> Self {
        OverlayType::from(name.as_str())
    }
}

impl From<OverlayType> for String {
    fn from(overlay_type: OverlayType) -> Self {
        match overlay_type {
            OverlayType::Other(name) => name,
            known => known.as_str().to_string(),
        }
    }
}

impl fmt::Display for OverlayType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Presentation parameters for overlay construction.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OverlayParameters {
    /// Ribbon width or heatmap quad edge, in meters.
    pub width: f64,
    pub attributes: BTreeMap<String, String>,
}

impl Default for OverlayParameters {
    fn default() -> Self {
        Self {
            width: 1.0,
            attributes: BTreeMap::new(),
        }
    }
}

/// Overlay geometry with every generated LOD tier.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Overlay {
    pub id: OverlayId,
    pub tenant_id: String,
    pub site_id: String,
    pub overlay_type: OverlayType,
    pub anchor_ids: Vec<AnchorId>,
    pub parameters: OverlayParameters,
    /// Level 0 is the geometry as built.
    pub lod_versions: BTreeMap<u8, LodVersion>,
    pub statistics: LodStatistics,
    pub created_unix_ms: u64,
}

/// Request to place a new anchor.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PlacementRequest {
    pub tenant_id: String,
    pub site_id: String,
    pub anchor_type: AnchorType,
    pub position: DVec3,
    #[serde(default = "identity_rotation")]
    pub rotation: DQuat,
    #[serde(default = "unit_scale")]
    pub scale: DVec3,
    #[serde(default)]
    pub content: AnchorContent,
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
    #[serde(default)]
    pub constraints: Option<ConstraintOverrides>,
}

fn identity_rotation() -> DQuat {
    DQuat::IDENTITY
}

fn unit_scale() -> DVec3 {
    DVec3::ONE
}

impl PlacementRequest {
    /// A request with default rotation, scale and content.
    pub fn new(
        tenant_id: impl Into<String>,
        site_id: impl Into<String>,
        anchor_type: AnchorType,
        position: DVec3,
    ) -> Self {
        Self {
            tenant_id: tenant_id.into(),
            site_id: site_id.into(),
            anchor_type,
            position,
            rotation: DQuat::IDENTITY,
            scale: DVec3::ONE,
            content: AnchorContent::default(),
            metadata: BTreeMap::new(),
            constraints: None,
        }
    }
}

/// Request to jointly re-optimize existing anchors on one site.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BatchOptimizeRequest {
    pub site_id: String,
    pub tenant_id: String,
    pub anchor_ids: Vec<AnchorId>,
}

/// Request to build an overlay from existing anchors.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OverlayRequest {
    pub site_id: String,
    pub tenant_id: String,
    pub overlay_type: OverlayType,
    pub anchor_ids: Vec<AnchorId>,
    #[serde(default)]
    pub parameters: OverlayParameters,
    /// Number of LOD tiers; the coordinator default when absent.
    #[serde(default)]
    pub lod_levels: Option<u8>,
}

/// Result of a batch re-optimization.
#[derive(Clone, Debug, PartialEq)]
pub struct BatchOptimizeResult {
    pub anchors: Vec<Anchor>,
    /// Anchors that took part in the solve and were updated.
    pub optimized_count: usize,
    pub outcome: PlacementOutcome,
}

/// Answer to an occlusion query against a stored anchor.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OcclusionQueryResult {
    pub anchor_id: AnchorId,
    /// Visibility score, `1 - occlusion factor`.
    pub occlusion_score: f64,
    pub is_visible: bool,
    pub blocking_objects: Vec<String>,
    pub recommended_position: Option<DVec3>,
    pub visibility_percentage: f64,
}

impl OcclusionQueryResult {
    pub(crate) fn from_check(anchor_id: AnchorId, check: OcclusionCheck) -> Self {
        Self {
            anchor_id,
            occlusion_score: check.score,
            is_visible: check.visible,
            blocking_objects: check.blocking_objects,
            recommended_position: check.recommended_position,
            visibility_percentage: check.visibility_percentage,
        }
    }
}

/// Requested LOD tier of an overlay.
pub type OverlayLod = LodVersion;
