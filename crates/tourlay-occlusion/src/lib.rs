//! Occlusion analysis: samples how visible a scene point is from synthetic
//! viewpoints by marching rays through the scene's collision volumes.
//!
//! The entry point is [`OcclusionAnalyzer`]. All operations are pure functions
//! of their inputs and safe to run concurrently against a shared
//! [`SceneGeometry`](tourlay_scene::SceneGeometry).

mod analyzer;
mod grid;
mod ray;
mod viewpoints;

pub use analyzer::{
    OcclusionAnalyzer, OcclusionCheck, OcclusionReport, Recommendation, RecommendationKind,
    ViewpointSample, center_occlusion,
};
pub use grid::{GridCell, GridError, VisibilityGrid};
pub use ray::{BLOCKED_THRESHOLD, RAY_SAMPLES, RayHit, RayTestError, cast_ray, try_cast_ray};
pub use viewpoints::{Ring, Viewpoint, ViewpointPattern, generate_viewpoints};
