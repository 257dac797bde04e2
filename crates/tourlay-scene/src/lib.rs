//! Scene-space primitives shared by the placement, occlusion and overlay crates:
//! axis-aligned boxes, the read-only scene geometry supplied per site, and the
//! anchor type taxonomy.

mod aabb;
mod anchor_type;
mod error;
mod scene;

pub use aabb::Aabb;
pub use anchor_type::AnchorType;
pub use error::GeometryError;
pub use scene::{CollisionVolume, SceneGeometry};
