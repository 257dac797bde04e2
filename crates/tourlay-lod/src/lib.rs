//! Level-of-detail management for overlay geometry: tier selection from
//! content complexity, scene position or live performance, decimation into
//! discrete tiers, and memory statistics.

mod geometry;
mod selector;
mod simplify;
mod statistics;

pub use geometry::{Compression, MaterialInfo, OverlayGeometry, ShaderModel, TextureInfo};
pub use selector::{LodSelector, LodThresholds, PerformanceBudget, position_importance};
pub use simplify::{
    LodVersion, MAX_LOD_LEVELS, detail_level_name, generate_lod_level, generate_lod_versions,
    reduction_factor, texture_scale,
};
pub use statistics::{LevelStatistics, LodStatistics, lod_statistics};
