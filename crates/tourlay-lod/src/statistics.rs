//! Memory estimates across a set of LOD versions.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::simplify::LodVersion;

/// Position, normal and UV.
const BYTES_PER_VERTEX: u64 = 32;
/// Three 32-bit indices.
const BYTES_PER_TRIANGLE: u64 = 12;
/// Flat per-texture allowance.
const BYTES_PER_TEXTURE: u64 = 1024 * 1024;

const MIB: f64 = 1024.0 * 1024.0;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LevelStatistics {
    pub vertices: usize,
    pub triangles: usize,
    pub memory_bytes: u64,
    pub detail_level: String,
}

impl LevelStatistics {
    fn estimate(version: &LodVersion) -> Self {
        let memory_bytes = version.vertex_count as u64 * BYTES_PER_VERTEX
            + version.triangle_count as u64 * BYTES_PER_TRIANGLE
            + version.geometry.textures.len() as u64 * BYTES_PER_TEXTURE;
        Self {
            vertices: version.vertex_count,
            triangles: version.triangle_count,
            memory_bytes,
            detail_level: version.detail_level.clone(),
        }
    }
}

/// Totals over every tier of one overlay.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct LodStatistics {
    pub lod_count: usize,
    pub total_vertices: usize,
    pub total_triangles: usize,
    pub memory_bytes: u64,
    pub breakdown: BTreeMap<u8, LevelStatistics>,
}

impl LodStatistics {
    pub fn memory_usage_mb(&self) -> f64 {
        self.memory_bytes as f64 / MIB
    }
}

pub fn lod_statistics(versions: &BTreeMap<u8, LodVersion>) -> LodStatistics {
    let mut stats = LodStatistics {
        lod_count: versions.len(),
        ..Default::default()
    };
    for (&level, version) in versions {
        let level_stats = LevelStatistics::estimate(version);
        stats.total_vertices += level_stats.vertices;
        stats.total_triangles += level_stats.triangles;
        stats.memory_bytes += level_stats.memory_bytes;
        stats.breakdown.insert(level, level_stats);
    }
    stats
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{OverlayGeometry, TextureInfo};
    use crate::simplify::generate_lod_versions;

    #[test]
    fn test_statistics_totals() {
        let geometry = OverlayGeometry {
            vertices: vec![[0.0; 3]; 100],
            faces: vec![[0, 1, 2]; 60],
            textures: vec![TextureInfo::new("t", 512, 512)],
            ..Default::default()
        };
        let stats = lod_statistics(&generate_lod_versions(&geometry, 2));
        assert_eq!(stats.lod_count, 2);
        assert_eq!(stats.total_vertices, 150);
        assert_eq!(stats.total_triangles, 90);

        let level0 = &stats.breakdown[&0];
        assert_eq!(level0.memory_bytes, 100 * 32 + 60 * 12 + 1024 * 1024);
        assert_eq!(level0.detail_level, "high");
        assert_eq!(
            stats.memory_bytes,
            stats.breakdown.values().map(|l| l.memory_bytes).sum::<u64>()
        );
        assert!(stats.memory_usage_mb() > 2.0);
    }

    #[test]
    fn test_empty_statistics() {
        let stats = lod_statistics(&BTreeMap::new());
        assert_eq!(stats, LodStatistics::default());
        assert_eq!(stats.memory_usage_mb(), 0.0);
    }
}
