//! Decimation of overlay geometry into discrete LOD tiers.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::geometry::{Compression, MaterialInfo, OverlayGeometry, ShaderModel, TextureInfo};

/// Most tiers [`generate_lod_versions`] produces (levels 0 through 4).
pub const MAX_LOD_LEVELS: u8 = 5;

/// Smallest edge a downscaled texture is reduced to.
const MIN_TEXTURE_SIZE: u32 = 64;
/// Animations kept from level 2 on.
const MAX_REDUCED_ANIMATIONS: usize = 2;

/// Share of the original geometry a level keeps.
pub fn reduction_factor(level: u8) -> f64 {
    match level {
        0 => 1.0,
        1 => 0.6,
        2 => 0.3,
        3 => 0.15,
        4 => 0.05,
        _ => 0.3,
    }
}

/// Texture edge scale for a level.
pub fn texture_scale(level: u8) -> f64 {
    match level {
        0 => 1.0,
        1 => 0.5,
        2 => 0.25,
        3 => 0.125,
        4 => 0.0625,
        _ => 0.5,
    }
}

pub fn detail_level_name(level: u8) -> &'static str {
    match level {
        0 => "high",
        1 => "medium",
        2 => "low",
        3 => "very_low",
        4 => "minimal",
        _ => "medium",
    }
}

/// One derived tier of an overlay's geometry.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LodVersion {
    pub level: u8,
    pub vertex_count: usize,
    pub triangle_count: usize,
    pub detail_level: String,
    pub reduction_factor: f64,
    pub geometry: OverlayGeometry,
}

impl LodVersion {
    fn from_geometry(level: u8, geometry: OverlayGeometry) -> Self {
        Self {
            level,
            vertex_count: geometry.vertex_count(),
            triangle_count: geometry.triangle_count(),
            detail_level: detail_level_name(level).to_string(),
            reduction_factor: reduction_factor(level),
            geometry,
        }
    }
}

/// Build a single tier. Level 0 is an unmodified copy.
pub fn generate_lod_level(geometry: &OverlayGeometry, level: u8) -> LodVersion {
    if level == 0 {
        return LodVersion::from_geometry(0, geometry.clone());
    }
    LodVersion::from_geometry(level, simplify(geometry, level))
}

/// Build tiers `0..levels`. At least level 0 is always produced, and the
/// count is capped at [`MAX_LOD_LEVELS`].
pub fn generate_lod_versions(geometry: &OverlayGeometry, levels: u8) -> BTreeMap<u8, LodVersion> {
    if levels > MAX_LOD_LEVELS {
        tracing::warn!("requested {levels} LOD levels, capping at {MAX_LOD_LEVELS}");
    }
    let levels = levels.clamp(1, MAX_LOD_LEVELS);

    let versions: BTreeMap<u8, LodVersion> = (0..levels)
        .map(|level| (level, generate_lod_level(geometry, level)))
        .collect();

    tracing::debug!(
        "generated {} LOD levels from {} vertices",
        versions.len(),
        geometry.vertex_count()
    );
    versions
}

fn stride(level: u8) -> usize {
    ((1.0 / reduction_factor(level)).round() as usize).max(1)
}

fn simplify(geometry: &OverlayGeometry, level: u8) -> OverlayGeometry {
    let step = stride(level);

    let vertices: Vec<[f32; 3]> = geometry.vertices.iter().step_by(step).copied().collect();
    // Kept vertex k was original vertex k * step; faces point at the nearest
    // kept vertex at or below their original index.
    let last = vertices.len().saturating_sub(1) as u32;
    let faces: Vec<[u32; 3]> = if vertices.is_empty() {
        Vec::new()
    } else {
        geometry
            .faces
            .iter()
            .step_by(step)
            .map(|f| f.map(|i| (i / step as u32).min(last)))
            .collect()
    };

    let textures = geometry
        .textures
        .iter()
        .map(|t| simplify_texture(t, level))
        .collect();

    let materials = geometry
        .materials
        .iter()
        .map(|(name, m)| (name.clone(), simplify_material(m, level)))
        .collect();

    let mut animations = geometry.animations.clone();
    if level >= 2 {
        animations.truncate(MAX_REDUCED_ANIMATIONS);
    }

    OverlayGeometry {
        vertices,
        faces,
        textures,
        materials,
        animations,
    }
}

fn scale_edge(edge: u32, scale: f64) -> u32 {
    let scaled = (f64::from(edge) * scale) as u32;
    scaled.max(MIN_TEXTURE_SIZE).min(edge)
}

fn simplify_texture(texture: &TextureInfo, level: u8) -> TextureInfo {
    let scale = texture_scale(level);
    let mut out = TextureInfo {
        width: scale_edge(texture.width, scale),
        height: scale_edge(texture.height, scale),
        ..texture.clone()
    };
    if level >= 2 {
        out.compression = Compression::High;
        out.mip_maps = false;
    }
    out
}

fn simplify_material(material: &MaterialInfo, level: u8) -> MaterialInfo {
    if level >= 3 {
        return MaterialInfo::flat(material.color, ShaderModel::Unlit);
    }
    if level >= 2 {
        return MaterialInfo {
            shader: ShaderModel::Simple,
            normal_map: None,
            detail_map: None,
            parallax_map: None,
            ..material.clone()
        };
    }
    material.clone()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mesh(vertices: usize, faces: usize) -> OverlayGeometry {
        let mut g = OverlayGeometry {
            vertices: (0..vertices).map(|i| [i as f32, 0.0, 0.0]).collect(),
            faces: (0..faces)
                .map(|i| {
                    let i = (i % vertices.saturating_sub(2).max(1)) as u32;
                    [i, i + 1, i + 2]
                })
                .collect(),
            textures: vec![
                TextureInfo::new("albedo", 2048, 1024),
                TextureInfo::new("icon", 48, 48),
            ],
            animations: vec!["spin".into(), "pulse".into(), "fade".into()],
            ..Default::default()
        };
        g.materials.insert(
            "stone".into(),
            MaterialInfo {
                color: [0.5, 0.4, 0.3],
                shader: ShaderModel::Pbr,
                normal_map: Some("stone_n".into()),
                detail_map: Some("stone_d".into()),
                parallax_map: Some("stone_p".into()),
            },
        );
        g
    }

    #[test]
    fn test_reduction_factors_strictly_decrease() {
        let factors: Vec<f64> = (1..=4).map(reduction_factor).collect();
        assert!(factors.windows(2).all(|w| w[0] > w[1]));
        assert_eq!(reduction_factor(9), 0.3);
    }

    #[test]
    fn test_strides() {
        assert_eq!((1..=4).map(stride).collect::<Vec<_>>(), vec![2, 3, 7, 20]);
    }

    #[test]
    fn test_four_levels_non_increasing_counts() {
        let versions = generate_lod_versions(&mesh(1000, 900), 4);
        assert_eq!(versions.keys().copied().collect::<Vec<_>>(), vec![0, 1, 2, 3]);
        let counts: Vec<usize> = versions.values().map(|v| v.vertex_count).collect();
        assert!(counts.windows(2).all(|w| w[0] >= w[1]));
        let tris: Vec<usize> = versions.values().map(|v| v.triangle_count).collect();
        assert!(tris.windows(2).all(|w| w[0] >= w[1]));
        assert_eq!(counts, vec![1000, 500, 334, 143]);
    }

    #[test]
    fn test_level_zero_is_identity() {
        let g = mesh(30, 20);
        let v = generate_lod_level(&g, 0);
        assert_eq!(v.geometry, g);
        assert_eq!(v.detail_level, "high");
        assert_eq!(v.reduction_factor, 1.0);
    }

    #[test]
    fn test_level_count_capped() {
        let versions = generate_lod_versions(&mesh(10, 5), 9);
        assert_eq!(versions.len(), 5);
        assert_eq!(versions[&4].detail_level, "minimal");
        assert_eq!(generate_lod_versions(&mesh(10, 5), 0).len(), 1);
    }

    #[test]
    fn test_faces_stay_in_range() {
        for level in 1..=4 {
            let v = generate_lod_level(&mesh(101, 99), level);
            assert!(v.geometry.faces_in_range(), "level {level}");
        }
    }

    #[test]
    fn test_textures_scaled_with_floor() {
        let g = mesh(10, 5);
        let l1 = generate_lod_level(&g, 1).geometry;
        assert_eq!((l1.textures[0].width, l1.textures[0].height), (1024, 512));
        assert!(l1.textures[0].mip_maps);
        // Never upscaled past the source size.
        assert_eq!(l1.textures[1].width, 48);

        let l3 = generate_lod_level(&g, 3).geometry;
        assert_eq!((l3.textures[0].width, l3.textures[0].height), (256, 128));
        let l4 = generate_lod_level(&g, 4).geometry;
        assert_eq!((l4.textures[0].width, l4.textures[0].height), (128, 64));
    }

    /// Level 2 strips expensive material features and keeps two animations.
    #[test]
    fn test_level_two_reductions() {
        let l2 = generate_lod_level(&mesh(10, 5), 2).geometry;
        let stone = &l2.materials["stone"];
        assert_eq!(stone.shader, ShaderModel::Simple);
        assert!(stone.normal_map.is_none());
        assert!(stone.detail_map.is_none());
        assert!(stone.parallax_map.is_none());
        assert_eq!(stone.color, [0.5, 0.4, 0.3]);
        assert_eq!(l2.animations, vec!["spin".to_string(), "pulse".to_string()]);
        assert!(l2.textures.iter().all(|t| t.compression == Compression::High && !t.mip_maps));
    }

    #[test]
    fn test_level_three_flat_unlit() {
        let l3 = generate_lod_level(&mesh(10, 5), 3).geometry;
        assert_eq!(
            l3.materials["stone"],
            MaterialInfo::flat([0.5, 0.4, 0.3], ShaderModel::Unlit)
        );
    }

    #[test]
    fn test_empty_geometry() {
        let versions = generate_lod_versions(&OverlayGeometry::default(), 3);
        assert!(versions.values().all(|v| v.vertex_count == 0 && v.triangle_count == 0));
    }
}
