//! Overlay geometry: the renderable payload attached to anchors and overlays.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Texture compression preset.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Compression {
    #[default]
    Standard,
    High,
}

/// Texture reference with its nominal resolution.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextureInfo {
    pub name: String,
    pub width: u32,
    pub height: u32,
    #[serde(default)]
    pub compression: Compression,
    #[serde(default = "default_mip_maps")]
    pub mip_maps: bool,
}

fn default_mip_maps() -> bool {
    true
}

impl TextureInfo {
    pub fn new(name: impl Into<String>, width: u32, height: u32) -> Self {
        Self {
            name: name.into(),
            width,
            height,
            compression: Compression::Standard,
            mip_maps: true,
        }
    }

    /// Texel count.
    pub fn area(&self) -> u64 {
        u64::from(self.width) * u64::from(self.height)
    }
}

/// Shading model of a material.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShaderModel {
    #[default]
    Pbr,
    Simple,
    Unlit,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MaterialInfo {
    /// Linear RGB base color.
    pub color: [f32; 3],
    pub shader: ShaderModel,
    pub normal_map: Option<String>,
    pub detail_map: Option<String>,
    pub parallax_map: Option<String>,
}

impl Default for MaterialInfo {
    fn default() -> Self {
        Self {
            color: [1.0, 1.0, 1.0],
            shader: ShaderModel::Pbr,
            normal_map: None,
            detail_map: None,
            parallax_map: None,
        }
    }
}

impl MaterialInfo {
    /// A flat material with the given color and shader.
    pub fn flat(color: [f32; 3], shader: ShaderModel) -> Self {
        Self {
            color,
            shader,
            ..Default::default()
        }
    }
}

/// Triangle mesh with the texture, material and animation references that
/// travel with it.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OverlayGeometry {
    pub vertices: Vec<[f32; 3]>,
    pub faces: Vec<[u32; 3]>,
    pub textures: Vec<TextureInfo>,
    pub materials: BTreeMap<String, MaterialInfo>,
    pub animations: Vec<String>,
}

impl OverlayGeometry {
    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    pub fn triangle_count(&self) -> usize {
        self.faces.len()
    }

    /// Rendering cost estimate used to pick a starting LOD tier.
    ///
    /// `vertices + 3 * faces + texels / 1000 + 100 * animations + 50 * materials`.
    pub fn complexity(&self) -> u64 {
        let texels: u64 = self.textures.iter().map(TextureInfo::area).sum();
        self.vertices.len() as u64
            + 3 * self.faces.len() as u64
            + texels / 1000
            + 100 * self.animations.len() as u64
            + 50 * self.materials.len() as u64
    }

    /// Returns true if every face references an existing vertex.
    pub fn faces_in_range(&self) -> bool {
        let n = self.vertices.len();
        self.faces
            .iter()
            .all(|f| f.iter().all(|&i| (i as usize) < n))
    }

    /// Returns true if all vertex coordinates are finite.
    pub fn is_finite(&self) -> bool {
        self.vertices.iter().flatten().all(|c| c.is_finite())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_complexity_formula() {
        let mut g = OverlayGeometry {
            vertices: vec![[0.0; 3]; 300],
            faces: vec![[0, 1, 2]; 100],
            textures: vec![TextureInfo::new("a", 1024, 1024), TextureInfo::new("b", 10, 10)],
            animations: vec!["idle".into()],
            ..Default::default()
        };
        g.materials.insert("m".into(), MaterialInfo::default());
        // 300 + 300 + (1_048_576 + 100) / 1000 + 100 + 50
        assert_eq!(g.complexity(), 300 + 300 + 1048 + 100 + 50);
    }

    #[test]
    fn test_face_range_check() {
        let mut g = OverlayGeometry {
            vertices: vec![[0.0; 3]; 3],
            faces: vec![[0, 1, 2]],
            ..Default::default()
        };
        assert!(g.faces_in_range());
        g.faces.push([0, 1, 3]);
        assert!(!g.faces_in_range());
    }

    /// Texture fields not given in the input take their defaults.
    #[test]
    fn test_texture_defaults_on_deserialize() {
        let t: TextureInfo = ron::from_str("(name: \"wall\", width: 512, height: 256)").unwrap();
        assert_eq!(t.compression, Compression::Standard);
        assert!(t.mip_maps);
        assert_eq!(t.area(), 131_072);
    }
}
