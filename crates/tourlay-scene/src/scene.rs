//! Read-only scene geometry supplied by the scene provider for each site.

use glam::DVec3;
use serde::{Deserialize, Serialize};

use crate::aabb::Aabb;
use crate::error::GeometryError;

/// Collision volumes at or beyond this count saturate the scene's
/// geometry-complexity factor at 1.0.
const COMPLEXITY_SATURATION: f64 = 100.0;

/// An axis-aligned region standing in for solid scene geometry during
/// occlusion and containment tests.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CollisionVolume {
    /// Optional human-readable name (e.g. "north_wall").
    #[serde(default)]
    pub name: Option<String>,
    /// The volume's bounding box.
    pub bounds: Aabb,
}

impl CollisionVolume {
    /// Create an unnamed volume.
    pub fn new(bounds: Aabb) -> Self {
        Self { name: None, bounds }
    }

    /// Create a named volume.
    pub fn named(name: impl Into<String>, bounds: Aabb) -> Self {
        Self {
            name: Some(name.into()),
            bounds,
        }
    }

    /// Identifier used when reporting this volume as a blocker.
    ///
    /// Falls back to `collision_volume_{index}` for unnamed volumes.
    pub fn label(&self, index: usize) -> String {
        match &self.name {
            Some(name) => name.clone(),
            None => format!("collision_volume_{index}"),
        }
    }
}

/// Scene geometry for one site.
///
/// Immutable for the duration of any solve; shared across worker threads
/// behind an `Arc`.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SceneGeometry {
    /// Mesh vertex positions.
    pub vertices: Vec<DVec3>,
    /// Triangle faces as vertex index triples.
    pub faces: Vec<[u32; 3]>,
    /// Site bounds; every anchor position must stay inside.
    pub bounds: Aabb,
    /// Coarse solid regions used for ray blocking.
    pub collision_volumes: Vec<CollisionVolume>,
}

impl SceneGeometry {
    /// Create an empty scene with the given bounds.
    pub fn with_bounds(bounds: Aabb) -> Self {
        Self {
            bounds,
            ..Default::default()
        }
    }

    /// Builder-style helper that appends a collision volume.
    pub fn with_volume(mut self, volume: CollisionVolume) -> Self {
        self.collision_volumes.push(volume);
        self
    }

    /// Check the structural invariants the solvers rely on.
    pub fn validate(&self) -> Result<(), GeometryError> {
        if !self.bounds.is_well_formed() {
            return Err(GeometryError::MalformedBounds {
                min: self.bounds.min.to_array(),
                max: self.bounds.max.to_array(),
            });
        }
        if let Some(index) = self
            .collision_volumes
            .iter()
            .position(|v| !v.bounds.is_well_formed())
        {
            return Err(GeometryError::MalformedVolume { index });
        }
        let vertex_count = self.vertices.len();
        for (face, indices) in self.faces.iter().enumerate() {
            if let Some(&vertex) = indices.iter().find(|&&i| i as usize >= vertex_count) {
                return Err(GeometryError::FaceIndexOutOfRange {
                    face,
                    vertex,
                    vertex_count,
                });
            }
        }
        Ok(())
    }

    /// Returns true if the position lies inside the site bounds.
    pub fn contains(&self, position: DVec3) -> bool {
        self.bounds.contains_point(position)
    }

    /// Iterate over the collision volumes that contain `point`, with their indices.
    pub fn volumes_containing(
        &self,
        point: DVec3,
    ) -> impl Iterator<Item = (usize, &CollisionVolume)> {
        self.collision_volumes
            .iter()
            .enumerate()
            .filter(move |(_, v)| v.bounds.contains_point(point))
    }

    /// Normalized scene clutter in `[0, 1]`, derived from the collision volume count.
    pub fn geometry_complexity(&self) -> f64 {
        (self.collision_volumes.len() as f64 / COMPLEXITY_SATURATION).min(1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pillar() -> CollisionVolume {
        CollisionVolume::named(
            "pillar",
            Aabb::new(DVec3::new(-1.0, 0.0, -1.0), DVec3::new(1.0, 4.0, 1.0)),
        )
    }

    #[test]
    fn test_default_scene_uses_default_site_bounds() {
        let scene = SceneGeometry::default();
        assert_eq!(scene.bounds, Aabb::default_site());
        assert!(scene.validate().is_ok());
    }

    #[test]
    fn test_volumes_containing_reports_indices() {
        let scene = SceneGeometry::default()
            .with_volume(CollisionVolume::new(Aabb::new(
                DVec3::splat(20.0),
                DVec3::splat(21.0),
            )))
            .with_volume(pillar());
        let hits: Vec<_> = scene
            .volumes_containing(DVec3::new(0.0, 2.0, 0.0))
            .map(|(i, _)| i)
            .collect();
        assert_eq!(hits, vec![1]);
    }

    #[test]
    fn test_label_falls_back_to_index() {
        let unnamed = CollisionVolume::new(Aabb::default_site());
        assert_eq!(unnamed.label(3), "collision_volume_3");
        assert_eq!(pillar().label(0), "pillar");
    }

    #[test]
    fn test_geometry_complexity_saturates() {
        let mut scene = SceneGeometry::default();
        assert_eq!(scene.geometry_complexity(), 0.0);
        for _ in 0..50 {
            scene.collision_volumes.push(pillar());
        }
        assert!((scene.geometry_complexity() - 0.5).abs() < 1e-12);
        for _ in 0..100 {
            scene.collision_volumes.push(pillar());
        }
        assert_eq!(scene.geometry_complexity(), 1.0);
    }

    #[test]
    fn test_validate_rejects_bad_face_index() {
        let scene = SceneGeometry {
            vertices: vec![DVec3::ZERO, DVec3::X, DVec3::Y],
            faces: vec![[0, 1, 2], [0, 1, 7]],
            ..Default::default()
        };
        assert_eq!(
            scene.validate(),
            Err(GeometryError::FaceIndexOutOfRange {
                face: 1,
                vertex: 7,
                vertex_count: 3
            })
        );
    }

    #[test]
    fn test_validate_rejects_inverted_volume() {
        let mut scene = SceneGeometry::default().with_volume(pillar());
        scene.collision_volumes.push(CollisionVolume::new(Aabb {
            min: DVec3::ONE,
            max: DVec3::ZERO,
        }));
        assert_eq!(
            scene.validate(),
            Err(GeometryError::MalformedVolume { index: 1 })
        );
    }

    /// Missing fields in a serialized scene fall back to defaults.
    #[test]
    fn test_deserialize_partial_scene() {
        let ron_str = "(collision_volumes: [(bounds: (min: (0.0, 0.0, 0.0), max: (1.0, 1.0, 1.0)))])";
        let scene: SceneGeometry = ron::from_str(ron_str).unwrap();
        assert_eq!(scene.bounds, Aabb::default_site());
        assert_eq!(scene.collision_volumes.len(), 1);
        assert!(scene.collision_volumes[0].name.is_none());
    }
}
