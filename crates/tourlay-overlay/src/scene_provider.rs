use std::sync::Arc;

use dashmap::DashMap;
use tourlay_scene::{GeometryError, SceneGeometry};

/// Source of scene geometry per site.
pub trait SceneProvider: Send + Sync {
    fn scene(&self, site_id: &str) -> Option<Arc<SceneGeometry>>;
}

/// Provider over a fixed, in-memory set of validated scenes.
#[derive(Default)]
pub struct StaticSceneProvider {
    scenes: DashMap<String, Arc<SceneGeometry>>,
}

impl StaticSceneProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate and register a site's scene, replacing any previous one.
    pub fn insert(
        &self,
        site_id: impl Into<String>,
        scene: SceneGeometry,
    ) -> Result<(), GeometryError> {
        scene.validate()?;
        self.scenes.insert(site_id.into(), Arc::new(scene));
        Ok(())
    }
}

impl SceneProvider for StaticSceneProvider {
    fn scene(&self, site_id: &str) -> Option<Arc<SceneGeometry>> {
        self.scenes.get(site_id).map(|s| Arc::clone(s.value()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::DVec3;
    use tourlay_scene::Aabb;

    #[test]
    fn test_insert_validates() {
        let provider = StaticSceneProvider::new();
        let broken = SceneGeometry::with_bounds(Aabb {
            min: DVec3::new(f64::NAN, 0.0, 0.0),
            max: DVec3::ONE,
        });
        assert!(provider.insert("bad", broken).is_err());
        assert!(provider.scene("bad").is_none());

        provider.insert("abbey", SceneGeometry::default()).unwrap();
        assert!(provider.scene("abbey").is_some());
    }
}
