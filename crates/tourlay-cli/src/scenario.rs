//! Scenario files: a site's scene plus a sequence of placement, batch and
//! overlay requests, replayed through an in-memory coordinator.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use glam::DVec3;
use serde::{Deserialize, Serialize};
use tourlay_config::{BusyPolicy, Config};
use tourlay_overlay::{
    Anchor, AnchorContent, AnchorId, BatchOptimizeRequest, BatchOptimizeResult,
    CoordinatorSettings, OcclusionQueryResult, Overlay, OverlayCoordinator, OverlayError,
    OverlayEvent, OverlayParameters, OverlayRequest, OverlayType, PlacementRequest, PoolError,
    SiteBusyPolicy, StaticSceneProvider, WorkerPool, default_thread_count,
};
use tourlay_placement::ConstraintOverrides;
use tourlay_scene::{AnchorType, GeometryError, SceneGeometry};

#[derive(Debug, thiserror::Error)]
pub enum ScenarioError {
    #[error("cannot read scenario {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed scenario: {0}")]
    Parse(#[from] ron::error::SpannedError),
    #[error("scenario scene is invalid: {0}")]
    Scene(#[from] GeometryError),
    #[error("overlay {index} references placement {placement}, which does not exist")]
    UnknownPlacement { index: usize, placement: usize },
    #[error(transparent)]
    Pool(#[from] PoolError),
    #[error(transparent)]
    Overlay(#[from] OverlayError),
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ScenarioPlacement {
    pub anchor_type: AnchorType,
    pub position: DVec3,
    #[serde(default)]
    pub content: AnchorContent,
    #[serde(default)]
    pub constraints: Option<ConstraintOverrides>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ScenarioOverlay {
    pub overlay_type: OverlayType,
    /// Indices into the scenario's placements; empty means all of them.
    #[serde(default)]
    pub anchors: Vec<usize>,
    #[serde(default)]
    pub parameters: OverlayParameters,
    #[serde(default)]
    pub lod_levels: Option<u8>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Scenario {
    pub site_id: String,
    pub tenant_id: String,
    pub scene: SceneGeometry,
    #[serde(default)]
    pub placements: Vec<ScenarioPlacement>,
    /// Jointly re-optimize every placed anchor after placement.
    #[serde(default)]
    pub optimize: bool,
    #[serde(default)]
    pub overlays: Vec<ScenarioOverlay>,
    /// Viewer positions each anchor is checked against.
    #[serde(default)]
    pub viewpoints: Vec<DVec3>,
}

impl Scenario {
    pub fn load(path: &Path) -> Result<Self, ScenarioError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ScenarioError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(ron::from_str(&contents)?)
    }
}

/// Everything a scenario run produced.
#[derive(Debug, Default)]
pub struct ScenarioReport {
    pub anchors: Vec<Anchor>,
    pub batch: Option<BatchOptimizeResult>,
    pub overlays: Vec<Overlay>,
    pub occlusion: Vec<OcclusionQueryResult>,
    pub events: Vec<OverlayEvent>,
}

pub fn coordinator_settings(config: &Config) -> CoordinatorSettings {
    CoordinatorSettings {
        solve_timeout: config.coordinator.solve_timeout(),
        busy_policy: match config.coordinator.site_busy_policy {
            BusyPolicy::Queue => SiteBusyPolicy::Queue,
            BusyPolicy::Reject => SiteBusyPolicy::Reject,
        },
        default_lod_levels: config.lod.default_levels,
    }
}

pub fn worker_pool(config: &Config) -> Result<WorkerPool, PoolError> {
    let threads = match config.workers.threads {
        0 => default_thread_count(),
        n => n,
    };
    WorkerPool::new(threads, config.workers.queue_capacity)
}

/// Replay `scenario` against a fresh in-memory coordinator.
pub fn run(scenario: Scenario, config: &Config) -> Result<ScenarioReport, ScenarioError> {
    let scenes = StaticSceneProvider::new();
    scenes.insert(scenario.site_id.clone(), scenario.scene)?;
    let (coordinator, events) = OverlayCoordinator::in_memory(
        Arc::new(scenes),
        worker_pool(config)?,
        coordinator_settings(config),
    );

    let mut report = ScenarioReport::default();

    for placement in scenario.placements {
        let request = PlacementRequest {
            content: placement.content,
            constraints: placement.constraints,
            ..PlacementRequest::new(
                scenario.tenant_id.clone(),
                scenario.site_id.clone(),
                placement.anchor_type,
                placement.position,
            )
        };
        report.anchors.push(coordinator.place_anchor(request)?);
    }

    let ids: Vec<AnchorId> = report.anchors.iter().map(|a| a.id).collect();

    if scenario.optimize && !ids.is_empty() {
        let result = coordinator.optimize_anchors(BatchOptimizeRequest {
            site_id: scenario.site_id.clone(),
            tenant_id: scenario.tenant_id.clone(),
            anchor_ids: ids.clone(),
        })?;
        report.anchors = result.anchors.clone();
        report.batch = Some(result);
    }

    for (index, overlay) in scenario.overlays.into_iter().enumerate() {
        let anchor_ids = if overlay.anchors.is_empty() {
            ids.clone()
        } else {
            overlay
                .anchors
                .iter()
                .map(|&placement| {
                    ids.get(placement)
                        .copied()
                        .ok_or(ScenarioError::UnknownPlacement { index, placement })
                })
                .collect::<Result<_, _>>()?
        };
        report.overlays.push(coordinator.generate_overlay(OverlayRequest {
            site_id: scenario.site_id.clone(),
            tenant_id: scenario.tenant_id.clone(),
            overlay_type: overlay.overlay_type,
            anchor_ids,
            parameters: overlay.parameters,
            lod_levels: overlay.lod_levels,
        })?);
    }

    for &viewpoint in &scenario.viewpoints {
        for &id in &ids {
            report.occlusion.push(coordinator.check_occlusion(id, viewpoint)?);
        }
    }

    report.events = events.try_iter().collect();
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;

    const ABBEY: &str = r#"(
        site_id: "abbey",
        tenant_id: "museum",
        scene: (
            bounds: (min: (-15.0, 0.0, -15.0), max: (15.0, 10.0, 15.0)),
            collision_volumes: [
                (name: Some("altar"), bounds: (min: (-1.0, 0.0, 8.0), max: (1.0, 1.2, 9.0))),
            ],
        ),
        placements: [
            (anchor_type: "hotspot", position: (0.0, 1.5, 0.0),
             content: (body: (kind: "hotspot", title: "Crossing"))),
            (anchor_type: "hotspot", position: (0.5, 1.5, 0.0)),
            (anchor_type: "label", position: (-4.0, 2.0, 3.0),
             content: (body: (kind: "label", text: "North transept"))),
        ],
        optimize: true,
        overlays: [
            (overlay_type: "route"),
            (overlay_type: "heatmap", anchors: [0, 1], lod_levels: Some(2)),
        ],
        viewpoints: [(0.0, 1.7, -10.0)],
    )"#;

    fn config() -> Config {
        let mut config = Config::default();
        config.workers.threads = 2;
        config
    }

    #[test]
    fn test_scenario_parses() {
        let scenario: Scenario = ron::from_str(ABBEY).unwrap();
        assert_eq!(scenario.placements.len(), 3);
        assert_eq!(scenario.overlays[0].overlay_type, OverlayType::Route);
        assert!(scenario.overlays[0].anchors.is_empty());
        assert_eq!(scenario.overlays[1].parameters.width, 1.0);
        assert_eq!(scenario.scene.collision_volumes.len(), 1);
    }

    #[test]
    fn test_scenario_runs_end_to_end() {
        let scenario: Scenario = ron::from_str(ABBEY).unwrap();
        let report = run(scenario, &config()).unwrap();

        assert_eq!(report.anchors.len(), 3);
        assert!(report.batch.is_some());
        assert_eq!(report.overlays.len(), 2);
        assert_eq!(report.overlays[1].lod_versions.len(), 2);
        assert_eq!(report.occlusion.len(), 3);

        let subjects: Vec<&str> = report.events.iter().map(|e| e.subject()).collect();
        assert_eq!(
            subjects,
            vec![
                "anchor.placed",
                "anchor.placed",
                "anchor.placed",
                "anchors.optimized",
                "overlay.generated",
                "overlay.generated",
            ]
        );
    }

    #[test]
    fn test_unknown_overlay_anchor_index() {
        let mut scenario: Scenario = ron::from_str(ABBEY).unwrap();
        scenario.overlays[1].anchors = vec![7];
        assert!(matches!(
            run(scenario, &config()),
            Err(ScenarioError::UnknownPlacement { index: 1, placement: 7 })
        ));
    }

    #[test]
    fn test_settings_follow_config() {
        let mut config = Config::default();
        config.coordinator.site_busy_policy = BusyPolicy::Reject;
        config.coordinator.solve_timeout_ms = 0;
        config.lod.default_levels = 4;
        let settings = coordinator_settings(&config);
        assert_eq!(settings.busy_policy, SiteBusyPolicy::Reject);
        assert_eq!(settings.solve_timeout, None);
        assert_eq!(settings.default_lod_levels, 4);
    }

    /// The sample scenario shipped with the repository stays loadable.
    #[test]
    fn test_demo_scenario_loads() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("../../demos/abbey.ron");
        let scenario = Scenario::load(&path).unwrap();
        assert_eq!(scenario.placements.len(), 5);
        assert!(scenario.placements[3].constraints.is_some());
        assert_eq!(scenario.overlays[0].parameters.width, 1.5);
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            Scenario::load(&dir.path().join("none.ron")),
            Err(ScenarioError::Read { .. })
        ));
    }
}
