//! Request orchestration: anchor placement, batch re-optimization, overlay
//! generation and the queries over their results.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use crossbeam_channel::Receiver;
use dashmap::DashMap;
use glam::DVec3;
use tourlay_lod::{
    LodSelector, LodVersion, MAX_LOD_LEVELS, PerformanceBudget, generate_lod_level,
    generate_lod_versions, lod_statistics,
};
use tourlay_occlusion::{OcclusionAnalyzer, OcclusionReport, VisibilityGrid};
use tourlay_placement::{
    LayoutAnchor, LayoutSolution, Placement, PlacementOutcome, PlacementRecommendation,
    PlacementSolver, placement_recommendations,
};
use tourlay_scene::{AnchorType, SceneGeometry};

use crate::error::OverlayError;
use crate::events::{ChannelEventBus, EventBus, OverlayEvent};
use crate::model::{
    Anchor, AnchorId, AnchorMetadata, BatchOptimizeRequest, BatchOptimizeResult,
    OcclusionQueryResult, OcclusionSummary, Overlay, OverlayId, OverlayRequest, PlacementRequest,
};
use crate::overlay_geometry::build_overlay_geometry;
use crate::pool::{JobError, WorkerPool};
use crate::scene_provider::SceneProvider;
use crate::site_lock::{self, SiteBusyPolicy, SiteLocks};
use crate::store::{DocumentStore, MemoryStore};

/// Tunables for an [`OverlayCoordinator`].
#[derive(Clone, Debug, PartialEq)]
pub struct CoordinatorSettings {
    /// Deadline for worker jobs; `None` waits indefinitely.
    pub solve_timeout: Option<Duration>,
    pub busy_policy: SiteBusyPolicy,
    /// LOD tiers generated when an overlay request does not say.
    pub default_lod_levels: u8,
}

impl Default for CoordinatorSettings {
    fn default() -> Self {
        Self {
            solve_timeout: None,
            busy_policy: SiteBusyPolicy::Queue,
            default_lod_levels: 3,
        }
    }
}

/// Owns the stores, caches and worker pool behind every overlay request.
pub struct OverlayCoordinator {
    anchors: Arc<dyn DocumentStore<Anchor>>,
    overlays: Arc<dyn DocumentStore<Overlay>>,
    bus: Arc<dyn EventBus>,
    scenes: Arc<dyn SceneProvider>,
    pool: WorkerPool,
    locks: SiteLocks,
    anchor_cache: DashMap<AnchorId, Anchor>,
    lod_cache: DashMap<(OverlayId, u8), LodVersion>,
    overlay_sites: DashMap<OverlayId, String>,
    solver: PlacementSolver,
    analyzer: OcclusionAnalyzer,
    lod: LodSelector,
    settings: CoordinatorSettings,
}

impl OverlayCoordinator {
    pub fn new(
        anchors: Arc<dyn DocumentStore<Anchor>>,
        overlays: Arc<dyn DocumentStore<Overlay>>,
        bus: Arc<dyn EventBus>,
        scenes: Arc<dyn SceneProvider>,
        pool: WorkerPool,
        settings: CoordinatorSettings,
    ) -> Self {
        Self {
            anchors,
            overlays,
            bus,
            scenes,
            pool,
            locks: SiteLocks::new(),
            anchor_cache: DashMap::new(),
            lod_cache: DashMap::new(),
            overlay_sites: DashMap::new(),
            solver: PlacementSolver::new(),
            analyzer: OcclusionAnalyzer::new(),
            lod: LodSelector::default(),
            settings,
        }
    }

    /// A coordinator over in-memory stores and an unbounded channel bus.
    /// Returns the receiving end of the bus alongside it.
    pub fn in_memory(
        scenes: Arc<dyn SceneProvider>,
        pool: WorkerPool,
        settings: CoordinatorSettings,
    ) -> (Self, Receiver<OverlayEvent>) {
        let (bus, events) = ChannelEventBus::unbounded();
        let coordinator = Self::new(
            Arc::new(MemoryStore::<Anchor>::new()),
            Arc::new(MemoryStore::<Overlay>::new()),
            Arc::new(bus),
            scenes,
            pool,
            settings,
        );
        (coordinator, events)
    }

    /// Place a new anchor as close to the requested position as its
    /// constraints and the scene's occluders allow.
    pub fn place_anchor(&self, request: PlacementRequest) -> Result<Anchor, OverlayError> {
        validate_placement(&request)?;
        let scene = self.scene(&request.site_id)?;

        let lock = self.locks.handle(&request.site_id);
        let _shared = site_lock::read(&lock, self.settings.busy_policy)
            .map_err(|_| OverlayError::SiteBusy(request.site_id.clone()))?;

        let solver = self.solver;
        let job_scene = Arc::clone(&scene);
        let anchor_type = request.anchor_type.clone();
        let desired = request.position;
        let overrides = request.constraints;
        let handle = self.pool.submit(move |cancel| {
            let placement =
                solver.solve_single(desired, &anchor_type, &job_scene, overrides.as_ref(), Some(cancel));
            let report = solver
                .analyzer()
                .analyze_occlusion(placement.position, &job_scene, &anchor_type);
            (placement, report)
        })?;

        let (placement, report) = match handle.wait(self.settings.solve_timeout) {
            Ok((placement, report)) => (placement, Some(report)),
            Err(e) => (fallback_placement(desired, &scene, &e), None),
        };

        let lod_level =
            self.lod
                .calculate_lod(placement.position, &request.anchor_type, request.content.complexity());
        let now = now_unix_ms();

        let anchor = Anchor {
            id: AnchorId::new(),
            tenant_id: request.tenant_id,
            site_id: request.site_id,
            anchor_type: request.anchor_type,
            position: placement.position,
            rotation: request.rotation,
            scale: request.scale,
            content: request.content,
            occlusion_score: placement.occlusion_score,
            lod_level,
            original_position: desired,
            metadata: AnchorMetadata {
                occlusion: report.as_ref().map(OcclusionSummary::from),
                placement_outcome: Some(placement.outcome.clone()),
                attributes: request.metadata,
                ..Default::default()
            },
            created_unix_ms: now,
            updated_unix_ms: now,
        };

        self.anchors.save(&anchor)?;
        self.anchor_cache.insert(anchor.id, anchor.clone());

        tracing::info!(
            "placed {} anchor {} on site {} at {} (occlusion {:.3}, lod {}, {})",
            anchor.anchor_type,
            anchor.id,
            anchor.site_id,
            anchor.position,
            anchor.occlusion_score,
            anchor.lod_level,
            placement.outcome
        );

        self.publish(OverlayEvent::AnchorPlaced {
            anchor_id: anchor.id,
            site_id: anchor.site_id.clone(),
            tenant_id: anchor.tenant_id.clone(),
            position: anchor.position,
            anchor_type: anchor.anchor_type.clone(),
        });

        Ok(anchor)
    }

    /// Jointly re-optimize existing anchors on one site under the site's
    /// exclusive lock.
    ///
    /// Anchors the solve cannot use keep their position and are flagged in
    /// their metadata.
    pub fn optimize_anchors(
        &self,
        request: BatchOptimizeRequest,
    ) -> Result<BatchOptimizeResult, OverlayError> {
        if request.anchor_ids.is_empty() {
            return Err(OverlayError::InvalidRequest("no anchors to optimize".into()));
        }
        let mut seen = HashSet::new();
        if let Some(dup) = request.anchor_ids.iter().find(|id| !seen.insert(**id)) {
            return Err(OverlayError::InvalidRequest(format!(
                "anchor {dup} listed more than once"
            )));
        }

        let scene = self.scene(&request.site_id)?;
        let lock = self.locks.handle(&request.site_id);
        let _exclusive = site_lock::write(&lock, self.settings.busy_policy)
            .map_err(|_| OverlayError::SiteBusy(request.site_id.clone()))?;

        let mut anchors = self.site_anchors(&request.anchor_ids, &request.tenant_id, &request.site_id)?;
        let layout: Vec<LayoutAnchor> = anchors
            .iter()
            .map(|a| LayoutAnchor {
                anchor_type: a.anchor_type.clone(),
                position: a.position,
                original_position: a.original_position,
            })
            .collect();
        let current: Vec<DVec3> = layout.iter().map(|a| a.position).collect();

        let solver = self.solver;
        let job_scene = Arc::clone(&scene);
        let handle = self
            .pool
            .submit(move |cancel| solver.solve_multi(&layout, &job_scene, Some(cancel)))?;

        let solution = match handle.wait(self.settings.solve_timeout) {
            Ok(solution) => solution,
            Err(e) => {
                tracing::warn!("layout job for site {} abandoned: {e}", request.site_id);
                LayoutSolution {
                    positions: current,
                    outcome: timeout_outcome(&e),
                    issues: Vec::new(),
                    iterations: 0,
                }
            }
        };

        let now = now_unix_ms();
        let mut optimized_count = 0;
        for (i, anchor) in anchors.iter_mut().enumerate() {
            let prior = anchor.clone();
            let issue = solution
                .issues
                .iter()
                .find(|(index, _)| *index == i)
                .map(|(_, issue)| issue.clone());

            let moved = if let Some(issue) = issue {
                tracing::warn!("anchor {} kept its position: {issue:?}", anchor.id);
                anchor.metadata.optimization_issue = Some(issue);
                false
            } else if solution.outcome.is_fallback() {
                continue;
            } else {
                anchor.position = solution.positions[i];
                anchor.occlusion_score =
                    self.analyzer
                        .placement_occlusion(anchor.position, &scene, &anchor.anchor_type);
                anchor.lod_level = self.lod.calculate_lod(
                    anchor.position,
                    &anchor.anchor_type,
                    anchor.content.complexity(),
                );
                anchor.metadata.placement_outcome = Some(solution.outcome.clone());
                anchor.metadata.last_optimized_unix_ms = Some(now);
                anchor.metadata.optimization_issue = None;
                true
            };

            anchor.metadata.persist_error = None;
            anchor.updated_unix_ms = now;
            match self.anchors.update(anchor) {
                Ok(()) => {
                    self.anchor_cache.insert(anchor.id, anchor.clone());
                    if moved {
                        optimized_count += 1;
                    }
                }
                Err(e) => {
                    tracing::warn!("anchor {} keeps its prior record, update failed: {e}", anchor.id);
                    *anchor = prior;
                    anchor.metadata.persist_error = Some(e.to_string());
                }
            }
        }

        tracing::info!(
            "optimized {optimized_count} of {} anchors on site {} ({})",
            anchors.len(),
            request.site_id,
            solution.outcome
        );

        self.publish(OverlayEvent::AnchorsOptimized {
            site_id: request.site_id,
            tenant_id: request.tenant_id,
            anchor_ids: request.anchor_ids,
            optimized_count,
        });

        Ok(BatchOptimizeResult {
            anchors,
            optimized_count,
            outcome: solution.outcome,
        })
    }

    /// Build overlay geometry from anchor positions and derive its LOD tiers.
    pub fn generate_overlay(&self, request: OverlayRequest) -> Result<Overlay, OverlayError> {
        if request.anchor_ids.is_empty() {
            return Err(OverlayError::InvalidRequest("overlay needs at least one anchor".into()));
        }
        if !request.parameters.width.is_finite() || request.parameters.width <= 0.0 {
            return Err(OverlayError::InvalidRequest(format!(
                "overlay width must be positive, got {}",
                request.parameters.width
            )));
        }

        let scene = self.scene(&request.site_id)?;
        let lock = self.locks.handle(&request.site_id);
        let _shared = site_lock::read(&lock, self.settings.busy_policy)
            .map_err(|_| OverlayError::SiteBusy(request.site_id.clone()))?;

        let anchors = self.site_anchors(&request.anchor_ids, &request.tenant_id, &request.site_id)?;
        let positions: Vec<DVec3> = anchors.iter().map(|a| a.position).collect();
        let levels = request.lod_levels.unwrap_or(self.settings.default_lod_levels);
        let floor_y = scene.bounds.min.y;
        let overlay_type = request.overlay_type.clone();
        let parameters = request.parameters.clone();

        let handle = self.pool.submit(move |_| {
            let geometry = build_overlay_geometry(&overlay_type, &positions, &parameters, floor_y);
            let versions = generate_lod_versions(&geometry, levels);
            let statistics = lod_statistics(&versions);
            (versions, statistics)
        })?;
        let (lod_versions, statistics) = handle.wait(self.settings.solve_timeout)?;

        let overlay = Overlay {
            id: OverlayId::new(),
            tenant_id: request.tenant_id,
            site_id: request.site_id,
            overlay_type: request.overlay_type,
            anchor_ids: request.anchor_ids,
            parameters: request.parameters,
            lod_versions,
            statistics,
            created_unix_ms: now_unix_ms(),
        };

        self.overlays.save(&overlay)?;
        self.overlay_sites.insert(overlay.id, overlay.site_id.clone());
        for (&level, version) in &overlay.lod_versions {
            self.lod_cache.insert((overlay.id, level), version.clone());
        }

        tracing::info!(
            "generated {} overlay {} with {} LOD levels ({:.2} MiB)",
            overlay.overlay_type,
            overlay.id,
            overlay.statistics.lod_count,
            overlay.statistics.memory_usage_mb()
        );

        self.publish(OverlayEvent::OverlayGenerated {
            overlay_id: overlay.id,
            site_id: overlay.site_id.clone(),
            tenant_id: overlay.tenant_id.clone(),
            overlay_type: overlay.overlay_type.clone(),
        });

        Ok(overlay)
    }

    /// One LOD tier of an overlay, derived from level 0 and cached if it was
    /// not generated up front.
    pub fn get_overlay_lod(&self, overlay_id: OverlayId, level: u8) -> Result<LodVersion, OverlayError> {
        if level >= MAX_LOD_LEVELS {
            return Err(OverlayError::InvalidRequest(format!(
                "LOD level {level} out of range 0..{MAX_LOD_LEVELS}"
            )));
        }
        let known_site = self.overlay_sites.get(&overlay_id).map(|site| site.value().clone());
        let site_id = match known_site {
            Some(site) => site,
            None => self.load_overlay(overlay_id)?.site_id,
        };

        self.with_site_read(&site_id, || {
            if let Some(version) = self.lod_cache.get(&(overlay_id, level)) {
                return Ok(version.value().clone());
            }

            let overlay = self.load_overlay(overlay_id)?;
            let version = match overlay.lod_versions.get(&level) {
                Some(version) => version.clone(),
                None => {
                    let base = overlay.lod_versions.get(&0).ok_or_else(|| {
                        OverlayError::not_found("overlay base geometry", overlay_id)
                    })?;
                    tracing::debug!("deriving LOD {level} for overlay {overlay_id}");
                    generate_lod_level(&base.geometry, level)
                }
            };
            self.lod_cache.insert((overlay_id, level), version.clone());
            Ok(version)
        })
    }

    /// Test a stored anchor against one viewer position.
    pub fn check_occlusion(
        &self,
        anchor_id: AnchorId,
        viewpoint: DVec3,
    ) -> Result<OcclusionQueryResult, OverlayError> {
        if !viewpoint.is_finite() {
            return Err(OverlayError::InvalidRequest("viewpoint must be finite".into()));
        }
        let site_id = self.load_anchor(anchor_id)?.site_id;

        self.with_site_read(&site_id, || {
            let anchor = self.load_anchor(anchor_id)?;
            let scene = self.scene(&anchor.site_id)?;

            let analyzer = self.analyzer;
            let position = anchor.position;
            let handle = self
                .pool
                .submit(move |_| analyzer.check_occlusion(position, viewpoint, &scene))?;
            let check = handle.wait(self.settings.solve_timeout)?;

            Ok(OcclusionQueryResult::from_check(anchor_id, check))
        })
    }

    /// LOD tier for a stored anchor as seen from `viewer_position` under the
    /// client's current load.
    pub fn dynamic_lod(
        &self,
        anchor_id: AnchorId,
        viewer_position: DVec3,
        budget: &PerformanceBudget,
    ) -> Result<u8, OverlayError> {
        let site_id = self.load_anchor(anchor_id)?.site_id;
        self.with_site_read(&site_id, || {
            let anchor = self.load_anchor(anchor_id)?;
            Ok(self
                .lod
                .calculate_dynamic_lod(anchor.position, viewer_position, budget))
        })
    }

    /// Full occlusion analysis of a stored anchor at its current position.
    pub fn analyze_anchor(&self, anchor_id: AnchorId) -> Result<OcclusionReport, OverlayError> {
        let site_id = self.load_anchor(anchor_id)?.site_id;
        self.with_site_read(&site_id, || {
            let anchor = self.load_anchor(anchor_id)?;
            let scene = self.scene(&anchor.site_id)?;
            let analyzer = self.analyzer;
            let handle = self.pool.submit(move |_| {
                analyzer.analyze_occlusion(anchor.position, &scene, &anchor.anchor_type)
            })?;
            Ok(handle.wait(self.settings.solve_timeout)?)
        })
    }

    pub fn get_anchor(&self, anchor_id: AnchorId, tenant_id: &str) -> Result<Anchor, OverlayError> {
        let anchor = self.load_anchor(anchor_id)?;
        if anchor.tenant_id != tenant_id {
            return Err(OverlayError::not_found("anchor", anchor_id));
        }
        Ok(anchor)
    }

    pub fn get_overlay(&self, overlay_id: OverlayId, tenant_id: &str) -> Result<Overlay, OverlayError> {
        match self.overlays.get(overlay_id)? {
            Some(overlay) if overlay.tenant_id == tenant_id => Ok(overlay),
            _ => Err(OverlayError::not_found("overlay", overlay_id)),
        }
    }

    /// Remove an anchor from the store and caches.
    pub fn delete_anchor(&self, anchor_id: AnchorId, tenant_id: &str) -> Result<(), OverlayError> {
        let anchor = self.get_anchor(anchor_id, tenant_id)?;

        let lock = self.locks.handle(&anchor.site_id);
        let _shared = site_lock::read(&lock, self.settings.busy_policy)
            .map_err(|_| OverlayError::SiteBusy(anchor.site_id.clone()))?;

        self.anchor_cache.remove(&anchor_id);
        if !self.anchors.delete(anchor_id)? {
            return Err(OverlayError::not_found("anchor", anchor_id));
        }

        tracing::info!("deleted anchor {anchor_id} from site {}", anchor.site_id);
        self.publish(OverlayEvent::AnchorDeleted {
            anchor_id,
            tenant_id: anchor.tenant_id,
        });
        Ok(())
    }

    /// Candidate positions for a new anchor of `anchor_type`, best first.
    pub fn placement_recommendations(
        &self,
        site_id: &str,
        anchor_type: &AnchorType,
    ) -> Result<Vec<PlacementRecommendation>, OverlayError> {
        let scene = self.scene(site_id)?;
        Ok(placement_recommendations(anchor_type, &scene))
    }

    /// Site-wide eye-height visibility heatmap.
    pub fn visibility_grid(&self, site_id: &str, resolution: f64) -> Result<VisibilityGrid, OverlayError> {
        let scene = self.scene(site_id)?;
        let analyzer = self.analyzer;
        let handle = self
            .pool
            .submit(move |_| analyzer.visibility_grid(&scene, resolution))?;
        Ok(handle.wait(self.settings.solve_timeout)??)
    }

    fn scene(&self, site_id: &str) -> Result<Arc<SceneGeometry>, OverlayError> {
        self.scenes
            .scene(site_id)
            .ok_or_else(|| OverlayError::not_found("site geometry", site_id))
    }

    /// Run `f` under the shared side of `site_id`'s lock. Reads inside `f`
    /// see the anchors a finished batch wrote.
    fn with_site_read<T>(
        &self,
        site_id: &str,
        f: impl FnOnce() -> Result<T, OverlayError>,
    ) -> Result<T, OverlayError> {
        let lock = self.locks.handle(site_id);
        let _shared = site_lock::read(&lock, self.settings.busy_policy)
            .map_err(|_| OverlayError::SiteBusy(site_id.to_string()))?;
        f()
    }

    fn load_overlay(&self, overlay_id: OverlayId) -> Result<Overlay, OverlayError> {
        let overlay = self
            .overlays
            .get(overlay_id)?
            .ok_or_else(|| OverlayError::not_found("overlay", overlay_id))?;
        self.overlay_sites.insert(overlay_id, overlay.site_id.clone());
        Ok(overlay)
    }

    fn load_anchor(&self, anchor_id: AnchorId) -> Result<Anchor, OverlayError> {
        if let Some(anchor) = self.anchor_cache.get(&anchor_id) {
            return Ok(anchor.value().clone());
        }
        let anchor = self
            .anchors
            .get(anchor_id)?
            .ok_or_else(|| OverlayError::not_found("anchor", anchor_id))?;
        self.anchor_cache.insert(anchor_id, anchor.clone());
        Ok(anchor)
    }

    /// Load anchors for a site-scoped request. Anchors owned by another
    /// tenant are reported as missing.
    fn site_anchors(
        &self,
        ids: &[AnchorId],
        tenant_id: &str,
        site_id: &str,
    ) -> Result<Vec<Anchor>, OverlayError> {
        ids.iter()
            .map(|&id| {
                let anchor = self.get_anchor(id, tenant_id)?;
                if anchor.site_id != site_id {
                    return Err(OverlayError::InvalidRequest(format!(
                        "anchor {id} belongs to site {}, not {site_id}",
                        anchor.site_id
                    )));
                }
                Ok(anchor)
            })
            .collect()
    }

    fn publish(&self, event: OverlayEvent) {
        if let Err(e) = self.bus.publish(&event) {
            tracing::warn!("failed to publish {}: {e}", event.subject());
        }
    }
}

fn validate_placement(request: &PlacementRequest) -> Result<(), OverlayError> {
    if request.tenant_id.is_empty() || request.site_id.is_empty() {
        return Err(OverlayError::InvalidRequest("tenant and site ids are required".into()));
    }
    if !request.position.is_finite() {
        return Err(OverlayError::InvalidRequest("position must be finite".into()));
    }
    if !request.rotation.is_finite() || !request.scale.is_finite() {
        return Err(OverlayError::InvalidRequest("rotation and scale must be finite".into()));
    }
    if request.constraints.is_some_and(|c| c.has_non_finite()) {
        return Err(OverlayError::InvalidRequest("constraint overrides must be finite".into()));
    }
    request
        .content
        .validate(&request.anchor_type)
        .map_err(OverlayError::InvalidRequest)
}

fn timeout_outcome(error: &JobError) -> PlacementOutcome {
    match error {
        JobError::TimedOut => PlacementOutcome::TimedOut,
        other => PlacementOutcome::Degraded {
            reason: other.to_string(),
        },
    }
}

/// The requested position clamped into the scene, scored as fully occluded.
fn fallback_placement(desired: DVec3, scene: &SceneGeometry, error: &JobError) -> Placement {
    tracing::warn!("placement job abandoned, keeping requested position: {error}");
    Placement {
        position: scene.bounds.clamp_point(desired),
        occlusion_score: 1.0,
        outcome: timeout_outcome(error),
        iterations: 0,
    }
}

fn now_unix_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| d.as_millis() as u64)
}
