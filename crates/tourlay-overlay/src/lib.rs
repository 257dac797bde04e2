//! Overlay coordination for tour sites.
//!
//! [`OverlayCoordinator`] ties the placement solver, occlusion analyzer and
//! LOD manager to a document store, an event bus and a per-site scene
//! provider. Solves run on a bounded [`WorkerPool`] and respect per-site
//! reader/writer locks.

mod coordinator;
mod error;
mod events;
mod model;
mod overlay_geometry;
mod pool;
mod scene_provider;
mod site_lock;
mod store;

pub use coordinator::{CoordinatorSettings, OverlayCoordinator};
pub use error::OverlayError;
pub use events::{BusError, ChannelEventBus, EventBus, OverlayEvent};
pub use model::{
    Anchor, AnchorContent, AnchorId, AnchorMetadata, BatchOptimizeRequest, BatchOptimizeResult,
    ContentBody, OcclusionQueryResult, OcclusionSummary, Overlay, OverlayId, OverlayLod,
    OverlayParameters, OverlayRequest, OverlayType, PLACEMENT_ALGORITHM, PlacementRequest,
    TimelineEntry,
};
pub use overlay_geometry::build_overlay_geometry;
pub use pool::{JobError, JobHandle, PoolError, WorkerPool, default_thread_count};
pub use scene_provider::{SceneProvider, StaticSceneProvider};
pub use site_lock::{SiteBusy, SiteBusyPolicy, SiteLocks};
pub use store::{Document, DocumentStore, MemoryStore, StoreError};
