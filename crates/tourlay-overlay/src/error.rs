use tourlay_occlusion::GridError;
use tourlay_scene::GeometryError;

use crate::pool::{JobError, PoolError};
use crate::store::StoreError;

/// Errors returned by the [`OverlayCoordinator`](crate::OverlayCoordinator).
#[derive(Debug, thiserror::Error)]
pub enum OverlayError {
    #[error("{kind} {id} not found")]
    NotFound { kind: &'static str, id: String },

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("site {0} is being re-optimized")]
    SiteBusy(String),

    #[error("worker pool queue is full")]
    PoolSaturated,

    #[error("job did not finish in time")]
    TimedOut,

    #[error("worker pool: {0}")]
    Pool(PoolError),

    #[error("worker job: {0}")]
    Job(JobError),

    #[error("store: {0}")]
    Store(#[from] StoreError),

    #[error("scene geometry: {0}")]
    Geometry(#[from] GeometryError),

    #[error("visibility grid: {0}")]
    Grid(#[from] GridError),
}

impl OverlayError {
    pub(crate) fn not_found(kind: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            kind,
            id: id.to_string(),
        }
    }
}

impl From<PoolError> for OverlayError {
    fn from(error: PoolError) -> Self {
        match error {
            PoolError::Saturated => Self::PoolSaturated,
            other => Self::Pool(other),
        }
    }
}

impl From<JobError> for OverlayError {
    fn from(error: JobError) -> Self {
        match error {
            JobError::TimedOut => Self::TimedOut,
            other => Self::Job(other),
        }
    }
}
