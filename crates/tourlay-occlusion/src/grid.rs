//! Site-wide visibility heatmap sampled on a horizontal grid.

use glam::DVec3;
use serde::{Deserialize, Serialize};
use tourlay_scene::{AnchorType, SceneGeometry};

use crate::ray::cast_ray;
use crate::viewpoints::generate_viewpoints;

/// Eye height at which grid cells are sampled, in meters.
pub const SAMPLE_HEIGHT: f64 = 1.8;

/// Upper bound on sampled cells; each cell costs a dozen ray tests.
pub const MAX_GRID_CELLS: usize = 250_000;

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum GridError {
    #[error("grid resolution must be positive and finite, got {0}")]
    InvalidResolution(f64),
    #[error("grid of {columns}x{rows} cells exceeds the {max} cell limit")]
    TooManyCells {
        columns: usize,
        rows: usize,
        max: usize,
    },
}

/// One sampled grid position.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct GridCell {
    pub position: DVec3,
    /// Mean visibility from the surrounding viewpoints, in `[0, 1]`.
    pub visibility: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct VisibilityGrid {
    pub resolution: f64,
    pub columns: usize,
    pub rows: usize,
    /// Cells in row-major order (x varies fastest).
    pub cells: Vec<GridCell>,
    pub min_visibility: f64,
    pub max_visibility: f64,
}

impl VisibilityGrid {
    /// Sample the scene's XZ extent every `resolution` meters.
    ///
    /// Steps start at the minimum corner and stop before the maximum, so a
    /// 10 m extent at 1 m resolution yields 10 columns.
    pub fn sample(scene: &SceneGeometry, resolution: f64) -> Result<Self, GridError> {
        if !resolution.is_finite() || resolution <= 0.0 {
            return Err(GridError::InvalidResolution(resolution));
        }

        let bounds = &scene.bounds;
        let columns = steps(bounds.min.x, bounds.max.x, resolution);
        let rows = steps(bounds.min.z, bounds.max.z, resolution);
        if columns.saturating_mul(rows) > MAX_GRID_CELLS {
            return Err(GridError::TooManyCells {
                columns,
                rows,
                max: MAX_GRID_CELLS,
            });
        }

        let mut cells = Vec::with_capacity(columns * rows);
        for row in 0..rows {
            let z = bounds.min.z + row as f64 * resolution;
            for column in 0..columns {
                let x = bounds.min.x + column as f64 * resolution;
                let position = DVec3::new(x, SAMPLE_HEIGHT, z);
                cells.push(GridCell {
                    position,
                    visibility: cell_visibility(position, scene),
                });
            }
        }

        let (min_visibility, max_visibility) = cells.iter().fold(
            (f64::INFINITY, f64::NEG_INFINITY),
            |(lo, hi), c| (lo.min(c.visibility), hi.max(c.visibility)),
        );
        let (min_visibility, max_visibility) = if cells.is_empty() {
            (0.0, 0.0)
        } else {
            (min_visibility, max_visibility)
        };

        tracing::debug!(columns, rows, min_visibility, max_visibility, "visibility grid sampled");

        Ok(Self {
            resolution,
            columns,
            rows,
            cells,
            min_visibility,
            max_visibility,
        })
    }
}

fn steps(from: f64, to: f64, step: f64) -> usize {
    let span = to - from;
    if span <= 0.0 {
        return 0;
    }
    (span / step).ceil() as usize
}

fn cell_visibility(position: DVec3, scene: &SceneGeometry) -> f64 {
    let viewpoints = generate_viewpoints(position, &AnchorType::Hotspot);
    let total: f64 = viewpoints
        .iter()
        .map(|vp| cast_ray(vp.position, position, scene).visibility())
        .sum();
    total / viewpoints.len().max(1) as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use tourlay_scene::{Aabb, CollisionVolume};

    fn room() -> SceneGeometry {
        SceneGeometry::with_bounds(Aabb::new(
            DVec3::new(0.0, 0.0, 0.0),
            DVec3::new(10.0, 4.0, 6.0),
        ))
    }

    #[test]
    fn test_grid_dimensions_exclude_upper_edge() {
        let grid = VisibilityGrid::sample(&room(), 2.0).unwrap();
        assert_eq!(grid.columns, 5);
        assert_eq!(grid.rows, 3);
        assert_eq!(grid.cells.len(), 15);
        assert_eq!(grid.cells[0].position, DVec3::new(0.0, 1.8, 0.0));
        assert_eq!(grid.cells[1].position, DVec3::new(2.0, 1.8, 0.0));
        assert_eq!(grid.cells[5].position, DVec3::new(0.0, 1.8, 2.0));
    }

    #[test]
    fn test_open_room_fully_visible() {
        let grid = VisibilityGrid::sample(&room(), 5.0).unwrap();
        assert_eq!(grid.min_visibility, 1.0);
        assert_eq!(grid.max_visibility, 1.0);
    }

    /// A pillar in the room lowers visibility of the cells around it.
    #[test]
    fn test_pillar_creates_shadow() {
        let scene = room().with_volume(CollisionVolume::named(
            "pillar",
            Aabb::new(DVec3::new(3.5, 0.0, 2.5), DVec3::new(4.5, 4.0, 3.5)),
        ));
        let grid = VisibilityGrid::sample(&scene, 1.0).unwrap();
        assert!(grid.min_visibility < grid.max_visibility);
        let inside = grid
            .cells
            .iter()
            .find(|c| c.position.x == 4.0 && c.position.z == 3.0)
            .unwrap();
        assert!(inside.visibility < 0.9);
        assert!(grid.max_visibility > 0.99);
    }

    #[test]
    fn test_rejects_bad_resolution() {
        for bad in [0.0, -1.0, f64::NAN] {
            assert!(matches!(
                VisibilityGrid::sample(&room(), bad),
                Err(GridError::InvalidResolution(_))
            ));
        }
    }

    #[test]
    fn test_rejects_oversized_grid() {
        let result = VisibilityGrid::sample(&SceneGeometry::default(), 0.01);
        assert!(matches!(result, Err(GridError::TooManyCells { .. })));
    }
}
