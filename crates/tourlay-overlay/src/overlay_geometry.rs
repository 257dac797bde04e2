//! Presentation geometry built from anchor positions.

use glam::DVec3;
use tourlay_lod::{MaterialInfo, OverlayGeometry, ShaderModel};

use crate::model::{OverlayParameters, OverlayType};

/// Height of route strips above the floor.
const ROUTE_LIFT: f64 = 0.05;

const HEAT_COLOR: [f32; 3] = [1.0, 0.35, 0.1];
const RIBBON_COLOR: [f32; 3] = [0.92, 0.82, 0.55];
const ROUTE_COLOR: [f32; 3] = [0.2, 0.6, 1.0];

/// Build the level-0 geometry for an overlay.
///
/// `floor_y` is the scene floor height routes are laid on. Unknown overlay
/// types yield empty geometry.
pub fn build_overlay_geometry(
    overlay_type: &OverlayType,
    positions: &[DVec3],
    parameters: &OverlayParameters,
    floor_y: f64,
) -> OverlayGeometry {
    let width = if parameters.width.is_finite() && parameters.width > 0.0 {
        parameters.width
    } else {
        OverlayParameters::default().width
    };

    match overlay_type {
        OverlayType::Heatmap => heatmap(positions, width),
        OverlayType::Timeline => timeline(positions, width),
        OverlayType::Route => route(positions, width, floor_y),
        OverlayType::Other(name) => {
            tracing::warn!("no geometry builder for overlay type {name}");
            OverlayGeometry::default()
        }
    }
}

fn to_f32(p: DVec3) -> [f32; 3] {
    p.as_vec3().to_array()
}

fn with_material(mut geometry: OverlayGeometry, name: &str, material: MaterialInfo) -> OverlayGeometry {
    geometry.materials.insert(name.to_string(), material);
    geometry
}

/// One horizontal square per anchor, centered on it.
fn heatmap(positions: &[DVec3], width: f64) -> OverlayGeometry {
    let h = width / 2.0;
    let mut geometry = OverlayGeometry::default();
    for (i, &p) in positions.iter().enumerate() {
        let base = (i * 4) as u32;
        geometry.vertices.extend([
            to_f32(p + DVec3::new(-h, 0.0, -h)),
            to_f32(p + DVec3::new(h, 0.0, -h)),
            to_f32(p + DVec3::new(h, 0.0, h)),
            to_f32(p + DVec3::new(-h, 0.0, h)),
        ]);
        geometry.faces.push([base, base + 1, base + 2]);
        geometry.faces.push([base, base + 2, base + 3]);
    }
    with_material(geometry, "heat", MaterialInfo::flat(HEAT_COLOR, ShaderModel::Unlit))
}

/// Vertical ribbon through the anchors in order.
fn timeline(positions: &[DVec3], width: f64) -> OverlayGeometry {
    let half = DVec3::Y * (width / 2.0);
    let edges = positions.iter().map(|&p| (p - half, p + half));
    with_material(
        strip(edges),
        "ribbon",
        MaterialInfo::flat(RIBBON_COLOR, ShaderModel::Simple),
    )
}

/// Flat strip on the floor through the anchors' footprints.
fn route(positions: &[DVec3], width: f64, floor_y: f64) -> OverlayGeometry {
    let y = floor_y + ROUTE_LIFT;
    let footprints: Vec<DVec3> = positions.iter().map(|p| DVec3::new(p.x, y, p.z)).collect();
    let edges = footprints.iter().enumerate().map(|(i, &p)| {
        let prev = footprints[i.saturating_sub(1)];
        let next = footprints[(i + 1).min(footprints.len() - 1)];
        let side = (next - prev)
            .cross(DVec3::Y)
            .try_normalize()
            .unwrap_or(DVec3::X);
        let offset = side * (width / 2.0);
        (p - offset, p + offset)
    });
    with_material(
        strip(edges),
        "route",
        MaterialInfo::flat(ROUTE_COLOR, ShaderModel::Unlit),
    )
}

/// Triangle strip from edge pairs: two vertices per pair, two triangles
/// between consecutive pairs.
fn strip(edges: impl Iterator<Item = (DVec3, DVec3)>) -> OverlayGeometry {
    let mut geometry = OverlayGeometry::default();
    for (i, (a, b)) in edges.enumerate() {
        geometry.vertices.push(to_f32(a));
        geometry.vertices.push(to_f32(b));
        if i > 0 {
            let base = ((i - 1) * 2) as u32;
            geometry.faces.push([base, base + 1, base + 2]);
            geometry.faces.push([base + 1, base + 3, base + 2]);
        }
    }
    geometry
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(n: usize) -> Vec<DVec3> {
        (0..n).map(|i| DVec3::new(i as f64 * 2.0, 1.5, 0.0)).collect()
    }

    #[test]
    fn test_heatmap_quad_per_anchor() {
        let g = build_overlay_geometry(&OverlayType::Heatmap, &line(3), &OverlayParameters::default(), 0.0);
        assert_eq!(g.vertex_count(), 12);
        assert_eq!(g.triangle_count(), 6);
        assert!(g.faces_in_range());
        assert_eq!(g.materials["heat"].shader, ShaderModel::Unlit);
    }

    #[test]
    fn test_timeline_ribbon_counts() {
        let g = build_overlay_geometry(&OverlayType::Timeline, &line(4), &OverlayParameters::default(), 0.0);
        assert_eq!(g.vertex_count(), 8);
        assert_eq!(g.triangle_count(), 6);
        assert!(g.faces_in_range());
        assert_eq!(g.vertices[0], [0.0, 1.0, 0.0]);
        assert_eq!(g.vertices[1], [0.0, 2.0, 0.0]);
    }

    /// Route strips lie on the floor and span the requested width across
    /// the direction of travel.
    #[test]
    fn test_route_on_floor_with_width() {
        let params = OverlayParameters {
            width: 2.0,
            ..Default::default()
        };
        let g = build_overlay_geometry(&OverlayType::Route, &line(2), &params, -1.0);
        assert_eq!(g.vertex_count(), 4);
        assert_eq!(g.triangle_count(), 2);
        for v in &g.vertices {
            assert!((v[1] - (-0.95)).abs() < 1e-6);
        }
        let a = DVec3::from_array(g.vertices[0].map(f64::from));
        let b = DVec3::from_array(g.vertices[1].map(f64::from));
        assert!((a.distance(b) - 2.0).abs() < 1e-6);
        assert!(a.x.abs() < 1e-6 && b.x.abs() < 1e-6);
    }

    #[test]
    fn test_single_point_route_has_no_faces() {
        let g = build_overlay_geometry(&OverlayType::Route, &line(1), &OverlayParameters::default(), 0.0);
        assert_eq!(g.vertex_count(), 2);
        assert_eq!(g.triangle_count(), 0);
    }

    #[test]
    fn test_unknown_type_is_empty() {
        let g = build_overlay_geometry(
            &OverlayType::Other("sparkles".into()),
            &line(3),
            &OverlayParameters::default(),
            0.0,
        );
        assert_eq!(g, OverlayGeometry::default());
    }
}
