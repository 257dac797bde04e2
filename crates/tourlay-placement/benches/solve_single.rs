use criterion::{Criterion, black_box, criterion_group, criterion_main};
use glam::DVec3;
use tourlay_placement::{LayoutAnchor, PlacementSolver};
use tourlay_scene::{Aabb, AnchorType, CollisionVolume, SceneGeometry};

fn gallery() -> SceneGeometry {
    let mut scene = SceneGeometry::with_bounds(Aabb::new(
        DVec3::new(-30.0, 0.0, -30.0),
        DVec3::new(30.0, 6.0, 30.0),
    ));
    for i in 0..12 {
        let x = -27.0 + i as f64 * 5.0;
        scene.collision_volumes.push(CollisionVolume::named(
            format!("pillar_{i}"),
            Aabb::new(DVec3::new(x, 0.0, -1.0), DVec3::new(x + 1.0, 6.0, 1.0)),
        ));
    }
    scene
}

fn bench_solve_single_open(c: &mut Criterion) {
    let solver = PlacementSolver::new();
    let scene = SceneGeometry::default();
    c.bench_function("solve_single_open", |b| {
        b.iter(|| {
            black_box(solver.solve_single(
                black_box(DVec3::new(2.0, 1.8, -3.0)),
                &AnchorType::Hotspot,
                &scene,
                None,
                None,
            ))
        })
    });
}

fn bench_solve_single_gallery(c: &mut Criterion) {
    let solver = PlacementSolver::new();
    let scene = gallery();
    c.bench_function("solve_single_gallery", |b| {
        b.iter(|| {
            black_box(solver.solve_single(
                black_box(DVec3::new(0.5, 1.5, 0.5)),
                &AnchorType::Label,
                &scene,
                None,
                None,
            ))
        })
    });
}

fn bench_solve_multi_four(c: &mut Criterion) {
    let solver = PlacementSolver::new();
    let scene = gallery();
    let anchors: Vec<LayoutAnchor> = (0..4)
        .map(|i| {
            let p = DVec3::new(i as f64 * 0.8, 1.5, 3.0);
            LayoutAnchor {
                anchor_type: AnchorType::Hotspot,
                position: p,
                original_position: p,
            }
        })
        .collect();
    c.bench_function("solve_multi_four", |b| {
        b.iter(|| black_box(solver.solve_multi(black_box(&anchors), &scene, None)))
    });
}

criterion_group!(
    benches,
    bench_solve_single_open,
    bench_solve_single_gallery,
    bench_solve_multi_four
);
criterion_main!(benches);
