//! Benchmarks for full battles and the pathfinding hot path.

#![allow(missing_docs)]

use std::hint::black_box;

use criterion::{criterion_group, criterion_main, Criterion};
use wargame_sim::battle::execution::run_simulation;
use wargame_sim::battle::navmesh::generate_nav_mesh;
use wargame_sim::battle::pathfinding::find_path;
use wargame_sim::battle::terrain::TerrainLayout;
use wargame_sim::core::config::SimulationConfig;
use wargame_sim::core::types::Point;
use wargame_sim::data::army_list::ArmyList;

fn load_army(name: &str) -> ArmyList {
    let path = format!("{}/data/armies/{name}", env!("CARGO_MANIFEST_DIR"));
    ArmyList::from_json_file(&path).unwrap_or_else(|e| panic!("Failed to load {path}: {e}"))
}

fn bench_full_battle(c: &mut Criterion) {
    let iron = load_army("iron_legion.json");
    let orks = load_army("ork_warband.json");

    let mut group = c.benchmark_group("battle");
    for layout in ["none", "standard", "dense"] {
        let config = SimulationConfig {
            terrain_layout: Some(layout.to_string()),
            ..Default::default()
        };
        group.bench_function(format!("greedy_{layout}"), |b| {
            b.iter(|| black_box(run_simulation(config.clone(), &iron, &orks)))
        });
    }

    let beam = SimulationConfig {
        terrain_layout: Some("standard".to_string()),
        use_beam_search: true,
        beam_width: 4,
        ..Default::default()
    };
    group.bench_function("beam4_standard", |b| {
        b.iter(|| black_box(run_simulation(beam.clone(), &iron, &orks)))
    });
    group.finish();
}

fn bench_pathfinding(c: &mut Criterion) {
    let terrain = TerrainLayout::Dense.features(60.0, 44.0);
    let mesh = generate_nav_mesh(&terrain, 60.0, 44.0, 1.13);

    c.bench_function("nav_mesh_dense", |b| {
        b.iter(|| black_box(generate_nav_mesh(black_box(&terrain), 60.0, 44.0, 1.13)))
    });
    c.bench_function("find_path_across_dense", |b| {
        b.iter(|| {
            black_box(find_path(
                black_box(Point::new(4.0, 22.0)),
                black_box(Point::new(56.0, 22.0)),
                &mesh,
                &terrain,
                true,
                false,
                0.63,
            ))
        })
    });
}

criterion_group!(benches, bench_full_battle, bench_pathfinding);
criterion_main!(benches);
