use criterion::{BatchSize, Criterion, criterion_group, criterion_main};
use molsim_core::{AtomSpec, BoxConfig, DIM, GroupId, SimBox, Vector};
use molsim_index::{CellGrid, CutoffCriterion, Direction, IndexConfig};
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|s| s.parse::<T>().ok())
        .unwrap_or(default)
}

fn populated(atoms: usize, density: f64, seed: u64) -> SimBox {
    let edge = (atoms as f64 / density).cbrt();
    let config = BoxConfig {
        dimensions: [edge; DIM],
        ..BoxConfig::default()
    };
    let mut sim = SimBox::new(&config).expect("box");
    let mut rng = SmallRng::seed_from_u64(seed);
    for _ in 0..atoms {
        let position: Vector = std::array::from_fn(|_| rng.random_range(-0.5 * edge..0.5 * edge));
        sim.add_atom(AtomSpec::new(position, GroupId(0))).expect("add");
    }
    sim
}

fn bench_grid(c: &mut Criterion) {
    let mut group = c.benchmark_group("cell_grid");
    group.sample_size(env_or("MOLSIM_BENCH_SAMPLES", 20_usize).max(10));
    group.warm_up_time(Duration::from_secs(env_or("MOLSIM_BENCH_WARMUP_SECS", 1)));
    group.measurement_time(Duration::from_secs(env_or("MOLSIM_BENCH_MEASURE_SECS", 5)));
    let range: f64 = env_or("MOLSIM_BENCH_RANGE", 2.5);
    // Liquid-like number density in reduced units.
    let density: f64 = env_or("MOLSIM_BENCH_DENSITY", 0.8);
    let sizes: Vec<usize> = std::env::var("MOLSIM_BENCH_ATOMS")
        .ok()
        .map(|s| {
            s.split(',')
                .filter_map(|t| t.trim().parse::<usize>().ok())
                .collect::<Vec<_>>()
        })
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| vec![1_000_usize, 8_000]);

    for &atoms in &sizes {
        group.bench_function(format!("populate_atoms{atoms}"), |b| {
            b.iter_batched(
                || populated(atoms, density, 0xC311),
                |sim| {
                    let grid = CellGrid::from_view(&sim.view(), IndexConfig::with_range(range))
                        .expect("grid");
                    std::hint::black_box(grid.assigned());
                },
                BatchSize::LargeInput,
            );
        });

        group.bench_function(format!("half_pairs_atoms{atoms}"), |b| {
            let sim = populated(atoms, density, 0xC311);
            let grid =
                CellGrid::from_view(&sim.view(), IndexConfig::with_range(range)).expect("grid");
            let criterion = CutoffCriterion::new(range).expect("criterion");
            b.iter(|| {
                let mut pairs = 0_usize;
                for reference in grid.sequential(GroupId(0)) {
                    pairs += grid
                        .neighbors_matching(sim.view(), reference, Direction::Up, &criterion)
                        .expect("neighbors")
                        .count();
                }
                std::hint::black_box(pairs)
            });
        });

        group.bench_function(format!("random_moves_atoms{atoms}"), |b| {
            b.iter_batched(
                || {
                    let mut sim = populated(atoms, density, 0xC311);
                    let grid =
                        CellGrid::from_view(&sim.view(), IndexConfig::with_range(range))
                            .expect("grid");
                    let grid = Rc::new(RefCell::new(grid));
                    sim.add_listener(grid.clone());
                    (sim, grid, SmallRng::seed_from_u64(7))
                },
                |(mut sim, grid, mut rng)| {
                    for index in 0..atoms {
                        let delta: Vector = std::array::from_fn(|_| rng.random_range(-0.1..0.1));
                        sim.translate_atom(index, &delta).expect("move");
                    }
                    std::hint::black_box(grid.borrow().assigned());
                },
                BatchSize::LargeInput,
            );
        });
    }
    group.finish();
}

criterion_group!(grid_benches, bench_grid);
criterion_main!(grid_benches);
