use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use gsylv::{DifStrategy, GeneralizedSylvesterSolver, SchurPencil, SolveJob, SylvesterSolverConfig, Transpose};
use ndarray::Array2;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::hint::black_box;

/// Random pencil in generalized Schur form with a 2x2 block at every index `i % 3 == 1`.
/// `sign` fixes the sign of the real parts of the eigenvalues.
fn generate_schur_pencil(order: usize, sign: f64, seed: u64) -> (Array2<f64>, Array2<f64>) {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut quasi = Array2::<f64>::zeros((order, order));
    let mut tri = Array2::<f64>::zeros((order, order));
    for i in 0..order {
        quasi[[i, i]] = sign * rng.gen_range(1.0..3.0);
        tri[[i, i]] = rng.gen_range(0.5..1.5);
        for j in i + 1..order {
            quasi[[i, j]] = rng.gen_range(-1.0..1.0) / (order as f64).sqrt();
            tri[[i, j]] = rng.gen_range(-0.5..0.5) / (order as f64).sqrt();
        }
    }
    let mut i = 1;
    while i + 1 < order {
        quasi[[i + 1, i + 1]] = quasi[[i, i]];
        quasi[[i + 1, i]] = -rng.gen_range(0.5..1.0);
        tri[[i, i + 1]] = 0.0;
        i += 3;
    }
    (quasi, tri)
}

fn generate_rhs(m: usize, n: usize, seed: u64) -> Array2<f64> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    Array2::from_shape_fn((m, n), |_| rng.gen_range(-1.0..1.0))
}

fn determine_appropriate_sample_size(m: usize, n: usize) -> usize {
    match m * n {
        size if size >= 250_000 => 10,
        size if size >= 40_000 => 20,
        _ => 100,
    }
}

fn criterion_benchmark_runner(c: &mut Criterion) {
    let scenarios = vec![
        ("Small", 16, 16, 1234),
        ("Medium", 100, 80, 1234),
        ("Large", 300, 300, 1234),
        ("Tall", 600, 40, 1234),
        ("Wide", 40, 600, 1234),
    ];
    let tilings = vec![
        ("unblocked", SylvesterSolverConfig { tile_rows: 1_000_000, tile_cols: 1_000_000 }),
        ("tiles32", SylvesterSolverConfig::default()),
        ("tiles64", SylvesterSolverConfig { tile_rows: 64, tile_cols: 64 }),
    ];

    for (name, m, n, seed) in scenarios {
        let (a, d) = generate_schur_pencil(m, 1.0, seed);
        let (b, e) = generate_schur_pencil(n, -1.0, seed + 1);
        let c0 = generate_rhs(m, n, seed + 2);
        let f0 = generate_rhs(m, n, seed + 3);
        let left = SchurPencil::new(a.view(), d.view()).expect("benchmark pencil must be valid");
        let right = SchurPencil::new(b.view(), e.view()).expect("benchmark pencil must be valid");

        // --- Solve ---
        let mut solve_group = c.benchmark_group(format!("solve/{}", name));
        solve_group.sample_size(determine_appropriate_sample_size(m, n));
        solve_group.throughput(Throughput::Elements((m * n) as u64));
        for (tiling_name, config) in &tilings {
            let solver = GeneralizedSylvesterSolver::new(config.clone());
            for trans in [Transpose::NoTranspose, Transpose::Transpose] {
                let id = BenchmarkId::new(format!("{}/{:?}", tiling_name, trans), format!("m{}_n{}", m, n));
                solve_group.bench_with_input(id, &(&c0, &f0), |bencher, (c_in, f_in)| {
                    bencher.iter(|| {
                        let mut c = (*c_in).clone();
                        let mut f = (*f_in).clone();
                        let solution = solver
                            .solve(trans, SolveJob::Solve, left, right, c.view_mut(), f.view_mut())
                            .expect("solve failed");
                        black_box((solution, c, f))
                    });
                });
            }
        }
        solve_group.finish();

        // --- Dif ---
        let mut dif_group = c.benchmark_group(format!("dif/{}", name));
        dif_group.sample_size(determine_appropriate_sample_size(m, n));
        dif_group.throughput(Throughput::Elements((m * n) as u64));
        let solver = GeneralizedSylvesterSolver::default();
        for strategy in [DifStrategy::LookAhead, DifStrategy::NullVector] {
            let id = BenchmarkId::new(format!("{:?}", strategy), format!("m{}_n{}", m, n));
            dif_group.bench_function(id, |bencher| {
                bencher.iter(|| black_box(solver.estimate_dif(left, right, strategy).expect("estimate failed")));
            });
        }
        dif_group.finish();
    }
}

criterion_group!(benches, criterion_benchmark_runner);
criterion_main!(benches);
