// tests/dif_tests.rs

mod common;

use common::{random_matrix, random_schur_pencil};
use float_cmp::approx_eq;
use gsylv::{DifStrategy, GeneralizedSylvesterSolver, SchurPencil, SolveJob, SylvesterSolverConfig, Transpose};
use ndarray::{arr2, Array2};

const STRATEGIES: [DifStrategy; 2] = [DifStrategy::LookAhead, DifStrategy::NullVector];

/// Extreme singular values of a 2x2 matrix.
fn singular_values_2x2(m: &Array2<f64>) -> (f64, f64) {
    let frob_sq = m.iter().map(|v| v * v).sum::<f64>();
    let det = m[[0, 0]] * m[[1, 1]] - m[[0, 1]] * m[[1, 0]];
    let disc = (frob_sq * frob_sq - 4.0 * det * det).max(0.0).sqrt();
    let largest = ((frob_sq + disc) / 2.0).sqrt();
    let smallest = if largest > 0.0 { det.abs() / largest } else { 0.0 };
    (smallest, largest)
}

fn scalar_dif(a: f64, d: f64, b: f64, e: f64, strategy: DifStrategy) -> f64 {
    let (a, d, b, e) = (arr2(&[[a]]), arr2(&[[d]]), arr2(&[[b]]), arr2(&[[e]]));
    let left = SchurPencil::new(a.view(), d.view()).unwrap();
    let right = SchurPencil::new(b.view(), e.view()).unwrap();
    GeneralizedSylvesterSolver::default()
        .estimate_dif(left, right, strategy)
        .unwrap()
}

#[test]
fn scalar_estimate_lies_between_extreme_singular_values() {
    for &(a, d, b, e) in &[(2.0, 1.0, -1.0, 1.0), (1.5, 0.7, -0.3, 2.0), (3.0, 1.0, 0.5, 1.0)] {
        // Z = [a -b; d -e]
        let z = arr2(&[[a, -b], [d, -e]]);
        let (sigma_min, sigma_max) = singular_values_2x2(&z);
        for strategy in STRATEGIES {
            let dif = scalar_dif(a, d, b, e, strategy);
            assert!(
                dif >= sigma_min * (1.0 - 1e-12) && dif <= sigma_max * (1.0 + 1e-12),
                "{:?}: dif {} outside [{}, {}]",
                strategy,
                dif,
                sigma_min,
                sigma_max
            );
        }
    }
}

#[test]
fn close_eigenvalues_give_a_small_estimate() {
    let delta = 1e-8;
    for strategy in STRATEGIES {
        let close = scalar_dif(1.0, 1.0, 1.0 + delta, 1.0, strategy);
        let separated = scalar_dif(2.0, 1.0, -2.0, 1.0, strategy);
        assert!(close < 1e-6, "{:?}: close spectra gave {}", strategy, close);
        assert!(separated > 0.5, "{:?}: separated spectra gave {}", strategy, separated);
    }
}

#[test]
fn random_estimates_are_positive_and_finite() {
    for &(m, n) in &[(1, 3), (4, 4), (7, 5), (12, 9)] {
        let (a, d) = random_schur_pencil(m, 1.0, true, 100 + m as u64);
        let (b, e) = random_schur_pencil(n, -1.0, true, 200 + n as u64);
        let left = SchurPencil::new(a.view(), d.view()).unwrap();
        let right = SchurPencil::new(b.view(), e.view()).unwrap();
        for strategy in STRATEGIES {
            let dif = GeneralizedSylvesterSolver::default()
                .estimate_dif(left, right, strategy)
                .unwrap();
            assert!(dif.is_finite() && dif > 0.0, "{}x{} {:?}: dif = {}", m, n, strategy, dif);
        }
    }
}

#[test]
fn solve_and_dif_returns_the_plain_solution() {
    let (m, n) = (6, 7);
    let (a, d) = random_schur_pencil(m, 1.0, true, 301);
    let (b, e) = random_schur_pencil(n, -1.0, true, 302);
    let c0 = random_matrix(m, n, 303);
    let f0 = random_matrix(m, n, 304);
    let left = SchurPencil::new(a.view(), d.view()).unwrap();
    let right = SchurPencil::new(b.view(), e.view()).unwrap();
    let solver = GeneralizedSylvesterSolver::default();

    let mut c_plain = c0.clone();
    let mut f_plain = f0.clone();
    let plain = solver
        .solve(Transpose::NoTranspose, SolveJob::Solve, left, right, c_plain.view_mut(), f_plain.view_mut())
        .unwrap();

    for strategy in STRATEGIES {
        let mut c = c0.clone();
        let mut f = f0.clone();
        let with_dif = solver
            .solve(
                Transpose::NoTranspose,
                SolveJob::SolveAndDif(strategy),
                left,
                right,
                c.view_mut(),
                f.view_mut(),
            )
            .unwrap();
        assert_eq!(with_dif.scale, plain.scale);
        assert_eq!(c, c_plain);
        assert_eq!(f, f_plain);

        let dif_only = solver.estimate_dif(left, right, strategy).unwrap();
        let dif = with_dif.dif.unwrap();
        assert!(approx_eq!(f64, dif, dif_only, ulps = 4), "{} vs {}", dif, dif_only);
    }
}

#[test]
fn dif_only_overwrites_right_hand_sides_and_reports_unit_scale() {
    let (m, n) = (5, 4);
    let (a, d) = random_schur_pencil(m, 1.0, true, 401);
    let (b, e) = random_schur_pencil(n, -1.0, false, 402);
    let left = SchurPencil::new(a.view(), d.view()).unwrap();
    let right = SchurPencil::new(b.view(), e.view()).unwrap();

    let mut c = Array2::<f64>::from_elem((m, n), 1e200);
    let mut f = Array2::<f64>::from_elem((m, n), -1e200);
    let solution = GeneralizedSylvesterSolver::default()
        .solve(
            Transpose::NoTranspose,
            SolveJob::DifOnly(DifStrategy::LookAhead),
            left,
            right,
            c.view_mut(),
            f.view_mut(),
        )
        .unwrap();
    assert_eq!(solution.scale, 1.0);
    let dif = solution.dif.unwrap();
    assert!(dif.is_finite() && dif > 0.0);
    // The incoming right-hand sides are discarded before the estimate.
    assert!(c.iter().chain(f.iter()).all(|v| v.abs() < 1e10));
}

#[test]
fn blocked_estimates_stay_positive_and_comparable() {
    let (m, n) = (13, 11);
    let (a, d) = random_schur_pencil(m, 1.0, true, 501);
    let (b, e) = random_schur_pencil(n, -1.0, true, 502);
    let left = SchurPencil::new(a.view(), d.view()).unwrap();
    let right = SchurPencil::new(b.view(), e.view()).unwrap();

    for strategy in STRATEGIES {
        let unblocked = GeneralizedSylvesterSolver::default()
            .estimate_dif(left, right, strategy)
            .unwrap();
        let blocked = GeneralizedSylvesterSolver::new(SylvesterSolverConfig {
            tile_rows: 4,
            tile_cols: 3,
        })
        .estimate_dif(left, right, strategy)
        .unwrap();
        assert!(blocked.is_finite() && blocked > 0.0);
        // Both are estimates of the same quantity; tiling only changes which
        // right-hand sides are picked.
        let ratio = blocked / unblocked;
        assert!(ratio > 1e-2 && ratio < 1e2, "{:?}: blocked {} vs unblocked {}", strategy, blocked, unblocked);
    }
}
