// tests/common/mod.rs
#![allow(dead_code)]

use ndarray::{Array2, ArrayView2};
use ndarray_rand::rand_distr::Uniform;
use ndarray_rand::RandomExt;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rand_distr::Normal;

/// A random pencil `(quasi, tri)` in generalized Schur form.
///
/// Diagonal entries of `quasi` have the sign of `sign` and magnitude in [1, 3]; when
/// `with_blocks` is set, every index `i` with `i % 3 == 1` starts a 2x2 block with
/// complex conjugate eigenvalues. `tri` is upper triangular with a diagonal in
/// [0.5, 1.5] and zero coupling inside 2x2 blocks. Pencils built with opposite signs
/// therefore have well-separated spectra.
pub fn random_schur_pencil(order: usize, sign: f64, with_blocks: bool, seed: u64) -> (Array2<f64>, Array2<f64>) {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut quasi = Array2::random_using((order, order), Uniform::new(-1.0, 1.0), &mut rng);
    let mut tri = Array2::random_using((order, order), Uniform::new(-0.5, 0.5), &mut rng);
    for i in 0..order {
        for j in 0..i {
            quasi[[i, j]] = 0.0;
            tri[[i, j]] = 0.0;
        }
        quasi[[i, i]] = sign * rng.gen_range(1.0..3.0);
        tri[[i, i]] = rng.gen_range(0.5..1.5);
    }

    if with_blocks {
        let mut i = 1;
        while i + 1 < order {
            let alpha = quasi[[i, i]];
            quasi[[i + 1, i + 1]] = alpha;
            quasi[[i, i + 1]] = rng.gen_range(0.5..1.0);
            quasi[[i + 1, i]] = -rng.gen_range(0.5..1.0);
            tri[[i, i + 1]] = 0.0;
            i += 3;
        }
    }
    (quasi, tri)
}

/// Matrix of standard normal entries.
pub fn random_matrix(rows: usize, cols: usize, seed: u64) -> Array2<f64> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let normal = Normal::new(0.0, 1.0).unwrap();
    Array2::random_using((rows, cols), normal, &mut rng)
}

/// Builds `(C, F)` from a known solution `(R, L)` of the direct equation.
pub fn direct_right_hand_sides(
    a: &ArrayView2<f64>,
    d: &ArrayView2<f64>,
    b: &ArrayView2<f64>,
    e: &ArrayView2<f64>,
    r: &ArrayView2<f64>,
    l: &ArrayView2<f64>,
) -> (Array2<f64>, Array2<f64>) {
    (a.dot(r) - l.dot(b), d.dot(r) - l.dot(e))
}

/// Builds `(C, F)` from a known solution `(R, L)` of the transposed equation.
pub fn transposed_right_hand_sides(
    a: &ArrayView2<f64>,
    d: &ArrayView2<f64>,
    b: &ArrayView2<f64>,
    e: &ArrayView2<f64>,
    r: &ArrayView2<f64>,
    l: &ArrayView2<f64>,
) -> (Array2<f64>, Array2<f64>) {
    (
        a.t().dot(r) + d.t().dot(l),
        -(r.dot(&b.t()) + l.dot(&e.t())),
    )
}

pub fn max_abs_diff(x: &ArrayView2<f64>, y: &ArrayView2<f64>) -> f64 {
    assert_eq!(x.dim(), y.dim(), "shape mismatch");
    x.iter()
        .zip(y.iter())
        .map(|(a, b)| (a - b).abs())
        .fold(0.0, f64::max)
}
