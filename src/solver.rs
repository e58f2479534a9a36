// src/solver.rs

use std::ops::Range;
use std::time::Instant;

use log::{debug, info, trace, warn};
use ndarray::{s, Array2, ArrayViewMut2};
use serde::{Deserialize, Serialize};

use crate::block_system::{solve_tile, substitute_direct, substitute_transposed, SweepMode, Transpose};
use crate::dif_estimate::DifStrategy;
use crate::partition::BlockPartition;
use crate::pencil::SchurPencil;
use crate::sum_of_squares::ScaledSumOfSquares;
use crate::ThreadSafeStdError;

/// What a call to [`GeneralizedSylvesterSolver::solve`] computes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SolveJob {
    /// Solve the equation only.
    #[default]
    Solve,
    /// Solve the equation, then estimate Dif with a second pass. `C`, `F` receive the
    /// solution of the first pass.
    SolveAndDif(DifStrategy),
    /// Estimate Dif only. `C`, `F` are zeroed and receive the estimator's vectors.
    DifOnly(DifStrategy),
}

impl SolveJob {
    /// Dif strategy requested by this job, if any.
    pub fn dif_strategy(self) -> Option<DifStrategy> {
        match self {
            SolveJob::Solve => None,
            SolveJob::SolveAndDif(strategy) | SolveJob::DifOnly(strategy) => Some(strategy),
        }
    }
}

/// Output of a solve.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SylvesterSolution {
    /// Factor in (0, 1] by which `C`, `F` were scaled to keep the solution representable.
    pub scale: f64,
    /// Dif estimate for jobs that request one.
    pub dif: Option<f64>,
    /// Index (within its small system) of the last pivot that had to be perturbed.
    /// `Some` means the two pencils have common or very close eigenvalues and the
    /// solution may be inaccurate; it is advisory, not a failure.
    pub perturbed_pivot: Option<usize>,
}

/// Tiling parameters of the blocked solver.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SylvesterSolverConfig {
    /// Rows of `A` per tile. A tile is extended by one row rather than split a 2x2 block.
    pub tile_rows: usize,
    /// Columns of `B` per tile.
    pub tile_cols: usize,
}

impl Default for SylvesterSolverConfig {
    fn default() -> Self {
        SylvesterSolverConfig {
            tile_rows: 32,
            tile_cols: 32,
        }
    }
}

impl SylvesterSolverConfig {
    /// Tile sizes used for an `m x n` problem.
    pub fn tile_sizes(&self, _m: usize, _n: usize) -> (usize, usize) {
        (self.tile_rows, self.tile_cols)
    }

    fn validate(&self) -> Result<(), ThreadSafeStdError> {
        if self.tile_rows == 0 || self.tile_cols == 0 {
            return Err(format!(
                "Tile sizes must be at least 1, got {}x{}.",
                self.tile_rows, self.tile_cols
            )
            .into());
        }
        Ok(())
    }
}

/// Solver for the generalized Sylvester equation
///
/// ```text
/// A R - L B = scale C
/// D R - L E = scale F
/// ```
///
/// (or its transpose) where `(A, D)` and `(B, E)` are in generalized Schur form, with
/// optional estimation of `Dif[(A, D), (B, E)]`.
///
/// The problem is swept block pair by block pair in dependency order; large problems
/// are tiled and tiles are coupled through matrix products. A solve never fails for
/// numerical reasons: near-singular small systems are perturbed and reported through
/// [`SylvesterSolution::perturbed_pivot`], and the right-hand side is scaled down
/// whenever the solution would otherwise overflow.
#[derive(Debug, Clone, Default)]
pub struct GeneralizedSylvesterSolver {
    config: SylvesterSolverConfig,
}

/// Result of one sweep over the whole problem.
struct PassOutcome {
    scale: f64,
    perturbed_pivot: Option<usize>,
    subsystems: usize,
    acc: ScaledSumOfSquares,
}

impl GeneralizedSylvesterSolver {
    pub fn new(config: SylvesterSolverConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SylvesterSolverConfig {
        &self.config
    }

    /// Solves the equation selected by `trans` in place: on return `c` holds `R` and
    /// `f` holds `L` (see [`SolveJob`] for the Dif-only job).
    ///
    /// * `left` - the pencil `(A, D)`, order `m`.
    /// * `right` - the pencil `(B, E)`, order `n`.
    /// * `c`, `f` - `m x n` right-hand sides.
    ///
    /// # Errors
    /// Returns an error if the shapes of `c`, `f` do not match the pencils or the tiling
    /// configuration is invalid. A Dif job combined with the transposed equation is
    /// not an error: the equation is solved and `dif` is `None`.
    ///
    /// # Examples
    ///
    /// ```
    /// use gsylv::{GeneralizedSylvesterSolver, SchurPencil, SolveJob, Transpose};
    /// use ndarray::array;
    ///
    /// let a = array![[2.0]];
    /// let d = array![[1.0]];
    /// let b = array![[-1.0]];
    /// let e = array![[1.0]];
    /// let mut c = array![[3.0]];
    /// let mut f = array![[0.0]];
    ///
    /// let left = SchurPencil::new(a.view(), d.view()).unwrap();
    /// let right = SchurPencil::new(b.view(), e.view()).unwrap();
    /// let solver = GeneralizedSylvesterSolver::default();
    /// let solution = solver
    ///     .solve(Transpose::NoTranspose, SolveJob::Solve, left, right, c.view_mut(), f.view_mut())
    ///     .unwrap();
    ///
    /// // 2 r + l = 3 and r - l = 0
    /// assert_eq!(solution.scale, 1.0);
    /// assert!((c[[0, 0]] - 1.0).abs() < 1e-14);
    /// assert!((f[[0, 0]] - 1.0).abs() < 1e-14);
    /// ```
    pub fn solve(
        &self,
        trans: Transpose,
        job: SolveJob,
        left: SchurPencil,
        right: SchurPencil,
        mut c: ArrayViewMut2<f64>,
        mut f: ArrayViewMut2<f64>,
    ) -> Result<SylvesterSolution, ThreadSafeStdError> {
        self.config.validate()?;
        let (m, n) = (left.order(), right.order());
        if c.dim() != (m, n) {
            return Err(format!(
                "C must be {}x{} to match the pencils, got {}x{}.",
                m,
                n,
                c.nrows(),
                c.ncols()
            )
            .into());
        }
        if f.dim() != (m, n) {
            return Err(format!(
                "F must be {}x{} to match the pencils, got {}x{}.",
                m,
                n,
                f.nrows(),
                f.ncols()
            )
            .into());
        }
        let job = if trans == Transpose::Transpose && job.dif_strategy().is_some() {
            warn!(
                "Dif estimation is only defined for the non-transposed equation; {:?} is solved without it.",
                job
            );
            SolveJob::Solve
        } else {
            job
        };

        if m == 0 || n == 0 {
            debug!("Empty generalized Sylvester problem ({}x{}); nothing to solve.", m, n);
            return Ok(SylvesterSolution {
                scale: 1.0,
                dif: job.dif_strategy().map(|_| 0.0),
                perturbed_pivot: None,
            });
        }

        info!(
            "Solving generalized Sylvester equation: m={}, n={}, transpose={:?}, job={:?}",
            m, n, trans, job
        );
        let start_time = Instant::now();

        let solution = match job {
            SolveJob::Solve => {
                let pass = self.run_pass(trans, SweepMode::Solve, &left, &right, &mut c, &mut f)?;
                SylvesterSolution {
                    scale: pass.scale,
                    dif: None,
                    perturbed_pivot: pass.perturbed_pivot,
                }
            }
            SolveJob::SolveAndDif(strategy) => {
                let solved = self.run_pass(trans, SweepMode::Solve, &left, &right, &mut c, &mut f)?;
                let solved_c = c.to_owned();
                let solved_f = f.to_owned();

                c.fill(0.0);
                f.fill(0.0);
                debug!("Solution cached; starting Dif pass with {:?}.", strategy);
                let dif_pass = self.run_pass(trans, SweepMode::Dif(strategy), &left, &right, &mut c, &mut f)?;

                c.assign(&solved_c);
                f.assign(&solved_f);
                SylvesterSolution {
                    scale: solved.scale,
                    dif: Some(dif_from_pass(strategy, &dif_pass, m, n)),
                    perturbed_pivot: dif_pass.perturbed_pivot.or(solved.perturbed_pivot),
                }
            }
            SolveJob::DifOnly(strategy) => {
                c.fill(0.0);
                f.fill(0.0);
                let dif_pass = self.run_pass(trans, SweepMode::Dif(strategy), &left, &right, &mut c, &mut f)?;
                SylvesterSolution {
                    scale: 1.0,
                    dif: Some(dif_from_pass(strategy, &dif_pass, m, n)),
                    perturbed_pivot: dif_pass.perturbed_pivot,
                }
            }
        };

        if let Some(pivot) = solution.perturbed_pivot {
            warn!(
                "A pivot of a small system had to be perturbed (index {}); (A, D) and (B, E) have common or very close eigenvalues.",
                pivot
            );
        }
        info!(
            "Generalized Sylvester solve finished in {:?} (scale={:e}, dif={:?}).",
            start_time.elapsed(),
            solution.scale,
            solution.dif
        );
        Ok(solution)
    }

    /// Estimates `Dif[(A, D), (B, E)]` without touching any caller data.
    ///
    /// # Errors
    /// Same conditions as [`GeneralizedSylvesterSolver::solve`].
    pub fn estimate_dif(
        &self,
        left: SchurPencil,
        right: SchurPencil,
        strategy: DifStrategy,
    ) -> Result<f64, ThreadSafeStdError> {
        let (m, n) = (left.order(), right.order());
        let mut c = Array2::<f64>::zeros((m, n));
        let mut f = Array2::<f64>::zeros((m, n));
        let solution = self.solve(
            Transpose::NoTranspose,
            SolveJob::DifOnly(strategy),
            left,
            right,
            c.view_mut(),
            f.view_mut(),
        )?;
        Ok(solution.dif.unwrap_or(0.0))
    }

    /// One sweep over the whole problem, unblocked or over the tile grid.
    fn run_pass(
        &self,
        trans: Transpose,
        mode: SweepMode,
        left: &SchurPencil,
        right: &SchurPencil,
        c: &mut ArrayViewMut2<f64>,
        f: &mut ArrayViewMut2<f64>,
    ) -> Result<PassOutcome, ThreadSafeStdError> {
        let (m, n) = (left.order(), right.order());
        let (tile_rows, tile_cols) = self.config.tile_sizes(m, n);
        let mut acc = ScaledSumOfSquares::new();

        if (tile_rows <= 1 && tile_cols <= 1) || (tile_rows >= m && tile_cols >= n) {
            debug!("Unblocked sweep over {}x{} problem ({:?}).", m, n, mode);
            let outcome = solve_tile(trans, mode, left, right, c, f, &mut acc)?;
            return Ok(PassOutcome {
                scale: outcome.scale,
                perturbed_pivot: outcome.perturbed_pivot,
                subsystems: outcome.subsystems,
                acc,
            });
        }

        let row_tiles = BlockPartition::tiles(left.quasi(), tile_rows);
        let col_tiles = BlockPartition::tiles(right.quasi(), tile_cols);
        debug!(
            "Blocked sweep over {}x{} problem: {} row tiles x {} column tiles ({:?}).",
            m,
            n,
            row_tiles.len(),
            col_tiles.len(),
            mode
        );

        let mut pass = PassOutcome {
            scale: 1.0,
            perturbed_pivot: None,
            subsystems: 0,
            acc,
        };
        match trans {
            Transpose::NoTranspose => {
                for cols in col_tiles.blocks() {
                    for rows in row_tiles.blocks().rev() {
                        solve_grid_tile(trans, mode, left, right, (rows, cols.clone()), c, f, &mut pass)?;
                    }
                }
            }
            Transpose::Transpose => {
                for rows in row_tiles.blocks() {
                    for cols in col_tiles.blocks().rev() {
                        solve_grid_tile(trans, mode, left, right, (rows.clone(), cols), c, f, &mut pass)?;
                    }
                }
            }
        }
        Ok(pass)
    }
}

/// Solves one tile of the grid, rescales the rest of the problem if the tile had to be
/// scaled, and substitutes the tile's solution into the tiles that depend on it.
#[allow(clippy::too_many_arguments)]
fn solve_grid_tile(
    trans: Transpose,
    mode: SweepMode,
    left: &SchurPencil,
    right: &SchurPencil,
    (rows, cols): (Range<usize>, Range<usize>),
    c: &mut ArrayViewMut2<f64>,
    f: &mut ArrayViewMut2<f64>,
    pass: &mut PassOutcome,
) -> Result<(), ThreadSafeStdError> {
    trace!("Solving tile rows {:?} x cols {:?}.", rows, cols);
    let left_tile = left.diagonal_tile(rows.clone());
    let right_tile = right.diagonal_tile(cols.clone());

    let outcome = {
        let mut c_tile = c.slice_mut(s![rows.clone(), cols.clone()]);
        let mut f_tile = f.slice_mut(s![rows.clone(), cols.clone()]);
        solve_tile(trans, mode, &left_tile, &right_tile, &mut c_tile, &mut f_tile, &mut pass.acc)?
    };
    pass.subsystems += outcome.subsystems;
    if outcome.perturbed_pivot.is_some() {
        pass.perturbed_pivot = outcome.perturbed_pivot;
    }
    if outcome.scale != 1.0 {
        trace!(
            "Tile rows {:?} x cols {:?} scaled by {:e}; rescaling the rest of C and F.",
            rows,
            cols,
            outcome.scale
        );
        scale_outside_tile(c, &rows, &cols, outcome.scale);
        scale_outside_tile(f, &rows, &cols, outcome.scale);
        pass.scale *= outcome.scale;
    }

    let r_tile = c.slice(s![rows.clone(), cols.clone()]).to_owned();
    let l_tile = f.slice(s![rows.clone(), cols.clone()]).to_owned();
    match trans {
        Transpose::NoTranspose => substitute_direct(left, right, (rows, cols), &r_tile, &l_tile, c, f),
        Transpose::Transpose => substitute_transposed(left, right, (rows, cols), &r_tile, &l_tile, c, f),
    }
    Ok(())
}

/// Multiplies every entry of `matrix` outside `rows x cols` by `factor`.
fn scale_outside_tile(matrix: &mut ArrayViewMut2<f64>, rows: &Range<usize>, cols: &Range<usize>, factor: f64) {
    matrix.slice_mut(s![.., ..cols.start]).mapv_inplace(|v| v * factor);
    matrix.slice_mut(s![.., cols.end..]).mapv_inplace(|v| v * factor);
    matrix.slice_mut(s![..rows.start, cols.clone()]).mapv_inplace(|v| v * factor);
    matrix.slice_mut(s![rows.end.., cols.clone()]).mapv_inplace(|v| v * factor);
}

/// `sqrt(count) / |x|` where `|x|` is the accumulated norm of the estimator's
/// solutions and `count` the number of unit right-hand-side entries (look-ahead) or
/// of unit-norm right-hand sides (null vector) that produced them.
fn dif_from_pass(strategy: DifStrategy, pass: &PassOutcome, m: usize, n: usize) -> f64 {
    if pass.acc.is_empty() {
        return 0.0;
    }
    let count = match strategy {
        DifStrategy::LookAhead => 2 * m * n,
        DifStrategy::NullVector => pass.subsystems,
    };
    (count as f64).sqrt() / (pass.acc.scale * pass.acc.sum_sq.sqrt())
}
