// Generalized Sylvester equation solver with Dif estimation

#![doc = include_str!("../README.md")]

use std::error::Error;

pub mod block_system;
pub mod diagnostics;
pub mod dif_estimate;
pub mod machine;
pub mod partition;
pub mod pencil;
pub mod pivoted_lu;
pub mod solver;
pub mod sum_of_squares;


/// Error type returned by every fallible operation of the crate.
pub type ThreadSafeStdError = Box<dyn Error + Send + Sync + 'static>;

pub use block_system::{BlockShape, Transpose};
pub use diagnostics::{frobenius_norm, sylvester_residuals, SylvesterResiduals};
pub use dif_estimate::DifStrategy;
pub use machine::MachineConstants;
pub use partition::BlockPartition;
pub use pencil::SchurPencil;
pub use pivoted_lu::PivotedLu;
pub use solver::{GeneralizedSylvesterSolver, SolveJob, SylvesterSolution, SylvesterSolverConfig};
pub use sum_of_squares::ScaledSumOfSquares;
