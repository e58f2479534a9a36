// Solves a small generalized Sylvester equation, checks the residual and estimates Dif.

use gsylv::{
    sylvester_residuals, DifStrategy, GeneralizedSylvesterSolver, SchurPencil, SolveJob, SylvesterSolverConfig,
    ThreadSafeStdError, Transpose,
};
use ndarray::arr2;

fn main() -> Result<(), ThreadSafeStdError> {
    // (A, D): a 2x2 block with eigenvalues 1 +- 0.5i followed by the eigenvalue 3.
    let a = arr2(&[[1.0, 0.5, 0.2], [-0.5, 1.0, 0.1], [0.0, 0.0, 3.0]]);
    let d = arr2(&[[1.0, 0.0, 0.3], [0.0, 1.0, -0.2], [0.0, 0.0, 1.0]]);
    // (B, E): eigenvalues -1 and -2.
    let b = arr2(&[[-1.0, 0.4], [0.0, -2.0]]);
    let e = arr2(&[[1.0, 0.1], [0.0, 1.0]]);

    let c0 = arr2(&[[1.0, 2.0], [0.5, -1.0], [0.0, 3.0]]);
    let f0 = arr2(&[[0.0, 1.0], [1.0, 0.0], [-2.0, 0.5]]);

    let left = SchurPencil::new(a.view(), d.view())?;
    let right = SchurPencil::new(b.view(), e.view())?;
    let solver = GeneralizedSylvesterSolver::new(SylvesterSolverConfig::default());

    for trans in [Transpose::NoTranspose, Transpose::Transpose] {
        let mut c = c0.clone();
        let mut f = f0.clone();
        let solution = solver.solve(trans, SolveJob::Solve, left, right, c.view_mut(), f.view_mut())?;
        let residuals = sylvester_residuals(
            trans,
            &left,
            &right,
            &c.view(),
            &f.view(),
            &c0.view(),
            &f0.view(),
            solution.scale,
        );
        println!("{:?}: scale = {}", trans, solution.scale);
        println!("R =\n{:.6}", c);
        println!("L =\n{:.6}", f);
        println!("relative residual = {:e}\n", residuals.max_relative());
    }

    for strategy in [DifStrategy::LookAhead, DifStrategy::NullVector] {
        let dif = solver.estimate_dif(left, right, strategy)?;
        println!("Dif estimate ({:?}) = {:.6}", strategy, dif);
    }
    Ok(())
}
