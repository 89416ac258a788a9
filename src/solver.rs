//! # Krylov solvers for distributed sparse systems
//!
//! Both the velocity system and the combined pressure/force system are
//! solved with a Jacobi preconditioned Krylov method:
//! - [`Cg`]: conjugate gradient, symmetric (semi) definite matrices
//! - [`BiCgStab`]: stabilized bi-conjugate gradient, general matrices
//!
//! Convergence is reached when `|r| <= max(rtol |b|, atol)`.
//! A solver that runs out of iterations returns [`Error::NotConverged`],
//! there are no retries.
#![allow(clippy::module_name_repetitions)]
pub mod bicgstab;
pub mod cg;
pub use bicgstab::BiCgStab;
pub use cg::Cg;

use crate::error::{Error, Result};
use crate::mpi::Communicator;
use crate::sparse::{DistMatrix, DistVector};
use serde::{Deserialize, Serialize};

/// Iterations and final residual norm of a successful solve
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SolveInfo {
    /// Number of iterations
    pub iterations: usize,
    /// Residual norm |b - A x|
    pub residual: f64,
}

/// Solve linear systems of the form: A x = b.
#[enum_dispatch]
pub trait Solve {
    /// Solve A x = b, `x` holds the initial guess on entry.
    ///
    /// If `null_space` is given, `A` is singular with this null space; its
    /// component is removed from right hand side and solution.
    ///
    /// # Errors
    /// No convergence within the iteration limit, breakdown or
    /// inconsistent sizes
    fn solve(
        &self,
        comm: &dyn Communicator,
        a: &DistMatrix,
        b: &DistVector,
        x: &mut DistVector,
        null_space: Option<&DistVector>,
    ) -> Result<SolveInfo>;
}

/// Collection of Krylov solvers
#[enum_dispatch(Solve)]
#[derive(Debug, Clone)]
pub enum LinSolver {
    /// Conjugate gradient
    Cg(Cg),
    /// Stabilized bi-conjugate gradient
    BiCgStab(BiCgStab),
}

impl LinSolver {
    /// Build solver from settings
    pub fn new(settings: &SolverSettings) -> Self {
        match settings.kind {
            SolverKind::Cg => Self::Cg(Cg::new(settings)),
            SolverKind::BiCgStab => Self::BiCgStab(BiCgStab::new(settings)),
        }
    }
}

/// Krylov method
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SolverKind {
    /// Conjugate gradient
    Cg,
    /// Stabilized bi-conjugate gradient
    BiCgStab,
}

/// Preconditioner
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Preconditioner {
    /// Identity
    None,
    /// Inverse of the diagonal
    Jacobi,
}

/// Solver configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SolverSettings {
    /// Krylov method
    #[serde(rename = "type")]
    pub kind: SolverKind,
    /// Relative tolerance
    pub rtol: f64,
    /// Absolute tolerance
    pub atol: f64,
    /// Maximum number of iterations
    pub max_iter: usize,
    /// Preconditioner
    pub preconditioner: Preconditioner,
}

impl Default for SolverSettings {
    fn default() -> Self {
        Self {
            kind: SolverKind::Cg,
            rtol: 1e-8,
            atol: 1e-50,
            max_iter: 10_000,
            preconditioner: Preconditioner::Jacobi,
        }
    }
}

impl SolverSettings {
    /// Settings with another method, other values default
    pub fn with_kind(kind: SolverKind) -> Self {
        Self {
            kind,
            ..Self::default()
        }
    }
}

/// Inverse diagonal, rows without diagonal are left unscaled
pub(crate) fn preconditioner(a: &DistMatrix, kind: Preconditioner) -> DistVector {
    match kind {
        Preconditioner::None => DistVector::from_elem(a.rows(), 1.),
        Preconditioner::Jacobi => {
            let mut d = a.diagonal();
            d.v.mapv_inplace(|x| if x == 0. { 1. } else { 1. / x });
            d
        }
    }
}

/// x = x - (x.n / n.n) n
pub(crate) fn remove_null_space(comm: &dyn Communicator, x: &mut DistVector, n: &DistVector) {
    let nn = n.dot(comm, n);
    if nn > 0. {
        let c = x.dot(comm, n) / nn;
        x.axpy(-c, n);
    }
}

/// Check that `b` and `x` match the matrix
pub(crate) fn check_sizes(a: &DistMatrix, b: &DistVector, x: &DistVector) -> Result<()> {
    for found in [b.layout.global_len(), x.layout.global_len()] {
        if found != a.rows().global_len() {
            return Err(Error::SizeMismatch {
                expected: a.rows().global_len(),
                found,
            });
        }
    }
    Ok(())
}

/// Residual r = b - A x
pub(crate) fn residual(comm: &dyn Communicator, a: &DistMatrix, b: &DistVector, x: &DistVector) -> Result<DistVector> {
    let mut r = a.mat_vec(comm, x)?;
    r.aypx(-1., b);
    Ok(r)
}
