//! Preconditioned conjugate gradient
use super::{check_sizes, preconditioner, remove_null_space, residual, Preconditioner, Solve, SolveInfo, SolverSettings};
use crate::error::{Error, Result};
use crate::mpi::Communicator;
use crate::sparse::{DistMatrix, DistVector};

/// Conjugate gradient for symmetric positive (semi) definite matrices
#[derive(Debug, Clone)]
pub struct Cg {
    rtol: f64,
    atol: f64,
    max_iter: usize,
    precond: Preconditioner,
}

impl Cg {
    /// Constructor
    pub fn new(settings: &SolverSettings) -> Self {
        Self {
            rtol: settings.rtol,
            atol: settings.atol,
            max_iter: settings.max_iter,
            precond: settings.preconditioner,
        }
    }
}

impl Solve for Cg {
    fn solve(
        &self,
        comm: &dyn Communicator,
        a: &DistMatrix,
        b: &DistVector,
        x: &mut DistVector,
        null_space: Option<&DistVector>,
    ) -> Result<SolveInfo> {
        check_sizes(a, b, x)?;
        let m = preconditioner(a, self.precond);
        let mut b = b.clone();
        if let Some(n) = null_space {
            remove_null_space(comm, &mut b, n);
            remove_null_space(comm, x, n);
        }
        let tol = (self.rtol * b.norm_l2(comm)).max(self.atol);

        let mut r = residual(comm, a, &b, x)?;
        let mut z = r.clone();
        z.pointwise_mul(&m);
        if let Some(n) = null_space {
            remove_null_space(comm, &mut z, n);
        }
        let mut p = z.clone();
        let mut rz = r.dot(comm, &z);
        let mut ap = DistVector::zeros(a.rows());

        for it in 0..self.max_iter {
            let rnorm = r.norm_l2(comm);
            if rnorm <= tol {
                return Ok(SolveInfo {
                    iterations: it,
                    residual: rnorm,
                });
            }
            a.mat_vec_into(comm, &p, &mut ap)?;
            let pap = p.dot(comm, &ap);
            if pap == 0. {
                return Err(Error::Breakdown {
                    solver: "cg",
                    iterations: it,
                });
            }
            let alpha = rz / pap;
            x.axpy(alpha, &p);
            r.axpy(-alpha, &ap);
            z.assign(&r);
            z.pointwise_mul(&m);
            if let Some(n) = null_space {
                remove_null_space(comm, &mut z, n);
            }
            let rz_new = r.dot(comm, &z);
            p.aypx(rz_new / rz, &z);
            rz = rz_new;
        }
        let rnorm = r.norm_l2(comm);
        if rnorm <= tol {
            return Ok(SolveInfo {
                iterations: self.max_iter,
                residual: rnorm,
            });
        }
        Err(Error::NotConverged {
            solver: "cg",
            iterations: self.max_iter,
            residual: rnorm,
        })
    }
}
