//! Right preconditioned BiCGStab (van der Vorst)
use super::{check_sizes, preconditioner, remove_null_space, residual, Preconditioner, Solve, SolveInfo, SolverSettings};
use crate::error::{Error, Result};
use crate::mpi::Communicator;
use crate::sparse::{DistMatrix, DistVector};

/// Stabilized bi-conjugate gradient for general square matrices
#[derive(Debug, Clone)]
pub struct BiCgStab {
    rtol: f64,
    atol: f64,
    max_iter: usize,
    precond: Preconditioner,
}

impl BiCgStab {
    /// Constructor
    pub fn new(settings: &SolverSettings) -> Self {
        Self {
            rtol: settings.rtol,
            atol: settings.atol,
            max_iter: settings.max_iter,
            precond: settings.preconditioner,
        }
    }

    fn breakdown(iterations: usize) -> Error {
        Error::Breakdown {
            solver: "bicgstab",
            iterations,
        }
    }
}

impl Solve for BiCgStab {
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
        }
        let tol = (self.rtol * b.norm_l2(comm)).max(self.atol);

        let mut r = residual(comm, a, &b, x)?;
        let r0 = r.clone();
        let (mut rho, mut alpha, mut omega) = (1., 1., 1.);
        let mut v = DistVector::zeros(a.rows());
        let mut p = DistVector::zeros(a.rows());
        let mut t = DistVector::zeros(a.rows());

        for it in 0..self.max_iter {
            let rnorm = r.norm_l2(comm);
            if rnorm <= tol {
                if let Some(n) = null_space {
                    remove_null_space(comm, x, n);
                }
                return Ok(SolveInfo {
                    iterations: it,
                    residual: rnorm,
                });
            }
            let rho_new = r0.dot(comm, &r);
            if rho_new == 0. || omega == 0. {
                return Err(Self::breakdown(it));
            }
            // p = r + beta (p - omega v)
            let beta = (rho_new / rho) * (alpha / omega);
            p.axpy(-omega, &v);
            p.aypx(beta, &r);
            let mut phat = p.clone();
            phat.pointwise_mul(&m);
            a.mat_vec_into(comm, &phat, &mut v)?;
            let r0v = r0.dot(comm, &v);
            if r0v == 0. {
                return Err(Self::breakdown(it));
            }
            alpha = rho_new / r0v;
            // s stored in r
            r.axpy(-alpha, &v);
            x.axpy(alpha, &phat);
            let snorm = r.norm_l2(comm);
            if snorm <= tol {
                if let Some(n) = null_space {
                    remove_null_space(comm, x, n);
                }
                return Ok(SolveInfo {
                    iterations: it + 1,
                    residual: snorm,
                });
            }
            let mut shat = r.clone();
            shat.pointwise_mul(&m);
            a.mat_vec_into(comm, &shat, &mut t)?;
            let tt = t.dot(comm, &t);
            if tt == 0. {
                return Err(Self::breakdown(it));
            }
            omega = t.dot(comm, &r) / tt;
            x.axpy(omega, &shat);
            r.axpy(-omega, &t);
            rho = rho_new;
        }
        let rnorm = r.norm_l2(comm);
        if rnorm <= tol {
            return Ok(SolveInfo {
                iterations: self.max_iter,
                residual: rnorm,
            });
        }
        Err(Error::NotConverged {
            solver: "bicgstab",
            iterations: self.max_iter,
            residual: rnorm,
        })
    }
}
