//! Distributed vector
use super::Layout;
use crate::error::{Error, Result};
use crate::mpi::Communicator;
use ndarray::{Array1, Zip};

/// Vector whose entries are distributed across ranks by a [`Layout`]
///
/// `v` holds the locally owned block only.
#[derive(Debug, Clone)]
pub struct DistVector {
    /// Ownership ranges
    pub layout: Layout,
    /// Local entries
    pub v: Array1<f64>,
}

impl DistVector {
    /// Vector of zeros
    pub fn zeros(layout: &Layout) -> Self {
        Self {
            layout: layout.clone(),
            v: Array1::zeros(layout.local_len()),
        }
    }

    /// Vector filled with a constant
    pub fn from_elem(layout: &Layout, value: f64) -> Self {
        Self {
            layout: layout.clone(),
            v: Array1::from_elem(layout.local_len(), value),
        }
    }

    /// Wrap local data
    ///
    /// # Errors
    /// Length of `v` differs from the local size of `layout`
    pub fn from_local(layout: &Layout, v: Array1<f64>) -> Result<Self> {
        if v.len() != layout.local_len() {
            return Err(Error::SizeMismatch {
                expected: layout.local_len(),
                found: v.len(),
            });
        }
        Ok(Self {
            layout: layout.clone(),
            v,
        })
    }

    /// Take the local block out of a replicated global vector
    ///
    /// # Errors
    /// Length of `global` differs from the global size of `layout`
    pub fn from_global(layout: &Layout, global: &[f64]) -> Result<Self> {
        if global.len() != layout.global_len() {
            return Err(Error::SizeMismatch {
                expected: layout.global_len(),
                found: global.len(),
            });
        }
        let v = Array1::from(global[layout.start()..layout.end()].to_vec());
        Ok(Self {
            layout: layout.clone(),
            v,
        })
    }

    /// Set all entries to zero
    pub fn zero(&mut self) {
        self.v.fill(0.);
    }

    /// Entry by global index, `None` if not owned locally
    pub fn get(&self, global: usize) -> Option<f64> {
        if self.layout.is_local(global) {
            Some(self.v[global - self.layout.start()])
        } else {
            None
        }
    }

    /// Set entry by global index, ignored if not owned locally
    pub fn set(&mut self, global: usize, value: f64) {
        if self.layout.is_local(global) {
            let start = self.layout.start();
            self.v[global - start] = value;
        }
    }

    /// Replicate the full vector on every rank (collective)
    pub fn gather_all(&self, comm: &dyn Communicator) -> Vec<f64> {
        let local = self.v.as_slice().map_or_else(|| self.v.to_vec(), <[f64]>::to_vec);
        comm.all_gather_f64(&local)
    }

    /// Dot product (collective)
    pub fn dot(&self, comm: &dyn Communicator, other: &Self) -> f64 {
        comm.all_reduce_sum(self.v.dot(&other.v))
    }

    /// Euclidean norm (collective)
    pub fn norm_l2(&self, comm: &dyn Communicator) -> f64 {
        self.dot(comm, self).sqrt()
    }

    /// Maximum absolute entry (collective)
    pub fn norm_max(&self, comm: &dyn Communicator) -> f64 {
        let local = self.v.iter().fold(0_f64, |m, x| m.max(x.abs()));
        comm.all_reduce_max(local)
    }

    /// Sum of all entries (collective)
    pub fn sum(&self, comm: &dyn Communicator) -> f64 {
        comm.all_reduce_sum(self.v.sum())
    }

    /// self = self + a * x
    pub fn axpy(&mut self, a: f64, x: &Self) {
        Zip::from(&mut self.v).and(&x.v).for_each(|y, &x| *y += a * x);
    }

    /// self = x + b * self
    pub fn aypx(&mut self, b: f64, x: &Self) {
        Zip::from(&mut self.v).and(&x.v).for_each(|y, &x| *y = x + b * *y);
    }

    /// self = self * a
    pub fn scale(&mut self, a: f64) {
        self.v *= a;
    }

    /// Entrywise product self = self * x
    pub fn pointwise_mul(&mut self, x: &Self) {
        self.v *= &x.v;
    }

    /// Copy values from `x`
    pub fn assign(&mut self, x: &Self) {
        self.v.assign(&x.v);
    }

    /// True if any entry on any rank is nan (collective)
    pub fn has_nan(&self, comm: &dyn Communicator) -> bool {
        crate::mpi::any_rank(comm, self.v.iter().any(|x| x.is_nan()))
    }
}
