//! Collective communication
//!
//! Every distributed routine in this crate talks to the other processes
//! through a [`Communicator`]. All methods are collectives: each rank must
//! call them in the same order, a rank that skips one blocks the others
//! forever.
//!
//! Back-ends:
//! - [`Serial`]: single process
//! - [`ThreadComm`]: ranks as threads of one process (shared buffers)
//! - `MpiWorld`: mpi world communicator (feature `mpi`)
pub mod threads;
#[cfg(feature = "mpi")]
pub mod world;
pub use threads::ThreadComm;
#[cfg(feature = "mpi")]
pub use world::MpiWorld;

/// Collective operations needed by the solver
pub trait Communicator {
    /// Rank of the calling process
    fn rank(&self) -> usize;

    /// Total number of processes
    fn size(&self) -> usize;

    /// Block until all processes arrived
    fn barrier(&self);

    /// Global sum
    fn all_reduce_sum(&self, value: f64) -> f64;

    /// Global maximum
    fn all_reduce_max(&self, value: f64) -> f64;

    /// Concatenate the local slices of all ranks (rank order)
    fn all_gather_f64(&self, local: &[f64]) -> Vec<f64>;

    /// Concatenate the local slices of all ranks (rank order)
    fn all_gather_usize(&self, local: &[usize]) -> Vec<usize>;

    /// Replace `data` on every rank with the content of `root`
    fn broadcast_f64(&self, data: &mut Vec<f64>, root: usize);
}

/// Single process, collectives are identities
#[derive(Debug, Clone, Copy, Default)]
pub struct Serial;

impl Communicator for Serial {
    fn rank(&self) -> usize {
        0
    }

    fn size(&self) -> usize {
        1
    }

    fn barrier(&self) {}

    fn all_reduce_sum(&self, value: f64) -> f64 {
        value
    }

    fn all_reduce_max(&self, value: f64) -> f64 {
        value
    }

    fn all_gather_f64(&self, local: &[f64]) -> Vec<f64> {
        local.to_vec()
    }

    fn all_gather_usize(&self, local: &[usize]) -> Vec<usize> {
        local.to_vec()
    }

    fn broadcast_f64(&self, _data: &mut Vec<f64>, _root: usize) {}
}

/// Broadcast scalar value from root to all processes
pub fn broadcast_scalar(comm: &dyn Communicator, value: &mut f64) {
    let mut buf = vec![*value];
    comm.broadcast_f64(&mut buf, 0);
    *value = buf[0];
}

/// Logical or over all ranks
pub fn any_rank(comm: &dyn Communicator, flag: bool) -> bool {
    comm.all_reduce_max(if flag { 1. } else { 0. }) > 0.5
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serial_identities() {
        let comm = Serial;
        assert_eq!(comm.rank(), 0);
        assert_eq!(comm.size(), 1);
        assert_eq!(comm.all_reduce_sum(2.5), 2.5);
        assert_eq!(comm.all_gather_usize(&[1, 2]), vec![1, 2]);
        let mut t = 3.;
        broadcast_scalar(&comm, &mut t);
        assert_eq!(t, 3.);
        assert!(any_rank(&comm, true));
        assert!(!any_rank(&comm, false));
    }
}
