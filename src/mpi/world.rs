//! Mpi world communicator
use super::Communicator;
use crate::error::{Error, Result};
use ::mpi::collective::SystemOperation;
use ::mpi::datatype::PartitionMut;
use ::mpi::environment::Universe;
use ::mpi::topology::SimpleCommunicator;
use ::mpi::traits::*;
use ::mpi::Count;

/// Owns the mpi environment, finalized on drop
pub struct MpiWorld {
    _universe: Universe,
    world: SimpleCommunicator,
}

impl MpiWorld {
    /// Initialize mpi
    ///
    /// # Errors
    /// Mpi was already initialized
    pub fn initialize() -> Result<Self> {
        let universe = ::mpi::initialize().ok_or(Error::MpiInit)?;
        let world = universe.world();
        Ok(Self {
            _universe: universe,
            world,
        })
    }

    fn counts(&self, n: usize) -> (Vec<Count>, Vec<Count>) {
        let mut counts = vec![0 as Count; self.size()];
        self.world.all_gather_into(&(n as Count), &mut counts[..]);
        let displs = counts
            .iter()
            .scan(0, |acc, &x| {
                let d = *acc;
                *acc += x;
                Some(d)
            })
            .collect();
        (counts, displs)
    }
}

impl Communicator for MpiWorld {
    #[allow(clippy::cast_sign_loss)]
    fn rank(&self) -> usize {
        self.world.rank() as usize
    }

    #[allow(clippy::cast_sign_loss)]
    fn size(&self) -> usize {
        self.world.size() as usize
    }

    fn barrier(&self) {
        self.world.barrier();
    }

    fn all_reduce_sum(&self, value: f64) -> f64 {
        let mut global = 0.;
        self.world
            .all_reduce_into(&value, &mut global, SystemOperation::sum());
        global
    }

    fn all_reduce_max(&self, value: f64) -> f64 {
        let mut global = 0.;
        self.world
            .all_reduce_into(&value, &mut global, SystemOperation::max());
        global
    }

    #[allow(clippy::cast_sign_loss)]
    fn all_gather_f64(&self, local: &[f64]) -> Vec<f64> {
        let (counts, displs) = self.counts(local.len());
        let total: Count = counts.iter().sum();
        let mut buf = vec![0.; total as usize];
        {
            let mut partition = PartitionMut::new(&mut buf[..], &counts[..], &displs[..]);
            self.world.all_gather_varcount_into(local, &mut partition);
        }
        buf
    }

    #[allow(clippy::cast_sign_loss)]
    fn all_gather_usize(&self, local: &[usize]) -> Vec<usize> {
        let local: Vec<u64> = local.iter().map(|&x| x as u64).collect();
        let (counts, displs) = self.counts(local.len());
        let total: Count = counts.iter().sum();
        let mut buf = vec![0_u64; total as usize];
        {
            let mut partition = PartitionMut::new(&mut buf[..], &counts[..], &displs[..]);
            self.world.all_gather_varcount_into(&local[..], &mut partition);
        }
        buf.into_iter().map(|x| x as usize).collect()
    }

    #[allow(clippy::cast_possible_wrap, clippy::cast_possible_truncation)]
    fn broadcast_f64(&self, data: &mut Vec<f64>, root: usize) {
        let root_process = self.world.process_at_rank(root as i32);
        let mut n = data.len() as u64;
        root_process.broadcast_into(&mut n);
        data.resize(n as usize, 0.);
        root_process.broadcast_into(&mut data[..]);
    }
}
