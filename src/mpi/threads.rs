//! Shared-memory communicator: each rank is a thread
//!
//! Collectives exchange data through one slot per rank, guarded by a
//! barrier before and after the read, so a fast rank cannot overwrite a
//! slot that a slow rank is still reading.
use super::Communicator;
use std::sync::{Arc, Barrier, Mutex};

#[derive(Debug)]
struct Shared {
    barrier: Barrier,
    slots_f64: Mutex<Vec<Vec<f64>>>,
    slots_usize: Mutex<Vec<Vec<usize>>>,
}

/// Communicator for a group of threads
#[derive(Debug, Clone)]
pub struct ThreadComm {
    rank: usize,
    size: usize,
    shared: Arc<Shared>,
}

impl ThreadComm {
    /// Create communicators for `size` ranks, hand one to each thread
    ///
    /// # Example
    ///```
    /// use rustibm::mpi::{Communicator, ThreadComm};
    /// let comms = ThreadComm::group(3);
    /// let sums: Vec<f64> = std::thread::scope(|s| {
    ///     let handles: Vec<_> = comms
    ///         .iter()
    ///         .map(|c| s.spawn(move || c.all_reduce_sum(c.rank() as f64)))
    ///         .collect();
    ///     handles.into_iter().map(|h| h.join().unwrap()).collect()
    /// });
    /// assert!(sums.iter().all(|x| (x - 3.).abs() < 1e-12));
    ///```
    pub fn group(size: usize) -> Vec<Self> {
        let shared = Arc::new(Shared {
            barrier: Barrier::new(size),
            slots_f64: Mutex::new(vec![Vec::new(); size]),
            slots_usize: Mutex::new(vec![Vec::new(); size]),
        });
        (0..size)
            .map(|rank| Self {
                rank,
                size,
                shared: Arc::clone(&shared),
            })
            .collect()
    }

    fn exchange_f64(&self, local: &[f64]) -> Vec<Vec<f64>> {
        {
            let mut slots = lock(&self.shared.slots_f64);
            slots[self.rank] = local.to_vec();
        }
        self.shared.barrier.wait();
        let all = lock(&self.shared.slots_f64).clone();
        self.shared.barrier.wait();
        all
    }

    fn exchange_usize(&self, local: &[usize]) -> Vec<Vec<usize>> {
        {
            let mut slots = lock(&self.shared.slots_usize);
            slots[self.rank] = local.to_vec();
        }
        self.shared.barrier.wait();
        let all = lock(&self.shared.slots_usize).clone();
        self.shared.barrier.wait();
        all
    }
}

/// A rank that panicked poisons the mutex; the data is still consistent
/// because every write replaces a whole slot.
fn lock<T>(m: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    m.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
}

impl Communicator for ThreadComm {
    fn rank(&self) -> usize {
        self.rank
    }

    fn size(&self) -> usize {
        self.size
    }

    fn barrier(&self) {
        self.shared.barrier.wait();
    }

    fn all_reduce_sum(&self, value: f64) -> f64 {
        self.exchange_f64(&[value]).iter().map(|v| v[0]).sum()
    }

    fn all_reduce_max(&self, value: f64) -> f64 {
        self.exchange_f64(&[value])
            .iter()
            .map(|v| v[0])
            .fold(f64::NEG_INFINITY, f64::max)
    }

    fn all_gather_f64(&self, local: &[f64]) -> Vec<f64> {
        self.exchange_f64(local).concat()
    }

    fn all_gather_usize(&self, local: &[usize]) -> Vec<usize> {
        self.exchange_usize(local).concat()
    }

    fn broadcast_f64(&self, data: &mut Vec<f64>, root: usize) {
        let all = self.exchange_f64(data);
        *data = all[root].clone();
    }
}
