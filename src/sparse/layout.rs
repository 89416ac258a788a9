//! Ownership ranges of distributed objects
use crate::mpi::Communicator;

/// Contiguous block distribution of a global index range
///
/// Rank `p` owns the global indices `offsets[p]..offsets[p + 1]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Layout {
    offsets: Vec<usize>,
    rank: usize,
}

impl Layout {
    /// Layout from the local sizes of all ranks (no communication)
    pub fn from_counts(counts: &[usize], rank: usize) -> Self {
        let mut offsets = Vec::with_capacity(counts.len() + 1);
        offsets.push(0);
        for c in counts {
            offsets.push(offsets[offsets.len() - 1] + c);
        }
        Self { offsets, rank }
    }

    /// Layout from the local size of each rank (collective)
    pub fn from_local(comm: &dyn Communicator, local_len: usize) -> Self {
        let counts = comm.all_gather_usize(&[local_len]);
        Self::from_counts(&counts, comm.rank())
    }

    /// Rank owning this layout's local block
    pub fn rank(&self) -> usize {
        self.rank
    }

    /// Number of ranks
    pub fn nprocs(&self) -> usize {
        self.offsets.len() - 1
    }

    /// First global index owned by this rank
    pub fn start(&self) -> usize {
        self.offsets[self.rank]
    }

    /// One past the last global index owned by this rank
    pub fn end(&self) -> usize {
        self.offsets[self.rank + 1]
    }

    /// Number of locally owned indices
    pub fn local_len(&self) -> usize {
        self.end() - self.start()
    }

    /// Global size
    pub fn global_len(&self) -> usize {
        self.offsets[self.offsets.len() - 1]
    }

    /// Range owned by rank `p`
    pub fn range_of(&self, p: usize) -> std::ops::Range<usize> {
        self.offsets[p]..self.offsets[p + 1]
    }

    /// True if `global` is owned by this rank
    pub fn is_local(&self, global: usize) -> bool {
        global >= self.start() && global < self.end()
    }

    /// Rank that owns `global`
    ///
    /// # Panics
    /// `global` out of range
    pub fn owner(&self, global: usize) -> usize {
        assert!(global < self.global_len(), "index {} out of range", global);
        // last offset <= global, skipping empty ranks
        self.offsets.partition_point(|&o| o <= global) - 1
    }

    /// Same distribution seen from another rank
    pub fn for_rank(&self, rank: usize) -> Self {
        Self {
            offsets: self.offsets.clone(),
            rank,
        }
    }
}
