//! Error type shared by all modules
use thiserror::Error;

/// Result alias used throughout this crate
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised while building operators or advancing the solution
#[derive(Error, Debug)]
pub enum Error {
    /// Mesh definition is unusable
    #[error("invalid mesh: {0}")]
    InvalidMesh(String),

    /// Insert into a row that lives on another process
    #[error("row {row} is not owned by rank {rank}")]
    RemoteRow { row: usize, rank: usize },

    /// Column index outside of the column layout
    #[error("column {col} out of range (global size {size})")]
    ColumnOutOfRange { col: usize, size: usize },

    /// More entries inserted into a row than predicted
    #[error("preallocation exceeded in row {row} while inserting column {col}")]
    PreallocationExceeded { row: usize, col: usize },

    /// Row filled with a different number of entries than predicted
    #[error("structure mismatch in row {row}: predicted {predicted} nonzeros, inserted {inserted}")]
    StructureMismatch {
        row: usize,
        predicted: usize,
        inserted: usize,
    },

    /// Assembly failed on another rank
    #[error("matrix assembly failed on a remote rank")]
    RemoteAssembly,

    /// Output failed on the writing rank
    #[error("writing output failed on rank 0")]
    RemoteIo,

    /// Diagonal entry required but not part of the sparsity pattern
    #[error("row {0} has no diagonal entry")]
    MissingDiagonal(usize),

    /// Vector or matrix sizes do not agree
    #[error("size mismatch: expected {expected}, found {found}")]
    SizeMismatch { expected: usize, found: usize },

    /// Krylov solver stopped without reaching the tolerance
    #[error("{solver} did not converge after {iterations} iterations (residual {residual:e})")]
    NotConverged {
        solver: &'static str,
        iterations: usize,
        residual: f64,
    },

    /// Krylov solver hit a zero denominator
    #[error("{solver} broke down after {iterations} iterations")]
    Breakdown {
        solver: &'static str,
        iterations: usize,
    },

    /// Invalid or inconsistent settings
    #[error("configuration error: {0}")]
    Config(String),

    /// Malformed YAML input
    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    /// File system error
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Error reported by the hdf5 library
    #[cfg(feature = "hdf5")]
    #[error(transparent)]
    Hdf5(#[from] hdf5::Error),

    /// Mpi could not be initialized
    #[error("mpi initialization failed")]
    MpiInit,
}
