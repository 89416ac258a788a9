//! # Distributed sparse linear algebra
//!
//! Row-distributed vectors and matrices on top of a [`Communicator`].
//! Objects are distributed in contiguous blocks described by a [`Layout`].
//!
//! [`Communicator`]: crate::mpi::Communicator
pub mod layout;
pub mod matrix;
pub mod vector;
pub use layout::Layout;
pub use matrix::{assemble_two_pass, DistMatrix, InsertMode, Preallocation};
pub use vector::DistVector;
