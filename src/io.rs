//! # Persistence
//!
//! - `hdf5` (feature `hdf5`): named arrays, scalars and attributes
//! - [`ascii`]: per step iteration log
pub mod ascii;
#[cfg(feature = "hdf5")]
pub mod read_write_hdf5;
#[cfg(feature = "hdf5")]
pub mod traits;
pub use ascii::IterationLog;
#[cfg(feature = "hdf5")]
pub use traits::ReadWrite;
