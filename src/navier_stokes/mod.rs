//! # Immersed boundary projection solver (Taira & Colonius)
//!
//! Each time step runs five phases in fixed order:
//! 1. assemble the velocity right hand side
//! 2. solve the velocity system for the intermediate flux `q*`
//! 3. assemble the right hand side of the pressure / force system
//! 4. solve `Q^T BN Q dl = Q^T q* + bc`
//! 5. project: `q = q* - BN Q dl`, `lambda += dl`
pub mod functions;
pub mod navier;
pub mod navier_eq;
#[cfg(feature = "hdf5")]
pub mod navier_io;
pub mod schemes;
pub use navier::{Operators, TairaColonius};
pub use schemes::{History, SchemeCoefficients, TimeScheme};
