//! # Discrete operators on the staggered grid
//!
//! All operators act on fluxes `q = u A_f` and return flux quantities.
//! Walls are Dirichlet boundaries with prescribed velocity.
pub mod boundary;
pub mod convection;
pub mod laplacian;
pub use boundary::{BoundaryConditions, Side};
pub use convection::convection;
pub use laplacian::laplacian;
