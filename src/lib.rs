//! # `rustibm`: Immersed boundary projection solver
//!
//! Incompressible Navier-Stokes equations on a staggered cartesian mesh
//! with rigid bodies represented by Lagrangian points (Taira & Colonius).
//! Pressure and body forces are found together from one symmetric system
//!
//! ```text
//! Q^T BN Q lambda = Q^T q* + bc,    Q = [G, E^T]
//! ```
//!
//! where `G` is the discrete gradient and `E` interpolates face fluxes to
//! the body points with a regularized delta function, see [`delta`].
//!
//! # Dependencies
//! - `hdf5` (feature `hdf5`, sudo apt-get install -y libhdf5-dev)
//! - mpi installation and libclang (feature `mpi`)
//!
//! # Details
//!
//! - [`mesh`]: rectilinear mesh, slab decomposition, staggered numbering
//! - [`sparse`]: distributed matrices and vectors
//! - [`coupling`]: two pass assembly of `Q`, `Q^T` and `BN Q`
//! - [`operators`]: Laplacian, convection and wall conditions
//! - [`solver`]: Krylov solvers
//! - [`navier_stokes`]: the time stepper
//!
//! # Example
//! Flow past a cylinder ( Run with `cargo run --release -- demos/cylinder2d.yaml` )
//! ```ignore
//! use rustibm::config::SimulationConfig;
//! use rustibm::mpi::Serial;
//! use rustibm::navier_stokes::TairaColonius;
//! use rustibm::integrate;
//!
//! fn main() -> rustibm::Result<()> {
//!     let config = SimulationConfig::load("demos/cylinder2d.yaml")?;
//!     let mut navier = TairaColonius::<2>::from_config(&Serial, &config)?;
//!     integrate(&mut navier, config.parameters.nt, Some(config.parameters.nsave))
//! }
//! ```
//!
//! ## Documentation
//!
//! Download and run:
//!
//! `cargo doc --open`
#![warn(missing_docs)]
#![allow(clippy::unnecessary_cast)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::module_name_repetitions)]
#[macro_use]
extern crate enum_dispatch;
pub mod body;
pub mod config;
pub mod coupling;
pub mod delta;
pub mod error;
pub mod io;
pub mod mesh;
pub mod mpi;
pub mod navier_stokes;
pub mod operators;
pub mod solver;
pub mod sparse;
pub mod types;
pub use error::{Error, Result};

use tracing::{info, warn};

/// Integrate trait, step forward in time, and write results
pub trait Integrate {
    /// Update solution
    ///
    /// # Errors
    /// Time step failed
    fn update(&mut self) -> Result<()>;
    /// Receive current time
    fn get_time(&self) -> f64;
    /// Get timestep
    fn get_dt(&self) -> f64;
    /// Number of completed time steps
    fn get_step(&self) -> usize;
    /// Callback function (can be used for i/o)
    ///
    /// # Errors
    /// Output failed
    fn callback(&mut self) -> Result<()>;
    /// Write restart data if due, called after every step
    ///
    /// # Errors
    /// Output failed
    fn checkpoint(&mut self) -> Result<()> {
        Ok(())
    }
    /// Additional break criteria
    fn exit(&mut self) -> bool;
}

/// Integrade pde, that implements the Integrate trait.
///
/// Runs until the step counter reached `max_step`. Specify
/// `save_intervall` (in steps) to call the callback.
///
/// Stop Criteria:
/// 1. Timestep limit
/// 2. Break criteria of the pde
///
/// # Errors
/// A time step or the output failed
pub fn integrate<T: Integrate>(pde: &mut T, max_step: usize, save_intervall: Option<usize>) -> Result<()> {
    while pde.get_step() < max_step {
        // Update
        pde.update()?;

        // Save
        if let Some(nsave) = save_intervall {
            if nsave > 0 && pde.get_step() % nsave == 0 {
                pde.callback()?;
            }
        }
        pde.checkpoint()?;

        // Break
        if pde.exit() {
            warn!("break criteria triggered at time {:?}", pde.get_time());
            return Ok(());
        }
    }
    info!("timestep limit reached: {:?}", pde.get_step());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Decay {
        x: f64,
        step: usize,
        calls: usize,
    }

    impl Integrate for Decay {
        fn update(&mut self) -> Result<()> {
            self.x *= 0.5;
            self.step += 1;
            Ok(())
        }
        fn get_time(&self) -> f64 {
            self.step as f64 * self.get_dt()
        }
        fn get_dt(&self) -> f64 {
            0.1
        }
        fn get_step(&self) -> usize {
            self.step
        }
        fn callback(&mut self) -> Result<()> {
            self.calls += 1;
            Ok(())
        }
        fn exit(&mut self) -> bool {
            self.x < 1e-3
        }
    }

    #[test]
    fn test_integrate_save_intervall() {
        let mut pde = Decay {
            x: 1.,
            step: 2,
            calls: 0,
        };
        integrate(&mut pde, 8, Some(3)).unwrap();
        assert_eq!(pde.step, 8);
        // steps 3 and 6
        assert_eq!(pde.calls, 2);
    }

    #[test]
    fn test_integrate_exit() {
        let mut pde = Decay {
            x: 1.,
            step: 0,
            calls: 0,
        };
        integrate(&mut pde, 100, None).unwrap();
        assert_eq!(pde.step, 10);
    }
}
