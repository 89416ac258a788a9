//! Implement io routines for `TairaColonius`
//!
//! Fields are gathered and written by rank 0, every rank reads the file
//! and keeps its own entries.
use super::TairaColonius;
use crate::error::{Error, Result};
use crate::io::read_write_hdf5::{
    read_attribute, read_from_hdf5, read_scalar_from_hdf5, write_attribute, write_scalar_to_hdf5,
    write_to_hdf5,
};
use crate::io::ReadWrite;
use crate::mpi::any_rank;
use crate::sparse::DistVector;
use ndarray::{Array1, Array2, ArrayD, Ix1};
use tracing::{error, info};

const COMPONENTS: [&str; 3] = ["u", "v", "w"];

fn create_parent(filename: &str) -> Result<()> {
    if let Some(dir) = std::path::Path::new(filename).parent() {
        std::fs::create_dir_all(dir)?;
    }
    Ok(())
}

impl<const N: usize> TairaColonius<'_, N> {
    /// Write snapshot to file (collective)
    ///
    /// Velocities `u`, `v` (`w`) on their face grids, pressure `p` on the
    /// cell grid and body forces `f` (`npoints x N`). The time is an
    /// attribute of `p`.
    ///
    /// # Errors
    /// Failed to write
    pub fn write(&self, filename: &str) -> Result<()> {
        let q = self.q.gather_all(self.comm);
        let lambda = self.lambda.gather_all(self.comm);
        let status = if self.nrank() == 0 {
            self.write_root(filename, &q, &lambda)
        } else {
            Ok(())
        };
        self.agree(status)
    }

    /// Rank 0 part of [`TairaColonius::write`]
    fn write_root(&self, filename: &str, q: &[f64], lambda: &[f64]) -> Result<()> {
        create_parent(filename)?;
        for (c, name) in COMPONENTS.iter().enumerate().take(N) {
            let vel = self.velocity_component(c, q);
            vel.write(filename, name)?;
        }
        self.layout.natural_cells(lambda).write(filename, "p")?;
        self.layout.forces(lambda).write(filename, "f")?;
        write_attribute(filename, "p", "time", self.time)?;
        write_scalar_to_hdf5(filename, "time", self.time)?;
        write_scalar_to_hdf5(filename, "nu", self.nu)?;
        info!(" ==> {:?}", filename);
        Ok(())
    }

    /// All ranks return an error if rank 0 failed to write
    fn agree(&self, status: Result<()>) -> Result<()> {
        // keep ranks in step even if rank 0 failed
        let failed = any_rank(self.comm, status.is_err());
        status?;
        if failed {
            return Err(Error::RemoteIo);
        }
        Ok(())
    }

    /// Write snapshot to file, and handle error
    pub fn write_unwrap(&self, filename: &str) {
        if let Err(e) = self.write(filename) {
            error!("while writing file {:?}: {}", filename, e);
        }
    }

    /// Read snapshot from file
    ///
    /// # Errors
    /// Failed to read or shapes differ from the current mesh
    pub fn read(&mut self, filename: &str) -> Result<()> {
        let mut fields = Vec::with_capacity(N);
        for (c, name) in COMPONENTS.iter().enumerate().take(N) {
            let vel: ArrayD<f64> = read_from_hdf5(filename, name)?;
            fields.push(self.flux_component(c, vel)?);
        }
        let q = self.layout.local_from_natural(&fields)?;
        self.q = DistVector::from_local(&self.layout.velocity, Array1::from(q))?;
        let p: ArrayD<f64> = read_from_hdf5(filename, "p")?;
        let f: Array2<f64> = read_from_hdf5(filename, "f")?;
        let lambda = self.layout.local_lambda_from_natural(&p, &f)?;
        self.lambda = DistVector::from_local(&self.layout.lambda, Array1::from(lambda))?;
        self.time = read_attribute(filename, "p", "time")?;
        info!(" <== {:?}", filename);
        Ok(())
    }

    /// Read snapshot from file, and handle error
    pub fn read_unwrap(&mut self, filename: &str) {
        match self.read(filename) {
            Ok(_) => info!("reading file {:?} was successful", filename),
            Err(e) => error!("while reading file {:?}: {}", filename, e),
        }
    }

    /// Write everything needed to continue the run (collective)
    ///
    /// Raw global vectors in solver numbering, the multistep histories,
    /// step and time. Requires the same mesh and number of ranks on read.
    ///
    /// # Errors
    /// Failed to write
    pub fn write_restart(&self, filename: &str) -> Result<()> {
        let q = Array1::from(self.q.gather_all(self.comm));
        let lambda = Array1::from(self.lambda.gather_all(self.comm));
        let conv: Vec<Array1<f64>> = self
            .conv_history
            .levels()
            .map(|l| Array1::from(l.gather_all(self.comm)))
            .collect();
        let diff: Vec<Array1<f64>> = self
            .diff_history
            .levels()
            .map(|l| Array1::from(l.gather_all(self.comm)))
            .collect();
        let status = if self.nrank() == 0 {
            self.write_restart_root(filename, &q, &lambda, &conv, &diff)
        } else {
            Ok(())
        };
        self.agree(status)
    }

    /// Rank 0 part of [`TairaColonius::write_restart`]
    fn write_restart_root(
        &self,
        filename: &str,
        q: &Array1<f64>,
        lambda: &Array1<f64>,
        conv: &[Array1<f64>],
        diff: &[Array1<f64>],
    ) -> Result<()> {
        create_parent(filename)?;
        write_to_hdf5(filename, "q", q)?;
        write_to_hdf5(filename, "lambda", lambda)?;
        for (k, level) in conv.iter().enumerate() {
            write_to_hdf5(filename, &format!("conv{}", k), level)?;
        }
        for (k, level) in diff.iter().enumerate() {
            write_to_hdf5(filename, &format!("diff{}", k), level)?;
        }
        write_scalar_to_hdf5(filename, "nconv", conv.len() as u64)?;
        write_scalar_to_hdf5(filename, "ndiff", diff.len() as u64)?;
        write_scalar_to_hdf5(filename, "step", self.step as u64)?;
        write_scalar_to_hdf5(filename, "time", self.time)?;
        info!(" ==> {:?}", filename);
        Ok(())
    }

    /// Continue from a restart file
    ///
    /// # Errors
    /// Failed to read or sizes differ
    pub fn read_restart(&mut self, filename: &str) -> Result<()> {
        let q: Array1<f64> = read_from_hdf5::<f64, Ix1>(filename, "q")?;
        self.q = DistVector::from_global(&self.layout.velocity, &q.to_vec())?;
        let lambda: Array1<f64> = read_from_hdf5::<f64, Ix1>(filename, "lambda")?;
        self.lambda = DistVector::from_global(&self.layout.lambda, &lambda.to_vec())?;
        let nconv = read_scalar_from_hdf5::<u64>(filename, "nconv")? as usize;
        let ndiff = read_scalar_from_hdf5::<u64>(filename, "ndiff")? as usize;
        let mut conv = Vec::with_capacity(nconv);
        for k in 0..nconv {
            let level: Array1<f64> = read_from_hdf5(filename, &format!("conv{}", k))?;
            conv.push(DistVector::from_global(&self.layout.velocity, &level.to_vec())?);
        }
        let mut diff = Vec::with_capacity(ndiff);
        for k in 0..ndiff {
            let level: Array1<f64> = read_from_hdf5(filename, &format!("diff{}", k))?;
            diff.push(DistVector::from_global(&self.layout.velocity, &level.to_vec())?);
        }
        self.conv_history.set_levels(conv);
        self.diff_history.set_levels(diff);
        self.step = read_scalar_from_hdf5::<u64>(filename, "step")? as usize;
        self.time = read_scalar_from_hdf5::<f64>(filename, "time")?;
        info!(" <== {:?} (step {})", filename, self.step);
        Ok(())
    }

    /// Velocity of component `c` on its face grid from replicated fluxes
    fn velocity_component(&self, c: usize, q: &[f64]) -> ArrayD<f64> {
        let mut vel = self.layout.natural_component(c, q);
        for (idx, v) in vel.indexed_iter_mut() {
            let idx: [usize; N] = std::array::from_fn(|a| idx[a]);
            *v /= self.mesh.face_area(c, &idx);
        }
        vel
    }

    /// Inverse of `velocity_component`
    fn flux_component(&self, c: usize, mut vel: ArrayD<f64>) -> Result<ArrayD<f64>> {
        let shape = self.layout.face_shape(c);
        if vel.shape() != shape {
            return Err(Error::SizeMismatch {
                expected: shape.iter().product(),
                found: vel.len(),
            });
        }
        for (idx, v) in vel.indexed_iter_mut() {
            let idx: [usize; N] = std::array::from_fn(|a| idx[a]);
            *v *= self.mesh.face_area(c, &idx);
        }
        Ok(vel)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::body::{circle, BodyPoints};
    use crate::config::ParameterConfig;
    use crate::mesh::Mesh;
    use crate::mpi::{Communicator, Serial, ThreadComm};
    use crate::navier_stokes::TimeScheme;
    use crate::operators::{BoundaryConditions, Side};

    fn navier() -> TairaColonius<'static, 2> {
        let mesh = Mesh::<2>::uniform(&Serial, [10, 8], [0., 0.], [1., 0.8]).unwrap();
        let bodies = BodyPoints::partition(&mesh, &circle([0.5, 0.4], 0.15, 10));
        let mut bc = BoundaryConditions::no_slip();
        bc.set(1, Side::Upper, 0, 1.);
        let params = ParameterConfig {
            reference_pressure: true,
            convection: TimeScheme::AdamsBashforth2,
            ..ParameterConfig::default()
        };
        TairaColonius::new(&Serial, mesh, bodies, bc, 0.1, &params).unwrap()
    }

    #[test]
    fn test_snapshot_write_read() {
        let filename = std::env::temp_dir().join("rustibm_snapshot.h5");
        let filename = filename.to_string_lossy().to_string();
        let _ = std::fs::remove_file(&filename);
        let mut a = navier();
        a.step_forward().unwrap();
        a.write(&filename).unwrap();
        let mut b = navier();
        b.read(&filename).unwrap();
        for (x, y) in a.q.v.iter().zip(b.q.v.iter()) {
            assert!((x - y).abs() < 1e-12);
        }
        assert!((a.time - b.time).abs() < 1e-15);
        assert_eq!(a.lambda.v, b.lambda.v);
        std::fs::remove_file(&filename).unwrap();
    }

    #[test]
    fn test_restart_continues_identically() {
        let filename = std::env::temp_dir().join("rustibm_restart.h5");
        let filename = filename.to_string_lossy().to_string();
        let _ = std::fs::remove_file(&filename);
        let mut a = navier();
        a.step_forward().unwrap();
        a.write_restart(&filename).unwrap();
        let mut b = navier();
        b.read_restart(&filename).unwrap();
        assert_eq!(b.step, 1);
        a.step_forward().unwrap();
        b.step_forward().unwrap();
        for (x, y) in a.q.v.iter().zip(b.q.v.iter()) {
            assert!((x - y).abs() < 1e-12);
        }
        std::fs::remove_file(&filename).unwrap();
    }

    #[test]
    fn test_failed_write_reported_on_all_ranks() {
        // parent of the output is a regular file, rank 0 cannot create it
        let blocker = std::env::temp_dir().join("rustibm_not_a_directory");
        std::fs::write(&blocker, "x").unwrap();
        let filename = blocker.join("flow.h5").to_string_lossy().to_string();
        let comms = ThreadComm::group(2);
        let results: Vec<(usize, bool, bool)> = std::thread::scope(|s| {
            let handles: Vec<_> = comms
                .iter()
                .map(|c| {
                    let filename = &filename;
                    s.spawn(move || {
                        let mesh = Mesh::<2>::uniform(c, [6, 6], [0., 0.], [1., 1.]).unwrap();
                        let bodies = BodyPoints::partition(&mesh, &[[0.5, 0.5]]);
                        let params = ParameterConfig {
                            reference_pressure: true,
                            ..ParameterConfig::default()
                        };
                        let navier =
                            TairaColonius::new(c, mesh, bodies, BoundaryConditions::no_slip(), 0.1, &params)
                                .unwrap();
                        let snapshot = navier.write(filename);
                        let restart = navier.write_restart(filename);
                        // both ranks still take part in collectives
                        let sum = c.all_reduce_sum(1.);
                        assert_eq!(sum, 2.);
                        (c.rank(), snapshot.is_err(), matches!(restart, Err(Error::RemoteIo)))
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });
        for (rank, snapshot_failed, restart_remote) in results {
            assert!(snapshot_failed);
            assert_eq!(restart_remote, rank == 1);
        }
        std::fs::remove_file(&blocker).unwrap();
    }
}
