//! Implement the projection step
use super::TairaColonius;
use crate::error::Result;
use crate::operators::convection;
use crate::solver::Solve;
use crate::sparse::DistVector;
use crate::Integrate;
use std::time::Instant;
use tracing::{debug, info, info_span};

impl<const N: usize> TairaColonius<'_, N> {
    /// Push a value to the diagnostics
    pub(crate) fn record(&mut self, key: &str, value: f64) {
        self.diagnostics.entry(key.to_string()).or_default().push(value);
    }

    /// Phase 1: `rhs1 = q/dt + explicit convection + explicit diffusion
    /// + nu bc_L - (1/dt) BN Q lambda`
    ///
    /// # Errors
    /// Size mismatch in a matrix product
    pub fn assemble_velocity_rhs(&mut self) -> Result<()> {
        let _span = info_span!("assemble_velocity_rhs").entered();
        let comm = self.comm;
        if self.conv_history.depth() > 0 {
            let mut conv = convection(comm, &self.mesh, &self.layout, &self.bc, &self.q);
            conv.scale(-1.);
            self.conv_history.push(conv);
        }
        if self.diff_history.depth() > 0 {
            let lq = self.ops.laplacian.mat_vec(comm, &self.q)?;
            self.diff_history.push(lq);
        }
        self.rhs1.assign(&self.q);
        self.rhs1.scale(1. / self.dt);
        self.conv_history.accumulate(&self.conv_coeffs, 1., &mut self.rhs1);
        self.diff_history
            .accumulate(&self.diff_coeffs.explicit, self.nu, &mut self.rhs1);
        self.rhs1.axpy(self.nu, &self.ops.bc_l);
        let bnq_lambda = self.ops.coupling.bnq.mat_vec(comm, &self.lambda)?;
        self.rhs1.axpy(-1. / self.dt, &bnq_lambda);
        Ok(())
    }

    /// Phase 2: solve `A q* = rhs1`
    ///
    /// # Errors
    /// Solver did not converge
    pub fn solve_velocity_system(&mut self) -> Result<()> {
        let _span = info_span!("solve_velocity_system").entered();
        self.q_star.assign(&self.q);
        self.velocity_info =
            self.velocity_solver
                .solve(self.comm, &self.ops.velocity, &self.rhs1, &mut self.q_star, None)?;
        debug!(
            "velocity: {} iterations, residual {:e}",
            self.velocity_info.iterations, self.velocity_info.residual
        );
        Ok(())
    }

    /// Phase 3: `rhs2 = Q^T q* + [bc_D; 0]`, zero at the pinned entry
    ///
    /// # Errors
    /// Size mismatch in a matrix product
    pub fn assemble_poisson_rhs(&mut self) -> Result<()> {
        let _span = info_span!("assemble_poisson_rhs").entered();
        self.ops
            .coupling
            .qt
            .mat_vec_into(self.comm, &self.q_star, &mut self.rhs2)?;
        self.rhs2.axpy(1., &self.ops.bc_d);
        if self.reference_pressure {
            self.rhs2.set(0, 0.);
        }
        Ok(())
    }

    /// Phase 4: solve `Q^T BN Q dl = rhs2`
    ///
    /// # Errors
    /// Solver did not converge
    pub fn solve_poisson_system(&mut self) -> Result<()> {
        let _span = info_span!("solve_poisson_system").entered();
        self.delta_lambda.zero();
        self.poisson_info = self.poisson_solver.solve(
            self.comm,
            &self.ops.poisson,
            &self.rhs2,
            &mut self.delta_lambda,
            self.ops.null_space.as_ref(),
        )?;
        debug!(
            "poisson: {} iterations, residual {:e}",
            self.poisson_info.iterations, self.poisson_info.residual
        );
        Ok(())
    }

    /// Phase 5: `q = q* - BN Q dl`, `lambda += dl`
    ///
    /// # Errors
    /// Size mismatch in a matrix product
    pub fn projection_correction(&mut self) -> Result<()> {
        let _span = info_span!("projection_correction").entered();
        let correction = self.ops.coupling.bnq.mat_vec(self.comm, &self.delta_lambda)?;
        self.q.assign(&self.q_star);
        self.q.axpy(-1., &correction);
        self.lambda.axpy(1., &self.delta_lambda);
        Ok(())
    }

    /// Advance the solution by one time step
    ///
    /// # Errors
    /// Any phase failed, the step is not completed
    pub fn step_forward(&mut self) -> Result<()> {
        let _span = info_span!("step", step = self.step + 1).entered();
        let phases: [(&str, fn(&mut Self) -> Result<()>); 5] = [
            ("assemble_velocity_rhs", Self::assemble_velocity_rhs),
            ("solve_velocity_system", Self::solve_velocity_system),
            ("assemble_poisson_rhs", Self::assemble_poisson_rhs),
            ("solve_poisson_system", Self::solve_poisson_system),
            ("projection_correction", Self::projection_correction),
        ];
        for (name, phase) in phases {
            let start = Instant::now();
            phase(self)?;
            let elapsed = start.elapsed().as_secs_f64();
            debug!("{}: {:.3e} s", name, elapsed);
            self.record(&format!("t_{}", name), elapsed);
        }
        self.time += self.dt;
        self.step += 1;
        self.record("velocity_iterations", self.velocity_info.iterations as f64);
        self.record("poisson_iterations", self.poisson_info.iterations as f64);
        if let Some(log) = &mut self.log {
            log.record(self.step, &self.velocity_info, &self.poisson_info)?;
        }
        Ok(())
    }

    /// Divergence of the flux field including wall fluxes, maximum norm
    ///
    /// # Errors
    /// Size mismatch in a matrix product
    pub fn div_norm(&self) -> Result<f64> {
        let mut div = self.ops.coupling.qt.mat_vec(self.comm, &self.q)?;
        div.axpy(1., &self.ops.bc_d);
        // force rows are no divergence
        for i in self.layout.local_cells()..div.v.len() {
            div.v[i] = 0.;
        }
        Ok(div.norm_max(self.comm))
    }

    /// Sum of the body forces per component (collective)
    pub fn force_sums(&self) -> [f64; N] {
        let ncells = self.layout.local_cells();
        let npoints = self.layout.point_counts()[self.nrank()];
        std::array::from_fn(|a| {
            let start = ncells + a * npoints;
            let local: f64 = self.lambda.v.iter().skip(start).take(npoints).sum();
            self.comm.all_reduce_sum(local)
        })
    }

    /// Pressure of cell `idx`, `None` if the cell is not local
    pub fn pressure(&self, idx: &[usize; N]) -> Option<f64> {
        self.lambda.get(self.layout.cell_column(idx))
    }

    /// Copy of the flux vector gathered on all ranks
    pub fn gather_q(&self) -> Vec<f64> {
        self.q.gather_all(self.comm)
    }

    /// Replace fluxes (e.g. initial condition), layout must match
    pub fn set_q(&mut self, q: DistVector) {
        self.q = q;
    }
}

impl<const N: usize> Integrate for TairaColonius<'_, N> {
    fn update(&mut self) -> Result<()> {
        self.step_forward()
    }

    fn get_time(&self) -> f64 {
        self.time
    }

    fn get_dt(&self) -> f64 {
        self.dt
    }

    fn get_step(&self) -> usize {
        self.step
    }

    fn callback(&mut self) -> Result<()> {
        let div = self.div_norm()?;
        let forces = self.force_sums();
        self.record("time", self.time);
        self.record("div", div);
        for (a, f) in forces.iter().enumerate() {
            self.record(&format!("force_{}", a), *f);
        }
        if self.nrank() == 0 {
            info!(
                "step = {}   time = {:6.3}   |div| = {:4.2e}   forces = {:?}",
                self.step, self.time, div, forces
            );
        }
        #[cfg(feature = "hdf5")]
        {
            let filename = self.output.join(format!("flow{:08.2}.h5", self.time));
            self.write_unwrap(&filename.to_string_lossy());
        }
        Ok(())
    }

    fn checkpoint(&mut self) -> Result<()> {
        #[cfg(feature = "hdf5")]
        {
            if self.nrestart > 0 && self.step % self.nrestart == 0 {
                let filename = self.output.join(format!("restart{:07}.h5", self.step));
                self.write_restart(&filename.to_string_lossy())?;
            }
        }
        Ok(())
    }

    fn exit(&mut self) -> bool {
        self.q.has_nan(self.comm)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::body::{circle, BodyPoints};
    use crate::config::ParameterConfig;
    use crate::mesh::Mesh;
    use crate::mpi::{Serial, ThreadComm};
    use crate::navier_stokes::TimeScheme;
    use crate::operators::{BoundaryConditions, Side};

    fn params(reference_pressure: bool) -> ParameterConfig {
        let mut p = ParameterConfig {
            dt: 0.01,
            reference_pressure,
            ..ParameterConfig::default()
        };
        p.poisson_solver.rtol = 1e-10;
        p.velocity_solver.rtol = 1e-10;
        p
    }

    #[test]
    fn test_zero_step_centre_point() {
        // h = 0.02, one point at the centre, fluid at rest
        let mesh = Mesh::<2>::uniform(&Serial, [50, 50], [0., 0.], [1., 1.]).unwrap();
        let bodies = BodyPoints::partition(&mesh, &[[0.5, 0.5]]);
        let mut navier =
            TairaColonius::new(&Serial, mesh, bodies, BoundaryConditions::no_slip(), 0.01, &params(true)).unwrap();
        assert!((navier.h - 0.02).abs() < 1e-12);
        navier.step_forward().unwrap();
        assert_eq!(navier.q.norm_max(&Serial), 0.);
        assert_eq!(navier.lambda.norm_max(&Serial), 0.);
        assert_eq!(navier.pressure(&[0, 0]), Some(0.));
        assert_eq!(navier.step, 1);
        assert!((navier.time - 0.01).abs() < 1e-15);
        assert_eq!(navier.diagnostics["velocity_iterations"].len(), 1);
    }

    #[test]
    fn test_unconstrained_projection() {
        // points far outside: plain projection, lid driven flow
        let mesh = Mesh::<2>::uniform(&Serial, [16, 16], [0., 0.], [1., 1.]).unwrap();
        let bodies = BodyPoints::partition(&mesh, &[[5., 5.], [-4., 0.5]]);
        let mut bc = BoundaryConditions::no_slip();
        bc.set(1, Side::Upper, 0, 1.);
        let mut p = params(false);
        p.convection = TimeScheme::AdamsBashforth2;
        p.diffusion = TimeScheme::CrankNicolson;
        let mut navier = TairaColonius::new(&Serial, mesh, bodies, bc, 0.1, &p).unwrap();
        for _ in 0..3 {
            navier.step_forward().unwrap();
        }
        // body columns are empty, forces stay zero
        assert_eq!(navier.force_sums(), [0., 0.]);
        // flow was set in motion and is divergence free
        assert!(navier.q.norm_max(&Serial) > 1e-6);
        assert!(navier.div_norm().unwrap() < 1e-7);
        assert!(!navier.exit());
    }

    #[test]
    fn test_body_in_uniform_stream() {
        // stream through the box, walls carry the free stream
        let mesh = Mesh::<2>::uniform(&Serial, [32, 32], [-1., -1.], [1., 1.]).unwrap();
        let points = circle([0., 0.], 0.2, 20);
        let bodies = BodyPoints::partition(&mesh, &points);
        let mut bc = BoundaryConditions::no_slip();
        for a in 0..2 {
            for side in [Side::Lower, Side::Upper] {
                bc.set(a, side, 0, 1.);
            }
        }
        let mut navier = TairaColonius::new(&Serial, mesh, bodies, bc, 0.05, &params(true)).unwrap();
        navier.set_velocity([1., 0.]);
        navier.step_forward().unwrap();
        navier.step_forward().unwrap();
        assert!(navier.div_norm().unwrap() < 1e-7);
        // the body resists the stream
        let f = navier.force_sums();
        assert!(f[0].abs() > 1e-3);
        assert!(f[1].abs() < 1e-3 * f[0].abs().max(1.));
    }

    #[test]
    fn test_two_ranks_match_serial() {
        let run = |comm: &dyn crate::mpi::Communicator| -> (f64, [f64; 2]) {
            let mesh = Mesh::<2>::uniform(comm, [12, 12], [0., 0.], [1., 1.]).unwrap();
            let bodies = BodyPoints::partition(&mesh, &circle([0.5, 0.5], 0.15, 12));
            let mut bc = BoundaryConditions::no_slip();
            bc.set(1, Side::Upper, 0, 1.);
            let mut navier = TairaColonius::new(comm, mesh, bodies, bc, 0.1, &params(true)).unwrap();
            navier.step_forward().unwrap();
            navier.step_forward().unwrap();
            (navier.q.norm_l2(comm), navier.force_sums())
        };
        let (serial, fs) = run(&Serial);
        let comms = ThreadComm::group(2);
        let results: Vec<(f64, [f64; 2])> = std::thread::scope(|s| {
            let handles: Vec<_> = comms.iter().map(|c| s.spawn(move || run(c))).collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });
        for (norm, f) in results {
            assert!((norm - serial).abs() < 1e-7 * serial.max(1.));
            for a in 0..2 {
                assert!((f[a] - fs[a]).abs() < 1e-6 * fs[a].abs().max(1.));
            }
        }
    }

    #[test]
    fn test_three_dimensional_step() {
        let run = |comm: &dyn crate::mpi::Communicator| -> (f64, f64, [f64; 3]) {
            let mesh = Mesh::<3>::uniform(comm, [8, 8, 8], [0.; 3], [1.; 3]).unwrap();
            let r = 0.2;
            let points = [
                [0.5 + r, 0.5, 0.5],
                [0.5 - r, 0.5, 0.5],
                [0.5, 0.5 + r, 0.5],
                [0.5, 0.5 - r, 0.5],
                [0.5, 0.5, 0.5 + r],
                [0.5, 0.5, 0.5 - r],
            ];
            let bodies = BodyPoints::partition(&mesh, &points);
            let mut bc = BoundaryConditions::no_slip();
            bc.set(2, Side::Upper, 0, 1.);
            let mut navier = TairaColonius::new(comm, mesh, bodies, bc, 0.1, &params(true)).unwrap();
            navier.step_forward().unwrap();
            navier.step_forward().unwrap();
            (navier.q.norm_l2(comm), navier.div_norm().unwrap(), navier.force_sums())
        };
        let (serial, div, fs) = run(&Serial);
        assert!(serial > 1e-6);
        assert!(div < 1e-7);
        let comms = ThreadComm::group(2);
        let results: Vec<(f64, f64, [f64; 3])> = std::thread::scope(|s| {
            let handles: Vec<_> = comms.iter().map(|c| s.spawn(move || run(c))).collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });
        for (norm, div, f) in results {
            assert!((norm - serial).abs() < 1e-7 * serial.max(1.));
            assert!(div < 1e-7);
            for a in 0..3 {
                assert!((f[a] - fs[a]).abs() < 1e-6 * fs[a].abs().max(1.));
            }
        }
    }
}
