//! # Solver state and construction
use super::schemes::{History, SchemeCoefficients};
use crate::body::{self, BodyPoints};
use crate::config::{ParameterConfig, SimulationConfig};
use crate::coupling::{bn_diagonal, CouplingOperator};
use crate::error::{Error, Result};
use crate::io::IterationLog;
use crate::mesh::{Mesh, StaggeredLayout};
use crate::mpi::Communicator;
use crate::operators::{laplacian, BoundaryConditions};
use crate::solver::{LinSolver, SolveInfo};
use crate::sparse::{DistMatrix, DistVector};
use std::collections::HashMap;
use std::path::PathBuf;
use tracing::info;

/// Matrices and vectors derived from mesh, bodies and parameters
///
/// Never modified after construction, see
/// [`TairaColonius::rebuild_operators`].
#[derive(Debug, Clone)]
pub struct Operators {
    /// `BN Q` and `Q^T`
    pub coupling: CouplingOperator,
    /// `Q^T BN Q`, row and column 0 replaced when pinned
    pub poisson: DistMatrix,
    /// Laplacian in flux form
    pub laplacian: DistMatrix,
    /// `I / dt - nu d_impl L`
    pub velocity: DistMatrix,
    /// Wall correction of the Laplacian
    pub bc_l: DistVector,
    /// Prescribed wall fluxes entering the cells
    pub bc_d: DistVector,
    /// Null space of the pressure / force system, if not pinned
    pub null_space: Option<DistVector>,
}

/// Incompressible flow with immersed bodies
pub struct TairaColonius<'a, const N: usize> {
    /// Process group
    pub(crate) comm: &'a dyn Communicator,
    /// Mesh
    pub mesh: Mesh<N>,
    /// Index bookkeeping
    pub layout: StaggeredLayout<N>,
    /// Immersed body points
    pub bodies: BodyPoints<N>,
    /// Wall velocities
    pub bc: BoundaryConditions<N>,
    /// Fluxes at the current time level
    pub q: DistVector,
    /// Intermediate fluxes
    pub q_star: DistVector,
    /// Pressure and body forces
    pub lambda: DistVector,
    /// Last increment of `lambda`
    pub delta_lambda: DistVector,
    /// Velocity right hand side
    pub(crate) rhs1: DistVector,
    /// Pressure / force right hand side
    pub(crate) rhs2: DistVector,
    /// Derived operators
    pub(crate) ops: Operators,
    /// Past convective terms `-N(q)`
    pub(crate) conv_history: History,
    /// Past diffusive terms `L q`
    pub(crate) diff_history: History,
    /// Convection weights
    pub(crate) conv_coeffs: Vec<f64>,
    /// Diffusion weights
    pub(crate) diff_coeffs: SchemeCoefficients,
    /// Velocity system solver
    pub(crate) velocity_solver: LinSolver,
    /// Pressure / force system solver
    pub(crate) poisson_solver: LinSolver,
    /// Statistics of the last velocity solve
    pub velocity_info: SolveInfo,
    /// Statistics of the last pressure / force solve
    pub poisson_info: SolveInfo,
    /// Kinematic viscosity
    pub nu: f64,
    /// Time step size
    pub dt: f64,
    /// Time
    pub time: f64,
    /// Time step counter
    pub step: usize,
    /// Width of the delta kernel
    pub h: f64,
    /// Pin the pressure of the first cell
    pub reference_pressure: bool,
    /// Restart data interval (steps), 0 disables
    pub nrestart: usize,
    /// Output directory
    pub output: PathBuf,
    /// Per step iteration log (rank 0)
    pub(crate) log: Option<IterationLog>,
    /// diagnostics like divergence, forces, phase times ...
    pub diagnostics: HashMap<String, Vec<f64>>,
}

impl<'a, const N: usize> TairaColonius<'a, N> {
    /// Solver at rest
    ///
    /// # Errors
    /// Invalid parameters, or operator assembly failed
    pub fn new(
        comm: &'a dyn Communicator,
        mesh: Mesh<N>,
        bodies: BodyPoints<N>,
        bc: BoundaryConditions<N>,
        nu: f64,
        params: &ParameterConfig,
    ) -> Result<Self> {
        let layout = StaggeredLayout::new(&mesh, bodies.counts())?;
        let h = params.kernel_width.unwrap_or_else(|| mesh.min_spacing());
        let conv_coeffs = params.convection.convection_coefficients()?;
        let diff_coeffs = params.diffusion.diffusion_coefficients();
        let ops = build_operators(
            comm,
            &mesh,
            &layout,
            &bodies,
            &bc,
            nu,
            params.dt,
            h,
            diff_coeffs.implicit,
            params.reference_pressure,
        )?;
        let zero = SolveInfo {
            iterations: 0,
            residual: 0.,
        };
        if comm.rank() == 0 {
            info!(
                "mesh {:?}, {} velocity unknowns, {} body points, h = {:e}",
                mesh.n,
                layout.velocity.global_len(),
                bodies.len(),
                h
            );
        }
        Ok(Self {
            comm,
            q: DistVector::zeros(&layout.velocity),
            q_star: DistVector::zeros(&layout.velocity),
            lambda: DistVector::zeros(&layout.lambda),
            delta_lambda: DistVector::zeros(&layout.lambda),
            rhs1: DistVector::zeros(&layout.velocity),
            rhs2: DistVector::zeros(&layout.lambda),
            conv_history: History::new(conv_coeffs.len()),
            diff_history: History::new(diff_coeffs.explicit.len()),
            conv_coeffs,
            diff_coeffs,
            velocity_solver: LinSolver::new(&params.velocity_solver),
            poisson_solver: LinSolver::new(&params.poisson_solver),
            velocity_info: zero,
            poisson_info: zero,
            nu,
            dt: params.dt,
            time: params.start_step as f64 * params.dt,
            step: params.start_step,
            h,
            reference_pressure: params.reference_pressure,
            nrestart: params.nrestart,
            output: PathBuf::from("data"),
            log: None,
            diagnostics: HashMap::new(),
            mesh,
            layout,
            bodies,
            bc,
            ops,
        })
    }

    /// Solver from a complete configuration, with initial condition
    ///
    /// # Errors
    /// Dimension mismatch, invalid input or operator assembly failed
    pub fn from_config(comm: &'a dyn Communicator, config: &SimulationConfig) -> Result<Self> {
        if config.dimension() != N {
            return Err(Error::Config(format!(
                "configuration is {}-dimensional, solver is {}-dimensional",
                config.dimension(),
                N
            )));
        }
        let mesh = Mesh::from_config(comm, &config.mesh)?;
        let points = body::points_from_config::<N>(&config.bodies)?;
        let bodies = BodyPoints::partition(&mesh, &points);
        let bc = BoundaryConditions::from_config(&config.flow.walls)?;
        let mut navier = Self::new(comm, mesh, bodies, bc, config.flow.nu, &config.parameters)?;
        navier.output = config.output.directory.clone();
        if !config.flow.initial_velocity.is_empty() {
            let mut u = [0.; N];
            u.copy_from_slice(&config.flow.initial_velocity);
            navier.set_velocity(u);
        }
        if config.flow.perturbation > 0. {
            navier.random_perturbation(config.flow.perturbation);
        }
        Ok(navier)
    }

    /// Rank of this process
    pub fn nrank(&self) -> usize {
        self.comm.rank()
    }

    /// Total number of processes
    pub fn nprocs(&self) -> usize {
        self.comm.size()
    }

    /// Communicator
    pub fn comm(&self) -> &'a dyn Communicator {
        self.comm
    }

    /// Current operators
    pub fn operators(&self) -> &Operators {
        &self.ops
    }

    /// Reset time
    pub fn reset_time(&mut self) {
        self.time = 0.;
        self.step = 0;
    }

    /// Uniform velocity everywhere
    pub fn set_velocity(&mut self, u: [f64; N]) {
        for i in 0..self.layout.velocity.local_len() {
            let (c, idx) = self.layout.local_face(i);
            self.q.v[i] = u[c] * self.mesh.face_area(c, &idx);
        }
    }

    /// Rebuild all operators, e.g. after changing `dt`, `nu`, walls or
    /// bodies. The body point distribution must keep the lambda layout.
    ///
    /// # Errors
    /// Assembly failed, the previous operators are kept
    pub fn rebuild_operators(&mut self) -> Result<()> {
        let ops = build_operators(
            self.comm,
            &self.mesh,
            &self.layout,
            &self.bodies,
            &self.bc,
            self.nu,
            self.dt,
            self.h,
            self.diff_coeffs.implicit,
            self.reference_pressure,
        )?;
        self.ops = ops;
        Ok(())
    }

    /// Start writing the per step iteration log (rank 0)
    ///
    /// # Errors
    /// File can not be opened
    pub fn open_iteration_log(&mut self) -> Result<()> {
        if self.nrank() == 0 {
            std::fs::create_dir_all(&self.output)?;
            self.log = Some(IterationLog::open(self.output.join("iterations.txt"))?);
        }
        Ok(())
    }
}

/// Assemble every operator of the step (collective)
#[allow(clippy::too_many_arguments)]
fn build_operators<const N: usize>(
    comm: &dyn Communicator,
    mesh: &Mesh<N>,
    layout: &StaggeredLayout<N>,
    bodies: &BodyPoints<N>,
    bc: &BoundaryConditions<N>,
    nu: f64,
    dt: f64,
    h: f64,
    implicit: f64,
    reference_pressure: bool,
) -> Result<Operators> {
    let bn = bn_diagonal(mesh, layout, dt);
    let coupling = CouplingOperator::build(comm, mesh, layout, bodies, h, &bn)?;
    let mut poisson = coupling.poisson_matrix(comm)?;
    let null_space = if reference_pressure {
        poisson.zero_rows_columns(&[0], 1.)?;
        None
    } else {
        let mut n = DistVector::zeros(&layout.lambda);
        for i in 0..layout.local_cells() {
            n.v[i] = 1.;
        }
        Some(n)
    };
    let (laplacian, bc_l) = laplacian(comm, mesh, layout, bc)?;
    let mut velocity = laplacian.clone();
    velocity.scale(-nu * implicit);
    velocity.shift_diagonal(1. / dt)?;
    let bc_d = bc.boundary_flux(mesh, layout);
    Ok(Operators {
        coupling,
        poisson,
        laplacian,
        velocity,
        bc_l,
        bc_d,
        null_space,
    })
}
