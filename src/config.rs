//! # Simulation input
//!
//! Read from a yaml file:
//! ```yaml
//! mesh:
//!   axes:
//!     - start: -2.0
//!       segments:
//!         - { end: 2.0, cells: 80 }
//!     - start: -2.0
//!       segments:
//!         - { end: 2.0, cells: 80 }
//! flow:
//!   nu: 0.025
//!   initial_velocity: [1.0, 0.0]
//!   walls:
//!     - { axis: 0, side: lower, velocity: [1.0, 0.0] }
//!     - { axis: 0, side: upper, velocity: [1.0, 0.0] }
//! parameters:
//!   dt: 0.01
//!   nt: 1000
//!   convection: ADAMS_BASHFORTH_2
//!   diffusion: CRANK_NICOLSON
//! bodies:
//!   - { type: circle, center: [0.0, 0.0], radius: 0.5, points: 158 }
//! ```
use crate::error::{Error, Result};
use crate::navier_stokes::TimeScheme;
use crate::operators::Side;
use crate::solver::{SolverKind, SolverSettings};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Complete input of a run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationConfig {
    /// Mesh definition
    pub mesh: MeshConfig,
    /// Fluid and boundary values
    #[serde(default)]
    pub flow: FlowConfig,
    /// Time stepping and solvers
    #[serde(default)]
    pub parameters: ParameterConfig,
    /// Immersed bodies
    #[serde(default)]
    pub bodies: Vec<BodyConfig>,
    /// Output location
    #[serde(default)]
    pub output: OutputConfig,
}

/// Mesh definition, one entry per axis
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeshConfig {
    /// Axes x, y (, z)
    pub axes: Vec<AxisConfig>,
}

/// Node distribution along one axis
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AxisConfig {
    /// First node
    pub start: f64,
    /// Consecutive segments
    pub segments: Vec<Segment>,
}

/// Part of an axis with geometric cell growth
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    /// Last node of the segment
    pub end: f64,
    /// Number of cells
    pub cells: usize,
    /// Ratio of successive cell widths
    #[serde(default = "default_stretch")]
    pub stretch: f64,
}

fn default_stretch() -> f64 {
    1.
}

/// Fluid properties, initial and wall values
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowConfig {
    /// Kinematic viscosity
    #[serde(default = "default_nu")]
    pub nu: f64,
    /// Uniform initial velocity (zero if empty)
    #[serde(default)]
    pub initial_velocity: Vec<f64>,
    /// Amplitude of a random initial perturbation
    #[serde(default)]
    pub perturbation: f64,
    /// Wall velocities, walls not listed are at rest
    #[serde(default)]
    pub walls: Vec<WallConfig>,
}

fn default_nu() -> f64 {
    0.01
}

impl Default for FlowConfig {
    fn default() -> Self {
        Self {
            nu: default_nu(),
            initial_velocity: Vec::new(),
            perturbation: 0.,
            walls: Vec::new(),
        }
    }
}

/// Velocity on one wall
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WallConfig {
    /// Axis normal to the wall
    pub axis: usize,
    /// Lower or upper end of the axis
    pub side: Side,
    /// Velocity vector on the wall
    pub velocity: Vec<f64>,
}

/// Time stepping and linear solver parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParameterConfig {
    /// Time step size
    pub dt: f64,
    /// Number of steps
    pub nt: usize,
    /// Save interval (steps)
    pub nsave: usize,
    /// Restart data interval (steps), 0 disables
    pub nrestart: usize,
    /// Step to restart from, 0 starts from the initial condition
    pub start_step: usize,
    /// Scheme of the convective term
    pub convection: TimeScheme,
    /// Scheme of the diffusive term
    pub diffusion: TimeScheme,
    /// Velocity system solver
    pub velocity_solver: SolverSettings,
    /// Pressure / force system solver
    pub poisson_solver: SolverSettings,
    /// Pin the pressure of the first cell
    pub reference_pressure: bool,
    /// Width of the delta kernel, smallest cell width if not set
    pub kernel_width: Option<f64>,
}

impl Default for ParameterConfig {
    fn default() -> Self {
        Self {
            dt: 0.01,
            nt: 100,
            nsave: 100,
            nrestart: 0,
            start_step: 0,
            convection: TimeScheme::EulerExplicit,
            diffusion: TimeScheme::EulerImplicit,
            velocity_solver: SolverSettings::with_kind(SolverKind::BiCgStab),
            poisson_solver: SolverSettings::with_kind(SolverKind::Cg),
            reference_pressure: false,
            kernel_width: None,
        }
    }
}

/// Source of body points
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum BodyConfig {
    /// Equally spaced points on a circle (2D)
    Circle {
        /// Centre
        center: Vec<f64>,
        /// Radius
        radius: f64,
        /// Number of points
        points: usize,
    },
    /// Ascii point file
    File {
        /// Path of the file
        path: PathBuf,
    },
}

/// Output location
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Directory of solution, restart and log files
    pub directory: PathBuf,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("data"),
        }
    }
}

impl SimulationConfig {
    /// Read configuration from yaml file
    ///
    /// # Errors
    /// File not readable, malformed yaml or invalid values
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_yaml(&content)
    }

    /// Parse configuration from a yaml string
    ///
    /// # Errors
    /// Malformed yaml or invalid values
    pub fn from_yaml(content: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Write configuration to yaml file
    ///
    /// # Errors
    /// File not writable
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = serde_yaml::to_string(self)?;
        std::fs::write(path.as_ref(), content)?;
        Ok(())
    }

    /// Number of space dimensions
    pub fn dimension(&self) -> usize {
        self.mesh.axes.len()
    }

    /// Check value ranges
    ///
    /// # Errors
    /// First invalid value
    pub fn validate(&self) -> Result<()> {
        let dim = self.dimension();
        if dim != 2 && dim != 3 {
            return Err(Error::Config(format!("mesh needs 2 or 3 axes, got {}", dim)));
        }
        let p = &self.parameters;
        if p.dt <= 0. {
            return Err(Error::Config(format!("dt must be positive, got {}", p.dt)));
        }
        if self.flow.nu < 0. {
            return Err(Error::Config(format!("nu must not be negative, got {}", self.flow.nu)));
        }
        if p.nsave == 0 {
            return Err(Error::Config("nsave must be positive".to_string()));
        }
        if matches!(p.kernel_width, Some(h) if h <= 0.) {
            return Err(Error::Config("kernel_width must be positive".to_string()));
        }
        if !self.flow.initial_velocity.is_empty() && self.flow.initial_velocity.len() != dim {
            return Err(Error::Config(format!(
                "initial_velocity needs {} components",
                dim
            )));
        }
        p.convection.convection_coefficients()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const INPUT: &str = r#"
mesh:
  axes:
    - start: 0.0
      segments:
        - { end: 1.0, cells: 32 }
    - start: 0.0
      segments:
        - { end: 0.5, cells: 8, stretch: 0.9 }
        - { end: 1.0, cells: 8, stretch: 1.1 }
flow:
  nu: 0.01
  walls:
    - { axis: 1, side: upper, velocity: [1.0, 0.0] }
parameters:
  dt: 0.005
  nt: 20
  convection: ADAMS_BASHFORTH_2
  diffusion: CRANK_NICOLSON
  poisson_solver: { type: CG, rtol: 1.0e-10 }
  reference_pressure: true
bodies:
  - { type: circle, center: [0.5, 0.5], radius: 0.1, points: 20 }
  - { type: file, path: body.txt }
"#;

    #[test]
    fn test_parse_config() {
        let config = SimulationConfig::from_yaml(INPUT).unwrap();
        assert_eq!(config.dimension(), 2);
        assert_eq!(config.mesh.axes[1].segments[0].stretch, 0.9);
        assert_eq!(config.mesh.axes[0].segments[0].stretch, 1.);
        assert_eq!(config.flow.walls[0].side, Side::Upper);
        assert_eq!(config.parameters.convection, TimeScheme::AdamsBashforth2);
        assert_eq!(config.parameters.poisson_solver.kind, SolverKind::Cg);
        assert_eq!(config.parameters.poisson_solver.rtol, 1e-10);
        assert_eq!(config.parameters.poisson_solver.max_iter, 10_000);
        assert_eq!(config.parameters.velocity_solver.kind, SolverKind::BiCgStab);
        assert!(config.parameters.reference_pressure);
        assert_eq!(config.bodies.len(), 2);
        assert_eq!(config.output.directory, PathBuf::from("data"));
    }

    #[test]
    fn test_save_load() {
        let config = SimulationConfig::from_yaml(INPUT).unwrap();
        let path = std::env::temp_dir().join("rustibm_test_config.yaml");
        config.save(&path).unwrap();
        let other = SimulationConfig::load(&path).unwrap();
        assert_eq!(config, other);
        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_invalid_config() {
        let bad = INPUT.replace("dt: 0.005", "dt: -1.0");
        assert!(matches!(SimulationConfig::from_yaml(&bad), Err(Error::Config(_))));
        let bad = INPUT.replace("convection: ADAMS_BASHFORTH_2", "convection: CRANK_NICOLSON");
        assert!(SimulationConfig::from_yaml(&bad).is_err());
        assert!(matches!(SimulationConfig::from_yaml("mesh: ["), Err(Error::Yaml(_))));
    }
}
