//! Dirichlet wall velocities
use crate::config::WallConfig;
use crate::error::{Error, Result};
use crate::mesh::{Mesh, StaggeredLayout};
use crate::sparse::DistVector;
use serde::{Deserialize, Serialize};

/// Wall of an axis
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    /// At the first node
    Lower,
    /// At the last node
    Upper,
}

/// Prescribed velocity on the `2 N` walls of the box
#[derive(Debug, Clone, PartialEq)]
pub struct BoundaryConditions<const N: usize> {
    /// `walls[a][side][c]`: component `c` on the wall normal to axis `a`
    walls: [[[f64; N]; 2]; N],
}

impl<const N: usize> Default for BoundaryConditions<N> {
    fn default() -> Self {
        Self::no_slip()
    }
}

impl<const N: usize> BoundaryConditions<N> {
    /// Resting walls
    pub fn no_slip() -> Self {
        Self {
            walls: [[[0.; N]; 2]; N],
        }
    }

    /// Wall values from the configuration, missing walls are at rest
    ///
    /// # Errors
    /// Axis out of range or wrong number of velocity components
    pub fn from_config(walls: &[WallConfig]) -> Result<Self> {
        let mut bc = Self::no_slip();
        for w in walls {
            if w.axis >= N || w.velocity.len() != N {
                return Err(Error::Config(format!(
                    "wall on axis {} needs {} velocity components",
                    w.axis, N
                )));
            }
            for (c, &u) in w.velocity.iter().enumerate() {
                bc.set(w.axis, w.side, c, u);
            }
        }
        Ok(bc)
    }

    /// Set component `c` on the wall `side` of axis `a`
    pub fn set(&mut self, a: usize, side: Side, c: usize, value: f64) {
        self.walls[a][side as usize][c] = value;
    }

    /// Component `c` on the wall `side` of axis `a`
    pub fn get(&self, a: usize, side: Side, c: usize) -> f64 {
        self.walls[a][side as usize][c]
    }

    /// Prescribed wall fluxes entering each local cell, zero on the force
    /// entries of the lambda layout
    pub fn boundary_flux(&self, mesh: &Mesh<N>, layout: &StaggeredLayout<N>) -> DistVector {
        let mut bc = DistVector::zeros(&layout.lambda);
        for i in 0..layout.local_cells() {
            let idx = layout.local_cell(i);
            let mut flux = 0.;
            for a in 0..N {
                let area: f64 = (0..N).filter(|&b| b != a).map(|b| mesh.width(b, idx[b])).product();
                if idx[a] == 0 {
                    flux += self.get(a, Side::Lower, a) * area;
                }
                if idx[a] == mesh.n[a] - 1 {
                    flux -= self.get(a, Side::Upper, a) * area;
                }
            }
            bc.v[i] = flux;
        }
        bc
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mpi::Serial;

    #[test]
    fn test_boundary_flux() {
        let mesh = Mesh::<2>::uniform(&Serial, [4, 2], [0., 0.], [1., 1.]).unwrap();
        let layout = StaggeredLayout::new(&mesh, &[3]).unwrap();
        let mut bc = BoundaryConditions::<2>::no_slip();
        // inflow left, outflow right
        bc.set(0, Side::Lower, 0, 2.);
        bc.set(0, Side::Upper, 0, 2.);
        // tangential value does not contribute
        bc.set(1, Side::Upper, 0, 5.);
        let flux = bc.boundary_flux(&mesh, &layout);
        assert_eq!(flux.v.len(), 8 + 6);
        assert!((flux.v[0] - 1.).abs() < 1e-14);
        assert!((flux.v[3] + 1.).abs() < 1e-14);
        assert_eq!(flux.v[1], 0.);
        assert!(flux.v.iter().skip(8).all(|&x| x == 0.));
        // net flux balances
        assert!(flux.v.sum().abs() < 1e-14);
    }
}
