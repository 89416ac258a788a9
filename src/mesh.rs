//! # Structured cartesian mesh
//!
//! Node coordinates per axis, cell centres and a slab decomposition of the
//! cell rows along the last axis. The staggered bookkeeping of velocity
//! faces and pressure cells lives in [`staggered`].
//!
//! ```text
//!      nodes[1][j+1] +-----v-----+
//!                    |           |
//!                    u     p     u      u: face normal to x
//!                    |           |      v: face normal to y
//!      nodes[1][j]   +-----v-----+      p: cell centre
//!               nodes[0][i]  nodes[0][i+1]
//! ```
pub mod staggered;
pub use staggered::StaggeredLayout;

use crate::config::{AxisConfig, MeshConfig};
use crate::error::{Error, Result};
use crate::mpi::Communicator;
use std::ops::Range;

/// Rectilinear mesh in `N` dimensions, `N` = 2 or 3
#[derive(Debug, Clone)]
pub struct Mesh<const N: usize> {
    /// Node coordinates along each axis (`n[a] + 1` values)
    pub nodes: [Vec<f64>; N],
    /// Cell centre coordinates along each axis (`n[a]` values)
    pub centres: [Vec<f64>; N],
    /// Number of cells along each axis
    pub n: [usize; N],
    /// Slab offsets of cell rows along the last axis, one entry per rank + 1
    rows: Vec<usize>,
    rank: usize,
}

impl<const N: usize> Mesh<N> {
    /// Mesh from node coordinates, decomposed over the ranks of `comm`
    ///
    /// # Errors
    /// Dimension other than 2 or 3, less than two cells along an axis,
    /// non increasing coordinates or more ranks than cell rows.
    pub fn new(comm: &dyn Communicator, nodes: [Vec<f64>; N]) -> Result<Self> {
        Self::with_decomposition(nodes, comm.size(), comm.rank())
    }

    /// Same as [`Mesh::new`], with an explicit number of ranks
    ///
    /// # Errors
    /// See [`Mesh::new`]
    pub fn with_decomposition(nodes: [Vec<f64>; N], nprocs: usize, rank: usize) -> Result<Self> {
        if N != 2 && N != 3 {
            return Err(Error::InvalidMesh(format!("dimension must be 2 or 3, got {}", N)));
        }
        for (a, x) in nodes.iter().enumerate() {
            if x.len() < 3 {
                return Err(Error::InvalidMesh(format!("axis {} needs at least two cells", a)));
            }
            if x.windows(2).any(|w| w[1] <= w[0]) {
                return Err(Error::InvalidMesh(format!("nodes of axis {} not increasing", a)));
            }
        }
        let n: [usize; N] = std::array::from_fn(|a| nodes[a].len() - 1);
        let centres: [Vec<f64>; N] =
            std::array::from_fn(|a| nodes[a].windows(2).map(|w| 0.5 * (w[0] + w[1])).collect());
        let rows = decompose(n[N - 1], nprocs)?;
        Ok(Self {
            nodes,
            centres,
            n,
            rows,
            rank,
        })
    }

    /// Uniform mesh on the box `lo..hi`
    ///
    /// # Errors
    /// See [`Mesh::new`]
    pub fn uniform(comm: &dyn Communicator, n: [usize; N], lo: [f64; N], hi: [f64; N]) -> Result<Self> {
        let nodes = std::array::from_fn(|a| {
            let dx = (hi[a] - lo[a]) / n[a] as f64;
            (0..=n[a]).map(|i| lo[a] + dx * i as f64).collect()
        });
        Self::new(comm, nodes)
    }

    /// Mesh from segment definitions of each axis
    ///
    /// # Errors
    /// Wrong number of axes or invalid segments
    pub fn from_config(comm: &dyn Communicator, config: &MeshConfig) -> Result<Self> {
        if config.axes.len() != N {
            return Err(Error::InvalidMesh(format!(
                "expected {} axes, got {}",
                N,
                config.axes.len()
            )));
        }
        let mut nodes: [Vec<f64>; N] = std::array::from_fn(|_| Vec::new());
        for (a, axis) in config.axes.iter().enumerate() {
            nodes[a] = axis_nodes(axis)?;
        }
        Self::new(comm, nodes)
    }

    /// Rank of this process
    pub fn rank(&self) -> usize {
        self.rank
    }

    /// Number of ranks in the decomposition
    pub fn nprocs(&self) -> usize {
        self.rows.len() - 1
    }

    /// Cell rows (last axis) owned by rank `p`
    pub fn cell_rows_of(&self, p: usize) -> Range<usize> {
        self.rows[p]..self.rows[p + 1]
    }

    /// Cell rows (last axis) owned by this rank
    pub fn cell_rows(&self) -> Range<usize> {
        self.cell_rows_of(self.rank)
    }

    /// Width of cell `i` along axis `a`
    pub fn width(&self, a: usize, i: usize) -> f64 {
        self.nodes[a][i + 1] - self.nodes[a][i]
    }

    /// Smallest cell width of all axes
    pub fn min_spacing(&self) -> f64 {
        (0..N)
            .flat_map(|a| (0..self.n[a]).map(move |i| (a, i)))
            .map(|(a, i)| self.width(a, i))
            .fold(f64::INFINITY, f64::min)
    }

    /// Lower corner of the domain
    pub fn lower(&self) -> [f64; N] {
        std::array::from_fn(|a| self.nodes[a][0])
    }

    /// Upper corner of the domain
    pub fn upper(&self) -> [f64; N] {
        std::array::from_fn(|a| self.nodes[a][self.n[a]])
    }

    /// Total number of cells
    pub fn ncells(&self) -> usize {
        self.n.iter().product()
    }

    /// Centre of interior face `idx` of velocity component `c`
    pub fn face_coord(&self, c: usize, idx: &[usize; N]) -> [f64; N] {
        std::array::from_fn(|a| {
            if a == c {
                self.nodes[a][idx[a] + 1]
            } else {
                self.centres[a][idx[a]]
            }
        })
    }

    /// Area (length in 2D) of face `idx` of component `c`
    pub fn face_area(&self, c: usize, idx: &[usize; N]) -> f64 {
        (0..N).filter(|&a| a != c).map(|a| self.width(a, idx[a])).product()
    }

    /// Distance between the two cell centres adjacent to face `idx` of
    /// component `c`
    pub fn face_dn(&self, c: usize, idx: &[usize; N]) -> f64 {
        self.centres[c][idx[c] + 1] - self.centres[c][idx[c]]
    }
}

/// Balanced split of `n` rows over `nprocs` ranks, first ranks get the rest
///
/// # Errors
/// More ranks than rows
pub fn decompose(n: usize, nprocs: usize) -> Result<Vec<usize>> {
    if nprocs == 0 || nprocs > n {
        return Err(Error::InvalidMesh(format!(
            "cannot split {} cell rows across {} ranks",
            n, nprocs
        )));
    }
    let base = n / nprocs;
    let rem = n % nprocs;
    let mut rows = Vec::with_capacity(nprocs + 1);
    rows.push(0);
    for p in 0..nprocs {
        rows.push(rows[p] + base + usize::from(p < rem));
    }
    Ok(rows)
}

/// Node coordinates of one axis
///
/// Within a segment, successive cell widths grow by `stretch`.
///
/// # Errors
/// Empty segments, zero cells, non positive stretch or decreasing ends
pub fn axis_nodes(axis: &AxisConfig) -> Result<Vec<f64>> {
    if axis.segments.is_empty() {
        return Err(Error::InvalidMesh("axis without segments".to_string()));
    }
    let mut nodes = vec![axis.start];
    for seg in &axis.segments {
        let x0 = nodes[nodes.len() - 1];
        let length = seg.end - x0;
        if seg.cells == 0 || length <= 0. || seg.stretch <= 0. {
            return Err(Error::InvalidMesh(format!(
                "invalid segment ending at {} ({} cells, stretch {})",
                seg.end, seg.cells, seg.stretch
            )));
        }
        let r = seg.stretch;
        let w0 = if (r - 1.).abs() < 1e-12 {
            length / seg.cells as f64
        } else {
            length * (r - 1.) / (r.powi(seg.cells as i32) - 1.)
        };
        let mut x = x0;
        let mut w = w0;
        for i in 0..seg.cells {
            x = if i + 1 == seg.cells { seg.end } else { x + w };
            nodes.push(x);
            w *= r;
        }
    }
    Ok(nodes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Segment;
    use crate::mpi::Serial;

    #[test]
    fn test_decompose() {
        assert_eq!(decompose(10, 3).unwrap(), vec![0, 4, 7, 10]);
        assert_eq!(decompose(4, 1).unwrap(), vec![0, 4]);
        assert!(decompose(2, 3).is_err());
    }

    #[test]
    fn test_uniform_mesh() {
        let mesh = Mesh::<2>::uniform(&Serial, [4, 5], [0., -1.], [2., 1.5]).unwrap();
        assert_eq!(mesh.n, [4, 5]);
        assert!((mesh.centres[0][0] - 0.25).abs() < 1e-14);
        assert!((mesh.min_spacing() - 0.5).abs() < 1e-14);
        assert_eq!(mesh.cell_rows(), 0..5);
        assert_eq!(mesh.upper(), [2., 1.5]);
    }

    #[test]
    fn test_invalid_mesh() {
        assert!(Mesh::<2>::uniform(&Serial, [1, 4], [0., 0.], [1., 1.]).is_err());
        assert!(Mesh::<4>::uniform(&Serial, [4; 4], [0.; 4], [1.; 4]).is_err());
        assert!(Mesh::<2>::new(&Serial, [vec![0., 1., 0.5], vec![0., 1., 2.]]).is_err());
    }

    #[test]
    fn test_stretched_axis() {
        let axis = AxisConfig {
            start: -2.,
            segments: vec![
                Segment {
                    end: 0.,
                    cells: 4,
                    stretch: 1.,
                },
                Segment {
                    end: 3.,
                    cells: 3,
                    stretch: 2.,
                },
            ],
        };
        let x = axis_nodes(&axis).unwrap();
        assert_eq!(x.len(), 8);
        // widths 3/7, 6/7, 12/7
        assert!((x[5] - 3. / 7.).abs() < 1e-12);
        assert!((x[6] - 9. / 7.).abs() < 1e-12);
        assert_eq!(x[7], 3.);
    }
}
