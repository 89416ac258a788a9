//! Global numbering of velocity faces, pressure cells and body forces
//!
//! Only interior faces carry unknowns, faces on the domain walls hold
//! prescribed values. Component `c` lives on a grid of shape
//! `n[c] - 1` along axis `c` and `n[a]` along every other axis.
//!
//! Numbering is process major. Inside the block of a rank:
//! - velocity: all faces of `u`, then `v` (then `w`), x fastest
//! - lambda: all cells (x fastest), then the force components of the
//!   body points owned by the rank, `fx` block first
//!
//! Face rows along the last axis `d` follow the cell rows `j0..j1` of the
//! rank, the `d` component owns the faces `j0..min(j1, n_d - 1)`.
use super::Mesh;
use crate::error::{Error, Result};
use crate::sparse::Layout;
use ndarray::{Array2, ArrayD, IxDyn};
use std::ops::Range;

/// Index bookkeeping of the staggered grid and the lambda space
#[derive(Debug, Clone)]
pub struct StaggeredLayout<const N: usize> {
    n: [usize; N],
    rows: Vec<usize>,
    rank: usize,
    /// Distribution of velocity fluxes
    pub velocity: Layout,
    /// Distribution of `[pressure; forces]`
    pub lambda: Layout,
    point_counts: Vec<usize>,
    point_offsets: Vec<usize>,
}

/// Linear index, axis 0 fastest
pub fn ravel<const N: usize>(idx: &[usize; N], shape: &[usize; N]) -> usize {
    idx.iter()
        .zip(shape.iter())
        .rev()
        .fold(0, |acc, (&i, &s)| acc * s + i)
}

/// Inverse of [`ravel`]
pub fn unravel<const N: usize>(mut k: usize, shape: &[usize; N]) -> [usize; N] {
    let mut idx = [0; N];
    for a in 0..N {
        idx[a] = k % shape[a];
        k /= shape[a];
    }
    idx
}

impl<const N: usize> StaggeredLayout<N> {
    /// Layout for `mesh` with `point_counts[p]` body points on rank `p`
    ///
    /// # Errors
    /// `point_counts` has not one entry per rank
    pub fn new(mesh: &Mesh<N>, point_counts: &[usize]) -> Result<Self> {
        let nprocs = mesh.nprocs();
        if point_counts.len() != nprocs {
            return Err(Error::SizeMismatch {
                expected: nprocs,
                found: point_counts.len(),
            });
        }
        let rows: Vec<usize> = (0..=nprocs)
            .map(|p| if p < nprocs { mesh.cell_rows_of(p).start } else { mesh.n[N - 1] })
            .collect();
        let mut layout = Self {
            n: mesh.n,
            rows,
            rank: mesh.rank(),
            velocity: Layout::from_counts(&[0], 0),
            lambda: Layout::from_counts(&[0], 0),
            point_counts: point_counts.to_vec(),
            point_offsets: Vec::with_capacity(nprocs + 1),
        };
        let vel: Vec<usize> = (0..nprocs)
            .map(|p| (0..N).map(|c| layout.face_count(c, p)).sum())
            .collect();
        let lam: Vec<usize> = (0..nprocs)
            .map(|p| layout.cell_count(p) + N * point_counts[p])
            .collect();
        layout.velocity = Layout::from_counts(&vel, layout.rank);
        layout.lambda = Layout::from_counts(&lam, layout.rank);
        layout.point_offsets.push(0);
        for p in 0..nprocs {
            let last = layout.point_offsets[p];
            layout.point_offsets.push(last + point_counts[p]);
        }
        Ok(layout)
    }

    /// Number of cells along each axis
    pub fn n(&self) -> [usize; N] {
        self.n
    }

    /// Number of ranks
    pub fn nprocs(&self) -> usize {
        self.rows.len() - 1
    }

    /// Shape of the face grid of component `c`
    pub fn face_shape(&self, c: usize) -> [usize; N] {
        let mut shape = self.n;
        shape[c] -= 1;
        shape
    }

    /// Face rows (last axis) of component `c` owned by rank `p`
    pub fn face_rows(&self, c: usize, p: usize) -> Range<usize> {
        let (j0, j1) = (self.rows[p], self.rows[p + 1]);
        if c == N - 1 {
            j0.min(self.n[N - 1] - 1)..j1.min(self.n[N - 1] - 1)
        } else {
            j0..j1
        }
    }

    /// Local shape of the face block of component `c` on rank `p`
    fn local_face_shape(&self, c: usize, p: usize) -> [usize; N] {
        let mut shape = self.face_shape(c);
        shape[N - 1] = self.face_rows(c, p).len();
        shape
    }

    /// Number of faces of component `c` on rank `p`
    pub fn face_count(&self, c: usize, p: usize) -> usize {
        self.local_face_shape(c, p).iter().product()
    }

    /// Number of cells on rank `p`
    pub fn cell_count(&self, p: usize) -> usize {
        let plane: usize = self.n[..N - 1].iter().product();
        plane * (self.rows[p + 1] - self.rows[p])
    }

    /// Offset of component `c` inside the velocity block of rank `p`
    fn component_offset(&self, c: usize, p: usize) -> usize {
        (0..c).map(|b| self.face_count(b, p)).sum()
    }

    /// Owner of a face of component `c` with last-axis index `j`
    fn face_owner(&self, c: usize, j: usize) -> usize {
        (0..self.nprocs())
            .find(|&p| self.face_rows(c, p).contains(&j))
            .unwrap_or(self.nprocs() - 1)
    }

    /// Owner of a cell with last-axis index `j`
    fn cell_owner(&self, j: usize) -> usize {
        self.rows.partition_point(|&r| r <= j).saturating_sub(1).min(self.nprocs() - 1)
    }

    /// Global velocity row of face `idx` of component `c`
    pub fn row_of(&self, c: usize, idx: &[usize; N]) -> usize {
        let p = self.face_owner(c, idx[N - 1]);
        let mut local = *idx;
        local[N - 1] -= self.face_rows(c, p).start;
        self.velocity.range_of(p).start
            + self.component_offset(c, p)
            + ravel(&local, &self.local_face_shape(c, p))
    }

    /// Component and face index of global velocity row `row`
    pub fn face_of(&self, row: usize) -> (usize, [usize; N]) {
        let p = self.velocity.owner(row);
        let mut k = row - self.velocity.range_of(p).start;
        for c in 0..N {
            let count = self.face_count(c, p);
            if k < count {
                let mut idx = unravel(k, &self.local_face_shape(c, p));
                idx[N - 1] += self.face_rows(c, p).start;
                return (c, idx);
            }
            k -= count;
        }
        unreachable!("row {} beyond the velocity block of rank {}", row, p)
    }

    /// Component and face index of local velocity row `i`
    pub fn local_face(&self, i: usize) -> (usize, [usize; N]) {
        self.face_of(i + self.velocity.start())
    }

    /// True if `idx` is an interior face of component `c`
    pub fn is_face(&self, c: usize, idx: &[isize; N]) -> bool {
        let shape = self.face_shape(c);
        idx.iter().zip(shape.iter()).all(|(&i, &s)| i >= 0 && (i as usize) < s)
    }

    /// Global lambda column of cell `idx`
    pub fn cell_column(&self, idx: &[usize; N]) -> usize {
        let p = self.cell_owner(idx[N - 1]);
        let mut shape = self.n;
        shape[N - 1] = self.rows[p + 1] - self.rows[p];
        let mut local = *idx;
        local[N - 1] -= self.rows[p];
        self.lambda.range_of(p).start + ravel(&local, &shape)
    }

    /// Cell index of the `i`-th local cell
    pub fn local_cell(&self, i: usize) -> [usize; N] {
        let mut shape = self.n;
        shape[N - 1] = self.rows[self.rank + 1] - self.rows[self.rank];
        let mut idx = unravel(i, &shape);
        idx[N - 1] += self.rows[self.rank];
        idx
    }

    /// Number of local cells
    pub fn local_cells(&self) -> usize {
        self.cell_count(self.rank)
    }

    /// Total number of body points
    pub fn npoints(&self) -> usize {
        self.point_offsets[self.nprocs()]
    }

    /// Global point indices owned by rank `p`
    pub fn point_range(&self, p: usize) -> Range<usize> {
        self.point_offsets[p]..self.point_offsets[p + 1]
    }

    /// Number of points per rank
    pub fn point_counts(&self) -> &[usize] {
        &self.point_counts
    }

    /// Global lambda column of force component `a` of body point `l`
    pub fn force_column(&self, a: usize, l: usize) -> usize {
        let p = self.point_offsets.partition_point(|&o| o <= l) - 1;
        self.lambda.range_of(p).start
            + self.cell_count(p)
            + a * self.point_counts[p]
            + (l - self.point_offsets[p])
    }

    /// True if local lambda entry `i` belongs to a cell
    pub fn is_local_cell_entry(&self, i: usize) -> bool {
        i < self.local_cells()
    }

    /// True if global lambda column `col` belongs to a cell
    pub fn is_cell_column(&self, col: usize) -> bool {
        let p = self.lambda.owner(col);
        col - self.lambda.range_of(p).start < self.cell_count(p)
    }

    /// Replicated velocity vector to the natural grid of component `c`
    pub fn natural_component(&self, c: usize, q: &[f64]) -> ArrayD<f64> {
        let shape = self.face_shape(c);
        let mut out = ArrayD::zeros(IxDyn(&shape));
        for k in 0..shape.iter().product() {
            let idx = unravel(k, &shape);
            out[IxDyn(&idx)] = q[self.row_of(c, &idx)];
        }
        out
    }

    /// Local velocity entries from natural component grids
    ///
    /// # Errors
    /// Wrong number of components or wrong grid shape
    pub fn local_from_natural(&self, fields: &[ArrayD<f64>]) -> Result<Vec<f64>> {
        if fields.len() != N {
            return Err(Error::SizeMismatch {
                expected: N,
                found: fields.len(),
            });
        }
        let mut out = Vec::with_capacity(self.velocity.local_len());
        for i in 0..self.velocity.local_len() {
            let (c, idx) = self.local_face(i);
            if fields[c].shape() != self.face_shape(c) {
                return Err(Error::SizeMismatch {
                    expected: self.face_shape(c).iter().product(),
                    found: fields[c].len(),
                });
            }
            out.push(fields[c][IxDyn(&idx)]);
        }
        Ok(out)
    }

    /// Replicated lambda vector to the natural cell grid
    pub fn natural_cells(&self, lambda: &[f64]) -> ArrayD<f64> {
        let mut out = ArrayD::zeros(IxDyn(&self.n));
        for k in 0..self.n.iter().product() {
            let idx = unravel(k, &self.n);
            out[IxDyn(&idx)] = lambda[self.cell_column(&idx)];
        }
        out
    }

    /// Local lambda entries from a natural cell grid and forces
    /// (`npoints x N`, global point order)
    ///
    /// # Errors
    /// Wrong shapes
    pub fn local_lambda_from_natural(&self, cells: &ArrayD<f64>, forces: &Array2<f64>) -> Result<Vec<f64>> {
        if cells.shape() != self.n || forces.shape() != [self.npoints(), N] {
            return Err(Error::SizeMismatch {
                expected: self.n.iter().product::<usize>() + N * self.npoints(),
                found: cells.len() + forces.len(),
            });
        }
        let mut out = Vec::with_capacity(self.lambda.local_len());
        for i in 0..self.local_cells() {
            out.push(cells[IxDyn(&self.local_cell(i))]);
        }
        for a in 0..N {
            for l in self.point_range(self.rank) {
                out.push(forces[[l, a]]);
            }
        }
        Ok(out)
    }

    /// Body forces of a replicated lambda vector, `npoints x N`
    pub fn forces(&self, lambda: &[f64]) -> Array2<f64> {
        let mut out = Array2::zeros((self.npoints(), N));
        for l in 0..self.npoints() {
            for a in 0..N {
                out[[l, a]] = lambda[self.force_column(a, l)];
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn layout(n: [usize; 2], nprocs: usize, rank: usize, points: &[usize]) -> StaggeredLayout<2> {
        let nodes = std::array::from_fn(|a| (0..=n[a]).map(|i| i as f64).collect());
        let mesh = Mesh::<2>::with_decomposition(nodes, nprocs, rank).unwrap();
        StaggeredLayout::new(&mesh, points).unwrap()
    }

    #[test]
    fn test_serial_numbering() {
        let l = layout([4, 3], 1, 0, &[2]);
        // u: 3x3, v: 4x2
        assert_eq!(l.velocity.global_len(), 9 + 8);
        assert_eq!(l.lambda.global_len(), 12 + 4);
        assert_eq!(l.row_of(0, &[0, 0]), 0);
        assert_eq!(l.row_of(0, &[2, 1]), 5);
        assert_eq!(l.row_of(1, &[0, 0]), 9);
        assert_eq!(l.row_of(1, &[3, 1]), 16);
        assert_eq!(l.cell_column(&[1, 2]), 9);
        assert_eq!(l.force_column(0, 1), 13);
        assert_eq!(l.force_column(1, 0), 14);
        for row in 0..17 {
            let (c, idx) = l.face_of(row);
            assert_eq!(l.row_of(c, &idx), row);
        }
    }

    #[test]
    fn test_two_rank_numbering() {
        // rows: rank 0 -> 0..2, rank 1 -> 2..3
        let l0 = layout([4, 3], 2, 0, &[1, 2]);
        let l1 = layout([4, 3], 2, 1, &[1, 2]);
        // rank 0: u 3x2, v 4x2 ; rank 1: u 3x1, v none
        assert_eq!(l0.velocity.local_len(), 14);
        assert_eq!(l1.velocity.local_len(), 3);
        assert_eq!(l0.lambda.local_len(), 8 + 2);
        assert_eq!(l1.lambda.local_len(), 4 + 4);
        assert_eq!(l0.row_of(0, &[0, 2]), 14);
        assert_eq!(l1.row_of(1, &[2, 1]), 12);
        assert_eq!(l1.cell_column(&[0, 2]), 10);
        // point 2 is the second point of rank 1
        assert_eq!(l0.force_column(0, 2), 10 + 4 + 1);
        assert_eq!(l0.force_column(1, 2), 10 + 4 + 2 + 1);
        assert_eq!(l1.local_face(0), (0, [0, 2]));
        assert_eq!(l1.local_cell(3), [3, 2]);
        let q: Vec<f64> = (0..17).map(|x| x as f64).collect();
        let u = l0.natural_component(0, &q);
        assert_eq!(u[IxDyn(&[0, 2])], 14.);
    }
}
