//! # Immersed boundary coupling operator
//!
//! Builds `Q = [G, E^T]`, the operator linking the velocity fluxes to the
//! combined pressure / body force unknowns.
//!
//! - `G`: gradient, every face row holds `-1` at the lower and `+1` at the
//!   upper adjacent cell
//! - `E^T`: regularization, face `f` of component `c` couples to force
//!   component `c` of point `l` with `h delta(x_f - X_l)` whenever
//!   `|x_f - X_l| < 1.5 h` along every axis
//!
//! The matrix is built in two passes over the same enumeration of row
//! entries. The first pass only counts nonzeros (split into columns owned
//! locally and remotely), the second inserts into exactly preallocated
//! storage. After assembly, `Q^T` is formed from the unscaled `Q` and the
//! rows of `Q` are scaled by `BN`.
use crate::body::BodyPoints;
use crate::delta::{delta, in_support};
use crate::error::Result;
use crate::mesh::{Mesh, StaggeredLayout};
use crate::mpi::Communicator;
use crate::sparse::{assemble_two_pass, DistMatrix, DistVector, Preallocation};
use tracing::debug;

/// Coupling matrices used by the projection step
#[derive(Debug, Clone)]
pub struct CouplingOperator {
    /// `BN Q`: rows velocity, columns lambda
    pub bnq: DistMatrix,
    /// `Q^T` of the unscaled operator: rows lambda, columns velocity
    pub qt: DistMatrix,
}

/// Enumerate the nonzeros of local velocity row `i`
fn row_entries<const N: usize>(
    mesh: &Mesh<N>,
    layout: &StaggeredLayout<N>,
    bodies: &BodyPoints<N>,
    h: f64,
    i: usize,
    emit: &mut dyn FnMut(usize, f64),
) {
    let (c, idx) = layout.local_face(i);
    // gradient
    let mut upper = idx;
    upper[c] += 1;
    emit(layout.cell_column(&idx), -1.);
    emit(layout.cell_column(&upper), 1.);
    // regularization, points of all ranks
    let x = mesh.face_coord(c, &idx);
    for (l, xl) in bodies.coords.iter().enumerate() {
        let dist: [f64; N] = std::array::from_fn(|a| x[a] - xl[a]);
        if in_support(&dist, h) {
            emit(layout.force_column(c, l), h * delta(&dist, h));
        }
    }
}

/// Nonzeros of each local row of `Q`, split into local / remote columns
pub fn predict_structure<const N: usize>(
    mesh: &Mesh<N>,
    layout: &StaggeredLayout<N>,
    bodies: &BodyPoints<N>,
    h: f64,
) -> Preallocation {
    let n = layout.velocity.local_len();
    let mut prealloc = Preallocation::new(n);
    for i in 0..n {
        row_entries(mesh, layout, bodies, h, i, &mut |col, _| {
            prealloc.count(i, col, &layout.lambda);
        });
    }
    prealloc
}

/// Unscaled `Q` (collective)
///
/// # Errors
/// Insertion beyond the predicted structure, or a row not filled exactly
pub fn assemble_q<const N: usize>(
    comm: &dyn Communicator,
    mesh: &Mesh<N>,
    layout: &StaggeredLayout<N>,
    bodies: &BodyPoints<N>,
    h: f64,
) -> Result<DistMatrix> {
    assemble_two_pass(comm, &layout.velocity, &layout.lambda, |i, emit| {
        row_entries(mesh, layout, bodies, h, i, emit);
    })
}

/// Diagonal of `BN = dt diag(A_f / dn_f)` on the local faces
pub fn bn_diagonal<const N: usize>(mesh: &Mesh<N>, layout: &StaggeredLayout<N>, dt: f64) -> DistVector {
    let mut bn = DistVector::zeros(&layout.velocity);
    for i in 0..layout.velocity.local_len() {
        let (c, idx) = layout.local_face(i);
        bn.v[i] = dt * mesh.face_area(c, &idx) / mesh.face_dn(c, &idx);
    }
    bn
}

impl CouplingOperator {
    /// Assemble `Q`, transpose it and scale by `bn` (collective)
    ///
    /// `h` is the kernel width, `bn` the diagonal of `BN` on the velocity
    /// layout. No partial operator is returned on failure.
    ///
    /// # Errors
    /// Structure mismatch or inconsistent sizes
    pub fn build<const N: usize>(
        comm: &dyn Communicator,
        mesh: &Mesh<N>,
        layout: &StaggeredLayout<N>,
        bodies: &BodyPoints<N>,
        h: f64,
        bn: &DistVector,
    ) -> Result<Self> {
        let mut bnq = assemble_q(comm, mesh, layout, bodies, h)?;
        let qt = bnq.transpose(comm);
        bnq.diagonal_scale(comm, Some(bn), None)?;
        debug!(
            "coupling operator: {} x {}, {} local nonzeros",
            layout.velocity.global_len(),
            layout.lambda.global_len(),
            bnq.local_nnz()
        );
        Ok(Self { bnq, qt })
    }

    /// `Q^T BN Q` (collective)
    ///
    /// # Errors
    /// Inconsistent sizes
    pub fn poisson_matrix(&self, comm: &dyn Communicator) -> Result<DistMatrix> {
        self.qt.mat_mat(comm, &self.bnq)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::delta::dh_roma;
    use crate::mpi::{Serial, ThreadComm};

    fn approx_eq(result: f64, expected: f64) {
        let dif = 1e-10;
        if (result - expected).abs() > dif {
            panic!("Large difference of values, got {} expected {}.", result, expected)
        }
    }

    fn setup2d(comm: &dyn Communicator, points: &[[f64; 2]]) -> (Mesh<2>, StaggeredLayout<2>, BodyPoints<2>) {
        let mesh = Mesh::<2>::uniform(comm, [10, 10], [0., 0.], [1., 1.]).unwrap();
        let bodies = BodyPoints::partition(&mesh, points);
        let layout = StaggeredLayout::new(&mesh, bodies.counts()).unwrap();
        (mesh, layout, bodies)
    }

    #[test]
    fn test_point_on_face() {
        let h = 0.1;
        let mesh = Mesh::<2>::uniform(&Serial, [10, 10], [0., 0.], [1., 1.]).unwrap();
        let xp = mesh.face_coord(0, &[4, 4]);
        let (mesh, layout, bodies) = setup2d(&Serial, &[xp]);
        let q = assemble_q(&Serial, &mesh, &layout, &bodies, h).unwrap();
        let col = layout.force_column(0, 0);
        let row = layout.row_of(0, &[4, 4]);
        approx_eq(q.get(row, col).unwrap(), h * dh_roma(0., h).powi(2));
        // every other entry of the column is the kernel weight of its face
        let mut count = 0;
        for (r, c, v) in q.triplets() {
            if c == col {
                let (comp, idx) = layout.face_of(r);
                assert_eq!(comp, 0);
                let x = mesh.face_coord(0, &idx);
                approx_eq(v, h * delta(&[x[0] - xp[0], x[1] - xp[1]], h));
                count += 1;
            }
        }
        // 3 x 3 faces strictly inside the support
        assert_eq!(count, 9);
    }

    #[test]
    fn test_structure_prediction_and_gradient() {
        let h = 0.1;
        let points = crate::body::circle([0.5, 0.5], 0.2, 40);
        let (mesh, layout, bodies) = setup2d(&Serial, &points);
        let predicted = predict_structure(&mesh, &layout, &bodies, h);
        let q = assemble_q(&Serial, &mesh, &layout, &bodies, h).unwrap();
        assert_eq!(q.preallocation(), &predicted);
        for i in 0..layout.velocity.local_len() {
            let (cols, vals) = q.row(i);
            let grad: Vec<f64> = cols
                .iter()
                .zip(vals)
                .filter(|&(&c, _)| layout.is_cell_column(c))
                .map(|(_, &v)| v)
                .collect();
            assert_eq!(grad.len(), 2);
            assert!(grad.contains(&-1.) && grad.contains(&1.));
        }
        let qtt = q.transpose(&Serial).transpose(&Serial);
        assert_eq!(qtt.triplets(), q.triplets());
    }

    #[test]
    fn test_points_outside_domain() {
        let h = 0.1;
        let (mesh, layout, bodies) = setup2d(&Serial, &[[5., 5.], [-3., 0.5]]);
        let q = assemble_q(&Serial, &mesh, &layout, &bodies, h).unwrap();
        for (_, c, _) in q.triplets() {
            assert!(layout.is_cell_column(c));
        }
        assert_eq!(q.local_nnz(), 2 * layout.velocity.global_len());
    }

    #[test]
    fn test_bn_scaling() {
        let h = 0.1;
        let dt = 0.01;
        let (mesh, layout, bodies) = setup2d(&Serial, &[[0.5, 0.5]]);
        let bn = bn_diagonal(&mesh, &layout, dt);
        approx_eq(bn.v[0], dt);
        let op = CouplingOperator::build(&Serial, &mesh, &layout, &bodies, h, &bn).unwrap();
        let row = layout.row_of(1, &[3, 2]);
        let col = layout.cell_column(&[3, 3]);
        approx_eq(op.bnq.get(row, col).unwrap(), dt);
        approx_eq(op.qt.get(col, row).unwrap(), 1.);
        let p = op.poisson_matrix(&Serial).unwrap();
        // interior cell: 4 neighbours, dt each
        let cell = layout.cell_column(&[2, 7]);
        approx_eq(p.get(cell, cell).unwrap(), 4. * dt);
    }

    #[test]
    fn test_two_ranks() {
        let h = 0.1;
        let points = crate::body::circle([0.5, 0.5], 0.25, 30);
        let (mesh, layout, bodies) = setup2d(&Serial, &points);
        let serial_nnz = assemble_q(&Serial, &mesh, &layout, &bodies, h).unwrap().local_nnz();

        let comms = ThreadComm::group(2);
        let results: Vec<(usize, usize, usize, usize)> = std::thread::scope(|s| {
            let handles: Vec<_> = comms
                .iter()
                .map(|c| {
                    let points = &points;
                    s.spawn(move || {
                        let (mesh, layout, bodies) = setup2d(c, points);
                        let q = assemble_q(c, &mesh, &layout, &bodies, h).unwrap();
                        let qt = q.transpose(c);
                        let off: usize = q.preallocation().o_nnz.iter().sum();
                        let qtt = qt.transpose(c);
                        assert_eq!(qtt.triplets(), q.triplets());
                        (q.local_nnz(), off, qt.rows().local_len(), layout.lambda.local_len())
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });
        assert_eq!(results[0].0 + results[1].0, serial_nnz);
        // v faces on the slab boundary reach the upper cell on the next rank
        assert!(results[0].1 > 0);
        for r in &results {
            assert_eq!(r.2, r.3);
        }
    }

    #[test]
    fn test_coupling_3d() {
        let h = 0.25;
        let mesh = Mesh::<3>::uniform(&Serial, [4, 4, 4], [0.; 3], [1.; 3]).unwrap();
        let xp = mesh.face_coord(2, &[1, 2, 1]);
        let bodies = BodyPoints::partition(&mesh, &[xp]);
        let layout = StaggeredLayout::new(&mesh, bodies.counts()).unwrap();
        let q = assemble_q(&Serial, &mesh, &layout, &bodies, h).unwrap();
        let row = layout.row_of(2, &[1, 2, 1]);
        approx_eq(q.get(row, layout.force_column(2, 0)).unwrap(), h * dh_roma(0., h).powi(3));
        let lower = layout.cell_column(&[1, 2, 1]);
        let upper = layout.cell_column(&[1, 2, 2]);
        assert_eq!(q.get(row, lower), Some(-1.));
        assert_eq!(q.get(row, upper), Some(1.));
        // u and v faces never couple to the z force
        for (r, c, _) in q.triplets() {
            if c == layout.force_column(2, 0) {
                assert_eq!(layout.face_of(r).0, 2);
            }
        }
    }
}
