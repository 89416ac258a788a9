//! Staggered Laplacian in flux form
//!
//! Second order three point stencil along each axis on non-uniform
//! spacing:
//! ```text
//! L u = 2/(dm (dm+dp)) (u_m - u) + 2/(dp (dm+dp)) (u_p - u)
//! ```
//! Neighbours beyond the last interior face are wall values located on
//! the wall. In flux form the operator is `diag(A) L diag(1/A)`; wall
//! contributions are collected in the correction vector `bc_L`.
use super::{BoundaryConditions, Side};
use crate::error::Result;
use crate::mesh::{Mesh, StaggeredLayout};
use crate::mpi::Communicator;
use crate::sparse::{assemble_two_pass, DistMatrix, DistVector};

/// Entry of a Laplacian row
enum Stencil {
    /// Diagonal
    Centre,
    /// Interior face (global row)
    Face(usize),
    /// Wall normal to axis, component of the row
    Wall(usize, Side),
}

/// Coordinate of the neighbour of face `idx` of component `c` along axis
/// `a`, and its face index if it is an interior face
fn neighbour<const N: usize>(
    mesh: &Mesh<N>,
    c: usize,
    idx: &[usize; N],
    a: usize,
    side: Side,
) -> (f64, Option<[usize; N]>) {
    let mut other = *idx;
    let i = idx[a];
    match (side, a == c) {
        (Side::Lower, true) => {
            if i >= 1 {
                other[a] = i - 1;
                (mesh.nodes[a][i], Some(other))
            } else {
                (mesh.nodes[a][i], None)
            }
        }
        (Side::Upper, true) => {
            other[a] = i + 1;
            (mesh.nodes[a][i + 2], (i + 1 < mesh.n[a] - 1).then_some(other))
        }
        (Side::Lower, false) => {
            if i >= 1 {
                other[a] = i - 1;
                (mesh.centres[a][i - 1], Some(other))
            } else {
                (mesh.nodes[a][0], None)
            }
        }
        (Side::Upper, false) => {
            if i + 1 < mesh.n[a] {
                other[a] = i + 1;
                (mesh.centres[a][i + 1], Some(other))
            } else {
                (mesh.nodes[a][mesh.n[a]], None)
            }
        }
    }
}

/// Visit the entries of local row `i`, coefficients in flux form
fn visit_row<const N: usize>(
    mesh: &Mesh<N>,
    layout: &StaggeredLayout<N>,
    i: usize,
    f: &mut dyn FnMut(Stencil, f64),
) {
    let (c, idx) = layout.local_face(i);
    let x = mesh.face_coord(c, &idx);
    let area = mesh.face_area(c, &idx);
    let mut diag = 0.;
    for a in 0..N {
        let (xm, m) = neighbour(mesh, c, &idx, a, Side::Lower);
        let (xp, p) = neighbour(mesh, c, &idx, a, Side::Upper);
        let (dm, dp) = (x[a] - xm, xp - x[a]);
        let cm = 2. / (dm * (dm + dp));
        let cp = 2. / (dp * (dm + dp));
        diag -= cm + cp;
        for (coef, side, nb) in [(cm, Side::Lower, m), (cp, Side::Upper, p)] {
            match nb {
                Some(jdx) => f(
                    Stencil::Face(layout.row_of(c, &jdx)),
                    area * coef / mesh.face_area(c, &jdx),
                ),
                None => f(Stencil::Wall(a, side), area * coef),
            }
        }
    }
    f(Stencil::Centre, diag);
}

/// Laplacian matrix and its wall correction `bc_L` (collective)
///
/// `L q + bc_L` is the Laplacian of the velocity field including the
/// prescribed wall values, in flux units.
///
/// # Errors
/// Assembly failed
pub fn laplacian<const N: usize>(
    comm: &dyn Communicator,
    mesh: &Mesh<N>,
    layout: &StaggeredLayout<N>,
    bc: &BoundaryConditions<N>,
) -> Result<(DistMatrix, DistVector)> {
    let start = layout.velocity.start();
    let mat = assemble_two_pass(comm, &layout.velocity, &layout.velocity, |i, emit| {
        visit_row(mesh, layout, i, &mut |entry, value| match entry {
            Stencil::Centre => emit(i + start, value),
            Stencil::Face(col) => emit(col, value),
            Stencil::Wall(..) => (),
        });
    })?;
    let mut bc_l = DistVector::zeros(&layout.velocity);
    for i in 0..layout.velocity.local_len() {
        let (c, _) = layout.local_face(i);
        let mut sum = 0.;
        visit_row(mesh, layout, i, &mut |entry, value| {
            if let Stencil::Wall(a, side) = entry {
                sum += value * bc.get(a, side, c);
            }
        });
        bc_l.v[i] = sum;
    }
    Ok((mat, bc_l))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mpi::Serial;

    #[test]
    fn test_laplacian_quadratic_profile() {
        // u = y (1 - y) across a channel, d2u/dy2 = -2
        let nodes = [
            vec![0., 0.3, 0.5, 0.8, 1.0],
            vec![0., 0.1, 0.25, 0.45, 0.7, 1.0],
        ];
        let mesh = Mesh::<2>::new(&Serial, nodes).unwrap();
        let layout = StaggeredLayout::new(&mesh, &[0]).unwrap();
        let bc = BoundaryConditions::no_slip();
        let (l, bc_l) = laplacian(&Serial, &mesh, &layout, &bc).unwrap();
        let mut q = DistVector::zeros(&layout.velocity);
        for i in 0..layout.velocity.local_len() {
            let (c, idx) = layout.local_face(i);
            if c == 0 {
                let y = mesh.face_coord(0, &idx)[1];
                q.v[i] = y * (1. - y) * mesh.face_area(0, &idx);
            }
        }
        let mut lq = l.mat_vec(&Serial, &q).unwrap();
        lq.axpy(1., &bc_l);
        for i in 0..layout.velocity.local_len() {
            let (c, idx) = layout.local_face(i);
            let expected = if c == 0 { -2. * mesh.face_area(0, &idx) } else { 0. };
            // exact for parabolas, x walls hold u = 0
            if c == 0 && idx[0] == 1 {
                assert!((lq.v[i] - expected).abs() < 1e-10, "{} {}", lq.v[i], expected);
            }
        }
    }

    #[test]
    fn test_moving_lid_correction() {
        let mesh = Mesh::<2>::uniform(&Serial, [3, 3], [0., 0.], [1., 1.]).unwrap();
        let layout = StaggeredLayout::new(&mesh, &[0]).unwrap();
        let mut bc = BoundaryConditions::no_slip();
        bc.set(1, Side::Upper, 0, 1.);
        let (l, bc_l) = laplacian(&Serial, &mesh, &layout, &bc).unwrap();
        let h = 1. / 3.;
        // u face next to the lid: wall at half a cell
        let row = layout.row_of(0, &[0, 2]);
        let coef = 2. / (0.5 * h * (1.5 * h));
        assert!((bc_l.v[row] - h * coef).abs() < 1e-10);
        assert_eq!(bc_l.v[layout.row_of(0, &[0, 1])], 0.);
        // two x neighbours, one y neighbour, diagonal
        let row = layout.row_of(1, &[1, 0]);
        let (_, vals) = l.row(row);
        assert_eq!(vals.len(), 4);
    }
}
