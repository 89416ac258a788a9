//! Explicit convective term in divergence form
//!
//! For component `c` at face `f`:
//! ```text
//! N_c = sum_a d(u_a u_c)/dx_a
//! ```
//! - `a == c`: products at the two adjacent cell centres, velocities
//!   averaged from the neighbouring faces
//! - `a != c`: products at the two cell edges bounding the face along
//!   `a`, wall values on the boundary
//!
//! Evaluated matrix free on the replicated flux vector, the result is
//! returned in flux units (`N_c A_f`).
use super::{BoundaryConditions, Side};
use crate::mesh::{Mesh, StaggeredLayout};
use crate::mpi::Communicator;
use crate::sparse::DistVector;

struct Velocity<'a, const N: usize> {
    mesh: &'a Mesh<N>,
    layout: &'a StaggeredLayout<N>,
    bc: &'a BoundaryConditions<N>,
    q: Vec<f64>,
}

impl<const N: usize> Velocity<'_, N> {
    /// Velocity of interior face `idx` of component `c`
    fn face(&self, c: usize, idx: &[usize; N]) -> f64 {
        self.q[self.layout.row_of(c, idx)] / self.mesh.face_area(c, idx)
    }

    /// Component `c` at the centre of cell `idx`
    fn cell(&self, c: usize, idx: &[usize; N]) -> f64 {
        let mut face = *idx;
        let lower = if idx[c] >= 1 {
            face[c] = idx[c] - 1;
            self.face(c, &face)
        } else {
            self.bc.get(c, Side::Lower, c)
        };
        let upper = if idx[c] + 1 < self.mesh.n[c] {
            face[c] = idx[c];
            self.face(c, &face)
        } else {
            self.bc.get(c, Side::Upper, c)
        };
        0.5 * (lower + upper)
    }

    /// Flux `u_a u_c` on the edge of face `idx` (component `c`) along axis `a`
    fn edge(&self, c: usize, idx: &[usize; N], a: usize, side: Side) -> f64 {
        let i = idx[a];
        // edge node index along a
        let node = match side {
            Side::Lower => i,
            Side::Upper => i + 1,
        };
        if node == 0 || node == self.mesh.n[a] {
            return self.bc.get(a, side, a) * self.bc.get(a, side, c);
        }
        let mut other = *idx;
        other[a] = match side {
            Side::Lower => i - 1,
            Side::Upper => i + 1,
        };
        let uc = 0.5 * (self.face(c, idx) + self.face(c, &other));
        // normal velocity: a-faces at this node on both sides of the c-face
        let mut lo = *idx;
        lo[a] = node - 1;
        let mut hi = lo;
        hi[c] += 1;
        let ua = 0.5 * (self.face(a, &lo) + self.face(a, &hi));
        ua * uc
    }
}

/// Convective term `N(q)` on the local faces, flux units (collective)
pub fn convection<const N: usize>(
    comm: &dyn Communicator,
    mesh: &Mesh<N>,
    layout: &StaggeredLayout<N>,
    bc: &BoundaryConditions<N>,
    q: &DistVector,
) -> DistVector {
    let vel = Velocity {
        mesh,
        layout,
        bc,
        q: q.gather_all(comm),
    };
    let mut out = DistVector::zeros(&layout.velocity);
    for i in 0..layout.velocity.local_len() {
        let (c, idx) = layout.local_face(i);
        let mut n = 0.;
        for a in 0..N {
            if a == c {
                let mut upper = idx;
                upper[c] += 1;
                let (ul, uu) = (vel.cell(c, &idx), vel.cell(c, &upper));
                n += (uu * uu - ul * ul) / mesh.face_dn(c, &idx);
            } else {
                let fu = vel.edge(c, &idx, a, Side::Upper);
                let fl = vel.edge(c, &idx, a, Side::Lower);
                n += (fu - fl) / mesh.width(a, idx[a]);
            }
        }
        out.v[i] = n * mesh.face_area(c, &idx);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mpi::Serial;

    #[test]
    fn test_convection_uniform_flow() {
        // uniform stream through the box, walls carry the same velocity
        let mesh = Mesh::<2>::uniform(&Serial, [5, 4], [0., 0.], [1., 2.]).unwrap();
        let layout = StaggeredLayout::new(&mesh, &[0]).unwrap();
        let mut bc = BoundaryConditions::<2>::no_slip();
        for a in 0..2 {
            for side in [Side::Lower, Side::Upper] {
                bc.set(a, side, 0, 1.5);
                bc.set(a, side, 1, -0.5);
            }
        }
        let mut q = DistVector::zeros(&layout.velocity);
        for i in 0..layout.velocity.local_len() {
            let (c, idx) = layout.local_face(i);
            q.v[i] = [1.5, -0.5][c] * mesh.face_area(c, &idx);
        }
        let n = convection(&Serial, &mesh, &layout, &bc, &q);
        assert!(n.norm_max(&Serial) < 1e-12);
    }

    #[test]
    fn test_convection_shear() {
        // u = y, v = 0: d(uu)/dx = 0, d(uv)/dy = 0
        let mesh = Mesh::<2>::uniform(&Serial, [4, 4], [0., 0.], [1., 1.]).unwrap();
        let layout = StaggeredLayout::new(&mesh, &[0]).unwrap();
        let mut bc = BoundaryConditions::<2>::no_slip();
        bc.set(1, Side::Upper, 0, 1.);
        let mut q = DistVector::zeros(&layout.velocity);
        for i in 0..layout.velocity.local_len() {
            let (c, idx) = layout.local_face(i);
            if c == 0 {
                q.v[i] = mesh.face_coord(0, &idx)[1] * mesh.face_area(0, &idx);
            }
        }
        let n = convection(&Serial, &mesh, &layout, &bc, &q);
        // interior u faces away from the x walls
        for i in 0..layout.velocity.local_len() {
            let (c, idx) = layout.local_face(i);
            if c == 0 && idx[0] == 1 {
                assert!(n.v[i].abs() < 1e-12);
            }
        }
    }
}
