//! Some useful initial conditions and post-processing functions
use super::TairaColonius;
use ndarray::Array1;
use ndarray_rand::rand_distr::Uniform;
use ndarray_rand::RandomExt;

impl<const N: usize> TairaColonius<'_, N> {
    /// Add a random velocity disturbance in `[-amp, amp]` to every face
    ///
    /// The disturbed field is not divergence free, the first projection
    /// removes the divergent part.
    pub fn random_perturbation(&mut self, amp: f64) {
        if amp <= 0. {
            return;
        }
        let n = self.layout.velocity.local_len();
        let rand: Array1<f64> = Array1::random(n, Uniform::new(-amp, amp));
        for (i, r) in rand.iter().enumerate() {
            let (c, idx) = self.layout.local_face(i);
            self.q.v[i] += r * self.mesh.face_area(c, &idx);
        }
    }

    /// Kinetic energy `0.5 sum u^2 dV` of the interior faces (collective)
    pub fn kinetic_energy(&self) -> f64 {
        let local: f64 = (0..self.layout.velocity.local_len())
            .map(|i| {
                let (c, idx) = self.layout.local_face(i);
                let area = self.mesh.face_area(c, &idx);
                let u = self.q.v[i] / area;
                0.5 * u * u * area * self.mesh.face_dn(c, &idx)
            })
            .sum();
        self.comm.all_reduce_sum(local)
    }
}

/// Force coefficients `2 F / (u_ref^2 d)` from summed body forces
pub fn force_coefficients<const N: usize>(forces: &[f64; N], u_ref: f64, d: f64) -> [f64; N] {
    let scale = 2. / (u_ref * u_ref * d);
    std::array::from_fn(|a| forces[a] * scale)
}
