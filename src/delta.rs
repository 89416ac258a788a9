//! # Discrete delta function
//! Regularized delta function of Roma, Peskin & Berger (1999) with a
//! support of three cells. Used to interpolate grid velocities onto
//! body points and to spread body forces back onto the grid.
//!
//! One-dimensional kernel, with $r = |x|/h$:
//! $$
//! \delta\_h(x) = \frac{1}{3h}\left(1 + \sqrt{1 - 3r^2}\right), \quad r \le 0.5
//! $$
//! $$
//! \delta\_h(x) = \frac{1}{6h}\left(5 - 3r - \sqrt{1 - 3(1-r)^2}\right), \quad 0.5 < r \le 1.5
//! $$
//! and zero beyond. The multidimensional kernel is the product over axes.
use crate::types::FloatNum;

/// Support radius in units of the grid spacing
pub const SUPPORT: f64 = 1.5;

/// One dimensional discrete delta function
///
/// # Example
///```
/// use rustibm::delta::dh_roma;
/// let h = 0.1_f64;
/// assert!((dh_roma(0.05, h) - dh_roma(-0.05, h)).abs() < 1e-14);
/// assert_eq!(dh_roma(0.16, h), 0.);
///```
pub fn dh_roma<A: FloatNum>(x: A, h: A) -> A {
    let one = A::one();
    let three = lit::<A>(3.);
    let r = x.abs() / h;
    if r > lit(SUPPORT) {
        A::zero()
    } else if r > lit(0.5) {
        let s = one - three * (one - r) * (one - r);
        (lit::<A>(5.) - three * r - s.max(A::zero()).sqrt()) / (lit::<A>(6.) * h)
    } else {
        let s = one - three * r * r;
        (one + s.max(A::zero()).sqrt()) / (three * h)
    }
}

/// Literal in the generic float type
fn lit<A: FloatNum>(x: f64) -> A {
    A::from_f64(x).unwrap_or_else(A::nan)
}

/// Multidimensional delta function, product of [`dh_roma`] along each axis
///
/// # Example
///```
/// use rustibm::delta::{delta, dh_roma};
/// let h = 0.02_f64;
/// let d = delta(&[0., 0.], h);
/// assert!((d - dh_roma(0., h).powi(2)).abs() < 1e-10);
///```
pub fn delta<A: FloatNum, const N: usize>(dist: &[A; N], h: A) -> A {
    dist.iter().fold(A::one(), |acc, &d| acc * dh_roma(d, h))
}

/// True if the point lies strictly inside the kernel support along every axis
///
/// Any pair failing this test has a kernel value of exactly zero.
pub fn in_support<const N: usize>(dist: &[f64; N], h: f64) -> bool {
    dist.iter().all(|d| d.abs() / h < SUPPORT)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx_eq(result: f64, expected: f64, tol: f64) {
        if (result - expected).abs() > tol {
            panic!("Large difference of values, got {} expected {}.", result, expected)
        }
    }

    #[test]
    fn test_dh_roma_symmetry() {
        let h = 0.02;
        for i in 0..200 {
            let x = -0.04 + 0.0004 * i as f64;
            approx_eq(dh_roma(x, h), dh_roma(-x, h), 1e-12);
        }
    }

    #[test]
    fn test_dh_roma_compact_support() {
        for h in [0.01, 0.5, 2.0] {
            assert_eq!(dh_roma(1.5 * h * (1. + 1e-9), h), 0.);
            assert_eq!(dh_roma(-1.6 * h, h), 0.);
            assert_eq!(dh_roma(100. * h, h), 0.);
            assert!(dh_roma(1.49 * h, h) > 0.);
        }
    }

    #[test]
    fn test_dh_roma_continuity() {
        let h = 0.3;
        let eps = 1e-9 * h;
        for r in [0.5, 1.5] {
            approx_eq(dh_roma(r * h - eps, h), dh_roma(r * h + eps, h), 1e-6);
        }
        // first derivative
        let d = |x: f64| (dh_roma(x + 1e-7, h) - dh_roma(x - 1e-7, h)) / 2e-7;
        for r in [0.5, 1.5] {
            let step = 1e-4 * h;
            approx_eq(d(r * h - step), d(r * h + step), 1e-2 / h);
        }
    }

    #[test]
    fn test_dh_roma_center_value() {
        let h = 0.02;
        approx_eq(dh_roma(0., h), 2. / (3. * h), 1e-10);
        approx_eq(dh_roma(h, h), 1. / (6. * h), 1e-10);
    }

    #[test]
    fn test_dh_roma_partition_of_unity() {
        let h = 0.05;
        for s in [0., 0.1, 0.25, 0.5, 0.77, 0.99] {
            let sum: f64 = (-3..=3).map(|k| h * dh_roma((k as f64 + s) * h, h)).sum();
            approx_eq(sum, 1., 1e-12);
        }
    }

    #[test]
    fn test_delta_product() {
        let h = 0.1;
        let d = delta(&[0.03, -0.12, 0.07], h);
        approx_eq(
            d,
            dh_roma(0.03, h) * dh_roma(-0.12, h) * dh_roma(0.07, h),
            1e-12,
        );
        assert!(!in_support(&[0.03, 0.15], h));
        assert!(in_support(&[0.03, -0.149], h));
    }

    #[test]
    fn test_support_agrees_with_kernel() {
        // distances around 1.5h, where rounding decides the side
        for h in [0.1, 0.02, 0.3, 1. / 3., 0.07] {
            for k in -20..=20 {
                let d = 1.5 * h + k as f64 * 1e-17;
                for x in [d, -d, 0.15] {
                    if !in_support(&[0., x], h) {
                        assert_eq!(dh_roma(x, h), 0.);
                    }
                }
            }
        }
    }

    #[test]
    fn test_dh_roma_f32() {
        let h = 0.1_f32;
        assert!((dh_roma(0.0_f32, h) - 2. / (3. * h)).abs() < 1e-4);
    }
}
