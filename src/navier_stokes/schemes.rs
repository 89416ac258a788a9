//! Time integration schemes and history of explicit terms
use crate::error::{Error, Result};
use crate::sparse::DistVector;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Time integration scheme of a single term
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TimeScheme {
    /// Forward Euler
    #[serde(rename = "EULER_EXPLICIT")]
    EulerExplicit,
    /// Backward Euler
    #[serde(rename = "EULER_IMPLICIT")]
    EulerImplicit,
    /// Second order Adams-Bashforth
    #[serde(rename = "ADAMS_BASHFORTH_2")]
    AdamsBashforth2,
    /// Crank-Nicolson
    #[serde(rename = "CRANK_NICOLSON")]
    CrankNicolson,
}

/// Weights of a scheme: `implicit` for the new time level, `explicit[k]`
/// for the level `n - k`
#[derive(Debug, Clone, PartialEq)]
pub struct SchemeCoefficients {
    /// Weight of the unknown time level
    pub implicit: f64,
    /// Weights of the current and previous levels
    pub explicit: Vec<f64>,
}

impl TimeScheme {
    /// Weights when used for the diffusive term
    pub fn diffusion_coefficients(self) -> SchemeCoefficients {
        let (implicit, explicit) = match self {
            Self::EulerExplicit => (0., vec![1.]),
            Self::EulerImplicit => (1., vec![]),
            Self::AdamsBashforth2 => (0., vec![1.5, -0.5]),
            Self::CrankNicolson => (0.5, vec![0.5]),
        };
        SchemeCoefficients { implicit, explicit }
    }

    /// Weights when used for the convective term, which is always explicit
    ///
    /// # Errors
    /// Scheme has an implicit part
    pub fn convection_coefficients(self) -> Result<Vec<f64>> {
        match self {
            Self::EulerExplicit => Ok(vec![1.]),
            Self::AdamsBashforth2 => Ok(vec![1.5, -0.5]),
            _ => Err(Error::Config(format!(
                "convection must be treated explicitly, got {:?}",
                self
            ))),
        }
    }
}

/// Ring of past explicit contributions, newest first
#[derive(Debug, Clone)]
pub struct History {
    depth: usize,
    ring: VecDeque<DistVector>,
}

impl History {
    /// Ring holding `depth` levels
    pub fn new(depth: usize) -> Self {
        Self {
            depth,
            ring: VecDeque::with_capacity(depth),
        }
    }

    /// Number of levels kept
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Stored levels, newest first
    pub fn levels(&self) -> impl Iterator<Item = &DistVector> {
        self.ring.iter()
    }

    /// Insert the newest level; an empty ring is filled with it, so the
    /// first step of a multistep scheme reduces to a one step scheme
    pub fn push(&mut self, value: DistVector) {
        if self.depth == 0 {
            return;
        }
        if self.ring.is_empty() {
            for _ in 1..self.depth {
                self.ring.push_back(value.clone());
            }
        }
        self.ring.push_front(value);
        self.ring.truncate(self.depth);
    }

    /// Replace all levels (restart), newest first
    pub fn set_levels(&mut self, levels: Vec<DistVector>) {
        self.ring = levels.into_iter().take(self.depth).collect();
    }

    /// `out += scale * sum_k w[k] level[k]`
    pub fn accumulate(&self, weights: &[f64], scale: f64, out: &mut DistVector) {
        for (w, level) in weights.iter().zip(self.ring.iter()) {
            out.axpy(scale * w, level);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sparse::Layout;

    #[test]
    fn test_scheme_weights_sum_to_one() {
        for s in [
            TimeScheme::EulerExplicit,
            TimeScheme::EulerImplicit,
            TimeScheme::AdamsBashforth2,
            TimeScheme::CrankNicolson,
        ] {
            let c = s.diffusion_coefficients();
            let sum: f64 = c.implicit + c.explicit.iter().sum::<f64>();
            assert!((sum - 1.).abs() < 1e-14);
        }
        assert!(TimeScheme::CrankNicolson.convection_coefficients().is_err());
    }

    #[test]
    fn test_history_ring() {
        let layout = Layout::from_counts(&[2], 0);
        let mut h = History::new(2);
        h.push(DistVector::from_elem(&layout, 1.));
        assert_eq!(h.levels().count(), 2);
        h.push(DistVector::from_elem(&layout, 3.));
        let mut out = DistVector::zeros(&layout);
        h.accumulate(&[1.5, -0.5], 2., &mut out);
        // 2 * (1.5 * 3 - 0.5 * 1)
        assert_eq!(out.v.to_vec(), vec![8., 8.]);
        h.push(DistVector::from_elem(&layout, 5.));
        assert_eq!(h.levels().map(|x| x.v[0]).collect::<Vec<_>>(), vec![5., 3.]);
    }
}
