//! The geometric post-optimizer: snaps the CPD output onto the
//! nearest configuration obeying original edge lengths (as upper bounds,
//! scaled by a slack factor) and fixed-point equalities.
//!
//! The actual QP/SOCP solver is treated as an external collaborator
//! named only by the problem it solves. [`PostOptimizer`] keeps that
//! swappable; [`ProjectedGaussSeidelOptimizer`] is the default solver this
//! crate ships so the tracker is runnable without pulling in an external
//! convex-optimization dependency. It is grounded in the same family of
//! technique as position-based-dynamics constraint projection used by
//! deformable-body simulators: iteratively relax each violated constraint
//! until the whole system is feasible or a sweep budget is exhausted.

use glam::DVec3;

use crate::error::TrackerError;
use crate::types::FixedPoint;

/// Solves: find `Y*` minimizing `sum_i ||Y*_i - y_prime_i||^2` subject to
/// edge-length caps and fixed-point equalities.
pub trait PostOptimizer {
    fn optimize(
        &self,
        y_prime: &[DVec3],
        edges: &[(usize, usize)],
        rest_lengths: &[f64],
        slack: f64,
        fixed: &[FixedPoint],
    ) -> Result<Vec<DVec3>, TrackerError>;
}

/// Default [`PostOptimizer`]: alternating projection of fixed-point
/// equalities and edge-length inequality constraints (Gauss-Seidel style),
/// a standard technique from deformable-body / cloth / rope simulation.
pub struct ProjectedGaussSeidelOptimizer {
    pub max_sweeps: usize,
    pub tolerance: f64,
}

impl Default for ProjectedGaussSeidelOptimizer {
    fn default() -> Self {
        Self {
            max_sweeps: 200,
            tolerance: 1e-6,
        }
    }
}

impl PostOptimizer for ProjectedGaussSeidelOptimizer {
    fn optimize(
        &self,
        y_prime: &[DVec3],
        edges: &[(usize, usize)],
        rest_lengths: &[f64],
        slack: f64,
        fixed: &[FixedPoint],
    ) -> Result<Vec<DVec3>, TrackerError> {
        assert_eq!(edges.len(), rest_lengths.len());

        // Detect an irreconcilable conflict up front: two fixed points whose
        // required separation already exceeds the capped edge length they
        // share, beyond tolerance. No amount of relaxation can satisfy both.
        for (&(i, j), &l) in edges.iter().zip(rest_lengths.iter()) {
            let fi = fixed.iter().find(|f| f.index == i);
            let fj = fixed.iter().find(|f| f.index == j);
            if let (Some(fi), Some(fj)) = (fi, fj) {
                let required = (fi.position - fj.position).length();
                let cap = l * (1.0 + slack);
                if required > cap + self.tolerance {
                    return Err(TrackerError::PostOptimizerInfeasible(format!(
                        "fixed points {} and {} require separation {:.4} but edge cap is {:.4}",
                        i, j, required, cap
                    )));
                }
            }
        }

        let mut y = y_prime.to_vec();
        for f in fixed {
            y[f.index] = f.position;
        }

        let fixed_mask: Vec<bool> = {
            let mut mask = vec![false; y.len()];
            for f in fixed {
                mask[f.index] = true;
            }
            mask
        };

        for _ in 0..self.max_sweeps {
            let mut max_violation = 0.0_f64;

            for (&(i, j), &l) in edges.iter().zip(rest_lengths.iter()) {
                let cap = l * (1.0 + slack);
                let delta = y[j] - y[i];
                let dist = delta.length();
                if dist <= cap || dist < 1e-12 {
                    continue;
                }

                let violation = dist - cap;
                max_violation = max_violation.max(violation);
                let dir = delta / dist;
                let correction = dir * violation;

                match (fixed_mask[i], fixed_mask[j]) {
                    (true, true) => {} // both pinned; already checked feasible above.
                    (true, false) => y[j] -= correction,
                    (false, true) => y[i] += correction,
                    (false, false) => {
                        y[i] += correction * 0.5;
                        y[j] -= correction * 0.5;
                    }
                }
            }

            for f in fixed {
                y[f.index] = f.position;
            }

            if max_violation < self.tolerance {
                break;
            }
        }

        Ok(y)
    }
}
