//! Projected Gauss-Seidel solver for bounded constraint rows.
//!
//! Solves the mixed linear complementarity problem
//!
//! ```text
//! A λ = b,   lo ≤ λ ≤ hi
//! ```
//!
//! where `A = J·M⁻¹·Jᵀ + diag(cfm)/h` is the regularized Delassus matrix
//! assembled by the stepper. Each sweep updates one multiplier at a time
//! from the current residual and projects it onto its bounds.

use nalgebra::{DMatrix, DVector};
use sim_types::SolverConfig;
use tracing::trace;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Rows whose diagonal falls below this carry no effective mass and are
/// left at zero.
const MIN_DIAGONAL: f64 = 1e-15;

/// Outcome of one solve.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PgsReport {
    /// Sweeps performed.
    pub iterations: usize,
    /// Largest multiplier change in the final sweep.
    pub max_delta: f64,
    /// Whether `max_delta` dropped below the tolerance.
    pub converged: bool,
}

/// Projected Gauss-Seidel with optional over-relaxation.
#[derive(Debug, Clone, PartialEq)]
pub struct PgsSolver {
    /// Sweep limit.
    pub max_iterations: usize,
    /// Convergence threshold on the largest multiplier change.
    pub tolerance: f64,
    /// Over-relaxation factor (1.0 = plain Gauss-Seidel).
    pub sor_factor: f64,
}

impl Default for PgsSolver {
    fn default() -> Self {
        Self::new(&SolverConfig::default())
    }
}

impl PgsSolver {
    /// Solver configured from the world's solver settings.
    #[must_use]
    pub fn new(config: &SolverConfig) -> Self {
        Self {
            max_iterations: config.max_iterations,
            tolerance: config.tolerance,
            sor_factor: config.sor_factor,
        }
    }

    /// Solve `a λ = b` subject to `lo ≤ λ ≤ hi`, starting from zero.
    ///
    /// `lo` and `hi` must have one entry per row; unbounded rows use
    /// infinities.
    #[must_use]
    pub fn solve(
        &self,
        a: &DMatrix<f64>,
        b: &DVector<f64>,
        lo: &[f64],
        hi: &[f64],
    ) -> (DVector<f64>, PgsReport) {
        let n = b.len();
        let mut lambda = DVector::zeros(n);
        if n == 0 {
            return (
                lambda,
                PgsReport {
                    converged: true,
                    ..PgsReport::default()
                },
            );
        }

        let mut report = PgsReport::default();
        for iteration in 0..self.max_iterations {
            let mut max_delta: f64 = 0.0;

            for i in 0..n {
                let diagonal = a[(i, i)];
                if diagonal < MIN_DIAGONAL {
                    continue;
                }

                // residual = b[i] - Σ A[i, j] λ[j]
                let residual = b[i] - a.row(i).dot(&lambda.transpose());
                let old = lambda[i];
                let new = (old + self.sor_factor * residual / diagonal).clamp(lo[i], hi[i]);
                lambda[i] = new;
                max_delta = max_delta.max((new - old).abs());
            }

            report.iterations = iteration + 1;
            report.max_delta = max_delta;
            if max_delta <= self.tolerance {
                report.converged = true;
                break;
            }
        }

        trace!(
            rows = n,
            iterations = report.iterations,
            max_delta = report.max_delta,
            converged = report.converged,
            "pgs solve"
        );
        (lambda, report)
    }
}
