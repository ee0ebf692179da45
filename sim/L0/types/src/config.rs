//! Configuration types for simulation.
//!
//! [`SimulationConfig`] controls the step (timestep, gravity) and
//! [`SolverConfig`] the constraint solve (global ERP/CFM, PGS iteration
//! limits). Joints never read the live config: they receive a
//! [`ConstraintDefaults`] snapshot when they are constructed.

use nalgebra::Vector3;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Default error-reduction parameter.
pub const DEFAULT_ERP: f64 = 0.2;

/// Default constraint-force-mixing value.
pub const DEFAULT_CFM: f64 = 1e-10;

/// Main configuration for a simulation.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SimulationConfig {
    /// Fixed timestep for physics integration (seconds).
    pub timestep: f64,
    /// Gravity configuration.
    pub gravity: Gravity,
    /// Solver configuration.
    pub solver: SolverConfig,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            timestep: 1.0 / 240.0,
            gravity: Gravity::earth(),
            solver: SolverConfig::default(),
        }
    }
}

impl SimulationConfig {
    /// Default configuration stepping at `timestep` seconds.
    #[must_use]
    pub fn with_timestep(timestep: f64) -> Self {
        Self {
            timestep,
            ..Default::default()
        }
    }

    /// 60 Hz stepping.
    #[must_use]
    pub fn realtime() -> Self {
        Self {
            timestep: 1.0 / 60.0,
            ..Default::default()
        }
    }

    /// 1 kHz stepping with a tighter solve.
    #[must_use]
    pub fn high_fidelity() -> Self {
        Self {
            timestep: 1e-3,
            solver: SolverConfig::high_accuracy(),
            ..Default::default()
        }
    }

    /// Set the gravity.
    #[must_use]
    pub fn gravity(mut self, gravity: Gravity) -> Self {
        self.gravity = gravity;
        self
    }

    /// Disable gravity (zero-G environment).
    #[must_use]
    pub fn zero_gravity(mut self) -> Self {
        self.gravity = Gravity::zero();
        self
    }

    /// Set the solver configuration.
    #[must_use]
    pub fn solver(mut self, solver: SolverConfig) -> Self {
        self.solver = solver;
        self
    }

    /// Check the timestep, gravity and solver settings.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::InvalidTimestep`](crate::SimError::InvalidTimestep)
    /// for a non-positive or non-finite timestep, and an invalid-config error
    /// for anything else out of range.
    pub fn validate(&self) -> crate::Result<()> {
        if !self.timestep.is_finite() || self.timestep <= 0.0 {
            return Err(crate::SimError::InvalidTimestep(self.timestep));
        }

        if !self.gravity.acceleration.iter().all(|g| g.is_finite()) {
            return Err(crate::SimError::invalid_config("gravity must be finite"));
        }

        self.solver.validate()
    }

    /// Steps per second. Joints scale their error correction by this.
    #[must_use]
    pub fn step_rate(&self) -> f64 {
        self.timestep.recip()
    }

    /// ERP/CFM snapshot handed to newly constructed joints.
    #[must_use]
    pub fn constraint_defaults(&self) -> ConstraintDefaults {
        ConstraintDefaults {
            erp: self.solver.erp,
            cfm: self.solver.cfm,
        }
    }
}

/// Configuration for the constraint solver.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SolverConfig {
    /// Global error-reduction parameter (0..=1).
    ///
    /// Fraction of joint error corrected per step. Joints capture it at
    /// construction time.
    pub erp: f64,
    /// Global constraint-force-mixing value (>= 0).
    pub cfm: f64,
    /// Maximum projected Gauss-Seidel sweeps per step.
    pub max_iterations: usize,
    /// Sweeps stop once the largest multiplier change falls below this.
    pub tolerance: f64,
    /// Successive over-relaxation factor (1.0 = plain Gauss-Seidel).
    pub sor_factor: f64,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            erp: DEFAULT_ERP,
            cfm: DEFAULT_CFM,
            max_iterations: 100,
            tolerance: 1e-10,
            sor_factor: 1.0,
        }
    }
}

impl SolverConfig {
    /// Create a high-accuracy solver configuration.
    #[must_use]
    pub fn high_accuracy() -> Self {
        Self {
            max_iterations: 500,
            tolerance: 1e-12,
            ..Default::default()
        }
    }

    /// Create a fast solver configuration.
    #[must_use]
    pub fn fast() -> Self {
        Self {
            max_iterations: 20,
            tolerance: 1e-6,
            sor_factor: 1.3,
            ..Default::default()
        }
    }

    /// Set the global ERP and CFM.
    #[must_use]
    pub fn stabilization(mut self, erp: f64, cfm: f64) -> Self {
        self.erp = erp;
        self.cfm = cfm;
        self
    }

    /// Set the iteration limit.
    #[must_use]
    pub fn iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    /// Validate the solver configuration.
    pub fn validate(&self) -> crate::Result<()> {
        if !(0.0..=1.0).contains(&self.erp) {
            return Err(crate::SimError::invalid_config(
                "erp must be between 0 and 1",
            ));
        }

        if !self.cfm.is_finite() || self.cfm < 0.0 {
            return Err(crate::SimError::invalid_config(
                "cfm must be finite and non-negative",
            ));
        }

        if self.max_iterations == 0 {
            return Err(crate::SimError::invalid_config(
                "max_iterations must be at least 1",
            ));
        }

        if !(self.sor_factor > 0.0 && self.sor_factor < 2.0) {
            return Err(crate::SimError::invalid_config(
                "sor_factor must be in (0, 2)",
            ));
        }

        if self.tolerance.is_nan() || self.tolerance < 0.0 {
            return Err(crate::SimError::invalid_config(
                "tolerance cannot be negative",
            ));
        }

        Ok(())
    }
}

/// World ERP/CFM captured when a joint is constructed.
///
/// Changing the world's solver config afterwards does not affect joints that
/// already exist.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ConstraintDefaults {
    /// Error-reduction parameter.
    pub erp: f64,
    /// Constraint-force-mixing value.
    pub cfm: f64,
}

impl Default for ConstraintDefaults {
    fn default() -> Self {
        Self {
            erp: DEFAULT_ERP,
            cfm: DEFAULT_CFM,
        }
    }
}

impl ConstraintDefaults {
    /// Create a snapshot with explicit values.
    #[must_use]
    pub const fn new(erp: f64, cfm: f64) -> Self {
        Self { erp, cfm }
    }
}

/// Uniform gravitational field.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Gravity {
    /// Acceleration due to gravity (m/s²).
    pub acceleration: Vector3<f64>,
}

impl Default for Gravity {
    fn default() -> Self {
        Self::earth()
    }
}

impl Gravity {
    /// Standard Earth gravity (9.81 m/s² in -Z direction).
    #[must_use]
    pub fn earth() -> Self {
        Self::new(Vector3::new(0.0, 0.0, -9.81))
    }

    /// No gravity.
    #[must_use]
    pub fn zero() -> Self {
        Self::new(Vector3::zeros())
    }

    /// Custom gravity vector.
    #[must_use]
    pub const fn new(acceleration: Vector3<f64>) -> Self {
        Self { acceleration }
    }
}
