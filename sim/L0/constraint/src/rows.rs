//! Constraint rows and the buffers joints write them into.
//!
//! A joint contributes rows in two phases. [`crate::Joint::row_count`]
//! reports how many rows the joint needs this step as a [`RowCount`]. The
//! caller then hands a [`RowWriter`] over exactly that many rows to
//! [`crate::Joint::fill_rows`].
//!
//! Each row is one scalar velocity equation
//!
//! ```text
//! J1l·v1 + J1a·w1 + J2l·v2 + J2a·w2 = rhs
//! ```
//!
//! softened by `cfm` and with the multiplier optionally clamped to
//! `[lo, hi]`.

use nalgebra::Vector3;

use crate::attachment::BodyPair;
use crate::joint::Joint;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Rows requested by a joint for the current step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct RowCount {
    /// Total number of rows to fill.
    pub total: usize,
    /// Leading rows whose multipliers are unbounded.
    pub unconditional: usize,
}

impl RowCount {
    /// A count of `total` rows, the first `unconditional` of them unbounded.
    #[must_use]
    pub const fn new(total: usize, unconditional: usize) -> Self {
        Self {
            total,
            unconditional,
        }
    }

    /// No rows (detached or idle joint).
    #[must_use]
    pub const fn none() -> Self {
        Self::new(0, 0)
    }

    /// Check whether no rows are requested.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.total == 0
    }
}

/// Clamp interval on a row multiplier.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct RowBounds {
    /// Lower bound.
    pub lo: f64,
    /// Upper bound.
    pub hi: f64,
}

impl RowBounds {
    /// Interval `[lo, hi]`.
    #[must_use]
    pub const fn new(lo: f64, hi: f64) -> Self {
        Self { lo, hi }
    }

    /// `[-limit, limit]`, used by motors.
    #[must_use]
    pub fn symmetric(limit: f64) -> Self {
        Self::new(-limit, limit)
    }

    /// `[0, ∞)`: the row may only push.
    #[must_use]
    pub const fn push_only() -> Self {
        Self::new(0.0, f64::INFINITY)
    }

    /// `(-∞, 0]`: the row may only pull.
    #[must_use]
    pub const fn pull_only() -> Self {
        Self::new(f64::NEG_INFINITY, 0.0)
    }
}

/// One scalar constraint equation.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ConstraintRow {
    /// Jacobian on the first body's linear velocity.
    pub j1_linear: Vector3<f64>,
    /// Jacobian on the first body's angular velocity.
    pub j1_angular: Vector3<f64>,
    /// Jacobian on the second body's linear velocity.
    pub j2_linear: Vector3<f64>,
    /// Jacobian on the second body's angular velocity.
    pub j2_angular: Vector3<f64>,
    /// Right-hand side: target velocity plus stabilization bias.
    pub rhs: f64,
    /// Constraint force mixing for this row.
    pub cfm: f64,
    /// Multiplier bounds. `None` makes the row an equality.
    pub bounds: Option<RowBounds>,
}

impl Default for ConstraintRow {
    fn default() -> Self {
        Self {
            j1_linear: Vector3::zeros(),
            j1_angular: Vector3::zeros(),
            j2_linear: Vector3::zeros(),
            j2_angular: Vector3::zeros(),
            rhs: 0.0,
            cfm: 0.0,
            bounds: None,
        }
    }
}

impl ConstraintRow {
    /// Lower multiplier bound, `-∞` for equality rows.
    #[must_use]
    pub fn lo(&self) -> f64 {
        self.bounds.map_or(f64::NEG_INFINITY, |b| b.lo)
    }

    /// Upper multiplier bound, `+∞` for equality rows.
    #[must_use]
    pub fn hi(&self) -> f64 {
        self.bounds.map_or(f64::INFINITY, |b| b.hi)
    }

    /// Check whether the row is an unbounded equality.
    #[must_use]
    pub fn is_equality(&self) -> bool {
        self.bounds.is_none()
    }

    /// Check whether every coefficient is finite.
    #[must_use]
    pub fn is_finite(&self) -> bool {
        self.j1_linear.iter().all(|x| x.is_finite())
            && self.j1_angular.iter().all(|x| x.is_finite())
            && self.j2_linear.iter().all(|x| x.is_finite())
            && self.j2_angular.iter().all(|x| x.is_finite())
            && self.rhs.is_finite()
            && self.cfm.is_finite()
    }
}

/// Force and torque applied to one body, in world coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Wrench {
    /// Force through the center of mass.
    pub force: Vector3<f64>,
    /// Torque about the center of mass.
    pub torque: Vector3<f64>,
}

impl Default for Wrench {
    fn default() -> Self {
        Self::zero()
    }
}

impl Wrench {
    /// Zero wrench.
    #[must_use]
    pub fn zero() -> Self {
        Self {
            force: Vector3::zeros(),
            torque: Vector3::zeros(),
        }
    }

    /// Check whether the wrench is exactly zero.
    #[must_use]
    pub fn is_zero(&self) -> bool {
        self.force == Vector3::zeros() && self.torque == Vector3::zeros()
    }
}

impl std::ops::AddAssign for Wrench {
    fn add_assign(&mut self, rhs: Self) {
        self.force += rhs.force;
        self.torque += rhs.torque;
    }
}

/// Wrenches a joint applies to its two bodies. `second` is discarded when
/// the joint is attached to the static world.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct WrenchPair {
    /// Wrench on the first body.
    pub first: Wrench,
    /// Wrench on the second body.
    pub second: Wrench,
}

/// Write access to the rows reserved for one joint.
#[derive(Debug)]
pub struct RowWriter<'a> {
    rows: &'a mut [ConstraintRow],
    wrenches: &'a mut WrenchPair,
    fps: f64,
}

impl<'a> RowWriter<'a> {
    /// Wrap the rows reserved for one joint. `fps` is the inverse timestep.
    pub fn new(rows: &'a mut [ConstraintRow], wrenches: &'a mut WrenchPair, fps: f64) -> Self {
        Self {
            rows,
            wrenches,
            fps,
        }
    }

    /// Inverse timestep (1/h).
    #[must_use]
    pub fn fps(&self) -> f64 {
        self.fps
    }

    /// Number of reserved rows.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Check whether no rows were reserved.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Mutable access to row `index`.
    ///
    /// # Panics
    ///
    /// Panics if `index` is outside the reserved range, which means the
    /// joint filled more rows than it counted.
    pub fn row(&mut self, index: usize) -> &mut ConstraintRow {
        &mut self.rows[index]
    }

    /// Accumulator for wrenches emitted while filling (powered stops).
    pub fn wrenches_mut(&mut self) -> &mut WrenchPair {
        self.wrenches
    }
}

/// Rows of a single joint assembled outside a world.
///
/// Runs both protocol phases for one joint, which is what a driver does per
/// joint and what tests need to inspect a joint's equations.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RowBlock {
    /// Result of the counting phase.
    pub count: RowCount,
    /// Filled rows, `count.total` long.
    pub rows: Vec<ConstraintRow>,
    /// Wrenches emitted during the fill.
    pub wrenches: WrenchPair,
}

impl RowBlock {
    /// Count and fill the rows of `joint` against `bodies`.
    pub fn assemble<J: Joint + ?Sized>(joint: &mut J, bodies: &BodyPair<'_>, fps: f64) -> Self {
        let count = joint.row_count(bodies);
        let mut rows = vec![ConstraintRow::default(); count.total];
        let mut wrenches = WrenchPair::default();
        if count.total > 0 {
            let mut writer = RowWriter::new(&mut rows, &mut wrenches, fps);
            joint.fill_rows(bodies, &mut writer);
        }
        Self {
            count,
            rows,
            wrenches,
        }
    }

    /// Number of rows.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Check whether no rows were produced.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}
