//! Per-axis stops and velocity motors.
//!
//! A [`LimitMotor`] stores the parameters of one joint axis and produces at
//! most one constraint row for it. The row either drives the axis towards
//! the motor velocity with bounded force, or holds it at an engaged stop
//! with one-sided bounds and optional bounce.
//!
//! Stops are tested each step from the current joint position before rows
//! are counted, so the count and the fill always agree.

use std::f64::consts::PI;

use nalgebra::Vector3;
use sim_types::ConstraintDefaults;

use crate::attachment::BodyPair;
use crate::params::ParamKind;
use crate::rows::{RowBounds, RowWriter};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Whether the axis turns or slides.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum AxisKind {
    /// Translation along the axis. Rows act on linear velocity.
    Linear,
    /// Rotation about the axis. Rows act on angular velocity.
    Angular,
}

/// Which stop, if any, is engaged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum LimitState {
    /// Position strictly between the stops, or stops disabled.
    #[default]
    Free,
    /// At or beyond the lower stop.
    AtLower,
    /// At or beyond the upper stop.
    AtUpper,
}

/// Stops, motor and stabilization parameters of one joint axis.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct LimitMotor {
    vel: f64,
    fmax: f64,
    lo_stop: f64,
    hi_stop: f64,
    fudge_factor: f64,
    bounce: f64,
    erp: f64,
    cfm: f64,
    stop_erp: f64,
    stop_cfm: f64,
    limit: LimitState,
    limit_error: f64,
}

impl LimitMotor {
    /// Unpowered, unlimited axis with ERP/CFM taken from `defaults`.
    #[must_use]
    pub fn new(defaults: &ConstraintDefaults) -> Self {
        Self {
            vel: 0.0,
            fmax: 0.0,
            lo_stop: f64::NEG_INFINITY,
            hi_stop: f64::INFINITY,
            fudge_factor: 1.0,
            bounce: 0.0,
            erp: defaults.erp,
            cfm: defaults.cfm,
            stop_erp: defaults.erp,
            stop_cfm: defaults.cfm,
            limit: LimitState::Free,
            limit_error: 0.0,
        }
    }

    /// Read a parameter by kind.
    #[must_use]
    pub fn get(&self, kind: ParamKind) -> f64 {
        match kind {
            ParamKind::LoStop => self.lo_stop,
            ParamKind::HiStop => self.hi_stop,
            ParamKind::Vel => self.vel,
            ParamKind::FMax => self.fmax,
            ParamKind::FudgeFactor => self.fudge_factor,
            ParamKind::Bounce => self.bounce,
            ParamKind::Cfm => self.cfm,
            ParamKind::StopErp => self.stop_erp,
            ParamKind::StopCfm => self.stop_cfm,
            ParamKind::Erp => self.erp,
        }
    }

    /// Write a parameter by kind. Values are validated by the owning
    /// [`crate::ParamSet`].
    pub(crate) fn set(&mut self, kind: ParamKind, value: f64) {
        let slot = match kind {
            ParamKind::LoStop => &mut self.lo_stop,
            ParamKind::HiStop => &mut self.hi_stop,
            ParamKind::Vel => &mut self.vel,
            ParamKind::FMax => &mut self.fmax,
            ParamKind::FudgeFactor => &mut self.fudge_factor,
            ParamKind::Bounce => &mut self.bounce,
            ParamKind::Cfm => &mut self.cfm,
            ParamKind::StopErp => &mut self.stop_erp,
            ParamKind::StopCfm => &mut self.stop_cfm,
            ParamKind::Erp => &mut self.erp,
        };
        *slot = value;
    }

    /// Motor target velocity.
    #[must_use]
    pub fn vel(&self) -> f64 {
        self.vel
    }

    /// Motor force limit.
    #[must_use]
    pub fn fmax(&self) -> f64 {
        self.fmax
    }

    /// Lower stop.
    #[must_use]
    pub fn lo_stop(&self) -> f64 {
        self.lo_stop
    }

    /// Upper stop.
    #[must_use]
    pub fn hi_stop(&self) -> f64 {
        self.hi_stop
    }

    /// Error reduction for locking rows.
    #[must_use]
    pub fn erp(&self) -> f64 {
        self.erp
    }

    /// Constraint force mixing for locking and motor rows.
    #[must_use]
    pub fn cfm(&self) -> f64 {
        self.cfm
    }

    /// Result of the last [`test_limit`](Self::test_limit).
    #[must_use]
    pub fn limit_state(&self) -> LimitState {
        self.limit
    }

    /// Signed distance past the engaged stop from the last limit test.
    #[must_use]
    pub fn limit_error(&self) -> f64 {
        self.limit_error
    }

    /// Check whether the motor can apply force.
    #[must_use]
    pub fn is_powered(&self) -> bool {
        self.fmax > 0.0
    }

    /// Check whether the stops can engage at all.
    ///
    /// Rotational stops only count when at least one of them lies within
    /// `[-π, π]`. A lower stop above the upper stop disables both.
    #[must_use]
    pub fn has_limits(&self, kind: AxisKind) -> bool {
        let in_range = match kind {
            AxisKind::Linear => self.lo_stop > f64::NEG_INFINITY || self.hi_stop < f64::INFINITY,
            AxisKind::Angular => self.lo_stop >= -PI || self.hi_stop <= PI,
        };
        in_range && self.lo_stop <= self.hi_stop
    }

    /// Compare `position` against the stops and record the engaged one.
    ///
    /// Returns `true` when a stop is engaged.
    pub fn test_limit(&mut self, position: f64, kind: AxisKind) -> bool {
        self.limit = LimitState::Free;
        self.limit_error = 0.0;
        if !self.has_limits(kind) {
            return false;
        }
        if position <= self.lo_stop {
            self.limit = LimitState::AtLower;
            self.limit_error = position - self.lo_stop;
        } else if position >= self.hi_stop {
            self.limit = LimitState::AtUpper;
            self.limit_error = position - self.hi_stop;
        }
        self.limit != LimitState::Free
    }

    /// Forget the last limit test.
    pub fn clear_limit(&mut self) {
        self.limit = LimitState::Free;
        self.limit_error = 0.0;
    }

    /// Check whether this axis contributes a row.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.is_powered() || self.limit != LimitState::Free
    }

    /// Fill row `index` for this axis and return the number of rows written
    /// (0 or 1).
    ///
    /// `axis` is the world-space unit axis. With a powered motor pressed
    /// against a stop, the motor force is applied directly as a wrench so
    /// the stop row only has to resist the remainder.
    pub fn add_row(
        &self,
        writer: &mut RowWriter<'_>,
        index: usize,
        axis: &Vector3<f64>,
        kind: AxisKind,
        bodies: &BodyPair<'_>,
    ) -> usize {
        if !self.is_active() {
            return 0;
        }
        let Some(first) = bodies.first() else {
            return 0;
        };
        let second = bodies.second();
        let fps = writer.fps();

        // Linear rows between two bodies act at the midpoint of the centers.
        let ltd = match (kind, second) {
            (AxisKind::Linear, Some(second)) => {
                let half = 0.5 * (second.position() - first.position());
                Some(half.cross(axis))
            }
            _ => None,
        };

        {
            let row = writer.row(index);
            match kind {
                AxisKind::Angular => {
                    row.j1_angular = *axis;
                    if second.is_some() {
                        row.j2_angular = -axis;
                    }
                }
                AxisKind::Linear => {
                    row.j1_linear = *axis;
                    if second.is_some() {
                        row.j2_linear = -axis;
                    }
                    if let Some(ltd) = ltd {
                        row.j1_angular = ltd;
                        row.j2_angular = ltd;
                    }
                }
            }
        }

        let limited = self.limit != LimitState::Free;
        // A locked axis has nothing for the motor to do.
        let powered = self.is_powered() && !(limited && self.lo_stop == self.hi_stop);

        if powered {
            if limited {
                let at_upper = self.limit == LimitState::AtUpper;
                let mut fm = if self.vel > 0.0 || (self.vel == 0.0 && at_upper) {
                    -self.fmax
                } else {
                    self.fmax
                };
                // Powering away from the engaged stop is scaled by the fudge factor.
                if (!at_upper && self.vel > 0.0) || (at_upper && self.vel < 0.0) {
                    fm *= self.fudge_factor;
                }
                let wrenches = writer.wrenches_mut();
                match kind {
                    AxisKind::Angular => {
                        wrenches.first.torque -= axis * fm;
                        wrenches.second.torque += axis * fm;
                    }
                    AxisKind::Linear => {
                        wrenches.first.force -= axis * fm;
                        wrenches.second.force += axis * fm;
                        if let Some(ltd) = ltd {
                            wrenches.first.torque -= ltd * fm;
                            wrenches.second.torque -= ltd * fm;
                        }
                    }
                }
            } else {
                let row = writer.row(index);
                row.cfm = self.cfm;
                row.rhs = self.vel;
                row.bounds = Some(RowBounds::symmetric(self.fmax));
            }
        }

        if limited {
            let mut rhs = -fps * self.stop_erp * self.limit_error;
            let bounds = if self.lo_stop == self.hi_stop {
                None
            } else if self.limit == LimitState::AtLower {
                Some(RowBounds::push_only())
            } else {
                Some(RowBounds::pull_only())
            };

            // A locked axis has no stop to bounce off.
            if self.bounce > 0.0 && self.lo_stop != self.hi_stop {
                let velocity_along = |v1: Vector3<f64>, v2: Option<Vector3<f64>>| {
                    axis.dot(&v1) - v2.map_or(0.0, |v| axis.dot(&v))
                };
                let v = match kind {
                    AxisKind::Angular => velocity_along(
                        first.angular_velocity(),
                        second.map(sim_types::RigidBodyState::angular_velocity),
                    ),
                    AxisKind::Linear => velocity_along(
                        first.linear_velocity(),
                        second.map(sim_types::RigidBodyState::linear_velocity),
                    ),
                };
                // Only bounce when moving into the stop.
                match self.limit {
                    LimitState::AtLower if v < 0.0 => rhs = rhs.max(-self.bounce * v),
                    LimitState::AtUpper if v > 0.0 => rhs = rhs.min(-self.bounce * v),
                    _ => {}
                }
            }

            let row = writer.row(index);
            row.rhs = rhs;
            row.cfm = self.stop_cfm;
            row.bounds = bounds;
        }

        1
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::float_cmp)]
mod tests {
    use super::*;
    use crate::rows::{ConstraintRow, WrenchPair};
    use approx::assert_relative_eq;
    use nalgebra::Point3;
    use sim_types::{Pose, RigidBodyState, Twist};

    fn motor() -> LimitMotor {
        LimitMotor::new(&ConstraintDefaults::new(0.2, 1e-5))
    }

    fn fill(
        lm: &LimitMotor,
        axis: Vector3<f64>,
        kind: AxisKind,
        bodies: &BodyPair<'_>,
    ) -> (usize, ConstraintRow, WrenchPair) {
        let mut rows = [ConstraintRow::default()];
        let mut wrenches = WrenchPair::default();
        let n = {
            let mut writer = RowWriter::new(&mut rows, &mut wrenches, 100.0);
            lm.add_row(&mut writer, 0, &axis, kind, bodies)
        };
        (n, rows[0], wrenches)
    }

    #[test]
    fn test_unlimited_unpowered_is_inactive() {
        let mut lm = motor();
        assert!(!lm.test_limit(100.0, AxisKind::Linear));
        assert!(!lm.is_active());

        let body = RigidBodyState::default();
        let (n, _, _) = fill(&lm, Vector3::x(), AxisKind::Linear, &BodyPair::to_world(&body));
        assert_eq!(n, 0);
    }

    #[test]
    fn test_limit_boundary_is_inclusive() {
        let mut lm = motor();
        lm.set(ParamKind::LoStop, -0.5);
        lm.set(ParamKind::HiStop, 0.5);

        assert!(lm.test_limit(0.5, AxisKind::Linear));
        assert_eq!(lm.limit_state(), LimitState::AtUpper);
        assert_eq!(lm.limit_error(), 0.0);

        assert!(lm.test_limit(-0.7, AxisKind::Linear));
        assert_eq!(lm.limit_state(), LimitState::AtLower);
        assert_relative_eq!(lm.limit_error(), -0.2, epsilon = 1e-12);

        assert!(!lm.test_limit(0.0, AxisKind::Linear));
        assert_eq!(lm.limit_state(), LimitState::Free);
    }

    #[test]
    fn test_inverted_stops_disable_limit() {
        let mut lm = motor();
        lm.set(ParamKind::LoStop, 1.0);
        lm.set(ParamKind::HiStop, -1.0);
        assert!(!lm.has_limits(AxisKind::Angular));
        assert!(!lm.test_limit(5.0, AxisKind::Angular));
        assert!(!lm.is_active());
    }

    #[test]
    fn test_rotational_stops_outside_pi_ignored() {
        let mut lm = motor();
        lm.set(ParamKind::LoStop, -4.0);
        lm.set(ParamKind::HiStop, 4.0);
        assert!(!lm.has_limits(AxisKind::Angular));
        assert!(lm.has_limits(AxisKind::Linear));
    }

    #[test]
    fn test_motor_row() {
        let mut lm = motor();
        lm.set(ParamKind::Vel, 2.0);
        lm.set(ParamKind::FMax, 10.0);
        lm.test_limit(0.0, AxisKind::Angular);

        let body = RigidBodyState::default();
        let (n, row, wrenches) = fill(&lm, Vector3::z(), AxisKind::Angular, &BodyPair::to_world(&body));
        assert_eq!(n, 1);
        assert_eq!(row.j1_angular, Vector3::z());
        assert_eq!(row.j2_angular, Vector3::zeros());
        assert_eq!(row.rhs, 2.0);
        assert_eq!(row.cfm, 1e-5);
        assert_eq!(row.bounds, Some(RowBounds::symmetric(10.0)));
        assert!(wrenches.first.is_zero());
    }

    #[test]
    fn test_stop_row_bounds_and_bias() {
        let mut lm = motor();
        lm.set(ParamKind::HiStop, 0.25);
        lm.set(ParamKind::StopCfm, 1e-3);
        lm.test_limit(0.35, AxisKind::Linear);

        let b1 = RigidBodyState::default();
        let b2 = RigidBodyState::at_rest(Pose::from_position(Point3::new(2.0, 0.0, 0.0)));
        let (n, row, _) = fill(&lm, Vector3::y(), AxisKind::Linear, &BodyPair::between(&b1, &b2));
        assert_eq!(n, 1);
        assert_eq!(row.j1_linear, Vector3::y());
        assert_eq!(row.j2_linear, -Vector3::y());
        // 0.5 * (2, 0, 0) x (0, 1, 0)
        assert_relative_eq!(row.j1_angular, Vector3::new(0.0, 0.0, 1.0), epsilon = 1e-12);
        assert_eq!(row.j1_angular, row.j2_angular);
        assert_relative_eq!(row.rhs, -100.0 * 0.2 * 0.1, epsilon = 1e-9);
        assert_eq!(row.cfm, 1e-3);
        assert_eq!(row.bounds, Some(RowBounds::pull_only()));
    }

    #[test]
    fn test_locked_axis_is_equality_and_unpowered() {
        let mut lm = motor();
        lm.set(ParamKind::LoStop, 0.3);
        lm.set(ParamKind::HiStop, 0.3);
        lm.set(ParamKind::FMax, 5.0);
        lm.set(ParamKind::Vel, 1.0);
        assert!(lm.test_limit(0.3, AxisKind::Angular));

        let body = RigidBodyState::default();
        let (_, row, wrenches) = fill(&lm, Vector3::x(), AxisKind::Angular, &BodyPair::to_world(&body));
        assert!(row.is_equality());
        assert!(wrenches.first.is_zero());
    }

    #[test]
    fn test_powered_at_stop_emits_wrench() {
        let mut lm = motor();
        lm.set(ParamKind::HiStop, 0.0);
        lm.set(ParamKind::Vel, 1.0);
        lm.set(ParamKind::FMax, 4.0);
        lm.set(ParamKind::FudgeFactor, 0.5);
        lm.test_limit(0.1, AxisKind::Angular);

        let b1 = RigidBodyState::default();
        let b2 = RigidBodyState::default();
        let (_, row, wrenches) = fill(&lm, Vector3::z(), AxisKind::Angular, &BodyPair::between(&b1, &b2));
        // Pushing into the upper stop: full force, no fudge.
        assert_relative_eq!(wrenches.first.torque, Vector3::new(0.0, 0.0, 4.0));
        assert_relative_eq!(wrenches.second.torque, Vector3::new(0.0, 0.0, -4.0));
        assert_eq!(row.bounds, Some(RowBounds::pull_only()));

        // Powering away from the stop is scaled by the fudge factor.
        lm.set(ParamKind::Vel, -1.0);
        let (_, _, wrenches) = fill(&lm, Vector3::z(), AxisKind::Angular, &BodyPair::between(&b1, &b2));
        assert_relative_eq!(wrenches.first.torque, Vector3::new(0.0, 0.0, -2.0));
    }

    #[test]
    fn test_bounce_reflects_approach_velocity() {
        let mut lm = motor();
        lm.set(ParamKind::LoStop, 0.0);
        lm.set(ParamKind::Bounce, 0.5);
        lm.set(ParamKind::StopErp, 0.0);
        lm.test_limit(-0.01, AxisKind::Linear);

        let body = RigidBodyState::new(Pose::identity(), Twist::linear(Vector3::new(-2.0, 0.0, 0.0)));
        let (_, row, _) = fill(&lm, Vector3::x(), AxisKind::Linear, &BodyPair::to_world(&body));
        assert_relative_eq!(row.rhs, 1.0, epsilon = 1e-12);
        assert_eq!(row.bounds, Some(RowBounds::push_only()));

        // Moving away from the stop: no bounce.
        let body = RigidBodyState::new(Pose::identity(), Twist::linear(Vector3::new(2.0, 0.0, 0.0)));
        let (_, row, _) = fill(&lm, Vector3::x(), AxisKind::Linear, &BodyPair::to_world(&body));
        assert_relative_eq!(row.rhs, 0.0, epsilon = 1e-12);
    }

    #[test]
    fn test_locked_axis_ignores_bounce() {
        let mut lm = motor();
        lm.set(ParamKind::LoStop, 0.0);
        lm.set(ParamKind::HiStop, 0.0);
        lm.set(ParamKind::Bounce, 0.5);
        lm.set(ParamKind::StopErp, 0.0);
        assert!(lm.test_limit(-0.01, AxisKind::Linear));

        let body = RigidBodyState::new(Pose::identity(), Twist::linear(Vector3::new(-2.0, 0.0, 0.0)));
        let (n, row, _) = fill(&lm, Vector3::x(), AxisKind::Linear, &BodyPair::to_world(&body));
        assert_eq!(n, 1);
        assert!(row.is_equality());
        assert_relative_eq!(row.rhs, 0.0, epsilon = 1e-12);
    }
}
