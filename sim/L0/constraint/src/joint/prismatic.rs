//! Prismatic (slider) joint.

use nalgebra::{UnitQuaternion, Vector3};
use sim_types::{ConstraintDefaults, RigidBodyState};

use super::common::{check_efforts, fixed_orientation_rows, force_pair};
use super::{Joint, JointType};
use crate::attachment::BodyPair;
use crate::limits::AxisKind;
use crate::math::{normalize_axis, plane_space, relative_rotation};
use crate::params::{ParamScope, ParamSet};
use crate::rows::{RowCount, RowWriter, WrenchPair};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// A prismatic joint allowing translation along a single axis.
///
/// Prismatic joints are used for:
/// - Linear actuators
/// - Sliding mechanisms
/// - Telescoping structures
///
/// # Constraint Formulation
///
/// - 3 rows lock the relative orientation
/// - 2 rows lock translation perpendicular to the axis
/// - 1 optional row for the stops or the motor on the slide position
///
/// Total: 5 constraints, 1 DOF.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PrismaticJoint {
    params: ParamSet,
    /// Sliding axis in body 1 coordinates.
    axis1: Vector3<f64>,
    /// `R2ᵀ(p1 − p2)` at the last reset, or the world reference point.
    offset: Vector3<f64>,
    qrel: UnitQuaternion<f64>,
}

impl PrismaticJoint {
    /// Create an unattached slider along the body 1 x axis.
    #[must_use]
    pub fn new(defaults: &ConstraintDefaults) -> Self {
        Self {
            params: ParamSet::new(JointType::Prismatic.name(), ParamScope::LimitMotor, 1, defaults),
            axis1: Vector3::x(),
            offset: Vector3::zeros(),
            qrel: UnitQuaternion::identity(),
        }
    }

    /// Set the sliding axis (world coordinates) and re-zero the position.
    pub fn set_axis(&mut self, bodies: &BodyPair<'_>, axis: Vector3<f64>) -> sim_types::Result<()> {
        let (first, second) = bodies.require(JointType::Prismatic.name())?;
        let axis = normalize_axis(&axis)?;
        self.reset(first, second, &axis);
        Ok(())
    }

    /// Like [`set_axis`](Self::set_axis), but when attached to the world the
    /// reference point is shifted by `delta`, so the position reads
    /// `-axis·delta` right away.
    pub fn set_axis_delta(
        &mut self,
        bodies: &BodyPair<'_>,
        axis: Vector3<f64>,
        delta: Vector3<f64>,
    ) -> sim_types::Result<()> {
        let (first, second) = bodies.require(JointType::Prismatic.name())?;
        let axis = normalize_axis(&axis)?;
        self.reset(first, second, &axis);
        if second.is_none() {
            self.offset += delta;
        }
        Ok(())
    }

    /// World sliding axis, carried by body 1.
    pub fn axis(&self, bodies: &BodyPair<'_>) -> sim_types::Result<Vector3<f64>> {
        let (first, _) = bodies.require(JointType::Prismatic.name())?;
        Ok(first.vector_to_world(&self.axis1))
    }

    /// Slide position along the axis, zero at the last reset.
    pub fn position(&self, bodies: &BodyPair<'_>) -> sim_types::Result<f64> {
        let (first, second) = bodies.require(JointType::Prismatic.name())?;
        Ok(self.slide_position(first, second))
    }

    /// Time derivative of [`position`](Self::position).
    pub fn position_rate(&self, bodies: &BodyPair<'_>) -> sim_types::Result<f64> {
        let (first, second) = bodies.require(JointType::Prismatic.name())?;
        let axis = first.vector_to_world(&self.axis1);
        let separation = self.separation(first, second);
        let relative = match second {
            Some(second) => {
                let arm = second.vector_to_world(&self.offset);
                first.linear_velocity()
                    - second.linear_velocity()
                    - second.angular_velocity().cross(&arm)
            }
            None => first.linear_velocity(),
        };
        Ok(first.angular_velocity().cross(&axis).dot(&separation) + axis.dot(&relative))
    }

    fn reset(&mut self, first: &RigidBodyState, second: Option<&RigidBodyState>, axis: &Vector3<f64>) {
        self.axis1 = first.vector_to_local(axis);
        self.offset = match second {
            Some(second) => second.vector_to_local(&(first.position() - second.position())),
            None => first.position().coords,
        };
        self.qrel = relative_rotation(first, second);
    }

    /// `p1 − p2 − R2·offset`, or `p1 − offset` against the world.
    fn separation(&self, first: &RigidBodyState, second: Option<&RigidBodyState>) -> Vector3<f64> {
        match second {
            Some(second) => {
                first.position() - second.position() - second.vector_to_world(&self.offset)
            }
            None => first.position().coords - self.offset,
        }
    }

    fn slide_position(&self, first: &RigidBodyState, second: Option<&RigidBodyState>) -> f64 {
        first.vector_to_world(&self.axis1).dot(&self.separation(first, second))
    }
}

impl Joint for PrismaticJoint {
    fn joint_type(&self) -> JointType {
        JointType::Prismatic
    }

    fn params(&self) -> &ParamSet {
        &self.params
    }

    fn params_mut(&mut self) -> &mut ParamSet {
        &mut self.params
    }

    fn set_relative_values(&mut self, bodies: &BodyPair<'_>) {
        if let Some(first) = bodies.first() {
            let axis = first.vector_to_world(&self.axis1);
            self.reset(first, bodies.second(), &axis);
        }
    }

    fn row_count(&mut self, bodies: &BodyPair<'_>) -> RowCount {
        let Some(first) = bodies.first() else {
            return RowCount::none();
        };
        let position = self.slide_position(first, bodies.second());
        let limot = self.params.motor_mut(0);
        limot.test_limit(position, AxisKind::Linear);
        RowCount::new(5 + usize::from(limot.is_active()), 5)
    }

    fn fill_rows(&self, bodies: &BodyPair<'_>, rows: &mut RowWriter<'_>) {
        let Some(first) = bodies.first() else {
            return;
        };
        let second = bodies.second();
        let erp = self.params.erp();
        let cfm = self.params.cfm();
        fixed_orientation_rows(rows, 0, first, second, &self.qrel, erp, cfm);

        let k = rows.fps() * erp;
        let ax1 = first.vector_to_world(&self.axis1);
        let (p, q) = plane_space(&ax1);
        let p1 = first.position().coords;

        // Error of the body 1 origin against where the slide line expects it.
        let (error, centers) = match second {
            Some(second) => {
                let c = second.position().coords - p1;
                (c + second.vector_to_world(&self.offset), Some(c))
            }
            None => (self.offset - p1, None),
        };

        for (index, dir) in [(3, p), (4, q)] {
            let row = rows.row(index);
            row.j1_linear = dir;
            if let Some(c) = centers {
                let ltd = 0.5 * c.cross(&dir);
                row.j1_angular = ltd;
                row.j2_angular = ltd;
                row.j2_linear = -dir;
            }
            row.rhs = k * dir.dot(&error);
            row.cfm = cfm;
        }

        self.params
            .motor(0)
            .add_row(rows, 5, &ax1, AxisKind::Linear, bodies);
    }

    fn effort_wrench(&self, bodies: &BodyPair<'_>, efforts: &[f64]) -> sim_types::Result<WrenchPair> {
        let (first, second) = bodies.require(JointType::Prismatic.name())?;
        check_efforts(efforts, 1)?;
        let force = first.vector_to_world(&self.axis1) * efforts[0];
        Ok(force_pair(first, second, force))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::float_cmp)]
mod tests {
    use super::*;
    use crate::limits::LimitState;
    use crate::rows::RowBlock;
    use approx::assert_relative_eq;
    use nalgebra::Point3;
    use sim_types::{Pose, Twist};

    fn at(x: f64, y: f64, z: f64) -> RigidBodyState {
        RigidBodyState::at_rest(Pose::from_position(Point3::new(x, y, z)))
    }

    #[test]
    fn test_position_zero_after_set_axis() {
        let b1 = RigidBodyState::at_rest(Pose::from_position_rotation(
            Point3::new(1.0, 2.0, 3.0),
            UnitQuaternion::from_euler_angles(0.1, -0.3, 0.7),
        ));
        let b2 = at(-2.0, 0.0, 1.0);
        let bodies = BodyPair::between(&b1, &b2);

        let mut slider = PrismaticJoint::new(&ConstraintDefaults::default());
        slider.set_axis(&bodies, Vector3::new(0.0, 2.0, 0.0)).unwrap();
        assert_relative_eq!(slider.position(&bodies).unwrap(), 0.0, epsilon = 1e-12);
        assert_relative_eq!(slider.axis(&bodies).unwrap(), Vector3::y(), epsilon = 1e-12);

        let block = RowBlock::assemble(&mut slider, &bodies, 60.0);
        assert_eq!(block.count, RowCount::new(5, 5));
        assert!(block.rows.iter().all(|r| r.rhs.abs() < 1e-9));
    }

    #[test]
    fn test_position_tracks_slide() {
        let b1 = at(0.0, 0.0, 0.0);
        let mut slider = PrismaticJoint::new(&ConstraintDefaults::default());
        slider.set_axis(&BodyPair::to_world(&b1), Vector3::x()).unwrap();

        let moved = at(0.75, 0.0, 0.0);
        assert_relative_eq!(slider.position(&BodyPair::to_world(&moved)).unwrap(), 0.75);

        let b2 = at(0.0, 1.0, 0.0);
        slider.set_axis(&BodyPair::between(&b1, &b2), Vector3::x()).unwrap();
        let moved = at(-0.5, 0.0, 0.0);
        assert_relative_eq!(
            slider.position(&BodyPair::between(&moved, &b2)).unwrap(),
            -0.5,
            epsilon = 1e-12
        );
    }

    #[test]
    fn test_axis_delta_shifts_world_reference() {
        let b1 = at(0.0, 0.0, 0.0);
        let bodies = BodyPair::to_world(&b1);
        let mut slider = PrismaticJoint::new(&ConstraintDefaults::default());
        slider
            .set_axis_delta(&bodies, Vector3::z(), Vector3::new(0.0, 0.0, 0.4))
            .unwrap();
        assert_relative_eq!(slider.position(&bodies).unwrap(), -0.4);

        // With a second body the delta is ignored.
        let b2 = at(0.0, 0.0, 2.0);
        let bodies = BodyPair::between(&b1, &b2);
        slider
            .set_axis_delta(&bodies, Vector3::z(), Vector3::new(0.0, 0.0, 0.4))
            .unwrap();
        assert_relative_eq!(slider.position(&bodies).unwrap(), 0.0);
    }

    #[test]
    fn test_position_rate_translation() {
        let b1 = RigidBodyState::new(Pose::identity(), Twist::linear(Vector3::new(0.3, 1.0, 0.0)));
        let b2 = RigidBodyState::new(
            Pose::from_position(Point3::new(0.0, 0.0, 1.0)),
            Twist::linear(Vector3::new(0.0, -0.5, 0.0)),
        );
        let bodies = BodyPair::between(&b1, &b2);
        let mut slider = PrismaticJoint::new(&ConstraintDefaults::default());
        slider.set_axis(&bodies, Vector3::y()).unwrap();
        assert_relative_eq!(slider.position_rate(&bodies).unwrap(), 1.5);
    }

    #[test]
    fn test_stop_rows() {
        let b1 = at(0.0, 0.0, 0.0);
        let mut slider = PrismaticJoint::new(&ConstraintDefaults::default());
        slider.set_axis(&BodyPair::to_world(&b1), Vector3::x()).unwrap();
        slider.set_stops(1, -0.1, 0.1).unwrap();

        let inside = at(0.05, 0.0, 0.0);
        let block = RowBlock::assemble(&mut slider, &BodyPair::to_world(&inside), 60.0);
        assert_eq!(block.count.total, 5);

        let beyond = at(0.2, 0.0, 0.0);
        let block = RowBlock::assemble(&mut slider, &BodyPair::to_world(&beyond), 60.0);
        assert_eq!(block.count, RowCount::new(6, 5));
        assert_eq!(slider.params().motor(0).limit_state(), LimitState::AtUpper);
        assert_eq!(block.rows[5].j1_linear, Vector3::x());
        assert!(block.rows[5].rhs < 0.0);
    }

    #[test]
    fn test_perpendicular_drift_bias() {
        let b1 = at(0.0, 0.0, 0.0);
        let mut slider = PrismaticJoint::new(&ConstraintDefaults::new(1.0, 0.0));
        slider.set_axis(&BodyPair::to_world(&b1), Vector3::x()).unwrap();

        let drifted = at(0.0, 0.2, 0.0);
        let block = RowBlock::assemble(&mut slider, &BodyPair::to_world(&drifted), 10.0);
        let velocity: Vector3<f64> = block.rows[3..5]
            .iter()
            .map(|r| r.j1_linear * r.rhs)
            .sum();
        assert_relative_eq!(velocity, Vector3::new(0.0, -2.0, 0.0), epsilon = 1e-12);
    }

    #[test]
    fn test_effort_force() {
        let b1 = at(0.0, 0.0, 0.0);
        let b2 = at(0.0, 2.0, 0.0);
        let bodies = BodyPair::between(&b1, &b2);
        let mut slider = PrismaticJoint::new(&ConstraintDefaults::default());
        slider.set_axis(&bodies, Vector3::x()).unwrap();

        let pair = slider.effort_wrench(&bodies, &[2.0]).unwrap();
        assert_relative_eq!(pair.first.force, Vector3::new(2.0, 0.0, 0.0));
        assert_relative_eq!(pair.second.force, Vector3::new(-2.0, 0.0, 0.0));
        assert_relative_eq!(pair.first.torque, Vector3::new(0.0, 0.0, -2.0));
    }
}
