//! Revolute (hinge) joint.

use nalgebra::{UnitQuaternion, Vector3};
use sim_types::ConstraintDefaults;

use super::common::{
    anchor2_world, anchors_at, axes_at, axis2_world, ball_rows, check_efforts, torque_pair,
};
use super::{Joint, JointType};
use crate::attachment::BodyPair;
use crate::limits::AxisKind;
use crate::math::{hinge_angle, normalize_axis, plane_space, relative_rotation};
use crate::params::{ParamScope, ParamSet};
use crate::rows::{RowCount, RowWriter, WrenchPair};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// A revolute joint allowing rotation about a single axis through an anchor.
///
/// # Constraint Formulation
///
/// - 3 rows keep the anchors coincident
/// - 2 rows keep the hinge axes of both bodies aligned
/// - 1 optional row for the stops or the motor on the hinge angle
///
/// The angle is measured relative to the configuration recorded the last
/// time the axis was set or the joint was attached.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct RevoluteJoint {
    params: ParamSet,
    anchor1: Vector3<f64>,
    anchor2: Vector3<f64>,
    /// Hinge axis in body 1 coordinates.
    axis1: Vector3<f64>,
    /// Hinge axis in body 2 coordinates, or world coordinates.
    axis2: Vector3<f64>,
    qrel: UnitQuaternion<f64>,
}

impl RevoluteJoint {
    /// Create an unattached hinge along the body 1 x axis.
    #[must_use]
    pub fn new(defaults: &ConstraintDefaults) -> Self {
        Self {
            params: ParamSet::new(JointType::Revolute.name(), ParamScope::LimitMotor, 1, defaults),
            anchor1: Vector3::zeros(),
            anchor2: Vector3::zeros(),
            axis1: Vector3::x(),
            axis2: Vector3::x(),
            qrel: UnitQuaternion::identity(),
        }
    }

    /// Place the anchor at a world point.
    pub fn set_anchor(&mut self, bodies: &BodyPair<'_>, anchor: Vector3<f64>) -> sim_types::Result<()> {
        let (first, second) = bodies.require(JointType::Revolute.name())?;
        (self.anchor1, self.anchor2) = anchors_at(first, second, &anchor);
        Ok(())
    }

    /// Set the hinge axis (world coordinates) and re-zero the angle.
    pub fn set_axis(&mut self, bodies: &BodyPair<'_>, axis: Vector3<f64>) -> sim_types::Result<()> {
        let (first, second) = bodies.require(JointType::Revolute.name())?;
        let axis = normalize_axis(&axis)?;
        (self.axis1, self.axis2) = axes_at(first, second, &axis);
        self.qrel = relative_rotation(first, second);
        Ok(())
    }

    /// World anchor on body 1.
    pub fn anchor(&self, bodies: &BodyPair<'_>) -> sim_types::Result<Vector3<f64>> {
        let (first, _) = bodies.require(JointType::Revolute.name())?;
        Ok(first.local_to_world(&self.anchor1))
    }

    /// World anchor on body 2 (or the world).
    pub fn anchor2(&self, bodies: &BodyPair<'_>) -> sim_types::Result<Vector3<f64>> {
        let (_, second) = bodies.require(JointType::Revolute.name())?;
        Ok(anchor2_world(second, &self.anchor2))
    }

    /// World hinge axis, carried by body 1.
    pub fn axis(&self, bodies: &BodyPair<'_>) -> sim_types::Result<Vector3<f64>> {
        let (first, _) = bodies.require(JointType::Revolute.name())?;
        Ok(first.vector_to_world(&self.axis1))
    }

    /// Hinge angle in `(-π, π]`.
    pub fn angle(&self, bodies: &BodyPair<'_>) -> sim_types::Result<f64> {
        let (first, second) = bodies.require(JointType::Revolute.name())?;
        Ok(hinge_angle(first, second, &self.axis1, &self.qrel))
    }

    /// Time derivative of [`angle`](Self::angle).
    pub fn angle_rate(&self, bodies: &BodyPair<'_>) -> sim_types::Result<f64> {
        let (first, second) = bodies.require(JointType::Revolute.name())?;
        let axis = first.vector_to_world(&self.axis1);
        let w2 = second.map_or_else(Vector3::zeros, sim_types::RigidBodyState::angular_velocity);
        Ok(axis.dot(&(first.angular_velocity() - w2)))
    }
}

impl Joint for RevoluteJoint {
    fn joint_type(&self) -> JointType {
        JointType::Revolute
    }

    fn params(&self) -> &ParamSet {
        &self.params
    }

    fn params_mut(&mut self) -> &mut ParamSet {
        &mut self.params
    }

    fn set_relative_values(&mut self, bodies: &BodyPair<'_>) {
        if let Some(first) = bodies.first() {
            let second = bodies.second();
            let anchor = first.local_to_world(&self.anchor1);
            let axis = first.vector_to_world(&self.axis1);
            (self.anchor1, self.anchor2) = anchors_at(first, second, &anchor);
            (self.axis1, self.axis2) = axes_at(first, second, &axis);
            self.qrel = relative_rotation(first, second);
        }
    }

    fn row_count(&mut self, bodies: &BodyPair<'_>) -> RowCount {
        let Some(first) = bodies.first() else {
            return RowCount::none();
        };
        let angle = hinge_angle(first, bodies.second(), &self.axis1, &self.qrel);
        let limot = self.params.motor_mut(0);
        limot.test_limit(angle, AxisKind::Angular);
        RowCount::new(5 + usize::from(limot.is_active()), 5)
    }

    fn fill_rows(&self, bodies: &BodyPair<'_>, rows: &mut RowWriter<'_>) {
        let Some(first) = bodies.first() else {
            return;
        };
        let second = bodies.second();
        let erp = self.params.erp();
        let cfm = self.params.cfm();
        ball_rows(rows, 0, first, second, &self.anchor1, &self.anchor2, erp, cfm);

        let ax1 = first.vector_to_world(&self.axis1);
        let ax2 = axis2_world(second, &self.axis2);
        let (p, q) = plane_space(&ax1);
        let misalignment = ax1.cross(&ax2);
        let k = rows.fps() * erp;
        for (index, dir) in [(3, p), (4, q)] {
            let row = rows.row(index);
            row.j1_angular = dir;
            if second.is_some() {
                row.j2_angular = -dir;
            }
            row.rhs = k * misalignment.dot(&dir);
            row.cfm = cfm;
        }

        self.params
            .motor(0)
            .add_row(rows, 5, &ax1, AxisKind::Angular, bodies);
    }

    fn effort_wrench(&self, bodies: &BodyPair<'_>, efforts: &[f64]) -> sim_types::Result<WrenchPair> {
        let (first, _) = bodies.require(JointType::Revolute.name())?;
        check_efforts(efforts, 1)?;
        Ok(torque_pair(first.vector_to_world(&self.axis1) * efforts[0]))
    }
}
