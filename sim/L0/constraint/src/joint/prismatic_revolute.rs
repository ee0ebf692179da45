//! Prismatic-revolute joint: a slider on body 1 followed by a hinge.

use nalgebra::{UnitQuaternion, Vector3};
use sim_types::{ConstraintDefaults, RigidBodyState};
use tracing::warn;

use super::common::{anchor2_world, anchors_at, axes_at, axis2_world, check_efforts, force_pair};
use super::{Joint, JointType};
use crate::attachment::BodyPair;
use crate::limits::AxisKind;
use crate::math::{hinge_angle, normalize_axis, relative_rotation, AXIS_EPSILON};
use crate::params::{ParamScope, ParamSet};
use crate::rows::{RowCount, RowWriter, WrenchPair};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

const NAME: &str = JointType::PrismaticRevolute.name();

/// A joint combining a prismatic axis (carried by body 1) with a
/// perpendicular rotoide axis.
///
/// Parameter axis 1 addresses the prismatic freedom, axis 2 the rotoide
/// freedom. Keeping the two axes perpendicular is up to the caller; a
/// warning is logged when they are set parallel.
///
/// # Constraint Formulation
///
/// - 2 rows lock rotation perpendicular to the rotoide axis
/// - 2 rows lock translation perpendicular to the prismatic axis
/// - up to 2 optional rows for the slide and hinge stops or motors
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PrismaticRevoluteJoint {
    params: ParamSet,
    /// Anchor relative to the body 1 origin, in body 1 coordinates.
    offset: Vector3<f64>,
    /// Anchor in body 2 coordinates, or world coordinates.
    anchor2: Vector3<f64>,
    /// Prismatic axis in body 1 coordinates.
    axis_p1: Vector3<f64>,
    /// Rotoide axis in body 1 coordinates.
    axis_r1: Vector3<f64>,
    /// Rotoide axis in body 2 coordinates, or world coordinates.
    axis_r2: Vector3<f64>,
    qrel: UnitQuaternion<f64>,
}

impl PrismaticRevoluteJoint {
    /// Create an unattached joint sliding along y and turning about x.
    #[must_use]
    pub fn new(defaults: &ConstraintDefaults) -> Self {
        Self {
            params: ParamSet::new(NAME, ParamScope::LimitMotor, 2, defaults),
            offset: Vector3::zeros(),
            anchor2: Vector3::zeros(),
            axis_p1: Vector3::y(),
            axis_r1: Vector3::x(),
            axis_r2: Vector3::x(),
            qrel: UnitQuaternion::identity(),
        }
    }

    /// Place the anchor at a world point and re-zero the slide position.
    pub fn set_anchor(&mut self, bodies: &BodyPair<'_>, anchor: Vector3<f64>) -> sim_types::Result<()> {
        let (first, second) = bodies.require(NAME)?;
        (self.offset, self.anchor2) = anchors_at(first, second, &anchor);
        Ok(())
    }

    /// Set the prismatic axis (world coordinates).
    pub fn set_axis1(&mut self, bodies: &BodyPair<'_>, axis: Vector3<f64>) -> sim_types::Result<()> {
        let (first, second) = bodies.require(NAME)?;
        self.axis_p1 = first.vector_to_local(&normalize_axis(&axis)?);
        self.qrel = relative_rotation(first, second);
        self.warn_if_parallel();
        Ok(())
    }

    /// Set the rotoide axis (world coordinates) and re-zero the angle.
    pub fn set_axis2(&mut self, bodies: &BodyPair<'_>, axis: Vector3<f64>) -> sim_types::Result<()> {
        let (first, second) = bodies.require(NAME)?;
        (self.axis_r1, self.axis_r2) = axes_at(first, second, &normalize_axis(&axis)?);
        self.qrel = relative_rotation(first, second);
        self.warn_if_parallel();
        Ok(())
    }

    /// World anchor on body 2 (or the world).
    pub fn anchor(&self, bodies: &BodyPair<'_>) -> sim_types::Result<Vector3<f64>> {
        let (_, second) = bodies.require(NAME)?;
        Ok(anchor2_world(second, &self.anchor2))
    }

    /// World prismatic axis.
    pub fn axis1(&self, bodies: &BodyPair<'_>) -> sim_types::Result<Vector3<f64>> {
        let (first, _) = bodies.require(NAME)?;
        Ok(first.vector_to_world(&self.axis_p1))
    }

    /// World rotoide axis, carried by body 1.
    pub fn axis2(&self, bodies: &BodyPair<'_>) -> sim_types::Result<Vector3<f64>> {
        let (first, _) = bodies.require(NAME)?;
        Ok(first.vector_to_world(&self.axis_r1))
    }

    /// Slide position along the prismatic axis.
    pub fn position(&self, bodies: &BodyPair<'_>) -> sim_types::Result<f64> {
        let (first, second) = bodies.require(NAME)?;
        Ok(self.slide_position(first, second))
    }

    /// Time derivative of [`position`](Self::position).
    pub fn position_rate(&self, bodies: &BodyPair<'_>) -> sim_types::Result<f64> {
        let (first, second) = bodies.require(NAME)?;
        let axis = first.vector_to_world(&self.axis_p1);
        let arm1 = first.vector_to_world(&self.offset);
        let mut relative = first.linear_velocity() + first.angular_velocity().cross(&arm1);
        if let Some(second) = second {
            let arm2 = second.vector_to_world(&self.anchor2);
            relative -= second.linear_velocity() + second.angular_velocity().cross(&arm2);
        }
        let separation = self.separation(first, second);
        Ok(first.angular_velocity().cross(&axis).dot(&separation) + axis.dot(&relative))
    }

    /// Hinge angle about the rotoide axis.
    pub fn angle(&self, bodies: &BodyPair<'_>) -> sim_types::Result<f64> {
        let (first, second) = bodies.require(NAME)?;
        Ok(hinge_angle(first, second, &self.axis_r1, &self.qrel))
    }

    /// Time derivative of [`angle`](Self::angle).
    pub fn angle_rate(&self, bodies: &BodyPair<'_>) -> sim_types::Result<f64> {
        let (first, second) = bodies.require(NAME)?;
        let axis = first.vector_to_world(&self.axis_r1);
        let w2 = second.map_or_else(Vector3::zeros, RigidBodyState::angular_velocity);
        Ok(axis.dot(&(first.angular_velocity() - w2)))
    }

    fn warn_if_parallel(&self) {
        if self.axis_p1.cross(&self.axis_r1).norm() <= AXIS_EPSILON.sqrt() {
            warn!("prismatic and rotoide axes of a prismatic-revolute joint are parallel");
        }
    }

    /// Body 1 anchor minus body 2 anchor, in world coordinates.
    fn separation(&self, first: &RigidBodyState, second: Option<&RigidBodyState>) -> Vector3<f64> {
        first.local_to_world(&self.offset) - anchor2_world(second, &self.anchor2)
    }

    fn slide_position(&self, first: &RigidBodyState, second: Option<&RigidBodyState>) -> f64 {
        first
            .vector_to_world(&self.axis_p1)
            .dot(&self.separation(first, second))
    }
}

impl Joint for PrismaticRevoluteJoint {
    fn joint_type(&self) -> JointType {
        JointType::PrismaticRevolute
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
            let anchor = anchor2_world(second, &self.anchor2);
            (self.offset, self.anchor2) = anchors_at(first, second, &anchor);
            let rotoide = first.vector_to_world(&self.axis_r1);
            (self.axis_r1, self.axis_r2) = axes_at(first, second, &rotoide);
            self.qrel = relative_rotation(first, second);
        }
    }

    fn row_count(&mut self, bodies: &BodyPair<'_>) -> RowCount {
        let Some(first) = bodies.first() else {
            return RowCount::none();
        };
        let second = bodies.second();
        let position = self.slide_position(first, second);
        let angle = hinge_angle(first, second, &self.axis_r1, &self.qrel);

        let slide = self.params.motor_mut(0);
        slide.test_limit(position, AxisKind::Linear);
        let mut total = 4 + usize::from(slide.is_active());
        let hinge = self.params.motor_mut(1);
        hinge.test_limit(angle, AxisKind::Angular);
        total += usize::from(hinge.is_active());
        RowCount::new(total, 4)
    }

    fn fill_rows(&self, bodies: &BodyPair<'_>, rows: &mut RowWriter<'_>) {
        let Some(first) = bodies.first() else {
            return;
        };
        let second = bodies.second();
        let k = rows.fps() * self.params.erp();
        let cfm = self.params.cfm();

        let ax_p = first.vector_to_world(&self.axis_p1);
        let ax1 = first.vector_to_world(&self.axis_r1);
        let ax2 = axis2_world(second, &self.axis_r2);
        let q = ax1.cross(&ax_p);

        // Rotation perpendicular to the rotoide axis.
        let misalignment = ax1.cross(&ax2);
        for (index, dir) in [(0, ax_p), (1, q)] {
            let row = rows.row(index);
            row.j1_angular = dir;
            if second.is_some() {
                row.j2_angular = -dir;
            }
            row.rhs = k * misalignment.dot(&dir);
            row.cfm = cfm;
        }

        // Translation perpendicular to the prismatic axis.
        let p1 = first.position().coords;
        let (wanchor2, dist) = match second {
            Some(second) => {
                let wanchor2 = second.vector_to_world(&self.anchor2);
                (Some(wanchor2), wanchor2 + second.position().coords - p1)
            }
            None => (None, self.anchor2 - p1),
        };
        let error = dist - first.vector_to_world(&self.offset);
        for (index, dir) in [(2, ax1), (3, q)] {
            let row = rows.row(index);
            row.j1_linear = dir;
            row.j1_angular = dist.cross(&dir);
            if let Some(wanchor2) = wanchor2 {
                row.j2_linear = -dir;
                row.j2_angular = dir.cross(&wanchor2);
            }
            row.rhs = k * dir.dot(&error);
            row.cfm = cfm;
        }

        let mut index = 4;
        index += self
            .params
            .motor(0)
            .add_row(rows, index, &ax_p, AxisKind::Linear, bodies);
        self.params
            .motor(1)
            .add_row(rows, index, &ax1, AxisKind::Angular, bodies);
    }

    fn effort_wrench(&self, bodies: &BodyPair<'_>, efforts: &[f64]) -> sim_types::Result<WrenchPair> {
        let (first, second) = bodies.require(NAME)?;
        check_efforts(efforts, 2)?;
        let force = first.vector_to_world(&self.axis_p1) * efforts[0];
        let torque = first.vector_to_world(&self.axis_r1) * efforts[1];
        let mut pair = force_pair(first, second, force);
        pair.first.torque += torque;
        pair.second.torque -= torque;
        Ok(pair)
    }
}
