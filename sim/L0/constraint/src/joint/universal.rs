//! Universal (Cardan) joint.

use nalgebra::{UnitQuaternion, Vector3};
use sim_types::{ConstraintDefaults, RigidBodyState};
use tracing::warn;

use super::common::{
    anchor2_world, anchors_at, axis2_world, ball_rows, check_efforts, torque_pair,
};
use super::{Joint, JointType};
use crate::attachment::BodyPair;
use crate::limits::AxisKind;
use crate::math::{
    axis_angle, hinge_angle_from_relative, normalize_axis, plane_space, rotation_from_two_axes,
    AXIS_EPSILON,
};
use crate::params::{ParamScope, ParamSet};
use crate::rows::{RowCount, RowWriter, WrenchPair};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

const NAME: &str = JointType::Universal.name();

/// A universal joint: two hinges with perpendicular axes through a shared
/// anchor.
///
/// Axis 1 is carried by body 1 and axis 2 by body 2 (or fixed in the world).
/// Rotation about both axes is free; the joint keeps the anchors coincident
/// and the two axes perpendicular.
///
/// # Constraint Formulation
///
/// - 3 rows keep the anchors coincident
/// - 1 row keeps the axes perpendicular
/// - up to 2 optional rows for the stops or motors on each angle
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct UniversalJoint {
    params: ParamSet,
    anchor1: Vector3<f64>,
    anchor2: Vector3<f64>,
    /// Axis 1 in body 1 coordinates.
    axis1: Vector3<f64>,
    /// Axis 2 in body 2 coordinates, or world coordinates.
    axis2: Vector3<f64>,
    /// Reference rotations for the two angles.
    qrel1: UnitQuaternion<f64>,
    qrel2: UnitQuaternion<f64>,
}

impl UniversalJoint {
    /// Create an unattached universal joint with axis 1 along x and axis 2
    /// along y.
    #[must_use]
    pub fn new(defaults: &ConstraintDefaults) -> Self {
        Self {
            params: ParamSet::new(NAME, ParamScope::LimitMotor, 2, defaults),
            anchor1: Vector3::zeros(),
            anchor2: Vector3::zeros(),
            axis1: Vector3::x(),
            axis2: Vector3::y(),
            qrel1: UnitQuaternion::identity(),
            qrel2: UnitQuaternion::identity(),
        }
    }

    /// Place the anchor at a world point.
    pub fn set_anchor(&mut self, bodies: &BodyPair<'_>, anchor: Vector3<f64>) -> sim_types::Result<()> {
        let (first, second) = bodies.require(NAME)?;
        (self.anchor1, self.anchor2) = anchors_at(first, second, &anchor);
        Ok(())
    }

    /// Set axis 1 (world coordinates) and re-zero both angles.
    pub fn set_axis1(&mut self, bodies: &BodyPair<'_>, axis: Vector3<f64>) -> sim_types::Result<()> {
        let (first, second) = bodies.require(NAME)?;
        self.axis1 = first.vector_to_local(&normalize_axis(&axis)?);
        self.reset_angles(first, second);
        Ok(())
    }

    /// Set axis 2 (world coordinates) and re-zero both angles.
    pub fn set_axis2(&mut self, bodies: &BodyPair<'_>, axis: Vector3<f64>) -> sim_types::Result<()> {
        let (first, second) = bodies.require(NAME)?;
        let axis = normalize_axis(&axis)?;
        self.axis2 = second.map_or(axis, |b| b.vector_to_local(&axis));
        self.reset_angles(first, second);
        Ok(())
    }

    /// Set axis 1 and declare the current angles to be `offset1` and
    /// `offset2`. Body state is not touched.
    pub fn set_axis1_offset(
        &mut self,
        bodies: &BodyPair<'_>,
        axis: Vector3<f64>,
        offset1: f64,
        offset2: f64,
    ) -> sim_types::Result<()> {
        let (first, second) = bodies.require(NAME)?;
        self.axis1 = first.vector_to_local(&normalize_axis(&axis)?);
        self.set_offsets(first, second, offset1, offset2)
    }

    /// Set axis 2 and declare the current angles to be `offset1` and
    /// `offset2`. Body state is not touched.
    pub fn set_axis2_offset(
        &mut self,
        bodies: &BodyPair<'_>,
        axis: Vector3<f64>,
        offset1: f64,
        offset2: f64,
    ) -> sim_types::Result<()> {
        let (first, second) = bodies.require(NAME)?;
        let axis = normalize_axis(&axis)?;
        self.axis2 = second.map_or(axis, |b| b.vector_to_local(&axis));
        self.set_offsets(first, second, offset1, offset2)
    }

    /// World anchor on body 1.
    pub fn anchor(&self, bodies: &BodyPair<'_>) -> sim_types::Result<Vector3<f64>> {
        let (first, _) = bodies.require(NAME)?;
        Ok(first.local_to_world(&self.anchor1))
    }

    /// World anchor on body 2 (or the world).
    pub fn anchor2(&self, bodies: &BodyPair<'_>) -> sim_types::Result<Vector3<f64>> {
        let (_, second) = bodies.require(NAME)?;
        Ok(anchor2_world(second, &self.anchor2))
    }

    /// World direction of axis 1.
    pub fn axis1(&self, bodies: &BodyPair<'_>) -> sim_types::Result<Vector3<f64>> {
        let (first, _) = bodies.require(NAME)?;
        Ok(first.vector_to_world(&self.axis1))
    }

    /// World direction of axis 2.
    pub fn axis2(&self, bodies: &BodyPair<'_>) -> sim_types::Result<Vector3<f64>> {
        let (_, second) = bodies.require(NAME)?;
        Ok(axis2_world(second, &self.axis2))
    }

    /// Both angles.
    ///
    /// # Errors
    ///
    /// `DegenerateAxis` if the axes have become parallel.
    pub fn angles(&self, bodies: &BodyPair<'_>) -> sim_types::Result<(f64, f64)> {
        let (first, second) = bodies.require(NAME)?;
        self.compute_angles(first, second)
    }

    /// Angle about axis 1.
    pub fn angle1(&self, bodies: &BodyPair<'_>) -> sim_types::Result<f64> {
        self.angles(bodies).map(|(a, _)| a)
    }

    /// Angle about axis 2.
    pub fn angle2(&self, bodies: &BodyPair<'_>) -> sim_types::Result<f64> {
        self.angles(bodies).map(|(_, a)| a)
    }

    /// Time derivative of [`angle1`](Self::angle1).
    pub fn angle1_rate(&self, bodies: &BodyPair<'_>) -> sim_types::Result<f64> {
        let (first, second) = bodies.require(NAME)?;
        Ok(relative_spin(first, second, &first.vector_to_world(&self.axis1)))
    }

    /// Time derivative of [`angle2`](Self::angle2).
    pub fn angle2_rate(&self, bodies: &BodyPair<'_>) -> sim_types::Result<f64> {
        let (first, second) = bodies.require(NAME)?;
        Ok(relative_spin(first, second, &axis2_world(second, &self.axis2)))
    }

    fn world_axes(
        &self,
        first: &RigidBodyState,
        second: Option<&RigidBodyState>,
    ) -> (Vector3<f64>, Vector3<f64>) {
        (first.vector_to_world(&self.axis1), axis2_world(second, &self.axis2))
    }

    /// Frames spanned by (axis 1, axis 2) and (axis 2, axis 1).
    fn cross_frames(
        &self,
        first: &RigidBodyState,
        second: Option<&RigidBodyState>,
    ) -> sim_types::Result<(UnitQuaternion<f64>, UnitQuaternion<f64>)> {
        let (ax1, ax2) = self.world_axes(first, second);
        Ok((rotation_from_two_axes(&ax1, &ax2)?, rotation_from_two_axes(&ax2, &ax1)?))
    }

    fn reset_angles(&mut self, first: &RigidBodyState, second: Option<&RigidBodyState>) {
        if let Err(err) = self.set_offsets(first, second, 0.0, 0.0) {
            warn!(%err, "universal joint axes are parallel, angle reference left unchanged");
        }
    }

    fn set_offsets(
        &mut self,
        first: &RigidBodyState,
        second: Option<&RigidBodyState>,
        offset1: f64,
        offset2: f64,
    ) -> sim_types::Result<()> {
        let (ax1, ax2) = self.world_axes(first, second);
        let (cross1, cross2) = self.cross_frames(first, second)?;
        self.qrel1 = first.orientation().inverse() * axis_angle(&ax1, offset1) * cross1;
        let reference2 = axis_angle(&ax2, -offset2) * cross2;
        self.qrel2 = match second {
            Some(second) => second.orientation().inverse() * reference2,
            None => reference2,
        };
        Ok(())
    }

    fn compute_angles(
        &self,
        first: &RigidBodyState,
        second: Option<&RigidBodyState>,
    ) -> sim_types::Result<(f64, f64)> {
        let (cross1, cross2) = self.cross_frames(first, second)?;
        let rel1 = first.orientation().inverse() * cross1 * self.qrel1.inverse();
        let rel2 = match second {
            Some(second) => second.orientation().inverse() * cross2 * self.qrel2.inverse(),
            None => cross2 * self.qrel2.inverse(),
        };
        Ok((
            hinge_angle_from_relative(&rel1, &self.axis1),
            -hinge_angle_from_relative(&rel2, &self.axis2),
        ))
    }
}

/// `axis·(w1 − w2)`.
fn relative_spin(first: &RigidBodyState, second: Option<&RigidBodyState>, axis: &Vector3<f64>) -> f64 {
    let w2 = second.map_or_else(Vector3::zeros, RigidBodyState::angular_velocity);
    axis.dot(&(first.angular_velocity() - w2))
}

impl Joint for UniversalJoint {
    fn joint_type(&self) -> JointType {
        JointType::Universal
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
            (self.anchor1, self.anchor2) = anchors_at(first, second, &anchor);
            self.reset_angles(first, second);
        }
    }

    fn row_count(&mut self, bodies: &BodyPair<'_>) -> RowCount {
        let Some(first) = bodies.first() else {
            return RowCount::none();
        };
        let needs_angles = self.params.motor(0).has_limits(AxisKind::Angular)
            || self.params.motor(1).has_limits(AxisKind::Angular);
        let angles = if needs_angles {
            self.compute_angles(first, bodies.second()).ok()
        } else {
            None
        };

        let mut total = 4;
        for (index, angle) in [angles.map(|a| a.0), angles.map(|a| a.1)].into_iter().enumerate() {
            let limot = self.params.motor_mut(index);
            match angle {
                Some(angle) => {
                    limot.test_limit(angle, AxisKind::Angular);
                }
                None => limot.clear_limit(),
            }
            total += usize::from(limot.is_active());
        }
        RowCount::new(total, 4)
    }

    fn fill_rows(&self, bodies: &BodyPair<'_>, rows: &mut RowWriter<'_>) {
        let Some(first) = bodies.first() else {
            return;
        };
        let second = bodies.second();
        let erp = self.params.erp();
        let cfm = self.params.cfm();
        ball_rows(rows, 0, first, second, &self.anchor1, &self.anchor2, erp, cfm);

        let (ax1, ax2) = self.world_axes(first, second);
        let bias = rows.fps() * erp;
        // Perpendicular component of axis 2 avoids drift in the row direction.
        let k = ax1.dot(&ax2);
        let ax2_perp = ax2 - ax1 * k;
        let p = ax1
            .cross(&ax2_perp)
            .try_normalize(AXIS_EPSILON)
            .unwrap_or_else(|| plane_space(&ax1).0);
        {
            let row = rows.row(3);
            row.j1_angular = p;
            if second.is_some() {
                row.j2_angular = -p;
            }
            row.rhs = -bias * k;
            row.cfm = cfm;
        }

        let mut index = 4;
        index += self
            .params
            .motor(0)
            .add_row(rows, index, &ax1, AxisKind::Angular, bodies);
        self.params
            .motor(1)
            .add_row(rows, index, &ax2, AxisKind::Angular, bodies);
    }

    fn effort_wrench(&self, bodies: &BodyPair<'_>, efforts: &[f64]) -> sim_types::Result<WrenchPair> {
        let (first, second) = bodies.require(NAME)?;
        check_efforts(efforts, 2)?;
        let (ax1, ax2) = self.world_axes(first, second);
        Ok(torque_pair(ax1 * efforts[0] + ax2 * efforts[1]))
    }
}
