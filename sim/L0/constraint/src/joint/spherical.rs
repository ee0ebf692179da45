//! Spherical (ball-and-socket) joint.

use nalgebra::Vector3;
use sim_types::ConstraintDefaults;

use super::common::{anchor2_world, anchors_at, ball_rows};
use super::{Joint, JointType};
use crate::attachment::BodyPair;
use crate::params::{ParamScope, ParamSet};
use crate::rows::{RowCount, RowWriter};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// A ball joint keeping one anchor point of each body coincident.
///
/// Rotation is free about all three axes. Only `Erp` and `Cfm` on axis 1
/// are accepted as parameters.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SphericalJoint {
    params: ParamSet,
    /// Anchor in body 1 coordinates.
    anchor1: Vector3<f64>,
    /// Anchor in body 2 coordinates, or world coordinates.
    anchor2: Vector3<f64>,
}

impl SphericalJoint {
    /// Create an unattached ball joint.
    #[must_use]
    pub fn new(defaults: &ConstraintDefaults) -> Self {
        Self {
            params: ParamSet::new(
                JointType::Spherical.name(),
                ParamScope::Stabilization,
                1,
                defaults,
            ),
            anchor1: Vector3::zeros(),
            anchor2: Vector3::zeros(),
        }
    }

    /// Place the anchor at a world point.
    pub fn set_anchor(&mut self, bodies: &BodyPair<'_>, anchor: Vector3<f64>) -> sim_types::Result<()> {
        let (first, second) = bodies.require(JointType::Spherical.name())?;
        (self.anchor1, self.anchor2) = anchors_at(first, second, &anchor);
        Ok(())
    }

    /// World position of the anchor as seen from body 1.
    pub fn anchor(&self, bodies: &BodyPair<'_>) -> sim_types::Result<Vector3<f64>> {
        let (first, _) = bodies.require(JointType::Spherical.name())?;
        Ok(first.local_to_world(&self.anchor1))
    }

    /// World position of the anchor as seen from body 2 (or the world).
    ///
    /// Differs from [`anchor`](Self::anchor) by the current joint error.
    pub fn anchor2(&self, bodies: &BodyPair<'_>) -> sim_types::Result<Vector3<f64>> {
        let (_, second) = bodies.require(JointType::Spherical.name())?;
        Ok(anchor2_world(second, &self.anchor2))
    }
}

impl Joint for SphericalJoint {
    fn joint_type(&self) -> JointType {
        JointType::Spherical
    }

    fn params(&self) -> &ParamSet {
        &self.params
    }

    fn params_mut(&mut self) -> &mut ParamSet {
        &mut self.params
    }

    fn set_relative_values(&mut self, bodies: &BodyPair<'_>) {
        if let Some(first) = bodies.first() {
            let anchor = first.local_to_world(&self.anchor1);
            (self.anchor1, self.anchor2) = anchors_at(first, bodies.second(), &anchor);
        }
    }

    fn row_count(&mut self, bodies: &BodyPair<'_>) -> RowCount {
        if bodies.is_attached() {
            RowCount::new(3, 3)
        } else {
            RowCount::none()
        }
    }

    fn fill_rows(&self, bodies: &BodyPair<'_>, rows: &mut RowWriter<'_>) {
        if let Some(first) = bodies.first() {
            ball_rows(
                rows,
                0,
                first,
                bodies.second(),
                &self.anchor1,
                &self.anchor2,
                self.params.erp(),
                self.params.cfm(),
            );
        }
    }
}
