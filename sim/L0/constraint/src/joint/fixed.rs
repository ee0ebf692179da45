//! Fixed joint: welds two bodies (or a body and the world) together.

use nalgebra::{UnitQuaternion, Vector3};
use sim_types::{ConstraintDefaults, SimError};
use tracing::{debug, warn};

use super::common::fixed_orientation_rows;
use super::{Joint, JointType};
use crate::attachment::BodyPair;
use crate::math::relative_rotation;
use crate::params::{ParamScope, ParamSet};
use crate::rows::{RowCount, RowWriter};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// A fixed joint (weld) with no degrees of freedom.
///
/// The relative position and orientation of the bodies is recorded by
/// [`set_fixed`](Self::set_fixed) (called automatically on attachment) and
/// held by six equality rows: three on the offset between the body origins,
/// three on the relative rotation.
///
/// Only `Erp` and `Cfm` on axis 1 are accepted as parameters; they apply to
/// all six rows.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct FixedJoint {
    params: ParamSet,
    /// `R1ᵀ(p1 − p2)`, or the world position of body 1 with no second body.
    offset: Vector3<f64>,
    qrel: UnitQuaternion<f64>,
}

impl FixedJoint {
    /// Create an unattached fixed joint.
    #[must_use]
    pub fn new(defaults: &ConstraintDefaults) -> Self {
        Self {
            params: ParamSet::new(JointType::Fixed.name(), ParamScope::Stabilization, 1, defaults),
            offset: Vector3::zeros(),
            qrel: UnitQuaternion::identity(),
        }
    }

    /// Record the current relative pose as the one to hold.
    pub fn set_fixed(&mut self, bodies: &BodyPair<'_>) -> sim_types::Result<()> {
        let (first, second) = bodies.require(JointType::Fixed.name())?;
        self.offset = match second {
            Some(second) => first.vector_to_local(&(first.position() - second.position())),
            None => first.position().coords,
        };
        self.qrel = relative_rotation(first, second);
        Ok(())
    }

    /// Recorded position offset.
    #[must_use]
    pub fn offset(&self) -> &Vector3<f64> {
        &self.offset
    }

    /// Recorded relative rotation.
    #[must_use]
    pub fn relative_rotation(&self) -> &UnitQuaternion<f64> {
        &self.qrel
    }
}

impl Joint for FixedJoint {
    fn joint_type(&self) -> JointType {
        JointType::Fixed
    }

    fn params(&self) -> &ParamSet {
        &self.params
    }

    fn params_mut(&mut self) -> &mut ParamSet {
        &mut self.params
    }

    fn set_relative_values(&mut self, bodies: &BodyPair<'_>) {
        match self.set_fixed(bodies) {
            Ok(()) => {}
            Err(SimError::NotAttached { .. }) => {
                debug!("fixed joint has no bodies, keeping the recorded offset");
            }
            Err(err) => warn!(%err, "fixed joint could not record its configuration"),
        }
    }

    fn row_count(&mut self, bodies: &BodyPair<'_>) -> RowCount {
        if bodies.is_attached() {
            RowCount::new(6, 6)
        } else {
            RowCount::none()
        }
    }

    fn fill_rows(&self, bodies: &BodyPair<'_>, rows: &mut RowWriter<'_>) {
        let Some(first) = bodies.first() else {
            return;
        };
        let second = bodies.second();
        let k = rows.fps() * self.params.erp();
        let cfm = self.params.cfm();
        let p1 = first.position().coords;

        let (error, ofs) = match second {
            Some(second) => {
                let ofs = first.vector_to_world(&self.offset);
                (second.position().coords - p1 + ofs, Some(ofs))
            }
            None => (self.offset - p1, None),
        };

        for i in 0..3 {
            let e = Vector3::ith(i, 1.0);
            let row = rows.row(i);
            row.j1_linear = e;
            if let Some(ofs) = ofs {
                row.j1_angular = e.cross(&ofs);
                row.j2_linear = -e;
            }
            row.rhs = k * error[i];
            row.cfm = cfm;
        }

        fixed_orientation_rows(rows, 3, first, second, &self.qrel, self.params.erp(), cfm);
    }
}
