//! Linear motor: drives relative linear velocity along up to three axes.

use nalgebra::Vector3;
use sim_types::{ConstraintDefaults, SimError};
use tracing::debug;

use super::{Joint, JointType};
use crate::attachment::BodyPair;
use crate::limits::AxisKind;
use crate::math::normalize_axis;
use crate::params::{ParamScope, ParamSet};
use crate::rows::{RowCount, RowWriter};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

const NAME: &str = JointType::LinearMotor.name();
const MAX_AXES: usize = 3;

/// Frame an axis direction is anchored to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum AxisFrame {
    /// Fixed in the world.
    #[default]
    World,
    /// Rotates with body 1.
    First,
    /// Rotates with body 2.
    Second,
}

/// A motor joint without locking rows.
///
/// Each active axis carries a velocity motor (`Vel`, `FMax`) and produces a
/// row only while its `FMax` is positive. Stops are not supported.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct LinearMotorJoint {
    params: ParamSet,
    num_axes: usize,
    frames: [AxisFrame; MAX_AXES],
    /// Directions in the coordinates of their frame; `None` until set.
    axes: [Option<Vector3<f64>>; MAX_AXES],
}

impl LinearMotorJoint {
    /// Create an unattached motor with no active axes.
    #[must_use]
    pub fn new(defaults: &ConstraintDefaults) -> Self {
        Self {
            params: ParamSet::new(NAME, ParamScope::Motor, MAX_AXES, defaults),
            num_axes: 0,
            frames: [AxisFrame::World; MAX_AXES],
            axes: [None; MAX_AXES],
        }
    }

    /// Number of active axes.
    #[must_use]
    pub fn num_axes(&self) -> usize {
        self.num_axes
    }

    /// Activate the first `num` axes (0..=3).
    pub fn set_num_axes(&mut self, num: usize) -> sim_types::Result<()> {
        if num > MAX_AXES {
            return Err(SimError::InvalidAxis {
                joint: NAME,
                axis: num,
                max: MAX_AXES,
            });
        }
        self.num_axes = num;
        Ok(())
    }

    /// Set axis `index` (1-based) to the world direction `axis`, anchored to
    /// `frame`.
    ///
    /// A [`AxisFrame::Second`] axis on a joint without a second body is
    /// anchored to body 1 instead.
    pub fn set_axis(
        &mut self,
        bodies: &BodyPair<'_>,
        index: usize,
        frame: AxisFrame,
        axis: Vector3<f64>,
    ) -> sim_types::Result<()> {
        let slot = slot(index)?;
        let (first, second) = bodies.require(NAME)?;
        let axis = normalize_axis(&axis)?;

        let (frame, local) = match (frame, second) {
            (AxisFrame::World, _) => (AxisFrame::World, axis),
            (AxisFrame::First, _) => (AxisFrame::First, first.vector_to_local(&axis)),
            (AxisFrame::Second, Some(second)) => (AxisFrame::Second, second.vector_to_local(&axis)),
            (AxisFrame::Second, None) => {
                debug!(axis = index, "no second body, anchoring linear motor axis to the first body");
                (AxisFrame::First, first.vector_to_local(&axis))
            }
        };
        self.frames[slot] = frame;
        self.axes[slot] = Some(local);
        Ok(())
    }

    /// World direction of axis `index` (1-based).
    pub fn axis(&self, bodies: &BodyPair<'_>, index: usize) -> sim_types::Result<Vector3<f64>> {
        let slot = slot(index)?;
        let (first, second) = bodies.require(NAME)?;
        let local = self.axes[slot].ok_or(SimError::AxisNotSet {
            joint: NAME,
            axis: index,
        })?;
        Ok(match self.frames[slot] {
            AxisFrame::World => local,
            AxisFrame::First => first.vector_to_world(&local),
            AxisFrame::Second => second.map_or(local, |b| b.vector_to_world(&local)),
        })
    }

    /// Frame of axis `index` (1-based).
    pub fn axis_frame(&self, index: usize) -> sim_types::Result<AxisFrame> {
        Ok(self.frames[slot(index)?])
    }

    /// Slots that produce a row: active, set and powered.
    fn driven_axes<'a>(&'a self, bodies: &'a BodyPair<'a>) -> impl Iterator<Item = (usize, Vector3<f64>)> + 'a {
        (0..self.num_axes)
            .filter(|&slot| self.params.motor(slot).is_powered())
            .filter_map(move |slot| self.axis(bodies, slot + 1).ok().map(|axis| (slot, axis)))
    }
}

fn slot(index: usize) -> sim_types::Result<usize> {
    if (1..=MAX_AXES).contains(&index) {
        Ok(index - 1)
    } else {
        Err(SimError::InvalidAxis {
            joint: NAME,
            axis: index,
            max: MAX_AXES,
        })
    }
}

impl Joint for LinearMotorJoint {
    fn joint_type(&self) -> JointType {
        JointType::LinearMotor
    }

    fn params(&self) -> &ParamSet {
        &self.params
    }

    fn params_mut(&mut self) -> &mut ParamSet {
        &mut self.params
    }

    fn set_relative_values(&mut self, _bodies: &BodyPair<'_>) {}

    fn row_count(&mut self, bodies: &BodyPair<'_>) -> RowCount {
        if !bodies.is_attached() {
            return RowCount::none();
        }
        RowCount::new(self.driven_axes(bodies).count(), 0)
    }

    fn fill_rows(&self, bodies: &BodyPair<'_>, rows: &mut RowWriter<'_>) {
        let mut index = 0;
        for (slot, axis) in self.driven_axes(bodies) {
            index += self
                .params
                .motor(slot)
                .add_row(rows, index, &axis, AxisKind::Linear, bodies);
        }
    }
}
