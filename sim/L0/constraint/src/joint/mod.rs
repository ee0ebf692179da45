//! Joint variants and the two-phase row protocol they share.
//!
//! Every variant stores its geometry relative to the bodies it was set up
//! against (body-local anchors and axes, a reference rotation `qrel`) and
//! turns it into constraint rows on demand:
//!
//! 1. [`Joint::row_count`] evaluates stop activity from the current body
//!    state and reports how many rows are needed.
//! 2. [`Joint::fill_rows`] writes exactly that many rows.
//!
//! Bodies are never owned by a joint. Every operation that needs them takes
//! a [`BodyPair`] borrowed from the world for the duration of the call.
//!
//! # Example
//!
//! ```
//! use sim_constraint::{BodyPair, Joint, RevoluteJoint, RowBlock};
//! use sim_types::{ConstraintDefaults, RigidBodyState};
//! use nalgebra::Vector3;
//!
//! let body = RigidBodyState::default();
//! let bodies = BodyPair::to_world(&body);
//!
//! let mut hinge = RevoluteJoint::new(&ConstraintDefaults::default());
//! hinge.set_relative_values(&bodies);
//! hinge.set_anchor(&bodies, Vector3::new(0.0, 0.0, 1.0)).unwrap();
//! hinge.set_axis(&bodies, Vector3::y()).unwrap();
//!
//! let block = RowBlock::assemble(&mut hinge, &bodies, 60.0);
//! assert_eq!(block.count.total, 5);
//! ```

mod common;
mod fixed;
mod linear_motor;
mod prismatic;
mod prismatic_revolute;
mod revolute;
mod spherical;
mod universal;

pub use fixed::FixedJoint;
pub use linear_motor::{AxisFrame, LinearMotorJoint};
pub use prismatic::PrismaticJoint;
pub use prismatic_revolute::PrismaticRevoluteJoint;
pub use revolute::RevoluteJoint;
pub use spherical::SphericalJoint;
pub use universal::UniversalJoint;

use sim_types::{ConstraintDefaults, SimError};

use crate::attachment::BodyPair;
use crate::params::{ParamId, ParamKind, ParamSet};
use crate::rows::{RowCount, RowWriter, WrenchPair};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Kind of joint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum JointType {
    /// Fixed joint (0 DOF) - rigid weld.
    Fixed,
    /// Spherical joint (3 DOF) - ball and socket.
    Spherical,
    /// Revolute joint (1 DOF) - hinge.
    Revolute,
    /// Prismatic joint (1 DOF) - slider.
    Prismatic,
    /// Universal joint (2 DOF) - two perpendicular hinges.
    Universal,
    /// Prismatic-revolute joint (2 DOF) - slider followed by a hinge.
    PrismaticRevolute,
    /// Linear motor (6 DOF) - drives relative velocity, locks nothing.
    LinearMotor,
}

impl JointType {
    /// Every joint type.
    pub const ALL: [Self; 7] = [
        Self::Fixed,
        Self::Spherical,
        Self::Revolute,
        Self::Prismatic,
        Self::Universal,
        Self::PrismaticRevolute,
        Self::LinearMotor,
    ];

    /// Human-readable name, also used in error messages.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Fixed => "fixed",
            Self::Spherical => "spherical",
            Self::Revolute => "revolute",
            Self::Prismatic => "prismatic",
            Self::Universal => "universal",
            Self::PrismaticRevolute => "prismatic-revolute",
            Self::LinearMotor => "linear motor",
        }
    }

    /// Get the number of degrees of freedom for this joint type.
    #[must_use]
    pub const fn dof(self) -> usize {
        match self {
            Self::Fixed => 0,
            Self::Revolute | Self::Prismatic => 1,
            Self::Universal | Self::PrismaticRevolute => 2,
            Self::Spherical => 3,
            Self::LinearMotor => 6,
        }
    }

    /// Get the number of constrained DOF (6 - dof).
    #[must_use]
    pub const fn constrained_dof(self) -> usize {
        6 - self.dof()
    }

    /// Number of parameter axes.
    #[must_use]
    pub const fn axis_count(self) -> usize {
        match self {
            Self::Fixed | Self::Spherical | Self::Revolute | Self::Prismatic => 1,
            Self::Universal | Self::PrismaticRevolute => 2,
            Self::LinearMotor => 3,
        }
    }

    /// Number of scalar efforts accepted by [`Joint::effort_wrench`].
    #[must_use]
    pub const fn effort_count(self) -> usize {
        match self {
            Self::Fixed | Self::Spherical | Self::LinearMotor => 0,
            Self::Revolute | Self::Prismatic => 1,
            Self::Universal | Self::PrismaticRevolute => 2,
        }
    }
}

impl std::fmt::Display for JointType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Behavior shared by every joint variant.
pub trait Joint {
    /// Get the joint type.
    fn joint_type(&self) -> JointType;

    /// Joint parameters.
    fn params(&self) -> &ParamSet;

    /// Mutable joint parameters.
    fn params_mut(&mut self) -> &mut ParamSet;

    /// Re-store the joint geometry against newly attached bodies.
    ///
    /// The current world-space anchors and axes are read back and recorded
    /// against `bodies`, and reference rotations are recomputed, so the
    /// configuration at attachment time satisfies the joint.
    fn set_relative_values(&mut self, bodies: &BodyPair<'_>);

    /// Phase 1: number of rows needed this step.
    ///
    /// Stop activity is evaluated here from the current body state and kept
    /// for [`fill_rows`](Self::fill_rows). A detached joint needs no rows.
    fn row_count(&mut self, bodies: &BodyPair<'_>) -> RowCount;

    /// Phase 2: write the rows counted by the preceding
    /// [`row_count`](Self::row_count) call.
    fn fill_rows(&self, bodies: &BodyPair<'_>, rows: &mut RowWriter<'_>);

    /// Convert scalar joint efforts (force along or torque about each free
    /// axis) into the wrenches they apply to the two bodies.
    fn effort_wrench(&self, bodies: &BodyPair<'_>, efforts: &[f64]) -> sim_types::Result<WrenchPair> {
        let _ = (bodies, efforts);
        Err(SimError::UnsupportedOperation {
            joint: self.joint_type().name(),
            operation: "effort_wrench",
        })
    }

    /// Get the number of degrees of freedom.
    fn dof(&self) -> usize {
        self.joint_type().dof()
    }

    /// Get the number of constrained DOF.
    fn constrained_dof(&self) -> usize {
        self.joint_type().constrained_dof()
    }

    /// Read a parameter.
    fn param(&self, id: ParamId) -> sim_types::Result<f64> {
        self.params().get(id)
    }

    /// Write a parameter.
    fn set_param(&mut self, id: ParamId, value: f64) -> sim_types::Result<()> {
        self.params_mut().set(id, value)
    }

    /// Lower stop of `axis`.
    fn lo_stop(&self, axis: usize) -> sim_types::Result<f64> {
        self.param(ParamId::new(ParamKind::LoStop, axis))
    }

    /// Upper stop of `axis`.
    fn hi_stop(&self, axis: usize) -> sim_types::Result<f64> {
        self.param(ParamId::new(ParamKind::HiStop, axis))
    }

    /// Set both stops of `axis`.
    fn set_stops(&mut self, axis: usize, lo: f64, hi: f64) -> sim_types::Result<()> {
        self.set_param(ParamId::new(ParamKind::LoStop, axis), lo)?;
        self.set_param(ParamId::new(ParamKind::HiStop, axis), hi)
    }

    /// Motor target velocity of `axis`.
    fn vel(&self, axis: usize) -> sim_types::Result<f64> {
        self.param(ParamId::new(ParamKind::Vel, axis))
    }

    /// Set the motor target velocity of `axis`.
    fn set_vel(&mut self, axis: usize, vel: f64) -> sim_types::Result<()> {
        self.set_param(ParamId::new(ParamKind::Vel, axis), vel)
    }

    /// Motor force limit of `axis`.
    fn fmax(&self, axis: usize) -> sim_types::Result<f64> {
        self.param(ParamId::new(ParamKind::FMax, axis))
    }

    /// Set the motor force limit of `axis`.
    fn set_fmax(&mut self, axis: usize, fmax: f64) -> sim_types::Result<()> {
        self.set_param(ParamId::new(ParamKind::FMax, axis), fmax)
    }

    /// Set velocity and force limit of the motor on `axis`.
    fn set_motor(&mut self, axis: usize, vel: f64, fmax: f64) -> sim_types::Result<()> {
        self.set_vel(axis, vel)?;
        self.set_fmax(axis, fmax)
    }

    /// Stop restitution of `axis`.
    fn bounce(&self, axis: usize) -> sim_types::Result<f64> {
        self.param(ParamId::new(ParamKind::Bounce, axis))
    }

    /// Set the stop restitution of `axis`.
    fn set_bounce(&mut self, axis: usize, bounce: f64) -> sim_types::Result<()> {
        self.set_param(ParamId::new(ParamKind::Bounce, axis), bounce)
    }

    /// Error reduction of `axis`.
    fn erp(&self, axis: usize) -> sim_types::Result<f64> {
        self.param(ParamId::new(ParamKind::Erp, axis))
    }

    /// Set the error reduction of `axis`.
    fn set_erp(&mut self, axis: usize, erp: f64) -> sim_types::Result<()> {
        self.set_param(ParamId::new(ParamKind::Erp, axis), erp)
    }

    /// Constraint force mixing of `axis`.
    fn cfm(&self, axis: usize) -> sim_types::Result<f64> {
        self.param(ParamId::new(ParamKind::Cfm, axis))
    }

    /// Set the constraint force mixing of `axis`.
    fn set_cfm(&mut self, axis: usize, cfm: f64) -> sim_types::Result<()> {
        self.set_param(ParamId::new(ParamKind::Cfm, axis), cfm)
    }
}

/// Any joint variant, as stored by a world.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum AnyJoint {
    /// Fixed joint.
    Fixed(FixedJoint),
    /// Spherical joint.
    Spherical(SphericalJoint),
    /// Revolute joint.
    Revolute(RevoluteJoint),
    /// Prismatic joint.
    Prismatic(PrismaticJoint),
    /// Universal joint.
    Universal(UniversalJoint),
    /// Prismatic-revolute joint.
    PrismaticRevolute(PrismaticRevoluteJoint),
    /// Linear motor.
    LinearMotor(LinearMotorJoint),
}

macro_rules! dispatch {
    ($self:expr, $joint:ident => $body:expr) => {
        match $self {
            AnyJoint::Fixed($joint) => $body,
            AnyJoint::Spherical($joint) => $body,
            AnyJoint::Revolute($joint) => $body,
            AnyJoint::Prismatic($joint) => $body,
            AnyJoint::Universal($joint) => $body,
            AnyJoint::PrismaticRevolute($joint) => $body,
            AnyJoint::LinearMotor($joint) => $body,
        }
    };
}

macro_rules! variant_access {
    ($($variant:ident($ty:ident) => $as_ref:ident, $as_mut:ident;)*) => {
        impl AnyJoint {
            $(
                #[doc = concat!("Borrow as a [`", stringify!($ty), "`].")]
                pub fn $as_ref(&self) -> sim_types::Result<&$ty> {
                    match self {
                        Self::$variant(joint) => Ok(joint),
                        other => Err(other.mismatch(JointType::$variant)),
                    }
                }

                #[doc = concat!("Mutably borrow as a [`", stringify!($ty), "`].")]
                pub fn $as_mut(&mut self) -> sim_types::Result<&mut $ty> {
                    match self {
                        Self::$variant(joint) => Ok(joint),
                        other => Err(other.mismatch(JointType::$variant)),
                    }
                }
            )*
        }

        $(
            impl From<$ty> for AnyJoint {
                fn from(joint: $ty) -> Self {
                    Self::$variant(joint)
                }
            }
        )*
    };
}

variant_access! {
    Fixed(FixedJoint) => as_fixed, as_fixed_mut;
    Spherical(SphericalJoint) => as_spherical, as_spherical_mut;
    Revolute(RevoluteJoint) => as_revolute, as_revolute_mut;
    Prismatic(PrismaticJoint) => as_prismatic, as_prismatic_mut;
    Universal(UniversalJoint) => as_universal, as_universal_mut;
    PrismaticRevolute(PrismaticRevoluteJoint) => as_prismatic_revolute, as_prismatic_revolute_mut;
    LinearMotor(LinearMotorJoint) => as_linear_motor, as_linear_motor_mut;
}

impl AnyJoint {
    /// Construct an unattached joint of `joint_type` with parameters
    /// captured from `defaults`.
    #[must_use]
    pub fn new(joint_type: JointType, defaults: &ConstraintDefaults) -> Self {
        match joint_type {
            JointType::Fixed => FixedJoint::new(defaults).into(),
            JointType::Spherical => SphericalJoint::new(defaults).into(),
            JointType::Revolute => RevoluteJoint::new(defaults).into(),
            JointType::Prismatic => PrismaticJoint::new(defaults).into(),
            JointType::Universal => UniversalJoint::new(defaults).into(),
            JointType::PrismaticRevolute => PrismaticRevoluteJoint::new(defaults).into(),
            JointType::LinearMotor => LinearMotorJoint::new(defaults).into(),
        }
    }

    fn mismatch(&self, expected: JointType) -> SimError {
        SimError::JointTypeMismatch {
            expected: expected.name(),
            actual: self.joint_type().name(),
        }
    }
}

impl Joint for AnyJoint {
    fn joint_type(&self) -> JointType {
        dispatch!(self, j => j.joint_type())
    }

    fn params(&self) -> &ParamSet {
        dispatch!(self, j => j.params())
    }

    fn params_mut(&mut self) -> &mut ParamSet {
        dispatch!(self, j => j.params_mut())
    }

    fn set_relative_values(&mut self, bodies: &BodyPair<'_>) {
        dispatch!(self, j => j.set_relative_values(bodies));
    }

    fn row_count(&mut self, bodies: &BodyPair<'_>) -> RowCount {
        dispatch!(self, j => j.row_count(bodies))
    }

    fn fill_rows(&self, bodies: &BodyPair<'_>, rows: &mut RowWriter<'_>) {
        dispatch!(self, j => j.fill_rows(bodies, rows));
    }

    fn effort_wrench(&self, bodies: &BodyPair<'_>, efforts: &[f64]) -> sim_types::Result<WrenchPair> {
        dispatch!(self, j => j.effort_wrench(bodies, efforts))
    }
}
