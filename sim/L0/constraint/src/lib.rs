//! Joint constraints for rigid-body simulation.
//!
//! This crate turns joints between rigid bodies into constraint rows for a
//! velocity-level solver:
//!
//! - [`Joint`] - The two-phase row protocol every variant implements
//! - [`FixedJoint`], [`SphericalJoint`], [`RevoluteJoint`], [`PrismaticJoint`],
//!   [`UniversalJoint`], [`PrismaticRevoluteJoint`], [`LinearMotorJoint`] -
//!   The joint variants, plus [`AnyJoint`] to store them uniformly
//! - [`ParamSet`] - Per-axis stops, motors and ERP/CFM captured from the
//!   world defaults at creation
//! - [`LimitMotor`] - Stop and motor row generation for one axis
//! - [`ConstraintRow`], [`RowBlock`] - Jacobian rows, right-hand side, CFM
//!   and bounds
//!
//! # Row Convention
//!
//! Each row constrains `J1l·v1 + J1a·ω1 + J2l·v2 + J2a·ω2` to equal `rhs`,
//! with the force multiplier clamped to the row bounds. A joint attached to
//! a single body constrains it against the static world and leaves the
//! body-2 Jacobian blocks zero.
//!
//! # Example
//!
//! ```
//! use sim_constraint::{BodyPair, Joint, PrismaticJoint, RowBlock};
//! use sim_types::{ConstraintDefaults, RigidBodyState};
//! use nalgebra::Vector3;
//!
//! let body = RigidBodyState::default();
//! let bodies = BodyPair::to_world(&body);
//!
//! let mut slider = PrismaticJoint::new(&ConstraintDefaults::default());
//! slider.set_relative_values(&bodies);
//! slider.set_axis(&bodies, Vector3::z()).unwrap();
//! slider.set_stops(1, -0.5, 0.5).unwrap();
//!
//! let block = RowBlock::assemble(&mut slider, &bodies, 60.0);
//! assert_eq!(block.count.total, 5);
//! ```

#![doc(html_root_url = "https://docs.rs/sim-constraint/0.7.0")]
#![deny(clippy::unwrap_used, clippy::expect_used)]
#![warn(missing_docs)]
#![allow(
    clippy::missing_const_for_fn,     // Many methods can't be const due to nalgebra
    clippy::suboptimal_flops,          // mul_add style changes aren't always clearer
    clippy::missing_errors_doc,        // Error docs added where non-obvious
)]

mod attachment;
mod joint;
mod limits;
pub mod math;
mod params;
mod rows;

pub use attachment::{Attachment, BodyPair, JointNode};
pub use joint::{
    AnyJoint, AxisFrame, FixedJoint, Joint, JointType, LinearMotorJoint, PrismaticJoint,
    PrismaticRevoluteJoint, RevoluteJoint, SphericalJoint, UniversalJoint,
};
pub use limits::{AxisKind, LimitMotor, LimitState};
pub use params::{ParamId, ParamKind, ParamScope, ParamSet};
pub use rows::{ConstraintRow, RowBlock, RowBounds, RowCount, RowWriter, Wrench, WrenchPair};
