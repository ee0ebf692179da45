//! Core types for the joint constraint engine.
//!
//! This crate provides the foundational data shared by the joint core and
//! the world/stepper:
//!
//! - [`RigidBodyState`] - Position, orientation, cached rotation matrix and
//!   velocity of a rigid body
//! - [`BodyId`], [`JointId`], [`WorldId`] - Generational handles into a world
//! - [`MassProperties`] - Mass and inertia
//! - [`SimulationConfig`], [`SolverConfig`], [`ConstraintDefaults`] - Timestep,
//!   gravity, global ERP/CFM
//! - [`SimError`] - The error taxonomy used by every `sim-*` crate
//!
//! # Design Philosophy
//!
//! These types are **pure data**. They carry no joint math and no stepping
//! logic; `sim-constraint` reads them and `sim-core` owns them.
//!
//! # Coordinate System
//!
//! - X: right
//! - Y: forward
//! - Z: up
//! - Right-handed
//!
//! # Example
//!
//! ```
//! use sim_types::{Pose, RigidBodyState, Twist};
//! use nalgebra::{Point3, Vector3};
//!
//! let state = RigidBodyState::new(
//!     Pose::from_position(Point3::new(0.0, 0.0, 1.0)),
//!     Twist::linear(Vector3::new(1.0, 0.0, 0.0)),
//! );
//!
//! assert_eq!(state.position().z, 1.0);
//! assert_eq!(state.linear_velocity().x, 1.0);
//! ```

#![doc(html_root_url = "https://docs.rs/sim-types/0.7.0")]
#![deny(clippy::unwrap_used, clippy::expect_used)]
#![warn(missing_docs)]
#![allow(
    clippy::missing_const_for_fn,     // Many methods can't be const due to nalgebra
    clippy::suboptimal_flops,          // mul_add style changes aren't always clearer
    clippy::missing_errors_doc,        // Error docs added where non-obvious
)]

mod body;
mod config;
mod error;
mod joint;

pub use body::{BodyId, MassProperties, Pose, RigidBodyState, Twist, WorldId};
pub use config::{
    ConstraintDefaults, Gravity, SimulationConfig, SolverConfig, DEFAULT_CFM, DEFAULT_ERP,
};
pub use error::SimError;
pub use joint::JointId;

// Re-export math types for convenience
pub use nalgebra::{Matrix3, Point3, UnitQuaternion, Vector3};

/// Result type for simulation operations.
pub type Result<T> = std::result::Result<T, SimError>;
