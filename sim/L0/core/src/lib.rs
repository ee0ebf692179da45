//! World storage and stepping for the joint constraint engine.
//!
//! A [`World`] owns bodies and joints in generational arenas and hands out
//! [`BodyId`](sim_types::BodyId) / [`JointId`](sim_types::JointId) handles.
//! Joints reference bodies only by handle; the world lends the joint a
//! [`BodyPair`](sim_constraint::BodyPair) whenever an operation needs body
//! state. The [`Stepper`] turns every enabled joint into constraint rows,
//! solves them with [`PgsSolver`] and integrates.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                          World                              │
//! │  Bodies and joints (arenas), attachments, adjacency lists   │
//! └─────────────────────────┬───────────────────────────────────┘
//!                           │ row_count / fill_rows
//!                           ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                         Stepper                             │
//! │  Count → fill → v* → PGS (J M⁻¹ Jᵀ + cfm/h) λ → integrate   │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Layer 0 Crate
//!
//! This is a Layer 0 crate with **zero Bevy dependencies**. It can be used in:
//!
//! - Headless training loops
//! - Hardware control code
//! - Analysis tools
//! - Other engines
//!
//! # Quick Start
//!
//! ```
//! use sim_core::{Stepper, World};
//! use sim_constraint::{Joint, JointType};
//! use sim_types::{MassProperties, Pose, RigidBodyState, SimulationConfig};
//! use nalgebra::{Point3, Vector3};
//!
//! let mut world = World::new(SimulationConfig::realtime());
//! let base = world.add_static_body(Pose::identity());
//! let arm = world.add_body(
//!     RigidBodyState::at_rest(Pose::from_position(Point3::new(0.0, 0.0, 1.0))),
//!     MassProperties::box_shape(2.0, Vector3::new(0.1, 0.1, 0.5)),
//! );
//!
//! let hinge = world.create_joint(JointType::Revolute);
//! world.attach(hinge, Some(arm), Some(base)).unwrap();
//! {
//!     let (joint, bodies) = world.joint_and_bodies_mut(hinge).unwrap();
//!     let revolute = joint.as_revolute_mut().unwrap();
//!     revolute.set_anchor(&bodies, Vector3::zeros()).unwrap();
//!     revolute.set_axis(&bodies, Vector3::x()).unwrap();
//!     joint.set_stops(1, -0.5, 0.5).unwrap();
//! }
//!
//! let mut stepper = Stepper::new();
//! for _ in 0..100 {
//!     stepper.step(&mut world).unwrap();
//! }
//! assert!(world.time() > 1.6);
//! ```

#![doc(html_root_url = "https://docs.rs/sim-core/0.7.0")]
#![deny(clippy::unwrap_used, clippy::expect_used)]
#![warn(missing_docs)]
#![allow(
    clippy::missing_const_for_fn,       // Many methods can't be const due to nalgebra
    clippy::suboptimal_flops,           // mul_add style changes aren't always clearer
    clippy::too_many_lines,             // Physics functions naturally have many steps
    clippy::doc_markdown,               // Not all technical terms need backticks
)]

// Generational slot storage
mod arena;

// Time integration helpers
pub mod integrators;

// Projected Gauss-Seidel solver
pub mod pgs;

// Step driver
mod stepper;

// Body and joint storage
mod world;

pub use pgs::{PgsReport, PgsSolver};
pub use stepper::{JointFeedback, StepReport, Stepper, StepperConfig};
pub use world::{Body, World};
