//! Time integration of rigid body state.
//!
//! The stepper integrates in two halves so constraint impulses can be applied
//! in between:
//!
//! ```text
//! v* = v + a * dt                 (integrate_velocity)
//! v  = v* + M⁻¹ Jᵀ λ * dt         (constraint solve, in the stepper)
//! x  = x + v * dt                 (integrate_position)
//! ```
//!
//! Angular velocity is expressed in world coordinates, so the orientation
//! update premultiplies the incremental rotation.
//!
//! # Example
//!
//! ```
//! use sim_core::integrators::SemiImplicitEuler;
//! use sim_types::{Pose, RigidBodyState};
//! use nalgebra::{Point3, Vector3};
//!
//! let mut state = RigidBodyState::at_rest(Pose::from_position(Point3::new(0.0, 0.0, 10.0)));
//! let gravity = Vector3::new(0.0, 0.0, -9.81);
//!
//! SemiImplicitEuler::integrate(&mut state, gravity, Vector3::zeros(), 0.01);
//!
//! assert!(state.position().z < 10.0);
//! assert!(state.linear_velocity().z < 0.0);
//! ```

use nalgebra::{UnitQuaternion, Vector3};
use sim_types::{RigidBodyState, Twist};

/// Semi-implicit Euler integration (symplectic Euler).
///
/// Updates velocity first, then uses the new velocity for position.
///
/// ```text
/// v(t+dt) = v(t) + a(t) * dt
/// x(t+dt) = x(t) + v(t+dt) * dt
/// ```
pub struct SemiImplicitEuler;

impl SemiImplicitEuler {
    /// Full step: velocity then pose.
    pub fn integrate(
        state: &mut RigidBodyState,
        linear_accel: Vector3<f64>,
        angular_accel: Vector3<f64>,
        dt: f64,
    ) {
        Self::integrate_velocity(state, linear_accel, angular_accel, dt);
        Self::integrate_position(state, dt);
    }

    /// Advance velocities by the given accelerations.
    pub fn integrate_velocity(
        state: &mut RigidBodyState,
        linear_accel: Vector3<f64>,
        angular_accel: Vector3<f64>,
        dt: f64,
    ) {
        state.twist.linear += linear_accel * dt;
        state.twist.angular += angular_accel * dt;
    }

    /// Advance the pose with the current velocities.
    ///
    /// The orientation is renormalized and the rotation matrix refreshed.
    pub fn integrate_position(state: &mut RigidBodyState, dt: f64) {
        let position = state.position() + state.linear_velocity() * dt;
        state.set_position(position);

        let rotation = integrate_rotation(&state.orientation(), &state.angular_velocity(), dt);
        state.set_orientation(rotation);
    }
}

/// Rotate `rotation` by the world-frame angular velocity `omega` over `dt`.
///
/// ```text
/// q(t+dt) = exp(omega * dt) * q(t)
/// ```
fn integrate_rotation(
    rotation: &UnitQuaternion<f64>,
    omega: &Vector3<f64>,
    dt: f64,
) -> UnitQuaternion<f64> {
    if omega.norm() < 1e-12 {
        return *rotation;
    }
    UnitQuaternion::from_scaled_axis(omega * dt) * rotation
}

/// Exponential velocity damping.
#[must_use]
pub fn apply_damping(twist: &Twist, linear_damping: f64, angular_damping: f64, dt: f64) -> Twist {
    let linear_factor = (-linear_damping * dt).exp();
    let angular_factor = (-angular_damping * dt).exp();

    Twist::new(twist.linear * linear_factor, twist.angular * angular_factor)
}

/// Clamp velocities to maximum magnitudes.
#[must_use]
pub fn clamp_velocities(twist: &Twist, max_linear: f64, max_angular: f64) -> Twist {
    let clamp = |v: Vector3<f64>, max: f64| {
        let norm = v.norm();
        if norm > max && norm > 1e-10 {
            v * (max / norm)
        } else {
            v
        }
    };
    Twist::new(clamp(twist.linear, max_linear), clamp(twist.angular, max_angular))
}
