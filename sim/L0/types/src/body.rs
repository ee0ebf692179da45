//! Rigid body state types.
//!
//! A body is described by its pose (position + unit quaternion), its twist
//! (linear + angular velocity) and a rotation matrix derived from the
//! quaternion. Joints read the matrix on every row fill, so the state keeps
//! it consistent with the quaternion on every orientation change.

use std::sync::atomic::{AtomicU32, Ordering};

use nalgebra::{Matrix3, Point3, UnitQuaternion, Vector3};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

static NEXT_WORLD_ID: AtomicU32 = AtomicU32::new(1);

/// Identifier of a simulation world.
///
/// Every handle issued by a world carries its `WorldId`, which lets the world
/// reject bodies and joints that belong to another world.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct WorldId(u32);

impl WorldId {
    /// Allocate a process-unique world identifier.
    #[must_use]
    pub fn next() -> Self {
        Self(NEXT_WORLD_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw ID value.
    #[must_use]
    pub const fn raw(self) -> u32 {
        self.0
    }
}

impl std::fmt::Display for WorldId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "World({})", self.0)
    }
}

/// Handle to a rigid body stored in a world arena.
///
/// The generation distinguishes a live body from an earlier body that
/// occupied the same slot and has since been destroyed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct BodyId {
    world: WorldId,
    index: u32,
    generation: u32,
}

impl BodyId {
    /// Create a body handle. Worlds call this; applications receive handles
    /// from `World::add_body`.
    #[must_use]
    pub const fn new(world: WorldId, index: u32, generation: u32) -> Self {
        Self {
            world,
            index,
            generation,
        }
    }

    /// World that issued this handle.
    #[must_use]
    pub const fn world(self) -> WorldId {
        self.world
    }

    /// Arena slot index.
    #[must_use]
    pub const fn index(self) -> u32 {
        self.index
    }

    /// Slot generation at the time the handle was issued.
    #[must_use]
    pub const fn generation(self) -> u32 {
        self.generation
    }
}

impl std::fmt::Display for BodyId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Body({}v{})", self.index, self.generation)
    }
}

/// Position and orientation of a rigid body.
///
/// # Example
///
/// ```
/// use sim_types::Pose;
/// use nalgebra::Point3;
///
/// let pose = Pose::from_position(Point3::new(1.0, 2.0, 3.0));
/// let world = pose.transform_point(&Point3::new(1.0, 0.0, 0.0));
/// assert_eq!(world, Point3::new(2.0, 2.0, 3.0));
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Pose {
    /// Position in world coordinates.
    pub position: Point3<f64>,
    /// Orientation as a unit quaternion.
    pub rotation: UnitQuaternion<f64>,
}

impl Default for Pose {
    fn default() -> Self {
        Self::identity()
    }
}

impl Pose {
    /// Create an identity pose (origin, no rotation).
    #[must_use]
    pub fn identity() -> Self {
        Self {
            position: Point3::origin(),
            rotation: UnitQuaternion::identity(),
        }
    }

    /// Create a pose from position only (identity rotation).
    #[must_use]
    pub fn from_position(position: Point3<f64>) -> Self {
        Self {
            position,
            rotation: UnitQuaternion::identity(),
        }
    }

    /// Create a pose from position and rotation.
    #[must_use]
    pub const fn from_position_rotation(
        position: Point3<f64>,
        rotation: UnitQuaternion<f64>,
    ) -> Self {
        Self { position, rotation }
    }

    /// Transform a point from local to world coordinates.
    #[must_use]
    pub fn transform_point(&self, local: &Point3<f64>) -> Point3<f64> {
        self.position + self.rotation * local.coords
    }

    /// Transform a vector from local to world coordinates (rotation only).
    #[must_use]
    pub fn transform_vector(&self, local: &Vector3<f64>) -> Vector3<f64> {
        self.rotation * local
    }

    /// Check if the pose contains `NaN` or `Inf` values.
    #[must_use]
    pub fn is_finite(&self) -> bool {
        self.position.coords.iter().all(|x| x.is_finite())
            && self.rotation.coords.iter().all(|x| x.is_finite())
    }
}

/// Linear and angular velocity of a rigid body, both in world coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Twist {
    /// Linear velocity of the body origin (m/s).
    pub linear: Vector3<f64>,
    /// Angular velocity (rad/s).
    pub angular: Vector3<f64>,
}

impl Default for Twist {
    fn default() -> Self {
        Self::zero()
    }
}

impl Twist {
    /// Create a twist with specified linear and angular velocity.
    #[must_use]
    pub const fn new(linear: Vector3<f64>, angular: Vector3<f64>) -> Self {
        Self { linear, angular }
    }

    /// Create a zero twist (at rest).
    #[must_use]
    pub fn zero() -> Self {
        Self::new(Vector3::zeros(), Vector3::zeros())
    }

    /// Create a twist with linear velocity only.
    #[must_use]
    pub fn linear(v: Vector3<f64>) -> Self {
        Self::new(v, Vector3::zeros())
    }

    /// Create a twist with angular velocity only.
    #[must_use]
    pub fn angular(omega: Vector3<f64>) -> Self {
        Self::new(Vector3::zeros(), omega)
    }

    /// Velocity of a point at `offset` (world frame) from the body origin.
    ///
    /// `v_point` = `v_linear` + omega × r
    #[must_use]
    pub fn velocity_at_point(&self, offset: &Vector3<f64>) -> Vector3<f64> {
        self.linear + self.angular.cross(offset)
    }

    /// Check if the twist contains `NaN` or `Inf` values.
    #[must_use]
    pub fn is_finite(&self) -> bool {
        self.linear.iter().all(|x| x.is_finite()) && self.angular.iter().all(|x| x.is_finite())
    }
}

/// Complete state of a rigid body.
///
/// The pose is private so that the cached rotation matrix can never drift
/// from the quaternion: every setter refreshes it.
///
/// # Example
///
/// ```
/// use sim_types::{Pose, RigidBodyState};
/// use nalgebra::{Point3, UnitQuaternion, Vector3};
///
/// let mut state = RigidBodyState::at_rest(Pose::from_position(Point3::new(0.0, 0.0, 1.0)));
/// state.set_orientation(UnitQuaternion::from_axis_angle(&Vector3::z_axis(), 0.5));
///
/// let x = state.rotation_matrix() * Vector3::x();
/// assert!((x.y - 0.5_f64.sin()).abs() < 1e-12);
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct RigidBodyState {
    pose: Pose,
    rotation: Matrix3<f64>,
    /// Linear and angular velocity.
    pub twist: Twist,
}

impl Default for RigidBodyState {
    fn default() -> Self {
        Self::new(Pose::identity(), Twist::zero())
    }
}

impl RigidBodyState {
    /// Create a state from pose and twist.
    #[must_use]
    pub fn new(pose: Pose, twist: Twist) -> Self {
        Self {
            rotation: pose.rotation.to_rotation_matrix().into_inner(),
            pose,
            twist,
        }
    }

    /// Create a state at rest at the given pose.
    #[must_use]
    pub fn at_rest(pose: Pose) -> Self {
        Self::new(pose, Twist::zero())
    }

    /// Current pose.
    #[must_use]
    pub fn pose(&self) -> &Pose {
        &self.pose
    }

    /// Position of the body origin.
    #[must_use]
    pub fn position(&self) -> Point3<f64> {
        self.pose.position
    }

    /// Orientation quaternion.
    #[must_use]
    pub fn orientation(&self) -> UnitQuaternion<f64> {
        self.pose.rotation
    }

    /// Rotation matrix derived from the orientation.
    #[must_use]
    pub fn rotation_matrix(&self) -> &Matrix3<f64> {
        &self.rotation
    }

    /// Linear velocity of the body origin.
    #[must_use]
    pub fn linear_velocity(&self) -> Vector3<f64> {
        self.twist.linear
    }

    /// Angular velocity.
    #[must_use]
    pub fn angular_velocity(&self) -> Vector3<f64> {
        self.twist.angular
    }

    /// Replace the pose; the rotation matrix is recomputed.
    pub fn set_pose(&mut self, pose: Pose) {
        self.pose = pose;
        self.recompute_rotation();
    }

    /// Move the body origin.
    pub fn set_position(&mut self, position: Point3<f64>) {
        self.pose.position = position;
    }

    /// Replace the orientation; the rotation matrix is recomputed.
    pub fn set_orientation(&mut self, rotation: UnitQuaternion<f64>) {
        self.pose.rotation = rotation;
        self.recompute_rotation();
    }

    /// Renormalize the quaternion and refresh the derived rotation matrix.
    ///
    /// The stepper calls this after integrating orientation, before any joint
    /// reads the body for the next step.
    pub fn recompute_rotation(&mut self) {
        self.pose.rotation = UnitQuaternion::new_normalize(self.pose.rotation.into_inner());
        self.rotation = self.pose.rotation.to_rotation_matrix().into_inner();
    }

    /// World position of a point given in body coordinates.
    #[must_use]
    pub fn local_to_world(&self, local: &Vector3<f64>) -> Vector3<f64> {
        self.rotation * local + self.pose.position.coords
    }

    /// Body coordinates of a world-space point.
    #[must_use]
    pub fn world_to_local(&self, world: &Vector3<f64>) -> Vector3<f64> {
        self.rotation.tr_mul(&(world - self.pose.position.coords))
    }

    /// Rotate a body-frame direction into the world frame.
    #[must_use]
    pub fn vector_to_world(&self, local: &Vector3<f64>) -> Vector3<f64> {
        self.rotation * local
    }

    /// Rotate a world-frame direction into the body frame.
    #[must_use]
    pub fn vector_to_local(&self, world: &Vector3<f64>) -> Vector3<f64> {
        self.rotation.tr_mul(world)
    }

    /// Check if the state contains `NaN` or `Inf` values.
    #[must_use]
    pub fn is_finite(&self) -> bool {
        self.pose.is_finite() && self.twist.is_finite()
    }
}

/// Mass properties of a rigid body.
///
/// Joints assume the body origin coincides with the center of mass.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct MassProperties {
    /// Total mass in kg (`f64::INFINITY` for static bodies).
    pub mass: f64,
    /// Inertia tensor about the center of mass in body coordinates (kg·m²).
    pub inertia: Matrix3<f64>,
}

impl MassProperties {
    /// Create mass properties with given values.
    #[must_use]
    pub const fn new(mass: f64, inertia: Matrix3<f64>) -> Self {
        Self { mass, inertia }
    }

    /// Mass properties of an immovable body.
    #[must_use]
    pub fn infinite() -> Self {
        Self {
            mass: f64::INFINITY,
            inertia: Matrix3::zeros(),
        }
    }

    /// Create mass properties for a uniform sphere.
    ///
    /// Inertia of a solid sphere: I = (2/5) * m * r²
    #[must_use]
    pub fn sphere(mass: f64, radius: f64) -> Self {
        let i = 0.4 * mass * radius * radius;
        Self {
            mass,
            inertia: Matrix3::from_diagonal(&Vector3::new(i, i, i)),
        }
    }

    /// Create mass properties for a uniform box.
    ///
    /// Inertia of a solid box with dimensions (x, y, z):
    /// - Ixx = (1/12) * m * (y² + z²)
    /// - Iyy = (1/12) * m * (x² + z²)
    /// - Izz = (1/12) * m * (x² + y²)
    #[must_use]
    pub fn box_shape(mass: f64, half_extents: Vector3<f64>) -> Self {
        let x2 = 4.0 * half_extents.x * half_extents.x;
        let y2 = 4.0 * half_extents.y * half_extents.y;
        let z2 = 4.0 * half_extents.z * half_extents.z;

        Self {
            mass,
            inertia: Matrix3::from_diagonal(&Vector3::new(
                mass * (y2 + z2) / 12.0,
                mass * (x2 + z2) / 12.0,
                mass * (x2 + y2) / 12.0,
            )),
        }
    }

    /// Get the inverse mass (0 if mass is infinite/static).
    #[must_use]
    pub fn inverse_mass(&self) -> f64 {
        if self.is_static() {
            0.0
        } else {
            1.0 / self.mass
        }
    }

    /// Inverse inertia tensor expressed in world coordinates for the given
    /// body rotation: `R I⁻¹ Rᵀ`.
    ///
    /// Returns `None` if the inertia is singular.
    #[must_use]
    pub fn world_inverse_inertia(&self, rotation: &Matrix3<f64>) -> Option<Matrix3<f64>> {
        if self.is_static() {
            return Some(Matrix3::zeros());
        }
        let inv = self.inertia.try_inverse()?;
        Some(rotation * inv * rotation.transpose())
    }

    /// Inertia tensor expressed in world coordinates: `R I Rᵀ`.
    #[must_use]
    pub fn world_inertia(&self, rotation: &Matrix3<f64>) -> Matrix3<f64> {
        rotation * self.inertia * rotation.transpose()
    }

    /// Check if this represents a static (immovable) body.
    #[must_use]
    pub fn is_static(&self) -> bool {
        self.mass <= 0.0 || self.mass.is_infinite()
    }

    /// Validate that the mass properties are physically valid.
    pub fn validate(&self) -> crate::Result<()> {
        if self.mass < 0.0 || self.mass.is_nan() {
            return Err(crate::SimError::invalid_mass("mass cannot be negative"));
        }

        if self.is_static() {
            return Ok(());
        }

        if !self.inertia.iter().all(|x| x.is_finite()) {
            return Err(crate::SimError::invalid_mass("inertia must be finite"));
        }

        let eigenvalues = self.inertia.symmetric_eigenvalues();
        if eigenvalues.iter().any(|&e| e <= 0.0) {
            return Err(crate::SimError::invalid_mass(
                "inertia tensor must be positive definite",
            ));
        }

        Ok(())
    }
}
