//! Simulation world: bodies, joints and the links between them.
//!
//! The [`World`] owns every rigid body and joint in generational arenas.
//! Handles carry the issuing world's [`WorldId`], so a destroyed entity or an
//! entity from another world is reported as an error instead of silently
//! aliasing a different slot.
//!
//! Each body keeps the list of joints attached to it; each attached joint
//! keeps an [`Attachment`] naming its bodies. Destroying a body detaches
//! every joint attached to it. The joints themselves survive, unattached.

use std::fmt::Display;

use nalgebra::Vector3;
use sim_constraint::{AnyJoint, Attachment, BodyPair, Joint, JointType};
use sim_types::{
    BodyId, ConstraintDefaults, JointId, MassProperties, Pose, RigidBodyState, SimError,
    SimulationConfig, WorldId,
};
use smallvec::SmallVec;
use tracing::{debug, warn};

use crate::arena::{Arena, SlotError};
use crate::stepper::JointFeedback;

/// A rigid body in the simulation world.
#[derive(Debug, Clone)]
pub struct Body {
    /// Current state (pose + twist).
    pub state: RigidBodyState,
    /// Mass properties.
    pub mass_props: MassProperties,
    /// Whether this body is static (immovable).
    pub is_static: bool,
    /// Accumulated external force (cleared each step).
    pub accumulated_force: Vector3<f64>,
    /// Accumulated external torque (cleared each step).
    pub accumulated_torque: Vector3<f64>,
    joints: SmallVec<[JointId; 4]>,
}

impl Body {
    /// Create a new dynamic body.
    #[must_use]
    pub fn new(state: RigidBodyState, mass_props: MassProperties) -> Self {
        Self {
            state,
            is_static: mass_props.is_static(),
            mass_props,
            accumulated_force: Vector3::zeros(),
            accumulated_torque: Vector3::zeros(),
            joints: SmallVec::new(),
        }
    }

    /// Create a static (immovable) body.
    #[must_use]
    pub fn new_static(pose: Pose) -> Self {
        Self::new(RigidBodyState::at_rest(pose), MassProperties::infinite())
    }

    /// Apply a force at the center of mass.
    pub fn apply_force(&mut self, force: Vector3<f64>) {
        if !self.is_static {
            self.accumulated_force += force;
        }
    }

    /// Apply a torque.
    pub fn apply_torque(&mut self, torque: Vector3<f64>) {
        if !self.is_static {
            self.accumulated_torque += torque;
        }
    }

    /// Clear accumulated forces and torques.
    pub fn clear_forces(&mut self) {
        self.accumulated_force = Vector3::zeros();
        self.accumulated_torque = Vector3::zeros();
    }

    /// Joints attached to this body, in attachment order.
    #[must_use]
    pub fn joints(&self) -> &[JointId] {
        &self.joints
    }
}

/// A joint together with its attachment and per-joint switches.
#[derive(Debug, Clone)]
pub(crate) struct JointRecord {
    pub(crate) joint: AnyJoint,
    pub(crate) attachment: Option<Attachment>,
    pub(crate) enabled: bool,
    pub(crate) feedback: Option<JointFeedback>,
}

/// Arena handle resolution shared by bodies and joints.
trait Handle: Copy + Display {
    fn world(self) -> WorldId;
    fn slot(self) -> (u32, u32);
    fn invalid(self) -> SimError;
}

impl Handle for BodyId {
    fn world(self) -> WorldId {
        BodyId::world(self)
    }

    fn slot(self) -> (u32, u32) {
        (self.index(), self.generation())
    }

    fn invalid(self) -> SimError {
        SimError::InvalidBodyId(self)
    }
}

impl Handle for JointId {
    fn world(self) -> WorldId {
        JointId::world(self)
    }

    fn slot(self) -> (u32, u32) {
        (self.index(), self.generation())
    }

    fn invalid(self) -> SimError {
        SimError::InvalidJointId(self)
    }
}

fn slot_error<H: Handle>(world: WorldId, handle: H, err: Option<SlotError>) -> SimError {
    if handle.world() != world {
        return SimError::ForeignHandle {
            handle: handle.to_string(),
            owner: handle.world(),
            world,
        };
    }
    match err {
        Some(SlotError::Stale) => SimError::StaleHandle {
            handle: handle.to_string(),
        },
        _ => handle.invalid(),
    }
}

fn lookup<T, H: Handle>(arena: &Arena<T>, world: WorldId, handle: H) -> sim_types::Result<&T> {
    if handle.world() != world {
        return Err(slot_error(world, handle, None));
    }
    let (index, generation) = handle.slot();
    arena
        .get(index, generation)
        .map_err(|e| slot_error(world, handle, Some(e)))
}

fn lookup_mut<T, H: Handle>(
    arena: &mut Arena<T>,
    world: WorldId,
    handle: H,
) -> sim_types::Result<&mut T> {
    if handle.world() != world {
        return Err(slot_error(world, handle, None));
    }
    let (index, generation) = handle.slot();
    arena
        .get_mut(index, generation)
        .map_err(|e| slot_error(world, handle, Some(e)))
}

/// Borrow the states of the bodies named by `attachment`.
pub(crate) fn body_pair<'a>(
    bodies: &'a Arena<Body>,
    attachment: Option<&Attachment>,
) -> BodyPair<'a> {
    let state = |id: Option<BodyId>| {
        id.and_then(|id| bodies.get(id.index(), id.generation()).ok())
            .map(|body| &body.state)
    };
    match attachment.and_then(|a| state(a.first()).map(|first| (first, state(a.second())))) {
        Some((first, second)) => BodyPair::new(first, second),
        None => BodyPair::detached(),
    }
}

/// The simulation world containing all entities.
#[derive(Debug, Clone)]
pub struct World {
    id: WorldId,
    /// Simulation configuration.
    config: SimulationConfig,
    /// Current simulation time.
    time: f64,
    /// Step counter.
    step_count: u64,
    pub(crate) bodies: Arena<Body>,
    pub(crate) joints: Arena<JointRecord>,
}

impl Default for World {
    fn default() -> Self {
        Self::new(SimulationConfig::default())
    }
}

impl World {
    /// Create a new empty world with the given configuration.
    #[must_use]
    pub fn new(config: SimulationConfig) -> Self {
        Self {
            id: WorldId::next(),
            config,
            time: 0.0,
            step_count: 0,
            bodies: Arena::default(),
            joints: Arena::default(),
        }
    }

    /// Identifier carried by every handle this world issues.
    #[must_use]
    pub fn id(&self) -> WorldId {
        self.id
    }

    /// Get the simulation configuration.
    #[must_use]
    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    /// Replace the configuration.
    ///
    /// Joints that already exist keep the ERP/CFM they captured at creation.
    pub fn set_config(&mut self, config: SimulationConfig) -> sim_types::Result<()> {
        config.validate()?;
        self.config = config;
        Ok(())
    }

    /// ERP/CFM snapshot handed to joints created from now on.
    #[must_use]
    pub fn constraint_defaults(&self) -> ConstraintDefaults {
        self.config.constraint_defaults()
    }

    /// Get the current simulation time.
    #[must_use]
    pub fn time(&self) -> f64 {
        self.time
    }

    /// Get the step count.
    #[must_use]
    pub fn step_count(&self) -> u64 {
        self.step_count
    }

    /// Get the timestep from configuration.
    #[must_use]
    pub fn timestep(&self) -> f64 {
        self.config.timestep
    }

    /// Get the number of bodies.
    #[must_use]
    pub fn body_count(&self) -> usize {
        self.bodies.len()
    }

    /// Get the number of joints.
    #[must_use]
    pub fn joint_count(&self) -> usize {
        self.joints.len()
    }

    // =========================================================================
    // Body Management
    // =========================================================================

    /// Add a body to the world and return its ID.
    pub fn add_body(&mut self, state: RigidBodyState, mass_props: MassProperties) -> BodyId {
        self.insert_body(Body::new(state, mass_props))
    }

    /// Add a static body at the given pose.
    pub fn add_static_body(&mut self, pose: Pose) -> BodyId {
        self.insert_body(Body::new_static(pose))
    }

    fn insert_body(&mut self, body: Body) -> BodyId {
        let is_static = body.is_static;
        let (index, generation) = self.bodies.insert(body);
        let id = BodyId::new(self.id, index, generation);
        debug!(body = %id, is_static, "body added");
        id
    }

    /// Get a body by ID.
    pub fn body(&self, id: BodyId) -> sim_types::Result<&Body> {
        lookup(&self.bodies, self.id, id)
    }

    /// Get a mutable reference to a body by ID.
    pub fn body_mut(&mut self, id: BodyId) -> sim_types::Result<&mut Body> {
        lookup_mut(&mut self.bodies, self.id, id)
    }

    /// Remove a body from the world.
    ///
    /// Every joint attached to it is detached and stays alive.
    pub fn remove_body(&mut self, id: BodyId) -> sim_types::Result<Body> {
        let attached: SmallVec<[JointId; 4]> = self.body(id)?.joints.clone();
        for &joint in &attached {
            self.detach(joint)?;
        }
        let (index, generation) = id.slot();
        let body = self
            .bodies
            .remove(index, generation)
            .map_err(|e| slot_error(self.id, id, Some(e)))?;
        debug!(body = %id, detached = attached.len(), "body removed");
        Ok(body)
    }

    /// Iterate over all bodies.
    pub fn bodies(&self) -> impl Iterator<Item = (BodyId, &Body)> {
        let world = self.id;
        self.bodies
            .iter()
            .map(move |(index, generation, body)| (BodyId::new(world, index, generation), body))
    }

    // =========================================================================
    // Joint Management
    // =========================================================================

    /// Create an unattached joint with parameters captured from the current
    /// constraint defaults.
    pub fn create_joint(&mut self, joint_type: JointType) -> JointId {
        let joint = AnyJoint::new(joint_type, &self.constraint_defaults());
        self.add_joint(joint)
    }

    /// Add a pre-built, unattached joint.
    pub fn add_joint(&mut self, joint: impl Into<AnyJoint>) -> JointId {
        let joint = joint.into();
        let joint_type = joint.joint_type();
        let (index, generation) = self.joints.insert(JointRecord {
            joint,
            attachment: None,
            enabled: true,
            feedback: None,
        });
        let id = JointId::new(self.id, index, generation);
        debug!(joint = %id, kind = %joint_type, "joint created");
        id
    }

    /// Destroy a joint, detaching it first.
    pub fn remove_joint(&mut self, id: JointId) -> sim_types::Result<AnyJoint> {
        self.detach(id)?;
        let (index, generation) = id.slot();
        let record = self
            .joints
            .remove(index, generation)
            .map_err(|e| slot_error(self.id, id, Some(e)))?;
        debug!(joint = %id, "joint destroyed");
        Ok(record.joint)
    }

    /// Attach a joint to `first` and, optionally, `second`.
    ///
    /// `second == None` attaches `first` to the static world. The first body
    /// is required. The joint geometry is re-stored against the new bodies,
    /// so the current configuration satisfies the joint.
    ///
    /// # Errors
    ///
    /// - `AlreadyAttached` if the joint is attached; detach it first
    /// - `InvalidAttachment` for `(None, _)` or a body attached to itself
    /// - handle errors for unknown, stale or foreign handles
    pub fn attach(
        &mut self,
        joint: JointId,
        first: Option<BodyId>,
        second: Option<BodyId>,
    ) -> sim_types::Result<()> {
        if lookup(&self.joints, self.id, joint)?.attachment.is_some() {
            return Err(SimError::AlreadyAttached(joint));
        }
        let Some(first) = first else {
            return Err(SimError::invalid_attachment(if second.is_some() {
                "the first body is required; attach (body, None) to fix a body to the world"
            } else {
                "no bodies given; use detach to release a joint"
            }));
        };
        let first_static = self.body(first)?.is_static;
        let second_static = match second {
            Some(second) => self.body(second)?.is_static,
            None => true,
        };
        let attachment = Attachment::new(joint, first, second)?;
        if first_static && second_static {
            warn!(joint = %joint, "joint attached between static bodies has no effect");
        }

        for body in [Some(first), second].into_iter().flatten() {
            lookup_mut(&mut self.bodies, self.id, body)?.joints.push(joint);
        }
        let record = lookup_mut(&mut self.joints, self.id, joint)?;
        record.attachment = Some(attachment);
        let pair = body_pair(&self.bodies, Some(&attachment));
        record.joint.set_relative_values(&pair);

        debug!(
            joint = %joint,
            first = %first,
            second = ?second.map(|b| b.to_string()),
            "joint attached"
        );
        Ok(())
    }

    /// Detach a joint from its bodies. Detaching an unattached joint is a
    /// no-op.
    pub fn detach(&mut self, joint: JointId) -> sim_types::Result<()> {
        let Some(attachment) = lookup_mut(&mut self.joints, self.id, joint)?.attachment.take()
        else {
            return Ok(());
        };
        for body in attachment.nodes().iter().filter_map(|n| n.body) {
            if let Ok(body) = lookup_mut(&mut self.bodies, self.id, body) {
                body.joints.retain(|j| *j != joint);
            }
        }
        debug!(joint = %joint, "joint detached");
        Ok(())
    }

    /// Get a joint by ID.
    pub fn joint(&self, id: JointId) -> sim_types::Result<&AnyJoint> {
        lookup(&self.joints, self.id, id).map(|r| &r.joint)
    }

    /// Get a mutable reference to a joint by ID.
    ///
    /// Geometry setters also need the attached bodies; use
    /// [`joint_and_bodies_mut`](Self::joint_and_bodies_mut) for those.
    pub fn joint_mut(&mut self, id: JointId) -> sim_types::Result<&mut AnyJoint> {
        lookup_mut(&mut self.joints, self.id, id).map(|r| &mut r.joint)
    }

    /// Iterate over all joints.
    pub fn joints(&self) -> impl Iterator<Item = (JointId, &AnyJoint)> {
        let world = self.id;
        self.joints.iter().map(move |(index, generation, record)| {
            (JointId::new(world, index, generation), &record.joint)
        })
    }

    /// A joint together with the bodies it is attached to.
    pub fn joint_and_bodies(&self, id: JointId) -> sim_types::Result<(&AnyJoint, BodyPair<'_>)> {
        let record = lookup(&self.joints, self.id, id)?;
        Ok((
            &record.joint,
            body_pair(&self.bodies, record.attachment.as_ref()),
        ))
    }

    /// A mutable joint together with the bodies it is attached to.
    ///
    /// ```
    /// use sim_core::World;
    /// use sim_constraint::JointType;
    /// use sim_types::{MassProperties, RigidBodyState};
    /// use nalgebra::Vector3;
    ///
    /// let mut world = World::default();
    /// let body = world.add_body(RigidBodyState::default(), MassProperties::sphere(1.0, 0.5));
    /// let hinge = world.create_joint(JointType::Revolute);
    /// world.attach(hinge, Some(body), None).unwrap();
    ///
    /// let (joint, bodies) = world.joint_and_bodies_mut(hinge).unwrap();
    /// let hinge = joint.as_revolute_mut().unwrap();
    /// hinge.set_axis(&bodies, Vector3::z()).unwrap();
    /// assert_eq!(hinge.axis(&bodies).unwrap(), Vector3::z());
    /// ```
    pub fn joint_and_bodies_mut(
        &mut self,
        id: JointId,
    ) -> sim_types::Result<(&mut AnyJoint, BodyPair<'_>)> {
        let record = lookup_mut(&mut self.joints, self.id, id)?;
        let pair = body_pair(&self.bodies, record.attachment.as_ref());
        Ok((&mut record.joint, pair))
    }

    /// Attachment of a joint, `None` while detached.
    pub fn attachment(&self, id: JointId) -> sim_types::Result<Option<&Attachment>> {
        lookup(&self.joints, self.id, id).map(|r| r.attachment.as_ref())
    }

    /// Bodies of a joint as `(first, second)`.
    pub fn joint_bodies(&self, id: JointId) -> sim_types::Result<(Option<BodyId>, Option<BodyId>)> {
        Ok(self
            .attachment(id)?
            .map_or((None, None), |a| (a.first(), a.second())))
    }

    /// Joints attached to a body.
    pub fn body_joints(&self, id: BodyId) -> sim_types::Result<&[JointId]> {
        self.body(id).map(Body::joints)
    }

    /// Joints linking `a` and `b`, in attachment order of `a`.
    pub fn connecting_joints(&self, a: BodyId, b: BodyId) -> sim_types::Result<Vec<JointId>> {
        self.body(b)?;
        let joints = self.body(a)?.joints.iter().copied().filter(|&joint| {
            lookup(&self.joints, self.id, joint)
                .ok()
                .and_then(|r| r.attachment.as_ref())
                .and_then(|att| att.other_node(a))
                .is_some_and(|node| node.body == Some(b))
        });
        Ok(joints.collect())
    }

    /// Check whether any joint links `a` and `b`.
    pub fn are_connected(&self, a: BodyId, b: BodyId) -> sim_types::Result<bool> {
        Ok(!self.connecting_joints(a, b)?.is_empty())
    }

    /// Check whether any joint other than those of `excluded` type links
    /// `a` and `b`.
    pub fn are_connected_excluding(
        &self,
        a: BodyId,
        b: BodyId,
        excluded: JointType,
    ) -> sim_types::Result<bool> {
        let joints = self.connecting_joints(a, b)?;
        Ok(joints
            .into_iter()
            .filter_map(|j| self.joint(j).ok())
            .any(|joint| joint.joint_type() != excluded))
    }

    /// Enable or disable a joint. Disabled joints produce no rows.
    pub fn set_joint_enabled(&mut self, id: JointId, enabled: bool) -> sim_types::Result<()> {
        lookup_mut(&mut self.joints, self.id, id)?.enabled = enabled;
        Ok(())
    }

    /// Check whether a joint is enabled.
    pub fn is_joint_enabled(&self, id: JointId) -> sim_types::Result<bool> {
        lookup(&self.joints, self.id, id).map(|r| r.enabled)
    }

    /// Turn recording of constraint forces for a joint on or off.
    pub fn set_joint_feedback(&mut self, id: JointId, record: bool) -> sim_types::Result<()> {
        let joint = lookup_mut(&mut self.joints, self.id, id)?;
        joint.feedback = record.then(JointFeedback::default);
        Ok(())
    }

    /// Constraint forces applied by a joint in the last step, if recording.
    pub fn joint_feedback(&self, id: JointId) -> sim_types::Result<Option<&JointFeedback>> {
        lookup(&self.joints, self.id, id).map(|r| r.feedback.as_ref())
    }

    /// Apply scalar efforts along a joint's free axes to its bodies.
    ///
    /// The forces accumulate like any external force and are cleared after
    /// the next step.
    pub fn add_joint_effort(&mut self, id: JointId, efforts: &[f64]) -> sim_types::Result<()> {
        let (joint, bodies) = self.joint_and_bodies(id)?;
        let wrenches = joint.effort_wrench(&bodies, efforts)?;
        let (first, second) = self.joint_bodies(id)?;

        for (body, wrench) in [(first, wrenches.first), (second, wrenches.second)] {
            if let Some(body) = body {
                let body = self.body_mut(body)?;
                body.apply_force(wrench.force);
                body.apply_torque(wrench.torque);
            }
        }
        Ok(())
    }

    // =========================================================================
    // Force Application
    // =========================================================================

    /// Apply gravity to all dynamic bodies.
    pub fn apply_gravity(&mut self) {
        let gravity_accel = self.config.gravity.acceleration;
        for (_, _, body) in self.bodies.iter_mut() {
            if !body.is_static {
                let gravity_force = gravity_accel * body.mass_props.mass;
                body.apply_force(gravity_force);
            }
        }
    }

    /// Clear all accumulated forces on all bodies.
    pub fn clear_forces(&mut self) {
        for (_, _, body) in self.bodies.iter_mut() {
            body.clear_forces();
        }
    }

    // =========================================================================
    // Simulation Control
    // =========================================================================

    /// Advance the simulation time (called by stepper).
    pub(crate) fn advance_time(&mut self, dt: f64) {
        self.time += dt;
        self.step_count += 1;
    }

    /// Reset simulation time to zero.
    pub fn reset_time(&mut self) {
        self.time = 0.0;
        self.step_count = 0;
    }

    /// Validate the world state.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The configuration is invalid
    /// - Any body has non-finite state values (`NaN` or `Inf`)
    /// - Any body has invalid mass properties
    pub fn validate(&self) -> sim_types::Result<()> {
        self.config.validate()?;

        for (id, body) in self.bodies() {
            if !body.state.is_finite() {
                return Err(SimError::diverged(format!("{id} has non-finite state")));
            }
            body.mass_props.validate()?;
        }

        Ok(())
    }
}
