//! Simulation stepping and control flow.
//!
//! The [`Stepper`] advances a [`World`] by one timestep:
//!
//! 1. Validate the world and apply gravity
//! 2. Count rows for every enabled, attached joint
//! 3. Fill all rows into one contiguous block; wrenches emitted by powered
//!    stops go straight into the body accumulators
//! 4. Integrate external forces into unconstrained velocities `v*`
//! 5. Solve `(J M⁻¹ Jᵀ + cfm/h) λ = (c - J v*) / h` with projected
//!    Gauss-Seidel, clamping each multiplier to its row bounds
//! 6. Apply `v = v* + h M⁻¹ Jᵀ λ` and record joint feedback
//! 7. Integrate poses, refresh rotation matrices, clear forces, advance time
//!
//! Every joint finishes counting before any joint starts filling, so stop
//! activity is evaluated once from the state at the start of the step.
//!
//! # Example
//!
//! ```
//! use sim_core::{Stepper, World};
//! use sim_constraint::JointType;
//! use sim_types::{MassProperties, Pose, RigidBodyState, SimulationConfig};
//! use nalgebra::Point3;
//!
//! let mut world = World::new(SimulationConfig::realtime());
//! let bob = world.add_body(
//!     RigidBodyState::at_rest(Pose::from_position(Point3::new(1.0, 0.0, 0.0))),
//!     MassProperties::sphere(1.0, 0.1),
//! );
//! let ball = world.create_joint(JointType::Spherical);
//! world.attach(ball, Some(bob), None).unwrap();
//!
//! let mut stepper = Stepper::new();
//! let report = stepper.step(&mut world).unwrap();
//! assert_eq!(report.rows, 3);
//! assert_eq!(world.step_count(), 1);
//! ```

use nalgebra::{DMatrix, DVector, Matrix3, Vector3};
use sim_constraint::{ConstraintRow, Joint, RowCount, RowWriter, WrenchPair};
use sim_types::{BodyId, SimError};
use tracing::{debug, warn};

use crate::integrators::{apply_damping, clamp_velocities, SemiImplicitEuler};
use crate::pgs::{PgsReport, PgsSolver};
use crate::world::{body_pair, World};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Constraint forces a joint applied during the last step, in world
/// coordinates about each body's center.
///
/// Forces emitted directly by powered stops are not included.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct JointFeedback {
    /// Force on the first body.
    pub force1: Vector3<f64>,
    /// Torque on the first body.
    pub torque1: Vector3<f64>,
    /// Force on the second body (zero when attached to the world).
    pub force2: Vector3<f64>,
    /// Torque on the second body (zero when attached to the world).
    pub torque2: Vector3<f64>,
}

impl Default for JointFeedback {
    fn default() -> Self {
        Self {
            force1: Vector3::zeros(),
            torque1: Vector3::zeros(),
            force2: Vector3::zeros(),
            torque2: Vector3::zeros(),
        }
    }
}

/// Summary of a simulation step.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct StepReport {
    /// Constraint rows solved.
    pub rows: usize,
    /// Rows that are present every step regardless of stops and motors.
    pub unconditional_rows: usize,
    /// Enabled, attached joints that were asked for rows.
    pub active_joints: usize,
    /// Solver outcome.
    pub solver: PgsReport,
}

/// Configuration for the stepper.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct StepperConfig {
    /// Whether to automatically apply gravity each step.
    pub apply_gravity: bool,
    /// Whether to solve joint constraints each step.
    pub enable_constraints: bool,
    /// Maximum linear speed (m/s) after the constraint solve.
    ///
    /// Clamping only happens when both limits are set.
    pub max_linear_velocity: Option<f64>,
    /// Maximum angular speed (rad/s) after the constraint solve.
    pub max_angular_velocity: Option<f64>,
    /// Exponential linear damping rate (1/s), applied after the solve.
    pub linear_damping: f64,
    /// Exponential angular damping rate (1/s).
    pub angular_damping: f64,
}

impl Default for StepperConfig {
    fn default() -> Self {
        Self {
            apply_gravity: true,
            enable_constraints: true,
            max_linear_velocity: None,
            max_angular_velocity: None,
            linear_damping: 0.0,
            angular_damping: 0.0,
        }
    }
}

impl StepperConfig {
    /// Create config without gravity.
    #[must_use]
    pub fn zero_gravity() -> Self {
        Self {
            apply_gravity: false,
            ..Default::default()
        }
    }

    /// Scale velocities by `exp(-rate * dt)` each step.
    #[must_use]
    pub fn with_damping(mut self, linear: f64, angular: f64) -> Self {
        self.linear_damping = linear;
        self.angular_damping = angular;
        self
    }

    /// Clamp body speeds after the constraint solve, before positions move.
    #[must_use]
    pub fn with_velocity_limits(mut self, linear: f64, angular: f64) -> Self {
        self.max_linear_velocity = Some(linear);
        self.max_angular_velocity = Some(angular);
        self
    }

    /// Enable or disable joint constraints.
    #[must_use]
    pub fn with_constraints(mut self, enable: bool) -> Self {
        self.enable_constraints = enable;
        self
    }
}

/// A joint taking part in this step and where its rows live.
struct ActiveJoint {
    index: u32,
    generation: u32,
    count: RowCount,
    offset: usize,
    first: usize,
    second: Option<usize>,
    wrenches: WrenchPair,
}

impl ActiveJoint {
    fn rows(&self) -> std::ops::Range<usize> {
        self.offset..self.offset + self.count.total
    }
}

/// Inverse mass and world-frame inverse inertia of one body for this step.
struct BodyResponse {
    inv_mass: f64,
    inv_inertia: Matrix3<f64>,
}

/// The simulation stepper orchestrates the physics loop.
#[derive(Debug, Clone, Default)]
pub struct Stepper {
    config: StepperConfig,
}

impl Stepper {
    /// Create a new stepper with default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a stepper with custom configuration.
    #[must_use]
    pub fn with_config(config: StepperConfig) -> Self {
        Self { config }
    }

    /// Get the stepper configuration.
    #[must_use]
    pub fn config(&self) -> &StepperConfig {
        &self.config
    }

    /// Execute one simulation step.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid, or if any body state
    /// or constraint row is non-finite before or after the step.
    pub fn step(&mut self, world: &mut World) -> sim_types::Result<StepReport> {
        world.validate()?;

        let dt = world.timestep();
        let fps = world.config().step_rate();

        if self.config.apply_gravity {
            world.apply_gravity();
        }

        // Dense solver index of every live body, keyed by arena slot.
        let slots: Vec<(u32, u32)> = world.bodies.iter().map(|(i, g, _)| (i, g)).collect();
        let mut dense = vec![None; slots.last().map_or(0, |&(i, _)| i as usize + 1)];
        for (k, &(index, _)) in slots.iter().enumerate() {
            dense[index as usize] = Some(k);
        }

        let mut active = Vec::new();
        let mut rows = Vec::new();
        if self.config.enable_constraints {
            active = count_rows(world, &dense);
            rows = fill_rows(world, &mut active, fps)?;
            apply_stop_wrenches(world, &slots, &active);
        }

        let responses = integrate_free_velocities(world, dt);

        let (lambda, solver) = if rows.is_empty() {
            (DVector::zeros(0), PgsReport::default())
        } else {
            solve_rows(world, &active, &rows, &responses, dt)
        };
        record_feedback(world, &active, &rows, &lambda);

        for (_, _, body) in world.bodies.iter_mut() {
            if body.is_static {
                continue;
            }
            if self.config.linear_damping > 0.0 || self.config.angular_damping > 0.0 {
                body.state.twist = apply_damping(
                    &body.state.twist,
                    self.config.linear_damping,
                    self.config.angular_damping,
                    dt,
                );
            }
            if let (Some(max_linear), Some(max_angular)) = (
                self.config.max_linear_velocity,
                self.config.max_angular_velocity,
            ) {
                body.state.twist = clamp_velocities(&body.state.twist, max_linear, max_angular);
            }
            SemiImplicitEuler::integrate_position(&mut body.state, dt);
        }

        world.clear_forces();
        world.advance_time(dt);

        let report = StepReport {
            rows: rows.len(),
            unconditional_rows: active.iter().map(|j| j.count.unconditional).sum(),
            active_joints: active.len(),
            solver,
        };
        debug!(
            step = world.step_count(),
            rows = report.rows,
            unconditional = report.unconditional_rows,
            joints = report.active_joints,
            iterations = report.solver.iterations,
            "step complete"
        );

        // Check for divergence
        world.validate()?;
        Ok(report)
    }

    /// Run a fixed number of steps.
    ///
    /// # Errors
    ///
    /// Returns the first step error.
    pub fn run(&mut self, world: &mut World, steps: usize) -> sim_types::Result<Vec<StepReport>> {
        (0..steps).map(|_| self.step(world)).collect()
    }
}

/// Phase 1: ask every enabled, attached joint for its row count.
fn count_rows(world: &mut World, dense: &[Option<usize>]) -> Vec<ActiveJoint> {
    let dense_of = |id: BodyId| dense.get(id.index() as usize).copied().flatten();
    let mut active = Vec::new();
    let mut offset = 0;

    for (index, generation, record) in world.joints.iter_mut() {
        if let Some(feedback) = record.feedback.as_mut() {
            *feedback = JointFeedback::default();
        }
        let Some(attachment) = record.attachment.filter(|_| record.enabled) else {
            continue;
        };
        let Some(first) = attachment.first().and_then(dense_of) else {
            continue;
        };

        let bodies = body_pair(&world.bodies, Some(&attachment));
        let count = record.joint.row_count(&bodies);
        active.push(ActiveJoint {
            index,
            generation,
            count,
            offset,
            first,
            second: attachment.second().and_then(dense_of),
            wrenches: WrenchPair::default(),
        });
        offset += count.total;
    }
    active
}

/// Phase 2: fill every counted row into one contiguous block.
fn fill_rows(
    world: &World,
    active: &mut [ActiveJoint],
    fps: f64,
) -> sim_types::Result<Vec<ConstraintRow>> {
    let total = active.last().map_or(0, |j| j.offset + j.count.total);
    let mut rows = vec![ConstraintRow::default(); total];

    for joint in active.iter_mut().filter(|j| !j.count.is_empty()) {
        let Ok(record) = world.joints.get(joint.index, joint.generation) else {
            continue;
        };
        let bodies = body_pair(&world.bodies, record.attachment.as_ref());
        let range = joint.rows();
        let mut writer = RowWriter::new(&mut rows[range], &mut joint.wrenches, fps);
        record.joint.fill_rows(&bodies, &mut writer);
    }

    if let Some(i) = rows.iter().position(|row| !row.is_finite()) {
        return Err(SimError::diverged(format!("constraint row {i} is not finite")));
    }
    Ok(rows)
}

fn apply_stop_wrenches(world: &mut World, slots: &[(u32, u32)], active: &[ActiveJoint]) {
    for joint in active {
        let ends = [
            Some((joint.first, joint.wrenches.first)),
            joint.second.map(|s| (s, joint.wrenches.second)),
        ];
        for (body, wrench) in ends.into_iter().flatten() {
            let (index, generation) = slots[body];
            if let Ok(body) = world.bodies.get_mut(index, generation) {
                body.apply_force(wrench.force);
                body.apply_torque(wrench.torque);
            }
        }
    }
}

/// `v* = v + h M⁻¹ (f - ω × Iω)` for every dynamic body.
fn integrate_free_velocities(world: &mut World, dt: f64) -> Vec<BodyResponse> {
    let world_id = world.id();
    let mut responses = Vec::with_capacity(world.body_count());

    for (index, generation, body) in world.bodies.iter_mut() {
        if body.is_static {
            responses.push(BodyResponse {
                inv_mass: 0.0,
                inv_inertia: Matrix3::zeros(),
            });
            continue;
        }

        let rotation = *body.state.rotation_matrix();
        let inv_inertia = body
            .mass_props
            .world_inverse_inertia(&rotation)
            .unwrap_or_else(|| {
                warn!(
                    body = %BodyId::new(world_id, index, generation),
                    "singular inertia, angular response disabled"
                );
                Matrix3::zeros()
            });
        let inv_mass = body.mass_props.inverse_mass();

        let omega = body.state.angular_velocity();
        let gyroscopic = omega.cross(&(body.mass_props.world_inertia(&rotation) * omega));
        let linear_accel = body.accumulated_force * inv_mass;
        let angular_accel = inv_inertia * (body.accumulated_torque - gyroscopic);
        SemiImplicitEuler::integrate_velocity(&mut body.state, linear_accel, angular_accel, dt);

        responses.push(BodyResponse {
            inv_mass,
            inv_inertia,
        });
    }
    responses
}

/// Assemble the Delassus system, solve it and apply the resulting impulses.
fn solve_rows(
    world: &mut World,
    active: &[ActiveJoint],
    rows: &[ConstraintRow],
    responses: &[BodyResponse],
    dt: f64,
) -> (DVector<f64>, PgsReport) {
    let n = rows.len();
    let m = 6 * responses.len();
    let mut jacobian = DMatrix::zeros(n, m);
    let mut minv_jt = DMatrix::zeros(m, n);

    for joint in active {
        for i in joint.rows() {
            let row = &rows[i];
            let ends = [
                Some((joint.first, row.j1_linear, row.j1_angular)),
                joint.second.map(|s| (s, row.j2_linear, row.j2_angular)),
            ];
            for (body, linear, angular) in ends.into_iter().flatten() {
                let response = &responses[body];
                let weighted_linear = linear * response.inv_mass;
                let weighted_angular = response.inv_inertia * angular;
                let col = 6 * body;
                for a in 0..3 {
                    jacobian[(i, col + a)] += linear[a];
                    jacobian[(i, col + 3 + a)] += angular[a];
                    minv_jt[(col + a, i)] += weighted_linear[a];
                    minv_jt[(col + 3 + a, i)] += weighted_angular[a];
                }
            }
        }
    }

    let mut velocity = DVector::zeros(m);
    for (k, (_, _, body)) in world.bodies.iter().enumerate() {
        velocity
            .fixed_rows_mut::<3>(6 * k)
            .copy_from(&body.state.linear_velocity());
        velocity
            .fixed_rows_mut::<3>(6 * k + 3)
            .copy_from(&body.state.angular_velocity());
    }

    let fps = 1.0 / dt;
    let mut a = &jacobian * &minv_jt;
    for (i, row) in rows.iter().enumerate() {
        a[(i, i)] += row.cfm * fps;
    }
    let target = DVector::from_iterator(n, rows.iter().map(|row| row.rhs));
    let b = (target - &jacobian * &velocity) * fps;
    let lo: Vec<f64> = rows.iter().map(ConstraintRow::lo).collect();
    let hi: Vec<f64> = rows.iter().map(ConstraintRow::hi).collect();

    let (lambda, report) = PgsSolver::new(&world.config().solver).solve(&a, &b, &lo, &hi);

    let delta = &minv_jt * &lambda * dt;
    for (k, (_, _, body)) in world.bodies.iter_mut().enumerate() {
        if body.is_static {
            continue;
        }
        body.state.twist.linear += delta.fixed_rows::<3>(6 * k);
        body.state.twist.angular += delta.fixed_rows::<3>(6 * k + 3);
    }
    (lambda, report)
}

/// Store `Jᵀλ` per body for joints that record feedback.
fn record_feedback(
    world: &mut World,
    active: &[ActiveJoint],
    rows: &[ConstraintRow],
    lambda: &DVector<f64>,
) {
    for joint in active {
        let Ok(record) = world.joints.get_mut(joint.index, joint.generation) else {
            continue;
        };
        let Some(feedback) = record.feedback.as_mut() else {
            continue;
        };
        for i in joint.rows() {
            let (row, force) = (&rows[i], lambda[i]);
            feedback.force1 += row.j1_linear * force;
            feedback.torque1 += row.j1_angular * force;
            if joint.second.is_some() {
                feedback.force2 += row.j2_linear * force;
                feedback.torque2 += row.j2_angular * force;
            }
        }
    }
}
