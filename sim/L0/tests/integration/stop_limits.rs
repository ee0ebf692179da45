//! Stop classification at and around the boundaries, inverted stops, and
//! linear motor row counts.

use nalgebra::{Point3, Vector3};
use proptest::prelude::*;
use sim_constraint::{
    AxisFrame, BodyPair, Joint, JointType, LinearMotorJoint, PrismaticJoint, RowBlock,
};
use sim_core::{Stepper, World};
use sim_types::{ConstraintDefaults, MassProperties, Pose, RigidBodyState, SimulationConfig, Twist};

const FPS: f64 = 60.0;

/// Slider along world x, attached to the world with the reference at the
/// origin, evaluated with its body at `x`.
fn slider_rows(lo: f64, hi: f64, x: f64) -> RowBlock {
    let origin = RigidBodyState::at_rest(Pose::identity());
    let mut slider = PrismaticJoint::new(&ConstraintDefaults::default());
    let bodies = BodyPair::to_world(&origin);
    slider.set_relative_values(&bodies);
    slider.set_axis(&bodies, Vector3::x()).expect("axis accepted");
    slider.set_stops(1, lo, hi).expect("stops accepted");

    let moved = RigidBodyState::at_rest(Pose::from_position(Point3::new(x, 0.0, 0.0)));
    let bodies = BodyPair::to_world(&moved);
    assert!(slider.position(&bodies).expect("attached") == x);
    RowBlock::assemble(&mut slider, &bodies, FPS)
}

// ============================================================================
// Boundaries
// ============================================================================

#[test]
fn test_position_exactly_at_upper_stop_is_active() {
    let block = slider_rows(-1.0, 0.25, 0.25);
    assert_eq!(block.count.total, 6);
    assert_eq!(block.count.unconditional, 5);
    // Upper stop pushes back towards negative positions only.
    let limit = block.rows[5];
    assert!(limit.lo() == f64::NEG_INFINITY && limit.hi() == 0.0);
}

#[test]
fn test_position_exactly_at_lower_stop_is_active() {
    let block = slider_rows(0.25, 1.0, 0.25);
    assert_eq!(block.count.total, 6);
    let limit = block.rows[5];
    assert!(limit.lo() == 0.0 && limit.hi() == f64::INFINITY);
}

#[test]
fn test_position_strictly_inside_stops_is_free() {
    assert_eq!(slider_rows(-1.0, 0.25 + 1e-9, 0.25).count.total, 5);
    assert_eq!(slider_rows(0.25 - 1e-9, 1.0, 0.25).count.total, 5);
}

#[test]
fn test_inverted_stops_never_engage() {
    for x in [-2.0, -0.5, 0.0, 0.5, 2.0] {
        assert_eq!(slider_rows(0.5, -0.5, x).count.total, 5, "x = {x}");
    }
}

#[test]
fn test_hinge_stop_at_boundary_in_world() {
    let mut world = World::new(SimulationConfig::realtime().zero_gravity());
    let body = world.add_body(
        RigidBodyState::at_rest(Pose::identity()),
        MassProperties::sphere(1.0, 0.1),
    );
    let hinge = world.create_joint(JointType::Revolute);
    world.attach(hinge, Some(body), None).expect("attach");
    {
        let (joint, bodies) = world.joint_and_bodies_mut(hinge).expect("joint exists");
        joint
            .as_revolute_mut()
            .and_then(|h| h.set_axis(&bodies, Vector3::z()))
            .expect("axis accepted");
        joint.set_stops(1, 0.0, 1.0).expect("stops accepted");
    }

    // Angle 0 sits exactly on the lower stop.
    let report = Stepper::new().step(&mut world).expect("step should succeed");
    assert_eq!(report.rows, 6);
    assert_eq!(report.unconditional_rows, 5);

    let (joint, bodies) = world.joint_and_bodies_mut(hinge).expect("joint exists");
    joint.set_stops(1, -1.0, 1.0).expect("stops accepted");
    assert_eq!(RowBlock::assemble(joint, &bodies, FPS).count.total, 5);
}

#[test]
fn test_inverted_slider_stops_let_the_body_pass_both_bounds() {
    let mut world = World::new(SimulationConfig::realtime().zero_gravity());
    let body = world.add_body(
        RigidBodyState::at_rest(Pose::identity()),
        MassProperties::sphere(1.0, 0.1),
    );
    let slider = world.create_joint(JointType::Prismatic);
    world.attach(slider, Some(body), None).expect("attach");
    {
        let (joint, bodies) = world.joint_and_bodies_mut(slider).expect("joint exists");
        joint
            .as_prismatic_mut()
            .and_then(|s| s.set_axis(&bodies, Vector3::x()))
            .expect("axis accepted");
        joint.set_stops(1, 0.5, -0.5).expect("stops accepted");
    }

    let mut stepper = Stepper::new();
    let mut slide = |world: &mut World, speed: f64, steps: usize| {
        world.body_mut(body).expect("body exists").state.twist =
            Twist::linear(Vector3::new(speed, 0.0, 0.0));
        let reports = stepper.run(world, steps).expect("steps should succeed");
        assert!(reports.iter().all(|r| r.rows == 5 && r.unconditional_rows == 5));
        let (joint, bodies) = world.joint_and_bodies(slider).expect("joint exists");
        joint
            .as_prismatic()
            .and_then(|s| s.position(&bodies))
            .expect("attached")
    };

    // Past the upper bound, then back past the lower one.
    let position = slide(&mut world, 1.0, 60);
    assert!(position > 0.9, "position = {position}");
    let position = slide(&mut world, -1.0, 120);
    assert!(position < -0.9, "position = {position}");
}

// ============================================================================
// Linear motor
// ============================================================================

#[test]
fn test_linear_motor_without_axes_contributes_nothing() {
    let mut world = World::new(SimulationConfig::realtime());
    let body = world.add_body(
        RigidBodyState::at_rest(Pose::identity()),
        MassProperties::sphere(1.0, 0.1),
    );
    let motor = world.create_joint(JointType::LinearMotor);
    world.attach(motor, Some(body), None).expect("attach");
    {
        let joint = world.joint_mut(motor).expect("joint exists");
        for axis in 1..=3 {
            joint.set_motor(axis, 5.0, 100.0).expect("motor accepted");
        }
    }

    let report = Stepper::new().step(&mut world).expect("step should succeed");
    assert_eq!(report.rows, 0);
    assert_eq!(report.active_joints, 1);
}

fn arb_frame() -> impl Strategy<Value = AxisFrame> {
    prop_oneof![
        Just(AxisFrame::World),
        Just(AxisFrame::First),
        Just(AxisFrame::Second)
    ]
}

proptest! {
    #[test]
    fn prop_slider_stop_classification(
        lo in -2.0..2.0f64,
        hi in -2.0..2.0f64,
        x in -3.0..3.0f64,
    ) {
        let block = slider_rows(lo, hi, x);
        let engaged = lo <= hi && (x <= lo || x >= hi);
        prop_assert_eq!(block.count.total, 5 + usize::from(engaged));
        prop_assert_eq!(block.count.unconditional, 5);
    }

    #[test]
    fn prop_linear_motor_rows_follow_powered_axes(
        num_axes in 0usize..=3,
        fmax in prop::array::uniform3(0.0..10.0f64),
        vel in prop::array::uniform3(-5.0..5.0f64),
        frames in prop::array::uniform3(arb_frame()),
    ) {
        let a = RigidBodyState::at_rest(Pose::identity());
        let b = RigidBodyState::at_rest(Pose::from_position(Point3::new(1.0, 0.0, 0.0)));
        let bodies = BodyPair::between(&a, &b);

        let mut lmotor = LinearMotorJoint::new(&ConstraintDefaults::default());
        lmotor.set_relative_values(&bodies);
        lmotor.set_num_axes(num_axes).expect("axis count accepted");
        let directions = [Vector3::x(), Vector3::y(), Vector3::z()];
        for index in 1..=3 {
            lmotor.set_motor(index, vel[index - 1], fmax[index - 1]).expect("motor accepted");
            lmotor
                .set_axis(&bodies, index, frames[index - 1], directions[index - 1])
                .expect("axis accepted");
        }

        let expected = fmax[..num_axes].iter().filter(|f| **f > 0.0).count();
        let block = RowBlock::assemble(&mut lmotor, &bodies, FPS);
        prop_assert_eq!(block.count.total, expected);
        prop_assert_eq!(block.count.unconditional, 0);
        if num_axes == 0 {
            prop_assert!(block.is_empty());
        }
    }
}
