//! Two independently built but kinematically identical rigs, one of which
//! re-applies every anchor and axis it reads back, must stay in lockstep.
//!
//! Each rig: bodies at (-1,-2,-3) and (11,22,33), each tilted 0.47123 rad,
//! joined at the world origin, stepped 4 times at dt = 0.5 under gravity.

use approx::assert_relative_eq;
use sim_conformance_tests::{Rig, RIG_DT};
use sim_constraint::{Joint, JointType};
use sim_core::Stepper;
use sim_types::{RigidBodyState, SimulationConfig};

const TOLERANCE: f64 = 1e-4;

fn assert_states_match(a: &RigidBodyState, b: &RigidBodyState) {
    assert_relative_eq!(a.position(), b.position(), epsilon = TOLERANCE);
    assert_relative_eq!(a.orientation(), b.orientation(), epsilon = TOLERANCE);
}

fn run_rigs(joint_type: JointType) {
    let config = SimulationConfig::with_timestep(RIG_DT);
    let mut plain = Rig::new(joint_type, config.clone()).expect("rig should build");
    let mut reapplied = Rig::new(joint_type, config).expect("rig should build");
    reapplied
        .reapply_read_back()
        .expect("read-back values should be accepted");

    let start = plain.first_state().expect("body exists");
    let mut stepper = Stepper::new();
    for _ in 0..4 {
        let a = stepper.step(&mut plain.world).expect("step should succeed");
        let b = stepper.step(&mut reapplied.world).expect("step should succeed");
        assert_eq!(a.rows, b.rows, "{joint_type}: row counts diverged");

        assert_states_match(
            &plain.first_state().expect("body exists"),
            &reapplied.first_state().expect("body exists"),
        );
        assert_states_match(
            &plain.second_state().expect("body exists"),
            &reapplied.second_state().expect("body exists"),
        );
    }

    // The rigs must actually have moved for the comparison to mean anything.
    let end = plain.first_state().expect("body exists");
    assert!(
        (end.position() - start.position()).norm() > 1.0,
        "{joint_type}: rig did not move"
    );
    assert_relative_eq!(plain.world.time(), 2.0, epsilon = 1e-12);
}

#[test]
fn test_fixed_read_back_is_idempotent() {
    run_rigs(JointType::Fixed);
}

#[test]
fn test_ball_read_back_is_idempotent() {
    run_rigs(JointType::Spherical);
}

#[test]
fn test_hinge_read_back_is_idempotent() {
    run_rigs(JointType::Revolute);
}

#[test]
fn test_slider_read_back_is_idempotent() {
    run_rigs(JointType::Prismatic);
}

#[test]
fn test_universal_read_back_is_idempotent() {
    run_rigs(JointType::Universal);
}

#[test]
fn test_prismatic_revolute_read_back_is_idempotent() {
    run_rigs(JointType::PrismaticRevolute);
}

#[test]
fn test_linear_motor_read_back_is_idempotent() {
    run_rigs(JointType::LinearMotor);
}

#[test]
fn test_read_back_matches_construction_values() {
    let rig = Rig::new(JointType::Universal, SimulationConfig::with_timestep(RIG_DT))
        .expect("rig should build");
    let (joint, bodies) = rig.world.joint_and_bodies(rig.joint).expect("joint exists");
    let universal = joint.as_universal().expect("universal joint");

    assert_relative_eq!(
        universal.anchor(&bodies).expect("attached"),
        nalgebra::Vector3::zeros(),
        epsilon = 1e-12
    );
    assert_relative_eq!(
        universal.anchor2(&bodies).expect("attached"),
        nalgebra::Vector3::zeros(),
        epsilon = 1e-12
    );
    assert_relative_eq!(
        universal.axis1(&bodies).expect("attached"),
        nalgebra::Vector3::x(),
        epsilon = 1e-12
    );
    assert_relative_eq!(
        universal.axis2(&bodies).expect("attached"),
        nalgebra::Vector3::y(),
        epsilon = 1e-12
    );
    assert_eq!(joint.constrained_dof(), 4);
}
