//! Joints across body removal, re-attachment, handle misuse, efforts and
//! feedback while a world is being stepped.

use approx::assert_relative_eq;
use nalgebra::{Point3, Vector3};
use sim_conformance_tests::{Rig, RIG_DT};
use sim_constraint::{Joint, JointType};
use sim_core::{Stepper, StepperConfig, World};
use sim_types::{MassProperties, Pose, RigidBodyState, SimError, SimulationConfig};

fn ball(world: &mut World, x: f64) -> sim_types::BodyId {
    world.add_body(
        RigidBodyState::at_rest(Pose::from_position(Point3::new(x, 0.0, 0.0))),
        MassProperties::sphere(1.0, 0.1),
    )
}

#[test]
fn test_removing_a_body_mid_simulation_detaches_its_joint() {
    let mut rig = Rig::new(JointType::Revolute, SimulationConfig::with_timestep(RIG_DT))
        .expect("rig should build");
    let mut stepper = Stepper::new();
    stepper.step(&mut rig.world).expect("step should succeed");

    rig.world.remove_body(rig.second).expect("body exists");
    assert!(rig.world.attachment(rig.joint).expect("joint exists").is_none());
    assert!(rig.world.body_joints(rig.first).expect("body exists").is_empty());

    // Detached joints need bodies for every geometric read.
    let (joint, bodies) = rig.world.joint_and_bodies(rig.joint).expect("joint exists");
    let err = joint
        .as_revolute()
        .and_then(|hinge| hinge.angle(&bodies))
        .unwrap_err();
    assert!(matches!(err, SimError::NotAttached { joint: "revolute" }));
    assert!(err.is_invalid_state());

    let report = stepper.step(&mut rig.world).expect("step should succeed");
    assert_eq!(report.rows, 0);
    assert_eq!(report.active_joints, 0);

    // The surviving joint can be re-attached, to the world this time.
    rig.world
        .attach(rig.joint, Some(rig.first), None)
        .expect("re-attach should succeed");
    let report = stepper.step(&mut rig.world).expect("step should succeed");
    assert_eq!(report.unconditional_rows, 5);
}

#[test]
fn test_handle_misuse_is_reported_synchronously() {
    let mut a = World::default();
    let mut b = World::default();
    let body_a = ball(&mut a, 0.0);
    let body_b = ball(&mut b, 1.0);
    let joint = a.create_joint(JointType::Spherical);

    let err = a.attach(joint, Some(body_a), Some(body_b)).unwrap_err();
    assert!(matches!(err, SimError::ForeignHandle { .. }), "{err}");
    assert!(a.attachment(joint).unwrap().is_none());

    a.attach(joint, Some(body_a), None).unwrap();
    let err = a.attach(joint, Some(body_a), None).unwrap_err();
    assert_eq!(err, SimError::AlreadyAttached(joint));

    a.remove_joint(joint).unwrap();
    let err = a.joint(joint).unwrap_err();
    assert!(matches!(err, SimError::StaleHandle { .. }), "{err}");
    assert!(err.is_handle_error());
    assert!(a.body_joints(body_a).unwrap().is_empty());

    let reused = a.create_joint(JointType::Fixed);
    assert_eq!(reused.index(), joint.index());
    assert_ne!(reused.generation(), joint.generation());
    assert!(a.joint(joint).is_err());
}

#[test]
fn test_slider_effort_conserves_momentum() {
    let mut world = World::new(SimulationConfig::realtime().zero_gravity());
    let a = ball(&mut world, 0.0);
    let b = world.add_body(
        RigidBodyState::at_rest(Pose::from_position(Point3::new(1.0, 0.0, 0.0))),
        MassProperties::sphere(3.0, 0.2),
    );
    let slider = world.create_joint(JointType::Prismatic);
    world.attach(slider, Some(a), Some(b)).unwrap();
    {
        let (joint, bodies) = world.joint_and_bodies_mut(slider).unwrap();
        joint
            .as_prismatic_mut()
            .and_then(|s| s.set_axis(&bodies, Vector3::x()))
            .unwrap();
    }

    let mut stepper = Stepper::with_config(StepperConfig::zero_gravity());
    for _ in 0..10 {
        world.add_joint_effort(slider, &[6.0]).unwrap();
        stepper.step(&mut world).unwrap();
    }

    let va = world.body(a).unwrap().state.linear_velocity();
    let vb = world.body(b).unwrap().state.linear_velocity();
    assert_relative_eq!(va * 1.0 + vb * 3.0, Vector3::zeros(), epsilon = 1e-9);
    // Body 1 is pushed along the axis, body 2 against it.
    assert!(va.x > 0.0 && vb.x < 0.0);
    assert_relative_eq!(va.x, 6.0 * 10.0 / 60.0, epsilon = 1e-6);

    let (joint, bodies) = world.joint_and_bodies(slider).unwrap();
    let slider = joint.as_prismatic().unwrap();
    assert_relative_eq!(
        slider.position_rate(&bodies).unwrap(),
        va.x - vb.x,
        epsilon = 1e-6
    );
}

#[test]
fn test_chain_feedback_carries_the_weight_below() {
    let mut world = World::new(SimulationConfig::realtime());
    let upper = ball(&mut world, 0.0);
    let lower = world.add_body(
        RigidBodyState::at_rest(Pose::from_position(Point3::new(0.0, 0.0, -1.0))),
        MassProperties::sphere(2.0, 0.1),
    );
    let top = world.create_joint(JointType::Spherical);
    let link = world.create_joint(JointType::Spherical);
    world.attach(top, Some(upper), None).unwrap();
    world.attach(link, Some(upper), Some(lower)).unwrap();
    {
        let (joint, bodies) = world.joint_and_bodies_mut(link).unwrap();
        joint
            .as_spherical_mut()
            .and_then(|j| j.set_anchor(&bodies, Vector3::new(0.0, 0.0, -0.5)))
            .unwrap();
    }
    world.set_joint_feedback(top, true).unwrap();
    world.set_joint_feedback(link, true).unwrap();

    Stepper::new().step(&mut world).unwrap();

    let g = world.config().gravity.acceleration;
    let top_feedback = *world.joint_feedback(top).unwrap().unwrap();
    let link_feedback = *world.joint_feedback(link).unwrap().unwrap();

    // The top joint carries both bodies; the link carries the lower one.
    assert_relative_eq!(top_feedback.force1, -g * 3.0, epsilon = 1e-4);
    assert_relative_eq!(link_feedback.force2, -g * 2.0, epsilon = 1e-4);
    assert_relative_eq!(link_feedback.force1, g * 2.0, epsilon = 1e-4);
    assert_relative_eq!(top_feedback.force2, Vector3::zeros());
    assert!(world.are_connected(upper, lower).unwrap());
}
