//! Swapping body 1 and body 2 at attachment while negating the axis must
//! describe the same physical constraint.

use approx::assert_relative_eq;
use nalgebra::{Point3, UnitQuaternion, Vector3};
use sim_constraint::{AnyJoint, BodyPair, Joint, JointType};
use sim_core::{Stepper, StepperConfig, World};
use sim_types::{
    BodyId, JointId, MassProperties, Pose, RigidBodyState, SimulationConfig, SolverConfig, Twist,
};

const STEPS: usize = 30;

/// Both rigs drift differently at second order in the constraint error.
const TOLERANCE: f64 = 1e-4;

struct SwapRig {
    world: World,
    a: BodyId,
    b: BodyId,
    joint: JointId,
}

fn build(
    joint_type: JointType,
    swapped: bool,
    configure: impl Fn(&mut AnyJoint, &BodyPair<'_>, f64) -> sim_types::Result<()>,
) -> SwapRig {
    let config = SimulationConfig::realtime()
        .zero_gravity()
        .solver(SolverConfig::high_accuracy());
    let mut world = World::new(config);

    let tilt = UnitQuaternion::from_euler_angles(0.2, -0.1, 0.3);
    let a = world.add_body(
        RigidBodyState::new(
            Pose::from_position_rotation(Point3::origin(), tilt),
            Twist::new(Vector3::new(0.2, 0.1, 0.0), Vector3::new(0.0, 0.5, 0.3)),
        ),
        MassProperties::sphere(1.0, 0.2),
    );
    let b = world.add_body(
        RigidBodyState::new(
            Pose::from_position(Point3::new(1.0, 0.5, 0.0)),
            Twist::new(Vector3::new(-0.1, 0.0, 0.2), Vector3::new(0.4, 0.0, 0.0)),
        ),
        MassProperties::sphere(2.0, 0.3),
    );

    let joint = world.create_joint(joint_type);
    let (first, second) = if swapped { (b, a) } else { (a, b) };
    world
        .attach(joint, Some(first), Some(second))
        .expect("attach should succeed");

    let sign = if swapped { -1.0 } else { 1.0 };
    let (any, bodies) = world.joint_and_bodies_mut(joint).expect("joint exists");
    configure(any, &bodies, sign).expect("configuration should succeed");

    SwapRig { world, a, b, joint }
}

fn run(rig: &mut SwapRig) {
    let mut stepper = Stepper::with_config(StepperConfig::zero_gravity());
    for _ in 0..STEPS {
        stepper.step(&mut rig.world).expect("step should succeed");
    }
}

fn assert_same_motion(direct: &SwapRig, swapped: &SwapRig, epsilon: f64) {
    for (x, y) in [(direct.a, swapped.a), (direct.b, swapped.b)] {
        let sx = direct.world.body(x).expect("body exists").state;
        let sy = swapped.world.body(y).expect("body exists").state;
        assert_relative_eq!(sx.position(), sy.position(), epsilon = epsilon);
        assert_relative_eq!(sx.linear_velocity(), sy.linear_velocity(), epsilon = epsilon);
        assert_relative_eq!(sx.angular_velocity(), sy.angular_velocity(), epsilon = epsilon);
    }
}

#[test]
fn test_fixed_swap_is_equivalent() {
    let configure =
        |_: &mut AnyJoint, _: &BodyPair<'_>, _: f64| -> sim_types::Result<()> { Ok(()) };
    let mut direct = build(JointType::Fixed, false, configure);
    let mut swapped = build(JointType::Fixed, true, configure);
    run(&mut direct);
    run(&mut swapped);
    assert_same_motion(&direct, &swapped, TOLERANCE);
}

#[test]
fn test_hinge_swap_with_negated_axis_is_equivalent() {
    let configure = |joint: &mut AnyJoint,
                     bodies: &BodyPair<'_>,
                     sign: f64|
     -> sim_types::Result<()> {
        let hinge = joint.as_revolute_mut()?;
        hinge.set_anchor(bodies, Vector3::new(0.5, 0.25, 0.0))?;
        hinge.set_axis(bodies, Vector3::z() * sign)?;
        joint.set_motor(1, 1.0, 0.5)
    };
    let mut direct = build(JointType::Revolute, false, configure);
    let mut swapped = build(JointType::Revolute, true, configure);
    run(&mut direct);
    run(&mut swapped);
    assert_same_motion(&direct, &swapped, TOLERANCE);

    let angle = |rig: &SwapRig| {
        let (joint, bodies) = rig.world.joint_and_bodies(rig.joint).expect("joint exists");
        joint
            .as_revolute()
            .and_then(|hinge| hinge.angle(&bodies))
            .expect("angle readable")
    };
    assert!(angle(&direct).abs() > 1e-3, "hinge did not turn");
    assert_relative_eq!(angle(&direct), angle(&swapped), epsilon = TOLERANCE);
}

#[test]
fn test_slider_swap_with_negated_axis_is_equivalent() {
    let configure = |joint: &mut AnyJoint,
                     bodies: &BodyPair<'_>,
                     sign: f64|
     -> sim_types::Result<()> {
        joint
            .as_prismatic_mut()?
            .set_axis(bodies, Vector3::new(1.0, 0.5, 0.0) * sign)?;
        joint.set_motor(1, 0.2, 0.3)
    };
    let mut direct = build(JointType::Prismatic, false, configure);
    let mut swapped = build(JointType::Prismatic, true, configure);

    let position = |rig: &SwapRig| {
        let (joint, bodies) = rig.world.joint_and_bodies(rig.joint).expect("joint exists");
        joint
            .as_prismatic()
            .and_then(|slider| slider.position(&bodies))
            .expect("position readable")
    };
    assert_relative_eq!(position(&direct), 0.0, epsilon = 1e-12);
    assert_relative_eq!(position(&swapped), 0.0, epsilon = 1e-12);

    run(&mut direct);
    run(&mut swapped);
    assert_same_motion(&direct, &swapped, TOLERANCE);
    assert_relative_eq!(position(&direct), position(&swapped), epsilon = TOLERANCE);
    assert!(position(&direct).abs() > 1e-3, "slider did not move");
}
