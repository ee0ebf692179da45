//! Reported slide rates must match the finite-difference derivative of the
//! reported slide position.

use approx::assert_relative_eq;
use nalgebra::{Point3, UnitQuaternion, Vector3};
use sim_constraint::{BodyPair, Joint, PrismaticJoint, PrismaticRevoluteJoint};
use sim_core::integrators::SemiImplicitEuler;
use sim_types::{ConstraintDefaults, Pose, RigidBodyState, Twist};

/// Half-width of the central difference.
const H: f64 = 1e-5;

fn moving_body(position: Point3<f64>, euler: (f64, f64, f64), twist: Twist) -> RigidBodyState {
    let rotation = UnitQuaternion::from_euler_angles(euler.0, euler.1, euler.2);
    RigidBodyState::new(Pose::from_position_rotation(position, rotation), twist)
}

/// Drift both bodies kinematically by `dt` (no forces).
fn drift(states: (RigidBodyState, RigidBodyState), dt: f64) -> (RigidBodyState, RigidBodyState) {
    let (mut a, mut b) = states;
    SemiImplicitEuler::integrate_position(&mut a, dt);
    SemiImplicitEuler::integrate_position(&mut b, dt);
    (a, b)
}

fn pair() -> (RigidBodyState, RigidBodyState) {
    (
        moving_body(
            Point3::new(0.3, -0.2, 0.1),
            (0.1, 0.2, -0.3),
            Twist::new(Vector3::new(0.4, -0.1, 0.25), Vector3::new(0.3, -0.6, 0.2)),
        ),
        moving_body(
            Point3::new(1.2, 0.4, -0.5),
            (-0.2, 0.05, 0.4),
            Twist::new(Vector3::new(-0.3, 0.2, 0.1), Vector3::new(-0.2, 0.1, 0.5)),
        ),
    )
}

#[test]
fn test_slider_rate_matches_finite_difference() {
    let (a, b) = pair();
    let mut slider = PrismaticJoint::new(&ConstraintDefaults::default());
    {
        let bodies = BodyPair::between(&a, &b);
        slider.set_relative_values(&bodies);
        slider
            .set_axis(&bodies, Vector3::new(1.0, 0.3, -0.2))
            .expect("axis accepted");
    }

    // Move away from the reference so every term of the derivative matters.
    let (a, b) = drift((a, b), 0.4);

    let position_at = |dt: f64| {
        let (a, b) = drift((a, b), dt);
        slider
            .position(&BodyPair::between(&a, &b))
            .expect("attached")
    };
    let numeric = (position_at(H) - position_at(-H)) / (2.0 * H);
    let analytic = slider
        .position_rate(&BodyPair::between(&a, &b))
        .expect("attached");

    assert!(analytic.abs() > 1e-3, "rate should be non-trivial");
    assert_relative_eq!(analytic, numeric, epsilon = 1e-6);
}

#[test]
fn test_slider_to_world_rate_matches_finite_difference() {
    let (a, _) = pair();
    let mut slider = PrismaticJoint::new(&ConstraintDefaults::default());
    {
        let bodies = BodyPair::to_world(&a);
        slider.set_relative_values(&bodies);
        slider.set_axis(&bodies, Vector3::y()).expect("axis accepted");
    }
    let (a, _) = drift((a, a), 0.4);

    let position_at = |dt: f64| {
        let (moved, _) = drift((a, a), dt);
        slider
            .position(&BodyPair::to_world(&moved))
            .expect("attached")
    };
    let numeric = (position_at(H) - position_at(-H)) / (2.0 * H);
    let analytic = slider
        .position_rate(&BodyPair::to_world(&a))
        .expect("attached");

    assert_relative_eq!(analytic, numeric, epsilon = 1e-6);
}

#[test]
fn test_prismatic_revolute_rate_matches_finite_difference() {
    let (a, b) = pair();
    let mut pr = PrismaticRevoluteJoint::new(&ConstraintDefaults::default());
    {
        let bodies = BodyPair::between(&a, &b);
        pr.set_relative_values(&bodies);
        pr.set_anchor(&bodies, Vector3::new(0.7, 0.1, -0.2))
            .expect("anchor accepted");
        pr.set_axis1(&bodies, Vector3::x()).expect("axis accepted");
        pr.set_axis2(&bodies, Vector3::z()).expect("axis accepted");
    }
    let (a, b) = drift((a, b), 0.4);

    let position_at = |dt: f64| {
        let (a, b) = drift((a, b), dt);
        pr.position(&BodyPair::between(&a, &b)).expect("attached")
    };
    let numeric = (position_at(H) - position_at(-H)) / (2.0 * H);
    let analytic = pr
        .position_rate(&BodyPair::between(&a, &b))
        .expect("attached");

    assert!(analytic.abs() > 1e-3, "rate should be non-trivial");
    assert_relative_eq!(analytic, numeric, epsilon = 1e-6);
}

#[test]
fn test_prismatic_revolute_angle_rate_for_pure_twist() {
    // With relative rotation only about the rotoide axis the hinge rate is
    // the exact derivative of the angle.
    let a = RigidBodyState::at_rest(Pose::identity());
    let b = moving_body(
        Point3::new(1.0, 0.0, 0.0),
        (0.0, 0.0, 0.0),
        Twist::angular(Vector3::new(0.0, 0.0, 0.8)),
    );
    let mut pr = PrismaticRevoluteJoint::new(&ConstraintDefaults::default());
    {
        let bodies = BodyPair::between(&a, &b);
        pr.set_relative_values(&bodies);
        pr.set_anchor(&bodies, Vector3::new(1.0, 0.0, 0.0))
            .expect("anchor accepted");
        pr.set_axis1(&bodies, Vector3::x()).expect("axis accepted");
        pr.set_axis2(&bodies, Vector3::z()).expect("axis accepted");
    }

    let angle_at = |dt: f64| {
        let (a, b) = drift((a, b), dt);
        pr.angle(&BodyPair::between(&a, &b)).expect("attached")
    };
    let numeric = (angle_at(H) - angle_at(-H)) / (2.0 * H);
    let analytic = pr.angle_rate(&BodyPair::between(&a, &b)).expect("attached");

    assert_relative_eq!(analytic.abs(), 0.8, epsilon = 1e-9);
    assert_relative_eq!(analytic, numeric, epsilon = 1e-6);
}
