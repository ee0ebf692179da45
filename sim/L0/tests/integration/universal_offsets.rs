//! Re-zeroing universal joint angles through a world.

use approx::assert_relative_eq;
use sim_conformance_tests::{Rig, RIG_DT};
use sim_constraint::{Joint, JointType, RowBlock};
use sim_types::SimulationConfig;

fn universal_rig() -> Rig {
    Rig::new(JointType::Universal, SimulationConfig::with_timestep(RIG_DT))
        .expect("rig should build")
}

#[test]
fn test_axis1_offset_reads_back_without_moving_bodies() {
    let mut rig = universal_rig();
    let (first, second) = (rig.first_state().unwrap(), rig.second_state().unwrap());

    {
        let (joint, bodies) = rig.world.joint_and_bodies_mut(rig.joint).unwrap();
        let universal = joint.as_universal_mut().unwrap();
        assert_relative_eq!(universal.angle1(&bodies).unwrap(), 0.0, epsilon = 1e-9);

        let axis = universal.axis1(&bodies).unwrap();
        universal.set_axis1_offset(&bodies, axis, 0.3, -0.2).unwrap();
        let (angle1, angle2) = universal.angles(&bodies).unwrap();
        assert_relative_eq!(angle1, 0.3, epsilon = 1e-9);
        assert_relative_eq!(angle2, -0.2, epsilon = 1e-9);
    }

    assert_eq!(rig.first_state().unwrap(), first);
    assert_eq!(rig.second_state().unwrap(), second);
}

#[test]
fn test_axis2_offset_reads_back_without_moving_bodies() {
    let mut rig = universal_rig();
    let (first, second) = (rig.first_state().unwrap(), rig.second_state().unwrap());

    let (joint, bodies) = rig.world.joint_and_bodies_mut(rig.joint).unwrap();
    let universal = joint.as_universal_mut().unwrap();
    let axis = universal.axis2(&bodies).unwrap();
    universal.set_axis2_offset(&bodies, axis, -0.4, 0.25).unwrap();
    assert_relative_eq!(universal.angle1(&bodies).unwrap(), -0.4, epsilon = 1e-9);
    assert_relative_eq!(universal.angle2(&bodies).unwrap(), 0.25, epsilon = 1e-9);

    assert_eq!(rig.first_state().unwrap(), first);
    assert_eq!(rig.second_state().unwrap(), second);
}

#[test]
fn test_stops_measure_from_the_new_zero() {
    let mut rig = universal_rig();
    let (joint, bodies) = rig.world.joint_and_bodies_mut(rig.joint).unwrap();
    joint.set_fmax(1, 0.0).unwrap();
    {
        let universal = joint.as_universal_mut().unwrap();
        let axis = universal.axis1(&bodies).unwrap();
        universal.set_axis1_offset(&bodies, axis, 0.3, 0.0).unwrap();
    }

    joint.set_stops(1, 0.3 - 1e-6, 1.0).unwrap();
    assert_eq!(RowBlock::assemble(joint, &bodies, 2.0).count.total, 4);

    joint.set_stops(1, 0.3 + 1e-6, 1.0).unwrap();
    let block = RowBlock::assemble(joint, &bodies, 2.0);
    assert_eq!(block.count.total, 5);
    assert_eq!(block.count.unconditional, 4);
}
