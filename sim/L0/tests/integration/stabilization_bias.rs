//! Error-reduction bias on equality rows, and the construction-time snapshot
//! of the world's ERP/CFM.

use nalgebra::Vector3;
use sim_conformance_tests::{Rig, RIG_DT};
use sim_constraint::{Joint, JointType, ParamId, ParamKind, RowBlock};
use sim_core::World;
use sim_types::{SimulationConfig, SolverConfig};

const FPS: f64 = 1.0 / RIG_DT;

fn rig(joint_type: JointType, erp: f64, cfm: f64) -> Rig {
    let config = SimulationConfig::with_timestep(RIG_DT)
        .solver(SolverConfig::default().stabilization(erp, cfm));
    Rig::new(joint_type, config).expect("rig should build")
}

fn assemble(rig: &mut Rig) -> RowBlock {
    let (joint, bodies) = rig
        .world
        .joint_and_bodies_mut(rig.joint)
        .expect("joint exists");
    RowBlock::assemble(joint, &bodies, FPS)
}

#[test]
fn test_zero_erp_gives_zero_bias_on_every_equality_row() {
    for joint_type in JointType::ALL {
        let mut rig = rig(joint_type, 0.0, 0.0);
        let block = assemble(&mut rig);

        for (i, row) in block.rows.iter().filter(|r| r.is_equality()).enumerate() {
            assert!(row.rhs == 0.0, "{joint_type} row {i}: rhs = {}", row.rhs);
            assert!(row.cfm == 0.0, "{joint_type} row {i}: cfm = {}", row.cfm);
        }
        assert_eq!(
            block.rows.iter().filter(|r| r.is_equality()).count(),
            block.count.unconditional,
            "{joint_type}"
        );
    }
}

#[test]
fn test_zero_erp_ignores_positional_error() {
    for joint_type in JointType::ALL {
        let mut rig = rig(joint_type, 0.0, 0.0);
        let second = rig.world.body_mut(rig.second).expect("body exists");
        let moved = second.state.position() + Vector3::new(0.0, 0.1, 0.05);
        second.state.set_position(moved);

        let block = assemble(&mut rig);
        assert!(
            block.rows.iter().filter(|r| r.is_equality()).all(|r| r.rhs == 0.0),
            "{joint_type}"
        );
    }
}

#[test]
fn test_positional_error_biases_with_default_erp() {
    let locking = JointType::ALL
        .into_iter()
        .filter(|ty| *ty != JointType::LinearMotor);
    for joint_type in locking {
        let mut rig = rig(joint_type, 0.2, 1e-10);
        let second = rig.world.body_mut(rig.second).expect("body exists");
        let moved = second.state.position() + Vector3::new(0.0, 0.1, 0.05);
        second.state.set_position(moved);

        let block = assemble(&mut rig);
        assert!(
            block
                .rows
                .iter()
                .filter(|r| r.is_equality())
                .any(|r| r.rhs.abs() > 1e-6),
            "{joint_type}: displacement should produce a bias"
        );
    }
}

#[test]
fn test_joints_keep_construction_time_defaults() {
    let config = SimulationConfig::default().solver(SolverConfig::default().stabilization(0.1, 1e-6));
    let mut world = World::new(config.clone());
    let early = world.create_joint(JointType::Universal);

    world
        .set_config(config.solver(SolverConfig::default().stabilization(0.8, 1e-3)))
        .expect("config is valid");
    let late = world.create_joint(JointType::Universal);

    let erp = ParamId::axis1(ParamKind::Erp);
    let stop_cfm = ParamId::axis2(ParamKind::StopCfm);
    let early = world.joint(early).expect("joint exists");
    let late = world.joint(late).expect("joint exists");

    assert!(early.param(erp).expect("erp readable") == 0.1);
    assert!(early.param(stop_cfm).expect("stop cfm readable") == 1e-6);
    assert!(late.param(erp).expect("erp readable") == 0.8);
    assert!(late.param(stop_cfm).expect("stop cfm readable") == 1e-3);
}
