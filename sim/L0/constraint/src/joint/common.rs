//! Row builders and geometry conversions shared by the joint variants.

use nalgebra::{UnitQuaternion, Vector3};
use sim_types::{RigidBodyState, SimError};

use crate::math::rotation_error;
use crate::rows::{RowWriter, WrenchPair};

/// Body-local anchors for a world point: body 1 frame, and body 2 frame or
/// world coordinates when there is no second body.
pub(crate) fn anchors_at(
    first: &RigidBodyState,
    second: Option<&RigidBodyState>,
    point: &Vector3<f64>,
) -> (Vector3<f64>, Vector3<f64>) {
    (
        first.world_to_local(point),
        second.map_or(*point, |b| b.world_to_local(point)),
    )
}

/// World position of the body-2 anchor.
pub(crate) fn anchor2_world(second: Option<&RigidBodyState>, anchor2: &Vector3<f64>) -> Vector3<f64> {
    second.map_or(*anchor2, |b| b.local_to_world(anchor2))
}

/// Body-local copies of a world direction, as for [`anchors_at`].
pub(crate) fn axes_at(
    first: &RigidBodyState,
    second: Option<&RigidBodyState>,
    axis: &Vector3<f64>,
) -> (Vector3<f64>, Vector3<f64>) {
    (
        first.vector_to_local(axis),
        second.map_or(*axis, |b| b.vector_to_local(axis)),
    )
}

/// World direction of an axis stored against body 2 (or the world).
pub(crate) fn axis2_world(second: Option<&RigidBodyState>, axis2: &Vector3<f64>) -> Vector3<f64> {
    second.map_or(*axis2, |b| b.vector_to_world(axis2))
}

/// Three rows keeping the two anchors coincident.
#[allow(clippy::too_many_arguments)]
pub(crate) fn ball_rows(
    writer: &mut RowWriter<'_>,
    start: usize,
    first: &RigidBodyState,
    second: Option<&RigidBodyState>,
    anchor1: &Vector3<f64>,
    anchor2: &Vector3<f64>,
    erp: f64,
    cfm: f64,
) {
    let k = writer.fps() * erp;
    let a1 = first.vector_to_world(anchor1);
    let p1 = first.position().coords;
    let (a2, target) = match second {
        Some(b) => {
            let a2 = b.vector_to_world(anchor2);
            (Some(a2), a2 + b.position().coords)
        }
        None => (None, *anchor2),
    };
    let error = target - a1 - p1;

    for i in 0..3 {
        let e = Vector3::ith(i, 1.0);
        let row = writer.row(start + i);
        row.j1_linear = e;
        row.j1_angular = a1.cross(&e);
        if let Some(a2) = a2 {
            row.j2_linear = -e;
            row.j2_angular = e.cross(&a2);
        }
        row.rhs = k * error[i];
        row.cfm = cfm;
    }
}

/// Three rows holding the relative orientation at the snapshot `qrel`.
#[allow(clippy::too_many_arguments)]
pub(crate) fn fixed_orientation_rows(
    writer: &mut RowWriter<'_>,
    start: usize,
    first: &RigidBodyState,
    second: Option<&RigidBodyState>,
    qrel: &UnitQuaternion<f64>,
    erp: f64,
    cfm: f64,
) {
    let k = writer.fps() * erp;
    let qerr = rotation_error(first, second, qrel);
    // Shortest arc: the error vector must not depend on the quaternion sign.
    let imag = if qerr.w < 0.0 { -qerr.imag() } else { qerr.imag() };
    let error = first.vector_to_world(&imag);

    for i in 0..3 {
        let e = Vector3::ith(i, 1.0);
        let row = writer.row(start + i);
        row.j1_angular = e;
        if second.is_some() {
            row.j2_angular = -e;
        }
        row.rhs = 2.0 * k * error[i];
        row.cfm = cfm;
    }
}

/// Reject effort slices of the wrong arity or with non-finite entries.
pub(crate) fn check_efforts(efforts: &[f64], expected: usize) -> sim_types::Result<()> {
    if efforts.len() != expected {
        return Err(SimError::InvalidParameterValue {
            param: "effort",
            value: efforts.len() as f64,
            reason: "wrong number of efforts for this joint",
        });
    }
    if let Some(&value) = efforts.iter().find(|e| !e.is_finite()) {
        return Err(SimError::InvalidParameterValue {
            param: "effort",
            value,
            reason: "must be finite",
        });
    }
    Ok(())
}

/// Equal and opposite torques about a world axis.
pub(crate) fn torque_pair(torque: Vector3<f64>) -> WrenchPair {
    let mut pair = WrenchPair::default();
    pair.first.torque = torque;
    pair.second.torque = -torque;
    pair
}

/// Equal and opposite forces along a world axis.
///
/// Between two bodies the force acts at the midpoint of their centers, which
/// adds the same decoupling torque to both.
pub(crate) fn force_pair(
    first: &RigidBodyState,
    second: Option<&RigidBodyState>,
    force: Vector3<f64>,
) -> WrenchPair {
    let mut pair = WrenchPair::default();
    pair.first.force = force;
    pair.second.force = -force;
    if let Some(second) = second {
        let half = 0.5 * (second.position() - first.position());
        let ltd = half.cross(&force);
        pair.first.torque = ltd;
        pair.second.torque = ltd;
    }
    pair
}
