//! Geometric helpers shared by the joint variants.

use nalgebra::{Matrix3, Rotation3, Unit, UnitQuaternion, Vector3};
use sim_types::{RigidBodyState, SimError};

/// Axes shorter than this are rejected as degenerate.
pub const AXIS_EPSILON: f64 = 1e-12;

/// Normalize a user-supplied axis, rejecting zero-length and non-finite input.
pub fn normalize_axis(axis: &Vector3<f64>) -> sim_types::Result<Vector3<f64>> {
    if !axis.iter().all(|c| c.is_finite()) {
        return Err(SimError::degenerate_axis(format!(
            "axis {:?} is not finite",
            axis.as_slice()
        )));
    }
    let norm = axis.norm();
    if norm <= AXIS_EPSILON {
        return Err(SimError::degenerate_axis("axis has zero length"));
    }
    Ok(axis / norm)
}

/// Two unit vectors spanning the plane perpendicular to unit vector `n`.
///
/// Returns `(p, q)` with `q = n × p`, so `(n, p, q)` is a right-handed
/// orthonormal frame. The branch on the largest component keeps the
/// construction well conditioned for every direction.
#[must_use]
pub fn plane_space(n: &Vector3<f64>) -> (Vector3<f64>, Vector3<f64>) {
    if n.z.abs() > std::f64::consts::FRAC_1_SQRT_2 {
        let a = n.y * n.y + n.z * n.z;
        let k = 1.0 / a.sqrt();
        let p = Vector3::new(0.0, -n.z * k, n.y * k);
        let q = Vector3::new(a * k, -n.x * p.z, n.x * p.y);
        (p, q)
    } else {
        let a = n.x * n.x + n.y * n.y;
        let k = 1.0 / a.sqrt();
        let p = Vector3::new(-n.y * k, n.x * k, 0.0);
        let q = Vector3::new(-n.z * p.y, n.z * p.x, a * k);
        (p, q)
    }
}

/// Angle of the relative rotation `q` about `axis`, in `(-π, π]`.
///
/// `q` is expected to be (close to) a pure rotation about `axis`. The sign
/// convention reports positive angles when body 1 turns positively about
/// the axis relative to body 2. The result does not depend on the sign of
/// the quaternion.
#[must_use]
pub fn hinge_angle_from_relative(q: &UnitQuaternion<f64>, axis: &Vector3<f64>) -> f64 {
    let imag = q.imag();
    let sin_half = imag.norm();
    let cos_half = q.w;
    let mut theta = if imag.dot(axis) >= 0.0 {
        2.0 * sin_half.atan2(cos_half)
    } else {
        2.0 * sin_half.atan2(-cos_half)
    };
    if theta > std::f64::consts::PI {
        theta -= 2.0 * std::f64::consts::PI;
    }
    -theta
}

/// Rotation whose first column is `a` and whose second column is the part of
/// `b` perpendicular to `a`; the third column completes a right-handed frame.
pub fn rotation_from_two_axes(
    a: &Vector3<f64>,
    b: &Vector3<f64>,
) -> sim_types::Result<UnitQuaternion<f64>> {
    let a = normalize_axis(a)?;
    let b_perp = b - a * a.dot(b);
    let b_perp = normalize_axis(&b_perp)
        .map_err(|_| SimError::degenerate_axis("axes are parallel"))?;
    let c = a.cross(&b_perp);
    let m = Matrix3::from_columns(&[a, b_perp, c]);
    Ok(UnitQuaternion::from_rotation_matrix(
        &Rotation3::from_matrix_unchecked(m),
    ))
}

/// Rotation by `angle` about the (unit) direction `axis`.
#[must_use]
pub fn axis_angle(axis: &Vector3<f64>, angle: f64) -> UnitQuaternion<f64> {
    UnitQuaternion::from_axis_angle(&Unit::new_unchecked(*axis), angle)
}

/// Relative rotation snapshot `q1⁻¹·q2`, or `q1⁻¹` when the joint is attached
/// to the world.
#[must_use]
pub fn relative_rotation(
    first: &RigidBodyState,
    second: Option<&RigidBodyState>,
) -> UnitQuaternion<f64> {
    match second {
        Some(second) => first.orientation().inverse() * second.orientation(),
        None => first.orientation().inverse(),
    }
}

/// Current relative rotation measured against the snapshot `qrel`:
/// `q1⁻¹·q2·qrel⁻¹`, or `q1⁻¹·qrel⁻¹` with no second body.
#[must_use]
pub fn rotation_error(
    first: &RigidBodyState,
    second: Option<&RigidBodyState>,
    qrel: &UnitQuaternion<f64>,
) -> UnitQuaternion<f64> {
    match second {
        Some(second) => first.orientation().inverse() * second.orientation() * qrel.inverse(),
        None => first.orientation().inverse() * qrel.inverse(),
    }
}

/// Hinge angle of body 1 relative to body 2 about the body-1 axis `axis`,
/// measured from the snapshot `qrel`.
#[must_use]
pub fn hinge_angle(
    first: &RigidBodyState,
    second: Option<&RigidBodyState>,
    axis: &Vector3<f64>,
    qrel: &UnitQuaternion<f64>,
) -> f64 {
    hinge_angle_from_relative(&rotation_error(first, second, qrel), axis)
}
