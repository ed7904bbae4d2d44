//! Rigid-transform helpers used to place keys and tools.

use nalgebra::{Translation3, Unit};

use super::{Isometry3, Point3, UnitQuaternion, Vector3};

/// Rotation by `angle` radians about `axis` passing through `pivot`.
#[must_use]
pub fn rotation_about(axis: &Unit<Vector3>, angle: f64, pivot: &Point3) -> Isometry3 {
    Isometry3::rotation_wrt_point(UnitQuaternion::from_axis_angle(axis, angle), *pivot)
}

/// Rotation about the world X axis through `pivot`.
#[must_use]
pub fn rotation_x_about(angle: f64, pivot: &Point3) -> Isometry3 {
    rotation_about(&Vector3::x_axis(), angle, pivot)
}

/// Rotation about the world Y axis through `pivot`.
#[must_use]
pub fn rotation_y_about(angle: f64, pivot: &Point3) -> Isometry3 {
    rotation_about(&Vector3::y_axis(), angle, pivot)
}

/// Pure translation.
#[must_use]
pub fn translation(v: Vector3) -> Isometry3 {
    Isometry3::from_parts(Translation3::from(v), UnitQuaternion::identity())
}

/// Extrinsic X-then-Y-then-Z rotation about the origin, angles in radians.
#[must_use]
pub fn euler_xyz(x: f64, y: f64, z: f64) -> UnitQuaternion {
    UnitQuaternion::from_euler_angles(x, y, z)
}

/// Returns any unit vector perpendicular to `n`.
#[must_use]
pub fn any_perpendicular(n: &Vector3) -> Vector3 {
    let helper = if n.x.abs() < 0.9 {
        Vector3::x()
    } else {
        Vector3::y()
    };
    n.cross(&helper).normalize()
}
