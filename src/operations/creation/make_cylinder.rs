use nalgebra::Unit;

use crate::error::{OperationError, Result};
use crate::math::{frame, Isometry3, Point2, Point3, UnitQuaternion, Vector3, TOLERANCE};
use crate::mesh::Mesh;

use super::make_prism::{circle_profile, MakePrism};

/// Creates a faceted cylinder from base center, radius, axis, and height.
///
/// Internally extrudes a regular polygon along local Z and rotates the
/// result onto the requested axis.
pub struct MakeCylinder {
    center: Point3,
    radius: f64,
    axis: Vector3,
    height: f64,
    segments: usize,
}

impl MakeCylinder {
    /// Creates a new `MakeCylinder` operation.
    #[must_use]
    pub fn new(center: Point3, radius: f64, axis: Vector3, height: f64, segments: usize) -> Self {
        Self {
            center,
            radius,
            axis,
            height,
            segments,
        }
    }

    /// Executes the operation, returning the cylinder.
    ///
    /// # Errors
    ///
    /// Returns an error if the radius or height is near zero, the axis is
    /// degenerate, or fewer than three segments are requested.
    pub fn execute(&self) -> Result<Mesh> {
        if self.radius < TOLERANCE {
            return Err(
                OperationError::InvalidInput("cylinder radius must be positive".into()).into(),
            );
        }
        if self.height.abs() < TOLERANCE {
            return Err(
                OperationError::InvalidInput("cylinder height must be non-zero".into()).into(),
            );
        }
        if self.segments < 3 {
            return Err(OperationError::InvalidInput("cylinder needs 3 segments".into()).into());
        }
        let axis_len = self.axis.norm();
        if axis_len < TOLERANCE {
            return Err(
                OperationError::InvalidInput("cylinder axis must be non-zero".into()).into(),
            );
        }
        let axis = self.axis / axis_len;

        let profile = circle_profile(Point2::origin(), self.radius, self.segments);
        let mut mesh = MakePrism::new(profile, 0.0, self.height).execute()?;

        let rotation = UnitQuaternion::rotation_between(&Vector3::z(), &axis).unwrap_or_else(|| {
            // Antiparallel: half turn about any perpendicular.
            UnitQuaternion::from_axis_angle(
                &Unit::new_normalize(frame::any_perpendicular(&axis)),
                std::f64::consts::PI,
            )
        });
        mesh.transform(&Isometry3::from_parts(self.center.coords.into(), rotation));
        Ok(mesh)
    }
}
