use crate::error::{OperationError, Result};
use crate::math::Point3;
use crate::mesh::Mesh;

use super::surface::{SurfaceIndex, SurfacePoint};

/// Finds the closest point on a mesh surface to a given point.
pub struct ClosestPoint {
    point: Point3,
}

impl ClosestPoint {
    /// Creates a new `ClosestPoint` query.
    #[must_use]
    pub fn new(point: Point3) -> Self {
        Self { point }
    }

    /// Executes the query.
    ///
    /// # Errors
    ///
    /// Returns `OperationError::InvalidInput` if the mesh has no faces.
    pub fn execute(&self, mesh: &Mesh) -> Result<SurfacePoint> {
        SurfaceIndex::build(mesh)?
            .closest(&self.point)
            .ok_or_else(|| OperationError::InvalidInput("closest point on empty mesh".into()).into())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::operations::creation::MakeBox;
    use approx::assert_relative_eq;

    #[test]
    fn inside_point_snaps_to_nearest_wall() {
        let mesh = MakeBox::new(Point3::origin(), Point3::new(4.0, 4.0, 4.0))
            .execute()
            .unwrap();
        let hit = ClosestPoint::new(Point3::new(1.0, 2.0, 2.0)).execute(&mesh).unwrap();
        assert_relative_eq!(hit.point, Point3::new(0.0, 2.0, 2.0), epsilon = 1e-12);
        assert_relative_eq!(hit.distance, 1.0, epsilon = 1e-12);
        assert!(ClosestPoint::new(Point3::origin()).execute(&Mesh::new()).is_err());
    }
}
