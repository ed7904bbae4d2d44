use crate::error::{GeometryError, Result};
use crate::math::{Point3, Vector3, TOLERANCE};
use crate::mesh::Mesh;

use super::surface::{SurfaceIndex, SurfacePoint};

/// Casts a ray against a mesh.
pub struct RayCast {
    origin: Point3,
    direction: Vector3,
}

impl RayCast {
    /// Creates a new `RayCast` query.
    #[must_use]
    pub fn new(origin: Point3, direction: Vector3) -> Self {
        Self { origin, direction }
    }

    /// Executes the query, returning the first hit.
    ///
    /// # Errors
    ///
    /// Returns `GeometryError::ZeroVector` for a zero direction and
    /// `GeometryError::RayMissed` when nothing is hit.
    pub fn execute(&self, mesh: &Mesh) -> Result<SurfacePoint> {
        self.execute_indexed(&SurfaceIndex::build(mesh)?)
    }

    /// Same as [`execute`](Self::execute) against a prebuilt index.
    ///
    /// # Errors
    ///
    /// See [`execute`](Self::execute).
    pub fn execute_indexed(&self, index: &SurfaceIndex) -> Result<SurfacePoint> {
        let len = self.direction.norm();
        if len < TOLERANCE {
            return Err(GeometryError::ZeroVector.into());
        }
        index
            .ray(&self.origin, &(self.direction / len))
            .ok_or_else(|| {
                GeometryError::RayMissed(format!(
                    "from ({:.2}, {:.2}, {:.2})",
                    self.origin.x, self.origin.y, self.origin.z
                ))
                .into()
            })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::operations::creation::MakeBox;
    use approx::assert_relative_eq;

    #[test]
    fn ray_distance_is_in_world_units() {
        let mesh = MakeBox::new(Point3::new(-1.0, -1.0, -1.0), Point3::new(1.0, 1.0, 1.0))
            .execute()
            .unwrap();
        let hit = RayCast::new(Point3::new(10.0, 0.0, 0.0), Vector3::new(-3.0, 0.0, 0.0))
            .execute(&mesh)
            .unwrap();
        assert_relative_eq!(hit.distance, 9.0, epsilon = 1e-12);
        assert_relative_eq!(hit.normal, Vector3::x(), epsilon = 1e-12);
    }

    #[test]
    fn miss_is_an_error() {
        let mesh = MakeBox::new(Point3::origin(), Point3::new(1.0, 1.0, 1.0))
            .execute()
            .unwrap();
        let err = RayCast::new(Point3::new(0.5, 0.5, 2.0), Vector3::z()).execute(&mesh);
        assert!(err.is_err());
        assert!(RayCast::new(Point3::origin(), Vector3::zeros()).execute(&mesh).is_err());
    }
}
