use crate::error::{GeometryError, Result};
use crate::math::{Point3, Vector3, TOLERANCE};
use crate::mesh::Mesh;

/// Mirrors a mesh across a plane defined by a point and normal.
///
/// Face windings are reversed so the copy stays outward-facing.
pub struct Mirror {
    plane_origin: Point3,
    plane_normal: Vector3,
}

impl Mirror {
    /// Creates a new `Mirror` operation.
    #[must_use]
    pub fn new(plane_origin: Point3, plane_normal: Vector3) -> Self {
        Self {
            plane_origin,
            plane_normal,
        }
    }

    /// Executes the mirror, returning a reflected copy.
    ///
    /// # Errors
    ///
    /// Returns an error if the plane normal is zero.
    pub fn execute(&self, mesh: &Mesh) -> Result<Mesh> {
        let len = self.plane_normal.norm();
        if len < TOLERANCE {
            return Err(GeometryError::ZeroVector.into());
        }
        let n = self.plane_normal / len;
        let mut out = Mesh::new();
        let map = out.merge(mesh)?;
        for new in map.values() {
            let p = out.point(*new)?;
            let d = (p - self.plane_origin).dot(&n);
            out.set_point(*new, p - n * (2.0 * d))?;
        }
        out.flip_all();
        Ok(out)
    }
}
