use crate::error::{OperationError, Result};
use crate::math::{Point3, Vector3, TOLERANCE};
use crate::mesh::Mesh;

/// Creates an axis-aligned box mesh of six outward-facing quads.
pub struct MakeBox {
    min_corner: Point3,
    max_corner: Point3,
}

impl MakeBox {
    /// Creates a new `MakeBox` operation from two opposite corners.
    #[must_use]
    pub fn new(a: Point3, b: Point3) -> Self {
        Self {
            min_corner: Point3::new(a.x.min(b.x), a.y.min(b.y), a.z.min(b.z)),
            max_corner: Point3::new(a.x.max(b.x), a.y.max(b.y), a.z.max(b.z)),
        }
    }

    /// Creates a box of edge lengths `size` centered on `center`.
    #[must_use]
    pub fn centered(center: Point3, size: Vector3) -> Self {
        let half = size * 0.5;
        Self::new(center - half, center + half)
    }

    /// Executes the operation, returning the box.
    ///
    /// # Errors
    ///
    /// Returns an error if any edge length is near zero.
    pub fn execute(&self) -> Result<Mesh> {
        let size = self.max_corner - self.min_corner;
        if size.x < TOLERANCE || size.y < TOLERANCE || size.z < TOLERANCE {
            return Err(OperationError::InvalidInput("box extents must be positive".into()).into());
        }

        let mut mesh = Mesh::new();
        let (lo, hi) = (self.min_corner, self.max_corner);
        // Corner index bits: x = bit 0, y = bit 1, z = bit 2.
        let v: Vec<_> = (0..8)
            .map(|i| {
                mesh.add_vertex(Point3::new(
                    if i & 1 == 0 { lo.x } else { hi.x },
                    if i & 2 == 0 { lo.y } else { hi.y },
                    if i & 4 == 0 { lo.z } else { hi.z },
                ))
            })
            .collect();
        for [a, b, c, d] in [
            [0, 2, 3, 1],
            [4, 5, 7, 6],
            [0, 1, 5, 4],
            [2, 6, 7, 3],
            [0, 4, 6, 2],
            [1, 3, 7, 5],
        ] {
            mesh.add_face(&[v[a], v[b], v[c], v[d]])?;
        }
        Ok(mesh)
    }
}
