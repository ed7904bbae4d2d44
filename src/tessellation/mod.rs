mod cap_loop;
mod tessellate_mesh;

pub use cap_loop::CapLoop;
pub use tessellate_mesh::TessellateMesh;

use crate::math::{Aabb, Point3, Vector3};

/// An indexed triangle mesh, the form meshes take on export.
#[derive(Debug, Clone, Default)]
pub struct TriangleMesh {
    /// Vertex positions.
    pub vertices: Vec<Point3>,
    /// Triangle indices (each triple defines a counter-clockwise triangle).
    pub indices: Vec<[u32; 3]>,
}

impl TriangleMesh {
    #[must_use]
    pub fn triangle_count(&self) -> usize {
        self.indices.len()
    }

    /// Corner positions of triangle `i`.
    #[must_use]
    pub fn triangle(&self, i: usize) -> [Point3; 3] {
        let [a, b, c] = self.indices[i];
        [
            self.vertices[a as usize],
            self.vertices[b as usize],
            self.vertices[c as usize],
        ]
    }

    /// Unit normal of triangle `i`, or zero for a degenerate triangle.
    #[must_use]
    pub fn facet_normal(&self, i: usize) -> Vector3 {
        let [a, b, c] = self.triangle(i);
        (b - a).cross(&(c - a)).try_normalize(0.0).unwrap_or_else(Vector3::zeros)
    }

    #[must_use]
    pub fn bounding_box(&self) -> Option<Aabb> {
        Aabb::from_points(self.vertices.iter())
    }
}
