use crate::error::{OperationError, Result};
use crate::math::Point3;
use crate::mesh::{Mesh, VertexId};

/// Extrudes a closed boundary loop straight down (or up) onto the plane
/// `z = to_z`, flattening it.
///
/// The loop must run in the direction its faces traverse it. Returns the
/// new loop, vertex-for-vertex aligned with the input.
pub struct ExtrudeLoop {
    to_z: f64,
}

impl ExtrudeLoop {
    #[must_use]
    pub fn new(to_z: f64) -> Self {
        Self { to_z }
    }

    /// Executes the extrusion.
    ///
    /// # Errors
    ///
    /// Returns `OperationError::InvalidInput` for loops shorter than three
    /// vertices, or an error if a vertex is missing.
    pub fn execute(&self, mesh: &mut Mesh, vertices: &[VertexId]) -> Result<Vec<VertexId>> {
        let n = vertices.len();
        if n < 3 {
            return Err(OperationError::InvalidInput("extruded loop needs 3 vertices".into()).into());
        }
        let mut lowered = Vec::with_capacity(n);
        for v in vertices {
            let p = mesh.point(*v)?;
            lowered.push(mesh.add_vertex(Point3::new(p.x, p.y, self.to_z)));
        }
        for i in 0..n {
            let j = (i + 1) % n;
            mesh.add_face(&[vertices[j], vertices[i], lowered[i], lowered[j]])?;
        }
        Ok(lowered)
    }
}
