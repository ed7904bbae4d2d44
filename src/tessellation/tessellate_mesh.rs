use std::collections::HashMap;

use crate::error::{Result, TessellationError};
use crate::math::polygon_2d::{newell_normal, project_to_plane, triangulate};
use crate::math::TOLERANCE;
use crate::mesh::{Mesh, VertexId};

use super::TriangleMesh;

/// Converts a polygon mesh into an indexed triangle mesh.
///
/// Vertices are shared between triangles; faces with zero area are skipped.
#[derive(Debug, Default)]
pub struct TessellateMesh;

impl TessellateMesh {
    /// Creates a new `TessellateMesh` operation.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Executes the tessellation.
    ///
    /// # Errors
    ///
    /// Returns `TessellationError::InvalidParameters` if the mesh has more
    /// vertices than a `u32` index can address, or an error if a face
    /// references a missing vertex.
    #[allow(clippy::cast_possible_truncation)]
    pub fn execute(&self, mesh: &Mesh) -> Result<TriangleMesh> {
        if u32::try_from(mesh.vertex_count()).is_err() {
            return Err(TessellationError::InvalidParameters("too many vertices".into()).into());
        }
        let mut out = TriangleMesh::default();
        let mut index: HashMap<VertexId, u32> = HashMap::with_capacity(mesh.vertex_count());
        for (v, p) in mesh.vertices() {
            index.insert(v, out.vertices.len() as u32);
            out.vertices.push(*p);
        }
        for (fid, verts) in mesh.faces() {
            let pts = mesh.face_points(fid)?;
            let normal = newell_normal(&pts);
            if normal.norm() < TOLERANCE {
                continue;
            }
            let tris = if verts.len() == 3 {
                vec![[0, 1, 2]]
            } else {
                triangulate(&project_to_plane(&pts, &normal))
            };
            for [a, b, c] in tris {
                out.indices.push([index[&verts[a]], index[&verts[b]], index[&verts[c]]]);
            }
        }
        Ok(out)
    }
}
