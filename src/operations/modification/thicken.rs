use std::collections::{BTreeMap, BTreeSet};

use tracing::debug;

use crate::error::{OperationError, Result};
use crate::math::{Vector3, TOLERANCE};
use crate::mesh::loops::{boundary_vertices, vertex_faces, vertex_normals};
use crate::mesh::{EdgeMap, Mesh, VertexId};

/// Turns an open surface into a two-sided sheet.
///
/// Every vertex gets an inner twin at `thickness` behind its normal, and
/// every face a reversed twin over those. With `rim` the two sheets are
/// joined along the boundary; without it they stay separate surfaces.
/// `keep_boundary_z` offsets boundary vertices horizontally only, so a
/// boundary lying on a floor plane stays on it.
pub struct Thicken {
    thickness: f64,
    rim: bool,
    keep_boundary_z: bool,
}

impl Thicken {
    /// Creates a new `Thicken` operation with a rim.
    #[must_use]
    pub fn new(thickness: f64) -> Self {
        Self {
            thickness,
            rim: true,
            keep_boundary_z: false,
        }
    }

    #[must_use]
    pub fn rim(mut self, rim: bool) -> Self {
        self.rim = rim;
        self
    }

    #[must_use]
    pub fn keep_boundary_z(mut self, keep: bool) -> Self {
        self.keep_boundary_z = keep;
        self
    }

    /// Executes the operation, returning the map from each original vertex
    /// to its inner twin.
    ///
    /// # Errors
    ///
    /// Returns `OperationError::InvalidInput` for a non-positive thickness,
    /// or an error if a face cannot be built.
    pub fn execute(&self, mesh: &mut Mesh) -> Result<BTreeMap<VertexId, VertexId>> {
        if self.thickness <= TOLERANCE {
            return Err(OperationError::InvalidInput("thickness must be positive".into()).into());
        }
        let normals = vertex_normals(mesh);
        let incident = vertex_faces(mesh);
        let boundary = boundary_vertices(mesh);
        let face_normals: BTreeMap<_, _> = mesh
            .face_ids()
            .into_iter()
            .map(|f| Ok((f, mesh.face_normal(f)?)))
            .collect::<Result<_>>()?;

        let mut twin = BTreeMap::new();
        for v in mesh.vertex_ids() {
            let p = mesh.point(v)?;
            let n = normals.get(&v).copied().unwrap_or_else(Vector3::zeros);
            // Compensate thinning at creases with the mean normal deviation.
            let faces = incident.get(&v).map_or(&[][..], Vec::as_slice);
            let scale = if faces.is_empty() {
                1.0
            } else {
                #[allow(clippy::cast_precision_loss)]
                let mean = faces
                    .iter()
                    .filter_map(|f| face_normals.get(f))
                    .map(|nf| nf.dot(&n))
                    .sum::<f64>()
                    / faces.len() as f64;
                1.0 / mean.clamp(0.5, 1.0)
            };
            let mut dir = -n;
            if self.keep_boundary_z && boundary.contains(&v) {
                dir.z = 0.0;
                let len = dir.norm();
                dir = if len < TOLERANCE { Vector3::zeros() } else { dir / len };
            }
            let inner = mesh.add_vertex(p + dir * self.thickness * scale);
            twin.insert(v, inner);
        }

        let originals: Vec<(crate::mesh::FaceId, Vec<VertexId>)> =
            mesh.faces().map(|(f, vs)| (f, vs.to_vec())).collect();
        let boundary_edges = if self.rim {
            EdgeMap::build(mesh).boundary_edges()
        } else {
            Vec::new()
        };
        for (_, verts) in &originals {
            let inner: Vec<VertexId> = verts.iter().rev().map(|v| twin[v]).collect();
            mesh.add_face(&inner)?;
        }
        let mut rim_faces = 0;
        for (a, b) in boundary_edges {
            mesh.add_face(&[b, a, twin[&a], twin[&b]])?;
            rim_faces += 1;
        }
        debug!(
            thickness = self.thickness,
            vertices = twin.len(),
            rim_faces,
            "thickened surface"
        );
        Ok(twin)
    }
}

/// Vertices of `twin`'s image, for tagging the inner sheet.
#[must_use]
pub fn inner_vertices(twin: &BTreeMap<VertexId, VertexId>) -> BTreeSet<VertexId> {
    twin.values().copied().collect()
}
