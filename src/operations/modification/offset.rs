use crate::error::{OperationError, Result, TopologyError};
use crate::math::{Point3, Vector3, TOLERANCE};
use crate::mesh::loops::vertex_normals;
use crate::mesh::{EdgeKey, EdgeMap, Mesh, VertexId};

/// Smallest cosine between the mitre direction and an adjacent edge normal
/// before the mitre is capped.
const MITRE_LIMIT: f64 = 0.25;

/// Local frame at one vertex of a boundary loop.
///
/// `direction` points away from the surface, in the plane of the faces
/// owning the adjacent boundary edges; `scale` stretches it so that the
/// offset edges stay parallel to the originals; `normal` is the surface
/// normal at the vertex.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LoopFrame {
    pub vertex: VertexId,
    pub origin: Point3,
    pub direction: Vector3,
    pub scale: f64,
    pub normal: Vector3,
}

impl LoopFrame {
    /// The point `width` outward along the surface and `depth` along the
    /// normal.
    #[must_use]
    pub fn at(&self, width: f64, depth: f64) -> Point3 {
        self.origin + self.direction * (width * self.scale) + self.normal * depth
    }
}

/// Computes the offset frames of a boundary loop.
///
/// The loop must run in the direction its faces traverse it (as returned by
/// [`boundary_loops`](crate::mesh::loops::boundary_loops)), so the surface
/// lies on its left.
pub struct OffsetLoop {
    vertices: Vec<VertexId>,
}

impl OffsetLoop {
    #[must_use]
    pub fn new(vertices: Vec<VertexId>) -> Self {
        Self { vertices }
    }

    /// Executes the operation, returning one frame per loop vertex.
    ///
    /// # Errors
    ///
    /// Returns `OperationError::InvalidInput` for loops shorter than three
    /// vertices and `TopologyError::InvalidTopology` if a loop edge is not a
    /// boundary edge of `mesh`.
    pub fn execute(&self, mesh: &Mesh) -> Result<Vec<LoopFrame>> {
        let n = self.vertices.len();
        if n < 3 {
            return Err(OperationError::InvalidInput("offset loop needs 3 vertices".into()).into());
        }
        let edges = EdgeMap::build(mesh);
        let normals = vertex_normals(mesh);

        // Outward in-plane normal of each loop edge i -> i+1.
        let mut outward = Vec::with_capacity(n);
        for i in 0..n {
            let a = self.vertices[i];
            let b = self.vertices[(i + 1) % n];
            let uses = edges.uses(&EdgeKey::new(a, b));
            let [owner] = uses else {
                return Err(TopologyError::InvalidTopology(format!(
                    "loop edge has {} faces, expected 1",
                    uses.len()
                ))
                .into());
            };
            let face_normal = mesh.face_normal(owner.face)?;
            let tangent = mesh.point(b)? - mesh.point(a)?;
            let sign = if owner.from == a { 1.0 } else { -1.0 };
            let o = tangent.cross(&face_normal) * sign;
            let len = o.norm();
            outward.push(if len < TOLERANCE { Vector3::zeros() } else { o / len });
        }

        let mut frames = Vec::with_capacity(n);
        for i in 0..n {
            let v = self.vertices[i];
            let before = outward[(i + n - 1) % n];
            let after = outward[i];
            let sum = before + after;
            let len = sum.norm();
            let direction = if len < TOLERANCE { after } else { sum / len };
            let cos = direction.dot(&after).max(MITRE_LIMIT);
            frames.push(LoopFrame {
                vertex: v,
                origin: mesh.point(v)?,
                direction,
                scale: 1.0 / cos,
                normal: normals.get(&v).copied().unwrap_or_else(Vector3::z),
            });
        }
        Ok(frames)
    }
}
