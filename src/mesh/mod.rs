pub mod edge;
pub mod loops;
pub mod region;

pub use edge::{EdgeKey, EdgeMap};
pub use region::{RegionTracker, Selection, TagPositions};

use std::collections::BTreeMap;

use slotmap::SlotMap;

use crate::error::{OperationError, Result, TopologyError};
use crate::math::polygon_2d::newell_normal;
use crate::math::{Aabb, Isometry3, Point3, Vector3, TOLERANCE};

slotmap::new_key_type! {
    /// Unique identifier for a vertex in a mesh.
    pub struct VertexId;
}

slotmap::new_key_type! {
    /// Unique identifier for a face in a mesh.
    pub struct FaceId;
}

/// Data associated with a mesh vertex.
#[derive(Debug, Clone)]
pub struct VertexData {
    /// The 3D position of the vertex.
    pub point: Point3,
}

/// Data associated with a mesh face: an ordered vertex loop.
///
/// Vertices wind counter-clockwise when seen from the side the face points to.
#[derive(Debug, Clone)]
pub struct FaceData {
    pub vertices: Vec<VertexId>,
}

/// Polygon mesh arena owning vertices and n-gon faces.
///
/// Faces reference vertices by [`VertexId`] (generational indices), so ids
/// of untouched elements stay valid across edits and stale ids are detected
/// instead of silently aliasing new elements.
#[derive(Debug, Clone, Default)]
pub struct Mesh {
    vertices: SlotMap<VertexId, VertexData>,
    faces: SlotMap<FaceId, FaceData>,
}

impl Mesh {
    /// Creates a new, empty mesh.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    // --- Vertex operations ---

    /// Inserts a vertex and returns its ID.
    pub fn add_vertex(&mut self, point: Point3) -> VertexId {
        self.vertices.insert(VertexData { point })
    }

    /// Returns the vertex data, or an error if not found.
    ///
    /// # Errors
    ///
    /// Returns an error if the vertex is not in the mesh.
    pub fn vertex(&self, id: VertexId) -> Result<&VertexData> {
        self.vertices
            .get(id)
            .ok_or_else(|| TopologyError::EntityNotFound("vertex".into()).into())
    }

    /// Returns the position of a vertex.
    ///
    /// # Errors
    ///
    /// Returns an error if the vertex is not in the mesh.
    pub fn point(&self, id: VertexId) -> Result<Point3> {
        Ok(self.vertex(id)?.point)
    }

    /// Moves a vertex.
    ///
    /// # Errors
    ///
    /// Returns an error if the vertex is not in the mesh.
    pub fn set_point(&mut self, id: VertexId, point: Point3) -> Result<()> {
        let v = self
            .vertices
            .get_mut(id)
            .ok_or_else(|| TopologyError::EntityNotFound("vertex".into()))?;
        v.point = point;
        Ok(())
    }

    #[must_use]
    pub fn contains_vertex(&self, id: VertexId) -> bool {
        self.vertices.contains_key(id)
    }

    #[must_use]
    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    /// Iterates over `(id, position)` in arena order.
    pub fn vertices(&self) -> impl Iterator<Item = (VertexId, &Point3)> {
        self.vertices.iter().map(|(id, v)| (id, &v.point))
    }

    /// Vertex ids in arena order.
    #[must_use]
    pub fn vertex_ids(&self) -> Vec<VertexId> {
        self.vertices.keys().collect()
    }

    /// Removes a vertex together with every face that uses it.
    pub fn remove_vertex(&mut self, id: VertexId) {
        let incident: Vec<FaceId> = self
            .faces
            .iter()
            .filter(|(_, f)| f.vertices.contains(&id))
            .map(|(fid, _)| fid)
            .collect();
        for fid in incident {
            self.faces.remove(fid);
        }
        self.vertices.remove(id);
    }

    /// Removes vertices not referenced by any face and returns them.
    pub fn remove_unused_vertices(&mut self) -> Vec<VertexId> {
        let mut used = std::collections::HashSet::new();
        for f in self.faces.values() {
            used.extend(f.vertices.iter().copied());
        }
        let unused: Vec<VertexId> = self
            .vertices
            .keys()
            .filter(|id| !used.contains(id))
            .collect();
        for id in &unused {
            self.vertices.remove(*id);
        }
        unused
    }

    // --- Face operations ---

    /// Inserts a face over existing vertices.
    ///
    /// # Errors
    ///
    /// Returns `OperationError::InvalidInput` for fewer than three vertices
    /// or repeated vertices, and `TopologyError::EntityNotFound` if a vertex
    /// does not exist.
    pub fn add_face(&mut self, vertices: &[VertexId]) -> Result<FaceId> {
        if vertices.len() < 3 {
            return Err(OperationError::InvalidInput(format!(
                "face needs at least 3 vertices, got {}",
                vertices.len()
            ))
            .into());
        }
        for (i, v) in vertices.iter().enumerate() {
            if !self.vertices.contains_key(*v) {
                return Err(TopologyError::EntityNotFound("face vertex".into()).into());
            }
            if vertices[i + 1..].contains(v) {
                return Err(OperationError::InvalidInput("face repeats a vertex".into()).into());
            }
        }
        Ok(self.faces.insert(FaceData {
            vertices: vertices.to_vec(),
        }))
    }

    /// Returns the face data, or an error if not found.
    ///
    /// # Errors
    ///
    /// Returns an error if the face is not in the mesh.
    pub fn face(&self, id: FaceId) -> Result<&FaceData> {
        self.faces
            .get(id)
            .ok_or_else(|| TopologyError::EntityNotFound("face".into()).into())
    }

    /// Returns the vertex loop of a face.
    ///
    /// # Errors
    ///
    /// Returns an error if the face is not in the mesh.
    pub fn face_vertices(&self, id: FaceId) -> Result<&[VertexId]> {
        Ok(&self.face(id)?.vertices)
    }

    /// Replaces the vertex loop of a face, keeping its id.
    ///
    /// # Errors
    ///
    /// Returns an error if the face is missing or the new loop is invalid.
    pub fn replace_face(&mut self, id: FaceId, vertices: Vec<VertexId>) -> Result<()> {
        if vertices.len() < 3 {
            return Err(OperationError::InvalidInput("face needs at least 3 vertices".into()).into());
        }
        let face = self
            .faces
            .get_mut(id)
            .ok_or_else(|| TopologyError::EntityNotFound("face".into()))?;
        face.vertices = vertices;
        Ok(())
    }

    #[must_use]
    pub fn contains_face(&self, id: FaceId) -> bool {
        self.faces.contains_key(id)
    }

    #[must_use]
    pub fn face_count(&self) -> usize {
        self.faces.len()
    }

    /// Iterates over `(id, vertex loop)` in arena order.
    pub fn faces(&self) -> impl Iterator<Item = (FaceId, &[VertexId])> {
        self.faces.iter().map(|(id, f)| (id, f.vertices.as_slice()))
    }

    #[must_use]
    pub fn face_ids(&self) -> Vec<FaceId> {
        self.faces.keys().collect()
    }

    pub fn remove_face(&mut self, id: FaceId) -> Option<FaceData> {
        self.faces.remove(id)
    }

    /// Reverses the winding of a face.
    ///
    /// # Errors
    ///
    /// Returns an error if the face is not in the mesh.
    pub fn flip_face(&mut self, id: FaceId) -> Result<()> {
        let face = self
            .faces
            .get_mut(id)
            .ok_or_else(|| TopologyError::EntityNotFound("face".into()))?;
        face.vertices.reverse();
        Ok(())
    }

    /// Reverses every face.
    pub fn flip_all(&mut self) {
        for f in self.faces.values_mut() {
            f.vertices.reverse();
        }
    }

    /// Positions of a face's vertices in loop order.
    ///
    /// # Errors
    ///
    /// Returns an error if the face or one of its vertices is missing.
    pub fn face_points(&self, id: FaceId) -> Result<Vec<Point3>> {
        self.face(id)?
            .vertices
            .iter()
            .map(|v| self.point(*v))
            .collect()
    }

    /// Unit normal of a face (Newell), or zero for a degenerate face.
    ///
    /// # Errors
    ///
    /// Returns an error if the face or one of its vertices is missing.
    pub fn face_normal(&self, id: FaceId) -> Result<Vector3> {
        let n = newell_normal(&self.face_points(id)?);
        let len = n.norm();
        Ok(if len < TOLERANCE { Vector3::zeros() } else { n / len })
    }

    /// Area of a face.
    ///
    /// # Errors
    ///
    /// Returns an error if the face or one of its vertices is missing.
    pub fn face_area(&self, id: FaceId) -> Result<f64> {
        Ok(newell_normal(&self.face_points(id)?).norm() * 0.5)
    }

    /// Average of a face's vertex positions.
    ///
    /// # Errors
    ///
    /// Returns an error if the face or one of its vertices is missing.
    pub fn face_centroid(&self, id: FaceId) -> Result<Point3> {
        let pts = self.face_points(id)?;
        #[allow(clippy::cast_precision_loss)]
        let inv = 1.0 / pts.len() as f64;
        let sum = pts.iter().fold(Vector3::zeros(), |acc, p| acc + p.coords);
        Ok(Point3::from(sum * inv))
    }

    // --- Whole-mesh operations ---

    /// Copies every element of `other` into this mesh.
    ///
    /// Returns the mapping from `other`'s vertex ids to the new ids.
    ///
    /// # Errors
    ///
    /// Returns an error if `other` contains an invalid face.
    pub fn merge(&mut self, other: &Mesh) -> Result<BTreeMap<VertexId, VertexId>> {
        let mut map = BTreeMap::new();
        for (id, p) in other.vertices() {
            map.insert(id, self.add_vertex(*p));
        }
        for (_, verts) in other.faces() {
            let mapped: Vec<VertexId> = verts.iter().map(|v| map[v]).collect();
            self.add_face(&mapped)?;
        }
        Ok(map)
    }

    /// Applies a rigid transform to every vertex.
    pub fn transform(&mut self, iso: &Isometry3) {
        for v in self.vertices.values_mut() {
            v.point = iso * v.point;
        }
    }

    /// Tightest axis-aligned box around all vertices.
    #[must_use]
    pub fn bounding_box(&self) -> Option<Aabb> {
        Aabb::from_points(self.vertices.values().map(|v| &v.point))
    }

    /// Signed enclosed volume (positive for an outward-oriented closed mesh).
    ///
    /// Faces are fanned from their first vertex.
    #[must_use]
    pub fn signed_volume(&self) -> f64 {
        let mut six_v = 0.0;
        for f in self.faces.values() {
            let Some(a) = self.vertices.get(f.vertices[0]) else {
                continue;
            };
            for w in f.vertices[1..].windows(2) {
                let (Some(b), Some(c)) = (self.vertices.get(w[0]), self.vertices.get(w[1])) else {
                    continue;
                };
                six_v += a.point.coords.dot(&b.point.coords.cross(&c.point.coords));
            }
        }
        six_v / 6.0
    }

    /// Number of triangles an export would produce.
    #[must_use]
    pub fn triangle_count(&self) -> usize {
        self.faces.values().map(|f| f.vertices.len() - 2).sum()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::operations::creation::MakeBox;
    use approx::assert_relative_eq;

    fn quad() -> (Mesh, [VertexId; 4], FaceId) {
        let mut mesh = Mesh::new();
        let v = [
            mesh.add_vertex(Point3::new(0.0, 0.0, 0.0)),
            mesh.add_vertex(Point3::new(2.0, 0.0, 0.0)),
            mesh.add_vertex(Point3::new(2.0, 1.0, 0.0)),
            mesh.add_vertex(Point3::new(0.0, 1.0, 0.0)),
        ];
        let f = mesh.add_face(&v).unwrap();
        (mesh, v, f)
    }

    #[test]
    fn face_normal_area_centroid() {
        let (mesh, _, f) = quad();
        assert_relative_eq!(mesh.face_normal(f).unwrap(), Vector3::z());
        assert_relative_eq!(mesh.face_area(f).unwrap(), 2.0);
        assert_relative_eq!(mesh.face_centroid(f).unwrap(), Point3::new(1.0, 0.5, 0.0));
    }

    #[test]
    fn add_face_rejects_bad_loops() {
        let (mut mesh, v, _) = quad();
        assert!(mesh.add_face(&v[..2]).is_err());
        assert!(mesh.add_face(&[v[0], v[1], v[0]]).is_err());
    }

    #[test]
    fn stale_ids_are_detected() {
        let (mut mesh, v, f) = quad();
        mesh.remove_vertex(v[0]);
        assert!(mesh.point(v[0]).is_err());
        assert!(mesh.face(f).is_err());
        assert_eq!(mesh.remove_unused_vertices().len(), 3);
        assert_eq!(mesh.vertex_count(), 0);
    }

    #[test]
    fn flip_reverses_normal() {
        let (mut mesh, _, f) = quad();
        mesh.flip_face(f).unwrap();
        assert_relative_eq!(mesh.face_normal(f).unwrap(), -Vector3::z());
    }

    #[test]
    fn box_volume_and_merge() {
        let a = MakeBox::new(Point3::origin(), Point3::new(1.0, 2.0, 3.0))
            .execute()
            .unwrap();
        assert_relative_eq!(a.signed_volume(), 6.0, epsilon = 1e-12);

        let mut b = Mesh::new();
        let map = b.merge(&a).unwrap();
        b.merge(&a).unwrap();
        assert_eq!(map.len(), 8);
        assert_eq!(b.vertex_count(), 16);
        assert_eq!(b.face_count(), 12);
        assert_relative_eq!(b.signed_volume(), 12.0, epsilon = 1e-12);
    }
}
