use std::collections::{BTreeMap, BTreeSet};

use crate::error::{GeometryError, Result};
use crate::math::{Point3, Vector3, TOLERANCE};
use crate::mesh::{EdgeKey, FaceId, Mesh, Selection, VertexId};

/// Distance under which a vertex counts as lying on the cutting plane.
const ON_PLANE: f64 = 1e-6;

/// Cuts faces along a plane.
///
/// Every edge crossing the plane is split once, and the split vertex is
/// spliced into *all* faces sharing that edge, so the mesh stays manifold
/// even where only some faces are cut. Faces crossing the plane exactly
/// twice are divided in two along the cut.
pub struct SplitByPlane {
    origin: Point3,
    normal: Vector3,
    faces: Option<BTreeSet<FaceId>>,
}

impl SplitByPlane {
    #[must_use]
    pub fn new(origin: Point3, normal: Vector3) -> Self {
        Self {
            origin,
            normal,
            faces: None,
        }
    }

    /// Only cuts `faces`; neighbours receive the split vertices only.
    #[must_use]
    pub fn only(mut self, faces: BTreeSet<FaceId>) -> Self {
        self.faces = Some(faces);
        self
    }

    /// Executes the cut, returning every vertex on the cut line.
    ///
    /// # Errors
    ///
    /// Returns `GeometryError::ZeroVector` for a zero plane normal, or an
    /// error if a face cannot be rebuilt.
    pub fn execute(&self, mesh: &mut Mesh) -> Result<Selection> {
        let len = self.normal.norm();
        if len < TOLERANCE {
            return Err(GeometryError::ZeroVector.into());
        }
        let n = self.normal / len;
        let distance = |p: &Point3| n.dot(&(p - self.origin));

        let scope: Vec<FaceId> = match &self.faces {
            Some(set) => set.iter().copied().filter(|f| mesh.contains_face(*f)).collect(),
            None => mesh.face_ids(),
        };

        let mut cuts: BTreeMap<EdgeKey, VertexId> = BTreeMap::new();
        let mut on_cut = Selection::new();
        let mut split_faces = Vec::new();
        for fid in scope {
            let verts = mesh.face_vertices(fid)?.to_vec();
            let d: Vec<f64> = verts
                .iter()
                .map(|v| mesh.point(*v).map(|p| distance(&p)))
                .collect::<Result<_>>()?;
            let above = d.iter().any(|x| *x > ON_PLANE);
            let below = d.iter().any(|x| *x < -ON_PLANE);
            if !(above && below) {
                continue;
            }
            let k = verts.len();
            for i in 0..k {
                let j = (i + 1) % k;
                if (d[i] > ON_PLANE && d[j] < -ON_PLANE) || (d[i] < -ON_PLANE && d[j] > ON_PLANE) {
                    let key = EdgeKey::new(verts[i], verts[j]);
                    if !cuts.contains_key(&key) {
                        let pi = mesh.point(verts[i])?;
                        let pj = mesh.point(verts[j])?;
                        let t = d[i] / (d[i] - d[j]);
                        let v = mesh.add_vertex(pi + (pj - pi) * t);
                        cuts.insert(key, v);
                    }
                }
            }
            split_faces.push(fid);
        }

        // Splice split vertices into every face using a cut edge.
        if !cuts.is_empty() {
            for fid in mesh.face_ids() {
                let verts = mesh.face_vertices(fid)?;
                let k = verts.len();
                let mut out = Vec::with_capacity(k + 2);
                let mut changed = false;
                for i in 0..k {
                    out.push(verts[i]);
                    if let Some(c) = cuts.get(&EdgeKey::new(verts[i], verts[(i + 1) % k])) {
                        out.push(*c);
                        changed = true;
                    }
                }
                if changed {
                    mesh.replace_face(fid, out)?;
                }
            }
        }

        for fid in split_faces {
            let verts = mesh.face_vertices(fid)?.to_vec();
            let d: Vec<f64> = verts
                .iter()
                .map(|v| mesh.point(*v).map(|p| distance(&p)))
                .collect::<Result<_>>()?;
            let on: Vec<usize> = (0..verts.len()).filter(|i| d[*i].abs() <= ON_PLANE).collect();
            for i in &on {
                on_cut.insert(verts[*i]);
            }
            let [first, second] = on.as_slice() else {
                continue;
            };
            // Both pieces must have a vertex off the plane.
            if second - first < 2 || verts.len() - (second - first) < 2 {
                continue;
            }
            let front: Vec<VertexId> = verts[*first..=*second].to_vec();
            let mut back: Vec<VertexId> = verts[*second..].to_vec();
            back.extend_from_slice(&verts[..=*first]);
            mesh.replace_face(fid, front)?;
            mesh.add_face(&back)?;
        }
        on_cut.extend(cuts.values().copied());
        Ok(on_cut)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::mesh::EdgeMap;
    use crate::operations::creation::{MakeBox, MakeGrid};
    use approx::assert_relative_eq;

    #[test]
    fn box_cut_stays_closed() {
        let mut mesh = MakeBox::new(Point3::origin(), Point3::new(2.0, 2.0, 2.0))
            .execute()
            .unwrap();
        let cut = SplitByPlane::new(Point3::new(0.5, 0.0, 0.0), Vector3::x())
            .execute(&mut mesh)
            .unwrap();
        assert_eq!(cut.len(), 4);
        assert_eq!(mesh.face_count(), 10);
        assert!(EdgeMap::build(&mesh).is_closed_manifold());
        assert_relative_eq!(mesh.signed_volume(), 8.0, epsilon = 1e-12);
        for v in cut.iter() {
            assert_relative_eq!(mesh.point(v).unwrap().x, 0.5, epsilon = 1e-12);
        }
    }

    #[test]
    fn restricted_cut_splices_neighbours() {
        let grid = MakeGrid::new(2, 1, 1.0, 1.0).execute().unwrap();
        let mut mesh = grid.mesh.clone();
        let left = grid.face(0, 0).unwrap();
        let right = grid.face(1, 0).unwrap();
        // Horizontal cut through the left cell only.
        SplitByPlane::new(Point3::new(0.0, -0.5, 0.0), Vector3::y())
            .only([left].into_iter().collect())
            .execute(&mut mesh)
            .unwrap();
        assert_eq!(mesh.face_count(), 3);
        assert_eq!(mesh.face_vertices(right).unwrap().len(), 5);
        let edges = EdgeMap::build(&mesh);
        assert!(edges.non_manifold_edges().is_empty());
        assert!(edges.inconsistent_edges().is_empty());
    }
}
