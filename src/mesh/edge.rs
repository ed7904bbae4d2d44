use std::collections::BTreeMap;

use super::{FaceId, Mesh, VertexId};

/// An undirected edge, stored with its endpoints in ascending id order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EdgeKey(pub VertexId, pub VertexId);

impl EdgeKey {
    #[must_use]
    pub fn new(a: VertexId, b: VertexId) -> Self {
        if a <= b {
            Self(a, b)
        } else {
            Self(b, a)
        }
    }

    #[must_use]
    pub fn contains(&self, v: VertexId) -> bool {
        self.0 == v || self.1 == v
    }
}

/// One use of an edge by a face, with the direction the face traverses it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EdgeUse {
    pub face: FaceId,
    pub from: VertexId,
    pub to: VertexId,
}

/// Edge → face incidence, built on demand from a [`Mesh`].
///
/// Edges are ordered so that every walk over the map is deterministic.
#[derive(Debug, Clone, Default)]
pub struct EdgeMap {
    uses: BTreeMap<EdgeKey, Vec<EdgeUse>>,
}

impl EdgeMap {
    #[must_use]
    pub fn build(mesh: &Mesh) -> Self {
        let mut uses: BTreeMap<EdgeKey, Vec<EdgeUse>> = BTreeMap::new();
        for (fid, verts) in mesh.faces() {
            let n = verts.len();
            for i in 0..n {
                let from = verts[i];
                let to = verts[(i + 1) % n];
                uses.entry(EdgeKey::new(from, to))
                    .or_default()
                    .push(EdgeUse { face: fid, from, to });
            }
        }
        Self { uses }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&EdgeKey, &[EdgeUse])> {
        self.uses.iter().map(|(k, v)| (k, v.as_slice()))
    }

    #[must_use]
    pub fn uses(&self, edge: &EdgeKey) -> &[EdgeUse] {
        self.uses.get(edge).map_or(&[], Vec::as_slice)
    }

    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.uses.len()
    }

    /// Boundary edges, directed the way their single face traverses them.
    #[must_use]
    pub fn boundary_edges(&self) -> Vec<(VertexId, VertexId)> {
        self.uses
            .values()
            .filter(|u| u.len() == 1)
            .map(|u| (u[0].from, u[0].to))
            .collect()
    }

    /// Edges used by more than two faces.
    #[must_use]
    pub fn non_manifold_edges(&self) -> Vec<EdgeKey> {
        self.uses
            .iter()
            .filter(|(_, u)| u.len() > 2)
            .map(|(k, _)| *k)
            .collect()
    }

    /// Interior edges whose two faces traverse them in the same direction.
    #[must_use]
    pub fn inconsistent_edges(&self) -> Vec<EdgeKey> {
        self.uses
            .iter()
            .filter(|(_, u)| u.len() == 2 && u[0].from == u[1].from)
            .map(|(k, _)| *k)
            .collect()
    }

    /// Faces on the other side of each edge of `face`.
    #[must_use]
    pub fn neighbors(&self, mesh: &Mesh, face: FaceId) -> Vec<FaceId> {
        let Ok(verts) = mesh.face_vertices(face) else {
            return Vec::new();
        };
        let n = verts.len();
        let mut out = Vec::new();
        for i in 0..n {
            for u in self.uses(&EdgeKey::new(verts[i], verts[(i + 1) % n])) {
                if u.face != face && !out.contains(&u.face) {
                    out.push(u.face);
                }
            }
        }
        out
    }

    /// `true` when every edge has exactly two consistently oriented uses.
    #[must_use]
    pub fn is_closed_manifold(&self) -> bool {
        self.uses
            .values()
            .all(|u| u.len() == 2 && u[0].from == u[1].to)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::math::Point3;
    use crate::operations::creation::MakeBox;

    #[test]
    fn box_is_closed_manifold() {
        let mesh = MakeBox::new(Point3::origin(), Point3::new(1.0, 1.0, 1.0))
            .execute()
            .unwrap();
        let edges = EdgeMap::build(&mesh);
        assert_eq!(edges.edge_count(), 12);
        assert!(edges.is_closed_manifold());
        assert!(edges.boundary_edges().is_empty());
    }

    #[test]
    fn open_box_has_four_boundary_edges() {
        let mut mesh = MakeBox::new(Point3::origin(), Point3::new(1.0, 1.0, 1.0))
            .execute()
            .unwrap();
        let top = mesh
            .face_ids()
            .into_iter()
            .find(|f| mesh.face_normal(*f).unwrap().z > 0.5)
            .unwrap();
        mesh.remove_face(top);
        let edges = EdgeMap::build(&mesh);
        assert_eq!(edges.boundary_edges().len(), 4);
        assert!(edges.non_manifold_edges().is_empty());
    }

    #[test]
    fn fin_is_non_manifold() {
        let mut mesh = Mesh::new();
        let a = mesh.add_vertex(Point3::new(0.0, 0.0, 0.0));
        let b = mesh.add_vertex(Point3::new(1.0, 0.0, 0.0));
        for p in [
            Point3::new(0.5, 1.0, 0.0),
            Point3::new(0.5, -1.0, 0.0),
            Point3::new(0.5, 0.0, 1.0),
        ] {
            let c = mesh.add_vertex(p);
            mesh.add_face(&[a, b, c]).unwrap();
        }
        let edges = EdgeMap::build(&mesh);
        assert_eq!(edges.non_manifold_edges(), vec![EdgeKey::new(a, b)]);
    }
}
