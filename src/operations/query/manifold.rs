use crate::mesh::loops::{boundary_loops, connected_components};
use crate::mesh::{EdgeMap, Mesh};

/// Counts of the defects that keep a mesh from being a closed solid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ManifoldReport {
    /// Edges with a single face.
    pub boundary_edges: usize,
    /// Edges with more than two faces.
    pub non_manifold_edges: usize,
    /// Edges whose two faces traverse them in the same direction.
    pub inconsistent_edges: usize,
    pub boundary_loops: usize,
    pub components: usize,
}

impl ManifoldReport {
    /// Inspects `mesh`.
    #[must_use]
    pub fn of(mesh: &Mesh) -> Self {
        let edges = EdgeMap::build(mesh);
        Self {
            boundary_edges: edges.boundary_edges().len(),
            non_manifold_edges: edges.non_manifold_edges().len(),
            inconsistent_edges: edges.inconsistent_edges().len(),
            boundary_loops: boundary_loops(mesh).len(),
            components: connected_components(mesh).len(),
        }
    }

    /// `true` when the mesh is closed, manifold and consistently wound.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.boundary_edges == 0 && self.non_manifold_edges == 0 && self.inconsistent_edges == 0
    }

    /// Boundary and over-shared edges together: the edges a modeller
    /// would select as "non-manifold".
    #[must_use]
    pub fn open_edges(&self) -> usize {
        self.boundary_edges + self.non_manifold_edges
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::math::Point3;
    use crate::operations::creation::MakeBox;

    #[test]
    fn box_is_closed_until_a_face_goes() {
        let mut mesh = MakeBox::new(Point3::origin(), Point3::new(1.0, 1.0, 1.0))
            .execute()
            .unwrap();
        let report = ManifoldReport::of(&mesh);
        assert!(report.is_closed());
        assert_eq!(report.components, 1);

        let f = mesh.face_ids()[0];
        mesh.remove_face(f);
        let report = ManifoldReport::of(&mesh);
        assert_eq!(report.boundary_edges, 4);
        assert_eq!(report.boundary_loops, 1);
        assert_eq!(report.open_edges(), 4);
        assert!(!report.is_closed());
    }
}
