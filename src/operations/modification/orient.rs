use std::collections::BTreeSet;

use tracing::debug;

use crate::error::Result;
use crate::mesh::loops::connected_components;
use crate::mesh::{EdgeKey, EdgeMap, FaceId, Mesh};

/// Makes face winding consistent across every connected component.
///
/// Orientation is flood-filled from the first face of each component
/// across manifold edges. Components that end up closed are then turned
/// so that their enclosed volume is positive (normals point outward).
#[derive(Debug, Default)]
pub struct OrientFaces;

impl OrientFaces {
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Executes the operation, returning the number of faces flipped.
    ///
    /// # Errors
    ///
    /// Returns an error if a face disappears during the walk.
    pub fn execute(&self, mesh: &mut Mesh) -> Result<usize> {
        let mut flipped = 0;
        for component in connected_components(mesh) {
            flipped += propagate(mesh, &component)?;
            let edges = EdgeMap::build(mesh);
            let closed = component.iter().all(|f| {
                mesh.face_vertices(*f).is_ok_and(|verts| {
                    let n = verts.len();
                    (0..n).all(|i| edges.uses(&EdgeKey::new(verts[i], verts[(i + 1) % n])).len() == 2)
                })
            });
            if closed && component_volume(mesh, &component)? < 0.0 {
                for f in &component {
                    mesh.flip_face(*f)?;
                }
                flipped += component.len();
            }
        }
        if flipped > 0 {
            debug!(flipped, "re-oriented faces");
        }
        Ok(flipped)
    }
}

fn propagate(mesh: &mut Mesh, component: &BTreeSet<FaceId>) -> Result<usize> {
    let Some(&seed) = component.iter().next() else {
        return Ok(0);
    };
    let edges = EdgeMap::build(mesh);
    let mut flipped_set: BTreeSet<FaceId> = BTreeSet::new();
    let mut visited: BTreeSet<FaceId> = BTreeSet::from([seed]);
    let mut stack = vec![seed];
    while let Some(face) = stack.pop() {
        let mut verts = mesh.face_vertices(face)?.to_vec();
        if flipped_set.contains(&face) {
            verts.reverse();
        }
        let n = verts.len();
        for i in 0..n {
            let (a, b) = (verts[i], verts[(i + 1) % n]);
            let uses = edges.uses(&EdgeKey::new(a, b));
            if uses.len() != 2 {
                continue;
            }
            for u in uses.iter().filter(|u| u.face != face) {
                if !visited.insert(u.face) {
                    continue;
                }
                // The map holds original windings; compare against the
                // neighbour's pending state.
                if u.from == a {
                    flipped_set.insert(u.face);
                }
                stack.push(u.face);
            }
        }
    }
    for f in &flipped_set {
        mesh.flip_face(*f)?;
    }
    Ok(flipped_set.len())
}

fn component_volume(mesh: &Mesh, component: &BTreeSet<FaceId>) -> Result<f64> {
    let mut volume = 0.0;
    for f in component {
        let pts = mesh.face_points(*f)?;
        for i in 1..pts.len().saturating_sub(1) {
            volume += pts[0].coords.dot(&pts[i].coords.cross(&pts[i + 1].coords));
        }
    }
    Ok(volume / 6.0)
}
