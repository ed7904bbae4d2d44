//! Adjacency queries derived from the face lists: boundary loops, connected
//! components, vertex rings and normals.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use super::edge::EdgeMap;
use super::{FaceId, Mesh, VertexId};
use crate::math::Vector3;
use crate::math::polygon_2d::newell_normal;
use crate::math::TOLERANCE;

/// Walks all boundary edges into closed loops.
///
/// Each loop follows the direction its faces traverse the boundary, so for
/// faces wound counter-clockwise the loop runs counter-clockwise too. A
/// boundary vertex shared by two loops (a pinch) is visited once per loop.
/// Loops are returned in ascending order of their smallest edge.
#[must_use]
pub fn boundary_loops(mesh: &Mesh) -> Vec<Vec<VertexId>> {
    let edges = EdgeMap::build(mesh);
    let mut outgoing: BTreeMap<VertexId, Vec<VertexId>> = BTreeMap::new();
    for (from, to) in edges.boundary_edges() {
        outgoing.entry(from).or_default().push(to);
    }
    for targets in outgoing.values_mut() {
        targets.sort();
    }

    let mut loops = Vec::new();
    while let Some((&start, _)) = outgoing.iter().find(|(_, t)| !t.is_empty()) {
        let mut current = start;
        let mut lp = vec![start];
        loop {
            let Some(targets) = outgoing.get_mut(&current) else {
                break;
            };
            if targets.is_empty() {
                break;
            }
            let next = targets.remove(0);
            if next == start {
                break;
            }
            lp.push(next);
            current = next;
        }
        loops.push(lp);
    }
    loops
}

/// Groups faces into edge-connected components, in order of their first face.
#[must_use]
pub fn connected_components(mesh: &Mesh) -> Vec<BTreeSet<FaceId>> {
    let edges = EdgeMap::build(mesh);
    let mut seen: BTreeSet<FaceId> = BTreeSet::new();
    let mut components = Vec::new();
    for start in mesh.face_ids() {
        if seen.contains(&start) {
            continue;
        }
        let mut component = BTreeSet::new();
        let mut stack = vec![start];
        seen.insert(start);
        while let Some(f) = stack.pop() {
            component.insert(f);
            for n in edges.neighbors(mesh, f) {
                if seen.insert(n) {
                    stack.push(n);
                }
            }
        }
        components.push(component);
    }
    components
}

/// Faces incident to each vertex.
#[must_use]
pub fn vertex_faces(mesh: &Mesh) -> HashMap<VertexId, Vec<FaceId>> {
    let mut map: HashMap<VertexId, Vec<FaceId>> = HashMap::new();
    for (fid, verts) in mesh.faces() {
        for v in verts {
            map.entry(*v).or_default().push(fid);
        }
    }
    map
}

/// Edge-adjacent vertices of each vertex.
#[must_use]
pub fn vertex_neighbors(mesh: &Mesh) -> BTreeMap<VertexId, BTreeSet<VertexId>> {
    let mut map: BTreeMap<VertexId, BTreeSet<VertexId>> = BTreeMap::new();
    for (_, verts) in mesh.faces() {
        let n = verts.len();
        for i in 0..n {
            let a = verts[i];
            let b = verts[(i + 1) % n];
            map.entry(a).or_default().insert(b);
            map.entry(b).or_default().insert(a);
        }
    }
    map
}

/// Area-weighted vertex normals. Vertices without faces get no entry.
#[must_use]
pub fn vertex_normals(mesh: &Mesh) -> HashMap<VertexId, Vector3> {
    let mut sums: HashMap<VertexId, Vector3> = HashMap::new();
    for (_, verts) in mesh.faces() {
        let pts: Vec<_> = verts.iter().filter_map(|v| mesh.point(*v).ok()).collect();
        if pts.len() != verts.len() {
            continue;
        }
        let n = newell_normal(&pts);
        for v in verts {
            *sums.entry(*v).or_insert_with(Vector3::zeros) += n;
        }
    }
    sums.into_iter()
        .map(|(v, n)| {
            let len = n.norm();
            (v, if len < TOLERANCE { Vector3::zeros() } else { n / len })
        })
        .collect()
}

/// Vertices on any boundary edge.
#[must_use]
pub fn boundary_vertices(mesh: &Mesh) -> BTreeSet<VertexId> {
    EdgeMap::build(mesh)
        .boundary_edges()
        .into_iter()
        .flat_map(|(a, b)| [a, b])
        .collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::math::Point3;
    use crate::operations::creation::{MakeBox, MakeGrid};
    use approx::assert_relative_eq;

    #[test]
    fn grid_has_one_ccw_boundary_loop() {
        let grid = MakeGrid::new(3, 2, 1.0, 1.0).execute().unwrap();
        let loops = boundary_loops(&grid.mesh);
        assert_eq!(loops.len(), 1);
        assert_eq!(loops[0].len(), 10);
        let pts: Vec<_> = loops[0]
            .iter()
            .map(|v| grid.mesh.point(*v).unwrap())
            .collect();
        assert!(newell_normal(&pts).z > 0.0);
    }

    #[test]
    fn closed_box_has_no_loops_and_one_component() {
        let mesh = MakeBox::new(Point3::origin(), Point3::new(1.0, 1.0, 1.0))
            .execute()
            .unwrap();
        assert!(boundary_loops(&mesh).is_empty());
        assert_eq!(connected_components(&mesh).len(), 1);
    }

    #[test]
    fn two_boxes_are_two_components() {
        let mut mesh = MakeBox::new(Point3::origin(), Point3::new(1.0, 1.0, 1.0))
            .execute()
            .unwrap();
        let other = MakeBox::new(Point3::new(3.0, 0.0, 0.0), Point3::new(4.0, 1.0, 1.0))
            .execute()
            .unwrap();
        mesh.merge(&other).unwrap();
        let parts = connected_components(&mesh);
        assert_eq!(parts.len(), 2);
        assert_eq!(parts[0].len(), 6);
    }

    #[test]
    fn box_corner_normals_point_outward() {
        let mesh = MakeBox::new(Point3::new(-1.0, -1.0, -1.0), Point3::new(1.0, 1.0, 1.0))
            .execute()
            .unwrap();
        let normals = vertex_normals(&mesh);
        for (v, p) in mesh.vertices() {
            let n = normals[&v];
            assert_relative_eq!(n, p.coords.normalize(), epsilon = 1e-12);
        }
    }

    #[test]
    fn neighbors_of_grid_corner() {
        let grid = MakeGrid::new(2, 2, 1.0, 1.0).execute().unwrap();
        let corner = grid.vertex(0, 0).unwrap();
        let neighbors = vertex_neighbors(&grid.mesh);
        assert_eq!(neighbors[&corner].len(), 2);
        assert_eq!(boundary_vertices(&grid.mesh).len(), 8);
    }
}
