//! Binary space partitioning tree over convex polygons.
//!
//! Nodes live in a flat arena and every traversal is iterative, so deep
//! trees built from curved surfaces cannot overflow the stack.

use super::polygon::{Plane, Polygon};

#[derive(Debug, Clone, Default)]
struct Node {
    plane: Option<Plane>,
    front: Option<usize>,
    back: Option<usize>,
}

/// A BSP tree over the polygons of one surface, used to cut the polygons
/// of another surface where they meet it.
#[derive(Debug, Clone)]
pub(crate) struct BspTree {
    nodes: Vec<Node>,
}

impl BspTree {
    pub fn new(polygons: Vec<Polygon>) -> Self {
        let mut tree = Self {
            nodes: vec![Node::default()],
        };
        tree.build(polygons);
        tree
    }

    /// Splits `polygons` by every plane on their way down to a leaf and
    /// returns all the pieces. A piece is flagged when it lay on one of
    /// those planes.
    ///
    /// No piece crosses a polygon of the tree: every leaf cell is free of
    /// tree polygons.
    pub fn split_polygons(&self, polygons: Vec<Polygon>) -> Vec<(Polygon, bool)> {
        let mut pieces = Vec::new();
        let mut stack = vec![(0usize, polygons.into_iter().map(|p| (p, false)).collect::<Vec<_>>())];
        while let Some((idx, polys)) = stack.pop() {
            let node = &self.nodes[idx];
            let Some(plane) = node.plane else {
                pieces.extend(polys);
                continue;
            };
            let mut front = Vec::new();
            let mut back = Vec::new();
            for (p, on_plane) in polys {
                let (mut cf, mut cb, mut f, mut b) = (Vec::new(), Vec::new(), Vec::new(), Vec::new());
                plane.split_polygon(p, &mut cf, &mut cb, &mut f, &mut b);
                front.extend(cf.into_iter().map(|p| (p, true)));
                back.extend(cb.into_iter().map(|p| (p, true)));
                front.extend(f.into_iter().map(|p| (p, on_plane)));
                back.extend(b.into_iter().map(|p| (p, on_plane)));
            }
            match node.front {
                Some(f) => stack.push((f, front)),
                None => pieces.extend(front),
            }
            match node.back {
                Some(b) => stack.push((b, back)),
                None => pieces.extend(back),
            }
        }
        pieces
    }

    /// Inserts polygons, splitting them by existing planes. Polygons on a
    /// node's plane end there; the rest make the subtrees.
    fn build(&mut self, polygons: Vec<Polygon>) {
        let mut stack = vec![(0usize, polygons)];
        while let Some((idx, polys)) = stack.pop() {
            let Some(first) = polys.first() else {
                continue;
            };
            let plane = *self.nodes[idx].plane.get_or_insert(first.plane);
            let (mut coplanar, mut coplanar_back) = (Vec::new(), Vec::new());
            let mut front = Vec::new();
            let mut back = Vec::new();
            for p in polys {
                plane.split_polygon(p, &mut coplanar, &mut coplanar_back, &mut front, &mut back);
            }
            if !front.is_empty() {
                let child = self.child(idx, true);
                stack.push((child, front));
            }
            if !back.is_empty() {
                let child = self.child(idx, false);
                stack.push((child, back));
            }
        }
    }

    fn child(&mut self, idx: usize, front: bool) -> usize {
        let existing = if front {
            self.nodes[idx].front
        } else {
            self.nodes[idx].back
        };
        if let Some(c) = existing {
            return c;
        }
        self.nodes.push(Node::default());
        let c = self.nodes.len() - 1;
        if front {
            self.nodes[idx].front = Some(c);
        } else {
            self.nodes[idx].back = Some(c);
        }
        c
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::math::Point3;

    fn quad(z: f64, half: f64) -> Polygon {
        Polygon::new(vec![
            Point3::new(-half, -half, z),
            Point3::new(half, -half, z),
            Point3::new(half, half, z),
            Point3::new(-half, half, z),
        ])
        .unwrap()
    }

    fn wall(x: f64) -> Polygon {
        Polygon::new(vec![
            Point3::new(x, -5.0, -5.0),
            Point3::new(x, 5.0, -5.0),
            Point3::new(x, 5.0, 5.0),
            Point3::new(x, -5.0, 5.0),
        ])
        .unwrap()
    }

    #[test]
    fn pieces_stop_at_tree_planes() {
        let tree = BspTree::new(vec![wall(0.5)]);
        let pieces = tree.split_polygons(vec![quad(0.0, 1.0)]);
        assert_eq!(pieces.len(), 2);
        for (piece, on_plane) in &pieces {
            assert!(!on_plane);
            let left = piece.vertices.iter().all(|p| p.x <= 0.5 + 1e-12);
            let right = piece.vertices.iter().all(|p| p.x >= 0.5 - 1e-12);
            assert!(left || right);
        }
    }

    #[test]
    fn pieces_on_a_tree_plane_are_flagged() {
        let tree = BspTree::new(vec![quad(0.0, 3.0)]);
        let pieces = tree.split_polygons(vec![quad(0.0, 1.0), quad(2.0, 1.0)]);
        assert_eq!(pieces.len(), 2);
        let flagged: Vec<bool> = pieces
            .iter()
            .map(|(p, on_plane)| {
                assert_eq!(*on_plane, p.vertices[0].z.abs() < 1e-12);
                *on_plane
            })
            .collect();
        assert_eq!(flagged.iter().filter(|f| **f).count(), 1);
    }
}
