use std::collections::{BTreeMap, BTreeSet};

use crate::error::Result;
use crate::math::{Point3, Vector3};
use crate::mesh::loops::{vertex_neighbors, vertex_normals};
use crate::mesh::{Mesh, Selection, VertexId};

/// Laplacian smoothing restricted to a selection.
///
/// Each pass moves every selected vertex `factor` of the way toward the
/// average of its neighbours. Unselected vertices stay fixed.
pub struct Smooth {
    factor: f64,
    iterations: usize,
    selection: Selection,
}

impl Smooth {
    #[must_use]
    pub fn new(selection: Selection, factor: f64, iterations: usize) -> Self {
        Self {
            factor,
            iterations,
            selection,
        }
    }

    /// Executes the smoothing.
    ///
    /// # Errors
    ///
    /// Returns an error if a selected vertex is missing.
    pub fn execute(&self, mesh: &mut Mesh) -> Result<()> {
        let neighbors = vertex_neighbors(mesh);
        for _ in 0..self.iterations {
            let moves = averages(mesh, &self.selection, &neighbors)?;
            for (v, (p, avg)) in moves {
                mesh.set_point(v, p + (avg - p) * self.factor)?;
            }
        }
        Ok(())
    }
}

/// Tangential relaxation restricted to a selection.
///
/// Like [`Smooth`] at full strength, but the normal component of each move
/// is removed, so vertices even out along the surface instead of shrinking
/// it.
pub struct Relax {
    iterations: usize,
    selection: Selection,
}

impl Relax {
    #[must_use]
    pub fn new(selection: Selection, iterations: usize) -> Self {
        Self {
            iterations,
            selection,
        }
    }

    /// Executes the relaxation.
    ///
    /// # Errors
    ///
    /// Returns an error if a selected vertex is missing.
    pub fn execute(&self, mesh: &mut Mesh) -> Result<()> {
        let neighbors = vertex_neighbors(mesh);
        for _ in 0..self.iterations {
            let normals = vertex_normals(mesh);
            let moves = averages(mesh, &self.selection, &neighbors)?;
            for (v, (p, avg)) in moves {
                let n = normals.get(&v).copied().unwrap_or_else(Vector3::zeros);
                let delta = avg - p;
                mesh.set_point(v, p + (delta - n * delta.dot(&n)))?;
            }
        }
        Ok(())
    }
}

type Moves = BTreeMap<VertexId, (Point3, Point3)>;

fn averages(
    mesh: &Mesh,
    selection: &Selection,
    neighbors: &BTreeMap<VertexId, BTreeSet<VertexId>>,
) -> Result<Moves> {
    let mut out = BTreeMap::new();
    for v in selection.iter() {
        let Some(ring) = neighbors.get(&v) else {
            continue;
        };
        if ring.is_empty() || !mesh.contains_vertex(v) {
            continue;
        }
        let mut sum = Vector3::zeros();
        for n in ring {
            sum += mesh.point(*n)?.coords;
        }
        #[allow(clippy::cast_precision_loss)]
        let avg = Point3::from(sum / ring.len() as f64);
        out.insert(v, (mesh.point(v)?, avg));
    }
    Ok(out)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::operations::creation::MakeGrid;
    use approx::assert_relative_eq;

    #[test]
    fn smoothing_pulls_spike_down_and_keeps_fixed_vertices() {
        let grid = MakeGrid::new(2, 2, 1.0, 1.0).execute().unwrap();
        let mut mesh = grid.mesh.clone();
        let centre = grid.vertex(1, 1).unwrap();
        mesh.set_point(centre, Point3::new(1.0, -1.0, 4.0)).unwrap();
        let sel: Selection = [centre].into_iter().collect();
        Smooth::new(sel, 0.5, 1).execute(&mut mesh).unwrap();
        assert_relative_eq!(mesh.point(centre).unwrap().z, 2.0, epsilon = 1e-12);
        let corner = grid.vertex(0, 0).unwrap();
        assert_relative_eq!(mesh.point(corner).unwrap(), Point3::origin());
    }

    #[test]
    fn relax_moves_within_the_surface() {
        let grid = MakeGrid::new(2, 2, 1.0, 1.0).execute().unwrap();
        let mut mesh = grid.mesh.clone();
        let centre = grid.vertex(1, 1).unwrap();
        mesh.set_point(centre, Point3::new(1.3, -0.8, 0.0)).unwrap();
        let sel: Selection = [centre].into_iter().collect();
        Relax::new(sel, 1).execute(&mut mesh).unwrap();
        let p = mesh.point(centre).unwrap();
        assert_relative_eq!(p.z, 0.0, epsilon = 1e-12);
        assert!((p - Point3::new(1.0, -1.0, 0.0)).norm() < 0.2);
    }
}
