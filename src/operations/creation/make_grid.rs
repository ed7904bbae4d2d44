use crate::error::{OperationError, Result};
use crate::math::Point3;
use crate::mesh::{FaceId, Mesh, VertexId};

/// Creates a flat quad lattice in the XY plane.
///
/// Lattice column `i` runs along +X and lattice row `j` along −Y, so vertex
/// `(i, j)` starts at `(i * cell_width, -j * cell_height, 0)`. Quads are wound
/// counter-clockwise seen from +Z: `(i,j) (i,j+1) (i+1,j+1) (i+1,j)`.
pub struct MakeGrid {
    cells_x: usize,
    cells_y: usize,
    cell_width: f64,
    cell_height: f64,
}

/// A lattice mesh together with its `(i, j)` handles.
#[derive(Debug, Clone)]
pub struct Grid {
    pub mesh: Mesh,
    cells_x: usize,
    cells_y: usize,
    vertices: Vec<VertexId>,
    faces: Vec<FaceId>,
}

impl MakeGrid {
    /// Creates a new `MakeGrid` operation.
    #[must_use]
    pub fn new(cells_x: usize, cells_y: usize, cell_width: f64, cell_height: f64) -> Self {
        Self {
            cells_x,
            cells_y,
            cell_width,
            cell_height,
        }
    }

    /// Executes the operation.
    ///
    /// # Errors
    ///
    /// Returns an error if either cell count is zero.
    #[allow(clippy::cast_precision_loss)]
    pub fn execute(&self) -> Result<Grid> {
        if self.cells_x == 0 || self.cells_y == 0 {
            return Err(OperationError::InvalidInput("grid needs at least one cell".into()).into());
        }
        let mut mesh = Mesh::new();
        let mut vertices = Vec::with_capacity((self.cells_x + 1) * (self.cells_y + 1));
        for i in 0..=self.cells_x {
            for j in 0..=self.cells_y {
                vertices.push(mesh.add_vertex(Point3::new(
                    i as f64 * self.cell_width,
                    -(j as f64) * self.cell_height,
                    0.0,
                )));
            }
        }
        let stride = self.cells_y + 1;
        let mut faces = Vec::with_capacity(self.cells_x * self.cells_y);
        for i in 0..self.cells_x {
            for j in 0..self.cells_y {
                faces.push(mesh.add_face(&[
                    vertices[i * stride + j],
                    vertices[i * stride + j + 1],
                    vertices[(i + 1) * stride + j + 1],
                    vertices[(i + 1) * stride + j],
                ])?);
            }
        }
        Ok(Grid {
            mesh,
            cells_x: self.cells_x,
            cells_y: self.cells_y,
            vertices,
            faces,
        })
    }
}

impl Grid {
    /// Number of cells along (i, j).
    #[must_use]
    pub fn cells(&self) -> (usize, usize) {
        (self.cells_x, self.cells_y)
    }

    /// Linear index of lattice vertex `(i, j)`: `i * (cells_y + 1) + j`.
    #[must_use]
    pub fn index(&self, i: usize, j: usize) -> usize {
        i * (self.cells_y + 1) + j
    }

    /// Vertex at lattice position `(i, j)`, if inside the lattice.
    #[must_use]
    pub fn vertex(&self, i: usize, j: usize) -> Option<VertexId> {
        (i <= self.cells_x && j <= self.cells_y).then(|| self.vertices[self.index(i, j)])
    }

    /// Quad of cell `(i, j)`, if inside the lattice.
    #[must_use]
    pub fn face(&self, i: usize, j: usize) -> Option<FaceId> {
        (i < self.cells_x && j < self.cells_y).then(|| self.faces[i * self.cells_y + j])
    }

    /// Lattice position of a vertex created by this grid.
    #[must_use]
    pub fn position_of(&self, v: VertexId) -> Option<(usize, usize)> {
        let stride = self.cells_y + 1;
        self.vertices
            .iter()
            .position(|x| *x == v)
            .map(|k| (k / stride, k % stride))
    }
}
