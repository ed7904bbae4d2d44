use tracing::debug;

use crate::error::{OperationError, Result};
use crate::math::Point3;
use crate::mesh::{FaceId, Mesh, VertexId};

/// Joins two vertex loops (or open paths) with a strip of faces.
///
/// `a` must run in the direction the existing faces traverse it; the strip
/// is wound to match, so the result stays consistently oriented. Loops of
/// equal length are joined with quads `[a₁, a₀, b₀, b₁]`; otherwise a
/// zipper of triangles advances along whichever side keeps the diagonals
/// shortest.
pub struct BridgeLoops {
    closed: bool,
}

impl BridgeLoops {
    /// Creates a bridge between closed loops.
    #[must_use]
    pub fn new() -> Self {
        Self { closed: true }
    }

    /// Treats both inputs as open paths instead of loops.
    #[must_use]
    pub fn open(mut self) -> Self {
        self.closed = false;
        self
    }

    /// Executes the bridge, returning the new faces.
    ///
    /// # Errors
    ///
    /// Returns `OperationError::InvalidInput` if either side is too short,
    /// or an error if a face cannot be added.
    pub fn execute(&self, mesh: &mut Mesh, a: &[VertexId], b: &[VertexId]) -> Result<Vec<FaceId>> {
        let min = if self.closed { 3 } else { 2 };
        if a.len() < min || b.len() < min {
            return Err(OperationError::InvalidInput(format!(
                "bridge sides have {} and {} vertices",
                a.len(),
                b.len()
            ))
            .into());
        }
        let faces = if a.len() == b.len() {
            self.quads(mesh, a, b)?
        } else {
            self.zipper(mesh, a, b)?
        };
        debug!(
            a = a.len(),
            b = b.len(),
            faces = faces.len(),
            closed = self.closed,
            "bridged loops"
        );
        Ok(faces)
    }

    fn quads(&self, mesh: &mut Mesh, a: &[VertexId], b: &[VertexId]) -> Result<Vec<FaceId>> {
        let n = a.len();
        let spans = if self.closed { n } else { n - 1 };
        let mut faces = Vec::with_capacity(spans);
        for i in 0..spans {
            let j = (i + 1) % n;
            if let Some(f) = add_distinct(mesh, &[a[j], a[i], b[i], b[j]])? {
                faces.push(f);
            }
        }
        Ok(faces)
    }

    fn zipper(&self, mesh: &mut Mesh, a: &[VertexId], b: &[VertexId]) -> Result<Vec<FaceId>> {
        let (na, nb) = (a.len(), b.len());
        let (steps_a, steps_b) = if self.closed { (na, nb) } else { (na - 1, nb - 1) };
        let pa: Vec<Point3> = a.iter().map(|v| mesh.point(*v)).collect::<Result<_>>()?;
        let pb: Vec<Point3> = b.iter().map(|v| mesh.point(*v)).collect::<Result<_>>()?;

        let mut faces = Vec::with_capacity(steps_a + steps_b);
        let (mut i, mut j) = (0, 0);
        while i < steps_a || j < steps_b {
            let ni = (i + 1) % na;
            let nj = (j + 1) % nb;
            let advance_a = if i >= steps_a {
                false
            } else if j >= steps_b {
                true
            } else {
                (pa[ni] - pb[j % nb]).norm() <= (pb[nj] - pa[i % na]).norm()
            };
            let tri = if advance_a {
                i += 1;
                [a[ni], a[(i - 1) % na], b[j % nb]]
            } else {
                j += 1;
                [a[i % na], b[(j - 1) % nb], b[nj]]
            };
            if let Some(f) = add_distinct(mesh, &tri)? {
                faces.push(f);
            }
        }
        Ok(faces)
    }
}

impl Default for BridgeLoops {
    fn default() -> Self {
        Self::new()
    }
}

/// Adds a face after dropping repeated vertices; skips it if fewer than
/// three remain.
fn add_distinct(mesh: &mut Mesh, verts: &[VertexId]) -> Result<Option<FaceId>> {
    let mut loop_: Vec<VertexId> = Vec::with_capacity(verts.len());
    for v in verts {
        if !loop_.contains(v) {
            loop_.push(*v);
        }
    }
    if loop_.len() < 3 {
        return Ok(None);
    }
    mesh.add_face(&loop_).map(Some)
}

/// Rotates `b` so that its first vertex is the one closest to `a[0]`.
///
/// # Errors
///
/// Returns an error if a vertex is missing.
pub fn align_loop(mesh: &Mesh, a: &[VertexId], b: &mut [VertexId]) -> Result<()> {
    let Some(first) = a.first() else {
        return Ok(());
    };
    let anchor = mesh.point(*first)?;
    let mut best = (f64::INFINITY, 0);
    for (i, v) in b.iter().enumerate() {
        let d = (mesh.point(*v)? - anchor).norm_squared();
        if d < best.0 {
            best = (d, i);
        }
    }
    b.rotate_left(best.1);
    Ok(())
}
