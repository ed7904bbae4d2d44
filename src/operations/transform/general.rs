use crate::error::Result;
use crate::math::Isometry3;
use crate::mesh::{Mesh, Selection};

/// Applies a rigid transform to a mesh, or only to a selection of its vertices.
pub struct Transform {
    iso: Isometry3,
    selection: Option<Selection>,
}

impl Transform {
    /// Creates a new `Transform` operation over the whole mesh.
    #[must_use]
    pub fn new(iso: Isometry3) -> Self {
        Self {
            iso,
            selection: None,
        }
    }

    /// Restricts the transform to `selection`.
    #[must_use]
    pub fn restricted_to(mut self, selection: Selection) -> Self {
        self.selection = Some(selection);
        self
    }

    /// Executes the transformation in place.
    ///
    /// # Errors
    ///
    /// Returns an error if a selected vertex is missing from the mesh.
    pub fn execute(&self, mesh: &mut Mesh) -> Result<()> {
        match &self.selection {
            None => mesh.transform(&self.iso),
            Some(sel) => {
                for v in sel.iter() {
                    let p = mesh.point(v)?;
                    mesh.set_point(v, self.iso * p)?;
                }
            }
        }
        Ok(())
    }
}
