use std::collections::BTreeMap;

use crate::error::Result;
use crate::mesh::loops::connected_components;
use crate::mesh::{Mesh, VertexId};

/// One connected piece of a split mesh.
#[derive(Debug, Clone)]
pub struct Part {
    pub mesh: Mesh,
    /// Source vertex → vertex in `mesh`.
    pub map: BTreeMap<VertexId, VertexId>,
}

/// Separates a mesh into its edge-connected pieces, in order of their
/// first face.
#[derive(Debug, Default)]
pub struct SplitByConnectivity;

impl SplitByConnectivity {
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Executes the split.
    ///
    /// # Errors
    ///
    /// Returns an error if a face cannot be copied.
    pub fn execute(&self, mesh: &Mesh) -> Result<Vec<Part>> {
        let mut parts = Vec::new();
        for component in connected_components(mesh) {
            let mut out = Mesh::new();
            let mut map = BTreeMap::new();
            for f in &component {
                let mut loop_ = Vec::new();
                for v in mesh.face_vertices(*f)? {
                    let nv = match map.get(v) {
                        Some(nv) => *nv,
                        None => {
                            let nv = out.add_vertex(mesh.point(*v)?);
                            map.insert(*v, nv);
                            nv
                        }
                    };
                    loop_.push(nv);
                }
                out.add_face(&loop_)?;
            }
            parts.push(Part { mesh: out, map });
        }
        Ok(parts)
    }
}
