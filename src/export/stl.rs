//! STL export, binary and ASCII.

use std::fmt::Write as _;
use std::fs;
use std::path::Path;

use tracing::info;

use crate::error::{ExportError, Result};
use crate::mesh::Mesh;
use crate::tessellation::{TessellateMesh, TriangleMesh};

const HEADER_LEN: usize = 80;
const TRIANGLE_LEN: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StlFormat {
    #[default]
    Binary,
    Ascii,
}

/// Encodes a triangle mesh as binary STL.
///
/// Layout: an 80-byte header, a little-endian `u32` triangle count, then
/// per triangle the facet normal and three corners as `f32` followed by a
/// zero `u16` attribute.
///
/// # Errors
///
/// Returns `ExportError::EmptyMesh` if there are no triangles.
#[allow(clippy::cast_possible_truncation)]
pub fn to_binary_stl(mesh: &TriangleMesh, name: &str) -> Result<Vec<u8>> {
    let count = mesh.triangle_count();
    if count == 0 {
        return Err(ExportError::EmptyMesh(name.to_string()).into());
    }
    let count_field = u32::try_from(count)
        .map_err(|_| ExportError::EmptyMesh(format!("{name} (too many triangles)")))?;

    let mut buf = Vec::with_capacity(HEADER_LEN + 4 + count * TRIANGLE_LEN);
    let header = format!("binary STL: {name}");
    let header = header.as_bytes();
    buf.extend_from_slice(&header[..header.len().min(HEADER_LEN)]);
    buf.resize(HEADER_LEN, 0);
    buf.extend_from_slice(&count_field.to_le_bytes());

    for i in 0..count {
        let n = mesh.facet_normal(i);
        for c in [n.x, n.y, n.z] {
            buf.extend_from_slice(&(c as f32).to_le_bytes());
        }
        for p in mesh.triangle(i) {
            for c in [p.x, p.y, p.z] {
                buf.extend_from_slice(&(c as f32).to_le_bytes());
            }
        }
        buf.extend_from_slice(&0u16.to_le_bytes());
    }
    Ok(buf)
}

/// Encodes a triangle mesh as ASCII STL.
///
/// # Errors
///
/// Returns `ExportError::EmptyMesh` if there are no triangles.
pub fn to_ascii_stl(mesh: &TriangleMesh, name: &str) -> Result<String> {
    let count = mesh.triangle_count();
    if count == 0 {
        return Err(ExportError::EmptyMesh(name.to_string()).into());
    }
    let mut out = String::with_capacity(count * 256);
    // Writing into a String cannot fail.
    let _ = writeln!(out, "solid {name}");
    for i in 0..count {
        let n = mesh.facet_normal(i);
        let _ = writeln!(out, "  facet normal {:e} {:e} {:e}", n.x, n.y, n.z);
        out.push_str("    outer loop\n");
        for p in mesh.triangle(i) {
            let _ = writeln!(out, "      vertex {:e} {:e} {:e}", p.x, p.y, p.z);
        }
        out.push_str("    endloop\n");
        out.push_str("  endfacet\n");
    }
    let _ = writeln!(out, "endsolid {name}");
    Ok(out)
}

/// Tessellates `mesh` and writes it to `path`, returning the triangle count.
///
/// # Errors
///
/// Returns a tessellation error, `ExportError::EmptyMesh` for a mesh with
/// no faces, or `ExportError::Io` if the file cannot be written.
pub fn write_stl(mesh: &Mesh, path: &Path, format: StlFormat) -> Result<usize> {
    let name = path
        .file_stem()
        .map_or_else(|| "mesh".to_string(), |s| s.to_string_lossy().into_owned());
    let triangles = TessellateMesh::new().execute(mesh)?;
    let bytes = match format {
        StlFormat::Binary => to_binary_stl(&triangles, &name)?,
        StlFormat::Ascii => to_ascii_stl(&triangles, &name)?.into_bytes(),
    };
    fs::write(path, bytes).map_err(|source| ExportError::Io {
        path: path.display().to_string(),
        source,
    })?;
    info!(
        path = %path.display(),
        triangles = triangles.triangle_count(),
        format = ?format,
        "wrote STL"
    );
    Ok(triangles.triangle_count())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::math::Point3;
    use crate::operations::creation::MakeBox;

    fn triangle() -> TriangleMesh {
        TriangleMesh {
            vertices: vec![
                Point3::new(0.0, 0.0, 0.0),
                Point3::new(1.0, 0.0, 0.0),
                Point3::new(0.0, 1.0, 0.0),
            ],
            indices: vec![[0, 1, 2]],
        }
    }

    fn f32_at(bytes: &[u8], offset: usize) -> f32 {
        f32::from_le_bytes(bytes[offset..offset + 4].try_into().unwrap())
    }

    #[test]
    fn binary_layout() {
        let bytes = to_binary_stl(&triangle(), "tri").unwrap();
        assert_eq!(bytes.len(), HEADER_LEN + 4 + TRIANGLE_LEN);
        assert!(bytes.starts_with(b"binary STL: tri"));
        assert_eq!(u32::from_le_bytes(bytes[80..84].try_into().unwrap()), 1);
        // Normal, then the second corner's x.
        assert_eq!(f32_at(&bytes, 84 + 8), 1.0);
        assert_eq!(f32_at(&bytes, 84 + 24), 1.0);
        assert_eq!(&bytes[bytes.len() - 2..], &[0, 0]);
    }

    #[test]
    fn ascii_layout() {
        let text = to_ascii_stl(&triangle(), "tri").unwrap();
        assert!(text.starts_with("solid tri\n"));
        assert!(text.trim_end().ends_with("endsolid tri"));
        assert_eq!(text.matches("facet normal").count(), 1);
        assert_eq!(text.matches("vertex").count(), 3);
        assert!(text.contains("facet normal 0e0 0e0 1e0"));
    }

    #[test]
    fn empty_meshes_are_rejected() {
        let empty = TriangleMesh::default();
        assert!(to_binary_stl(&empty, "empty").is_err());
        assert!(to_ascii_stl(&empty, "empty").is_err());
    }

    #[test]
    fn writes_a_tessellated_box() {
        let cube = MakeBox::new(Point3::origin(), Point3::new(2.0, 2.0, 2.0))
            .execute()
            .unwrap();
        let dir = std::env::temp_dir().join(format!("keywell-stl-{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join("cube.stl");
        let count = write_stl(&cube, &path, StlFormat::Binary).unwrap();
        assert_eq!(count, 12);
        assert_eq!(fs::metadata(&path).unwrap().len(), 84 + 12 * 50);

        let ascii = dir.join("cube_ascii.stl");
        write_stl(&cube, &ascii, StlFormat::Ascii).unwrap();
        let text = fs::read_to_string(&ascii).unwrap();
        assert!(text.starts_with("solid cube_ascii"));
        fs::remove_dir_all(&dir).unwrap();
    }
}
