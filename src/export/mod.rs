//! Writing generated meshes to disk.

pub mod stl;

pub use stl::{to_ascii_stl, to_binary_stl, write_stl, StlFormat};
