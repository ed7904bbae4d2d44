pub mod case;
pub mod error;
pub mod export;
pub mod math;
pub mod mesh;
pub mod operations;
pub mod tessellation;

pub use error::{CaseError, Result};
