mod shrinkwrap;

pub use shrinkwrap::{Shrinkwrap, WrapMode, WrapTarget};
