mod general;
mod mirror;

pub use general::Transform;
pub use mirror::Mirror;
