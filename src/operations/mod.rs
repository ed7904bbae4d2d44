pub mod boolean;
pub mod creation;
pub mod modification;
pub mod projection;
pub mod query;
pub mod transform;
