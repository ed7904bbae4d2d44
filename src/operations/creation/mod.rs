mod make_box;
mod make_cylinder;
mod make_grid;
mod make_prism;

pub use make_box::MakeBox;
pub use make_cylinder::MakeCylinder;
pub use make_grid::{Grid, MakeGrid};
pub use make_prism::{circle_profile, MakePrism};
