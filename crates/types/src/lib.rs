pub mod dims;
pub mod selection;
pub mod units;

pub use dims::EntityDim;
pub use selection::{SelectionExpr, SelectionId};
pub use units::{parse_angle, parse_length, UnitError};
