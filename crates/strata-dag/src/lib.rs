pub mod status;
pub mod validation;
pub mod vertex;

pub use status::VertexStatus;
pub use validation::{validate_structure, StructureError};
pub use vertex::Vertex;
