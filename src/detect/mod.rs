mod backend;
pub mod backends;
mod classes;
pub mod postprocess;
mod result;
mod shared;

pub use backend::DetectorBackend;
pub use backends::{open_backend, StubBackend};
pub use classes::ClassTable;
pub use result::{BoundingBox, Detection};
pub use shared::SharedBackend;
