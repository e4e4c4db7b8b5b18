pub mod error;
pub mod load;
pub mod primitives;
pub mod process;

pub use error::MeshError;
pub use load::RawMesh;
pub use process::{LodCpu, ProcessSettings, ProcessedMesh, process_mesh};
