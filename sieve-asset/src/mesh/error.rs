use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MeshError {
	#[error("failed to load OBJ {path:?}")]
	Obj {
		path: PathBuf,
		#[source]
		source: tobj::LoadError,
	},
	#[error("mesh {0:?} contains no triangles")]
	Empty(String),
	#[error("mesh {name:?} has {count} indices, which is not a multiple of 3")]
	NotTriangleList { name: String, count: usize },
	#[error("mesh {name:?} references vertex {index} but only has {vertex_count} vertices")]
	IndexOutOfBounds { name: String, index: u32, vertex_count: usize },
	#[error("meshopt rejected the vertex layout: {0}")]
	VertexAdapter(String),
}
