use crate::mesh::MeshError;
use glam::{Vec2, Vec3};
use sieve_shader::renderer::mesh::Vertex;
use std::io::BufReader;
use std::path::Path;

/// An unprocessed indexed triangle list.
#[derive(Clone, Debug, Default)]
pub struct RawMesh {
	pub name: String,
	pub vertices: Vec<Vertex>,
	pub indices: Vec<u32>,
}

impl RawMesh {
	pub fn triangle_count(&self) -> usize {
		self.indices.len() / 3
	}

	pub fn validate(&self) -> Result<(), MeshError> {
		if self.indices.is_empty() {
			return Err(MeshError::Empty(self.name.clone()));
		}
		if self.indices.len() % 3 != 0 {
			return Err(MeshError::NotTriangleList {
				name: self.name.clone(),
				count: self.indices.len(),
			});
		}
		if let Some(&index) = self.indices.iter().find(|&&i| i as usize >= self.vertices.len()) {
			return Err(MeshError::IndexOutOfBounds {
				name: self.name.clone(),
				index,
				vertex_count: self.vertices.len(),
			});
		}
		Ok(())
	}
}

#[profiling::function]
pub fn load_obj(path: &Path) -> Result<RawMesh, MeshError> {
	let (models, _) = tobj::load_obj(path, &tobj::GPU_LOAD_OPTIONS).map_err(|source| MeshError::Obj {
		path: path.to_path_buf(),
		source,
	})?;
	let name = path
		.file_stem()
		.map(|s| s.to_string_lossy().into_owned())
		.unwrap_or_default();
	let mesh = merge_models(name, models);
	log::info!(
		"loaded {:?}: {} vertices, {} triangles",
		path,
		mesh.vertices.len(),
		mesh.triangle_count()
	);
	Ok(mesh)
}

/// Loads an OBJ from memory, material libraries are ignored.
pub fn load_obj_buf(name: &str, obj: &[u8]) -> Result<RawMesh, MeshError> {
	let (models, _) = tobj::load_obj_buf(&mut BufReader::new(obj), &tobj::GPU_LOAD_OPTIONS, |_| {
		Err(tobj::LoadError::OpenFileFailed)
	})
	.map_err(|source| MeshError::Obj {
		path: name.into(),
		source,
	})?;
	Ok(merge_models(name.to_string(), models))
}

/// Concatenates all OBJ objects into one mesh. Missing normals are generated from the faces.
fn merge_models(name: String, models: Vec<tobj::Model>) -> RawMesh {
	let mut vertices = Vec::new();
	let mut indices = Vec::new();
	for model in models {
		let mesh = model.mesh;
		let base = vertices.len() as u32;
		let positions = mesh
			.positions
			.chunks_exact(3)
			.map(|p| Vec3::new(p[0], p[1], p[2]))
			.collect::<Vec<_>>();
		let normals = if mesh.normals.len() == mesh.positions.len() {
			mesh.normals
				.chunks_exact(3)
				.map(|n| Vec3::new(n[0], n[1], n[2]))
				.collect()
		} else {
			face_normals(&positions, &mesh.indices)
		};
		let tex_coord = |i: usize| {
			mesh.texcoords
				.get(i * 2..i * 2 + 2)
				.map(|t| Vec2::new(t[0], t[1]))
				.unwrap_or(Vec2::ZERO)
		};

		vertices.extend(
			positions
				.iter()
				.zip(normals.iter())
				.enumerate()
				.map(|(i, (&p, &n))| Vertex::new(p, n, tex_coord(i))),
		);
		indices.extend(mesh.indices.iter().map(|i| base + i));
	}
	RawMesh { name, vertices, indices }
}

/// Area weighted vertex normals.
pub fn face_normals(positions: &[Vec3], indices: &[u32]) -> Vec<Vec3> {
	let mut normals = vec![Vec3::ZERO; positions.len()];
	for tri in indices.chunks_exact(3) {
		let [a, b, c] = [tri[0], tri[1], tri[2]].map(|i| i as usize);
		let n = (positions[b] - positions[a]).cross(positions[c] - positions[a]);
		for i in [a, b, c] {
			normals[i] += n;
		}
	}
	normals.into_iter().map(|n| n.normalize_or_zero()).collect()
}

#[cfg(test)]
mod tests {
	use super::*;
	use approx::assert_relative_eq;

	const QUAD: &str = "\
o quad
v 0 0 0
v 1 0 0
v 1 1 0
v 0 1 0
vt 0 0
vt 1 0
vt 1 1
vt 0 1
f 1/1 2/2 3/3 4/4
";

	#[test]
	fn load_quad_triangulated() -> anyhow::Result<()> {
		let mesh = load_obj_buf("quad", QUAD.as_bytes())?;
		mesh.validate()?;
		assert_eq!(mesh.vertices.len(), 4);
		assert_eq!(mesh.triangle_count(), 2);
		for v in &mesh.vertices {
			// counter clockwise in the xy plane, generated normals face +z
			assert_relative_eq!(v.normal().z, 1., epsilon = 0.01);
		}
		assert_relative_eq!(mesh.vertices[2].tex_coord().x, 1.);
		Ok(())
	}

	#[test]
	fn rejects_malformed_meshes() {
		let mut mesh = RawMesh {
			name: "broken".into(),
			vertices: vec![Vertex::default(); 3],
			indices: vec![0, 1],
		};
		assert!(matches!(mesh.validate(), Err(MeshError::NotTriangleList { count: 2, .. })));
		mesh.indices = vec![0, 1, 3];
		assert!(matches!(mesh.validate(), Err(MeshError::IndexOutOfBounds { index: 3, .. })));
		mesh.indices.clear();
		assert!(matches!(mesh.validate(), Err(MeshError::Empty(_))));
	}
}
