use crate::mesh::ProcessedMesh;
use sieve_shader::renderer::mesh::{MAX_LODS, Mesh, MeshLod, Meshlet, Vertex};

/// Contents of the shared geometry buffers: every mesh and every LOD concatenated and addressed by offsets.
#[derive(Clone, Debug, Default)]
pub struct GeometryCpu {
	pub vertices: Vec<Vertex>,
	/// relative to the owning mesh's `vertex_offset`
	pub indices: Vec<u32>,
	pub meshlets: Vec<Meshlet>,
	pub meshlet_data: Vec<u32>,
	pub meshes: Vec<Mesh>,
}

impl GeometryCpu {
	/// Appends a processed mesh and returns its mesh index.
	pub fn push(&mut self, mesh: &ProcessedMesh) -> u32 {
		let mut out = Mesh {
			center: mesh.center.to_array(),
			radius: mesh.radius,
			vertex_offset: self.vertices.len() as u32,
			vertex_count: mesh.vertices.len() as u32,
			lod_count: mesh.lods.len().min(MAX_LODS) as u32,
			..Mesh::default()
		};
		self.vertices.extend_from_slice(&mesh.vertices);

		for (lod, out_lod) in mesh.lods.iter().zip(out.lods.iter_mut()) {
			let data_offset = self.meshlet_data.len() as u32;
			*out_lod = MeshLod {
				index_offset: self.indices.len() as u32,
				index_count: lod.indices.len() as u32,
				meshlet_offset: self.meshlets.len() as u32,
				meshlet_count: lod.meshlets.len() as u32,
				error: lod.error,
			};
			self.indices.extend_from_slice(&lod.indices);
			self.meshlets.extend(lod.meshlets.iter().map(|m| Meshlet {
				data_offset: m.data_offset + data_offset,
				..*m
			}));
			self.meshlet_data.extend_from_slice(&lod.meshlet_data);
		}

		self.meshes.push(out);
		self.meshes.len() as u32 - 1
	}

	pub fn has_meshlets(&self) -> bool {
		!self.meshlets.is_empty()
	}

	pub fn triangle_count(&self) -> usize {
		self.indices.len() / 3
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::mesh::primitives::icosphere;
	use crate::mesh::{ProcessSettings, process_mesh};

	#[test]
	fn offsets_address_each_mesh() -> anyhow::Result<()> {
		let a = process_mesh(icosphere(2), &ProcessSettings::default())?;
		let b = process_mesh(icosphere(3), &ProcessSettings::default())?;
		let mut geometry = GeometryCpu::default();
		assert_eq!(geometry.push(&a), 0);
		assert_eq!(geometry.push(&b), 1);

		let mesh = geometry.meshes[1];
		assert_eq!(mesh.vertex_offset as usize, a.vertices.len());
		assert_eq!(mesh.lod_count as usize, b.lods.len());
		for (i, lod) in b.lods.iter().enumerate() {
			let out = mesh.lods[i];
			let indices = &geometry.indices[out.index_offset as usize..][..out.index_count as usize];
			assert_eq!(indices, &lod.indices[..]);

			let meshlets = &geometry.meshlets[out.meshlet_offset as usize..][..out.meshlet_count as usize];
			for (meshlet, local) in meshlets.iter().zip(&lod.meshlets) {
				let data = &geometry.meshlet_data[meshlet.data_offset as usize..][..meshlet.data_len() as usize];
				assert_eq!(data, &lod.meshlet_data[local.data_offset as usize..][..local.data_len() as usize]);
			}
		}
		assert_eq!(geometry.vertices.len(), a.vertices.len() + b.vertices.len());
		Ok(())
	}
}
