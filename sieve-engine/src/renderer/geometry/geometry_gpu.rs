use crate::device::error::RenderError;
use crate::device::init::Init;
use crate::renderer::buffer::{Buffer, OneShotCommands};
use ash::vk;
use sieve_asset::geometry::GeometryCpu;
use sieve_shader::renderer::draw::MeshDraw;
use std::sync::Arc;

/// The geometry store in device local memory, read only after upload.
pub struct GeometryGpu {
	pub vertices: Buffer,
	/// bound as index buffer by the indexed path
	pub indices: Buffer,
	pub meshlets: Buffer,
	pub meshlet_data: Buffer,
	pub meshes: Buffer,
	pub mesh_count: u32,
	has_meshlets: bool,
}

impl GeometryGpu {
	#[profiling::function]
	pub fn upload(init: &Arc<Init>, commands: &OneShotCommands, cpu: &GeometryCpu) -> Result<Self, RenderError> {
		let storage = vk::BufferUsageFlags::STORAGE_BUFFER;
		let geometry = Self {
			vertices: Buffer::upload(init, commands, "vertices", &cpu.vertices, storage)?,
			indices: Buffer::upload(
				init,
				commands,
				"indices",
				&cpu.indices,
				storage | vk::BufferUsageFlags::INDEX_BUFFER,
			)?,
			meshlets: Buffer::upload(init, commands, "meshlets", &cpu.meshlets, storage)?,
			meshlet_data: Buffer::upload(init, commands, "meshlet data", &cpu.meshlet_data, storage)?,
			meshes: Buffer::upload(init, commands, "meshes", &cpu.meshes, storage)?,
			mesh_count: cpu.meshes.len() as u32,
			has_meshlets: cpu.has_meshlets(),
		};
		log::info!(
			"uploaded {} meshes: {} vertices, {} triangles, {} meshlets",
			cpu.meshes.len(),
			cpu.vertices.len(),
			cpu.triangle_count(),
			cpu.meshlets.len()
		);
		Ok(geometry)
	}

	/// Whether the mesh shading path has anything to draw.
	pub fn has_meshlets(&self) -> bool {
		self.has_meshlets
	}
}

/// The draw set: one [`MeshDraw`] per object, uploaded once.
pub struct DrawSetGpu {
	pub draws: Buffer,
	len: u32,
}

impl DrawSetGpu {
	#[profiling::function]
	pub fn upload(init: &Arc<Init>, commands: &OneShotCommands, draws: &[MeshDraw]) -> Result<Self, RenderError> {
		let buffer = Buffer::upload(init, commands, "draws", draws, vk::BufferUsageFlags::STORAGE_BUFFER)?;
		log::info!("uploaded {} draws", draws.len());
		Ok(Self {
			draws: buffer,
			len: draws.len() as u32,
		})
	}

	/// Number of draws, also the capacity of every command buffer.
	pub fn len(&self) -> u32 {
		self.len
	}

	pub fn is_empty(&self) -> bool {
		self.len == 0
	}
}
