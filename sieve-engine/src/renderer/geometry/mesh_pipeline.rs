use crate::device::error::RenderError;
use crate::device::init::Init;
use crate::renderer::frame_in_flight::FrameSlot;
use crate::renderer::geometry::geometry_gpu::{DrawSetGpu, GeometryGpu};
use crate::renderer::pipeline::{Descriptor, Pipeline, RenderTargetFormats};
use crate::renderer::shader::ShaderModule;
use ash::vk;
use sieve_shader::renderer::bindings::mesh;
use sieve_shader::renderer::draw::MeshDrawCommand;
use std::sync::Arc;

/// Indexed triangle path: one indirect indexed draw per visible object, vertices pulled from the vertex buffer.
pub struct MeshDrawPipeline {
	init: Arc<Init>,
	pipeline: Pipeline,
}

impl MeshDrawPipeline {
	pub fn new(init: &Arc<Init>, module: &ShaderModule, formats: &RenderTargetFormats) -> Result<Self, RenderError> {
		let pipeline = Pipeline::graphics(
			init,
			module,
			mesh::TABLE,
			&[
				(vk::ShaderStageFlags::VERTEX, mesh::VERTEX_ENTRY),
				(vk::ShaderStageFlags::FRAGMENT, mesh::FRAGMENT_ENTRY),
			],
			formats,
		)?;
		Ok(Self {
			init: init.clone(),
			pipeline,
		})
	}

	/// Draws the commands of `frame` up to the GPU written count, or all `draws.len()` slots when the device cannot
	/// read the count.
	#[profiling::function]
	pub fn draw(&self, cmd: vk::CommandBuffer, frame: &FrameSlot, draws: &DrawSetGpu, geometry: &GeometryGpu) {
		let device = &self.init.device;
		self.pipeline.bind(cmd, &[
			Descriptor::Buffer(frame.frame_data.handle()),
			Descriptor::Buffer(draws.draws.handle()),
			Descriptor::Buffer(frame.commands.handle()),
			Descriptor::Buffer(geometry.vertices.handle()),
		]);
		let stride = size_of::<MeshDrawCommand>() as u32;
		let offset = MeshDrawCommand::INDEXED_OFFSET as vk::DeviceSize;
		unsafe {
			device.cmd_bind_index_buffer(cmd, geometry.indices.handle(), 0, vk::IndexType::UINT32);
			if self.init.capabilities.draw_indirect_count {
				device.cmd_draw_indexed_indirect_count(
					cmd,
					frame.commands.handle(),
					offset,
					frame.draw_count.handle(),
					0,
					draws.len(),
					stride,
				);
			} else {
				device.cmd_draw_indexed_indirect(cmd, frame.commands.handle(), offset, draws.len(), stride);
			}
		}
	}
}
