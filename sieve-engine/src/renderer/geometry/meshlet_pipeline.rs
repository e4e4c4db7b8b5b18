use crate::device::error::RenderError;
use crate::device::init::Init;
use crate::renderer::frame_in_flight::FrameSlot;
use crate::renderer::geometry::geometry_gpu::{DrawSetGpu, GeometryGpu};
use crate::renderer::pipeline::{Descriptor, Pipeline, RenderTargetFormats};
use crate::renderer::shader::ShaderModule;
use ash::ext;
use ash::vk;
use sieve_shader::renderer::bindings::meshlet;
use sieve_shader::renderer::draw::MeshDrawCommand;
use std::sync::Arc;

/// Mesh shading path: the task shader culls the meshlets of the selected LOD, the mesh shader emits the
/// survivors.
pub struct MeshletDrawPipeline {
	init: Arc<Init>,
	mesh_shader: ext::mesh_shader::Device,
	pipeline: Pipeline,
}

impl MeshletDrawPipeline {
	/// `None` if the device does not support mesh shading.
	pub fn new(
		init: &Arc<Init>,
		module: &ShaderModule,
		formats: &RenderTargetFormats,
	) -> Result<Option<Self>, RenderError> {
		let Some(mesh_shader) = init.mesh_shader.clone() else {
			return Ok(None);
		};
		let pipeline = Pipeline::graphics(
			init,
			module,
			meshlet::TABLE,
			&[
				(vk::ShaderStageFlags::TASK_EXT, meshlet::TASK_ENTRY),
				(vk::ShaderStageFlags::MESH_EXT, meshlet::MESH_ENTRY),
				(vk::ShaderStageFlags::FRAGMENT, meshlet::FRAGMENT_ENTRY),
			],
			formats,
		)?;
		Ok(Some(Self {
			init: init.clone(),
			mesh_shader,
			pipeline,
		}))
	}

	#[profiling::function]
	pub fn draw(&self, cmd: vk::CommandBuffer, frame: &FrameSlot, draws: &DrawSetGpu, geometry: &GeometryGpu) {
		self.pipeline.bind(cmd, &[
			Descriptor::Buffer(frame.frame_data.handle()),
			Descriptor::Buffer(draws.draws.handle()),
			Descriptor::Buffer(frame.commands.handle()),
			Descriptor::Buffer(geometry.vertices.handle()),
			Descriptor::Buffer(geometry.meshlets.handle()),
			Descriptor::Buffer(geometry.meshlet_data.handle()),
		]);
		let stride = size_of::<MeshDrawCommand>() as u32;
		let offset = MeshDrawCommand::TASK_OFFSET as vk::DeviceSize;
		unsafe {
			if self.init.capabilities.draw_indirect_count {
				self.mesh_shader.cmd_draw_mesh_tasks_indirect_count(
					cmd,
					frame.commands.handle(),
					offset,
					frame.draw_count.handle(),
					0,
					draws.len(),
					stride,
				);
			} else {
				self.mesh_shader
					.cmd_draw_mesh_tasks_indirect(cmd, frame.commands.handle(), offset, draws.len(), stride);
			}
		}
	}
}
