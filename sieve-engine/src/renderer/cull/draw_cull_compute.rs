use crate::device::error::RenderError;
use crate::device::init::Init;
use crate::renderer::frame_barriers;
use crate::renderer::frame_in_flight::FrameSlot;
use crate::renderer::geometry::geometry_gpu::{DrawSetGpu, GeometryGpu};
use crate::renderer::occlusion::depth_pyramid::DepthPyramidImage;
use crate::renderer::pipeline::{Descriptor, Pipeline};
use crate::renderer::shader::ShaderModule;
use ash::vk;
use sieve_shader::renderer::bindings::draw_cull as bindings;
use sieve_shader::renderer::draw_cull::dispatch_groups;
use std::sync::Arc;

/// Frustum, distance and occlusion culling plus LOD selection, compacting the survivors into the slot's command
/// buffer.
pub struct DrawCullCompute {
	init: Arc<Init>,
	pipeline: Pipeline,
}

impl DrawCullCompute {
	pub fn new(init: &Arc<Init>, module: &ShaderModule) -> Result<Self, RenderError> {
		let pipeline = Pipeline::compute(init, module, bindings::TABLE, bindings::ENTRY)?;
		Ok(Self {
			init: init.clone(),
			pipeline,
		})
	}

	/// Resets the count and culls every draw. Without indirect count support the command buffer is cleared as
	/// well, so slots past the count become empty draws.
	#[profiling::function]
	pub fn dispatch(
		&self,
		cmd: vk::CommandBuffer,
		frame: &FrameSlot,
		draws: &DrawSetGpu,
		geometry: &GeometryGpu,
		pyramid: &DepthPyramidImage,
	) {
		let device = &self.init.device;
		unsafe {
			device.cmd_fill_buffer(cmd, frame.draw_count.handle(), 0, vk::WHOLE_SIZE, 0);
			if !self.init.capabilities.draw_indirect_count {
				device.cmd_fill_buffer(cmd, frame.commands.handle(), 0, vk::WHOLE_SIZE, 0);
			}
		}
		frame_barriers::before_cull().record(device, cmd);

		self.pipeline.bind(cmd, &[
			Descriptor::Buffer(frame.frame_data.handle()),
			Descriptor::Buffer(draws.draws.handle()),
			Descriptor::Buffer(geometry.meshes.handle()),
			Descriptor::Buffer(frame.commands.handle()),
			Descriptor::Buffer(frame.draw_count.handle()),
			Descriptor::Image(pyramid.image.view(), vk::ImageLayout::GENERAL),
		]);
		let groups = dispatch_groups(draws.len());
		if groups > 0 {
			unsafe { device.cmd_dispatch(cmd, groups, 1, 1) };
		}
		frame_barriers::after_cull(self.init.capabilities.mesh_shading).record(device, cmd);
	}
}
