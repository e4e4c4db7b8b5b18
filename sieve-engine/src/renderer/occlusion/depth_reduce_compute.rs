use crate::device::error::RenderError;
use crate::device::init::Init;
use crate::renderer::frame_barriers;
use crate::renderer::image::Image;
use crate::renderer::occlusion::depth_pyramid::DepthPyramidImage;
use crate::renderer::pipeline::{Descriptor, Pipeline};
use crate::renderer::shader::ShaderModule;
use ash::vk;
use glam::UVec2;
use sieve_shader::renderer::bindings::depth_reduce;
use sieve_shader::renderer::depth_reduce::{DepthReduceParams, dispatch_groups};
use std::sync::Arc;

/// Builds the depth pyramid, one dispatch per mip.
pub struct DepthReduceCompute {
	init: Arc<Init>,
	pipeline: Pipeline,
}

impl DepthReduceCompute {
	pub fn new(init: &Arc<Init>, module: &ShaderModule) -> Result<Self, RenderError> {
		let pipeline = Pipeline::compute(init, module, depth_reduce::TABLE, depth_reduce::ENTRY)?;
		Ok(Self {
			init: init.clone(),
			pipeline,
		})
	}

	/// Level 0 reduces `depth`, which must be in the shader read only layout. Every later level reduces the level
	/// before it. All pyramid levels are in the general layout.
	#[profiling::function]
	pub fn dispatch(&self, cmd: vk::CommandBuffer, depth: &Image, pyramid: &DepthPyramidImage) {
		let device = &self.init.device;
		let render = depth.extent();
		let levels = pyramid.levels();
		for level in 0..levels {
			let (src, src_layout, src_extent) = match level {
				0 => (
					depth.view(),
					vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
					UVec2::new(render.width, render.height),
				),
				_ => (
					pyramid.image.mip_view(level - 1),
					vk::ImageLayout::GENERAL,
					pyramid.level_extent(level - 1),
				),
			};
			let dst_extent = pyramid.level_extent(level);
			self.pipeline.bind(cmd, &[
				Descriptor::Image(src, src_layout),
				Descriptor::Image(pyramid.image.mip_view(level), vk::ImageLayout::GENERAL),
			]);
			self.pipeline.layout.push_constants(cmd, &DepthReduceParams {
				src_extent: src_extent.to_array(),
				dst_extent: dst_extent.to_array(),
			});
			let groups = dispatch_groups(dst_extent);
			unsafe { device.cmd_dispatch(cmd, groups.x, groups.y, 1) };
			frame_barriers::after_reduce(level + 1 == levels).record(device, cmd);
		}
	}
}
