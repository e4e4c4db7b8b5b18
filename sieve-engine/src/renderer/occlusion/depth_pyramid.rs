use crate::device::error::RenderError;
use crate::device::init::Init;
use crate::renderer::buffer::OneShotCommands;
use crate::renderer::frame_barriers;
use crate::renderer::image::Image;
use ash::vk;
use glam::UVec2;
use sieve_shader::renderer::depth_pyramid::{mip_extent, pyramid_extent, pyramid_levels};
use std::sync::Arc;

pub const PYRAMID_FORMAT: vk::Format = vk::Format::R32_SFLOAT;

/// The occlusion pyramid shared by both frame slots.
///
/// Written at the end of every frame from that frame's depth and read by the next frame's cull, so culling always
/// runs one frame behind. [`Self::valid`] tells whether it holds such a previous frame at all.
pub struct DepthPyramidImage {
	pub image: Image,
	valid: bool,
}

impl DepthPyramidImage {
	/// Creates the full mip chain for a render target of `render_extent` and moves it to the general layout.
	pub fn new(init: &Arc<Init>, commands: &OneShotCommands, render_extent: vk::Extent2D) -> Result<Self, RenderError> {
		let render = UVec2::new(render_extent.width, render_extent.height);
		let extent = pyramid_extent(render);
		let levels = pyramid_levels(render);
		let image = Image::new(
			init,
			"depth pyramid",
			PYRAMID_FORMAT,
			vk::Extent2D {
				width: extent.x,
				height: extent.y,
			},
			levels,
			vk::ImageUsageFlags::STORAGE | vk::ImageUsageFlags::SAMPLED | vk::ImageUsageFlags::TRANSFER_SRC,
		)?;
		commands.submit(|cmd| frame_barriers::pyramid_init(image.handle(), levels).record(&init.device, cmd))?;
		log::debug!("depth pyramid {}x{} with {} levels", extent.x, extent.y, levels);
		Ok(Self { image, valid: false })
	}

	pub fn levels(&self) -> u32 {
		self.image.mip_levels()
	}

	pub fn level_extent(&self, level: u32) -> UVec2 {
		let base = self.image.extent();
		mip_extent(UVec2::new(base.width, base.height), level)
	}

	/// The pyramid holds the depth of a previously submitted frame.
	pub fn valid(&self) -> bool {
		self.valid
	}

	pub fn mark_written(&mut self) {
		self.valid = true;
	}
}
