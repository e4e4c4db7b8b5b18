use crate::device::error::RenderError;
use crate::device::init::Init;
use crate::renderer::image::Image;
use crate::renderer::pipeline::RenderTargetFormats;
use ash::vk;
use std::sync::Arc;

pub const DEPTH_FORMAT: vk::Format = vk::Format::D32_SFLOAT;

/// Size dependent attachments of the geometry pass, rebuilt on every swapchain recreation.
pub struct RenderTargets {
	/// copied into the swapchain image at the end of the frame
	pub color: Image,
	/// sampled by the first reduction of the depth pyramid
	pub depth: Image,
}

impl RenderTargets {
	pub fn new(init: &Arc<Init>, formats: RenderTargetFormats, extent: vk::Extent2D) -> Result<Self, RenderError> {
		let color = Image::new(
			init,
			"color",
			formats.color,
			extent,
			1,
			vk::ImageUsageFlags::COLOR_ATTACHMENT | vk::ImageUsageFlags::TRANSFER_SRC,
		)?;
		let depth = Image::new(
			init,
			"depth",
			formats.depth,
			extent,
			1,
			vk::ImageUsageFlags::DEPTH_STENCIL_ATTACHMENT | vk::ImageUsageFlags::SAMPLED,
		)?;
		Ok(Self { color, depth })
	}

	pub fn extent(&self) -> vk::Extent2D {
		self.color.extent()
	}
}
