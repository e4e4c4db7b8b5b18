use crate::device::error::RenderError;
use crate::device::init::Init;
use ash::vk;
use smallvec::SmallVec;
use std::sync::Arc;

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum AcquireOutcome {
	Image { index: u32, suboptimal: bool },
	/// out of date or timed out, the swapchain must be recreated before the next acquire
	OutOfDate,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum PresentOutcome {
	Presented,
	Suboptimal,
	OutOfDate,
}

impl PresentOutcome {
	pub fn needs_recreate(self) -> bool {
		self != PresentOutcome::Presented
	}
}

pub struct Swapchain {
	init: Arc<Init>,
	swapchain: vk::SwapchainKHR,
	format: vk::SurfaceFormatKHR,
	present_mode: vk::PresentModeKHR,
	extent: vk::Extent2D,
	images: Vec<vk::Image>,
	/// one per image, a present may still wait on it when the image is acquired again
	present_semaphores: Vec<vk::Semaphore>,
}

impl Swapchain {
	pub fn new(init: &Arc<Init>, window_extent: [u32; 2], vsync: bool) -> Result<Self, RenderError> {
		let surface_instance = &init.surface_instance;
		let formats = unsafe {
			surface_instance.get_physical_device_surface_formats(init.physical_device, init.surface)?
		};
		let format = choose_surface_format(&formats).ok_or(RenderError::NoSurfaceFormat)?;
		let present_modes = unsafe {
			surface_instance.get_physical_device_surface_present_modes(init.physical_device, init.surface)?
		};
		let present_mode = choose_present_mode(&present_modes, vsync);
		log::info!("swapchain {:?} {:?}", format.format, present_mode);

		let mut swapchain = Self {
			init: init.clone(),
			swapchain: vk::SwapchainKHR::null(),
			format,
			present_mode,
			extent: vk::Extent2D::default(),
			images: Vec::new(),
			present_semaphores: Vec::new(),
		};
		swapchain.recreate(window_extent)?;
		Ok(swapchain)
	}

	/// Recreates the swapchain at the current surface size. The device must not use any swapchain image.
	#[profiling::function]
	pub fn recreate(&mut self, window_extent: [u32; 2]) -> Result<(), RenderError> {
		let init = &self.init;
		let capabilities = unsafe {
			init.surface_instance
				.get_physical_device_surface_capabilities(init.physical_device, init.surface)?
		};
		let required_usage = vk::ImageUsageFlags::COLOR_ATTACHMENT | vk::ImageUsageFlags::TRANSFER_DST;
		if !capabilities.supported_usage_flags.contains(required_usage) {
			return Err(RenderError::MissingFeature("swapchain images as transfer destination"));
		}

		let extent = surface_extent(&capabilities, window_extent);
		let old = self.swapchain;
		let create_info = vk::SwapchainCreateInfoKHR::default()
			.surface(init.surface)
			.min_image_count(image_count(&capabilities, self.present_mode))
			.image_format(self.format.format)
			.image_color_space(self.format.color_space)
			.image_extent(extent)
			.image_array_layers(1)
			.image_usage(required_usage)
			.image_sharing_mode(vk::SharingMode::EXCLUSIVE)
			.pre_transform(capabilities.current_transform)
			.composite_alpha(vk::CompositeAlphaFlagsKHR::OPAQUE)
			.present_mode(self.present_mode)
			.clipped(true)
			.old_swapchain(old);
		self.swapchain = unsafe { init.swapchain_device.create_swapchain(&create_info, None)? };
		unsafe {
			init.swapchain_device.destroy_swapchain(old, None);
			for semaphore in self.present_semaphores.drain(..) {
				init.device.destroy_semaphore(semaphore, None);
			}
		}

		self.images = unsafe { init.swapchain_device.get_swapchain_images(self.swapchain)? };
		self.present_semaphores = self
			.images
			.iter()
			.map(|_| unsafe { init.device.create_semaphore(&vk::SemaphoreCreateInfo::default(), None) })
			.collect::<Result<_, _>>()?;
		self.extent = extent;
		log::debug!("swapchain recreated at {}x{} with {} images", extent.width, extent.height, self.images.len());
		Ok(())
	}

	/// Blocks until an image is available and signals `acquired` once the image may be written.
	#[profiling::function]
	pub fn acquire(&self, acquired: vk::Semaphore) -> Result<AcquireOutcome, RenderError> {
		let result = unsafe {
			self.init
				.swapchain_device
				.acquire_next_image(self.swapchain, u64::MAX, acquired, vk::Fence::null())
		};
		match result {
			Ok((index, suboptimal)) => Ok(AcquireOutcome::Image { index, suboptimal }),
			Err(vk::Result::ERROR_OUT_OF_DATE_KHR | vk::Result::TIMEOUT | vk::Result::NOT_READY) => {
				Ok(AcquireOutcome::OutOfDate)
			}
			Err(e) => Err(e.into()),
		}
	}

	#[profiling::function]
	pub fn present(&self, index: u32) -> Result<PresentOutcome, RenderError> {
		let wait = [self.present_semaphores[index as usize]];
		let swapchains = [self.swapchain];
		let indices = [index];
		let present_info = vk::PresentInfoKHR::default()
			.wait_semaphores(&wait)
			.swapchains(&swapchains)
			.image_indices(&indices);
		match unsafe { self.init.swapchain_device.queue_present(self.init.queue, &present_info) } {
			Ok(false) => Ok(PresentOutcome::Presented),
			Ok(true) => Ok(PresentOutcome::Suboptimal),
			Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => Ok(PresentOutcome::OutOfDate),
			Err(e) => Err(e.into()),
		}
	}

	pub fn format(&self) -> vk::Format {
		self.format.format
	}

	pub fn extent(&self) -> vk::Extent2D {
		self.extent
	}

	pub fn image(&self, index: u32) -> vk::Image {
		self.images[index as usize]
	}

	/// Signalled by the frame's submit, waited on by the present of the image.
	pub fn present_semaphore(&self, index: u32) -> vk::Semaphore {
		self.present_semaphores[index as usize]
	}
}

impl Drop for Swapchain {
	fn drop(&mut self) {
		unsafe {
			for &semaphore in &self.present_semaphores {
				self.init.device.destroy_semaphore(semaphore, None);
			}
			self.init.swapchain_device.destroy_swapchain(self.swapchain, None);
		}
	}
}

/// Prefers 8 bit unorm BGRA or RGBA in sRGB color space, else whatever the surface lists first.
pub fn choose_surface_format(formats: &[vk::SurfaceFormatKHR]) -> Option<vk::SurfaceFormatKHR> {
	let srgb: SmallVec<[_; 8]> = formats
		.iter()
		.filter(|f| f.color_space == vk::ColorSpaceKHR::SRGB_NONLINEAR)
		.copied()
		.collect();
	srgb.iter()
		.find(|f| f.format == vk::Format::B8G8R8A8_UNORM)
		.or_else(|| srgb.iter().find(|f| f.format == vk::Format::R8G8B8A8_UNORM))
		.copied()
		.or_else(|| formats.first().copied())
}

pub fn choose_present_mode(modes: &[vk::PresentModeKHR], vsync: bool) -> vk::PresentModeKHR {
	if vsync {
		return vk::PresentModeKHR::FIFO;
	}
	[vk::PresentModeKHR::MAILBOX, vk::PresentModeKHR::IMMEDIATE]
		.into_iter()
		.find(|m| modes.contains(m))
		.unwrap_or(vk::PresentModeKHR::FIFO)
}

pub fn image_count(capabilities: &vk::SurfaceCapabilitiesKHR, present_mode: vk::PresentModeKHR) -> u32 {
	// Mailbox wants 3 images, Fifo 2
	let best = if present_mode == vk::PresentModeKHR::MAILBOX { 3 } else { 2 };
	let max = match capabilities.max_image_count {
		0 => u32::MAX,
		max => max,
	};
	best.min(max).max(capabilities.min_image_count)
}

/// The surface's fixed extent, or the window size clamped to the supported range.
pub fn surface_extent(capabilities: &vk::SurfaceCapabilitiesKHR, window_extent: [u32; 2]) -> vk::Extent2D {
	if capabilities.current_extent.width != u32::MAX {
		return capabilities.current_extent;
	}
	let (min, max) = (capabilities.min_image_extent, capabilities.max_image_extent);
	vk::Extent2D {
		width: window_extent[0].clamp(min.width, max.width),
		height: window_extent[1].clamp(min.height, max.height),
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn surface_format(format: vk::Format, color_space: vk::ColorSpaceKHR) -> vk::SurfaceFormatKHR {
		vk::SurfaceFormatKHR { format, color_space }
	}

	#[test]
	fn prefers_unorm_srgb_formats() {
		let formats = [
			surface_format(vk::Format::A2B10G10R10_UNORM_PACK32, vk::ColorSpaceKHR::SRGB_NONLINEAR),
			surface_format(vk::Format::R8G8B8A8_UNORM, vk::ColorSpaceKHR::SRGB_NONLINEAR),
			surface_format(vk::Format::B8G8R8A8_UNORM, vk::ColorSpaceKHR::EXTENDED_SRGB_LINEAR_EXT),
		];
		assert_eq!(choose_surface_format(&formats).map(|f| f.format), Some(vk::Format::R8G8B8A8_UNORM));
		assert_eq!(
			choose_surface_format(&formats[..1]).map(|f| f.format),
			Some(vk::Format::A2B10G10R10_UNORM_PACK32)
		);
		assert_eq!(choose_surface_format(&[]), None);
	}

	#[test]
	fn present_mode_follows_vsync() {
		let modes = [vk::PresentModeKHR::FIFO, vk::PresentModeKHR::IMMEDIATE];
		assert_eq!(choose_present_mode(&modes, true), vk::PresentModeKHR::FIFO);
		assert_eq!(choose_present_mode(&modes, false), vk::PresentModeKHR::IMMEDIATE);
		assert_eq!(choose_present_mode(&[vk::PresentModeKHR::FIFO], false), vk::PresentModeKHR::FIFO);
	}

	#[test]
	fn extent_and_image_count_respect_limits() {
		let capabilities = vk::SurfaceCapabilitiesKHR {
			min_image_count: 2,
			max_image_count: 0,
			current_extent: vk::Extent2D {
				width: u32::MAX,
				height: u32::MAX,
			},
			min_image_extent: vk::Extent2D { width: 1, height: 1 },
			max_image_extent: vk::Extent2D {
				width: 4096,
				height: 4096,
			},
			..Default::default()
		};
		assert_eq!(surface_extent(&capabilities, [8000, 0]), vk::Extent2D {
			width: 4096,
			height: 1
		});
		assert_eq!(image_count(&capabilities, vk::PresentModeKHR::MAILBOX), 3);
		assert_eq!(image_count(&capabilities, vk::PresentModeKHR::FIFO), 2);

		let fixed = vk::SurfaceCapabilitiesKHR {
			current_extent: vk::Extent2D {
				width: 800,
				height: 600,
			},
			min_image_count: 3,
			max_image_count: 3,
			..capabilities
		};
		assert_eq!(surface_extent(&fixed, [1, 1]).width, 800);
		assert_eq!(image_count(&fixed, vk::PresentModeKHR::FIFO), 3);
	}
}
