use crate::device::error::RenderError;
use crate::device::init::Init;
use ash::vk;
use gpu_allocator::MemoryLocation;
use gpu_allocator::vulkan::{Allocation, AllocationCreateDesc, AllocationScheme};
use smallvec::SmallVec;
use std::mem::ManuallyDrop;
use std::sync::Arc;

/// A 2D device local image with a view over all mips and one view per mip.
pub struct Image {
	init: Arc<Init>,
	image: vk::Image,
	allocation: ManuallyDrop<Allocation>,
	view: vk::ImageView,
	mip_views: SmallVec<[vk::ImageView; 16]>,
	format: vk::Format,
	extent: vk::Extent2D,
	mip_levels: u32,
	aspect: vk::ImageAspectFlags,
}

impl Image {
	pub fn new(
		init: &Arc<Init>,
		name: &str,
		format: vk::Format,
		extent: vk::Extent2D,
		mip_levels: u32,
		usage: vk::ImageUsageFlags,
	) -> Result<Self, RenderError> {
		let device = &init.device;
		let aspect = aspect_of(format);
		let image = unsafe {
			device.create_image(
				&vk::ImageCreateInfo::default()
					.image_type(vk::ImageType::TYPE_2D)
					.format(format)
					.extent(vk::Extent3D {
						width: extent.width,
						height: extent.height,
						depth: 1,
					})
					.mip_levels(mip_levels)
					.array_layers(1)
					.samples(vk::SampleCountFlags::TYPE_1)
					.tiling(vk::ImageTiling::OPTIMAL)
					.usage(usage)
					.sharing_mode(vk::SharingMode::EXCLUSIVE)
					.initial_layout(vk::ImageLayout::UNDEFINED),
				None,
			)?
		};
		let requirements = unsafe { device.get_image_memory_requirements(image) };
		let allocation = match init.allocator.lock().allocate(&AllocationCreateDesc {
			name,
			requirements,
			location: MemoryLocation::GpuOnly,
			linear: false,
			allocation_scheme: AllocationScheme::GpuAllocatorManaged,
		}) {
			Ok(a) => a,
			Err(e) => {
				unsafe { device.destroy_image(image, None) };
				return Err(e.into());
			}
		};

		// views are created after construction so a failure still releases everything through Drop
		let mut this = Self {
			init: init.clone(),
			image,
			allocation: ManuallyDrop::new(allocation),
			view: vk::ImageView::null(),
			mip_views: SmallVec::new(),
			format,
			extent,
			mip_levels,
			aspect,
		};
		unsafe { device.bind_image_memory(image, this.allocation.memory(), this.allocation.offset())? };
		this.view = this.create_view(0, mip_levels)?;
		if mip_levels > 1 {
			for level in 0..mip_levels {
				let view = this.create_view(level, 1)?;
				this.mip_views.push(view);
			}
		}
		Ok(this)
	}

	fn create_view(&self, base_mip_level: u32, level_count: u32) -> Result<vk::ImageView, RenderError> {
		let view = unsafe {
			self.init.device.create_image_view(
				&vk::ImageViewCreateInfo::default()
					.image(self.image)
					.view_type(vk::ImageViewType::TYPE_2D)
					.format(self.format)
					.subresource_range(subresource_range(self.aspect, base_mip_level, level_count)),
				None,
			)?
		};
		Ok(view)
	}

	pub fn handle(&self) -> vk::Image {
		self.image
	}

	pub fn view(&self) -> vk::ImageView {
		self.view
	}

	/// View of a single mip level.
	pub fn mip_view(&self, level: u32) -> vk::ImageView {
		if self.mip_levels == 1 {
			self.view
		} else {
			self.mip_views[level as usize]
		}
	}

	pub fn format(&self) -> vk::Format {
		self.format
	}

	pub fn extent(&self) -> vk::Extent2D {
		self.extent
	}

	pub fn mip_levels(&self) -> u32 {
		self.mip_levels
	}

	pub fn aspect(&self) -> vk::ImageAspectFlags {
		self.aspect
	}

	/// All mips of the image.
	pub fn full_range(&self) -> vk::ImageSubresourceRange {
		subresource_range(self.aspect, 0, self.mip_levels)
	}
}

impl Drop for Image {
	fn drop(&mut self) {
		unsafe {
			let device = &self.init.device;
			for &view in self.mip_views.iter().chain([&self.view]) {
				device.destroy_image_view(view, None);
			}
			let allocation = ManuallyDrop::take(&mut self.allocation);
			if let Err(e) = self.init.allocator.lock().free(allocation) {
				log::error!("failed to free image memory: {e}");
			}
			device.destroy_image(self.image, None);
		}
	}
}

pub fn aspect_of(format: vk::Format) -> vk::ImageAspectFlags {
	match format {
		vk::Format::D16_UNORM | vk::Format::D32_SFLOAT | vk::Format::X8_D24_UNORM_PACK32 => vk::ImageAspectFlags::DEPTH,
		vk::Format::D16_UNORM_S8_UINT | vk::Format::D24_UNORM_S8_UINT | vk::Format::D32_SFLOAT_S8_UINT => {
			vk::ImageAspectFlags::DEPTH | vk::ImageAspectFlags::STENCIL
		}
		_ => vk::ImageAspectFlags::COLOR,
	}
}

pub fn subresource_range(aspect: vk::ImageAspectFlags, base_mip_level: u32, level_count: u32) -> vk::ImageSubresourceRange {
	vk::ImageSubresourceRange {
		aspect_mask: aspect,
		base_mip_level,
		level_count,
		base_array_layer: 0,
		layer_count: 1,
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn depth_formats_use_depth_aspect() {
		assert_eq!(aspect_of(vk::Format::D32_SFLOAT), vk::ImageAspectFlags::DEPTH);
		assert_eq!(aspect_of(vk::Format::R32_SFLOAT), vk::ImageAspectFlags::COLOR);
		assert!(aspect_of(vk::Format::D24_UNORM_S8_UINT).contains(vk::ImageAspectFlags::STENCIL));
	}
}
