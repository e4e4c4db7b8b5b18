use ash::vk;
use smallvec::SmallVec;

/// A pipeline stage together with the accesses it performs.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct Access {
	pub stage: vk::PipelineStageFlags2,
	pub access: vk::AccessFlags2,
}

impl Access {
	pub const fn new(stage: vk::PipelineStageFlags2, access: vk::AccessFlags2) -> Self {
		Self { stage, access }
	}

	pub const NONE: Self = Self::new(vk::PipelineStageFlags2::NONE, vk::AccessFlags2::NONE);
	pub const TRANSFER_READ: Self = Self::new(vk::PipelineStageFlags2::TRANSFER, vk::AccessFlags2::TRANSFER_READ);
	pub const TRANSFER_WRITE: Self = Self::new(vk::PipelineStageFlags2::TRANSFER, vk::AccessFlags2::TRANSFER_WRITE);
	pub const COMPUTE_READ: Self = Self::new(vk::PipelineStageFlags2::COMPUTE_SHADER, vk::AccessFlags2::SHADER_READ);
	pub const COMPUTE_WRITE: Self = Self::new(vk::PipelineStageFlags2::COMPUTE_SHADER, vk::AccessFlags2::SHADER_WRITE);
	pub const HOST_READ: Self = Self::new(vk::PipelineStageFlags2::HOST, vk::AccessFlags2::HOST_READ);
	pub const COMPUTE_READ_WRITE: Self = Self::new(
		vk::PipelineStageFlags2::COMPUTE_SHADER,
		vk::AccessFlags2::from_raw(vk::AccessFlags2::SHADER_READ.as_raw() | vk::AccessFlags2::SHADER_WRITE.as_raw()),
	);
	/// Indirect arguments and the storage reads of the geometry pass. Task shader stages are only valid with mesh
	/// shading enabled on the device.
	pub fn indirect_read(mesh_shading: bool) -> Self {
		let mut stage = vk::PipelineStageFlags2::DRAW_INDIRECT | vk::PipelineStageFlags2::VERTEX_SHADER;
		if mesh_shading {
			stage |= vk::PipelineStageFlags2::TASK_SHADER_EXT | vk::PipelineStageFlags2::MESH_SHADER_EXT;
		}
		Self::new(stage, vk::AccessFlags2::INDIRECT_COMMAND_READ | vk::AccessFlags2::SHADER_READ)
	}

	pub const COLOR_ATTACHMENT_WRITE: Self = Self::new(
		vk::PipelineStageFlags2::COLOR_ATTACHMENT_OUTPUT,
		vk::AccessFlags2::COLOR_ATTACHMENT_WRITE,
	);
	pub const DEPTH_ATTACHMENT: Self = Self::new(
		vk::PipelineStageFlags2::from_raw(
			vk::PipelineStageFlags2::EARLY_FRAGMENT_TESTS.as_raw() | vk::PipelineStageFlags2::LATE_FRAGMENT_TESTS.as_raw(),
		),
		vk::AccessFlags2::from_raw(
			vk::AccessFlags2::DEPTH_STENCIL_ATTACHMENT_READ.as_raw()
				| vk::AccessFlags2::DEPTH_STENCIL_ATTACHMENT_WRITE.as_raw(),
		),
	);
}

#[derive(Copy, Clone, Debug)]
pub struct ImageTransition {
	pub image: vk::Image,
	pub range: vk::ImageSubresourceRange,
	pub old_layout: vk::ImageLayout,
	pub new_layout: vk::ImageLayout,
	pub src: Access,
	pub dst: Access,
}

/// A batch of memory and image barriers recorded with one `vkCmdPipelineBarrier2`.
#[derive(Clone, Debug, Default)]
pub struct Barriers {
	pub memory: SmallVec<[(Access, Access); 2]>,
	pub images: SmallVec<[ImageTransition; 4]>,
}

impl Barriers {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn memory(mut self, src: Access, dst: Access) -> Self {
		self.memory.push((src, dst));
		self
	}

	pub fn image(
		mut self,
		image: vk::Image,
		range: vk::ImageSubresourceRange,
		old_layout: vk::ImageLayout,
		new_layout: vk::ImageLayout,
		src: Access,
		dst: Access,
	) -> Self {
		self.images.push(ImageTransition {
			image,
			range,
			old_layout,
			new_layout,
			src,
			dst,
		});
		self
	}

	pub fn is_empty(&self) -> bool {
		self.memory.is_empty() && self.images.is_empty()
	}

	pub fn record(&self, device: &ash::Device, cmd: vk::CommandBuffer) {
		if self.is_empty() {
			return;
		}
		let memory: SmallVec<[_; 2]> = self
			.memory
			.iter()
			.map(|(src, dst)| {
				vk::MemoryBarrier2::default()
					.src_stage_mask(src.stage)
					.src_access_mask(src.access)
					.dst_stage_mask(dst.stage)
					.dst_access_mask(dst.access)
			})
			.collect();
		let images: SmallVec<[_; 4]> = self
			.images
			.iter()
			.map(|t| {
				vk::ImageMemoryBarrier2::default()
					.src_stage_mask(t.src.stage)
					.src_access_mask(t.src.access)
					.dst_stage_mask(t.dst.stage)
					.dst_access_mask(t.dst.access)
					.old_layout(t.old_layout)
					.new_layout(t.new_layout)
					.src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
					.dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
					.image(t.image)
					.subresource_range(t.range)
			})
			.collect();
		let dependency = vk::DependencyInfo::default()
			.memory_barriers(&memory)
			.image_memory_barriers(&images);
		unsafe { device.cmd_pipeline_barrier2(cmd, &dependency) };
	}
}
