use crate::device::error::RenderError;
use crate::device::init::Init;
use ash::vk;
use bytemuck::Pod;
use gpu_allocator::MemoryLocation;
use gpu_allocator::vulkan::{Allocation, AllocationCreateDesc, AllocationScheme};
use std::mem::ManuallyDrop;
use std::sync::Arc;

/// A buffer and its memory, released on drop.
pub struct Buffer {
	init: Arc<Init>,
	buffer: vk::Buffer,
	allocation: ManuallyDrop<Allocation>,
	size: vk::DeviceSize,
}

impl Buffer {
	pub fn new(
		init: &Arc<Init>,
		name: &str,
		size: vk::DeviceSize,
		usage: vk::BufferUsageFlags,
		location: MemoryLocation,
	) -> Result<Self, RenderError> {
		// zero sized buffers are invalid, empty tables still need something to bind
		let size = size.max(4);
		let device = &init.device;
		let buffer = unsafe {
			device.create_buffer(
				&vk::BufferCreateInfo::default()
					.size(size)
					.usage(usage)
					.sharing_mode(vk::SharingMode::EXCLUSIVE),
				None,
			)?
		};
		let requirements = unsafe { device.get_buffer_memory_requirements(buffer) };
		let allocation = init.allocator.lock().allocate(&AllocationCreateDesc {
			name,
			requirements,
			location,
			linear: true,
			allocation_scheme: AllocationScheme::GpuAllocatorManaged,
		});
		let allocation = match allocation {
			Ok(a) => a,
			Err(e) => {
				unsafe { device.destroy_buffer(buffer, None) };
				return Err(e.into());
			}
		};
		unsafe { device.bind_buffer_memory(buffer, allocation.memory(), allocation.offset())? };
		Ok(Self {
			init: init.clone(),
			buffer,
			allocation: ManuallyDrop::new(allocation),
			size,
		})
	}

	/// A device local buffer filled with `data` through a staging buffer, blocks until the copy completes.
	#[profiling::function]
	pub fn upload<T: Pod>(
		init: &Arc<Init>,
		commands: &OneShotCommands,
		name: &str,
		data: &[T],
		usage: vk::BufferUsageFlags,
	) -> Result<Self, RenderError> {
		let bytes: &[u8] = bytemuck::cast_slice(data);
		let size = bytes.len() as vk::DeviceSize;
		let buffer = Self::new(
			init,
			name,
			size,
			usage | vk::BufferUsageFlags::TRANSFER_DST,
			MemoryLocation::GpuOnly,
		)?;
		if bytes.is_empty() {
			return Ok(buffer);
		}

		let mut staging = Self::new(
			init,
			&format!("{name} staging"),
			size,
			vk::BufferUsageFlags::TRANSFER_SRC,
			MemoryLocation::CpuToGpu,
		)?;
		staging.write(0, data);
		commands.submit(|cmd| unsafe {
			init.device.cmd_copy_buffer(
				cmd,
				staging.handle(),
				buffer.handle(),
				&[vk::BufferCopy::default().size(size)],
			);
		})?;
		Ok(buffer)
	}

	pub fn handle(&self) -> vk::Buffer {
		self.buffer
	}

	pub fn size(&self) -> vk::DeviceSize {
		self.size
	}

	/// Writes `data` at byte `offset` into a host visible buffer.
	pub fn write<T: Pod>(&mut self, offset: usize, data: &[T]) {
		let bytes: &[u8] = bytemuck::cast_slice(data);
		let mapped = self
			.allocation
			.mapped_slice_mut()
			.expect("buffer is not host visible");
		mapped[offset..offset + bytes.len()].copy_from_slice(bytes);
	}

	/// Reads a `T` at byte `offset` from a host visible buffer.
	pub fn read<T: Pod>(&self, offset: usize) -> T {
		let mapped = self.allocation.mapped_slice().expect("buffer is not host visible");
		bytemuck::pod_read_unaligned(&mapped[offset..offset + size_of::<T>()])
	}
}

impl Drop for Buffer {
	fn drop(&mut self) {
		unsafe {
			let allocation = ManuallyDrop::take(&mut self.allocation);
			if let Err(e) = self.init.allocator.lock().free(allocation) {
				log::error!("failed to free buffer memory: {e}");
			}
			self.init.device.destroy_buffer(self.buffer, None);
		}
	}
}

/// Command pool for blocking setup work: uploads and initial layout transitions.
pub struct OneShotCommands {
	init: Arc<Init>,
	pool: vk::CommandPool,
}

impl OneShotCommands {
	pub fn new(init: &Arc<Init>) -> Result<Self, RenderError> {
		let pool = unsafe {
			init.device.create_command_pool(
				&vk::CommandPoolCreateInfo::default()
					.queue_family_index(init.queue_family)
					.flags(vk::CommandPoolCreateFlags::TRANSIENT),
				None,
			)?
		};
		Ok(Self {
			init: init.clone(),
			pool,
		})
	}

	/// Records with `f`, submits and waits for the queue to finish.
	pub fn submit(&self, f: impl FnOnce(vk::CommandBuffer)) -> Result<(), RenderError> {
		let device = &self.init.device;
		unsafe {
			let cmd = device.allocate_command_buffers(
				&vk::CommandBufferAllocateInfo::default()
					.command_pool(self.pool)
					.level(vk::CommandBufferLevel::PRIMARY)
					.command_buffer_count(1),
			)?[0];
			device.begin_command_buffer(
				cmd,
				&vk::CommandBufferBeginInfo::default().flags(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT),
			)?;
			f(cmd);
			device.end_command_buffer(cmd)?;

			let fence = device.create_fence(&vk::FenceCreateInfo::default(), None)?;
			let command_buffers = [cmd];
			let result = device
				.queue_submit(
					self.init.queue,
					&[vk::SubmitInfo::default().command_buffers(&command_buffers)],
					fence,
				)
				.and_then(|_| device.wait_for_fences(&[fence], true, u64::MAX));
			device.destroy_fence(fence, None);
			device.free_command_buffers(self.pool, &command_buffers);
			result?;
		}
		Ok(())
	}
}

impl Drop for OneShotCommands {
	fn drop(&mut self) {
		unsafe { self.init.device.destroy_command_pool(self.pool, None) };
	}
}
