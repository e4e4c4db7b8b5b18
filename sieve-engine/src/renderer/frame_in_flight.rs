use crate::device::error::RenderError;
use crate::device::init::Init;
use crate::renderer::buffer::Buffer;
use crate::renderer::query::FrameQueries;
use ash::vk;
use gpu_allocator::MemoryLocation;
use sieve_shader::renderer::draw::MeshDrawCommand;
use sieve_shader::renderer::frame_data::FrameData;
use std::sync::Arc;

pub const FRAMES_IN_FLIGHT: usize = 2;

/// An arena of per frame resources, indexed by frame parity.
pub struct FramesInFlight<T> {
	slots: [T; FRAMES_IN_FLIGHT],
	frame: u64,
}

impl<T> FramesInFlight<T> {
	pub fn new<E>(mut f: impl FnMut(usize) -> Result<T, E>) -> Result<Self, E> {
		let first = f(0)?;
		let second = f(1)?;
		Ok(Self {
			slots: [first, second],
			frame: 0,
		})
	}

	fn slot_index(&self) -> usize {
		(self.frame % FRAMES_IN_FLIGHT as u64) as usize
	}

	pub fn current_mut(&mut self) -> &mut T {
		let index = self.slot_index();
		&mut self.slots[index]
	}

	pub fn advance(&mut self) {
		self.frame += 1;
	}
}

/// Everything one frame writes while the other slot may still execute on the GPU.
pub struct FrameSlot {
	init: Arc<Init>,
	pool: vk::CommandPool,
	pub cmd: vk::CommandBuffer,
	/// signalled when the slot's last submission completed
	pub fence: vk::Fence,
	pub acquired: vk::Semaphore,
	pub frame_data: Buffer,
	pub commands: Buffer,
	pub draw_count: Buffer,
	/// host copy of `draw_count` from the slot's last submission
	pub draw_count_readback: Buffer,
	pub queries: FrameQueries,
	/// the slot has been submitted at least once, so its readbacks hold results
	pub submitted: bool,
}

impl FrameSlot {
	pub fn new(init: &Arc<Init>, index: usize, draw_capacity: u32) -> Result<Self, RenderError> {
		let frame_data = Buffer::new(
			init,
			&format!("frame data {index}"),
			size_of::<FrameData>() as u64,
			vk::BufferUsageFlags::STORAGE_BUFFER,
			MemoryLocation::CpuToGpu,
		)?;
		let commands = Buffer::new(
			init,
			&format!("draw commands {index}"),
			draw_capacity as u64 * size_of::<MeshDrawCommand>() as u64,
			vk::BufferUsageFlags::STORAGE_BUFFER | vk::BufferUsageFlags::INDIRECT_BUFFER | vk::BufferUsageFlags::TRANSFER_DST,
			MemoryLocation::GpuOnly,
		)?;
		let draw_count = Buffer::new(
			init,
			&format!("draw count {index}"),
			4,
			vk::BufferUsageFlags::STORAGE_BUFFER
				| vk::BufferUsageFlags::INDIRECT_BUFFER
				| vk::BufferUsageFlags::TRANSFER_DST
				| vk::BufferUsageFlags::TRANSFER_SRC,
			MemoryLocation::GpuOnly,
		)?;
		let draw_count_readback = Buffer::new(
			init,
			&format!("draw count readback {index}"),
			4,
			vk::BufferUsageFlags::TRANSFER_DST,
			MemoryLocation::GpuToCpu,
		)?;
		let queries = FrameQueries::new(init)?;

		let device = &init.device;
		let pool = unsafe {
			device.create_command_pool(
				&vk::CommandPoolCreateInfo::default()
					.queue_family_index(init.queue_family)
					.flags(vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER),
				None,
			)?
		};
		// Drop releases null handles as well
		let mut slot = Self {
			init: init.clone(),
			pool,
			cmd: vk::CommandBuffer::null(),
			fence: vk::Fence::null(),
			acquired: vk::Semaphore::null(),
			frame_data,
			commands,
			draw_count,
			draw_count_readback,
			queries,
			submitted: false,
		};
		unsafe {
			slot.cmd = device.allocate_command_buffers(
				&vk::CommandBufferAllocateInfo::default()
					.command_pool(pool)
					.level(vk::CommandBufferLevel::PRIMARY)
					.command_buffer_count(1),
			)?[0];
			slot.fence = device.create_fence(&vk::FenceCreateInfo::default().flags(vk::FenceCreateFlags::SIGNALED), None)?;
			slot.acquired = device.create_semaphore(&vk::SemaphoreCreateInfo::default(), None)?;
		}
		Ok(slot)
	}

	/// Blocks until the slot's previous submission finished.
	#[profiling::function]
	pub fn wait(&self) -> Result<(), RenderError> {
		unsafe { self.init.device.wait_for_fences(&[self.fence], true, u64::MAX)? };
		Ok(())
	}

	/// Visible draws of the slot's last submission, valid after [`Self::wait`].
	pub fn visible_draws(&self) -> Option<u32> {
		self.submitted.then(|| self.draw_count_readback.read::<u32>(0))
	}
}

impl Drop for FrameSlot {
	fn drop(&mut self) {
		unsafe {
			let device = &self.init.device;
			device.destroy_semaphore(self.acquired, None);
			device.destroy_fence(self.fence, None);
			device.destroy_command_pool(self.pool, None);
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn slots_alternate_by_parity() -> anyhow::Result<()> {
		let mut frames = FramesInFlight::new(|i| Ok::<_, anyhow::Error>(i * 10))?;
		assert_eq!((frames.slot_index(), *frames.current_mut()), (0, 0));
		frames.advance();
		assert_eq!((frames.slot_index(), *frames.current_mut()), (1, 10));
		frames.advance();
		assert_eq!(frames.slot_index(), 0);
		*frames.current_mut() += 1;
		assert_eq!(*frames.current_mut(), 1);
		Ok(())
	}

	#[test]
	fn construction_stops_at_first_error() {
		let mut calls = 0;
		let frames = FramesInFlight::new(|i| {
			calls += 1;
			if i == 0 { Err("out of memory") } else { Ok(i) }
		});
		assert!(frames.is_err());
		assert_eq!(calls, 1);
	}
}
