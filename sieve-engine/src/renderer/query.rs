use crate::device::error::RenderError;
use crate::device::init::Init;
use ash::vk;
use std::sync::Arc;

/// Timestamp slots written during a frame.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[repr(u32)]
pub enum Timestamp {
	FrameBegin,
	CullBegin,
	CullEnd,
	GeometryBegin,
	GeometryEnd,
	PyramidBegin,
	PyramidEnd,
	FrameEnd,
}

impl Timestamp {
	pub const COUNT: u32 = Timestamp::FrameEnd as u32 + 1;
}

/// 64 bit results without `WAIT`: reads happen once the slot's fence signalled.
pub const READ_FLAGS: vk::QueryResultFlags = vk::QueryResultFlags::TYPE_64;

/// GPU durations of one frame in milliseconds.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct GpuTimings {
	pub frame: f64,
	pub cull: f64,
	pub geometry: f64,
	pub pyramid: f64,
}

impl GpuTimings {
	/// Converts raw ticks indexed by [`Timestamp`] with the device's nanoseconds per tick.
	pub fn from_ticks(ticks: &[u64; Timestamp::COUNT as usize], period_ns: f32) -> Self {
		let span = |begin: Timestamp, end: Timestamp| {
			let delta = ticks[end as usize].wrapping_sub(ticks[begin as usize]);
			delta as f64 * period_ns as f64 * 1e-6
		};
		Self {
			frame: span(Timestamp::FrameBegin, Timestamp::FrameEnd),
			cull: span(Timestamp::CullBegin, Timestamp::CullEnd),
			geometry: span(Timestamp::GeometryBegin, Timestamp::GeometryEnd),
			pyramid: span(Timestamp::PyramidBegin, Timestamp::PyramidEnd),
		}
	}
}

#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct QueryResults {
	pub timings: Option<GpuTimings>,
	/// clipping invocations, one per triangle reaching the clipper
	pub triangles: Option<u64>,
}

/// Per frame slot query pools. Either pool is absent when the device lacks support.
pub struct FrameQueries {
	init: Arc<Init>,
	timestamps: Option<vk::QueryPool>,
	statistics: Option<vk::QueryPool>,
	/// queries were recorded by the last submission of this slot
	written: bool,
}

impl FrameQueries {
	pub fn new(init: &Arc<Init>) -> Result<Self, RenderError> {
		let device = &init.device;
		let timestamps = init
			.capabilities
			.timestamps
			.then(|| unsafe {
				device.create_query_pool(
					&vk::QueryPoolCreateInfo::default()
						.query_type(vk::QueryType::TIMESTAMP)
						.query_count(Timestamp::COUNT),
					None,
				)
			})
			.transpose()?;
		let statistics = init
			.capabilities
			.pipeline_statistics
			.then(|| unsafe {
				device.create_query_pool(
					&vk::QueryPoolCreateInfo::default()
						.query_type(vk::QueryType::PIPELINE_STATISTICS)
						.query_count(1)
						.pipeline_statistics(vk::QueryPipelineStatisticFlags::CLIPPING_INVOCATIONS),
					None,
				)
			})
			.transpose()?;
		Ok(Self {
			init: init.clone(),
			timestamps,
			statistics,
			written: false,
		})
	}

	/// Resets all pools, must be recorded outside of rendering.
	pub fn reset(&mut self, cmd: vk::CommandBuffer, enabled: bool) {
		let device = &self.init.device;
		unsafe {
			if let Some(pool) = self.timestamps {
				device.cmd_reset_query_pool(cmd, pool, 0, Timestamp::COUNT);
			}
			if let Some(pool) = self.statistics {
				device.cmd_reset_query_pool(cmd, pool, 0, 1);
			}
		}
		self.written = enabled;
	}

	pub fn timestamp(&self, cmd: vk::CommandBuffer, stage: vk::PipelineStageFlags2, timestamp: Timestamp) {
		if let (true, Some(pool)) = (self.written, self.timestamps) {
			unsafe { self.init.device.cmd_write_timestamp2(cmd, stage, pool, timestamp as u32) };
		}
	}

	pub fn begin_statistics(&self, cmd: vk::CommandBuffer) {
		if let (true, Some(pool)) = (self.written, self.statistics) {
			unsafe { self.init.device.cmd_begin_query(cmd, pool, 0, vk::QueryControlFlags::empty()) };
		}
	}

	pub fn end_statistics(&self, cmd: vk::CommandBuffer) {
		if let (true, Some(pool)) = (self.written, self.statistics) {
			unsafe { self.init.device.cmd_end_query(cmd, pool, 0) };
		}
	}

	/// Results of the slot's last submission, `None` if it recorded none. Called after the slot's fence wait, so it
	/// never blocks.
	#[profiling::function]
	pub fn read(&self) -> Result<Option<QueryResults>, RenderError> {
		if !self.written {
			return Ok(None);
		}
		let timings = match self.timestamps {
			Some(pool) => {
				let mut ticks = [0u64; Timestamp::COUNT as usize];
				if !self.fetch(pool, &mut ticks)? {
					return Ok(None);
				}
				Some(GpuTimings::from_ticks(&ticks, self.init.timestamp_period()))
			}
			None => None,
		};
		let triangles = match self.statistics {
			Some(pool) => {
				let mut clipping = [0u64; 1];
				if !self.fetch(pool, &mut clipping)? {
					return Ok(None);
				}
				Some(clipping[0])
			}
			None => None,
		};
		Ok(Some(QueryResults { timings, triangles }))
	}

	/// `false` if the results are not available yet.
	fn fetch(&self, pool: vk::QueryPool, out: &mut [u64]) -> Result<bool, RenderError> {
		match unsafe { self.init.device.get_query_pool_results(pool, 0, out, READ_FLAGS) } {
			Ok(()) => Ok(true),
			Err(vk::Result::NOT_READY) => Ok(false),
			Err(e) => Err(e.into()),
		}
	}
}

impl Drop for FrameQueries {
	fn drop(&mut self) {
		unsafe {
			for pool in [self.timestamps, self.statistics].into_iter().flatten() {
				self.init.device.destroy_query_pool(pool, None);
			}
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use approx::assert_relative_eq;

	#[test]
	fn ticks_to_milliseconds() {
		let mut ticks = [0u64; Timestamp::COUNT as usize];
		ticks[Timestamp::FrameBegin as usize] = 1_000;
		ticks[Timestamp::CullBegin as usize] = 2_000;
		ticks[Timestamp::CullEnd as usize] = 52_000;
		ticks[Timestamp::GeometryBegin as usize] = 60_000;
		ticks[Timestamp::GeometryEnd as usize] = 1_060_000;
		ticks[Timestamp::PyramidBegin as usize] = 1_060_000;
		ticks[Timestamp::PyramidEnd as usize] = 1_160_000;
		ticks[Timestamp::FrameEnd as usize] = 1_201_000;
		let timings = GpuTimings::from_ticks(&ticks, 2.);
		assert_relative_eq!(timings.frame, 2.4, epsilon = 1e-9);
		assert_relative_eq!(timings.cull, 0.1, epsilon = 1e-9);
		assert_relative_eq!(timings.geometry, 2., epsilon = 1e-9);
		assert_relative_eq!(timings.pyramid, 0.2, epsilon = 1e-9);
		assert_eq!(Timestamp::COUNT, 8);
	}

	#[test]
	fn reads_never_wait_on_the_gpu() {
		assert!(READ_FLAGS.contains(vk::QueryResultFlags::TYPE_64));
		assert!(!READ_FLAGS.contains(vk::QueryResultFlags::WAIT));
	}
}
