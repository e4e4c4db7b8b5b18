use std::mem::replace;
use std::time::Instant;

/// Wall clock time between two frames.
#[derive(Copy, Clone, Debug)]
pub struct DeltaTimer {
	last: Instant,
}

impl Default for DeltaTimer {
	fn default() -> Self {
		Self::new()
	}
}

impl DeltaTimer {
	pub fn new() -> Self {
		Self { last: Instant::now() }
	}

	/// Seconds since the previous call.
	#[allow(clippy::should_implement_trait)]
	pub fn next(&mut self) -> f32 {
		let now = Instant::now();
		now.duration_since(replace(&mut self.last, now)).as_secs_f32()
	}
}
