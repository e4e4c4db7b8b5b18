use crate::renderer::query::{GpuTimings, QueryResults};
use std::fmt::{Display, Formatter};

const SMOOTHING: f64 = 0.95;

fn smooth(average: Option<f64>, sample: f64) -> f64 {
	match average {
		Some(average) => average * SMOOTHING + sample * (1. - SMOOTHING),
		None => sample,
	}
}

/// Exponentially smoothed frame statistics shown in the window title.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct FrameStats {
	pub cpu_ms: Option<f64>,
	pub gpu: Option<GpuTimings>,
	pub triangles: Option<u64>,
	pub visible_draws: Option<u32>,
	pub draw_count: u32,
	pub mesh_shading: bool,
	pub culling: bool,
	pub lod: bool,
}

impl FrameStats {
	pub fn new(draw_count: u32) -> Self {
		Self {
			draw_count,
			..Self::default()
		}
	}

	pub fn cpu_frame(&mut self, delta_seconds: f64) {
		self.cpu_ms = Some(smooth(self.cpu_ms, delta_seconds * 1000.));
	}

	pub fn queries(&mut self, results: QueryResults) {
		if let Some(t) = results.timings {
			let prev = self.gpu;
			let field = |f: fn(&GpuTimings) -> f64| smooth(prev.as_ref().map(f), f(&t));
			self.gpu = Some(GpuTimings {
				frame: field(|t| t.frame),
				cull: field(|t| t.cull),
				geometry: field(|t| t.geometry),
				pyramid: field(|t| t.pyramid),
			});
		}
		if results.triangles.is_some() {
			self.triangles = results.triangles;
		}
	}

	/// Drops GPU results, so disabled queries don't leave stale numbers on screen.
	pub fn clear_queries(&mut self) {
		self.gpu = None;
		self.triangles = None;
	}
}

impl Display for FrameStats {
	fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
		if let Some(cpu) = self.cpu_ms {
			write!(f, "cpu {cpu:.2} ms")?;
		}
		if let Some(gpu) = &self.gpu {
			write!(
				f,
				"; gpu {:.2} ms (cull {:.2}, geometry {:.2}, pyramid {:.2})",
				gpu.frame, gpu.cull, gpu.geometry, gpu.pyramid
			)?;
		}
		if let Some(triangles) = self.triangles {
			write!(f, "; {:.2}M tris", triangles as f64 * 1e-6)?;
		}
		match self.visible_draws {
			Some(visible) => write!(f, "; {visible}/{} draws", self.draw_count)?,
			None => write!(f, "; {} draws", self.draw_count)?,
		}
		let on_off = |b: bool| if b { "on" } else { "off" };
		write!(
			f,
			"; {} culling {} lod {}",
			if self.mesh_shading { "mesh" } else { "indexed" },
			on_off(self.culling),
			on_off(self.lod)
		)
	}
}
