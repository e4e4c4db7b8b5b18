use crate::renderer::depth_reduce::reduce_texel;
use glam::{UVec2, Vec4};
use spirv_std::image::Image2d;
use spirv_std::image::sample_with::lod;

/// Size of pyramid level 0 for a render target of size `render`.
pub fn pyramid_extent(render: UVec2) -> UVec2 {
	UVec2::max(render / 2, UVec2::ONE)
}

/// Number of levels of a full mip chain down to 1x1, starting at [`pyramid_extent`].
pub fn pyramid_levels(render: UVec2) -> u32 {
	let extent = pyramid_extent(render);
	u32::BITS - u32::max(extent.x, extent.y).leading_zeros()
}

pub fn mip_extent(base: UVec2, level: u32) -> UVec2 {
	UVec2::max(base >> level, UVec2::ONE)
}

/// Read access to an occlusion pyramid holding reversed-Z depth.
pub trait DepthPyramid {
	fn levels(&self) -> u32;

	fn level_extent(&self, level: u32) -> UVec2;

	fn load(&self, level: u32, texel: UVec2) -> f32;
}

/// The pyramid image bound to the culling stage, all levels in one view.
pub struct DepthPyramidGpu<'a> {
	pub image: &'a Image2d,
	pub extent: UVec2,
	pub levels: u32,
}

impl DepthPyramid for DepthPyramidGpu<'_> {
	fn levels(&self) -> u32 {
		self.levels
	}

	fn level_extent(&self, level: u32) -> UVec2 {
		mip_extent(self.extent, level)
	}

	fn load(&self, level: u32, texel: UVec2) -> f32 {
		let sample: Vec4 = self.image.fetch_with(texel, lod(level));
		sample.x
	}
}

/// Host copy of a depth pyramid, used as the reference for the GPU reduction.
#[cfg(not(target_arch = "spirv"))]
#[derive(Clone, Debug)]
pub struct DepthPyramidCpu {
	levels: Vec<(UVec2, Vec<f32>)>,
}

#[cfg(not(target_arch = "spirv"))]
impl DepthPyramidCpu {
	/// Reduces a depth buffer of `render` size, stored row major.
	pub fn build(depth: &[f32], render: UVec2) -> Self {
		assert_eq!(depth.len(), (render.x * render.y) as usize);
		let base = pyramid_extent(render);
		let mut levels: Vec<(UVec2, Vec<f32>)> = Vec::new();
		for level in 0..pyramid_levels(render) {
			let extent = mip_extent(base, level);
			let (src_extent, src) = match levels.last() {
				Some((extent, data)) => (*extent, data.as_slice()),
				None => (render, depth),
			};
			let data = (0..extent.y)
				.flat_map(|y| (0..extent.x).map(move |x| UVec2::new(x, y)))
				.map(|texel| reduce_texel(texel, src_extent, |p| src[(p.y * src_extent.x + p.x) as usize]))
				.collect();
			levels.push((extent, data));
		}
		Self { levels }
	}

	/// A pyramid of the given render size holding only the far plane.
	pub fn cleared(render: UVec2) -> Self {
		let base = pyramid_extent(render);
		Self {
			levels: (0..pyramid_levels(render))
				.map(|level| {
					let extent = mip_extent(base, level);
					(extent, vec![0.; (extent.x * extent.y) as usize])
				})
				.collect(),
		}
	}

	pub fn level(&self, level: u32) -> &[f32] {
		&self.levels[level as usize].1
	}
}

#[cfg(not(target_arch = "spirv"))]
impl DepthPyramid for DepthPyramidCpu {
	fn levels(&self) -> u32 {
		self.levels.len() as u32
	}

	fn level_extent(&self, level: u32) -> UVec2 {
		self.levels[level as usize].0
	}

	fn load(&self, level: u32, texel: UVec2) -> f32 {
		let (extent, data) = &self.levels[level as usize];
		data[(texel.y * extent.x + texel.x) as usize]
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use rand::rngs::StdRng;
	use rand::{Rng, SeedableRng};

	#[test]
	fn extent_after_resize() {
		for (w, h) in [(1, 1), (2, 2), (3, 7), (1920, 1080), (1280, 720), (1000, 1), (4096, 4096)] {
			let render = UVec2::new(w, h);
			let extent = pyramid_extent(render);
			assert_eq!(extent, UVec2::new(u32::max(1, w / 2), u32::max(1, h / 2)));
			let levels = pyramid_levels(render);
			assert_eq!(mip_extent(extent, levels - 1), UVec2::ONE);
			assert!(levels == 1 || mip_extent(extent, levels - 2) != UVec2::ONE);
		}
	}

	#[test]
	fn levels_match_log2_for_powers_of_two() {
		for shift in 1..13 {
			let size = 1u32 << shift;
			let expected = (f32::log2(size as f32 / 2.)).ceil() as u32 + 1;
			assert_eq!(pyramid_levels(UVec2::new(size, size / 2)), expected);
		}
	}

	#[test]
	fn each_level_reduces_its_footprint() {
		let render = UVec2::new(67, 45);
		let mut rng = StdRng::seed_from_u64(3);
		let depth: Vec<f32> = (0..render.x * render.y).map(|_| rng.gen_range(0.0..1.0)).collect();
		let pyramid = DepthPyramidCpu::build(&depth, render);
		assert_eq!(pyramid.level_extent(0), UVec2::new(33, 22));

		for level in 1..pyramid.levels() {
			let src = pyramid.level_extent(level - 1);
			let extent = pyramid.level_extent(level);
			for y in 0..extent.y {
				for x in 0..extent.x {
					let mut farthest = f32::INFINITY;
					for (dx, dy) in [(0, 0), (1, 0), (0, 1), (1, 1)] {
						let p = UVec2::new(u32::min(2 * x + dx, src.x - 1), u32::min(2 * y + dy, src.y - 1));
						farthest = farthest.min(pyramid.load(level - 1, p));
					}
					assert_eq!(pyramid.load(level, UVec2::new(x, y)), farthest);
				}
			}
		}
	}
}
