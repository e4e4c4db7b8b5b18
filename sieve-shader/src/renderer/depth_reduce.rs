use crate::renderer::bindings::depth_reduce as bindings;
use bytemuck_derive::{Pod, Zeroable};
use glam::{UVec2, UVec3, Vec3Swizzles, Vec4};
use spirv_std::image::sample_with::lod;
use spirv_std::image::Image2d;
use spirv_std::Image;
use spirv_std::spirv;
use static_assertions::const_assert_eq;

pub const DEPTH_REDUCE_WG_SIZE: u32 = 16;

#[derive(Copy, Clone, Pod, Zeroable)]
#[cfg_attr(not(target_arch = "spirv"), derive(Debug))]
#[repr(C)]
pub struct DepthReduceParams {
	pub src_extent: [u32; 2],
	pub dst_extent: [u32; 2],
}

/// Reduces the 2x2 footprint of `dst` in the source level, keeping the farthest depth.
///
/// Under reversed-Z the farthest depth is the smallest value, so a coarse texel never reports an occluder nearer
/// than any of the texels it covers. Footprint coordinates are clamped for 1 texel wide sources.
pub fn reduce_texel(dst: UVec2, src_extent: UVec2, load: impl Fn(UVec2) -> f32) -> f32 {
	let max = src_extent - UVec2::ONE;
	let p0 = UVec2::min(dst * 2, max);
	let p1 = UVec2::min(dst * 2 + UVec2::ONE, max);
	let a = load(p0);
	let b = load(UVec2::new(p1.x, p0.y));
	let c = load(UVec2::new(p0.x, p1.y));
	let d = load(p1);
	f32::min(f32::min(a, b), f32::min(c, d))
}

pub fn dispatch_groups(dst_extent: UVec2) -> UVec2 {
	(dst_extent + UVec2::splat(DEPTH_REDUCE_WG_SIZE - 1)) / DEPTH_REDUCE_WG_SIZE
}

const_assert_eq!(bindings::SRC, 0);
const_assert_eq!(bindings::DST, 1);
const_assert_eq!(DEPTH_REDUCE_WG_SIZE, 16);
#[spirv(compute(threads(16, 16)))]
pub fn depth_reduce_cs(
	#[spirv(global_invocation_id)] gid: UVec3,
	#[spirv(push_constant)] params: &DepthReduceParams,
	#[spirv(descriptor_set = 0, binding = 0)] src: &Image2d,
	#[spirv(descriptor_set = 0, binding = 1)] dst: &Image!(2D, format = r32f, sampled = false),
) {
	let texel = gid.xy();
	let dst_extent = UVec2::from(params.dst_extent);
	if texel.x >= dst_extent.x || texel.y >= dst_extent.y {
		return;
	}

	let depth = reduce_texel(texel, UVec2::from(params.src_extent), |p| {
		let sample: Vec4 = src.fetch_with(p, lod(0));
		sample.x
	});
	unsafe {
		dst.write(texel, Vec4::new(depth, 0., 0., 0.));
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn keeps_farthest_depth() {
		let src = [0.5, 0.2, 0.9, 0.7];
		let depth = reduce_texel(UVec2::ZERO, UVec2::new(2, 2), |p| src[(p.y * 2 + p.x) as usize]);
		assert_eq!(depth, 0.2);
	}

	#[test]
	fn clamps_single_texel_sources() {
		let src = [0.25, 0.75];
		let depth = reduce_texel(UVec2::ZERO, UVec2::new(1, 2), |p| src[p.y as usize]);
		assert_eq!(depth, 0.25);
		let depth = reduce_texel(UVec2::new(0, 0), UVec2::new(1, 1), |_| 0.5);
		assert_eq!(depth, 0.5);
	}

	#[test]
	fn dispatch_covers_level() {
		assert_eq!(dispatch_groups(UVec2::new(960, 540)), UVec2::new(60, 34));
		assert_eq!(dispatch_groups(UVec2::ONE), UVec2::ONE);
	}
}
