use crate::renderer::camera::Camera;
use crate::renderer::depth_pyramid::{pyramid_extent, pyramid_levels};
use crate::renderer::frustum::Frustum;
use crate::renderer::lod_selection::lod_target;
use bitflags::bitflags;
use bytemuck_derive::{Pod, Zeroable};
use core::mem;
use glam::{UVec2, Vec4};
use static_assertions::const_assert_eq;

bitflags! {
	#[derive(Copy, Clone, Debug, Eq, PartialEq)]
	pub struct CullFlags: u32 {
		/// occlusion culling against the previous frame's depth pyramid
		const CULLING = 1 << 0;
		const LOD = 1 << 1;
		/// the depth pyramid holds the previous frame, cleared on the first frame and after a resize
		const PYRAMID_VALID = 1 << 2;
		/// meshlet frustum and cone culling in the task shader
		const MESHLET_CULLING = 1 << 3;
	}
}

/// Per frame constants shared by the culling stage and both geometry paths.
#[derive(Copy, Clone, Pod, Zeroable)]
#[cfg_attr(not(target_arch = "spirv"), derive(Debug))]
#[repr(C)]
pub struct FrameData {
	pub camera: Camera,
	pub frustum: [Vec4; 6],
	pub render_extent: [u32; 2],
	pub pyramid_extent: [u32; 2],
	pub pyramid_levels: u32,
	pub lod_target: f32,
	pub draw_count: u32,
	pub flags: u32,
}
const_assert_eq!(mem::size_of::<FrameData>(), 144 + 96 + 32);

impl FrameData {
	pub fn new(camera: Camera, draw_distance: f32, render_extent: UVec2, draw_count: u32, flags: CullFlags) -> Self {
		Self {
			camera,
			frustum: Frustum::from_projection(camera.projection, draw_distance).planes,
			render_extent: render_extent.to_array(),
			pyramid_extent: pyramid_extent(render_extent).to_array(),
			pyramid_levels: pyramid_levels(render_extent),
			lod_target: lod_target(camera.p11, camera.viewport_height),
			draw_count,
			flags: flags.bits(),
		}
	}

	pub fn frustum(&self) -> Frustum {
		Frustum { planes: self.frustum }
	}

	pub fn flags(&self) -> CullFlags {
		CullFlags::from_bits_truncate(self.flags)
	}

	pub fn render_extent(&self) -> UVec2 {
		UVec2::from(self.render_extent)
	}
}
