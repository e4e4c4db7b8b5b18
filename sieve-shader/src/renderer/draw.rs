use crate::renderer::mesh::Mesh;
use bytemuck_derive::{Pod, Zeroable};
use core::mem;
use glam::{Quat, Vec3};
use static_assertions::const_assert_eq;

/// Workgroup size of the task shader, each task workgroup expands this many meshlets.
pub const TASK_WG_SIZE: u32 = 32;

/// One object of the draw set.
#[derive(Copy, Clone, Pod, Zeroable)]
#[cfg_attr(not(target_arch = "spirv"), derive(Debug, PartialEq))]
#[repr(C)]
pub struct MeshDraw {
	pub position: [f32; 3],
	pub scale: f32,
	/// quaternion xyzw
	pub rotation: [f32; 4],
	pub mesh_index: u32,
	/// copy of `Mesh::vertex_offset`
	pub vertex_offset: u32,
	pub _pad: [u32; 2],
}
const_assert_eq!(mem::size_of::<MeshDraw>(), 12 * 4);

impl MeshDraw {
	pub fn new(position: Vec3, scale: f32, rotation: Quat, mesh_index: u32, mesh: &Mesh) -> Self {
		Self {
			position: position.to_array(),
			scale,
			rotation: rotation.to_array(),
			mesh_index,
			vertex_offset: mesh.vertex_offset,
			_pad: [0; 2],
		}
	}

	pub fn position(&self) -> Vec3 {
		Vec3::from(self.position)
	}

	pub fn rotation(&self) -> Quat {
		Quat::from_array(self.rotation)
	}

	pub fn transform_point(&self, point: Vec3) -> Vec3 {
		self.rotation() * (point * self.scale) + self.position()
	}

	pub fn transform_vector(&self, vector: Vec3) -> Vec3 {
		self.rotation() * vector
	}
}

/// Draw command written by the culling stage.
///
/// Contains both a `VkDrawIndexedIndirectCommand` at [`Self::INDEXED_OFFSET`] and a
/// `VkDrawMeshTasksIndirectCommandEXT` at [`Self::TASK_OFFSET`], so both submission paths can consume the same
/// buffer with the same stride.
#[derive(Copy, Clone, Default, Pod, Zeroable)]
#[cfg_attr(not(target_arch = "spirv"), derive(Debug, PartialEq, Eq))]
#[repr(C)]
pub struct MeshDrawCommand {
	pub draw_id: u32,

	// VkDrawIndexedIndirectCommand
	pub index_count: u32,
	pub instance_count: u32,
	pub first_index: u32,
	pub vertex_offset: i32,
	pub first_instance: u32,

	// VkDrawMeshTasksIndirectCommandEXT
	pub task_count: u32,
	pub task_count_y: u32,
	pub task_count_z: u32,

	/// first meshlet of the selected LOD
	pub first_task: u32,
	pub meshlet_count: u32,
}
const_assert_eq!(mem::size_of::<MeshDrawCommand>(), 11 * 4);

impl MeshDrawCommand {
	pub const INDEXED_OFFSET: usize = mem::offset_of!(MeshDrawCommand, index_count);
	pub const TASK_OFFSET: usize = mem::offset_of!(MeshDrawCommand, task_count);

	pub fn new(draw_id: u32, draw: &MeshDraw, mesh: &Mesh, lod_index: u32) -> Self {
		let lod = mesh.lod(lod_index);
		Self {
			draw_id,
			index_count: lod.index_count,
			instance_count: 1,
			first_index: lod.index_offset,
			vertex_offset: draw.vertex_offset as i32,
			first_instance: 0,
			task_count: lod.meshlet_count.div_ceil(TASK_WG_SIZE),
			task_count_y: 1,
			task_count_z: 1,
			first_task: lod.meshlet_offset,
			meshlet_count: lod.meshlet_count,
		}
	}
}
const_assert_eq!(MeshDrawCommand::INDEXED_OFFSET, 4);
const_assert_eq!(MeshDrawCommand::TASK_OFFSET, 24);

#[cfg(test)]
mod tests {
	use super::*;
	use crate::renderer::mesh::MeshLod;
	use approx::assert_relative_eq;

	#[test]
	fn command_uses_selected_lod() {
		let mut mesh = Mesh {
			vertex_offset: 100,
			lod_count: 2,
			..Mesh::default()
		};
		mesh.lods[0] = MeshLod {
			index_offset: 0,
			index_count: 300,
			meshlet_offset: 0,
			meshlet_count: 33,
			error: 0.,
		};
		mesh.lods[1] = MeshLod {
			index_offset: 300,
			index_count: 90,
			meshlet_offset: 33,
			meshlet_count: 2,
			error: 0.1,
		};
		let draw = MeshDraw::new(Vec3::ZERO, 1., Quat::IDENTITY, 0, &mesh);

		let lod0 = MeshDrawCommand::new(7, &draw, &mesh, 0);
		assert_eq!(lod0.draw_id, 7);
		assert_eq!((lod0.first_index, lod0.index_count), (0, 300));
		assert_eq!(lod0.vertex_offset, 100);
		assert_eq!(lod0.task_count, 2);

		let lod1 = MeshDrawCommand::new(7, &draw, &mesh, 1);
		assert_eq!((lod1.first_index, lod1.index_count), (300, 90));
		assert_eq!((lod1.first_task, lod1.meshlet_count, lod1.task_count), (33, 2, 1));
	}

	#[test]
	fn transform_matches_quaternion_rotation() {
		let draw = MeshDraw {
			position: [1., 2., 3.],
			scale: 2.,
			rotation: Quat::from_rotation_y(core::f32::consts::FRAC_PI_2).to_array(),
			mesh_index: 0,
			vertex_offset: 0,
			_pad: [0; 2],
		};
		// +x rotated by 90 degrees around y points to -z
		let p = draw.transform_point(Vec3::X);
		assert_relative_eq!(p.x, 1., epsilon = 1e-5);
		assert_relative_eq!(p.y, 2., epsilon = 1e-5);
		assert_relative_eq!(p.z, 1., epsilon = 1e-5);
	}
}
