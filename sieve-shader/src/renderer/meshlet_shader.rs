use crate::renderer::bindings::meshlet as bindings;
use crate::renderer::draw::{MeshDraw, MeshDrawCommand, TASK_WG_SIZE};
use crate::renderer::frame_data::{CullFlags, FrameData};
use crate::renderer::mesh::{MESHLET_MAX_TRIANGLES, MESHLET_MAX_VERTICES, Meshlet, Vertex, load_triangle};
use crate::renderer::mesh_shader::transform_vertex;
use glam::{UVec3, Vec3, Vec4};
use spirv_std::arch::{
	IndexUnchecked, atomic_i_add, emit_mesh_tasks_ext_payload, set_mesh_outputs_ext,
	workgroup_memory_barrier_with_group_sync,
};
use spirv_std::memory::{Scope, Semantics};
use spirv_std::spirv;
use static_assertions::const_assert_eq;

pub const MESH_WG_SIZE: u32 = 32;

#[derive(Copy, Clone)]
pub struct MeshTaskPayload {
	pub draw_id: u32,
	pub meshlet_indices: [u32; TASK_WG_SIZE as usize],
}

/// Meshlet frustum and backface cone test, camera at the view space origin.
pub fn meshlet_culled(frame_data: &FrameData, draw: &MeshDraw, meshlet: &Meshlet) -> bool {
	if !frame_data.flags().contains(CullFlags::MESHLET_CULLING) {
		return false;
	}

	let camera = &frame_data.camera;
	let center = camera.view_space(draw.transform_point(meshlet.center()));
	let radius = meshlet.radius * draw.scale;
	if frame_data.frustum().outside_view(center, radius) {
		return true;
	}

	let axis = camera.view_space_vector(draw.transform_vector(meshlet.cone_axis()));
	center.dot(axis) >= meshlet.cone_cutoff() * center.length() + radius
}

const_assert_eq!(bindings::FRAME_DATA, 0);
const_assert_eq!(bindings::DRAWS, 1);
const_assert_eq!(bindings::COMMANDS, 2);
const_assert_eq!(bindings::VERTICES, 3);
const_assert_eq!(bindings::MESHLETS, 4);
const_assert_eq!(bindings::MESHLET_DATA, 5);
const_assert_eq!(TASK_WG_SIZE, 32);
#[spirv(task_ext(threads(32)))]
pub fn meshlet_task(
	#[spirv(workgroup_id)] wg_id: UVec3,
	#[spirv(local_invocation_id)] inv_id: UVec3,
	#[spirv(draw_index)] draw_index: u32,
	#[spirv(storage_buffer, descriptor_set = 0, binding = 0)] frame_data: &FrameData,
	#[spirv(storage_buffer, descriptor_set = 0, binding = 1)] draws: &[MeshDraw],
	#[spirv(storage_buffer, descriptor_set = 0, binding = 2)] commands: &[MeshDrawCommand],
	#[spirv(storage_buffer, descriptor_set = 0, binding = 4)] meshlets: &[Meshlet],
	#[spirv(workgroup)] visible_count: &mut u32,
	#[spirv(task_payload_workgroup_ext)] payload: &mut MeshTaskPayload,
) {
	let command = commands[draw_index as usize];
	let draw = draws[command.draw_id as usize];
	let local = wg_id.x * TASK_WG_SIZE + inv_id.x;

	// Safety: bounds checks in task shaders are broken
	unsafe {
		if inv_id.x == 0 {
			*visible_count = 0;
			payload.draw_id = command.draw_id;
		}
		workgroup_memory_barrier_with_group_sync();

		if local < command.meshlet_count {
			let meshlet_index = command.first_task + local;
			if !meshlet_culled(frame_data, &draw, meshlets.index_unchecked(meshlet_index as usize)) {
				let slot = atomic_i_add::<_, { Scope::Workgroup as u32 }, { Semantics::WORKGROUP_MEMORY.bits() }>(
					visible_count,
					1,
				);
				*payload.meshlet_indices.index_unchecked_mut(slot as usize) = meshlet_index;
			}
		}
		workgroup_memory_barrier_with_group_sync();

		emit_mesh_tasks_ext_payload(*visible_count, 1, 1, payload);
	}
}

const_assert_eq!(MESH_WG_SIZE, 32);
const_assert_eq!(MESHLET_MAX_VERTICES, 64);
const_assert_eq!(MESHLET_MAX_TRIANGLES, 124);
#[spirv(mesh_ext(threads(32), output_vertices = 64, output_primitives_ext = 124, output_triangles_ext))]
pub fn meshlet_mesh(
	#[spirv(workgroup_id)] wg_id: UVec3,
	#[spirv(local_invocation_id)] inv_id: UVec3,
	#[spirv(storage_buffer, descriptor_set = 0, binding = 0)] frame_data: &FrameData,
	#[spirv(storage_buffer, descriptor_set = 0, binding = 1)] draws: &[MeshDraw],
	#[spirv(storage_buffer, descriptor_set = 0, binding = 3)] vertices: &[Vertex],
	#[spirv(storage_buffer, descriptor_set = 0, binding = 4)] meshlets: &[Meshlet],
	#[spirv(storage_buffer, descriptor_set = 0, binding = 5)] meshlet_data: &[u32],
	#[spirv(task_payload_workgroup_ext)] payload: &MeshTaskPayload,
	#[spirv(primitive_triangle_indices_ext)] prim_indices: &mut [UVec3; MESHLET_MAX_TRIANGLES as usize],
	#[spirv(position)] out_positions: &mut [Vec4; MESHLET_MAX_VERTICES as usize],
	out_normals: &mut [Vec3; MESHLET_MAX_VERTICES as usize],
) {
	// Safety: panics within loops miscompile, all indices come from the meshlet builder
	unsafe {
		let draw = draws.index_unchecked(payload.draw_id as usize);
		let meshlet_index = *payload.meshlet_indices.index_unchecked(wg_id.x as usize);
		let meshlet = meshlets.index_unchecked(meshlet_index as usize);
		set_mesh_outputs_ext(meshlet.vertex_count, meshlet.triangle_count);

		let mut i = inv_id.x;
		while i < meshlet.vertex_count {
			let vertex_index = draw.vertex_offset + *meshlet_data.index_unchecked((meshlet.data_offset + i) as usize);
			let (position, normal) = transform_vertex(frame_data, draw, vertices.index_unchecked(vertex_index as usize));
			*out_positions.index_unchecked_mut(i as usize) = position;
			*out_normals.index_unchecked_mut(i as usize) = normal;
			i += MESH_WG_SIZE;
		}

		let mut t = inv_id.x;
		while t < meshlet.triangle_count {
			let [a, b, c] = load_triangle(meshlet, t, |word| *meshlet_data.index_unchecked(word as usize));
			*prim_indices.index_unchecked_mut(t as usize) = UVec3::new(a, b, c);
			t += MESH_WG_SIZE;
		}
	}
}
