use crate::renderer::bindings::mesh as bindings;
use crate::renderer::draw::{MeshDraw, MeshDrawCommand};
use crate::renderer::frame_data::FrameData;
use crate::renderer::mesh::Vertex;
use glam::{Vec3, Vec4};
use spirv_std::spirv;
use static_assertions::const_assert_eq;

/// World space position and normal of a vertex drawn by `draw`.
pub fn transform_vertex(frame_data: &FrameData, draw: &MeshDraw, vertex: &Vertex) -> (Vec4, Vec3) {
	let world = draw.transform_point(vertex.position());
	let normal = draw.transform_vector(vertex.normal());
	(frame_data.camera.clip_space(world), normal)
}

const_assert_eq!(bindings::FRAME_DATA, 0);
const_assert_eq!(bindings::DRAWS, 1);
const_assert_eq!(bindings::COMMANDS, 2);
const_assert_eq!(bindings::VERTICES, 3);
#[spirv(vertex)]
pub fn mesh_vs(
	#[spirv(vertex_index)] vertex_index: u32,
	#[spirv(draw_index)] draw_index: u32,
	#[spirv(storage_buffer, descriptor_set = 0, binding = 0)] frame_data: &FrameData,
	#[spirv(storage_buffer, descriptor_set = 0, binding = 1)] draws: &[MeshDraw],
	#[spirv(storage_buffer, descriptor_set = 0, binding = 2)] commands: &[MeshDrawCommand],
	#[spirv(storage_buffer, descriptor_set = 0, binding = 3)] vertices: &[Vertex],
	#[spirv(position)] out_position: &mut Vec4,
	out_normal: &mut Vec3,
) {
	// vertex_index already includes the command's vertex_offset
	let draw = draws[commands[draw_index as usize].draw_id as usize];
	let (position, normal) = transform_vertex(frame_data, &draw, &vertices[vertex_index as usize]);
	*out_position = position;
	*out_normal = normal;
}

#[spirv(fragment)]
pub fn mesh_fs(normal: Vec3, out_color: &mut Vec4) {
	*out_color = Vec4::from((normal.normalize_or_zero() * 0.5 + 0.5, 1.));
}
