use crate::renderer::frame_in_flight::FrameSlot;
use crate::renderer::geometry::geometry_gpu::{DrawSetGpu, GeometryGpu};
use crate::renderer::geometry::mesh_pipeline::MeshDrawPipeline;
use crate::renderer::geometry::meshlet_pipeline::MeshletDrawPipeline;
use ash::vk;

/// How the visible geometry of a frame is submitted, chosen once per frame.
#[derive(Copy, Clone)]
pub enum GeometrySubmission<'a> {
	Indexed(&'a MeshDrawPipeline),
	MeshShading(&'a MeshletDrawPipeline),
}

impl<'a> GeometrySubmission<'a> {
	/// Mesh shading is only used if requested, supported by the device and the geometry has meshlets.
	pub fn select(
		requested: bool,
		indexed: &'a MeshDrawPipeline,
		meshlet: Option<&'a MeshletDrawPipeline>,
		geometry: &GeometryGpu,
	) -> Self {
		match meshlet {
			Some(meshlet) if uses_mesh_shading(requested, true, geometry.has_meshlets()) => Self::MeshShading(meshlet),
			_ => Self::Indexed(indexed),
		}
	}

	pub fn is_mesh_shading(&self) -> bool {
		matches!(self, Self::MeshShading(_))
	}

	/// Records the indirect draw of everything the cull kept. Must be recorded inside rendering.
	pub fn submit(&self, cmd: vk::CommandBuffer, frame: &FrameSlot, draws: &DrawSetGpu, geometry: &GeometryGpu) {
		match self {
			Self::Indexed(pipeline) => pipeline.draw(cmd, frame, draws, geometry),
			Self::MeshShading(pipeline) => pipeline.draw(cmd, frame, draws, geometry),
		}
	}
}

pub fn uses_mesh_shading(requested: bool, supported: bool, has_meshlets: bool) -> bool {
	requested && supported && has_meshlets
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn mesh_shading_needs_every_condition() {
		assert!(uses_mesh_shading(true, true, true));
		assert!(!uses_mesh_shading(false, true, true));
		assert!(!uses_mesh_shading(true, false, true));
		assert!(!uses_mesh_shading(true, true, false));
	}
}
