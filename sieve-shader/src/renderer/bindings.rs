//! Statically declared resource bindings of every pipeline.
//!
//! Shader entry points assert their `binding = N` attributes against these constants and the host builds its
//! descriptor set layouts from the tables, so neither side has to reflect on compiled SPIR-V.

use bitflags::bitflags;

/// Name of the SPIR-V module all entry points are compiled into.
pub const SHADER_MODULE: &str = "sieve_shader.spv";

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum DescriptorKind {
	StorageBuffer,
	SampledImage,
	StorageImage,
}

bitflags! {
	#[derive(Copy, Clone, Debug, Eq, PartialEq)]
	pub struct Stages: u32 {
		const VERTEX = 1 << 0;
		const FRAGMENT = 1 << 1;
		const COMPUTE = 1 << 2;
		const TASK = 1 << 3;
		const MESH = 1 << 4;
	}
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct Binding {
	pub binding: u32,
	pub kind: DescriptorKind,
	pub stages: Stages,
}

impl Binding {
	pub const fn new(binding: u32, kind: DescriptorKind, stages: Stages) -> Self {
		Self { binding, kind, stages }
	}
}

#[derive(Copy, Clone, Debug)]
pub struct PipelineBindings {
	pub name: &'static str,
	pub bindings: &'static [Binding],
	pub push_constant_size: u32,
}

impl PipelineBindings {
	pub fn stages(&self) -> Stages {
		self.bindings.iter().fold(Stages::empty(), |acc, b| acc | b.stages)
	}
}

pub mod draw_cull {
	use super::*;

	pub const ENTRY: &str = "draw_cull_cs";
	pub const FRAME_DATA: u32 = 0;
	pub const DRAWS: u32 = 1;
	pub const MESHES: u32 = 2;
	pub const COMMANDS: u32 = 3;
	pub const DRAW_COUNT: u32 = 4;
	pub const DEPTH_PYRAMID: u32 = 5;

	pub const TABLE: PipelineBindings = PipelineBindings {
		name: "draw_cull",
		bindings: &[
			Binding::new(FRAME_DATA, DescriptorKind::StorageBuffer, Stages::COMPUTE),
			Binding::new(DRAWS, DescriptorKind::StorageBuffer, Stages::COMPUTE),
			Binding::new(MESHES, DescriptorKind::StorageBuffer, Stages::COMPUTE),
			Binding::new(COMMANDS, DescriptorKind::StorageBuffer, Stages::COMPUTE),
			Binding::new(DRAW_COUNT, DescriptorKind::StorageBuffer, Stages::COMPUTE),
			Binding::new(DEPTH_PYRAMID, DescriptorKind::SampledImage, Stages::COMPUTE),
		],
		push_constant_size: 0,
	};
}

pub mod depth_reduce {
	use super::*;

	pub const ENTRY: &str = "depth_reduce_cs";
	pub const SRC: u32 = 0;
	pub const DST: u32 = 1;

	pub const TABLE: PipelineBindings = PipelineBindings {
		name: "depth_reduce",
		bindings: &[
			Binding::new(SRC, DescriptorKind::SampledImage, Stages::COMPUTE),
			Binding::new(DST, DescriptorKind::StorageImage, Stages::COMPUTE),
		],
		push_constant_size: size_of::<crate::renderer::depth_reduce::DepthReduceParams>() as u32,
	};
}

/// Indexed triangle path: vertex pulling from the shared vertex buffer.
pub mod mesh {
	use super::*;

	pub const VERTEX_ENTRY: &str = "mesh_vs";
	pub const FRAGMENT_ENTRY: &str = "mesh_fs";
	pub const FRAME_DATA: u32 = 0;
	pub const DRAWS: u32 = 1;
	pub const COMMANDS: u32 = 2;
	pub const VERTICES: u32 = 3;

	pub const TABLE: PipelineBindings = PipelineBindings {
		name: "mesh",
		bindings: &[
			Binding::new(FRAME_DATA, DescriptorKind::StorageBuffer, Stages::VERTEX),
			Binding::new(DRAWS, DescriptorKind::StorageBuffer, Stages::VERTEX),
			Binding::new(COMMANDS, DescriptorKind::StorageBuffer, Stages::VERTEX),
			Binding::new(VERTICES, DescriptorKind::StorageBuffer, Stages::VERTEX),
		],
		push_constant_size: 0,
	};
}

/// Mesh shading path: task shader expands meshlets, mesh shader emits them.
pub mod meshlet {
	use super::*;

	pub const TASK_ENTRY: &str = "meshlet_task";
	pub const MESH_ENTRY: &str = "meshlet_mesh";
	pub const FRAGMENT_ENTRY: &str = "mesh_fs";
	pub const FRAME_DATA: u32 = 0;
	pub const DRAWS: u32 = 1;
	pub const COMMANDS: u32 = 2;
	pub const VERTICES: u32 = 3;
	pub const MESHLETS: u32 = 4;
	pub const MESHLET_DATA: u32 = 5;

	pub const TABLE: PipelineBindings = PipelineBindings {
		name: "meshlet",
		bindings: &[
			Binding::new(FRAME_DATA, DescriptorKind::StorageBuffer, Stages::TASK.union(Stages::MESH)),
			Binding::new(DRAWS, DescriptorKind::StorageBuffer, Stages::TASK.union(Stages::MESH)),
			Binding::new(COMMANDS, DescriptorKind::StorageBuffer, Stages::TASK),
			Binding::new(VERTICES, DescriptorKind::StorageBuffer, Stages::MESH),
			Binding::new(MESHLETS, DescriptorKind::StorageBuffer, Stages::TASK.union(Stages::MESH)),
			Binding::new(MESHLET_DATA, DescriptorKind::StorageBuffer, Stages::MESH),
		],
		push_constant_size: 0,
	};
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn tables_are_dense_and_ordered() {
		for table in [draw_cull::TABLE, depth_reduce::TABLE, mesh::TABLE, meshlet::TABLE] {
			for (i, binding) in table.bindings.iter().enumerate() {
				assert_eq!(binding.binding, i as u32, "{}", table.name);
				assert!(!binding.stages.is_empty(), "{}", table.name);
			}
		}
		assert_eq!(meshlet::TABLE.stages(), Stages::TASK | Stages::MESH);
		assert_eq!(depth_reduce::TABLE.push_constant_size, 16);
	}
}
