use crate::device::error::RenderError;
use crate::device::init::Init;
use crate::renderer::shader::ShaderModule;
use ash::vk;
use sieve_shader::renderer::bindings::{DescriptorKind, PipelineBindings, Stages};
use smallvec::SmallVec;
use std::ffi::CString;
use std::sync::Arc;

pub fn descriptor_type(kind: DescriptorKind) -> vk::DescriptorType {
	match kind {
		DescriptorKind::StorageBuffer => vk::DescriptorType::STORAGE_BUFFER,
		DescriptorKind::SampledImage => vk::DescriptorType::SAMPLED_IMAGE,
		DescriptorKind::StorageImage => vk::DescriptorType::STORAGE_IMAGE,
	}
}

pub fn shader_stages(stages: Stages) -> vk::ShaderStageFlags {
	[
		(Stages::VERTEX, vk::ShaderStageFlags::VERTEX),
		(Stages::FRAGMENT, vk::ShaderStageFlags::FRAGMENT),
		(Stages::COMPUTE, vk::ShaderStageFlags::COMPUTE),
		(Stages::TASK, vk::ShaderStageFlags::TASK_EXT),
		(Stages::MESH, vk::ShaderStageFlags::MESH_EXT),
	]
	.into_iter()
	.filter(|(s, _)| stages.contains(*s))
	.fold(vk::ShaderStageFlags::empty(), |acc, (_, vk)| acc | vk)
}

/// One resource bound to a push descriptor slot.
#[derive(Copy, Clone, Debug)]
pub enum Descriptor {
	Buffer(vk::Buffer),
	Image(vk::ImageView, vk::ImageLayout),
}

/// Descriptor set layout and pipeline layout derived from a binding table. The set is always pushed.
pub struct BindingLayout {
	init: Arc<Init>,
	pub table: PipelineBindings,
	pub set_layout: vk::DescriptorSetLayout,
	pub pipeline_layout: vk::PipelineLayout,
	push_constant_stages: vk::ShaderStageFlags,
}

impl BindingLayout {
	pub fn new(init: &Arc<Init>, table: PipelineBindings) -> Result<Self, RenderError> {
		let device = &init.device;
		let bindings: SmallVec<[_; 8]> = table
			.bindings
			.iter()
			.map(|b| {
				vk::DescriptorSetLayoutBinding::default()
					.binding(b.binding)
					.descriptor_type(descriptor_type(b.kind))
					.descriptor_count(1)
					.stage_flags(shader_stages(b.stages))
			})
			.collect();
		let set_layout = unsafe {
			device.create_descriptor_set_layout(
				&vk::DescriptorSetLayoutCreateInfo::default()
					.flags(vk::DescriptorSetLayoutCreateFlags::PUSH_DESCRIPTOR_KHR)
					.bindings(&bindings),
				None,
			)?
		};

		let push_constant_stages = shader_stages(table.stages());
		let push_constants: SmallVec<[_; 1]> = (table.push_constant_size > 0)
			.then(|| {
				vk::PushConstantRange::default()
					.stage_flags(push_constant_stages)
					.offset(0)
					.size(table.push_constant_size)
			})
			.into_iter()
			.collect();
		let set_layouts = [set_layout];
		let pipeline_layout = unsafe {
			device.create_pipeline_layout(
				&vk::PipelineLayoutCreateInfo::default()
					.set_layouts(&set_layouts)
					.push_constant_ranges(&push_constants),
				None,
			)
		};
		let pipeline_layout = match pipeline_layout {
			Ok(l) => l,
			Err(e) => {
				unsafe { device.destroy_descriptor_set_layout(set_layout, None) };
				return Err(e.into());
			}
		};
		Ok(Self {
			init: init.clone(),
			table,
			set_layout,
			pipeline_layout,
			push_constant_stages,
		})
	}

	/// Pushes one descriptor per table entry, in table order.
	pub fn push_descriptors(&self, cmd: vk::CommandBuffer, bind_point: vk::PipelineBindPoint, descriptors: &[Descriptor]) {
		assert_eq!(
			descriptors.len(),
			self.table.bindings.len(),
			"{}: descriptor count mismatch",
			self.table.name
		);
		let mut buffer_infos = SmallVec::<[vk::DescriptorBufferInfo; 8]>::new();
		let mut image_infos = SmallVec::<[vk::DescriptorImageInfo; 8]>::new();
		for (binding, descriptor) in self.table.bindings.iter().zip(descriptors) {
			match (binding.kind, *descriptor) {
				(DescriptorKind::StorageBuffer, Descriptor::Buffer(buffer)) => buffer_infos.push(
					vk::DescriptorBufferInfo::default()
						.buffer(buffer)
						.offset(0)
						.range(vk::WHOLE_SIZE),
				),
				(DescriptorKind::SampledImage | DescriptorKind::StorageImage, Descriptor::Image(view, layout)) => {
					image_infos.push(vk::DescriptorImageInfo::default().image_view(view).image_layout(layout))
				}
				(kind, descriptor) => panic!(
					"{} binding {}: {:?} cannot be bound to {:?}",
					self.table.name, binding.binding, descriptor, kind
				),
			}
		}

		let (mut next_buffer, mut next_image) = (0, 0);
		let writes: SmallVec<[_; 8]> = self
			.table
			.bindings
			.iter()
			.map(|binding| {
				let write = vk::WriteDescriptorSet::default()
					.dst_binding(binding.binding)
					.descriptor_type(descriptor_type(binding.kind));
				match binding.kind {
					DescriptorKind::StorageBuffer => {
						next_buffer += 1;
						write.buffer_info(std::slice::from_ref(&buffer_infos[next_buffer - 1]))
					}
					_ => {
						next_image += 1;
						write.image_info(std::slice::from_ref(&image_infos[next_image - 1]))
					}
				}
			})
			.collect();
		unsafe {
			self.init
				.push_descriptor
				.cmd_push_descriptor_set(cmd, bind_point, self.pipeline_layout, 0, &writes)
		};
	}

	pub fn push_constants<T: bytemuck::Pod>(&self, cmd: vk::CommandBuffer, value: &T) {
		assert_eq!(size_of::<T>() as u32, self.table.push_constant_size, "{}", self.table.name);
		unsafe {
			self.init.device.cmd_push_constants(
				cmd,
				self.pipeline_layout,
				self.push_constant_stages,
				0,
				bytemuck::bytes_of(value),
			)
		};
	}
}

impl Drop for BindingLayout {
	fn drop(&mut self) {
		unsafe {
			self.init.device.destroy_pipeline_layout(self.pipeline_layout, None);
			self.init.device.destroy_descriptor_set_layout(self.set_layout, None);
		}
	}
}

/// A pipeline with its binding layout.
pub struct Pipeline {
	init: Arc<Init>,
	pub layout: BindingLayout,
	pub pipeline: vk::Pipeline,
	pub bind_point: vk::PipelineBindPoint,
}

impl Pipeline {
	pub fn compute(init: &Arc<Init>, module: &ShaderModule, table: PipelineBindings, entry: &str) -> Result<Self, RenderError> {
		let layout = BindingLayout::new(init, table)?;
		let entry = entry_name(entry);
		let stage = vk::PipelineShaderStageCreateInfo::default()
			.stage(vk::ShaderStageFlags::COMPUTE)
			.module(module.handle())
			.name(&entry);
		let create_info = vk::ComputePipelineCreateInfo::default()
			.stage(stage)
			.layout(layout.pipeline_layout);
		let pipeline = unsafe {
			init.device
				.create_compute_pipelines(vk::PipelineCache::null(), &[create_info], None)
				.map_err(|(_, e)| e)?[0]
		};
		log::debug!("created compute pipeline {}", table.name);
		Ok(Self {
			init: init.clone(),
			layout,
			pipeline,
			bind_point: vk::PipelineBindPoint::COMPUTE,
		})
	}

	/// A graphics pipeline for dynamic rendering, with either a vertex or a task and mesh stage.
	pub fn graphics(
		init: &Arc<Init>,
		module: &ShaderModule,
		table: PipelineBindings,
		stages: &[(vk::ShaderStageFlags, &str)],
		targets: &RenderTargetFormats,
	) -> Result<Self, RenderError> {
		let layout = BindingLayout::new(init, table)?;
		let names: SmallVec<[_; 3]> = stages.iter().map(|(_, name)| entry_name(name)).collect();
		let stage_infos: SmallVec<[_; 3]> = stages
			.iter()
			.zip(&names)
			.map(|((stage, _), name)| {
				vk::PipelineShaderStageCreateInfo::default()
					.stage(*stage)
					.module(module.handle())
					.name(name)
			})
			.collect();
		let mesh_pipeline = stages.iter().any(|(s, _)| s.contains(vk::ShaderStageFlags::MESH_EXT));

		let vertex_input = vk::PipelineVertexInputStateCreateInfo::default();
		let input_assembly =
			vk::PipelineInputAssemblyStateCreateInfo::default().topology(vk::PrimitiveTopology::TRIANGLE_LIST);
		let viewport = vk::PipelineViewportStateCreateInfo::default()
			.viewport_count(1)
			.scissor_count(1);
		// the viewport is flipped, so counter clockwise stays front facing
		let rasterization = vk::PipelineRasterizationStateCreateInfo::default()
			.polygon_mode(vk::PolygonMode::FILL)
			.cull_mode(vk::CullModeFlags::BACK)
			.front_face(vk::FrontFace::COUNTER_CLOCKWISE)
			.line_width(1.);
		let multisample =
			vk::PipelineMultisampleStateCreateInfo::default().rasterization_samples(vk::SampleCountFlags::TYPE_1);
		// reversed-Z
		let depth_stencil = vk::PipelineDepthStencilStateCreateInfo::default()
			.depth_test_enable(true)
			.depth_write_enable(true)
			.depth_compare_op(vk::CompareOp::GREATER);
		let blend_attachments = [vk::PipelineColorBlendAttachmentState::default().color_write_mask(vk::ColorComponentFlags::RGBA)];
		let color_blend = vk::PipelineColorBlendStateCreateInfo::default().attachments(&blend_attachments);
		let dynamic_states = [vk::DynamicState::VIEWPORT, vk::DynamicState::SCISSOR];
		let dynamic = vk::PipelineDynamicStateCreateInfo::default().dynamic_states(&dynamic_states);
		let color_formats = [targets.color];
		let mut rendering = vk::PipelineRenderingCreateInfo::default()
			.color_attachment_formats(&color_formats)
			.depth_attachment_format(targets.depth);

		let mut create_info = vk::GraphicsPipelineCreateInfo::default()
			.push_next(&mut rendering)
			.stages(&stage_infos)
			.viewport_state(&viewport)
			.rasterization_state(&rasterization)
			.multisample_state(&multisample)
			.depth_stencil_state(&depth_stencil)
			.color_blend_state(&color_blend)
			.dynamic_state(&dynamic)
			.layout(layout.pipeline_layout);
		if !mesh_pipeline {
			create_info = create_info
				.vertex_input_state(&vertex_input)
				.input_assembly_state(&input_assembly);
		}
		let pipeline = unsafe {
			init.device
				.create_graphics_pipelines(vk::PipelineCache::null(), &[create_info], None)
				.map_err(|(_, e)| e)?[0]
		};
		log::debug!("created graphics pipeline {}", table.name);
		Ok(Self {
			init: init.clone(),
			layout,
			pipeline,
			bind_point: vk::PipelineBindPoint::GRAPHICS,
		})
	}

	pub fn bind(&self, cmd: vk::CommandBuffer, descriptors: &[Descriptor]) {
		unsafe { self.init.device.cmd_bind_pipeline(cmd, self.bind_point, self.pipeline) };
		self.layout.push_descriptors(cmd, self.bind_point, descriptors);
	}
}

impl Drop for Pipeline {
	fn drop(&mut self) {
		unsafe { self.init.device.destroy_pipeline(self.pipeline, None) };
	}
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct RenderTargetFormats {
	pub color: vk::Format,
	pub depth: vk::Format,
}

fn entry_name(name: &str) -> CString {
	CString::new(name).unwrap_or_default()
}

#[cfg(test)]
mod tests {
	use super::*;
	use sieve_shader::renderer::bindings::{depth_reduce, draw_cull, meshlet};

	#[test]
	fn stage_flags_cover_all_stages() {
		assert_eq!(shader_stages(Stages::COMPUTE), vk::ShaderStageFlags::COMPUTE);
		assert_eq!(
			shader_stages(meshlet::TABLE.stages()),
			vk::ShaderStageFlags::TASK_EXT | vk::ShaderStageFlags::MESH_EXT
		);
		assert_eq!(shader_stages(Stages::empty()), vk::ShaderStageFlags::empty());
	}

	#[test]
	fn descriptor_types_match_tables() {
		let kinds: Vec<_> = draw_cull::TABLE.bindings.iter().map(|b| descriptor_type(b.kind)).collect();
		assert_eq!(kinds[..5], [vk::DescriptorType::STORAGE_BUFFER; 5]);
		assert_eq!(kinds[5], vk::DescriptorType::SAMPLED_IMAGE);
		assert_eq!(
			descriptor_type(depth_reduce::TABLE.bindings[depth_reduce::DST as usize].kind),
			vk::DescriptorType::STORAGE_IMAGE
		);
	}
}
