use crate::device::error::RenderError;
use ash::{ext, khr, vk};
use smallvec::SmallVec;
use std::ffi::CStr;

/// Optional device functionality the renderer adapts to at runtime.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct DeviceCapabilities {
	/// task and mesh shaders of `VK_EXT_mesh_shader`
	pub mesh_shading: bool,
	/// `vkCmdDraw*IndirectCount`, without it the full command buffer is drawn with zeroed unused commands
	pub draw_indirect_count: bool,
	pub pipeline_statistics: bool,
	/// timestamps on the graphics queue
	pub timestamps: bool,
}

/// The subset of a physical device's features and properties that decides its [`DeviceCapabilities`].
#[derive(Copy, Clone, Debug, Default)]
pub struct FeatureSupport {
	pub api_version: u32,
	pub swapchain: bool,
	pub push_descriptor: bool,
	pub mesh_shader_extension: bool,
	pub multi_draw_indirect: bool,
	pub shader_draw_parameters: bool,
	pub vulkan_memory_model: bool,
	pub draw_indirect_count: bool,
	pub dynamic_rendering: bool,
	pub synchronization2: bool,
	pub task_shader: bool,
	pub mesh_shader: bool,
	pub pipeline_statistics_query: bool,
	pub timestamp_compute_and_graphics: bool,
}

impl FeatureSupport {
	pub fn query(instance: &ash::Instance, physical_device: vk::PhysicalDevice) -> Result<Self, RenderError> {
		let extensions = unsafe { instance.enumerate_device_extension_properties(physical_device)? };
		let has_extension = |name: &CStr| extensions.iter().any(|e| e.extension_name_as_c_str() == Ok(name));
		let properties = unsafe { instance.get_physical_device_properties(physical_device) };

		let mesh_shader_extension = has_extension(ext::mesh_shader::NAME);
		let mut v11 = vk::PhysicalDeviceVulkan11Features::default();
		let mut v12 = vk::PhysicalDeviceVulkan12Features::default();
		let mut v13 = vk::PhysicalDeviceVulkan13Features::default();
		let mut mesh = vk::PhysicalDeviceMeshShaderFeaturesEXT::default();
		let mut features2 = vk::PhysicalDeviceFeatures2::default()
			.push_next(&mut v11)
			.push_next(&mut v12)
			.push_next(&mut v13);
		if mesh_shader_extension {
			features2 = features2.push_next(&mut mesh);
		}
		unsafe { instance.get_physical_device_features2(physical_device, &mut features2) };
		let features = features2.features;

		Ok(Self {
			api_version: properties.api_version,
			swapchain: has_extension(khr::swapchain::NAME),
			push_descriptor: has_extension(khr::push_descriptor::NAME),
			mesh_shader_extension,
			multi_draw_indirect: features.multi_draw_indirect == vk::TRUE,
			shader_draw_parameters: v11.shader_draw_parameters == vk::TRUE,
			vulkan_memory_model: v12.vulkan_memory_model == vk::TRUE && v12.vulkan_memory_model_device_scope == vk::TRUE,
			draw_indirect_count: v12.draw_indirect_count == vk::TRUE,
			dynamic_rendering: v13.dynamic_rendering == vk::TRUE,
			synchronization2: v13.synchronization2 == vk::TRUE,
			task_shader: mesh.task_shader == vk::TRUE,
			mesh_shader: mesh.mesh_shader == vk::TRUE,
			pipeline_statistics_query: features.pipeline_statistics_query == vk::TRUE,
			timestamp_compute_and_graphics: properties.limits.timestamp_compute_and_graphics == vk::TRUE,
		})
	}

	/// Checks the hard requirements and derives the optional capabilities.
	pub fn capabilities(&self) -> Result<DeviceCapabilities, RenderError> {
		let required = [
			(vk::api_version_minor(self.api_version) >= 3 || vk::api_version_major(self.api_version) > 1, "vulkan 1.3"),
			(self.swapchain, "VK_KHR_swapchain"),
			(self.push_descriptor, "VK_KHR_push_descriptor"),
			(self.multi_draw_indirect, "multiDrawIndirect"),
			(self.shader_draw_parameters, "shaderDrawParameters"),
			(self.vulkan_memory_model, "vulkanMemoryModelDeviceScope"),
			(self.dynamic_rendering, "dynamicRendering"),
			(self.synchronization2, "synchronization2"),
		];
		if let Some((_, name)) = required.iter().find(|(supported, _)| !supported) {
			return Err(RenderError::MissingFeature(*name));
		}

		Ok(DeviceCapabilities {
			mesh_shading: self.mesh_shader_extension && self.task_shader && self.mesh_shader,
			draw_indirect_count: self.draw_indirect_count,
			pipeline_statistics: self.pipeline_statistics_query,
			timestamps: self.timestamp_compute_and_graphics,
		})
	}
}

impl DeviceCapabilities {
	pub fn device_extensions(&self) -> SmallVec<[&'static CStr; 4]> {
		let mut extensions = SmallVec::from_slice(&[khr::swapchain::NAME, khr::push_descriptor::NAME]);
		if self.mesh_shading {
			extensions.push(ext::mesh_shader::NAME);
		}
		extensions
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn full_support() -> FeatureSupport {
		FeatureSupport {
			api_version: vk::API_VERSION_1_3,
			swapchain: true,
			push_descriptor: true,
			mesh_shader_extension: true,
			multi_draw_indirect: true,
			shader_draw_parameters: true,
			vulkan_memory_model: true,
			draw_indirect_count: true,
			dynamic_rendering: true,
			synchronization2: true,
			task_shader: true,
			mesh_shader: true,
			pipeline_statistics_query: true,
			timestamp_compute_and_graphics: true,
		}
	}

	#[test]
	fn full_support_enables_everything() -> anyhow::Result<()> {
		let caps = full_support().capabilities()?;
		assert_eq!(
			caps,
			DeviceCapabilities {
				mesh_shading: true,
				draw_indirect_count: true,
				pipeline_statistics: true,
				timestamps: true,
			}
		);
		assert_eq!(caps.device_extensions().as_slice(), &[
			khr::swapchain::NAME,
			khr::push_descriptor::NAME,
			ext::mesh_shader::NAME
		]);
		Ok(())
	}

	#[test]
	fn mesh_shading_needs_extension_and_both_stages() -> anyhow::Result<()> {
		let no_task = FeatureSupport {
			task_shader: false,
			..full_support()
		};
		assert!(!no_task.capabilities()?.mesh_shading);
		let no_extension = FeatureSupport {
			mesh_shader_extension: false,
			..full_support()
		};
		let caps = no_extension.capabilities()?;
		assert!(!caps.mesh_shading);
		assert!(!caps.device_extensions().contains(&ext::mesh_shader::NAME));
		Ok(())
	}

	#[test]
	fn missing_requirements_are_named() {
		let old = FeatureSupport {
			api_version: vk::API_VERSION_1_2,
			..full_support()
		};
		assert!(matches!(old.capabilities(), Err(RenderError::MissingFeature("vulkan 1.3"))));
		let no_sync2 = FeatureSupport {
			synchronization2: false,
			..full_support()
		};
		assert!(matches!(no_sync2.capabilities(), Err(RenderError::MissingFeature("synchronization2"))));
		let no_count = FeatureSupport {
			draw_indirect_count: false,
			..full_support()
		};
		assert!(no_count.capabilities().is_ok_and(|c| !c.draw_indirect_count));
	}
}
