use crate::device::capabilities::DeviceCapabilities;
use crate::device::init::Plugin;
use ash::vk;

/// Prefers discrete GPUs, then devices that can take the mesh shading path.
pub struct DefaultDeviceSelectionPlugin;

pub fn device_type_score(device_type: vk::PhysicalDeviceType) -> i32 {
	match device_type {
		vk::PhysicalDeviceType::DISCRETE_GPU => 4,
		vk::PhysicalDeviceType::INTEGRATED_GPU => 3,
		vk::PhysicalDeviceType::VIRTUAL_GPU => 2,
		vk::PhysicalDeviceType::CPU => 1,
		_ => 0,
	}
}

impl Plugin for DefaultDeviceSelectionPlugin {
	fn physical_device_filter(
		&self,
		instance: &ash::Instance,
		physical_device: vk::PhysicalDevice,
		capabilities: &DeviceCapabilities,
	) -> Option<i32> {
		let properties = unsafe { instance.get_physical_device_properties(physical_device) };
		// device type dominates, capabilities only break ties
		Some(device_type_score(properties.device_type) * 4 + capabilities.mesh_shading as i32)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn discrete_before_integrated() {
		assert!(
			device_type_score(vk::PhysicalDeviceType::DISCRETE_GPU)
				> device_type_score(vk::PhysicalDeviceType::INTEGRATED_GPU)
		);
		assert_eq!(device_type_score(vk::PhysicalDeviceType::OTHER), 0);
	}
}
