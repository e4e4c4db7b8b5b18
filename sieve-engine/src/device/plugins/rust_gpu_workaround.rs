use crate::device::init::Plugin;
use ash::{khr, vk};
use smallvec::{SmallVec, smallvec};
use std::ffi::CStr;

/// rust-gpu may emit non-semantic debug instructions.
pub struct RustGpuWorkaround;

impl Plugin for RustGpuWorkaround {
	fn device_extensions(&self, instance: &ash::Instance, physical_device: vk::PhysicalDevice) -> SmallVec<[&'static CStr; 2]> {
		let supported = unsafe { instance.enumerate_device_extension_properties(physical_device) }
			.unwrap_or_default()
			.iter()
			.any(|e| e.extension_name_as_c_str() == Ok(khr::shader_non_semantic_info::NAME));
		if supported {
			smallvec![khr::shader_non_semantic_info::NAME]
		} else {
			SmallVec::new()
		}
	}
}
