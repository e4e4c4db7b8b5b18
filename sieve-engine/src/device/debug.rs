use crate::device::error::RenderError;
use ash::{ext, vk};
use std::ffi::c_void;

/// Routes validation and driver messages into `log`.
pub struct Debug {
	loader: ext::debug_utils::Instance,
	messenger: vk::DebugUtilsMessengerEXT,
}

impl Debug {
	pub fn new(entry: &ash::Entry, instance: &ash::Instance) -> Result<Self, RenderError> {
		let loader = ext::debug_utils::Instance::new(entry, instance);
		let create_info = vk::DebugUtilsMessengerCreateInfoEXT::default()
			.message_severity(
				vk::DebugUtilsMessageSeverityFlagsEXT::ERROR
					| vk::DebugUtilsMessageSeverityFlagsEXT::WARNING
					| vk::DebugUtilsMessageSeverityFlagsEXT::INFO,
			)
			.message_type(
				vk::DebugUtilsMessageTypeFlagsEXT::GENERAL
					| vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION
					| vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE,
			)
			.pfn_user_callback(Some(debug_message));
		// SAFETY: the callback makes no vulkan calls
		let messenger = unsafe { loader.create_debug_utils_messenger(&create_info, None)? };
		Ok(Self { loader, messenger })
	}

	/// # Safety
	/// Must be called once, before the instance is destroyed.
	pub unsafe fn destroy(&mut self) {
		unsafe { self.loader.destroy_debug_utils_messenger(self.messenger, None) };
	}
}

pub fn debug_severity_level(severity: vk::DebugUtilsMessageSeverityFlagsEXT) -> log::Level {
	if severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::ERROR) {
		log::Level::Error
	} else if severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::WARNING) {
		log::Level::Warn
	} else if severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::INFO) {
		log::Level::Debug
	} else {
		log::Level::Trace
	}
}

pub fn debug_type_string(ty: vk::DebugUtilsMessageTypeFlagsEXT) -> &'static str {
	if ty.contains(vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION) {
		"Validation"
	} else if ty.contains(vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE) {
		"Performance"
	} else {
		"General"
	}
}

unsafe extern "system" fn debug_message(
	severity: vk::DebugUtilsMessageSeverityFlagsEXT,
	ty: vk::DebugUtilsMessageTypeFlagsEXT,
	data: *const vk::DebugUtilsMessengerCallbackDataEXT<'_>,
	_user_data: *mut c_void,
) -> vk::Bool32 {
	// SAFETY: the pointer is valid for the duration of the callback
	let message = unsafe { data.as_ref() }
		.and_then(|data| unsafe { data.message_as_c_str() })
		.map(|m| m.to_string_lossy())
		.unwrap_or_default();
	log::log!(target: "vulkan", debug_severity_level(severity), "({}) {}", debug_type_string(ty), message);
	vk::FALSE
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn severity_maps_to_log_level() {
		assert_eq!(debug_severity_level(vk::DebugUtilsMessageSeverityFlagsEXT::ERROR), log::Level::Error);
		assert_eq!(debug_severity_level(vk::DebugUtilsMessageSeverityFlagsEXT::WARNING), log::Level::Warn);
		assert_eq!(debug_severity_level(vk::DebugUtilsMessageSeverityFlagsEXT::INFO), log::Level::Debug);
		assert_eq!(debug_severity_level(vk::DebugUtilsMessageSeverityFlagsEXT::VERBOSE), log::Level::Trace);
		assert_eq!(debug_type_string(vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION), "Validation");
	}
}
