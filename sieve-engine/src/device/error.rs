use ash::vk;
use std::path::PathBuf;
use thiserror::Error;

/// Errors of device setup and of the frame loop, all of them fatal to the renderer.
#[derive(Debug, Error)]
pub enum RenderError {
	#[error("failed to load the vulkan library")]
	Loading(#[from] ash::LoadingError),
	#[error("no physical device satisfies all requirements")]
	NoSuitableDevice,
	#[error("surface reports no formats")]
	NoSurfaceFormat,
	#[error("device does not support {0}")]
	MissingFeature(&'static str),
	#[error("vulkan call failed: {0}")]
	Vulkan(#[from] vk::Result),
	#[error("allocation failed")]
	Allocation(#[from] gpu_allocator::AllocationError),
	#[error("failed to read {path:?}")]
	Io {
		path: PathBuf,
		#[source]
		source: std::io::Error,
	},
	#[error("frame reached submission without an acquired swapchain image")]
	NoSwapchainImage,
	#[error("window handle unavailable")]
	Window(#[from] raw_window_handle::HandleError),
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn frame_loop_failures_convert() {
		let lost: RenderError = vk::Result::ERROR_DEVICE_LOST.into();
		assert!(matches!(lost, RenderError::Vulkan(vk::Result::ERROR_DEVICE_LOST)));
		assert!(lost.to_string().starts_with("vulkan call failed"));
		assert!(RenderError::NoSwapchainImage.to_string().contains("swapchain image"));
	}
}
