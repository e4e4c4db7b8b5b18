use sieve_shader::renderer::frame_data::CullFlags;

/// User toggles, snapshotted once per frame.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct FrameConfig {
	/// meshlet task and mesh shading instead of indexed draws, ignored without device support
	pub mesh_shading: bool,
	/// occlusion culling against the previous frame's depth, plus meshlet cone and frustum culling
	pub culling: bool,
	pub lod: bool,
	/// timestamps and pipeline statistics, off by default
	pub queries: bool,
	/// show a level of the depth pyramid instead of the scene
	pub pyramid_debug: bool,
	pub pyramid_level: u32,
}

impl Default for FrameConfig {
	fn default() -> Self {
		Self {
			mesh_shading: false,
			culling: true,
			lod: true,
			queries: false,
			pyramid_debug: false,
			pyramid_level: 0,
		}
	}
}

impl FrameConfig {
	/// Shader flags for this frame, `pyramid_valid` tells whether the pyramid holds the previous frame.
	pub fn cull_flags(&self, pyramid_valid: bool) -> CullFlags {
		let mut flags = CullFlags::empty();
		flags.set(CullFlags::CULLING, self.culling);
		flags.set(CullFlags::MESHLET_CULLING, self.culling);
		flags.set(CullFlags::LOD, self.lod);
		flags.set(CullFlags::PYRAMID_VALID, pyramid_valid);
		flags
	}

	/// Clamps the debug level into the pyramid's level range.
	pub fn clamped_pyramid_level(&self, levels: u32) -> u32 {
		self.pyramid_level.min(levels.saturating_sub(1))
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn toggles_map_to_flags() {
		let config = FrameConfig::default();
		assert_eq!(
			config.cull_flags(true),
			CullFlags::CULLING | CullFlags::MESHLET_CULLING | CullFlags::LOD | CullFlags::PYRAMID_VALID
		);
		let config = FrameConfig {
			culling: false,
			lod: false,
			..config
		};
		assert_eq!(config.cull_flags(false), CullFlags::empty());
	}

	#[test]
	fn queries_start_disabled() {
		let config = FrameConfig::default();
		assert!(!config.queries);
		assert!(config.culling && config.lod);
		assert!(!config.mesh_shading && !config.pyramid_debug);
	}

	#[test]
	fn pyramid_level_is_clamped() {
		let config = FrameConfig {
			pyramid_level: 12,
			..FrameConfig::default()
		};
		assert_eq!(config.clamped_pyramid_level(10), 9);
		assert_eq!(config.clamped_pyramid_level(0), 0);
	}
}
