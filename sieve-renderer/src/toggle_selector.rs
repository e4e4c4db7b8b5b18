use sieve_engine::renderer::frame_config::FrameConfig;
use winit::event::{ElementState, KeyEvent, WindowEvent};
use winit::keyboard::KeyCode;
use winit::keyboard::PhysicalKey::Code;

/// Keyboard toggles of the renderer, snapshotted into a [`FrameConfig`] once per frame.
pub struct ToggleSelector {
	config: FrameConfig,
	mesh_shading_supported: bool,
}

impl ToggleSelector {
	pub fn new(config: FrameConfig, mesh_shading_supported: bool) -> Self {
		let mut this = Self {
			config,
			mesh_shading_supported,
		};
		this.config.mesh_shading &= mesh_shading_supported;
		this
	}

	pub fn config(&self) -> FrameConfig {
		self.config
	}

	pub fn handle_input(&mut self, event: &WindowEvent) {
		if let WindowEvent::KeyboardInput {
			event:
				KeyEvent {
					state: ElementState::Pressed,
					physical_key: Code(code),
					repeat: false,
					..
				},
			..
		} = event
		{
			if self.toggle(*code) {
				log::info!("{:?}", self.config);
			}
		}
	}

	/// Applies one key press, returns whether anything changed.
	pub fn toggle(&mut self, code: KeyCode) -> bool {
		let c = &mut self.config;
		match code {
			KeyCode::KeyR => {
				if !self.mesh_shading_supported {
					log::warn!("mesh shading is not supported on this device");
					return false;
				}
				c.mesh_shading = !c.mesh_shading;
			}
			KeyCode::KeyC => c.culling = !c.culling,
			KeyCode::KeyL => c.lod = !c.lod,
			KeyCode::KeyQ => c.queries = !c.queries,
			KeyCode::KeyP => c.pyramid_debug = !c.pyramid_debug,
			KeyCode::BracketLeft => c.pyramid_level = c.pyramid_level.saturating_sub(1),
			KeyCode::BracketRight => c.pyramid_level += 1,
			_ => return false,
		}
		true
	}

	/// Keeps the debug level inside the current pyramid, which shrinks on resize.
	pub fn clamp_pyramid_level(&mut self, levels: u32) {
		self.config.pyramid_level = self.config.clamped_pyramid_level(levels);
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn keys_flip_toggles() {
		let mut selector = ToggleSelector::new(FrameConfig::default(), true);
		assert!(selector.toggle(KeyCode::KeyC));
		assert!(selector.toggle(KeyCode::KeyL));
		assert!(selector.toggle(KeyCode::KeyR));
		assert!(selector.toggle(KeyCode::KeyP));
		assert!(selector.toggle(KeyCode::KeyQ));
		assert!(!selector.toggle(KeyCode::KeyX));
		let config = selector.config();
		assert!(!config.culling && !config.lod);
		assert!(config.mesh_shading && config.pyramid_debug);
		assert!(config.queries);
	}

	#[test]
	fn mesh_shading_stays_off_without_support() {
		let mut selector = ToggleSelector::new(
			FrameConfig {
				mesh_shading: true,
				..FrameConfig::default()
			},
			false,
		);
		assert!(!selector.config().mesh_shading);
		assert!(!selector.toggle(KeyCode::KeyR));
		assert!(!selector.config().mesh_shading);
	}

	#[test]
	fn pyramid_level_never_underflows_and_is_clamped() {
		let mut selector = ToggleSelector::new(FrameConfig::default(), false);
		selector.toggle(KeyCode::BracketLeft);
		assert_eq!(selector.config().pyramid_level, 0);
		for _ in 0..20 {
			selector.toggle(KeyCode::BracketRight);
		}
		selector.clamp_pyramid_level(11);
		assert_eq!(selector.config().pyramid_level, 10);
	}
}
