use crate::device::error::RenderError;
use crate::device::init::Init;
use ash::vk;
use sieve_shader::renderer::bindings::SHADER_MODULE;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub const SPIRV_MAGIC: u32 = 0x0723_0203;

/// The compiled `sieve-shader` crate, all entry points live in one module.
pub struct ShaderModule {
	init: Arc<Init>,
	module: vk::ShaderModule,
}

impl ShaderModule {
	#[profiling::function]
	pub fn load(init: &Arc<Init>, shader_dir: &Path) -> Result<Self, RenderError> {
		let path = shader_dir.join(SHADER_MODULE);
		let bytes = std::fs::read(&path).map_err(|source| RenderError::Io {
			path: path.clone(),
			source,
		})?;
		let code = parse_spirv(&path, &bytes)?;
		let module = unsafe {
			init.device
				.create_shader_module(&vk::ShaderModuleCreateInfo::default().code(&code), None)?
		};
		log::info!("loaded {:?} ({} words)", path, code.len());
		Ok(Self {
			init: init.clone(),
			module,
		})
	}

	pub fn handle(&self) -> vk::ShaderModule {
		self.module
	}
}

impl Drop for ShaderModule {
	fn drop(&mut self) {
		unsafe { self.init.device.destroy_shader_module(self.module, None) };
	}
}

/// Reads SPIR-V words, panics if the binary is malformed.
pub fn parse_spirv(path: &Path, bytes: &[u8]) -> Result<Vec<u32>, RenderError> {
	let code = ash::util::read_spv(&mut Cursor::new(bytes)).map_err(|source| RenderError::Io {
		path: PathBuf::from(path),
		source,
	})?;
	assert_eq!(code.first().copied(), Some(SPIRV_MAGIC), "{path:?} is not a SPIR-V binary");
	Ok(code)
}

#[cfg(test)]
mod tests {
	use super::*;

	fn words(words: &[u32]) -> Vec<u8> {
		words.iter().flat_map(|w| w.to_le_bytes()).collect()
	}

	#[test]
	fn parses_spirv_words() -> anyhow::Result<()> {
		let code = parse_spirv(Path::new("test.spv"), &words(&[SPIRV_MAGIC, 0x0001_0300, 0, 8, 0]))?;
		assert_eq!(code.len(), 5);
		Ok(())
	}

	#[test]
	#[should_panic(expected = "not a SPIR-V binary")]
	fn rejects_wrong_magic() {
		let _ = parse_spirv(Path::new("test.spv"), &words(&[0xdead_beef, 0]));
	}

	#[test]
	fn rejects_truncated_words() {
		assert!(parse_spirv(Path::new("test.spv"), &[3, 2, 35]).is_err());
	}
}
