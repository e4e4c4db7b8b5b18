use ash::vk;

#[derive(Copy, Clone, Debug, Ord, PartialOrd, Eq, PartialEq)]
pub struct ApplicationVersion {
	pub major: u32,
	pub minor: u32,
	pub patch: u32,
}

impl ApplicationVersion {
	/// Parses a `major.minor.patch` version string at compile time, panics on malformed input.
	pub const fn parse(version: &str) -> Self {
		let bytes = version.as_bytes();
		let mut parts = [0u32; 3];
		let mut part = 0;
		let mut i = 0;
		while i < bytes.len() {
			let b = bytes[i];
			if b == b'.' {
				part += 1;
				assert!(part < 3, "version has more than 3 components");
			} else if b == b'-' || b == b'+' {
				break;
			} else {
				assert!(b.is_ascii_digit(), "version component is not a number");
				parts[part] = parts[part] * 10 + (b - b'0') as u32;
			}
			i += 1;
		}
		Self {
			major: parts[0],
			minor: parts[1],
			patch: parts[2],
		}
	}

	pub fn to_vk(self) -> u32 {
		vk::make_api_version(0, self.major, self.minor, self.patch)
	}
}

#[derive(Copy, Clone, Debug)]
pub struct ApplicationConfig {
	pub name: &'static str,
	pub version: ApplicationVersion,
}

/// An [`ApplicationConfig`] named and versioned after the calling crate.
#[macro_export]
macro_rules! generate_application_config {
	() => {
		$crate::application_config::ApplicationConfig {
			name: env!("CARGO_PKG_NAME"),
			version: $crate::application_config::ApplicationVersion::parse(env!("CARGO_PKG_VERSION")),
		}
	};
}

pub const ENGINE_APPLICATION_CONFIG: ApplicationConfig = generate_application_config!();

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn parse_versions() {
		let v = ApplicationVersion::parse("1.22.333");
		assert_eq!((v.major, v.minor, v.patch), (1, 22, 333));
		let v = ApplicationVersion::parse("0.4.0-alpha.1");
		assert_eq!((v.major, v.minor, v.patch), (0, 4, 0));
		assert_eq!(ApplicationVersion::parse("0.1.0").to_vk(), vk::make_api_version(0, 0, 1, 0));
		assert_eq!(ENGINE_APPLICATION_CONFIG.name, "sieve-engine");
	}
}
