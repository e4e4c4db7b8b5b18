use clap::Parser;
use std::path::PathBuf;

/// GPU driven culling renderer: scatters instances of the given meshes and culls them on the GPU every frame.
#[derive(Clone, Debug, Parser)]
#[command(version, about)]
pub struct CliArgs {
	/// OBJ meshes to instance, a procedural sphere is used if none are given
	pub meshes: Vec<PathBuf>,

	/// number of objects in the draw set
	#[arg(short = 'n', long, default_value_t = 100_000)]
	pub draw_count: u32,

	/// objects are placed within a sphere of this radius
	#[arg(long, default_value_t = 300.)]
	pub radius: f32,

	/// objects beyond this distance along the view axis are culled
	#[arg(long, default_value_t = 300.)]
	pub draw_distance: f32,

	#[arg(long, default_value_t = 42)]
	pub seed: u64,

	#[arg(long, default_value_t = 1920)]
	pub width: u32,

	#[arg(long, default_value_t = 1080)]
	pub height: u32,

	/// directory containing the compiled `sieve_shader.spv`
	#[arg(long, default_value = "target/spirv")]
	pub shader_dir: PathBuf,

	/// enable the Khronos validation layer
	#[arg(long)]
	pub validation: bool,

	#[arg(long)]
	pub vsync: bool,

	/// start with meshlet mesh shading instead of indexed draws
	#[arg(long)]
	pub mesh_shading: bool,
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn defaults_describe_the_reference_scene() -> anyhow::Result<()> {
		let args = CliArgs::try_parse_from(["sieve-renderer"])?;
		assert!(args.meshes.is_empty());
		assert_eq!(args.draw_count, 100_000);
		assert_eq!(args.radius, 300.);
		assert!(!args.mesh_shading);
		Ok(())
	}

	#[test]
	fn meshes_and_flags() -> anyhow::Result<()> {
		let args = CliArgs::try_parse_from(["sieve-renderer", "a.obj", "b.obj", "-n", "10", "--mesh-shading"])?;
		assert_eq!(args.meshes, vec![PathBuf::from("a.obj"), PathBuf::from("b.obj")]);
		assert_eq!(args.draw_count, 10);
		assert!(args.mesh_shading);
		Ok(())
	}
}
