use crate::cli_args::CliArgs;
use anyhow::Context;
use rayon::prelude::*;
use sieve_asset::geometry::GeometryCpu;
use sieve_asset::mesh::load::load_obj;
use sieve_asset::mesh::primitives::icosphere;
use sieve_asset::mesh::{ProcessSettings, RawMesh, process_mesh};
use sieve_asset::scene::{SceneSettings, random_draws};
use sieve_shader::renderer::draw::MeshDraw;

/// Subdivisions of the sphere used when no mesh is given.
const DEFAULT_SPHERE_SUBDIVISIONS: u32 = 4;

pub struct SceneCpu {
	pub geometry: GeometryCpu,
	pub draws: Vec<MeshDraw>,
}

/// Loads and processes all meshes in parallel, then scatters the draw set.
#[profiling::function]
pub fn load_scene(args: &CliArgs) -> anyhow::Result<SceneCpu> {
	let raw: Vec<RawMesh> = if args.meshes.is_empty() {
		log::info!("no meshes given, using a procedural sphere");
		vec![icosphere(DEFAULT_SPHERE_SUBDIVISIONS)]
	} else {
		args.meshes
			.par_iter()
			.map(|path| load_obj(path).with_context(|| format!("loading {path:?}")))
			.collect::<anyhow::Result<_>>()?
	};

	let settings = ProcessSettings::default();
	let processed = raw
		.into_par_iter()
		.map(|mesh| process_mesh(mesh, &settings))
		.collect::<Result<Vec<_>, _>>()?;

	let mut geometry = GeometryCpu::default();
	for mesh in &processed {
		geometry.push(mesh);
	}
	let draws = random_draws(&geometry.meshes, &SceneSettings {
		draw_count: args.draw_count,
		radius: args.radius,
		seed: args.seed,
		..SceneSettings::default()
	});
	Ok(SceneCpu { geometry, draws })
}

#[cfg(test)]
mod tests {
	use super::*;
	use clap::Parser;

	#[test]
	fn default_scene_uses_sphere() -> anyhow::Result<()> {
		let args = CliArgs::try_parse_from(["sieve-renderer", "-n", "500"])?;
		let scene = load_scene(&args)?;
		assert_eq!(scene.geometry.meshes.len(), 1);
		assert_eq!(scene.draws.len(), 500);
		assert!(scene.geometry.has_meshlets());
		assert!(scene.draws.iter().all(|d| d.position().length() <= args.radius + 1e-3));
		Ok(())
	}

	#[test]
	fn missing_mesh_is_an_error() -> anyhow::Result<()> {
		let args = CliArgs::try_parse_from(["sieve-renderer", "does/not/exist.obj"])?;
		let err = load_scene(&args).err().map(|e| format!("{e:#}"));
		assert!(err.is_some_and(|e| e.contains("exist.obj")));
		Ok(())
	}
}
