use core::f32::consts::TAU;
use glam::{Quat, Vec3};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use sieve_shader::renderer::draw::MeshDraw;
use sieve_shader::renderer::mesh::Mesh;

#[derive(Copy, Clone, Debug)]
pub struct SceneSettings {
	pub draw_count: u32,
	/// objects are placed uniformly within a sphere of this radius around the origin
	pub radius: f32,
	pub min_scale: f32,
	pub max_scale: f32,
	pub seed: u64,
}

impl Default for SceneSettings {
	fn default() -> Self {
		Self {
			draw_count: 100_000,
			radius: 300.,
			min_scale: 1.,
			max_scale: 2.,
			seed: 42,
		}
	}
}

/// Scatters randomly rotated and scaled instances of all meshes, deterministic for a given seed.
#[profiling::function]
pub fn random_draws(meshes: &[Mesh], settings: &SceneSettings) -> Vec<MeshDraw> {
	if meshes.is_empty() {
		return Vec::new();
	}
	let mut rng = StdRng::seed_from_u64(settings.seed);
	(0..settings.draw_count)
		.map(|_| {
			let mesh_index = rng.gen_range(0..meshes.len());
			let position = random_direction(&mut rng) * settings.radius * rng.gen_range(0f32..1.).cbrt();
			let rotation = Quat::from_axis_angle(random_direction(&mut rng), rng.gen_range(0. ..TAU));
			let scale = rng.gen_range(settings.min_scale..=settings.max_scale);
			MeshDraw::new(position, scale, rotation, mesh_index as u32, &meshes[mesh_index])
		})
		.collect()
}

fn random_direction(rng: &mut impl Rng) -> Vec3 {
	let z: f32 = rng.gen_range(-1. ..=1.);
	let phi: f32 = rng.gen_range(0. ..TAU);
	let r = (1. - z * z).max(0.).sqrt();
	Vec3::new(r * phi.cos(), r * phi.sin(), z)
}

#[cfg(test)]
mod tests {
	use super::*;
	use approx::assert_relative_eq;

	fn meshes() -> Vec<Mesh> {
		vec![
			Mesh {
				vertex_offset: 0,
				..Mesh::default()
			},
			Mesh {
				vertex_offset: 500,
				..Mesh::default()
			},
		]
	}

	#[test]
	fn draws_stay_within_radius() {
		let settings = SceneSettings {
			draw_count: 10_000,
			..SceneSettings::default()
		};
		let draws = random_draws(&meshes(), &settings);
		assert_eq!(draws.len(), 10_000);
		for draw in &draws {
			assert!(draw.position().length() <= settings.radius * 1.0001);
			assert!((settings.min_scale..=settings.max_scale).contains(&draw.scale));
			assert_relative_eq!(draw.rotation().length(), 1., epsilon = 1e-4);
			let expected_offset = if draw.mesh_index == 0 { 0 } else { 500 };
			assert_eq!(draw.vertex_offset, expected_offset);
		}
		assert!(draws.iter().any(|d| d.mesh_index == 1));
	}

	#[test]
	fn seed_is_deterministic() {
		let settings = SceneSettings {
			draw_count: 100,
			..SceneSettings::default()
		};
		assert_eq!(random_draws(&meshes(), &settings), random_draws(&meshes(), &settings));
		let other = SceneSettings { seed: 7, ..settings };
		assert_ne!(random_draws(&meshes(), &settings), random_draws(&meshes(), &other));
	}
}
