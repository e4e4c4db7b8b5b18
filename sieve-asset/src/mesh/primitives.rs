use crate::mesh::RawMesh;
use core::f32::consts::{PI, TAU};
use glam::{Vec2, Vec3};
use rustc_hash::FxHashMap;
use sieve_shader::renderer::mesh::Vertex;

/// Unit icosphere, each subdivision quadruples the triangle count.
pub fn icosphere(subdivisions: u32) -> RawMesh {
	let t = (1. + 5f32.sqrt()) / 2.;
	let mut positions = [
		[-1., t, 0.],
		[1., t, 0.],
		[-1., -t, 0.],
		[1., -t, 0.],
		[0., -1., t],
		[0., 1., t],
		[0., -1., -t],
		[0., 1., -t],
		[t, 0., -1.],
		[t, 0., 1.],
		[-t, 0., -1.],
		[-t, 0., 1.],
	]
	.map(|p| Vec3::from(p).normalize())
	.to_vec();
	let mut indices: Vec<u32> = vec![
		0, 11, 5, 0, 5, 1, 0, 1, 7, 0, 7, 10, 0, 10, 11, 1, 5, 9, 5, 11, 4, 11, 10, 2, 10, 7, 6, 7, 1, 8, 3, 9, 4, 3, 4,
		2, 3, 2, 6, 3, 6, 8, 3, 8, 9, 4, 9, 5, 2, 4, 11, 6, 2, 10, 8, 6, 7, 9, 8, 1,
	];

	for _ in 0..subdivisions {
		let mut midpoints = FxHashMap::default();
		let mut midpoint = |a: u32, b: u32| {
			let key = (u32::min(a, b), u32::max(a, b));
			*midpoints.entry(key).or_insert_with(|| {
				positions.push(((positions[a as usize] + positions[b as usize]) * 0.5).normalize());
				positions.len() as u32 - 1
			})
		};
		indices = indices
			.chunks_exact(3)
			.flat_map(|tri| {
				let [a, b, c] = [tri[0], tri[1], tri[2]];
				let (ab, bc, ca) = (midpoint(a, b), midpoint(b, c), midpoint(c, a));
				[a, ab, ca, b, bc, ab, c, ca, bc, ab, bc, ca]
			})
			.collect();
	}

	let vertices = positions
		.iter()
		.map(|&p| {
			let uv = Vec2::new(0.5 + p.z.atan2(p.x) / TAU, 0.5 - p.y.asin() / PI);
			Vertex::new(p, p, uv)
		})
		.collect();
	RawMesh {
		name: format!("icosphere{subdivisions}"),
		vertices,
		indices,
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use approx::assert_relative_eq;

	#[test]
	fn subdivision_counts() -> anyhow::Result<()> {
		for subdivisions in 0..4 {
			let mesh = icosphere(subdivisions);
			mesh.validate()?;
			assert_eq!(mesh.triangle_count(), 20 * 4usize.pow(subdivisions));
			// closed genus 0 surface: V = F / 2 + 2
			assert_eq!(mesh.vertices.len(), mesh.triangle_count() / 2 + 2);
		}
		Ok(())
	}

	#[test]
	fn vertices_on_unit_sphere_with_outward_winding() {
		let mesh = icosphere(2);
		for v in &mesh.vertices {
			assert_relative_eq!(v.position().length(), 1., epsilon = 1e-5);
		}
		for tri in mesh.indices.chunks_exact(3) {
			let [a, b, c] = [tri[0], tri[1], tri[2]].map(|i| mesh.vertices[i as usize].position());
			assert!((b - a).cross(c - a).dot(a) > 0., "triangles must wind counter clockwise from outside");
		}
	}
}
