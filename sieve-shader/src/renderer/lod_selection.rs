use crate::renderer::mesh::Mesh;
use glam::Vec3;

/// Allowed screen space deviation of a simplified LOD, in pixels.
pub const LOD_PIXEL_THRESHOLD: f32 = 1.;

/// Object space error per unit of distance that projects to [`LOD_PIXEL_THRESHOLD`] pixels.
pub fn lod_target(p11: f32, viewport_height: f32) -> f32 {
	(2. / p11) * (1. / viewport_height) * LOD_PIXEL_THRESHOLD
}

/// Selects the coarsest LOD whose error stays under the threshold at the sphere's nearest distance.
///
/// `center` is in view space, `radius` and `scale` in world units.
pub fn select_lod(mesh: &Mesh, center: Vec3, radius: f32, scale: f32, lod_target: f32) -> u32 {
	let distance = f32::max(center.length() - radius, 0.);
	let threshold = distance * lod_target / scale;
	let mut lod_index = 0;
	for i in 1..mesh.lod_count {
		if mesh.lods[i as usize].error < threshold {
			lod_index = i;
		}
	}
	lod_index
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::renderer::mesh::MeshLod;

	fn mesh() -> Mesh {
		let mut mesh = Mesh {
			lod_count: 4,
			..Mesh::default()
		};
		for (i, error) in [0., 0.01, 0.05, 0.2].into_iter().enumerate() {
			mesh.lods[i] = MeshLod {
				error,
				..MeshLod::default()
			};
		}
		mesh
	}

	#[test]
	fn coarser_with_distance() {
		let mesh = mesh();
		let target = lod_target(1.428, 1080.);
		let mut last = 0;
		for distance in [1., 10., 50., 100., 300., 1000., 10000.] {
			let lod = select_lod(&mesh, Vec3::new(0., 0., -distance), 1., 1., target);
			assert!(lod >= last, "lod must not get finer with distance");
			last = lod;
		}
		assert_eq!(select_lod(&mesh, Vec3::new(0., 0., -1.), 1., 1., target), 0);
		assert_eq!(last, 3);
	}

	#[test]
	fn camera_inside_sphere_uses_full_detail() {
		let mesh = mesh();
		assert_eq!(select_lod(&mesh, Vec3::new(0., 0., -0.5), 1., 1., 1.), 0);
	}

	#[test]
	fn larger_objects_stay_detailed_longer() {
		let mesh = mesh();
		let target = lod_target(1.428, 1080.);
		let center = Vec3::new(0., 0., -200.);
		assert!(select_lod(&mesh, center, 1., 10., target) < select_lod(&mesh, center, 1., 1., target));
	}
}
