use crate::mesh::{MeshError, RawMesh};
use core::mem::{offset_of, size_of};
use glam::Vec3;
use meshopt::{SimplifyOptions, VertexDataAdapter};
use rayon::prelude::*;
use rustc_hash::FxHashMap;
use sieve_shader::renderer::mesh::{MAX_LODS, MESHLET_MAX_TRIANGLES, MESHLET_MAX_VERTICES, Meshlet, Vertex};

#[derive(Copy, Clone, Debug)]
pub struct ProcessSettings {
	/// upper bound of LODs generated, LOD 0 included
	pub lod_count: usize,
	pub build_meshlets: bool,
	/// weight of normal cone tightness against meshlet compactness
	pub cone_weight: f32,
}

impl Default for ProcessSettings {
	fn default() -> Self {
		Self {
			lod_count: MAX_LODS,
			build_meshlets: true,
			cone_weight: 0.25,
		}
	}
}

/// One level of detail, indices and meshlet vertex indices are relative to [`ProcessedMesh::vertices`].
#[derive(Clone, Debug, Default)]
pub struct LodCpu {
	pub indices: Vec<u32>,
	/// `data_offset` is relative to [`Self::meshlet_data`]
	pub meshlets: Vec<Meshlet>,
	pub meshlet_data: Vec<u32>,
	pub error: f32,
}

#[derive(Clone, Debug, Default)]
pub struct ProcessedMesh {
	pub name: String,
	pub vertices: Vec<Vertex>,
	pub lods: Vec<LodCpu>,
	pub center: Vec3,
	pub radius: f32,
}

/// Deduplicates and optimizes the mesh, then derives the LOD chain and the meshlets of every LOD.
#[profiling::function]
pub fn process_mesh(raw: RawMesh, settings: &ProcessSettings) -> Result<ProcessedMesh, MeshError> {
	raw.validate()?;
	let (mut vertices, mut indices) = deduplicate(&raw.vertices, &raw.indices);

	{
		profiling::scope!("meshopt::optimize_vertex_cache");
		meshopt::optimize_vertex_cache_in_place(&mut indices, vertices.len());
	}
	{
		profiling::scope!("meshopt::optimize_vertex_fetch");
		let used = meshopt::optimize_vertex_fetch_in_place(&mut indices, &mut vertices);
		vertices.truncate(used);
	}

	let (center, radius) = bounding_sphere(&vertices);
	let lod_indices = simplify_lods(&vertices, indices, settings.lod_count.clamp(1, MAX_LODS))?;

	let lods = lod_indices
		.into_par_iter()
		.map(|(indices, error)| {
			let (meshlets, meshlet_data) = if settings.build_meshlets {
				build_meshlets(&vertices, &indices, settings.cone_weight)?
			} else {
				(Vec::new(), Vec::new())
			};
			Ok::<_, MeshError>(LodCpu {
				indices,
				meshlets,
				meshlet_data,
				error,
			})
		})
		.collect::<Result<Vec<_>, _>>()?;

	log::debug!(
		"processed {:?}: {} vertices, lod triangles {:?}",
		raw.name,
		vertices.len(),
		lods.iter().map(|l| l.indices.len() / 3).collect::<Vec<_>>()
	);
	Ok(ProcessedMesh {
		name: raw.name,
		vertices,
		lods,
		center,
		radius,
	})
}

fn vertex_adapter(vertices: &[Vertex]) -> Result<VertexDataAdapter<'_>, MeshError> {
	VertexDataAdapter::new(
		bytemuck::cast_slice(vertices),
		size_of::<Vertex>(),
		offset_of!(Vertex, position),
	)
	.map_err(|e| MeshError::VertexAdapter(format!("{e:?}")))
}

/// Merges bitwise identical vertices.
#[profiling::function]
pub fn deduplicate(vertices: &[Vertex], indices: &[u32]) -> (Vec<Vertex>, Vec<u32>) {
	let mut remap = FxHashMap::with_capacity_and_hasher(vertices.len(), Default::default());
	let mut unique = Vec::with_capacity(vertices.len());
	let indices = indices
		.iter()
		.map(|&i| {
			let vertex = vertices[i as usize];
			*remap.entry(bytemuck::cast::<Vertex, [u32; 5]>(vertex)).or_insert_with(|| {
				unique.push(vertex);
				unique.len() as u32 - 1
			})
		})
		.collect();
	(unique, indices)
}

/// Centroid of all vertices and the distance to the farthest one.
pub fn bounding_sphere(vertices: &[Vertex]) -> (Vec3, f32) {
	let center = vertices.iter().map(Vertex::position).sum::<Vec3>() / vertices.len().max(1) as f32;
	let radius = vertices
		.iter()
		.map(|v| v.position().distance(center))
		.fold(0., f32::max);
	(center, radius)
}

/// Each LOD targets 65% of the previous one's triangles. Errors accumulate over the chain and are scaled to
/// object space.
#[profiling::function]
fn simplify_lods(vertices: &[Vertex], indices: Vec<u32>, lod_count: usize) -> Result<Vec<(Vec<u32>, f32)>, MeshError> {
	let adapter = vertex_adapter(vertices)?;
	let scale = meshopt::simplify_scale(&adapter);
	let mut lods = vec![(indices, 0.)];
	let mut error = 0f32;

	while lods.len() < lod_count {
		let Some((prev, _)) = lods.last() else {
			break;
		};
		let target = (prev.len() as f64 * 0.65) as usize / 3 * 3;
		let mut next_error = 0.;
		let mut next = {
			profiling::scope!("meshopt::simplify");
			meshopt::simplify(
				prev,
				&adapter,
				target,
				1e-1,
				SimplifyOptions::empty(),
				Some(&mut next_error),
			)
		};
		// error bound reached, or too close to the previous LOD to be worth it
		if next.is_empty() || next.len() >= (prev.len() as f64 * 0.95) as usize {
			break;
		}

		meshopt::optimize_vertex_cache_in_place(&mut next, vertices.len());
		error = f32::max(error * 1.5, next_error);
		lods.push((next, error * scale));
	}
	Ok(lods)
}

/// Returns the meshlets and their packed data: vertex indices followed by triangle indices, four `u8` per word.
#[profiling::function]
pub fn build_meshlets(
	vertices: &[Vertex],
	indices: &[u32],
	cone_weight: f32,
) -> Result<(Vec<Meshlet>, Vec<u32>), MeshError> {
	let adapter = vertex_adapter(vertices)?;
	let out = {
		profiling::scope!("meshopt::build_meshlets");
		meshopt::build_meshlets(
			indices,
			&adapter,
			MESHLET_MAX_VERTICES as usize,
			MESHLET_MAX_TRIANGLES as usize,
			cone_weight,
		)
	};

	let mut meshlets = Vec::with_capacity(out.meshlets.len());
	let mut data = Vec::new();
	for m in out.iter() {
		let bounds = meshopt::compute_meshlet_bounds(m, &adapter);
		let triangle_count = m.triangles.len() / 3;
		meshlets.push(Meshlet {
			center: bounds.center,
			radius: bounds.radius,
			cone: Meshlet::pack_cone(bounds.cone_axis_s8, bounds.cone_cutoff_s8),
			data_offset: data.len() as u32,
			vertex_count: m.vertices.len() as u32,
			triangle_count: triangle_count as u32,
		});
		data.extend_from_slice(m.vertices);
		data.extend(m.triangles[..triangle_count * 3].chunks(4).map(|c| {
			let mut word = [0u8; 4];
			word[..c.len()].copy_from_slice(c);
			u32::from_le_bytes(word)
		}));
	}
	Ok((meshlets, data))
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::mesh::primitives::icosphere;
	use rustc_hash::FxHashSet;
	use sieve_shader::renderer::mesh::load_triangle;

	fn sorted_triangles(triangles: impl Iterator<Item = [u32; 3]>) -> Vec<[u32; 3]> {
		let mut triangles = triangles
			.map(|t| {
				// rotate the smallest index first, keeping the winding
				let min = (0..3).min_by_key(|&i| t[i]).unwrap_or(0);
				[t[min], t[(min + 1) % 3], t[(min + 2) % 3]]
			})
			.collect::<Vec<_>>();
		triangles.sort_unstable();
		triangles
	}

	#[test]
	fn deduplicate_merges_identical_vertices() {
		let a = Vertex::new(Vec3::X, Vec3::Y, Default::default());
		let b = Vertex::new(Vec3::Z, Vec3::Y, Default::default());
		let (vertices, indices) = deduplicate(&[a, b, a, b], &[0, 1, 2, 3, 2, 1]);
		assert_eq!(vertices, vec![a, b]);
		assert_eq!(indices, vec![0, 1, 0, 1, 0, 1]);
	}

	#[test]
	fn lod_chain_gets_coarser() -> anyhow::Result<()> {
		let mesh = process_mesh(icosphere(4), &ProcessSettings::default())?;
		assert!(mesh.lods.len() > 1, "a dense sphere must simplify");
		assert!(mesh.lods.len() <= MAX_LODS);
		assert_eq!(mesh.lods[0].error, 0.);
		for pair in mesh.lods.windows(2) {
			assert!(pair[1].indices.len() < pair[0].indices.len());
			assert!(pair[1].error >= pair[0].error);
		}
		for lod in &mesh.lods {
			assert!(lod.indices.iter().all(|&i| (i as usize) < mesh.vertices.len()));
		}
		Ok(())
	}

	#[test]
	fn bounding_sphere_contains_all_vertices() -> anyhow::Result<()> {
		let mesh = process_mesh(icosphere(3), &ProcessSettings::default())?;
		assert!(mesh.center.length() < 1e-3);
		for v in &mesh.vertices {
			assert!(v.position().distance(mesh.center) <= mesh.radius + 1e-5);
		}
		Ok(())
	}

	#[test]
	fn meshlets_reproduce_the_lod_triangles() -> anyhow::Result<()> {
		let mesh = process_mesh(icosphere(3), &ProcessSettings::default())?;
		for lod in &mesh.lods {
			let mut meshlet_triangles = Vec::new();
			let mut data_end = 0;
			for meshlet in &lod.meshlets {
				assert!(meshlet.vertex_count <= MESHLET_MAX_VERTICES);
				assert!(meshlet.triangle_count <= MESHLET_MAX_TRIANGLES);
				assert_eq!(meshlet.data_offset, data_end, "meshlet data must be tightly packed");
				data_end += meshlet.data_len();

				let local_vertices = &lod.meshlet_data[meshlet.data_offset as usize..][..meshlet.vertex_count as usize];
				for t in 0..meshlet.triangle_count {
					let local = load_triangle(meshlet, t, |w| lod.meshlet_data[w as usize]);
					meshlet_triangles.push(local.map(|i| local_vertices[i as usize]));
				}
			}
			assert_eq!(data_end as usize, lod.meshlet_data.len());

			let lod_triangles = lod.indices.chunks_exact(3).map(|t| [t[0], t[1], t[2]]);
			assert_eq!(sorted_triangles(meshlet_triangles.into_iter()), sorted_triangles(lod_triangles));
		}
		Ok(())
	}

	#[test]
	fn meshlet_bounds_cover_their_vertices() -> anyhow::Result<()> {
		let mesh = process_mesh(icosphere(2), &ProcessSettings::default())?;
		let lod = &mesh.lods[0];
		let mut seen = FxHashSet::default();
		for meshlet in &lod.meshlets {
			let vertices = &lod.meshlet_data[meshlet.data_offset as usize..][..meshlet.vertex_count as usize];
			for &v in vertices {
				seen.insert(v);
				let distance = mesh.vertices[v as usize].position().distance(meshlet.center());
				assert!(distance <= meshlet.radius * 1.001 + 1e-5);
			}
		}
		assert_eq!(seen.len(), mesh.vertices.len());
		Ok(())
	}

	#[test]
	fn meshlets_can_be_skipped() -> anyhow::Result<()> {
		let settings = ProcessSettings {
			lod_count: 1,
			build_meshlets: false,
			..ProcessSettings::default()
		};
		let mesh = process_mesh(icosphere(1), &settings)?;
		assert_eq!(mesh.lods.len(), 1);
		assert!(mesh.lods[0].meshlets.is_empty());
		Ok(())
	}
}
