use crate::renderer::bindings::draw_cull as bindings;
use crate::renderer::depth_pyramid::{DepthPyramid, DepthPyramidGpu};
use crate::renderer::draw::{MeshDraw, MeshDrawCommand};
use crate::renderer::frame_data::{CullFlags, FrameData};
use crate::renderer::lod_selection::select_lod;
use crate::renderer::mesh::Mesh;
use glam::{UVec2, UVec3, Vec2, Vec3, Vec4, Vec4Swizzles};
use spirv_std::arch::atomic_i_add;
use spirv_std::image::Image2d;
use spirv_std::memory::{Scope, Semantics};
use spirv_std::spirv;
use static_assertions::const_assert_eq;

#[cfg(target_arch = "spirv")]
use spirv_std::num_traits::Float;

pub const DRAW_CULL_WG_SIZE: u32 = 64;

pub fn dispatch_groups(draw_count: u32) -> u32 {
	draw_count.div_ceil(DRAW_CULL_WG_SIZE)
}

/// Screen space bounds of a projected sphere as `(min_u, min_v, max_u, max_v)` in `[0, 1]` uv space.
#[derive(Copy, Clone)]
#[cfg_attr(not(target_arch = "spirv"), derive(Debug))]
pub struct SphereBounds {
	/// false if the sphere intersects the near plane and has no finite bounds
	pub valid: bool,
	pub uv: Vec4,
}

/// Projects a view space sphere with the 2D polyhedral bounds of Mara and McGuire.
pub fn project_sphere(center: Vec3, radius: f32, znear: f32, p00: f32, p11: f32) -> SphereBounds {
	// distance along the view axis, view space looks down -Z
	let c = Vec3::new(center.x, center.y, -center.z);
	if c.z < radius + znear {
		return SphereBounds {
			valid: false,
			uv: Vec4::ZERO,
		};
	}

	let bounds = |cx: Vec2| {
		let v = Vec2::new(f32::sqrt(cx.dot(cx) - radius * radius), radius);
		let min = Vec2::new(v.x * cx.x - v.y * cx.y, v.y * cx.x + v.x * cx.y);
		let max = Vec2::new(v.x * cx.x + v.y * cx.y, -v.y * cx.x + v.x * cx.y);
		Vec2::new(min.x / min.y, max.x / max.y)
	};
	let x = bounds(-Vec2::new(c.x, c.z)) * p00;
	let y = bounds(-Vec2::new(c.y, c.z)) * p11;

	// clip space to uv, v points down
	SphereBounds {
		valid: true,
		uv: Vec4::new(x.x, y.y, x.y, y.x) * Vec4::new(0.5, -0.5, 0.5, -0.5) + Vec4::splat(0.5),
	}
}

/// Number of render pixels along one axis that level `level` of the pyramid still covers. Pyramid levels drop
/// trailing odd texels, so the right and bottom border may not be represented on coarse levels.
fn covered_pixels(pyramid_extent: u32, level: u32) -> u32 {
	let last_full = u32::min(level, 31 - pyramid_extent.leading_zeros());
	(pyramid_extent >> last_full) << (last_full + 1)
}

/// Tests a view space sphere against the previous frame's depth pyramid.
///
/// Samples the four corners of the projected rectangle on the level where the rectangle spans at most 2x2 texels
/// and compares the nearest depth of the sphere against the farthest of them.
pub fn occluded(frame: &FrameData, pyramid: &impl DepthPyramid, center: Vec3, radius: f32) -> bool {
	let camera = &frame.camera;
	let bounds = project_sphere(center, radius, camera.znear, camera.p00, camera.p11);
	if !bounds.valid {
		return false;
	}

	let render = frame.render_extent();
	let render_max = (render - UVec2::ONE).as_vec2();
	let min_px = (bounds.uv.xy() * render.as_vec2()).floor().clamp(Vec2::ZERO, render_max).as_uvec2();
	let max_px = (bounds.uv.zw() * render.as_vec2()).floor().clamp(Vec2::ZERO, render_max).as_uvec2();

	// smallest level whose texels span 2^(level + 1) >= extent pixels
	let extent = (max_px - min_px + UVec2::ONE).max_element();
	let ceil_log2 = u32::BITS - (extent - 1).leading_zeros();
	let level = u32::min(ceil_log2.saturating_sub(1), pyramid.levels() - 1);

	let base = pyramid.level_extent(0);
	if max_px.x >= covered_pixels(base.x, level) || max_px.y >= covered_pixels(base.y, level) {
		return false;
	}

	let level_max = pyramid.level_extent(level) - UVec2::ONE;
	let t0 = UVec2::min(min_px >> (level + 1), level_max);
	let t1 = UVec2::min(max_px >> (level + 1), level_max);
	let farthest = f32::min(
		f32::min(pyramid.load(level, t0), pyramid.load(level, UVec2::new(t1.x, t0.y))),
		f32::min(pyramid.load(level, UVec2::new(t0.x, t1.y)), pyramid.load(level, t1)),
	);

	let nearest_depth = camera.depth_at(-center.z - radius);
	nearest_depth < farthest
}

#[derive(Copy, Clone)]
#[cfg_attr(not(target_arch = "spirv"), derive(Debug))]
pub struct DrawVisibility {
	pub visible: bool,
	pub lod_index: u32,
}

/// Frustum, draw distance and occlusion tests followed by LOD selection for one draw.
pub fn cull_draw(frame: &FrameData, draw: &MeshDraw, mesh: &Mesh, pyramid: &impl DepthPyramid) -> DrawVisibility {
	let camera = &frame.camera;
	let center = camera.view_space(draw.transform_point(mesh.center()));
	let radius = mesh.radius * draw.scale;
	let frustum = frame.frustum();
	let flags = frame.flags();

	let mut visible = !frustum.outside_view(center, radius) && !frustum.beyond_draw_distance(center, radius);
	if visible && flags.contains(CullFlags::CULLING | CullFlags::PYRAMID_VALID) {
		visible = !occluded(frame, pyramid, center, radius);
	}

	let lod_index = if visible && flags.contains(CullFlags::LOD) {
		select_lod(mesh, center, radius, draw.scale, frame.lod_target)
	} else {
		0
	};
	DrawVisibility { visible, lod_index }
}

const_assert_eq!(bindings::FRAME_DATA, 0);
const_assert_eq!(bindings::DRAWS, 1);
const_assert_eq!(bindings::MESHES, 2);
const_assert_eq!(bindings::COMMANDS, 3);
const_assert_eq!(bindings::DRAW_COUNT, 4);
const_assert_eq!(bindings::DEPTH_PYRAMID, 5);
const_assert_eq!(DRAW_CULL_WG_SIZE, 64);
#[spirv(compute(threads(64)))]
pub fn draw_cull_cs(
	#[spirv(global_invocation_id)] gid: UVec3,
	#[spirv(storage_buffer, descriptor_set = 0, binding = 0)] frame_data: &FrameData,
	#[spirv(storage_buffer, descriptor_set = 0, binding = 1)] draws: &[MeshDraw],
	#[spirv(storage_buffer, descriptor_set = 0, binding = 2)] meshes: &[Mesh],
	#[spirv(storage_buffer, descriptor_set = 0, binding = 3)] commands: &mut [MeshDrawCommand],
	#[spirv(storage_buffer, descriptor_set = 0, binding = 4)] draw_count: &mut u32,
	#[spirv(descriptor_set = 0, binding = 5)] depth_pyramid: &Image2d,
) {
	let draw_id = gid.x;
	if draw_id >= frame_data.draw_count {
		return;
	}

	let draw = draws[draw_id as usize];
	let mesh = meshes[draw.mesh_index as usize];
	let pyramid = DepthPyramidGpu {
		image: depth_pyramid,
		extent: UVec2::from(frame_data.pyramid_extent),
		levels: frame_data.pyramid_levels,
	};
	let visibility = cull_draw(frame_data, &draw, &mesh, &pyramid);
	if visibility.visible {
		let slot = unsafe { atomic_i_add::<_, { Scope::Device as u32 }, { Semantics::NONE.bits() }>(draw_count, 1) };
		commands[slot as usize] = MeshDrawCommand::new(draw_id, &draw, &mesh, visibility.lod_index);
	}
}

/// Runs the culling stage on the host, one rayon task per draw. Command order is unspecified, as on the GPU.
#[cfg(not(target_arch = "spirv"))]
pub fn draw_cull_cpu(
	frame: &FrameData,
	draws: &[MeshDraw],
	meshes: &[Mesh],
	pyramid: &(impl DepthPyramid + Sync),
) -> Vec<MeshDrawCommand> {
	use rayon::prelude::*;

	let draw_count = usize::min(frame.draw_count as usize, draws.len());
	let commands: Vec<_> = draws[..draw_count]
		.par_iter()
		.enumerate()
		.filter_map(|(draw_id, draw)| {
			let mesh = &meshes[draw.mesh_index as usize];
			let visibility = cull_draw(frame, draw, mesh, pyramid);
			visibility
				.visible
				.then(|| MeshDrawCommand::new(draw_id as u32, draw, mesh, visibility.lod_index))
		})
		.collect();
	assert!(commands.len() <= draw_count, "draw command buffer overflow");
	commands
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::renderer::camera::Camera;
	use crate::renderer::depth_pyramid::DepthPyramidCpu;
	use crate::renderer::mesh::MeshLod;
	use approx::assert_relative_eq;
	use glam::{Affine3A, Quat};
	use rand::rngs::StdRng;
	use rand::{Rng, SeedableRng};
	use std::collections::HashSet;

	const RENDER: UVec2 = UVec2::new(320, 180);
	const DRAW_DISTANCE: f32 = 300.;

	fn unit_mesh() -> Mesh {
		let mut mesh = Mesh {
			center: [0.; 3],
			radius: 1.,
			vertex_count: 24,
			lod_count: 3,
			..Mesh::default()
		};
		for (i, error) in [0., 0.02, 0.1].into_iter().enumerate() {
			mesh.lods[i] = MeshLod {
				index_offset: i as u32 * 100,
				index_count: 100 >> i,
				meshlet_offset: i as u32 * 4,
				meshlet_count: 4 >> i,
				error,
			};
		}
		mesh
	}

	fn frame(view: Affine3A, draw_count: u32, flags: CullFlags) -> FrameData {
		let camera = Camera::new(RENDER, 70f32.to_radians(), 0.1, view);
		FrameData::new(camera, DRAW_DISTANCE, RENDER, draw_count, flags)
	}

	fn look_at(eye: Vec3, target: Vec3) -> Affine3A {
		Affine3A::look_at_rh(eye, target, Vec3::Y)
	}

	fn random_draws(rng: &mut StdRng, count: usize, radius: f32, mesh: &Mesh) -> Vec<MeshDraw> {
		(0..count)
			.map(|_| {
				let position = loop {
					let p = Vec3::new(
						rng.gen_range(-radius..radius),
						rng.gen_range(-radius..radius),
						rng.gen_range(-radius..radius),
					);
					if p.length() <= radius {
						break p;
					}
				};
				let rotation = Quat::from_axis_angle(
					Vec3::new(rng.gen_range(-1.0..1.0), rng.gen_range(-1.0..1.0), 1.).normalize(),
					rng.gen_range(0.0..std::f32::consts::TAU),
				);
				MeshDraw::new(position, rng.gen_range(1.0..2.0), rotation, 0, mesh)
			})
			.collect()
	}

	/// Depth buffer with a wall covering the whole screen at `distance` along the view axis.
	fn wall(frame: &FrameData, distance: f32) -> DepthPyramidCpu {
		let depth = vec![frame.camera.depth_at(distance); (RENDER.x * RENDER.y) as usize];
		DepthPyramidCpu::build(&depth, RENDER)
	}

	#[test]
	fn projected_bounds_contain_center() {
		let camera = Camera::new(RENDER, 70f32.to_radians(), 0.1, Affine3A::IDENTITY);
		for center in [Vec3::new(0., 0., -10.), Vec3::new(3., -2., -20.), Vec3::new(-5., 4., -8.)] {
			let bounds = project_sphere(center, 1., camera.znear, camera.p00, camera.p11);
			assert!(bounds.valid);
			let clip = camera.clip_space(center);
			let uv = Vec2::new(clip.x / clip.w * 0.5 + 0.5, -clip.y / clip.w * 0.5 + 0.5);
			assert!(bounds.uv.x < uv.x && uv.x < bounds.uv.z, "{bounds:?} {uv}");
			assert!(bounds.uv.y < uv.y && uv.y < bounds.uv.w, "{bounds:?} {uv}");
		}

		let bounds = project_sphere(Vec3::new(0., 0., -10.), 1., camera.znear, camera.p00, camera.p11);
		let half_width = (bounds.uv.z - bounds.uv.x) / 2.;
		assert_relative_eq!(half_width, 0.5 * camera.p00 / f32::sqrt(99.), epsilon = 1e-5);
	}

	#[test]
	fn sphere_crossing_near_plane_has_no_bounds() {
		assert!(!project_sphere(Vec3::new(0., 0., -0.5), 1., 0.1, 1., 1.).valid);
	}

	#[test]
	fn single_object_in_front_of_camera() {
		let mesh = unit_mesh();
		let draws = [MeshDraw::new(Vec3::ZERO, 1., Quat::IDENTITY, 0, &mesh)];
		let view = look_at(Vec3::new(0., 0., 10.), Vec3::ZERO);
		let frame = frame(view, 1, CullFlags::CULLING);
		let commands = draw_cull_cpu(&frame, &draws, &[mesh], &DepthPyramidCpu::cleared(RENDER));
		assert_eq!(commands.len(), 1);
		assert_eq!(commands[0].draw_id, 0);
		assert_eq!(commands[0].first_index, mesh.lods[0].index_offset);
		assert_eq!(commands[0].index_count, mesh.lods[0].index_count);
	}

	#[test]
	fn random_scene_is_partially_visible() {
		let mesh = unit_mesh();
		let mut rng = StdRng::seed_from_u64(42);
		let draws = random_draws(&mut rng, 100_000, 300., &mesh);
		let pyramid = DepthPyramidCpu::cleared(RENDER);
		for _ in 0..4 {
			let eye = Vec3::new(
				rng.gen_range(-150.0..150.0),
				rng.gen_range(-150.0..150.0),
				rng.gen_range(-150.0..150.0),
			);
			let target = eye + Vec3::new(rng.gen_range(-1.0..1.0), rng.gen_range(-1.0..1.0), 1.);
			let frame = frame(look_at(eye, target), draws.len() as u32, CullFlags::CULLING | CullFlags::LOD);
			let commands = draw_cull_cpu(&frame, &draws, &[mesh], &pyramid);
			assert!(!commands.is_empty());
			assert!(commands.len() < draws.len());

			// frustum soundness and unique draw ids
			let ids: HashSet<u32> = commands.iter().map(|c| c.draw_id).collect();
			assert_eq!(ids.len(), commands.len());
			let frustum = frame.frustum();
			for command in &commands {
				let draw = &draws[command.draw_id as usize];
				let center = frame.camera.view_space(draw.position());
				assert!(!frustum.outside_view(center, mesh.radius * draw.scale));
			}
		}
	}

	#[test]
	fn no_false_occlusion_in_front_of_wall() {
		let mesh = unit_mesh();
		let mut rng = StdRng::seed_from_u64(7);
		let flags = CullFlags::CULLING | CullFlags::PYRAMID_VALID;
		let draws: Vec<_> = (0..2000)
			.map(|_| {
				let z = rng.gen_range(2.0..45.0);
				let position = Vec3::new(rng.gen_range(-z..z) * 0.7, rng.gen_range(-z..z) * 0.4, -z);
				MeshDraw::new(position, rng.gen_range(0.1..3.0), Quat::IDENTITY, 0, &mesh)
			})
			.collect();
		let frame = frame(Affine3A::IDENTITY, draws.len() as u32, flags);
		let pyramid = wall(&frame, 50.);

		let culled = draw_cull_cpu(&frame, &draws, &[mesh], &pyramid);
		let unculled = draw_cull_cpu(&frame, &draws, &[mesh], &DepthPyramidCpu::cleared(RENDER));
		assert_eq!(culled.len(), unculled.len());
	}

	#[test]
	fn objects_behind_wall_are_occluded() {
		let mesh = unit_mesh();
		let draws: Vec<_> = (0..100)
			.map(|i| MeshDraw::new(Vec3::new((i % 10) as f32 - 5., (i / 10) as f32 - 5., -100.), 1., Quat::IDENTITY, 0, &mesh))
			.collect();
		let flags = CullFlags::CULLING | CullFlags::PYRAMID_VALID;
		let frame = frame(Affine3A::IDENTITY, draws.len() as u32, flags);
		let pyramid = wall(&frame, 50.);
		assert!(draw_cull_cpu(&frame, &draws, &[mesh], &pyramid).is_empty());

		// the pyramid of a resized or first frame must not be used
		let frame = FrameData {
			flags: CullFlags::CULLING.bits(),
			..frame
		};
		assert_eq!(draw_cull_cpu(&frame, &draws, &[mesh], &pyramid).len(), draws.len());
	}

	#[test]
	fn disabling_culling_keeps_frustum_survivors() {
		let mesh = unit_mesh();
		let mut rng = StdRng::seed_from_u64(11);
		let draws = random_draws(&mut rng, 10_000, 300., &mesh);
		let view = look_at(Vec3::ZERO, Vec3::new(0., 0., -1.));
		let culling = frame(view, draws.len() as u32, CullFlags::CULLING | CullFlags::PYRAMID_VALID);
		let pyramid = wall(&culling, 20.);

		let frustum = culling.frustum();
		let survivors = draws
			.iter()
			.filter(|draw| {
				let center = culling.camera.view_space(draw.position());
				let radius = mesh.radius * draw.scale;
				!frustum.outside_view(center, radius) && !frustum.beyond_draw_distance(center, radius)
			})
			.count();

		let occluded = draw_cull_cpu(&culling, &draws, &[mesh], &pyramid);
		assert!(occluded.len() < survivors);

		let no_culling = FrameData {
			flags: CullFlags::PYRAMID_VALID.bits(),
			..culling
		};
		assert_eq!(draw_cull_cpu(&no_culling, &draws, &[mesh], &pyramid).len(), survivors);
	}

	#[test]
	fn lod_follows_toggle() {
		let mesh = unit_mesh();
		let draws = [MeshDraw::new(Vec3::new(0., 0., -250.), 1., Quat::IDENTITY, 0, &mesh)];
		let pyramid = DepthPyramidCpu::cleared(RENDER);
		let lod = draw_cull_cpu(&frame(Affine3A::IDENTITY, 1, CullFlags::LOD), &draws, &[mesh], &pyramid);
		assert_eq!(lod[0].first_index, mesh.lods[2].index_offset);
		let full = draw_cull_cpu(&frame(Affine3A::IDENTITY, 1, CullFlags::empty()), &draws, &[mesh], &pyramid);
		assert_eq!(full[0].first_index, mesh.lods[0].index_offset);
	}

	#[test]
	fn coverage_of_odd_levels() {
		// 5 texels at level 0 cover 10 pixels, level 1 has 2 texels covering 8, level 2 one texel covering 8
		assert_eq!(covered_pixels(5, 0), 10);
		assert_eq!(covered_pixels(5, 1), 8);
		assert_eq!(covered_pixels(5, 2), 8);
		assert_eq!(covered_pixels(5, 3), 8);
		assert_eq!(covered_pixels(1, 0), 2);
		assert_eq!(covered_pixels(1, 4), 2);
	}
}
