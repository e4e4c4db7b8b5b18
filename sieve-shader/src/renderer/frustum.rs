use glam::{Mat4, Vec3, Vec4, Vec4Swizzles};

pub const FRUSTUM_PLANE_LEFT: usize = 0;
pub const FRUSTUM_PLANE_RIGHT: usize = 1;
pub const FRUSTUM_PLANE_BOTTOM: usize = 2;
pub const FRUSTUM_PLANE_TOP: usize = 3;
pub const FRUSTUM_PLANE_NEAR: usize = 4;
pub const FRUSTUM_PLANE_DRAW_DISTANCE: usize = 5;

/// View space frustum, planes point inwards: `dot(plane.xyz, p) + plane.w >= 0` for points inside.
#[derive(Copy, Clone)]
#[cfg_attr(not(target_arch = "spirv"), derive(Debug))]
pub struct Frustum {
	pub planes: [Vec4; 6],
}

pub fn normalize_plane(plane: Vec4) -> Vec4 {
	plane / plane.xyz().length()
}

impl Frustum {
	/// Extracts the five view planes from the rows of `projection` and adds a far plane at `draw_distance`.
	pub fn from_projection(projection: Mat4, draw_distance: f32) -> Self {
		let rows = projection.transpose();
		let (r0, r1, r2, r3) = (rows.x_axis, rows.y_axis, rows.z_axis, rows.w_axis);
		Self {
			planes: [
				normalize_plane(r3 + r0),
				normalize_plane(r3 - r0),
				normalize_plane(r3 + r1),
				normalize_plane(r3 - r1),
				normalize_plane(r3 - r2),
				Vec4::new(0., 0., 1., draw_distance),
			],
		}
	}

	/// Signed distance of `point` to a plane, positive inside.
	pub fn distance(&self, plane: usize, point: Vec3) -> f32 {
		let plane = self.planes[plane];
		plane.xyz().dot(point) + plane.w
	}

	/// True if the sphere lies entirely outside one of the view planes. Tangent spheres are inside.
	pub fn outside_view(&self, center: Vec3, radius: f32) -> bool {
		let mut outside = false;
		for plane in FRUSTUM_PLANE_LEFT..=FRUSTUM_PLANE_NEAR {
			outside |= self.distance(plane, center) < -radius;
		}
		outside
	}

	/// True if the sphere lies entirely beyond the draw distance.
	pub fn beyond_draw_distance(&self, center: Vec3, radius: f32) -> bool {
		self.distance(FRUSTUM_PLANE_DRAW_DISTANCE, center) < -radius
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::renderer::camera::Camera;
	use glam::{Affine3A, UVec2};

	fn frustum() -> Frustum {
		let camera = Camera::new(UVec2::new(1000, 1000), 90f32.to_radians(), 0.1, Affine3A::IDENTITY);
		Frustum::from_projection(camera.projection, 300.)
	}

	#[test]
	fn inside_and_outside() {
		let f = frustum();
		assert!(!f.outside_view(Vec3::new(0., 0., -10.), 1.));
		assert!(f.outside_view(Vec3::new(0., 0., 10.), 1.));
		assert!(f.outside_view(Vec3::new(30., 0., -10.), 1.));
		assert!(f.outside_view(Vec3::new(0., -30., -10.), 1.));
		assert!(!f.beyond_draw_distance(Vec3::new(0., 0., -299.), 0.5));
		assert!(f.beyond_draw_distance(Vec3::new(0., 0., -302.), 1.));
	}

	#[test]
	fn tangent_sphere_is_kept() {
		let f = frustum();
		// with a 90 degree fov the right plane is x = -z, its normal is (-1, 0, -1) / sqrt(2)
		let center = Vec3::new(12., 0., -10.);
		let radius = f.distance(FRUSTUM_PLANE_RIGHT, center).abs();
		assert!(f.distance(FRUSTUM_PLANE_RIGHT, center) < 0.);
		assert!(!f.outside_view(center, radius));
		assert!(f.outside_view(center, radius * 0.99));
	}

	#[test]
	fn near_plane() {
		let f = frustum();
		assert!(f.outside_view(Vec3::new(0., 0., -0.05), 0.01));
		assert!(!f.outside_view(Vec3::new(0., 0., -0.05), 0.06));
	}
}
