use bytemuck_derive::{Pod, Zeroable};
use glam::{Affine3A, Mat4, UVec2, Vec3, Vec4};

/// Perspective camera with reversed, infinite depth: depth is `znear / distance`, 1 at the near plane and 0 at
/// infinity. View space looks down -Z.
#[derive(Copy, Clone, Pod, Zeroable)]
#[cfg_attr(not(target_arch = "spirv"), derive(Debug))]
#[repr(C)]
pub struct Camera {
	pub view: Mat4,
	pub projection: Mat4,
	pub znear: f32,
	/// `projection[0][0]`
	pub p00: f32,
	/// `projection[1][1]`
	pub p11: f32,
	pub viewport_height: f32,
}

impl Camera {
	pub fn new(viewport: UVec2, fov_y: f32, znear: f32, view: Affine3A) -> Self {
		let aspect = viewport.x as f32 / viewport.y as f32;
		let projection = Mat4::perspective_infinite_reverse_rh(fov_y, aspect, znear);
		Self {
			view: Mat4::from(view),
			projection,
			znear,
			p00: projection.x_axis.x,
			p11: projection.y_axis.y,
			viewport_height: viewport.y as f32,
		}
	}

	pub fn view_space(&self, world: Vec3) -> Vec3 {
		self.view.transform_point3(world)
	}

	pub fn view_space_vector(&self, world: Vec3) -> Vec3 {
		self.view.transform_vector3(world)
	}

	pub fn clip_space(&self, world: Vec3) -> Vec4 {
		self.projection * Vec4::from((self.view_space(world), 1.))
	}

	/// Reversed-Z depth of a view space distance along the view axis.
	pub fn depth_at(&self, distance: f32) -> f32 {
		self.znear / distance
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use approx::assert_relative_eq;

	#[test]
	fn reversed_depth() {
		let camera = Camera::new(UVec2::new(1920, 1080), 70f32.to_radians(), 0.5, Affine3A::IDENTITY);
		let near = camera.clip_space(Vec3::new(0., 0., -0.5));
		assert_relative_eq!(near.z / near.w, 1., epsilon = 1e-6);
		let far = camera.clip_space(Vec3::new(0., 0., -50.));
		assert_relative_eq!(far.z / far.w, camera.depth_at(50.), epsilon = 1e-6);
		assert_relative_eq!(camera.depth_at(50.), 0.01, epsilon = 1e-6);
	}
}
