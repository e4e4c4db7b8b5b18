use core::f32::consts::PI;
use glam::{Affine3A, DVec2, Quat, Vec3, vec3};
use num_traits::clamp;
use winit::event::{DeviceEvent, ElementState, KeyEvent, MouseButton, WindowEvent};
use winit::keyboard::PhysicalKey::Code;

/// Free flying camera: WASD moves, Space and Shift move up and down, dragging with the left mouse button looks
/// around.
#[derive(Copy, Clone, Debug)]
pub struct FpsCameraController {
	pub position: Vec3,
	pub rotation_yaw: f32,
	pub rotation_pitch: f32,
	/// per axis: negative and positive key held
	movement_keys: [[bool; 2]; 3],
	dragging: bool,

	pub move_speed: f32,
	pub mouse_speed: f32,
}

impl Default for FpsCameraController {
	fn default() -> Self {
		Self::new()
	}
}

impl FpsCameraController {
	pub fn new() -> Self {
		Self {
			position: Vec3::ZERO,
			rotation_yaw: 0.,
			rotation_pitch: 0.,
			movement_keys: Default::default(),
			dragging: false,
			move_speed: 20.,
			mouse_speed: 0.03,
		}
	}

	pub fn handle_window_event(&mut self, event: &WindowEvent) {
		match event {
			WindowEvent::KeyboardInput {
				event: KeyEvent {
					state,
					physical_key: Code(code),
					..
				},
				..
			} => {
				use winit::keyboard::KeyCode::*;
				let value = *state == ElementState::Pressed;
				match code {
					KeyA => self.movement_keys[0][0] = value,
					KeyD => self.movement_keys[0][1] = value,
					ShiftLeft => self.movement_keys[1][0] = value,
					Space => self.movement_keys[1][1] = value,
					KeyW => self.movement_keys[2][0] = value,
					KeyS => self.movement_keys[2][1] = value,
					_ => {}
				}
			}
			WindowEvent::MouseInput {
				state,
				button: MouseButton::Left,
				..
			} => self.dragging = *state == ElementState::Pressed,
			WindowEvent::Focused(false) => {
				self.movement_keys = Default::default();
				self.dragging = false;
			}
			_ => {}
		}
	}

	pub fn handle_device_event(&mut self, event: &DeviceEvent) {
		if let DeviceEvent::MouseMotion { delta } = event {
			if self.dragging {
				self.rotate(*delta);
			}
		}
	}

	pub fn rotate(&mut self, delta: (f64, f64)) {
		const MOUSE_SPEED_CONST: f32 = 1. / (2. * PI);
		let delta = DVec2::from(delta).as_vec2() * self.mouse_speed * MOUSE_SPEED_CONST;
		self.rotation_yaw -= delta.x;
		self.rotation_pitch = clamp(self.rotation_pitch - delta.y, -PI / 2., PI / 2.);
	}

	/// Moves by the held keys and returns the world to view transform.
	pub fn update(&mut self, delta_time: f32) -> Affine3A {
		let mut movement = Vec3::ZERO;
		for axis in 0..3 {
			for (held, sign) in self.movement_keys[axis].iter().zip([-1., 1.]) {
				if *held {
					movement[axis] += sign;
				}
			}
		}
		movement *= self.move_speed * delta_time;

		let quat_yaw = Quat::from_axis_angle(vec3(0., 1., 0.), self.rotation_yaw);
		self.position += quat_yaw * movement;
		let quat = quat_yaw * Quat::from_axis_angle(vec3(1., 0., 0.), self.rotation_pitch);
		Affine3A::from_quat(quat.conjugate()) * Affine3A::from_translation(-self.position)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use approx::assert_relative_eq;

	#[test]
	fn forward_moves_along_view_axis() {
		let mut camera = FpsCameraController::new();
		camera.movement_keys[2][0] = true;
		let view = camera.update(0.5);
		assert_relative_eq!(camera.position.z, -10., epsilon = 1e-5);
		// the camera sits at the view space origin
		let origin = view.transform_point3(camera.position);
		assert_relative_eq!(origin.length(), 0., epsilon = 1e-5);
	}

	#[test]
	fn pitch_is_clamped() {
		let mut camera = FpsCameraController::new();
		camera.rotate((0., -1e6));
		assert_relative_eq!(camera.rotation_pitch, PI / 2.);
	}

	#[test]
	fn mouse_only_rotates_while_dragging() {
		let mut camera = FpsCameraController::new();
		camera.handle_device_event(&DeviceEvent::MouseMotion { delta: (100., 0.) });
		assert_eq!(camera.rotation_yaw, 0.);
		camera.dragging = true;
		camera.handle_device_event(&DeviceEvent::MouseMotion { delta: (100., 0.) });
		assert!(camera.rotation_yaw < 0.);
	}
}
