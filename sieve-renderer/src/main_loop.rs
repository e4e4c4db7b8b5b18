use crate::cli_args::CliArgs;
use crate::delta_time::DeltaTimer;
use crate::fps_camera_controller::FpsCameraController;
use crate::scene_loading::{SceneCpu, load_scene};
use crate::toggle_selector::ToggleSelector;
use anyhow::Context;
use glam::UVec2;
use sieve_engine::device::init::{Init, Plugin};
use sieve_engine::device::plugins::default_device_selection_plugin::DefaultDeviceSelectionPlugin;
use sieve_engine::device::plugins::rust_gpu_workaround::RustGpuWorkaround;
use sieve_engine::device::plugins::standard_validation_layer_plugin::StandardValidationLayerPlugin;
use sieve_engine::generate_application_config;
use sieve_engine::renderer::frame_config::FrameConfig;
use sieve_engine::renderer::renderers::main::{RenderPipelineMain, RendererMain, ViewParams};
use sieve_engine::renderer::stats::FrameStats;
use sieve_engine::window::swapchain::Swapchain;
use sieve_shader::renderer::depth_pyramid::pyramid_levels;
use std::sync::Arc;
use winit::application::ApplicationHandler;
use winit::dpi::PhysicalSize;
use winit::event::{DeviceEvent, DeviceId, ElementState, KeyEvent, WindowEvent};
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::keyboard::{KeyCode, PhysicalKey};
use winit::raw_window_handle::{HasDisplayHandle, HasWindowHandle};
use winit::window::{Window, WindowId};

const FOV_Y_DEGREES: f32 = 70.;
const Z_NEAR: f32 = 0.1;
/// seconds between window title updates
const TITLE_INTERVAL: f32 = 0.25;

pub fn main_loop(args: CliArgs) -> anyhow::Result<()> {
	rayon::ThreadPoolBuilder::new()
		.thread_name(|i| format!("rayon worker {i}"))
		.build_global()?;

	let scene = load_scene(&args)?;
	let event_loop = EventLoop::new()?;
	event_loop.set_control_flow(ControlFlow::Poll);
	let mut app = App {
		args,
		scene: Some(scene),
		running: None,
		error: None,
	};
	event_loop.run_app(&mut app)?;
	match app.error {
		Some(e) => Err(e),
		None => Ok(()),
	}
}

struct App {
	args: CliArgs,
	/// handed to the GPU once the window exists
	scene: Option<SceneCpu>,
	running: Option<Running>,
	error: Option<anyhow::Error>,
}

/// Field order is drop order: the renderer releases its resources before the device, the window goes last.
struct Running {
	renderer: RendererMain,
	camera: FpsCameraController,
	toggles: ToggleSelector,
	stats: FrameStats,
	timer: DeltaTimer,
	since_title: f32,
	draw_distance: f32,
	window: Arc<Window>,
}

impl App {
	fn start(&mut self, event_loop: &ActiveEventLoop) -> anyhow::Result<Running> {
		let args = &self.args;
		let window = Arc::new(
			event_loop.create_window(
				Window::default_attributes()
					.with_title("sieve")
					.with_inner_size(PhysicalSize::new(args.width, args.height)),
			)?,
		);

		let mut plugins: Vec<&dyn Plugin> = vec![&DefaultDeviceSelectionPlugin as &dyn Plugin, &RustGpuWorkaround];
		if args.validation {
			plugins.push(&StandardValidationLayerPlugin);
		}
		let init = Arc::new(Init::new(
			generate_application_config!(),
			&plugins,
			window.display_handle()?.as_raw(),
			window.window_handle()?.as_raw(),
		)?);

		let size = window.inner_size();
		let window_extent = [size.width, size.height];
		let swapchain = Swapchain::new(&init, window_extent, args.vsync)?;
		let scene = self.scene.take().context("scene already uploaded")?;
		let pipeline = RenderPipelineMain::new(
			&init,
			&args.shader_dir,
			swapchain.format(),
			&scene.geometry,
			&scene.draws,
		)?;
		let renderer = pipeline.new_renderer(swapchain, window_extent)?;

		let toggles = ToggleSelector::new(
			FrameConfig {
				mesh_shading: args.mesh_shading,
				..FrameConfig::default()
			},
			pipeline.mesh_shading_supported(),
		);
		log::info!(
			"mesh shading {}, draw indirect count {}",
			init.capabilities.mesh_shading,
			init.capabilities.draw_indirect_count
		);
		Ok(Running {
			renderer,
			camera: FpsCameraController::new(),
			toggles,
			stats: FrameStats::new(pipeline.draws.len()),
			timer: DeltaTimer::new(),
			since_title: TITLE_INTERVAL,
			draw_distance: args.draw_distance,
			window,
		})
	}

	fn fail(&mut self, event_loop: &ActiveEventLoop, error: anyhow::Error) {
		self.error = Some(error);
		// release GPU resources while the window still exists
		self.running = None;
		event_loop.exit();
	}
}

impl Running {
	#[profiling::function]
	fn redraw(&mut self) -> anyhow::Result<()> {
		profiling::finish_frame!();
		let delta_time = self.timer.next();
		let view = ViewParams {
			view: self.camera.update(delta_time),
			fov_y: FOV_Y_DEGREES.to_radians(),
			znear: Z_NEAR,
			draw_distance: self.draw_distance,
		};

		let extent = self.renderer.extent();
		self.toggles
			.clamp_pyramid_level(pyramid_levels(UVec2::new(extent.width, extent.height)));
		let config = self.toggles.config();
		let report = self.renderer.frame(&view, config)?;

		self.stats.cpu_frame(delta_time as f64);
		self.stats.mesh_shading = report.mesh_shading;
		self.stats.culling = config.culling;
		self.stats.lod = config.lod;
		if report.visible_draws.is_some() {
			self.stats.visible_draws = report.visible_draws;
		}
		match report.queries {
			Some(results) => self.stats.queries(results),
			None if !config.queries => self.stats.clear_queries(),
			None => (),
		}

		self.since_title += delta_time;
		if self.since_title >= TITLE_INTERVAL {
			self.since_title = 0.;
			self.window.set_title(&format!("sieve: {}", self.stats));
		}
		Ok(())
	}
}

impl ApplicationHandler for App {
	fn resumed(&mut self, event_loop: &ActiveEventLoop) {
		if self.running.is_some() || self.error.is_some() {
			return;
		}
		match self.start(event_loop) {
			Ok(running) => self.running = Some(running),
			Err(e) => self.fail(event_loop, e),
		}
	}

	fn window_event(&mut self, event_loop: &ActiveEventLoop, _window_id: WindowId, event: WindowEvent) {
		let Some(running) = &mut self.running else {
			return;
		};
		running.camera.handle_window_event(&event);
		running.toggles.handle_input(&event);
		match event {
			WindowEvent::CloseRequested
			| WindowEvent::KeyboardInput {
				event:
					KeyEvent {
						physical_key: PhysicalKey::Code(KeyCode::Escape),
						state: ElementState::Pressed,
						..
					},
				..
			} => {
				self.running = None;
				event_loop.exit();
			}
			WindowEvent::Resized(size) => running.renderer.resize([size.width, size.height]),
			WindowEvent::RedrawRequested => {
				if let Err(e) = running.redraw() {
					self.fail(event_loop, e);
				}
			}
			_ => {}
		}
	}

	fn device_event(&mut self, _event_loop: &ActiveEventLoop, _device_id: DeviceId, event: DeviceEvent) {
		if let Some(running) = &mut self.running {
			running.camera.handle_device_event(&event);
		}
	}

	fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
		if let Some(running) = &self.running {
			running.window.request_redraw();
		}
	}
}
