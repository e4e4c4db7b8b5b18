use crate::device::error::RenderError;
use crate::device::init::Init;
use crate::renderer::buffer::OneShotCommands;
use crate::renderer::cull::draw_cull_compute::DrawCullCompute;
use crate::renderer::frame_barriers;
use crate::renderer::frame_config::FrameConfig;
use crate::renderer::frame_in_flight::{FrameSlot, FramesInFlight};
use crate::renderer::frame_state::{FrameState, StepOutcome};
use crate::renderer::geometry::geometry_gpu::{DrawSetGpu, GeometryGpu};
use crate::renderer::geometry::geometry_pass::GeometrySubmission;
use crate::renderer::geometry::mesh_pipeline::MeshDrawPipeline;
use crate::renderer::geometry::meshlet_pipeline::MeshletDrawPipeline;
use crate::renderer::occlusion::depth_pyramid::DepthPyramidImage;
use crate::renderer::occlusion::depth_reduce_compute::DepthReduceCompute;
use crate::renderer::pipeline::RenderTargetFormats;
use crate::renderer::query::{QueryResults, Timestamp};
use crate::renderer::render_targets::{DEPTH_FORMAT, RenderTargets};
use crate::renderer::shader::ShaderModule;
use crate::window::swapchain::{AcquireOutcome, Swapchain};
use ash::vk;
use glam::{Affine3A, UVec2};
use sieve_asset::geometry::GeometryCpu;
use sieve_shader::renderer::camera::Camera;
use sieve_shader::renderer::draw::MeshDraw;
use sieve_shader::renderer::frame_data::FrameData;
use std::path::Path;
use std::sync::Arc;

/// Where the camera is and how far it sees, supplied by the application every frame.
#[derive(Copy, Clone, Debug)]
pub struct ViewParams {
	/// world to view space
	pub view: Affine3A,
	pub fov_y: f32,
	pub znear: f32,
	pub draw_distance: f32,
}

/// Everything that does not depend on the swapchain size: pipelines, geometry and the draw set.
pub struct RenderPipelineMain {
	pub init: Arc<Init>,
	pub formats: RenderTargetFormats,
	pub geometry: GeometryGpu,
	pub draws: DrawSetGpu,
	draw_cull: DrawCullCompute,
	depth_reduce: DepthReduceCompute,
	mesh: MeshDrawPipeline,
	meshlet: Option<MeshletDrawPipeline>,
}

impl RenderPipelineMain {
	pub fn new(
		init: &Arc<Init>,
		shader_dir: &Path,
		output_format: vk::Format,
		geometry: &GeometryCpu,
		draws: &[MeshDraw],
	) -> Result<Arc<Self>, RenderError> {
		let formats = RenderTargetFormats {
			color: output_format,
			depth: DEPTH_FORMAT,
		};
		let module = ShaderModule::load(init, shader_dir)?;
		let draw_cull = DrawCullCompute::new(init, &module)?;
		let depth_reduce = DepthReduceCompute::new(init, &module)?;
		let mesh = MeshDrawPipeline::new(init, &module, &formats)?;
		let meshlet = MeshletDrawPipeline::new(init, &module, &formats)?;

		let commands = OneShotCommands::new(init)?;
		let geometry = GeometryGpu::upload(init, &commands, geometry)?;
		let draws = DrawSetGpu::upload(init, &commands, draws)?;
		Ok(Arc::new(Self {
			init: init.clone(),
			formats,
			geometry,
			draws,
			draw_cull,
			depth_reduce,
			mesh,
			meshlet,
		}))
	}

	pub fn mesh_shading_supported(&self) -> bool {
		self.meshlet.is_some() && self.geometry.has_meshlets()
	}

	pub fn new_renderer(self: &Arc<Self>, swapchain: Swapchain, window_extent: [u32; 2]) -> Result<RendererMain, RenderError> {
		RendererMain::new(self.clone(), swapchain, window_extent)
	}
}

/// What happened during one call to [`RendererMain::frame`].
#[derive(Copy, Clone, Debug, Default)]
pub struct FrameReport {
	pub presented: bool,
	pub recreated: bool,
	pub mesh_shading: bool,
	/// query results of the frame submitted two frames ago from the same slot, if it recorded queries
	pub queries: Option<QueryResults>,
	/// visible draws of the frame submitted two frames ago from the same slot
	pub visible_draws: Option<u32>,
}

struct RendererMainResources {
	targets: RenderTargets,
	pyramid: DepthPyramidImage,
}

impl RendererMainResources {
	fn new(
		pipeline: &RenderPipelineMain,
		commands: &OneShotCommands,
		extent: vk::Extent2D,
	) -> Result<Self, RenderError> {
		let init = &pipeline.init;
		Ok(Self {
			targets: RenderTargets::new(init, pipeline.formats, extent)?,
			pyramid: DepthPyramidImage::new(init, commands, extent)?,
		})
	}
}

/// The frame orchestrator: owns the swapchain, the size dependent targets and both frame slots.
pub struct RendererMain {
	pub pipeline: Arc<RenderPipelineMain>,
	swapchain: Swapchain,
	resources: RendererMainResources,
	frames: FramesInFlight<FrameSlot>,
	commands: OneShotCommands,
	window_extent: [u32; 2],
	resize_pending: bool,
}

/// Per call state carried between the steps of [`FrameState`].
#[derive(Default)]
struct FrameProgress {
	image_index: Option<u32>,
	submitted: bool,
	report: FrameReport,
}

impl RendererMain {
	fn new(pipeline: Arc<RenderPipelineMain>, swapchain: Swapchain, window_extent: [u32; 2]) -> Result<Self, RenderError> {
		let init = &pipeline.init;
		let commands = OneShotCommands::new(init)?;
		let resources = RendererMainResources::new(&pipeline, &commands, swapchain.extent())?;
		let draw_capacity = pipeline.draws.len();
		let frames = FramesInFlight::new(|i| FrameSlot::new(init, i, draw_capacity))?;
		Ok(Self {
			pipeline,
			swapchain,
			resources,
			frames,
			commands,
			window_extent,
			resize_pending: false,
		})
	}

	/// The next frame recreates the swapchain and every size dependent target.
	pub fn resize(&mut self, window_extent: [u32; 2]) {
		self.window_extent = window_extent;
		self.resize_pending = true;
	}

	pub fn extent(&self) -> vk::Extent2D {
		self.swapchain.extent()
	}

	/// Renders and presents one frame. A minimized window renders nothing, an out of date swapchain is recreated
	/// and the frame dropped.
	#[profiling::function]
	pub fn frame(&mut self, view: &ViewParams, config: FrameConfig) -> Result<FrameReport, RenderError> {
		if self.window_extent.contains(&0) {
			return Ok(FrameReport::default());
		}
		let mut progress = FrameProgress::default();
		let mut state = FrameState::Acquire;
		while state != FrameState::Done {
			let outcome = self.step(state, &mut progress, view, config)?;
			state = state.next(outcome);
		}
		if progress.submitted {
			self.frames.advance();
		}
		Ok(progress.report)
	}

	fn step(
		&mut self,
		state: FrameState,
		progress: &mut FrameProgress,
		view: &ViewParams,
		config: FrameConfig,
	) -> Result<StepOutcome, RenderError> {
		let p = self.pipeline.clone();
		let device = &p.init.device;
		let submission = GeometrySubmission::select(config.mesh_shading, &p.mesh, p.meshlet.as_ref(), &p.geometry);
		let slot = self.frames.current_mut();
		let cmd = slot.cmd;
		let frame = RendererMainFrame {
			pipeline: &p,
			resources: &self.resources,
			cmd,
		};

		match state {
			FrameState::Acquire => {
				if self.resize_pending {
					return Ok(StepOutcome::OutOfDate);
				}
				slot.wait()?;
				progress.report.visible_draws = slot.visible_draws();
				progress.report.queries = slot.queries.read()?;
				match self.swapchain.acquire(slot.acquired)? {
					AcquireOutcome::Image { index, suboptimal } => {
						progress.image_index = Some(index);
						// finish this frame, rebuild before the next one
						self.resize_pending |= suboptimal;
					}
					AcquireOutcome::OutOfDate => return Ok(StepOutcome::OutOfDate),
				}
			}
			FrameState::RecordCull => {
				unsafe {
					device.reset_command_buffer(cmd, vk::CommandBufferResetFlags::empty())?;
					device.begin_command_buffer(
						cmd,
						&vk::CommandBufferBeginInfo::default().flags(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT),
					)?;
				}
				slot.queries.reset(cmd, config.queries);
				slot.queries
					.timestamp(cmd, vk::PipelineStageFlags2::TOP_OF_PIPE, Timestamp::FrameBegin);
				let frame_data = frame.frame_data(view, config);
				slot.frame_data.write(0, std::slice::from_ref(&frame_data));
				frame.record_cull(slot);
			}
			FrameState::RecordOcclusionBuild => frame.record_depth_handover(),
			FrameState::RecordGeometryPass => {
				progress.report.mesh_shading = submission.is_mesh_shading();
				frame.record_geometry_pass(slot, submission);
			}
			FrameState::RecordPyramidBuild => frame.record_pyramid_build(slot),
			FrameState::Submit => {
				let index = progress.image_index.ok_or(RenderError::NoSwapchainImage)?;
				frame.record_output(slot, &self.swapchain, index, config);
				slot.queries
					.timestamp(cmd, vk::PipelineStageFlags2::BOTTOM_OF_PIPE, Timestamp::FrameEnd);
				unsafe { device.end_command_buffer(cmd)? };
				submit(&p.init, slot, &self.swapchain, index)?;
				slot.submitted = true;
				self.resources.pyramid.mark_written();
				progress.submitted = true;
			}
			FrameState::Present => {
				let index = progress.image_index.ok_or(RenderError::NoSwapchainImage)?;
				let outcome = self.swapchain.present(index)?;
				progress.report.presented = true;
				if outcome.needs_recreate() {
					return Ok(StepOutcome::OutOfDate);
				}
			}
			FrameState::Recreate => {
				self.recreate()?;
				progress.report.recreated = true;
			}
			FrameState::Done => (),
		}
		Ok(StepOutcome::Continue)
	}

	#[profiling::function]
	fn recreate(&mut self) -> Result<(), RenderError> {
		self.pipeline.init.wait_idle()?;
		self.swapchain.recreate(self.window_extent)?;
		let extent = self.swapchain.extent();
		// the new pyramid holds no previous frame, culling skips the occlusion test until it is written
		self.resources = RendererMainResources::new(&self.pipeline, &self.commands, extent)?;
		self.resize_pending = false;
		log::info!("recreated swapchain at {}x{}", extent.width, extent.height);
		Ok(())
	}
}

impl Drop for RendererMain {
	fn drop(&mut self) {
		if let Err(e) = self.pipeline.init.wait_idle() {
			log::error!("failed to wait for the device before releasing frame resources: {e}");
		}
	}
}

fn submit(init: &Init, slot: &FrameSlot, swapchain: &Swapchain, image_index: u32) -> Result<(), RenderError> {
	let wait = [vk::SemaphoreSubmitInfo::default()
		.semaphore(slot.acquired)
		.stage_mask(vk::PipelineStageFlags2::TRANSFER)];
	let signal = [vk::SemaphoreSubmitInfo::default()
		.semaphore(swapchain.present_semaphore(image_index))
		.stage_mask(vk::PipelineStageFlags2::ALL_COMMANDS)];
	let command_buffers = [vk::CommandBufferSubmitInfo::default().command_buffer(slot.cmd)];
	let submit = vk::SubmitInfo2::default()
		.wait_semaphore_infos(&wait)
		.command_buffer_infos(&command_buffers)
		.signal_semaphore_infos(&signal);
	unsafe {
		init.device.reset_fences(&[slot.fence])?;
		init.device.queue_submit2(init.queue, &[submit], slot.fence)?;
	}
	Ok(())
}

/// Records the stages of one frame into the slot's command buffer.
struct RendererMainFrame<'a> {
	pipeline: &'a RenderPipelineMain,
	resources: &'a RendererMainResources,
	cmd: vk::CommandBuffer,
}

impl RendererMainFrame<'_> {
	fn extent(&self) -> vk::Extent2D {
		self.resources.targets.extent()
	}

	fn frame_data(&self, view: &ViewParams, config: FrameConfig) -> FrameData {
		let extent = self.extent();
		let render = UVec2::new(extent.width, extent.height);
		let camera = Camera::new(render, view.fov_y, view.znear, view.view);
		FrameData::new(
			camera,
			view.draw_distance,
			render,
			self.pipeline.draws.len(),
			config.cull_flags(self.resources.pyramid.valid()),
		)
	}

	#[profiling::function]
	fn record_cull(&self, slot: &FrameSlot) {
		let p = self.pipeline;
		slot.queries
			.timestamp(self.cmd, vk::PipelineStageFlags2::TOP_OF_PIPE, Timestamp::CullBegin);
		p.draw_cull
			.dispatch(self.cmd, slot, &p.draws, &p.geometry, &self.resources.pyramid);
		slot.queries
			.timestamp(self.cmd, vk::PipelineStageFlags2::COMPUTE_SHADER, Timestamp::CullEnd);
	}

	/// Takes the depth target back from the previous frame's pyramid build for this frame's geometry pass.
	fn record_depth_handover(&self) {
		let targets = &self.resources.targets;
		frame_barriers::begin_geometry(targets.color.handle(), targets.depth.handle())
			.record(&self.pipeline.init.device, self.cmd);
	}

	#[profiling::function]
	fn record_geometry_pass(&self, slot: &FrameSlot, submission: GeometrySubmission) {
		let p = self.pipeline;
		let device = &p.init.device;
		let cmd = self.cmd;
		let targets = &self.resources.targets;
		let extent = self.extent();

		slot.queries
			.timestamp(cmd, vk::PipelineStageFlags2::TOP_OF_PIPE, Timestamp::GeometryBegin);
		slot.queries.begin_statistics(cmd);
		let color_attachments = [vk::RenderingAttachmentInfo::default()
			.image_view(targets.color.view())
			.image_layout(vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL)
			.load_op(vk::AttachmentLoadOp::CLEAR)
			.store_op(vk::AttachmentStoreOp::STORE)
			.clear_value(vk::ClearValue {
				color: vk::ClearColorValue {
					float32: [0.02, 0.02, 0.03, 1.],
				},
			})];
		// reversed-Z clears to the far plane at 0
		let depth_attachment = vk::RenderingAttachmentInfo::default()
			.image_view(targets.depth.view())
			.image_layout(vk::ImageLayout::DEPTH_ATTACHMENT_OPTIMAL)
			.load_op(vk::AttachmentLoadOp::CLEAR)
			.store_op(vk::AttachmentStoreOp::STORE)
			.clear_value(vk::ClearValue {
				depth_stencil: vk::ClearDepthStencilValue { depth: 0., stencil: 0 },
			});
		let render_area = vk::Rect2D {
			offset: vk::Offset2D::default(),
			extent,
		};
		unsafe {
			device.cmd_begin_rendering(
				cmd,
				&vk::RenderingInfo::default()
					.render_area(render_area)
					.layer_count(1)
					.color_attachments(&color_attachments)
					.depth_attachment(&depth_attachment),
			);
			// flipped, so +Y points up like in clip space
			device.cmd_set_viewport(cmd, 0, &[vk::Viewport {
				x: 0.,
				y: extent.height as f32,
				width: extent.width as f32,
				height: -(extent.height as f32),
				min_depth: 0.,
				max_depth: 1.,
			}]);
			device.cmd_set_scissor(cmd, 0, &[render_area]);
		}
		submission.submit(cmd, slot, &p.draws, &p.geometry);
		unsafe { device.cmd_end_rendering(cmd) };
		slot.queries.end_statistics(cmd);
		slot.queries
			.timestamp(cmd, vk::PipelineStageFlags2::ALL_GRAPHICS, Timestamp::GeometryEnd);

		let pyramid = &self.resources.pyramid;
		frame_barriers::end_geometry(targets.depth.handle(), pyramid.image.handle(), pyramid.levels()).record(device, cmd);
	}

	#[profiling::function]
	fn record_pyramid_build(&self, slot: &FrameSlot) {
		let p = self.pipeline;
		let depth = &self.resources.targets.depth;
		slot.queries
			.timestamp(self.cmd, vk::PipelineStageFlags2::TOP_OF_PIPE, Timestamp::PyramidBegin);
		p.depth_reduce.dispatch(self.cmd, depth, &self.resources.pyramid);
		slot.queries
			.timestamp(self.cmd, vk::PipelineStageFlags2::COMPUTE_SHADER, Timestamp::PyramidEnd);
		frame_barriers::after_pyramid(depth.handle()).record(&p.init.device, self.cmd);
	}

	/// Copies the color target, or blits a pyramid level in debug view, into the swapchain image. Also copies the
	/// draw count into the slot's readback buffer.
	fn record_output(&self, slot: &FrameSlot, swapchain: &Swapchain, index: u32, config: FrameConfig) {
		let device = &self.pipeline.init.device;
		let cmd = self.cmd;
		let targets = &self.resources.targets;
		let pyramid = &self.resources.pyramid;
		let swapchain_image = swapchain.image(index);
		let extent = self.extent();
		let layers = |level: u32| vk::ImageSubresourceLayers {
			aspect_mask: vk::ImageAspectFlags::COLOR,
			mip_level: level,
			base_array_layer: 0,
			layer_count: 1,
		};
		let corner = |x: u32, y: u32| vk::Offset3D {
			x: x as i32,
			y: y as i32,
			z: 1,
		};

		frame_barriers::before_output(targets.color.handle(), swapchain_image).record(device, cmd);
		unsafe {
			if config.pyramid_debug {
				let level = config.clamped_pyramid_level(pyramid.levels());
				let src = pyramid.level_extent(level);
				device.cmd_blit_image(
					cmd,
					pyramid.image.handle(),
					vk::ImageLayout::GENERAL,
					swapchain_image,
					vk::ImageLayout::TRANSFER_DST_OPTIMAL,
					&[vk::ImageBlit::default()
						.src_subresource(layers(level))
						.src_offsets([vk::Offset3D::default(), corner(src.x, src.y)])
						.dst_subresource(layers(0))
						.dst_offsets([vk::Offset3D::default(), corner(extent.width, extent.height)])],
					vk::Filter::NEAREST,
				);
			} else {
				device.cmd_copy_image(
					cmd,
					targets.color.handle(),
					vk::ImageLayout::TRANSFER_SRC_OPTIMAL,
					swapchain_image,
					vk::ImageLayout::TRANSFER_DST_OPTIMAL,
					&[vk::ImageCopy::default()
						.src_subresource(layers(0))
						.dst_subresource(layers(0))
						.extent(vk::Extent3D {
							width: extent.width,
							height: extent.height,
							depth: 1,
						})],
				);
			}
			device.cmd_copy_buffer(cmd, slot.draw_count.handle(), slot.draw_count_readback.handle(), &[
				vk::BufferCopy::default().size(4),
			]);
		}
		frame_barriers::after_output(swapchain_image).record(device, cmd);
	}
}
