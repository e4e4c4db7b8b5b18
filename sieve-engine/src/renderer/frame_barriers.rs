//! Barriers between the stages of a frame.
//!
//! The depth target and the pyramid are shared by both frame slots. Their layouts form a cycle that every frame
//! walks through once:
//!
//! | step                     | depth                    | pyramid |
//! |--------------------------|--------------------------|---------|
//! | cull                     | depth attachment         | general, sampled |
//! | [`begin_geometry`]       | undefined -> attachment  | |
//! | [`end_geometry`]         | attachment -> read only  | undefined -> general |
//! | [`after_reduce`] per mip |                          | general |
//! | [`after_pyramid`]        | read only -> attachment  | |

use crate::renderer::barrier::{Access, Barriers};
use crate::renderer::image::subresource_range;
use ash::vk;

fn color_range() -> vk::ImageSubresourceRange {
	subresource_range(vk::ImageAspectFlags::COLOR, 0, 1)
}

fn depth_range() -> vk::ImageSubresourceRange {
	subresource_range(vk::ImageAspectFlags::DEPTH, 0, 1)
}

fn pyramid_range(levels: u32) -> vk::ImageSubresourceRange {
	subresource_range(vk::ImageAspectFlags::COLOR, 0, levels)
}

/// Readers of the pyramid: the culling stage and the debug blit.
const PYRAMID_READ: Access = Access::new(
	vk::PipelineStageFlags2::from_raw(
		vk::PipelineStageFlags2::COMPUTE_SHADER.as_raw() | vk::PipelineStageFlags2::TRANSFER.as_raw(),
	),
	vk::AccessFlags2::from_raw(vk::AccessFlags2::SHADER_READ.as_raw() | vk::AccessFlags2::TRANSFER_READ.as_raw()),
);

/// A freshly created pyramid is moved to general once, so the first cull can bind it.
pub fn pyramid_init(pyramid: vk::Image, levels: u32) -> Barriers {
	Barriers::new().image(
		pyramid,
		pyramid_range(levels),
		vk::ImageLayout::UNDEFINED,
		vk::ImageLayout::GENERAL,
		Access::NONE,
		PYRAMID_READ,
	)
}

/// The cleared count (and in the fallback the cleared commands) before the cull dispatch.
pub fn before_cull() -> Barriers {
	Barriers::new().memory(Access::TRANSFER_WRITE, Access::COMPUTE_READ_WRITE)
}

/// Commands and count written by the cull before the indirect draw and the count readback copy.
pub fn after_cull(mesh_shading: bool) -> Barriers {
	Barriers::new()
		.memory(Access::COMPUTE_WRITE, Access::indirect_read(mesh_shading))
		.memory(Access::COMPUTE_WRITE, Access::TRANSFER_READ)
}

/// Color and depth become attachments. Both are cleared, so their previous contents are discarded.
pub fn begin_geometry(color: vk::Image, depth: vk::Image) -> Barriers {
	Barriers::new()
		.image(
			color,
			color_range(),
			vk::ImageLayout::UNDEFINED,
			vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
			Access::new(vk::PipelineStageFlags2::TRANSFER, vk::AccessFlags2::NONE),
			Access::COLOR_ATTACHMENT_WRITE,
		)
		.image(
			depth,
			depth_range(),
			vk::ImageLayout::UNDEFINED,
			vk::ImageLayout::DEPTH_ATTACHMENT_OPTIMAL,
			Access::DEPTH_ATTACHMENT,
			Access::DEPTH_ATTACHMENT,
		)
}

/// Depth is handed to the reduction, the pyramid may be overwritten once the cull and the debug blit read it.
pub fn end_geometry(depth: vk::Image, pyramid: vk::Image, levels: u32) -> Barriers {
	Barriers::new()
		.image(
			depth,
			depth_range(),
			vk::ImageLayout::DEPTH_ATTACHMENT_OPTIMAL,
			vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
			Access::DEPTH_ATTACHMENT,
			Access::COMPUTE_READ,
		)
		.image(
			pyramid,
			pyramid_range(levels),
			vk::ImageLayout::UNDEFINED,
			vk::ImageLayout::GENERAL,
			Access::new(PYRAMID_READ.stage, vk::AccessFlags2::NONE),
			Access::COMPUTE_WRITE,
		)
}

/// A written mip before the next mip reads it. The last mip is read by the next frame's cull and the debug blit.
pub fn after_reduce(last: bool) -> Barriers {
	let dst = if last { PYRAMID_READ } else { Access::COMPUTE_READ };
	Barriers::new().memory(Access::COMPUTE_WRITE, dst)
}

pub fn after_pyramid(depth: vk::Image) -> Barriers {
	Barriers::new().image(
		depth,
		depth_range(),
		vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
		vk::ImageLayout::DEPTH_ATTACHMENT_OPTIMAL,
		Access::COMPUTE_READ,
		Access::DEPTH_ATTACHMENT,
	)
}

/// Color target to transfer source and the acquired swapchain image to transfer destination. The source stage of
/// the swapchain transition matches the stage the acquire semaphore is waited on.
pub fn before_output(color: vk::Image, swapchain: vk::Image) -> Barriers {
	Barriers::new()
		.image(
			color,
			color_range(),
			vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
			vk::ImageLayout::TRANSFER_SRC_OPTIMAL,
			Access::COLOR_ATTACHMENT_WRITE,
			Access::TRANSFER_READ,
		)
		.image(
			swapchain,
			color_range(),
			vk::ImageLayout::UNDEFINED,
			vk::ImageLayout::TRANSFER_DST_OPTIMAL,
			Access::new(vk::PipelineStageFlags2::TRANSFER, vk::AccessFlags2::NONE),
			Access::TRANSFER_WRITE,
		)
}

/// Swapchain image to present, and the count readback to the host.
pub fn after_output(swapchain: vk::Image) -> Barriers {
	Barriers::new()
		.image(
			swapchain,
			color_range(),
			vk::ImageLayout::TRANSFER_DST_OPTIMAL,
			vk::ImageLayout::PRESENT_SRC_KHR,
			Access::TRANSFER_WRITE,
			Access::NONE,
		)
		.memory(Access::TRANSFER_WRITE, Access::HOST_READ)
}

#[cfg(test)]
mod tests {
	use super::*;
	use ash::vk::Handle;

	fn images() -> (vk::Image, vk::Image, vk::Image, vk::Image) {
		(
			vk::Image::from_raw(1),
			vk::Image::from_raw(2),
			vk::Image::from_raw(3),
			vk::Image::from_raw(4),
		)
	}

	/// Layout transitions of one image across a whole frame, in recording order.
	fn transitions(image: vk::Image, levels: u32) -> Vec<(vk::ImageLayout, vk::ImageLayout)> {
		let (color, depth, pyramid, swapchain) = images();
		let mut frame = vec![before_cull(), after_cull(false), begin_geometry(color, depth)];
		frame.push(end_geometry(depth, pyramid, levels));
		frame.extend((0..levels).map(|level| after_reduce(level + 1 == levels)));
		frame.push(after_pyramid(depth));
		frame.push(before_output(color, swapchain));
		frame.push(after_output(swapchain));
		frame
			.iter()
			.flat_map(|b| b.images.iter())
			.filter(|t| t.image == image)
			.map(|t| (t.old_layout, t.new_layout))
			.collect()
	}

	#[test]
	fn depth_returns_to_attachment_after_each_frame() {
		let (_, depth, _, _) = images();
		let depth = transitions(depth, 5);
		assert_eq!(depth, vec![
			(vk::ImageLayout::UNDEFINED, vk::ImageLayout::DEPTH_ATTACHMENT_OPTIMAL),
			(
				vk::ImageLayout::DEPTH_ATTACHMENT_OPTIMAL,
				vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL
			),
			(
				vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
				vk::ImageLayout::DEPTH_ATTACHMENT_OPTIMAL
			),
		]);
	}

	#[test]
	fn pyramid_stays_general() {
		let (_, _, pyramid, _) = images();
		let init = pyramid_init(pyramid, 5);
		assert_eq!(init.images[0].new_layout, vk::ImageLayout::GENERAL);
		assert_eq!(init.images[0].range.level_count, 5);
		for (_, new) in transitions(pyramid, 5) {
			assert_eq!(new, vk::ImageLayout::GENERAL);
		}
	}

	#[test]
	fn swapchain_ends_in_present() {
		let (color, _, _, swapchain) = images();
		assert_eq!(transitions(swapchain, 3).last().map(|t| t.1), Some(vk::ImageLayout::PRESENT_SRC_KHR));
		assert_eq!(
			transitions(color, 3).last().map(|t| t.1),
			Some(vk::ImageLayout::TRANSFER_SRC_OPTIMAL)
		);
	}

	#[test]
	fn cull_output_reaches_indirect_reads() {
		let indexed = after_cull(false);
		let (src, dst) = indexed.memory[0];
		assert_eq!(src, Access::COMPUTE_WRITE);
		assert!(dst.stage.contains(vk::PipelineStageFlags2::DRAW_INDIRECT));
		assert!(dst.access.contains(vk::AccessFlags2::INDIRECT_COMMAND_READ));
		assert!(!dst.stage.contains(vk::PipelineStageFlags2::TASK_SHADER_EXT));

		let mesh = after_cull(true);
		assert!(mesh.memory[0].1.stage.contains(vk::PipelineStageFlags2::TASK_SHADER_EXT));
		assert_eq!(mesh.memory[1].1, Access::TRANSFER_READ);
	}

	#[test]
	fn only_last_mip_is_visible_to_transfer() {
		assert_eq!(after_reduce(false).memory[0].1, Access::COMPUTE_READ);
		let last = after_reduce(true).memory[0].1;
		assert!(last.stage.contains(vk::PipelineStageFlags2::COMPUTE_SHADER));
		assert!(last.access.contains(vk::AccessFlags2::TRANSFER_READ));
	}
}
