/// Steps of one frame of the orchestrator.
///
/// Recording order within the command buffer follows the variants: culling with the previous frame's pyramid,
/// the handover of the depth target from the previous frame's pyramid build, the geometry pass and finally the
/// pyramid build from this frame's depth.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum FrameState {
	Acquire,
	RecordCull,
	/// Hands the previous frame's depth target over to this frame's geometry pass. The pyramid it built is already
	/// visible to the cull through the barrier after its last mip, so only the attachment transitions are recorded.
	RecordOcclusionBuild,
	RecordGeometryPass,
	RecordPyramidBuild,
	Submit,
	Present,
	/// swapchain and all size dependent targets are rebuilt, the frame is dropped
	Recreate,
	Done,
}

/// Result of executing one step.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum StepOutcome {
	Continue,
	/// acquire or present reported an out of date or suboptimal swapchain, or the window was resized
	OutOfDate,
}

impl FrameState {
	pub fn next(self, outcome: StepOutcome) -> FrameState {
		use FrameState::*;
		match (self, outcome) {
			(Acquire, StepOutcome::OutOfDate) => Recreate,
			(Acquire, StepOutcome::Continue) => RecordCull,
			(RecordCull, _) => RecordOcclusionBuild,
			(RecordOcclusionBuild, _) => RecordGeometryPass,
			(RecordGeometryPass, _) => RecordPyramidBuild,
			(RecordPyramidBuild, _) => Submit,
			(Submit, _) => Present,
			(Present, StepOutcome::OutOfDate) => Recreate,
			(Present, StepOutcome::Continue) => Done,
			(Recreate, _) | (Done, _) => Done,
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn run(outcomes: impl Fn(FrameState) -> StepOutcome) -> Vec<FrameState> {
		let mut state = FrameState::Acquire;
		let mut visited = vec![state];
		while state != FrameState::Done {
			state = state.next(outcomes(state));
			visited.push(state);
			assert!(visited.len() < 16, "frame never finishes");
		}
		visited
	}

	#[test]
	fn regular_frame_visits_all_steps_in_order() {
		use FrameState::*;
		assert_eq!(run(|_| StepOutcome::Continue), vec![
			Acquire,
			RecordCull,
			RecordOcclusionBuild,
			RecordGeometryPass,
			RecordPyramidBuild,
			Submit,
			Present,
			Done
		]);
	}

	#[test]
	fn out_of_date_acquire_recreates_without_recording() {
		let visited = run(|s| {
			if s == FrameState::Acquire {
				StepOutcome::OutOfDate
			} else {
				StepOutcome::Continue
			}
		});
		assert_eq!(visited, vec![FrameState::Acquire, FrameState::Recreate, FrameState::Done]);
	}

	#[test]
	fn out_of_date_present_recreates_after_submit() {
		let visited = run(|s| {
			if s == FrameState::Present {
				StepOutcome::OutOfDate
			} else {
				StepOutcome::Continue
			}
		});
		assert_eq!(&visited[visited.len() - 3..], &[FrameState::Present, FrameState::Recreate, FrameState::Done]);
		assert!(visited.contains(&FrameState::Submit));
	}
}
