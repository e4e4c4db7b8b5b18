pub mod barrier;
pub mod buffer;
pub mod cull;
pub mod frame_barriers;
pub mod frame_config;
pub mod frame_in_flight;
pub mod frame_state;
pub mod geometry;
pub mod image;
pub mod occlusion;
pub mod pipeline;
pub mod query;
pub mod render_targets;
pub mod renderers;
pub mod shader;
pub mod stats;
