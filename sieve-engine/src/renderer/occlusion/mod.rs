pub mod depth_pyramid;
pub mod depth_reduce_compute;
