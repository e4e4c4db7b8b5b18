pub mod geometry_gpu;
pub mod geometry_pass;
pub mod mesh_pipeline;
pub mod meshlet_pipeline;
