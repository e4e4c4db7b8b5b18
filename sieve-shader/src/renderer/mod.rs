pub mod bindings;
pub mod camera;
pub mod depth_pyramid;
pub mod depth_reduce;
pub mod draw;
pub mod draw_cull;
pub mod frame_data;
pub mod frustum;
pub mod lod_selection;
pub mod mesh;
pub mod mesh_shader;
pub mod meshlet_shader;
