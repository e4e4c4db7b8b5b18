pub mod cli_args;
pub mod delta_time;
pub mod fps_camera_controller;
pub mod main_loop;
pub mod scene_loading;
pub mod toggle_selector;
