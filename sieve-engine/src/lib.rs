pub mod application_config;
pub mod device;
pub mod renderer;
pub mod window;
