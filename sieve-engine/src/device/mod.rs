pub mod capabilities;
pub mod debug;
pub mod error;
pub mod init;
pub mod plugins;
