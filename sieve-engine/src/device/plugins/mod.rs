pub mod default_device_selection_plugin;
pub mod rust_gpu_workaround;
pub mod standard_validation_layer_plugin;
