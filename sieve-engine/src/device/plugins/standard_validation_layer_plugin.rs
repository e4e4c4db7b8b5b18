use crate::device::init::{InstanceSupport, Plugin};
use smallvec::{SmallVec, smallvec};
use std::ffi::CStr;

pub const STANDARD_VALIDATION_LAYER_NAME: &CStr = c"VK_LAYER_KHRONOS_validation";

pub struct StandardValidationLayerPlugin;

impl Plugin for StandardValidationLayerPlugin {
	fn instance_config(&self, support: &InstanceSupport) -> (SmallVec<[&'static CStr; 2]>, SmallVec<[&'static CStr; 1]>) {
		if support.has_layer(STANDARD_VALIDATION_LAYER_NAME) {
			(SmallVec::new(), smallvec![STANDARD_VALIDATION_LAYER_NAME])
		} else {
			log::warn!("Standard Validation Layer is not available!");
			(SmallVec::new(), SmallVec::new())
		}
	}
}
