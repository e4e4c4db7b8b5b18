use crate::application_config::{ApplicationConfig, ENGINE_APPLICATION_CONFIG};
use crate::device::capabilities::{DeviceCapabilities, FeatureSupport};
use crate::device::debug::Debug;
use crate::device::error::RenderError;
use ash::{ext, khr, vk};
use gpu_allocator::vulkan::{Allocator, AllocatorCreateDesc};
use parking_lot::Mutex;
use raw_window_handle::{RawDisplayHandle, RawWindowHandle};
use smallvec::SmallVec;
use std::ffi::{CStr, CString};
use std::mem::ManuallyDrop;

/// Instance level extensions and layers the loader offers.
pub struct InstanceSupport {
	pub extensions: Vec<CString>,
	pub layers: Vec<CString>,
}

impl InstanceSupport {
	pub fn query(entry: &ash::Entry) -> Result<Self, RenderError> {
		let extensions = unsafe { entry.enumerate_instance_extension_properties(None)? }
			.iter()
			.filter_map(|e| e.extension_name_as_c_str().ok().map(CStr::to_owned))
			.collect();
		let layers = unsafe { entry.enumerate_instance_layer_properties()? }
			.iter()
			.filter_map(|l| l.layer_name_as_c_str().ok().map(CStr::to_owned))
			.collect();
		Ok(Self { extensions, layers })
	}

	pub fn has_extension(&self, name: &CStr) -> bool {
		self.extensions.iter().any(|e| e.as_c_str() == name)
	}

	pub fn has_layer(&self, name: &CStr) -> bool {
		self.layers.iter().any(|l| l.as_c_str() == name)
	}
}

pub trait Plugin {
	/// Return what instance extensions or layers you would like to be enabled.
	/// Only request what [`InstanceSupport`] reports as available.
	fn instance_config(&self, _support: &InstanceSupport) -> (SmallVec<[&'static CStr; 2]>, SmallVec<[&'static CStr; 1]>) {
		(SmallVec::new(), SmallVec::new())
	}

	/// Check a PhysicalDevice and either disallow it or give it a score to be selected.
	/// All scores are accumulated and the highest PhysicalDevice allowed by everyone wins.
	///
	/// # Returns
	/// * to disallow a device return `None`
	/// * to set a priority for a Device return `Some(priority)`
	/// * allow the device without any priority changes return `Some(0)`
	fn physical_device_filter(
		&self,
		_instance: &ash::Instance,
		_physical_device: vk::PhysicalDevice,
		_capabilities: &DeviceCapabilities,
	) -> Option<i32> {
		Some(0)
	}

	/// Return additional device extensions, only request what the PhysicalDevice supports.
	fn device_extensions(
		&self,
		_instance: &ash::Instance,
		_physical_device: vk::PhysicalDevice,
	) -> SmallVec<[&'static CStr; 2]> {
		SmallVec::new()
	}
}

/// The device and everything created alongside it, shared by all renderer resources.
pub struct Init {
	pub entry: ash::Entry,
	pub instance: ash::Instance,
	pub surface_instance: khr::surface::Instance,
	pub surface: vk::SurfaceKHR,
	pub physical_device: vk::PhysicalDevice,
	pub properties: vk::PhysicalDeviceProperties,
	pub device: ash::Device,
	pub queue_family: u32,
	pub queue: vk::Queue,
	pub capabilities: DeviceCapabilities,
	pub swapchain_device: khr::swapchain::Device,
	pub push_descriptor: khr::push_descriptor::Device,
	/// present iff [`DeviceCapabilities::mesh_shading`]
	pub mesh_shader: Option<ext::mesh_shader::Device>,
	pub allocator: ManuallyDrop<Mutex<Allocator>>,
	debug: Option<Debug>,
}

impl Init {
	#[profiling::function]
	pub fn new(
		application_config: ApplicationConfig,
		plugins: &[&dyn Plugin],
		display: RawDisplayHandle,
		window: RawWindowHandle,
	) -> Result<Self, RenderError> {
		let entry = unsafe { ash::Entry::load()? };
		let support = InstanceSupport::query(&entry)?;

		// instance
		let mut extensions = ash_window::enumerate_required_extensions(display)?.to_vec();
		let mut layers = Vec::new();
		for (e, l) in plugins.iter().map(|p| p.instance_config(&support)) {
			extensions.extend(e.iter().map(|e| e.as_ptr()));
			layers.extend(l.iter().map(|l| l.as_ptr()));
		}
		let debug_utils = support.has_extension(ext::debug_utils::NAME);
		if debug_utils {
			extensions.push(ext::debug_utils::NAME.as_ptr());
		}

		let application_name = CString::new(application_config.name).unwrap_or_default();
		let engine_name = CString::new(ENGINE_APPLICATION_CONFIG.name).unwrap_or_default();
		let app_info = vk::ApplicationInfo::default()
			.application_name(&application_name)
			.application_version(application_config.version.to_vk())
			.engine_name(&engine_name)
			.engine_version(ENGINE_APPLICATION_CONFIG.version.to_vk())
			.api_version(vk::API_VERSION_1_3);
		let instance = unsafe {
			entry.create_instance(
				&vk::InstanceCreateInfo::default()
					.application_info(&app_info)
					.enabled_extension_names(&extensions)
					.enabled_layer_names(&layers),
				None,
			)?
		};
		let debug = debug_utils.then(|| Debug::new(&entry, &instance)).transpose()?;

		let surface_instance = khr::surface::Instance::new(&entry, &instance);
		let surface = unsafe { ash_window::create_surface(&entry, &instance, display, window, None)? };

		// physical device selection
		let (physical_device, queue_family, capabilities) = unsafe { instance.enumerate_physical_devices()? }
			.into_iter()
			.filter_map(|phy| {
				let capabilities = match FeatureSupport::query(&instance, phy).and_then(|s| s.capabilities()) {
					Ok(c) => c,
					Err(e) => {
						log::info!("skipping {}: {}", device_name(&instance, phy), e);
						return None;
					}
				};
				let queue_family = graphics_present_queue(&instance, &surface_instance, surface, phy)?;
				let score = plugins
					.iter()
					.map(|p| p.physical_device_filter(&instance, phy, &capabilities))
					.try_fold(0, |acc, s| s.map(|s| acc + s))?;
				Some((score, phy, queue_family, capabilities))
			})
			.max_by_key(|(score, ..)| *score)
			.map(|(_, phy, queue_family, capabilities)| (phy, queue_family, capabilities))
			.ok_or(RenderError::NoSuitableDevice)?;
		let properties = unsafe { instance.get_physical_device_properties(physical_device) };
		log::info!(
			"selected {} with {:?}",
			device_name(&instance, physical_device),
			capabilities
		);

		// device
		let mut device_extensions = capabilities.device_extensions().to_vec();
		for p in plugins {
			device_extensions.extend(p.device_extensions(&instance, physical_device));
		}
		let device_extensions = device_extensions.iter().map(|e| e.as_ptr()).collect::<Vec<_>>();

		let features = vk::PhysicalDeviceFeatures::default()
			.multi_draw_indirect(true)
			.pipeline_statistics_query(capabilities.pipeline_statistics);
		let mut v11 = vk::PhysicalDeviceVulkan11Features::default().shader_draw_parameters(true);
		let mut v12 = vk::PhysicalDeviceVulkan12Features::default()
			.draw_indirect_count(capabilities.draw_indirect_count)
			.vulkan_memory_model(true)
			.vulkan_memory_model_device_scope(true);
		let mut v13 = vk::PhysicalDeviceVulkan13Features::default()
			.dynamic_rendering(true)
			.synchronization2(true);
		let mut mesh = vk::PhysicalDeviceMeshShaderFeaturesEXT::default()
			.task_shader(true)
			.mesh_shader(true);
		let priorities = [1.];
		let queue_infos = [vk::DeviceQueueCreateInfo::default()
			.queue_family_index(queue_family)
			.queue_priorities(&priorities)];
		let mut device_info = vk::DeviceCreateInfo::default()
			.push_next(&mut v11)
			.push_next(&mut v12)
			.push_next(&mut v13)
			.queue_create_infos(&queue_infos)
			.enabled_extension_names(&device_extensions)
			.enabled_features(&features);
		if capabilities.mesh_shading {
			device_info = device_info.push_next(&mut mesh);
		}
		let device = unsafe { instance.create_device(physical_device, &device_info, None)? };
		let queue = unsafe { device.get_device_queue(queue_family, 0) };

		let allocator = Allocator::new(&AllocatorCreateDesc {
			instance: instance.clone(),
			device: device.clone(),
			physical_device,
			debug_settings: Default::default(),
			buffer_device_address: false,
			allocation_sizes: Default::default(),
		})?;

		Ok(Self {
			swapchain_device: khr::swapchain::Device::new(&instance, &device),
			push_descriptor: khr::push_descriptor::Device::new(&instance, &device),
			mesh_shader: capabilities
				.mesh_shading
				.then(|| ext::mesh_shader::Device::new(&instance, &device)),
			allocator: ManuallyDrop::new(Mutex::new(allocator)),
			entry,
			instance,
			surface_instance,
			surface,
			physical_device,
			properties,
			device,
			queue_family,
			queue,
			capabilities,
			debug,
		})
	}

	/// Nanoseconds per timestamp tick.
	pub fn timestamp_period(&self) -> f32 {
		self.properties.limits.timestamp_period
	}

	pub fn wait_idle(&self) -> Result<(), RenderError> {
		unsafe { self.device.device_wait_idle()? };
		Ok(())
	}
}

impl Drop for Init {
	fn drop(&mut self) {
		unsafe {
			if let Err(e) = self.device.device_wait_idle() {
				log::error!("device_wait_idle failed during shutdown: {e}");
			}
			ManuallyDrop::drop(&mut self.allocator);
			self.device.destroy_device(None);
			self.surface_instance.destroy_surface(self.surface, None);
			if let Some(debug) = &mut self.debug {
				debug.destroy();
			}
			self.instance.destroy_instance(None);
		}
	}
}

fn device_name(instance: &ash::Instance, physical_device: vk::PhysicalDevice) -> String {
	let properties = unsafe { instance.get_physical_device_properties(physical_device) };
	properties
		.device_name_as_c_str()
		.map(|n| n.to_string_lossy().into_owned())
		.unwrap_or_default()
}

fn graphics_present_queue(
	instance: &ash::Instance,
	surface_instance: &khr::surface::Instance,
	surface: vk::SurfaceKHR,
	physical_device: vk::PhysicalDevice,
) -> Option<u32> {
	unsafe { instance.get_physical_device_queue_family_properties(physical_device) }
		.iter()
		.enumerate()
		.find_map(|(index, properties)| {
			let graphics = properties
				.queue_flags
				.contains(vk::QueueFlags::GRAPHICS | vk::QueueFlags::COMPUTE);
			let present = unsafe {
				surface_instance.get_physical_device_surface_support(physical_device, index as u32, surface)
			}
			.unwrap_or(false);
			(graphics && present).then_some(index as u32)
		})
}
