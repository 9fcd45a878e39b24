//! Capture device discovery.

use altimeter_media_model::{Device, DevicePosition, MediaType};

/// Source of capture devices.
///
/// Injected into the session manager so device availability can be
/// simulated: no device, one device, front and back cameras.
pub trait DeviceRegistry: Send + Sync {
    /// Devices of the given media type, optionally restricted to a position,
    /// in discovery order.
    fn list_devices(&self, media: MediaType, position: Option<DevicePosition>) -> Vec<Device>;

    /// The platform's default device for a media type.
    fn default_device(&self, media: MediaType) -> Option<Device>;

    /// Available devices in switching order: back before front before
    /// unspecified, discovery order within each position.
    fn switch_order(&self, media: MediaType) -> Vec<Device> {
        let mut devices: Vec<Device> = self
            .list_devices(media, None)
            .into_iter()
            .filter(Device::is_available)
            .collect();
        devices.sort_by_key(|d| d.position.switch_rank());
        devices
    }

    /// Device the session starts with: first in switching order, else the
    /// platform default.
    fn initial_device(&self, media: MediaType) -> Option<Device> {
        self.switch_order(media)
            .into_iter()
            .next()
            .or_else(|| self.default_device(media))
    }
}

/// A registry backed by a fixed device list.
#[derive(Debug, Clone, Default)]
pub struct StaticDeviceRegistry {
    devices: Vec<Device>,
    default_video: Option<usize>,
}

impl StaticDeviceRegistry {
    pub fn new(devices: Vec<Device>) -> Self {
        Self {
            devices,
            default_video: None,
        }
    }

    /// Mark the device at `index` as the platform default camera.
    pub fn with_default_video(mut self, index: usize) -> Self {
        self.default_video = Some(index);
        self
    }

    /// Mutable access for simulating hot-plug and suspension in tests.
    pub fn device_mut(&mut self, index: usize) -> Option<&mut Device> {
        self.devices.get_mut(index)
    }
}

impl DeviceRegistry for StaticDeviceRegistry {
    fn list_devices(&self, media: MediaType, position: Option<DevicePosition>) -> Vec<Device> {
        self.devices
            .iter()
            .filter(|d| d.media_type == media)
            .filter(|d| position.map_or(true, |p| d.position == p))
            .cloned()
            .collect()
    }

    fn default_device(&self, media: MediaType) -> Option<Device> {
        if media == MediaType::Video {
            if let Some(device) = self
                .default_video
                .and_then(|i| self.devices.get(i))
                .filter(|d| d.is_available())
            {
                return Some(device.clone());
            }
        }
        self.devices
            .iter()
            .find(|d| d.media_type == media && d.is_available())
            .cloned()
    }
}
