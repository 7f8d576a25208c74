//! CPAL-based output device enumeration
//!
//! Provides the device-selection side of the audio pipeline boundary
//! through CPAL, which abstracts WASAPI, ALSA/PulseAudio and CoreAudio.

use cpal::traits::{DeviceTrait, HostTrait};
use synthmix_core::domain::audio::{
    AudioEnumerator, AudioError, DeviceId, DeviceInfo, DeviceType, Result,
};
use tracing::{debug, info, warn};

/// CPAL-based audio enumerator
pub struct CpalEnumerator {
    host: cpal::Host,
}

impl Default for CpalEnumerator {
    fn default() -> Self {
        info!("Initializing CPAL enumerator");
        Self::new()
    }
}

impl CpalEnumerator {
    pub fn new() -> Self {
        let host = cpal::default_host();
        debug!("Using audio host: {:?}", host.id());
        Self { host }
    }

    fn describe(device: &cpal::Device, default_name: Option<&str>) -> DeviceInfo {
        #[allow(deprecated)]
        let name = device
            .name()
            .unwrap_or_else(|_| "Unknown Device".to_string());

        let device_type = if device.supported_input_configs().is_ok() {
            DeviceType::Duplex
        } else {
            DeviceType::Output
        };

        let default_sample_rate = device
            .default_output_config()
            .ok()
            .map(|config| config.sample_rate());

        DeviceInfo {
            id: DeviceId::new(name.clone()),
            is_default: default_name == Some(name.as_str()),
            name,
            device_type,
            default_sample_rate,
        }
    }

    #[allow(deprecated)]
    fn default_name(&self) -> Option<String> {
        self.host
            .default_output_device()
            .and_then(|device| device.name().ok())
    }
}

impl AudioEnumerator for CpalEnumerator {
    fn output_devices(&self) -> Result<Vec<DeviceInfo>> {
        info!("Enumerating output devices");
        let default_name = self.default_name();

        let cpal_devices = self
            .host
            .output_devices()
            .map_err(|e| AudioError::Backend(e.to_string()))?;

        let mut devices = Vec::new();
        for device in cpal_devices {
            if device.supported_output_configs().is_err() {
                warn!("Skipping device without output configurations");
                continue;
            }
            let info = Self::describe(&device, default_name.as_deref());
            debug!("Found device: {}", info.name);
            devices.push(info);
        }

        info!("Found {} output devices", devices.len());
        Ok(devices)
    }

    fn default_output_device(&self) -> Result<DeviceInfo> {
        let device = self
            .host
            .default_output_device()
            .ok_or(AudioError::NoOutputDevice)?;
        let mut info = Self::describe(&device, None);
        info.is_default = true;
        Ok(info)
    }
}
