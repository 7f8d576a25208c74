//! Audio pipeline boundary
//!
//! The engine does not render to hardware itself. These are the types it
//! exchanges with the audio pipeline: output device selection and the
//! note-trigger callback that drives metering. Platform implementations
//! live in the `infra` crate.

use crate::domain::channel::ChannelId;
use crate::domain::mixer::bus::BusIndex;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

/// Errors that can occur at the device boundary
#[derive(Debug, Error)]
pub enum AudioError {
    /// Requested audio device was not found
    #[error("Device not found: {0}")]
    DeviceNotFound(String),

    /// No output device at all
    #[error("No output device available")]
    NoOutputDevice,

    /// Error reported by the platform backend
    #[error("Backend error: {0}")]
    Backend(String),
}

pub type Result<T> = std::result::Result<T, AudioError>;

/// Unique identifier for an audio device
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DeviceId(String);

impl DeviceId {
    pub fn new(id: String) -> Self {
        Self(id)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeviceType {
    Input,
    Output,
    Duplex,
}

/// Information about an audio device
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceInfo {
    pub id: DeviceId,
    pub name: String,
    pub device_type: DeviceType,
    pub default_sample_rate: Option<u32>,
    pub is_default: bool,
}

/// Trait for enumerating output devices
pub trait AudioEnumerator: Send + Sync {
    fn output_devices(&self) -> Result<Vec<DeviceInfo>>;

    fn default_output_device(&self) -> Result<DeviceInfo>;

    /// Resolve the configured output device
    ///
    /// Falls back to the system default when the named device is gone.
    fn select_output(&self, name: Option<&str>) -> Result<DeviceInfo> {
        let Some(name) = name else {
            return self.default_output_device();
        };
        match self
            .output_devices()?
            .into_iter()
            .find(|d| d.name == name || d.id.as_str() == name)
        {
            Some(device) => Ok(device),
            None => {
                warn!("Output device '{}' not found, using default", name);
                self.default_output_device()
            }
        }
    }
}

/// Payload of the pipeline's note-trigger callback
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NoteEvent {
    pub channel: ChannelId,
    /// Bus the channel was routed to when the note played
    pub bus: Option<BusIndex>,
    pub note: u8,
    pub velocity: u8,
}

impl NoteEvent {
    /// Meter level for this note, 0.0..=1.0
    pub fn level(&self) -> f32 {
        f32::from(self.velocity.min(127)) / 127.0
    }
}
