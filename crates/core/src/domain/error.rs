//! Errors reported by the mixer engine
//!
//! Every variant is locally recoverable: the engine leaves its state
//! unchanged when it returns one of these.

use crate::domain::channel::ChannelId;
use crate::domain::fx::PluginUid;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, MixerError>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MixerError {
    /// Channel index outside the fixed topology
    #[error("Unknown channel: {0}")]
    UnknownChannel(usize),

    #[error("FX index {index} out of range (chain length {len})")]
    FxIndexOutOfRange { index: usize, len: usize },

    /// Plugin identifier the host does not know about
    #[error("Unknown plugin: {0}")]
    UnknownPlugin(PluginUid),

    /// Persisted plugin identifier that does not fit a plugin uid
    #[error("Plugin identifier out of range: {0}")]
    InvalidPluginId(i64),

    /// Native plugin host is absent or disabled
    #[error("Plugin host unavailable")]
    HostUnavailable,

    /// Operation is only valid for hosted-plugin units
    #[error("Not a hosted plugin unit")]
    NotHosted,

    /// Buses always feed master and cannot be re-routed
    #[error("Channel {0} cannot be routed to a bus")]
    NotRoutable(ChannelId),

    #[error("Bus index out of range: {0}")]
    UnknownBus(usize),

    #[error("Channel {0} is not a plugin-instrument channel")]
    NotPluginChannel(ChannelId),

    #[error("Plugin instrument slot out of range: {0}")]
    UnknownPluginSlot(usize),

    #[error("Preset bank out of range: {0}")]
    UnknownPresetBank(usize),
}
