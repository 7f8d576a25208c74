//! Domain entities and business rules

pub mod audio;
pub mod channel;
pub mod command;
pub mod config;
pub mod error;
pub mod fx;
pub mod meter;
pub mod mixer;
pub mod plugin;
pub mod snapshot;

pub use audio::{AudioEnumerator, AudioError, DeviceId, DeviceInfo, DeviceType, NoteEvent};
pub use channel::{
    default_names, Channel, ChannelId, ChannelKind, Gain, CHANNEL_COUNT, INSTRUMENT_COUNT,
    PLUGIN_SLOT_COUNT,
};
pub use command::{Command, CommandOutcome};
pub use config::{
    AppConfig, AudioDeviceConfig, ChannelRecord, ConfigError, ConfigManager, InstrumentSlotRecord,
    MixerSettings, SynthMixConfig,
};
pub use error::MixerError;
pub use fx::{BuiltinFx, FxChain, FxChainRecord, FxKind, FxUnit, PluginUid};
pub use meter::PeakMeters;
pub use mixer::bus::{BusIndex, BusNames, BusRoutingTable, BusTarget, BUS_COUNT};
pub use mixer::master::{MasterEffect, MasterFx, MasterFxSlot};
pub use mixer::{MixerEngine, MixerEvent, RestoreReport, PRESET_BANK_COUNT};
pub use plugin::{group_by_vendor, NullHost, PluginHandle, PluginHost, PluginInfo, PluginInstance};
pub use snapshot::{ChannelSnapshot, FxSnapshot, MasterFxSnapshot, RenderSnapshot, SnapshotPublisher};
