//! Typed command boundary into the mixer engine
//!
//! UI and persistence callers describe a mutation as a [`Command`] value
//! and hand it to `MixerEngine::execute`.

use crate::domain::channel::ChannelId;
use crate::domain::fx::FxKind;
use crate::domain::mixer::bus::BusTarget;
use crate::domain::mixer::master::MasterEffect;

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    SetGain {
        channel: ChannelId,
        level: i32,
    },
    ResetGain {
        channel: ChannelId,
    },
    SetMute {
        channel: ChannelId,
        muted: bool,
    },
    SetSolo {
        channel: ChannelId,
        solo: bool,
    },
    SetBusTarget {
        channel: ChannelId,
        target: BusTarget,
    },
    AddFx {
        channel: ChannelId,
        kind: FxKind,
        /// `None` appends
        position: Option<usize>,
    },
    RemoveFx {
        channel: ChannelId,
        index: usize,
    },
    SetFxBypass {
        channel: ChannelId,
        index: usize,
        bypass: bool,
    },
    SetFxParams {
        channel: ChannelId,
        index: usize,
        values: Vec<f32>,
    },
    SetFxProgram {
        channel: ChannelId,
        index: usize,
        program: i32,
    },
    SetFxChunk {
        channel: ChannelId,
        index: usize,
        chunk: Vec<u8>,
    },
    SetMasterFxEnabled {
        effect: MasterEffect,
        enabled: bool,
    },
    SetPresetBank {
        bank: usize,
    },
    ResetChannels,
}

/// Result of a successfully executed command
#[derive(Debug, Clone, PartialEq)]
pub enum CommandOutcome {
    Applied,
    FxAdded { channel: ChannelId, index: usize },
    FxRemoved { channel: ChannelId, kind: FxKind },
}
