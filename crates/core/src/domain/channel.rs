//! Fixed channel topology and per-channel mixing state
//!
//! The mixer has a fixed set of channels laid out densely in this order:
//! instrument slots (melodic then percussion), plugin-instrument slots,
//! then aggregation buses. No channel is created or destroyed at runtime.

use crate::domain::error::{MixerError, Result};
use crate::domain::fx::FxChain;
use crate::domain::mixer::bus::{BusIndex, BusTarget, BUS_COUNT};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::trace;

/// Melodic + percussion instrument channels
pub const INSTRUMENT_COUNT: usize = 42;

/// Plugin-instrument (VSTi) channels
pub const PLUGIN_SLOT_COUNT: usize = 4;

pub const CHANNEL_COUNT: usize = INSTRUMENT_COUNT + PLUGIN_SLOT_COUNT + BUS_COUNT;

const PLUGIN_START: usize = INSTRUMENT_COUNT;
const BUS_START: usize = INSTRUMENT_COUNT + PLUGIN_SLOT_COUNT;

const INSTRUMENT_NAMES: [(&str, &str); INSTRUMENT_COUNT] = [
    ("Piano", "Piano"),
    ("Organ", "Organ"),
    ("Accordn", "Accordion"),
    ("Chmt.P", "Chromatic Percussion"),
    ("Percsve", "Percussive"),
    ("Bass", "Bass"),
    ("Nylon", "Acoustic Guitar (nylon)"),
    ("Steel", "Acoustic Guitar (steel)"),
    ("Jazz", "Electric Guitar (jazz)"),
    ("Clean", "Electric Guitar (clean)"),
    ("Overdrv", "Overdriven Guitar"),
    ("Distrn", "Distortion Guitar"),
    ("Harmncs", "Harmonics Guitar"),
    ("Trumpet", "Trumpet"),
    ("Brass", "Brass"),
    ("S.Brass", "Synth Brass"),
    ("Saxphn", "Saxophone"),
    ("Reed", "Reed"),
    ("Pipe", "Pipe"),
    ("Strings", "Strings"),
    ("Ensembl", "Ensemble"),
    ("SynthL", "Synth Lead"),
    ("SynthP", "Synth Pad"),
    ("SynthE", "Synth Effects"),
    ("Ethnic", "Ethnic"),
    ("SoundFX", "Sound effects"),
    ("Kick", "Kick (Bass Drum)"),
    ("Snare", "Snare"),
    ("S.Stick", "Side Stick/Rimshot"),
    ("HighTom", "High Tom"),
    ("MidTom", "Mid Tom"),
    ("LowTom", "Low Tom"),
    ("Hihat", "Hi-hat"),
    ("Cowbell", "Cowbell"),
    ("Crash", "Crash Cymbal"),
    ("Ride", "Ride Cymbal"),
    ("Bongo", "Bongo"),
    ("Conga", "Conga"),
    ("Timbale", "Timbale"),
    ("Ching", "Ching / Triangle"),
    ("Chab", "Chab"),
    ("PercEtc", "Percussion Etc."),
];

/// What role a channel plays in the topology
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChannelKind {
    Instrument,
    /// Plugin-instrument channel with its position among those channels
    PluginInstrument(usize),
    Bus(BusIndex),
}

/// Stable identifier for one mixer channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "usize", into = "usize")]
pub struct ChannelId(u8);

impl ChannelId {
    pub fn from_index(index: usize) -> Result<Self> {
        if index < CHANNEL_COUNT {
            Ok(Self(index as u8))
        } else {
            Err(MixerError::UnknownChannel(index))
        }
    }

    pub fn instrument(index: usize) -> Result<Self> {
        if index < INSTRUMENT_COUNT {
            Ok(Self(index as u8))
        } else {
            Err(MixerError::UnknownChannel(index))
        }
    }

    pub fn plugin_instrument(slot: usize) -> Result<Self> {
        if slot < PLUGIN_SLOT_COUNT {
            Ok(Self((PLUGIN_START + slot) as u8))
        } else {
            Err(MixerError::UnknownPluginSlot(slot))
        }
    }

    pub fn bus(bus: BusIndex) -> Self {
        Self((BUS_START + bus.index()) as u8)
    }

    pub fn index(self) -> usize {
        self.0 as usize
    }

    pub fn kind(self) -> ChannelKind {
        let index = self.index();
        if index < PLUGIN_START {
            ChannelKind::Instrument
        } else if index < BUS_START {
            ChannelKind::PluginInstrument(index - PLUGIN_START)
        } else {
            // In range by construction
            ChannelKind::Bus(BusIndex::from_raw((index - BUS_START) as u8))
        }
    }

    pub fn is_bus(self) -> bool {
        matches!(self.kind(), ChannelKind::Bus(_))
    }

    /// The bus this channel *is*, if it is a bus channel
    pub fn as_bus(self) -> Option<BusIndex> {
        match self.kind() {
            ChannelKind::Bus(bus) => Some(bus),
            _ => None,
        }
    }

    /// All channels in topology order
    pub fn all() -> impl Iterator<Item = ChannelId> {
        (0..CHANNEL_COUNT).map(|i| Self(i as u8))
    }
}

impl TryFrom<usize> for ChannelId {
    type Error = MixerError;

    fn try_from(index: usize) -> Result<Self> {
        Self::from_index(index)
    }
}

impl From<ChannelId> for usize {
    fn from(id: ChannelId) -> usize {
        id.index()
    }
}

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", default_names(*self).0)
    }
}

/// Factory short and full display names for a channel
pub fn default_names(id: ChannelId) -> (String, String) {
    match id.kind() {
        ChannelKind::Instrument => {
            let (short, full) = INSTRUMENT_NAMES[id.index()];
            (short.to_string(), full.to_string())
        }
        ChannelKind::PluginInstrument(slot) => (
            format!("VSTi {}", slot + 1),
            format!("VST instruments {}", slot + 1),
        ),
        ChannelKind::Bus(bus) => (
            format!("Bus {}", bus.number()),
            format!("Bus Group {}", bus.number()),
        ),
    }
}

/// Integer channel level on a 0..=100 scale
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Gain(u8);

impl Gain {
    pub const MIN: i32 = 0;
    pub const MAX: i32 = 100;
    /// Mid-scale default, rendered at unity amplitude
    pub const DEFAULT: i32 = 50;

    pub fn new(level: i32) -> Self {
        Self(level.clamp(Self::MIN, Self::MAX) as u8)
    }

    pub fn level(&self) -> i32 {
        self.0 as i32
    }

    /// Linear amplitude factor used by the render pass
    pub fn amplitude(&self) -> f32 {
        self.0 as f32 / Self::DEFAULT as f32
    }
}

impl Default for Gain {
    fn default() -> Self {
        Self::new(Self::DEFAULT)
    }
}

/// One addressable mixing point
#[derive(Debug)]
pub struct Channel {
    pub id: ChannelId,
    pub gain: Gain,
    pub muted: bool,
    pub solo: bool,
    pub bus: BusTarget,
    pub fx: FxChain,
    /// Bound plugin-instrument slot (plugin-instrument channels only)
    pub plugin_slot: Option<usize>,
    /// Output device index, passed through to the audio pipeline
    pub device: i32,
    /// Speaker assignment index, passed through to the audio pipeline
    pub speaker: i32,
}

impl Channel {
    pub fn new(id: ChannelId) -> Self {
        Self {
            id,
            gain: Gain::default(),
            muted: false,
            solo: false,
            bus: BusTarget::Master,
            fx: FxChain::new(),
            plugin_slot: None,
            device: 0,
            speaker: 0,
        }
    }

    pub fn set_gain(&mut self, level: i32) {
        self.gain = Gain::new(level);
        trace!("Channel {} gain set to {}", self.id, self.gain.level());
    }

    pub fn reset_gain(&mut self) {
        self.set_gain(Gain::DEFAULT);
    }

    /// Audible given the global solo state
    pub fn is_audible(&self, any_solo: bool) -> bool {
        if self.muted {
            return false;
        }
        if any_solo && !self.solo {
            return false;
        }
        true
    }
}
