//! Master bus effects
//!
//! The master bus carries a fixed trio of built-in effects, each switched
//! on or off with its own parameter set.

use crate::domain::fx::BuiltinFx;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::trace;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MasterEffect {
    Equalizer,
    Chorus,
    Reverb,
}

impl MasterEffect {
    pub const ALL: [MasterEffect; 3] = [
        MasterEffect::Equalizer,
        MasterEffect::Chorus,
        MasterEffect::Reverb,
    ];

    /// Built-in effect that renders this slot
    pub fn builtin(self) -> BuiltinFx {
        match self {
            MasterEffect::Equalizer => BuiltinFx::Eq31Band,
            MasterEffect::Chorus => BuiltinFx::Chorus,
            MasterEffect::Reverb => BuiltinFx::Reverb,
        }
    }
}

impl fmt::Display for MasterEffect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MasterEffect::Equalizer => write!(f, "equalizer"),
            MasterEffect::Chorus => write!(f, "chorus"),
            MasterEffect::Reverb => write!(f, "reverb"),
        }
    }
}

impl FromStr for MasterEffect {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "eq" | "equalizer" => Ok(MasterEffect::Equalizer),
            "chorus" => Ok(MasterEffect::Chorus),
            "reverb" => Ok(MasterEffect::Reverb),
            other => Err(format!("unknown master effect '{}'", other)),
        }
    }
}

/// On/off flag and parameters of one master effect
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MasterFxSlot {
    pub enabled: bool,
    pub params: Vec<f32>,
}

/// Persisted and live state of the master effects
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MasterFx {
    pub equalizer: MasterFxSlot,
    pub chorus: MasterFxSlot,
    pub reverb: MasterFxSlot,
}

impl MasterFx {
    pub fn slot(&self, effect: MasterEffect) -> &MasterFxSlot {
        match effect {
            MasterEffect::Equalizer => &self.equalizer,
            MasterEffect::Chorus => &self.chorus,
            MasterEffect::Reverb => &self.reverb,
        }
    }

    fn slot_mut(&mut self, effect: MasterEffect) -> &mut MasterFxSlot {
        match effect {
            MasterEffect::Equalizer => &mut self.equalizer,
            MasterEffect::Chorus => &mut self.chorus,
            MasterEffect::Reverb => &mut self.reverb,
        }
    }

    pub fn set_enabled(&mut self, effect: MasterEffect, enabled: bool) {
        self.slot_mut(effect).enabled = enabled;
        trace!("Master {} enabled = {}", effect, enabled);
    }

    pub fn set_params(&mut self, effect: MasterEffect, params: &[f32]) {
        self.slot_mut(effect).params = params.to_vec();
        trace!("Master {} params set ({} values)", effect, params.len());
    }

    /// Enabled effects in processing order
    pub fn enabled(&self) -> impl Iterator<Item = (MasterEffect, &MasterFxSlot)> {
        MasterEffect::ALL
            .into_iter()
            .map(|effect| (effect, self.slot(effect)))
            .filter(|(_, slot)| slot.enabled)
    }
}
