//! Effect units and per-channel effect chains
//!
//! An FX unit is either one of the built-in effects or a hosted plugin.
//! The container never interprets parameters, programs or state blobs: it
//! stores them, forwards them to a live instance, and persists them.
//!
//! Position in the chain is the only identity a unit has. Removing a unit
//! shifts everything after it down by one.

use crate::domain::error::{MixerError, Result};
use crate::domain::plugin::{PluginHost, PluginInstance};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, trace, warn};

/// Plugin unique identifier as reported by the host
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PluginUid(pub u32);

impl fmt::Display for PluginUid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifiers below this are reserved for built-in effects
pub const BUILTIN_FX_COUNT: u32 = 8;

/// Built-in effect types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BuiltinFx {
    AutoWah,
    Chorus,
    Compressor,
    Distortion,
    Echo,
    Eq15Band,
    Eq31Band,
    Reverb,
}

impl BuiltinFx {
    pub const ALL: [BuiltinFx; BUILTIN_FX_COUNT as usize] = [
        BuiltinFx::AutoWah,
        BuiltinFx::Chorus,
        BuiltinFx::Compressor,
        BuiltinFx::Distortion,
        BuiltinFx::Echo,
        BuiltinFx::Eq15Band,
        BuiltinFx::Eq31Band,
        BuiltinFx::Reverb,
    ];

    pub fn uid(self) -> u32 {
        self as u32
    }

    pub fn name(self) -> &'static str {
        match self {
            BuiltinFx::AutoWah => "AutoWah",
            BuiltinFx::Chorus => "Chorus",
            BuiltinFx::Compressor => "Compressor",
            BuiltinFx::Distortion => "Distortion",
            BuiltinFx::Echo => "Echo",
            BuiltinFx::Eq15Band => "Equalizer 15 bands",
            BuiltinFx::Eq31Band => "Equalizer 31 bands",
            BuiltinFx::Reverb => "Reverb",
        }
    }
}

/// Closed set of effect kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FxKind {
    Builtin(BuiltinFx),
    Hosted(PluginUid),
}

impl FxKind {
    /// Persisted identifier: built-ins use 0..8, anything else is a plugin uid
    pub fn from_uid(uid: u32) -> Self {
        match BuiltinFx::ALL.get(uid as usize) {
            Some(fx) => FxKind::Builtin(*fx),
            None => FxKind::Hosted(PluginUid(uid)),
        }
    }

    pub fn uid(self) -> u32 {
        match self {
            FxKind::Builtin(fx) => fx.uid(),
            FxKind::Hosted(uid) => uid.0,
        }
    }

    pub fn is_hosted(self) -> bool {
        matches!(self, FxKind::Hosted(_))
    }
}

impl fmt::Display for FxKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FxKind::Builtin(fx) => write!(f, "{}", fx.name()),
            FxKind::Hosted(uid) => write!(f, "Plugin {}", uid),
        }
    }
}

/// One effect instance
pub struct FxUnit {
    kind: FxKind,
    bypass: bool,
    params: Vec<f32>,
    program: Option<i32>,
    chunk: Option<Vec<u8>>,
    instance: Option<Arc<dyn PluginInstance>>,
}

impl FxUnit {
    pub fn builtin(fx: BuiltinFx) -> Self {
        Self {
            kind: FxKind::Builtin(fx),
            bypass: false,
            params: Vec::new(),
            program: None,
            chunk: None,
            instance: None,
        }
    }

    pub fn hosted(instance: Arc<dyn PluginInstance>) -> Self {
        Self {
            kind: FxKind::Hosted(instance.unique_id()),
            bypass: false,
            params: Vec::new(),
            program: None,
            chunk: None,
            instance: Some(instance),
        }
    }

    /// Placeholder for a persisted plugin the host cannot provide
    ///
    /// Keeps its stored state so a later save writes it back unchanged.
    /// The renderer passes audio through it untouched.
    pub fn detached(uid: PluginUid) -> Self {
        Self {
            kind: FxKind::Hosted(uid),
            bypass: false,
            params: Vec::new(),
            program: None,
            chunk: None,
            instance: None,
        }
    }

    /// Build a unit, instantiating through `host` for hosted kinds
    pub fn create(kind: FxKind, host: &dyn PluginHost) -> Result<Self> {
        match kind {
            FxKind::Builtin(fx) => Ok(Self::builtin(fx)),
            FxKind::Hosted(uid) => host.instantiate(uid).map(Self::hosted),
        }
    }

    pub fn kind(&self) -> FxKind {
        self.kind
    }

    pub fn is_bypassed(&self) -> bool {
        self.bypass
    }

    pub fn set_bypass(&mut self, bypass: bool) {
        self.bypass = bypass;
    }

    pub fn params(&self) -> &[f32] {
        &self.params
    }

    /// Store parameter values
    ///
    /// Built-ins replace the whole vector. Hosted units overwrite the
    /// supplied prefix, keep any trailing values, and grow for extras.
    pub fn set_params(&mut self, values: &[f32]) {
        match self.kind {
            FxKind::Builtin(_) => self.params = values.to_vec(),
            FxKind::Hosted(_) => {
                let overlap = values.len().min(self.params.len());
                self.params[..overlap].copy_from_slice(&values[..overlap]);
                self.params.extend_from_slice(&values[overlap..]);
            }
        }
        if let Some(instance) = &self.instance {
            instance.set_params(values);
        }
    }

    pub fn program(&self) -> Option<i32> {
        self.program
    }

    /// Select a plugin program. Negative clears the selection.
    pub fn set_program(&mut self, program: i32) -> Result<()> {
        if !self.kind.is_hosted() {
            return Err(MixerError::NotHosted);
        }
        if program < 0 {
            self.program = None;
            return Ok(());
        }
        self.program = Some(program);
        if let Some(instance) = &self.instance {
            instance.set_program(program);
        }
        Ok(())
    }

    pub fn chunk(&self) -> Option<&[u8]> {
        self.chunk.as_deref()
    }

    /// State blob to persist: the live instance's own chunk when it
    /// reports one, otherwise the last blob stored through the engine
    pub fn saved_chunk(&self) -> Vec<u8> {
        self.instance
            .as_ref()
            .and_then(|instance| instance.chunk())
            .or_else(|| self.chunk.clone())
            .unwrap_or_default()
    }

    /// Store an opaque state blob. An empty blob clears it.
    pub fn set_chunk(&mut self, chunk: Vec<u8>) -> Result<()> {
        if !self.kind.is_hosted() {
            return Err(MixerError::NotHosted);
        }
        if chunk.is_empty() {
            self.chunk = None;
            return Ok(());
        }
        if let Some(instance) = &self.instance {
            instance.set_chunk(&chunk);
        }
        self.chunk = Some(chunk);
        Ok(())
    }

    pub fn instance(&self) -> Option<&Arc<dyn PluginInstance>> {
        self.instance.as_ref()
    }

    /// Hosted unit with no live instance behind it
    pub fn is_detached(&self) -> bool {
        self.kind.is_hosted() && self.instance.is_none()
    }

    /// Replay persisted state: bypass, blob, program, then parameters
    ///
    /// Empty blobs, negative programs and empty parameter sets are not
    /// applied.
    pub fn apply_state(
        &mut self,
        bypass: bool,
        blob: &[u8],
        program: i32,
        params: &[f32],
    ) -> Result<()> {
        self.set_bypass(bypass);
        if !blob.is_empty() {
            self.set_chunk(blob.to_vec())?;
        }
        if program >= 0 {
            self.set_program(program)?;
        }
        if !params.is_empty() {
            self.set_params(params);
        }
        Ok(())
    }

    /// Detach the live instance so the caller can schedule its destruction
    pub fn take_instance(&mut self) -> Option<Arc<dyn PluginInstance>> {
        self.instance.take()
    }
}

impl fmt::Debug for FxUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FxUnit")
            .field("kind", &self.kind)
            .field("bypass", &self.bypass)
            .field("params", &self.params)
            .field("program", &self.program)
            .field("chunk_len", &self.chunk.as_ref().map(Vec::len))
            .field("instance", &self.instance.as_ref().map(|i| i.handle()))
            .finish()
    }
}

/// Persisted FX chain: parallel arrays, index `i` describes unit `i`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FxChainRecord {
    pub unique_ids: Vec<u32>,
    pub bypass_flags: Vec<bool>,
    pub param_sets: Vec<Vec<f32>>,
    /// -1 for no program
    pub programs: Vec<i32>,
    /// Empty blob for none. An empty list means no unit has one.
    pub state_blobs: Vec<Vec<u8>>,
}

impl FxChainRecord {
    /// Number of units that can be restored from possibly ragged arrays
    pub fn restorable_len(&self) -> usize {
        let len = self
            .unique_ids
            .len()
            .min(self.bypass_flags.len())
            .min(self.param_sets.len())
            .min(self.programs.len());
        if self.state_blobs.is_empty() {
            len
        } else {
            len.min(self.state_blobs.len())
        }
    }

    pub fn is_empty(&self) -> bool {
        self.restorable_len() == 0
    }
}

/// Ordered effect chain of one channel
#[derive(Debug, Default)]
pub struct FxChain {
    units: Vec<FxUnit>,
}

impl FxChain {
    pub fn new() -> Self {
        Self { units: Vec::new() }
    }

    /// Append a unit and return its index
    pub fn add(&mut self, kind: FxKind, host: &dyn PluginHost) -> Result<usize> {
        self.insert(kind, self.units.len(), host)
    }

    /// Insert a unit at `position` (`len` appends)
    ///
    /// Hosted kinds are instantiated first. On failure the chain is untouched.
    pub fn insert(&mut self, kind: FxKind, position: usize, host: &dyn PluginHost) -> Result<usize> {
        if position > self.units.len() {
            return Err(MixerError::FxIndexOutOfRange {
                index: position,
                len: self.units.len(),
            });
        }
        let unit = FxUnit::create(kind, host)?;
        self.units.insert(position, unit);
        debug!("Inserted {} at position {}", kind, position);
        Ok(position)
    }

    /// Remove the unit at `index`, handing it back for deferred teardown
    pub fn remove(&mut self, index: usize) -> Result<FxUnit> {
        self.check(index)?;
        let unit = self.units.remove(index);
        debug!("Removed {} from position {}", unit.kind(), index);
        Ok(unit)
    }

    /// Take every unit out of the chain
    pub fn clear(&mut self) -> Vec<FxUnit> {
        std::mem::take(&mut self.units)
    }

    pub fn set_bypass(&mut self, index: usize, bypass: bool) -> Result<()> {
        self.unit_mut(index)?.set_bypass(bypass);
        trace!("FX {} bypass = {}", index, bypass);
        Ok(())
    }

    pub fn set_params(&mut self, index: usize, values: &[f32]) -> Result<()> {
        self.unit_mut(index)?.set_params(values);
        trace!("FX {} params set ({} values)", index, values.len());
        Ok(())
    }

    pub fn set_program(&mut self, index: usize, program: i32) -> Result<()> {
        self.unit_mut(index)?.set_program(program)
    }

    pub fn set_chunk(&mut self, index: usize, chunk: Vec<u8>) -> Result<()> {
        self.unit_mut(index)?.set_chunk(chunk)
    }

    pub fn get(&self, index: usize) -> Option<&FxUnit> {
        self.units.get(index)
    }

    pub fn units(&self) -> &[FxUnit] {
        &self.units
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    /// Persisted form of the chain
    pub fn record(&self) -> FxChainRecord {
        let mut record = FxChainRecord::default();
        for unit in &self.units {
            record.unique_ids.push(unit.kind().uid());
            record.bypass_flags.push(unit.is_bypassed());
            record.param_sets.push(unit.params().to_vec());
            record.programs.push(unit.program().unwrap_or(-1));
            record.state_blobs.push(unit.saved_chunk());
        }
        record
    }

    /// Replay a persisted chain, appending to the current units
    ///
    /// Stops at the shortest array. A plugin the host cannot instantiate
    /// is kept as a detached unit holding its persisted state, and its
    /// identifier is returned.
    pub fn restore(&mut self, record: &FxChainRecord, host: &dyn PluginHost) -> Vec<PluginUid> {
        let mut skipped = Vec::new();
        for i in 0..record.restorable_len() {
            let kind = FxKind::from_uid(record.unique_ids[i]);
            let mut unit = match FxUnit::create(kind, host) {
                Ok(unit) => unit,
                Err(e) => {
                    warn!("Keeping persisted FX {} detached: {}", kind, e);
                    let uid = PluginUid(kind.uid());
                    skipped.push(uid);
                    FxUnit::detached(uid)
                }
            };
            // Built-ins carry no program or blob
            let (blob, program) = match kind {
                FxKind::Hosted(_) => (
                    record.state_blobs.get(i).map(Vec::as_slice).unwrap_or_default(),
                    record.programs[i],
                ),
                FxKind::Builtin(_) => (&[][..], -1),
            };
            let params = &record.param_sets[i];
            if let Err(e) = unit.apply_state(record.bypass_flags[i], blob, program, params) {
                warn!("Ignoring persisted state for {}: {}", kind, e);
            }
            self.units.push(unit);
        }
        skipped
    }

    fn check(&self, index: usize) -> Result<()> {
        if index < self.units.len() {
            Ok(())
        } else {
            Err(MixerError::FxIndexOutOfRange {
                index,
                len: self.units.len(),
            })
        }
    }

    fn unit_mut(&mut self, index: usize) -> Result<&mut FxUnit> {
        self.check(index)?;
        Ok(&mut self.units[index])
    }
}
