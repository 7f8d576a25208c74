//! Mixer engine
//!
//! `MixerEngine` is the composition root: it owns every channel, the
//! plugin host, the master effects and the bus names, and it is the only
//! place a mutation is applied. Each successful mutation is committed as
//! a new render generation and published to the render context.

pub mod bus;
pub mod master;

use crate::domain::audio::NoteEvent;
use crate::domain::channel::{Channel, ChannelId, ChannelKind, PLUGIN_SLOT_COUNT};
use crate::domain::command::{Command, CommandOutcome};
use crate::domain::config::{ChannelRecord, InstrumentSlotRecord, MixerSettings};
use crate::domain::error::{MixerError, Result};
use crate::domain::fx::{FxChain, FxKind, FxUnit, PluginUid};
use crate::domain::meter::PeakMeters;
use crate::domain::plugin::{PluginHandle, PluginHost, PluginInstance};
use crate::domain::snapshot::{RenderSnapshot, SnapshotPublisher};
use bus::{BusIndex, BusNames, BusRoutingTable, BusTarget};
use master::{MasterEffect, MasterFx};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, info, trace, warn};

/// Number of instrument-mapping preset banks
pub const PRESET_BANK_COUNT: usize = 11;

const EVENT_CAPACITY: usize = 256;

/// Change notification for UI and other observers
#[derive(Debug, Clone, PartialEq)]
pub enum MixerEvent {
    GainChanged { channel: ChannelId, level: i32 },
    MuteChanged { channel: ChannelId, muted: bool },
    SoloChanged { channel: ChannelId, solo: bool },
    BusTargetChanged { channel: ChannelId, target: BusTarget },
    PluginSlotChanged { channel: ChannelId, slot: Option<usize> },
    FxChainChanged { channel: ChannelId },
    InstrumentPluginChanged { slot: usize, unique_id: Option<PluginUid> },
    PresetBankChanged { bank: usize },
    MasterFxChanged { effect: MasterEffect },
    BusNamesChanged { bus: BusIndex },
    ChannelsReset,
    Restored,
}

/// What a bulk restore could not apply
///
/// Skipped entries stay in the engine as detached units or unresolved
/// slots, so saving again writes them back unchanged.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RestoreReport {
    pub channels: usize,
    /// Units restored with a live instance or as built-ins
    pub fx_units: usize,
    pub skipped_fx: Vec<(ChannelId, PluginUid)>,
    /// Slot index and the persisted identifier
    pub skipped_slots: Vec<(usize, i64)>,
    pub bus_names_applied: bool,
}

impl RestoreReport {
    pub fn is_complete(&self) -> bool {
        self.skipped_fx.is_empty() && self.skipped_slots.is_empty()
    }
}

/// Occupant of a plugin-instrument slot
#[derive(Debug, Default)]
enum InstrumentSlot {
    #[default]
    Empty,
    Loaded(FxUnit),
    /// Persisted binding the host could not resolve
    Unresolved(InstrumentSlotRecord),
}

impl InstrumentSlot {
    fn unit(&self) -> Option<&FxUnit> {
        match self {
            InstrumentSlot::Loaded(unit) => Some(unit),
            _ => None,
        }
    }

    fn take_unit(&mut self) -> Option<FxUnit> {
        match std::mem::take(self) {
            InstrumentSlot::Loaded(unit) => Some(unit),
            _ => None,
        }
    }

    fn record(&self) -> InstrumentSlotRecord {
        match self {
            InstrumentSlot::Empty => InstrumentSlotRecord::default(),
            InstrumentSlot::Loaded(unit) => InstrumentSlotRecord {
                unique_id: i64::from(unit.kind().uid()),
                program: unit.program().unwrap_or(-1),
                params: unit.params().to_vec(),
                state_blob: unit.saved_chunk(),
            },
            InstrumentSlot::Unresolved(record) => record.clone(),
        }
    }
}

pub struct MixerEngine {
    channels: Vec<Channel>,
    host: Arc<dyn PluginHost>,
    preset_bank: usize,
    master_fx: MasterFx,
    bus_names: BusNames,
    instrument_slots: Vec<InstrumentSlot>,
    meters: Arc<PeakMeters>,
    events: broadcast::Sender<MixerEvent>,
    generation: u64,
    publisher: Option<Arc<dyn SnapshotPublisher>>,
    /// Removed instances and the first generation that no longer uses them
    pending_destroy: Vec<(u64, Arc<dyn PluginInstance>)>,
}

impl MixerEngine {
    pub fn new(host: Arc<dyn PluginHost>) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            channels: ChannelId::all().map(Channel::new).collect(),
            host,
            preset_bank: 0,
            master_fx: MasterFx::default(),
            bus_names: BusNames::new(),
            instrument_slots: (0..PLUGIN_SLOT_COUNT).map(|_| InstrumentSlot::Empty).collect(),
            meters: Arc::new(PeakMeters::new()),
            events,
            generation: 0,
            publisher: None,
            pending_destroy: Vec::new(),
        }
    }

    /// Start publishing render snapshots, beginning with the current state
    pub fn attach_publisher(&mut self, publisher: Arc<dyn SnapshotPublisher>) {
        self.publisher = Some(publisher);
        self.commit();
        info!("Render publisher attached at generation {}", self.generation);
    }

    pub fn host(&self) -> &Arc<dyn PluginHost> {
        &self.host
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn subscribe(&self) -> broadcast::Receiver<MixerEvent> {
        self.events.subscribe()
    }

    pub fn meters(&self) -> Arc<PeakMeters> {
        Arc::clone(&self.meters)
    }

    // ---------------------------------------------------------------- queries

    pub fn channel(&self, id: ChannelId) -> &Channel {
        &self.channels[id.index()]
    }

    pub fn channels(&self) -> impl Iterator<Item = &Channel> {
        self.channels.iter()
    }

    pub fn is_muted(&self, id: ChannelId) -> bool {
        self.channel(id).muted
    }

    pub fn is_solo(&self, id: ChannelId) -> bool {
        self.channel(id).solo
    }

    pub fn fx_chain(&self, id: ChannelId) -> &FxChain {
        &self.channel(id).fx
    }

    /// Channels currently routed into `bus`
    pub fn bus_members(&self, bus: BusIndex) -> Vec<ChannelId> {
        BusRoutingTable::from_channels(&self.channels)
            .members(bus)
            .to_vec()
    }

    /// Plugin-instrument channels are disabled when no plugin host is available
    pub fn is_channel_enabled(&self, id: ChannelId) -> bool {
        match id.kind() {
            ChannelKind::PluginInstrument(_) => self.host.is_available(),
            _ => true,
        }
    }

    /// Live instance handle of a hosted FX unit, for opening its editor
    pub fn fx_instance(&self, id: ChannelId, index: usize) -> Option<PluginHandle> {
        self.channel(id)
            .fx
            .get(index)
            .and_then(FxUnit::instance)
            .map(|instance| instance.handle())
    }

    pub fn open_fx_editor(&self, id: ChannelId, index: usize) -> bool {
        self.fx_instance(id, index)
            .map(|handle| self.host.open_editor(handle))
            .unwrap_or(false)
    }

    pub fn preset_bank(&self) -> usize {
        self.preset_bank
    }

    pub fn master_fx(&self) -> &MasterFx {
        &self.master_fx
    }

    pub fn bus_names(&self) -> &BusNames {
        &self.bus_names
    }

    pub fn instrument_plugin(&self, slot: usize) -> Option<&FxUnit> {
        self.instrument_slots.get(slot).and_then(InstrumentSlot::unit)
    }

    /// Persisted identifier of a slot binding the host could not resolve
    pub fn unresolved_instrument(&self, slot: usize) -> Option<i64> {
        match self.instrument_slots.get(slot) {
            Some(InstrumentSlot::Unresolved(record)) => Some(record.unique_id),
            _ => None,
        }
    }

    // --------------------------------------------------------- channel state

    pub fn set_gain(&mut self, id: ChannelId, level: i32) {
        let channel = &mut self.channels[id.index()];
        channel.set_gain(level);
        let level = channel.gain.level();
        self.emit(MixerEvent::GainChanged { channel: id, level });
        self.commit();
    }

    pub fn reset_gain(&mut self, id: ChannelId) {
        self.channels[id.index()].reset_gain();
        let level = self.channels[id.index()].gain.level();
        self.emit(MixerEvent::GainChanged { channel: id, level });
        self.commit();
    }

    /// Set a channel's mute flag, cascading one level when it is a bus
    pub fn set_mute(&mut self, id: ChannelId, muted: bool) {
        for target in self.cascade_targets(id) {
            self.channels[target.index()].muted = muted;
            self.emit(MixerEvent::MuteChanged {
                channel: target,
                muted,
            });
        }
        debug!("{} mute = {}", id, muted);
        self.commit();
    }

    /// Set a channel's solo flag, cascading one level when it is a bus
    pub fn set_solo(&mut self, id: ChannelId, solo: bool) {
        for target in self.cascade_targets(id) {
            self.channels[target.index()].solo = solo;
            self.emit(MixerEvent::SoloChanged {
                channel: target,
                solo,
            });
        }
        debug!("{} solo = {}", id, solo);
        self.commit();
    }

    pub fn set_bus_target(&mut self, id: ChannelId, target: BusTarget) -> Result<()> {
        if id.is_bus() {
            return Err(MixerError::NotRoutable(id));
        }
        self.channels[id.index()].bus = target;
        debug!("{} routed to {:?}", id, target);
        self.emit(MixerEvent::BusTargetChanged { channel: id, target });
        self.commit();
        Ok(())
    }

    pub fn set_plugin_slot(&mut self, id: ChannelId, slot: Option<usize>) -> Result<()> {
        if !matches!(id.kind(), ChannelKind::PluginInstrument(_)) {
            return Err(MixerError::NotPluginChannel(id));
        }
        if let Some(slot) = slot.filter(|s| *s >= PLUGIN_SLOT_COUNT) {
            return Err(MixerError::UnknownPluginSlot(slot));
        }
        self.channels[id.index()].plugin_slot = slot;
        self.emit(MixerEvent::PluginSlotChanged { channel: id, slot });
        self.commit();
        Ok(())
    }

    /// Every channel back to default gain, unmuted and unsoloed
    pub fn reset_channels(&mut self) {
        for channel in &mut self.channels {
            channel.reset_gain();
            channel.muted = false;
            channel.solo = false;
        }
        info!("All channels reset");
        self.emit(MixerEvent::ChannelsReset);
        self.commit();
    }

    // -------------------------------------------------------------- FX chain

    /// Add an FX unit, appending when `position` is `None`
    pub fn add_fx(&mut self, id: ChannelId, kind: FxKind, position: Option<usize>) -> Result<usize> {
        let chain = &mut self.channels[id.index()].fx;
        let position = position.unwrap_or(chain.len());
        let index = chain.insert(kind, position, self.host.as_ref())?;
        self.emit(MixerEvent::FxChainChanged { channel: id });
        self.commit();
        Ok(index)
    }

    /// Remove an FX unit. Its plugin instance is destroyed once the render
    /// context has moved past it.
    pub fn remove_fx(&mut self, id: ChannelId, index: usize) -> Result<FxKind> {
        let mut unit = self.channels[id.index()].fx.remove(index)?;
        self.emit(MixerEvent::FxChainChanged { channel: id });
        self.commit();
        if let Some(instance) = unit.take_instance() {
            self.retire(instance);
        }
        Ok(unit.kind())
    }

    /// Tear down a channel's whole chain
    pub fn clear_fx(&mut self, id: ChannelId) {
        let removed = self.channels[id.index()].fx.clear();
        if removed.is_empty() {
            return;
        }
        self.emit(MixerEvent::FxChainChanged { channel: id });
        self.commit();
        self.retire_units(removed);
    }

    pub fn set_fx_bypass(&mut self, id: ChannelId, index: usize, bypass: bool) -> Result<()> {
        self.channels[id.index()].fx.set_bypass(index, bypass)?;
        self.emit(MixerEvent::FxChainChanged { channel: id });
        self.commit();
        Ok(())
    }

    pub fn set_fx_params(&mut self, id: ChannelId, index: usize, values: &[f32]) -> Result<()> {
        self.channels[id.index()].fx.set_params(index, values)?;
        self.emit(MixerEvent::FxChainChanged { channel: id });
        self.commit();
        Ok(())
    }

    pub fn set_fx_program(&mut self, id: ChannelId, index: usize, program: i32) -> Result<()> {
        self.channels[id.index()].fx.set_program(index, program)?;
        self.emit(MixerEvent::FxChainChanged { channel: id });
        self.commit();
        Ok(())
    }

    pub fn set_fx_chunk(&mut self, id: ChannelId, index: usize, chunk: Vec<u8>) -> Result<()> {
        self.channels[id.index()].fx.set_chunk(index, chunk)?;
        self.emit(MixerEvent::FxChainChanged { channel: id });
        self.commit();
        Ok(())
    }

    // ------------------------------------------------ plugin-instrument slots

    /// Load a plugin instrument into `slot`, replacing any previous one
    pub fn load_instrument_plugin(&mut self, slot: usize, unique_id: PluginUid) -> Result<()> {
        if slot >= PLUGIN_SLOT_COUNT {
            return Err(MixerError::UnknownPluginSlot(slot));
        }
        let unit = FxUnit::hosted(self.host.instantiate(unique_id)?);
        let previous =
            std::mem::replace(&mut self.instrument_slots[slot], InstrumentSlot::Loaded(unit))
                .take_unit();
        info!("Loaded plugin {} into instrument slot {}", unique_id, slot);
        self.emit(MixerEvent::InstrumentPluginChanged {
            slot,
            unique_id: Some(unique_id),
        });
        self.commit();
        self.retire_units(previous);
        Ok(())
    }

    pub fn unload_instrument_plugin(&mut self, slot: usize) -> Result<()> {
        let occupant = self
            .instrument_slots
            .get_mut(slot)
            .ok_or(MixerError::UnknownPluginSlot(slot))?;
        if matches!(occupant, InstrumentSlot::Empty) {
            return Ok(());
        }
        let previous = occupant.take_unit();
        self.emit(MixerEvent::InstrumentPluginChanged {
            slot,
            unique_id: None,
        });
        self.commit();
        self.retire_units(previous);
        Ok(())
    }

    // --------------------------------------------------------------- globals

    pub fn set_preset_bank(&mut self, bank: usize) -> Result<()> {
        if bank >= PRESET_BANK_COUNT {
            return Err(MixerError::UnknownPresetBank(bank));
        }
        self.preset_bank = bank;
        debug!("Preset bank = {}", bank);
        self.emit(MixerEvent::PresetBankChanged { bank });
        Ok(())
    }

    pub fn set_master_fx_enabled(&mut self, effect: MasterEffect, enabled: bool) {
        self.master_fx.set_enabled(effect, enabled);
        self.emit(MixerEvent::MasterFxChanged { effect });
        self.commit();
    }

    pub fn set_master_fx_params(&mut self, effect: MasterEffect, params: &[f32]) {
        self.master_fx.set_params(effect, params);
        self.emit(MixerEvent::MasterFxChanged { effect });
        self.commit();
    }

    pub fn set_bus_names(&mut self, bus: BusIndex, short: String, full: String) {
        self.bus_names.set(bus, short, full);
        self.emit(MixerEvent::BusNamesChanged { bus });
    }

    // -------------------------------------------------------------- metering

    /// Note-trigger callback from the audio pipeline
    pub fn note_triggered(&self, event: NoteEvent) {
        let level = event.level();
        self.meters.trigger(event.channel, level);
        if let Some(bus) = event.bus {
            self.meters.trigger(ChannelId::bus(bus), level);
        }
        trace!("Note {} on {} at {:.2}", event.note, event.channel, level);
    }

    // ------------------------------------------------------------ persistence

    /// Snapshot of everything the engine persists
    pub fn settings(&self) -> MixerSettings {
        MixerSettings {
            preset_bank: self.preset_bank,
            bus_short_names: self.bus_names.short_names().to_vec(),
            bus_full_names: self.bus_names.full_names().to_vec(),
            master_fx: self.master_fx.clone(),
            instrument_slots: self
                .instrument_slots
                .iter()
                .map(InstrumentSlot::record)
                .collect(),
            channels: self.channels.iter().map(channel_record).collect(),
        }
    }

    /// Replace the whole engine state from persisted settings
    ///
    /// Malformed entries are skipped. Plugins the host cannot resolve are
    /// reported and kept detached. Commits once at the end.
    pub fn restore(&mut self, settings: &MixerSettings) -> RestoreReport {
        let mut report = RestoreReport::default();
        let mut removed: Vec<FxUnit> = Vec::new();

        for channel in &mut self.channels {
            removed.extend(channel.fx.clear());
            *channel = Channel::new(channel.id);
        }
        removed.extend(self.instrument_slots.iter_mut().filter_map(InstrumentSlot::take_unit));

        if settings.preset_bank < PRESET_BANK_COUNT {
            self.preset_bank = settings.preset_bank;
        } else {
            warn!("Ignoring persisted preset bank {}", settings.preset_bank);
        }

        report.bus_names_applied = self
            .bus_names
            .restore(&settings.bus_short_names, &settings.bus_full_names);
        if !report.bus_names_applied {
            warn!("Persisted bus names incomplete, keeping current names");
        }

        self.master_fx = settings.master_fx.clone();

        for (slot, record) in settings
            .instrument_slots
            .iter()
            .take(PLUGIN_SLOT_COUNT)
            .enumerate()
        {
            if record.unique_id < 0 {
                continue;
            }
            let instance = u32::try_from(record.unique_id)
                .map_err(|_| MixerError::InvalidPluginId(record.unique_id))
                .and_then(|raw| self.host.instantiate(PluginUid(raw)));
            self.instrument_slots[slot] = match instance {
                Ok(instance) => {
                    let mut unit = FxUnit::hosted(instance);
                    let applied =
                        unit.apply_state(false, &record.state_blob, record.program, &record.params);
                    if let Err(e) = applied {
                        warn!("Ignoring persisted state of instrument slot {}: {}", slot, e);
                    }
                    InstrumentSlot::Loaded(unit)
                }
                Err(e) => {
                    warn!(
                        "Keeping instrument slot {} unresolved ({}): {}",
                        slot, record.unique_id, e
                    );
                    report.skipped_slots.push((slot, record.unique_id));
                    InstrumentSlot::Unresolved(record.clone())
                }
            };
        }

        for (id, record) in ChannelId::all().zip(settings.channels.iter()) {
            let channel = &mut self.channels[id.index()];
            channel.set_gain(record.gain);
            channel.muted = record.mute;
            channel.solo = record.solo;
            channel.device = record.device;
            channel.speaker = record.speaker;

            if !id.is_bus() {
                channel.bus = BusTarget::from_raw(record.bus_target).unwrap_or_else(|e| {
                    warn!("{}: {}, routing to master", id, e);
                    BusTarget::Master
                });
            }
            if let ChannelKind::PluginInstrument(_) = id.kind() {
                channel.plugin_slot = usize::try_from(record.plugin_slot)
                    .ok()
                    .filter(|slot| *slot < PLUGIN_SLOT_COUNT);
            }

            for uid in channel.fx.restore(&record.fx, self.host.as_ref()) {
                report.skipped_fx.push((id, uid));
            }
            report.fx_units += channel.fx.units().iter().filter(|u| !u.is_detached()).count();
            report.channels += 1;
        }

        info!(
            channels = report.channels,
            fx_units = report.fx_units,
            skipped = report.skipped_fx.len() + report.skipped_slots.len(),
            "Mixer state restored"
        );
        self.emit(MixerEvent::Restored);
        self.commit();
        self.retire_units(removed);
        report
    }

    // -------------------------------------------------------------- commands

    pub fn execute(&mut self, command: Command) -> Result<CommandOutcome> {
        trace!("Executing {:?}", command);
        match command {
            Command::SetGain { channel, level } => self.set_gain(channel, level),
            Command::ResetGain { channel } => self.reset_gain(channel),
            Command::SetMute { channel, muted } => self.set_mute(channel, muted),
            Command::SetSolo { channel, solo } => self.set_solo(channel, solo),
            Command::SetBusTarget { channel, target } => self.set_bus_target(channel, target)?,
            Command::AddFx {
                channel,
                kind,
                position,
            } => {
                let index = self.add_fx(channel, kind, position)?;
                return Ok(CommandOutcome::FxAdded { channel, index });
            }
            Command::RemoveFx { channel, index } => {
                let kind = self.remove_fx(channel, index)?;
                return Ok(CommandOutcome::FxRemoved { channel, kind });
            }
            Command::SetFxBypass {
                channel,
                index,
                bypass,
            } => self.set_fx_bypass(channel, index, bypass)?,
            Command::SetFxParams {
                channel,
                index,
                values,
            } => self.set_fx_params(channel, index, &values)?,
            Command::SetFxProgram {
                channel,
                index,
                program,
            } => self.set_fx_program(channel, index, program)?,
            Command::SetFxChunk {
                channel,
                index,
                chunk,
            } => self.set_fx_chunk(channel, index, chunk)?,
            Command::SetMasterFxEnabled { effect, enabled } => {
                self.set_master_fx_enabled(effect, enabled)
            }
            Command::SetPresetBank { bank } => self.set_preset_bank(bank)?,
            Command::ResetChannels => self.reset_channels(),
        }
        Ok(CommandOutcome::Applied)
    }

    // ------------------------------------------------------- render publish

    /// Destroy retired instances the render context no longer uses
    pub fn reclaim(&mut self) {
        let Some(publisher) = &self.publisher else {
            return;
        };
        let observed = publisher.observed_generation();
        let host = &self.host;
        self.pending_destroy.retain(|(generation, instance)| {
            if *generation <= observed {
                host.destroy(instance.handle());
                false
            } else {
                true
            }
        });
    }

    /// Instances waiting for the render context to move on
    pub fn pending_destroy(&self) -> usize {
        self.pending_destroy.len()
    }

    fn commit(&mut self) {
        self.generation += 1;
        if let Some(publisher) = &self.publisher {
            let snapshot = RenderSnapshot::capture(self.generation, &self.channels, &self.master_fx);
            publisher.publish(Arc::new(snapshot));
        }
        self.reclaim();
    }

    /// Queue an instance dropped from the current generation
    fn retire(&mut self, instance: Arc<dyn PluginInstance>) {
        if self.publisher.is_none() {
            self.host.destroy(instance.handle());
            return;
        }
        debug!(
            "Deferring destroy of {} until generation {}",
            instance.handle(),
            self.generation
        );
        self.pending_destroy.push((self.generation, instance));
        self.reclaim();
    }

    fn retire_units<I: IntoIterator<Item = FxUnit>>(&mut self, units: I) {
        for mut unit in units {
            if let Some(instance) = unit.take_instance() {
                self.retire(instance);
            }
        }
    }

    /// The channel itself plus, for a bus, every channel routed into it
    fn cascade_targets(&self, id: ChannelId) -> Vec<ChannelId> {
        let mut targets = vec![id];
        if let Some(bus) = id.as_bus() {
            targets.extend_from_slice(BusRoutingTable::from_channels(&self.channels).members(bus));
        }
        targets
    }

    fn emit(&self, event: MixerEvent) {
        // No subscribers is fine
        let _ = self.events.send(event);
    }
}

impl Drop for MixerEngine {
    fn drop(&mut self) {
        for (_, instance) in self.pending_destroy.drain(..) {
            self.host.destroy(instance.handle());
        }
        let live = self
            .channels
            .iter()
            .flat_map(|c| c.fx.units())
            .chain(self.instrument_slots.iter().filter_map(InstrumentSlot::unit))
            .filter_map(FxUnit::instance);
        for instance in live {
            self.host.destroy(instance.handle());
        }
    }
}

fn channel_record(channel: &Channel) -> ChannelRecord {
    ChannelRecord {
        gain: channel.gain.level(),
        mute: channel.muted,
        solo: channel.solo,
        bus_target: channel.bus.to_raw(),
        plugin_slot: channel.plugin_slot.map_or(-1, |slot| slot as i32),
        device: channel.device,
        speaker: channel.speaker,
        fx: channel.fx.record(),
    }
}
