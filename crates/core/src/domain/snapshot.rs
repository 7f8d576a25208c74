//! Immutable render state handed to the audio render context
//!
//! The control context never mutates state the render context can see.
//! Each committed mutation produces a fresh [`RenderSnapshot`] which is
//! published as a whole, so a render pass sees either the old or the new
//! chain shape and never a mix of both.

use crate::domain::channel::{Channel, ChannelId};
use crate::domain::fx::{BuiltinFx, FxKind, FxUnit};
use crate::domain::mixer::bus::BusTarget;
use crate::domain::mixer::master::MasterFx;
use crate::domain::plugin::PluginInstance;
use std::fmt;
use std::sync::Arc;

/// Render view of one FX unit
#[derive(Clone)]
pub struct FxSnapshot {
    pub kind: FxKind,
    pub bypass: bool,
    pub params: Vec<f32>,
    /// Kept alive by the snapshot for as long as it is in use
    pub instance: Option<Arc<dyn PluginInstance>>,
}

impl FxSnapshot {
    fn capture(unit: &FxUnit) -> Self {
        Self {
            kind: unit.kind(),
            bypass: unit.is_bypassed(),
            params: unit.params().to_vec(),
            instance: unit.instance().cloned(),
        }
    }
}

impl fmt::Debug for FxSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FxSnapshot")
            .field("kind", &self.kind)
            .field("bypass", &self.bypass)
            .field("params", &self.params)
            .field("instance", &self.instance.as_ref().map(|i| i.handle()))
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct ChannelSnapshot {
    pub id: ChannelId,
    pub amplitude: f32,
    pub muted: bool,
    pub solo: bool,
    pub bus: BusTarget,
    pub fx: Vec<FxSnapshot>,
}

impl ChannelSnapshot {
    pub fn is_audible(&self, any_solo: bool) -> bool {
        !self.muted && (!any_solo || self.solo)
    }
}

#[derive(Debug, Clone)]
pub struct MasterFxSnapshot {
    pub kind: BuiltinFx,
    pub params: Vec<f32>,
}

#[derive(Debug, Clone)]
pub struct RenderSnapshot {
    pub generation: u64,
    /// Indexed by `ChannelId::index`
    pub channels: Vec<ChannelSnapshot>,
    pub any_solo: bool,
    /// Enabled master effects in processing order
    pub master_fx: Vec<MasterFxSnapshot>,
}

impl RenderSnapshot {
    pub fn capture(generation: u64, channels: &[Channel], master: &MasterFx) -> Self {
        let channels: Vec<ChannelSnapshot> = channels
            .iter()
            .map(|c| ChannelSnapshot {
                id: c.id,
                amplitude: c.gain.amplitude(),
                muted: c.muted,
                solo: c.solo,
                bus: c.bus,
                fx: c.fx.units().iter().map(FxSnapshot::capture).collect(),
            })
            .collect();
        let any_solo = channels.iter().any(|c| c.solo);
        let master_fx = master
            .enabled()
            .map(|(effect, slot)| MasterFxSnapshot {
                kind: effect.builtin(),
                params: slot.params.clone(),
            })
            .collect();

        Self {
            generation,
            channels,
            any_solo,
            master_fx,
        }
    }

    pub fn channel(&self, id: ChannelId) -> &ChannelSnapshot {
        &self.channels[id.index()]
    }
}

/// Where the engine sends committed snapshots
///
/// `publish` is called from the control context and must not block on the
/// render context.
pub trait SnapshotPublisher: Send + Sync {
    fn publish(&self, snapshot: Arc<RenderSnapshot>);

    /// Newest generation the render context has started using
    fn observed_generation(&self) -> u64;
}
