//! Plugin host contract
//!
//! The engine never talks to a native plugin SDK directly. Everything it
//! needs from the host environment goes through [`PluginHost`], and every
//! live instance is reached through [`PluginInstance`].

use crate::domain::error::{MixerError, Result};
use crate::domain::fx::PluginUid;
use std::fmt;
use std::sync::Arc;

/// Opaque host-side handle of a live instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PluginHandle(u64);

impl PluginHandle {
    pub fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub fn raw(self) -> u64 {
        self.0
    }
}

impl fmt::Display for PluginHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// One discoverable plugin
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PluginInfo {
    pub vendor: String,
    pub name: String,
    pub unique_id: PluginUid,
}

/// A live hosted plugin instance
///
/// Shared between the control context (parameter forwarding) and the
/// render context (`process`). Implementations must not block in
/// `process`.
pub trait PluginInstance: Send + Sync {
    fn handle(&self) -> PluginHandle;

    fn unique_id(&self) -> PluginUid;

    /// Overwrite the first `values.len()` parameters
    fn set_params(&self, values: &[f32]);

    fn set_program(&self, program: i32);

    /// Load a full state blob
    fn set_chunk(&self, chunk: &[u8]);

    /// Current full state blob, if the plugin supports one
    fn chunk(&self) -> Option<Vec<u8>>;

    /// Process one block in place
    fn process(&self, buffer: &mut [f32]);
}

/// Adapter over the host environment
pub trait PluginHost: Send + Sync {
    /// Plugins discovered in the host environment
    ///
    /// Each call starts a fresh pass. An absent host yields nothing.
    fn list_available(&self) -> Box<dyn Iterator<Item = PluginInfo> + '_>;

    /// Create a live instance
    ///
    /// Fails with [`MixerError::UnknownPlugin`] or
    /// [`MixerError::HostUnavailable`]. Callers treat failure as "not added".
    fn instantiate(&self, unique_id: PluginUid) -> Result<Arc<dyn PluginInstance>>;

    /// Release host-side resources. Unknown or already destroyed handles are ignored.
    fn destroy(&self, handle: PluginHandle);

    fn is_available(&self) -> bool {
        true
    }

    /// Open the plugin's own editor window. Returns false if unsupported.
    fn open_editor(&self, _handle: PluginHandle) -> bool {
        false
    }

    fn close_editor(&self, _handle: PluginHandle) {}
}

/// Host for environments without native plugin support
#[derive(Debug, Default, Clone, Copy)]
pub struct NullHost;

impl PluginHost for NullHost {
    fn list_available(&self) -> Box<dyn Iterator<Item = PluginInfo> + '_> {
        Box::new(std::iter::empty())
    }

    fn instantiate(&self, _unique_id: PluginUid) -> Result<Arc<dyn PluginInstance>> {
        Err(MixerError::HostUnavailable)
    }

    fn destroy(&self, _handle: PluginHandle) {}

    fn is_available(&self) -> bool {
        false
    }
}

/// Group plugins by vendor, in first-seen vendor order
///
/// A read-only projection for menus. Rebuild it whenever it is needed.
pub fn group_by_vendor<I>(plugins: I) -> Vec<(String, Vec<PluginInfo>)>
where
    I: IntoIterator<Item = PluginInfo>,
{
    let mut groups: Vec<(String, Vec<PluginInfo>)> = Vec::new();
    for info in plugins {
        match groups.iter_mut().find(|(vendor, _)| *vendor == info.vendor) {
            Some((_, members)) => members.push(info),
            None => groups.push((info.vendor.clone(), vec![info])),
        }
    }
    groups
}
