//! In-process plugin host
//!
//! Plugins are registered as factories. The host hands out handles,
//! tracks live instances and forgets them on `destroy`.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use synthmix_core::domain::{
    MixerError, PluginHandle, PluginHost, PluginInfo, PluginInstance, PluginUid,
};
use tracing::{debug, info};

type Result<T> = std::result::Result<T, MixerError>;

/// Creates instances of one plugin type
pub trait PluginFactory: Send + Sync {
    fn info(&self) -> PluginInfo;

    fn create(&self, handle: PluginHandle) -> Arc<dyn PluginInstance>;
}

/// Plugin host backed by registered factories
pub struct FactoryHost {
    factories: Vec<Box<dyn PluginFactory>>,
    live: Mutex<HashMap<PluginHandle, Arc<dyn PluginInstance>>>,
    next_handle: AtomicU64,
}

impl FactoryHost {
    pub fn new() -> Self {
        Self {
            factories: Vec::new(),
            live: Mutex::new(HashMap::new()),
            next_handle: AtomicU64::new(1),
        }
    }

    /// Host preloaded with the bundled plugins
    pub fn with_bundled() -> Self {
        let mut host = Self::new();
        for factory in super::gain::bundled() {
            host.register(factory);
        }
        host
    }

    /// Add a factory. A later factory with the same unique id is ignored.
    pub fn register(&mut self, factory: Box<dyn PluginFactory>) {
        let info = factory.info();
        if self
            .factories
            .iter()
            .any(|f| f.info().unique_id == info.unique_id)
        {
            debug!("Plugin {} already registered", info.unique_id);
            return;
        }
        info!("Registered plugin {} / {} ({})", info.vendor, info.name, info.unique_id);
        self.factories.push(factory);
    }

    /// Number of instances not yet destroyed
    pub fn live_count(&self) -> usize {
        self.live().len()
    }

    pub fn is_live(&self, handle: PluginHandle) -> bool {
        self.live().contains_key(&handle)
    }

    fn live(&self) -> MutexGuard<'_, HashMap<PluginHandle, Arc<dyn PluginInstance>>> {
        // A panicking caller cannot leave the map half-updated
        self.live.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for FactoryHost {
    fn default() -> Self {
        Self::new()
    }
}

impl PluginHost for FactoryHost {
    fn list_available(&self) -> Box<dyn Iterator<Item = PluginInfo> + '_> {
        Box::new(self.factories.iter().map(|f| f.info()))
    }

    fn instantiate(&self, unique_id: PluginUid) -> Result<Arc<dyn PluginInstance>> {
        let factory = self
            .factories
            .iter()
            .find(|f| f.info().unique_id == unique_id)
            .ok_or(MixerError::UnknownPlugin(unique_id))?;

        let handle = PluginHandle::new(self.next_handle.fetch_add(1, Ordering::Relaxed));
        let instance = factory.create(handle);
        self.live().insert(handle, Arc::clone(&instance));
        debug!("Instantiated plugin {} as {}", unique_id, handle);
        Ok(instance)
    }

    fn destroy(&self, handle: PluginHandle) {
        if self.live().remove(&handle).is_some() {
            debug!("Destroyed plugin instance {}", handle);
        }
    }
}
