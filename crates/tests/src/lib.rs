//! Shared fixtures for the cross-crate integration tests

use std::sync::{Arc, Mutex};
use synthmix_core::domain::{
    ChannelId, MixerEngine, PluginHandle, PluginInfo, PluginInstance, PluginUid, CHANNEL_COUNT,
};
use synthmix_infra::audio::{RenderBridge, Renderer};
use synthmix_infra::plugin::{FactoryHost, PluginFactory};

pub const SCALER_UID: PluginUid = PluginUid(0x5445_5354);
pub const DOUBLER_UID: PluginUid = PluginUid(0x5445_5344);

/// Everything a scaling instance was told, in order
#[derive(Debug, Clone, PartialEq)]
pub enum Received {
    Params(Vec<f32>),
    Program(i32),
    Chunk(Vec<u8>),
}

/// Plugin that multiplies by a fixed factor and logs what it receives
pub struct ScalingFactory {
    pub vendor: &'static str,
    pub name: &'static str,
    pub unique_id: PluginUid,
    pub factor: f32,
    pub log: Arc<Mutex<Vec<Received>>>,
}

impl ScalingFactory {
    pub fn new(unique_id: PluginUid, factor: f32) -> Self {
        Self {
            vendor: "Test Audio",
            name: "Scaler",
            unique_id,
            factor,
            log: Arc::default(),
        }
    }
}

impl PluginFactory for ScalingFactory {
    fn info(&self) -> PluginInfo {
        PluginInfo {
            vendor: self.vendor.to_string(),
            name: self.name.to_string(),
            unique_id: self.unique_id,
        }
    }

    fn create(&self, handle: PluginHandle) -> Arc<dyn PluginInstance> {
        Arc::new(ScalingInstance {
            handle,
            unique_id: self.unique_id,
            factor: self.factor,
            log: Arc::clone(&self.log),
        })
    }
}

struct ScalingInstance {
    handle: PluginHandle,
    unique_id: PluginUid,
    factor: f32,
    log: Arc<Mutex<Vec<Received>>>,
}

impl ScalingInstance {
    fn record(&self, received: Received) {
        if let Ok(mut log) = self.log.lock() {
            log.push(received);
        }
    }
}

impl PluginInstance for ScalingInstance {
    fn handle(&self) -> PluginHandle {
        self.handle
    }

    fn unique_id(&self) -> PluginUid {
        self.unique_id
    }

    fn set_params(&self, values: &[f32]) {
        self.record(Received::Params(values.to_vec()));
    }

    fn set_program(&self, program: i32) {
        self.record(Received::Program(program));
    }

    fn set_chunk(&self, chunk: &[u8]) {
        self.record(Received::Chunk(chunk.to_vec()));
    }

    fn chunk(&self) -> Option<Vec<u8>> {
        None
    }

    fn process(&self, buffer: &mut [f32]) {
        for sample in buffer.iter_mut() {
            *sample *= self.factor;
        }
    }
}

/// Bundled plugins plus a scaler (x0.5) and a doubler (x2)
pub fn test_host() -> (Arc<FactoryHost>, Arc<Mutex<Vec<Received>>>) {
    let mut host = FactoryHost::with_bundled();
    let scaler = ScalingFactory::new(SCALER_UID, 0.5);
    let log = Arc::clone(&scaler.log);
    host.register(Box::new(scaler));
    host.register(Box::new(ScalingFactory {
        name: "Doubler",
        ..ScalingFactory::new(DOUBLER_UID, 2.0)
    }));
    (Arc::new(host), log)
}

pub fn engine_with_host() -> (MixerEngine, Arc<FactoryHost>) {
    let (host, _) = test_host();
    (MixerEngine::new(host.clone()), host)
}

/// Engine publishing into a render bridge
pub fn rendered_engine() -> (MixerEngine, Arc<FactoryHost>, Arc<RenderBridge>, Renderer) {
    let (mut engine, host) = engine_with_host();
    let (bridge, renderer) = RenderBridge::new(4, 64);
    let bridge = Arc::new(bridge);
    engine.attach_publisher(bridge.clone());
    (engine, host, bridge, renderer)
}

/// Source table indexed by channel, silent everywhere else
pub fn sources<'a>(pairs: &[(ChannelId, &'a [f32])]) -> Vec<Option<&'a [f32]>> {
    let mut table = vec![None; CHANNEL_COUNT];
    for (id, samples) in pairs {
        table[id.index()] = Some(*samples);
    }
    table
}

pub fn assert_all_close(buffer: &[f32], expected: f32) {
    for (i, sample) in buffer.iter().enumerate() {
        assert!(
            (sample - expected).abs() < 1e-5,
            "sample {} is {}, expected {}",
            i,
            sample,
            expected
        );
    }
}
