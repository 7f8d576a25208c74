//! Plugins bundled with the in-process host

use super::registry::PluginFactory;
use crossbeam::utils::CachePadded;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use synthmix_core::domain::{PluginHandle, PluginInfo, PluginInstance, PluginUid};
use tracing::warn;

pub const GAIN_UID: PluginUid = PluginUid(0x534D_4731);
pub const POLARITY_UID: PluginUid = PluginUid(0x534D_5031);

const VENDOR: &str = "SynthMix";

/// Gain presets selectable as programs
const GAIN_PROGRAMS: [f32; 4] = [1.0, 0.5, 0.0, 2.0];

pub fn bundled() -> Vec<Box<dyn PluginFactory>> {
    vec![
        Box::new(BundledFactory(BundledKind::Gain)),
        Box::new(BundledFactory(BundledKind::Polarity)),
    ]
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BundledKind {
    /// Linear gain; parameter 0 is the factor, state blob is its f32 bytes
    Gain,
    /// Inverts the signal
    Polarity,
}

struct BundledFactory(BundledKind);

impl PluginFactory for BundledFactory {
    fn info(&self) -> PluginInfo {
        let (name, unique_id) = match self.0 {
            BundledKind::Gain => ("Gain", GAIN_UID),
            BundledKind::Polarity => ("Polarity", POLARITY_UID),
        };
        PluginInfo {
            vendor: VENDOR.to_string(),
            name: name.to_string(),
            unique_id,
        }
    }

    fn create(&self, handle: PluginHandle) -> Arc<dyn PluginInstance> {
        Arc::new(BundledInstance {
            kind: self.0,
            handle,
            factor: CachePadded::new(AtomicU32::new(1.0f32.to_bits())),
            params: Mutex::new(Vec::new()),
        })
    }
}

struct BundledInstance {
    kind: BundledKind,
    handle: PluginHandle,
    /// Read by the render context
    factor: CachePadded<AtomicU32>,
    params: Mutex<Vec<f32>>,
}

impl BundledInstance {
    fn factor(&self) -> f32 {
        f32::from_bits(self.factor.load(Ordering::Acquire))
    }

    fn set_factor(&self, factor: f32) {
        self.factor.store(factor.to_bits(), Ordering::Release);
    }
}

impl PluginInstance for BundledInstance {
    fn handle(&self) -> PluginHandle {
        self.handle
    }

    fn unique_id(&self) -> PluginUid {
        match self.kind {
            BundledKind::Gain => GAIN_UID,
            BundledKind::Polarity => POLARITY_UID,
        }
    }

    fn set_params(&self, values: &[f32]) {
        let mut params = self.params.lock().unwrap_or_else(PoisonError::into_inner);
        let overlap = values.len().min(params.len());
        params[..overlap].copy_from_slice(&values[..overlap]);
        params.extend_from_slice(&values[overlap..]);

        if self.kind == BundledKind::Gain {
            if let Some(factor) = params.first() {
                self.set_factor(factor.clamp(0.0, 4.0));
            }
        }
    }

    fn set_program(&self, program: i32) {
        if self.kind != BundledKind::Gain {
            return;
        }
        match usize::try_from(program).ok().and_then(|p| GAIN_PROGRAMS.get(p)) {
            Some(factor) => self.set_factor(*factor),
            None => warn!("Gain plugin has no program {}", program),
        }
    }

    fn set_chunk(&self, chunk: &[u8]) {
        if self.kind != BundledKind::Gain {
            return;
        }
        match <[u8; 4]>::try_from(chunk) {
            Ok(bytes) => self.set_factor(f32::from_le_bytes(bytes)),
            Err(_) => warn!("Ignoring {}-byte gain state", chunk.len()),
        }
    }

    fn chunk(&self) -> Option<Vec<u8>> {
        match self.kind {
            BundledKind::Gain => Some(self.factor().to_le_bytes().to_vec()),
            BundledKind::Polarity => None,
        }
    }

    fn process(&self, buffer: &mut [f32]) {
        let factor = match self.kind {
            BundledKind::Gain => self.factor(),
            BundledKind::Polarity => -1.0,
        };
        for sample in buffer.iter_mut() {
            *sample *= factor;
        }
    }
}
