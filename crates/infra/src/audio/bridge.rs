//! Control-to-render snapshot hand-off and the real-time render pass
//!
//! The control side publishes whole [`RenderSnapshot`]s over a bounded
//! crossbeam channel; the render side picks up the newest one at a buffer
//! boundary. Nothing on the render side blocks or frees snapshot memory:
//! replaced snapshots travel back over a retirement channel and are
//! dropped by the control side.

use crossbeam::channel::{bounded, Receiver, Sender, TrySendError};
use crossbeam::utils::CachePadded;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use synthmix_core::domain::{
    BuiltinFx, BusTarget, FxKind, FxSnapshot, RenderSnapshot, SnapshotPublisher, BUS_COUNT,
};
use tracing::{debug, trace};

/// DSP for built-in effect kinds
///
/// The mixer treats effects as opaque units. Plug real DSP in here; the
/// default leaves audio untouched.
pub trait FxProcessor: Send {
    fn process(&mut self, kind: BuiltinFx, params: &[f32], buffer: &mut [f32]);
}

/// Built-in effect processor that passes audio through unchanged
#[derive(Debug, Default, Clone, Copy)]
pub struct Passthrough;

impl FxProcessor for Passthrough {
    fn process(&mut self, _kind: BuiltinFx, _params: &[f32], _buffer: &mut [f32]) {}
}

/// Control-side end of the snapshot hand-off
pub struct RenderBridge {
    tx: Sender<Arc<RenderSnapshot>>,
    /// Second receiver used to evict the oldest queued snapshot when full
    evict: Receiver<Arc<RenderSnapshot>>,
    retired: Receiver<Arc<RenderSnapshot>>,
    observed: Arc<CachePadded<AtomicU64>>,
}

impl RenderBridge {
    /// Create a connected bridge and renderer
    ///
    /// `capacity` is the number of snapshots that may queue up between two
    /// render cycles; `max_block` is the largest block the renderer will be
    /// asked for in one pass.
    pub fn new(capacity: usize, max_block: usize) -> (Self, Renderer) {
        let capacity = capacity.max(1);
        let (tx, rx) = bounded(capacity);
        // Every queued snapshot plus the current one can be retired between publishes
        let (retire_tx, retired) = bounded(capacity + 2);
        let observed = Arc::new(CachePadded::new(AtomicU64::new(0)));

        let bridge = Self {
            tx,
            evict: rx.clone(),
            retired,
            observed: Arc::clone(&observed),
        };
        let renderer = Renderer::new(rx, retire_tx, observed, max_block);
        (bridge, renderer)
    }

    /// Drop snapshots the renderer has finished with
    pub fn drain_retired(&self) -> usize {
        self.retired.try_iter().count()
    }
}

impl SnapshotPublisher for RenderBridge {
    fn publish(&self, snapshot: Arc<RenderSnapshot>) {
        self.drain_retired();
        let mut pending = snapshot;
        loop {
            match self.tx.try_send(pending) {
                Ok(()) => return,
                Err(TrySendError::Full(snapshot)) => {
                    // Newest wins: evict the oldest queued snapshot and retry
                    if let Ok(stale) = self.evict.try_recv() {
                        trace!("Evicted unrendered generation {}", stale.generation);
                    }
                    pending = snapshot;
                }
                Err(TrySendError::Disconnected(snapshot)) => {
                    debug!("Renderer gone, dropping generation {}", snapshot.generation);
                    return;
                }
            }
        }
    }

    fn observed_generation(&self) -> u64 {
        self.observed.load(Ordering::Acquire)
    }
}

/// Render-side end of the hand-off
///
/// Move this into the audio callback. `render` never blocks and never
/// allocates.
pub struct Renderer {
    incoming: Receiver<Arc<RenderSnapshot>>,
    retire: Sender<Arc<RenderSnapshot>>,
    observed: Arc<CachePadded<AtomicU64>>,
    current: Option<Arc<RenderSnapshot>>,
    processor: Box<dyn FxProcessor>,
    max_block: usize,
    scratch: Vec<f32>,
    bus_accum: Vec<Vec<f32>>,
    bus_fed: [bool; BUS_COUNT],
}

impl Renderer {
    fn new(
        incoming: Receiver<Arc<RenderSnapshot>>,
        retire: Sender<Arc<RenderSnapshot>>,
        observed: Arc<CachePadded<AtomicU64>>,
        max_block: usize,
    ) -> Self {
        let max_block = max_block.max(1);
        Self {
            incoming,
            retire,
            observed,
            current: None,
            processor: Box::new(Passthrough),
            max_block,
            scratch: vec![0.0; max_block],
            bus_accum: vec![vec![0.0; max_block]; BUS_COUNT],
            bus_fed: [false; BUS_COUNT],
        }
    }

    /// Replace the built-in effect DSP
    pub fn with_processor(mut self, processor: Box<dyn FxProcessor>) -> Self {
        self.processor = processor;
        self
    }

    /// Generation of the snapshot currently rendered (0 before the first)
    pub fn generation(&self) -> u64 {
        self.current.as_ref().map_or(0, |s| s.generation)
    }

    /// Render one buffer
    ///
    /// `sources` is indexed by channel index; a missing or `None` entry is
    /// silence. `out` receives the effected master mix.
    pub fn render(&mut self, sources: &[Option<&[f32]>], out: &mut [f32]) {
        self.adopt_latest();
        out.fill(0.0);

        let mut offset = 0;
        while offset < out.len() {
            let frames = (out.len() - offset).min(self.max_block);
            self.render_block(sources, offset, &mut out[offset..offset + frames]);
            offset += frames;
        }
    }

    /// Take the newest published snapshot, retiring everything older
    fn adopt_latest(&mut self) {
        let mut changed = false;
        while let Ok(next) = self.incoming.try_recv() {
            if let Some(old) = self.current.replace(next) {
                self.retire_snapshot(old);
            }
            changed = true;
        }
        if changed {
            if let Some(current) = &self.current {
                self.observed.store(current.generation, Ordering::Release);
            }
        }
    }

    fn retire_snapshot(&self, snapshot: Arc<RenderSnapshot>) {
        // Sized so this cannot fill while the control side keeps publishing
        let _ = self.retire.try_send(snapshot);
    }

    fn render_block(&mut self, sources: &[Option<&[f32]>], offset: usize, out: &mut [f32]) {
        let Some(snapshot) = &self.current else {
            return;
        };
        let frames = out.len();
        let any_solo = snapshot.any_solo;

        for accum in &mut self.bus_accum {
            accum[..frames].fill(0.0);
        }
        self.bus_fed = [false; BUS_COUNT];

        // Instrument and plugin-instrument channels
        for channel in snapshot.channels.iter().filter(|c| !c.id.is_bus()) {
            if !channel.is_audible(any_solo) {
                continue;
            }
            let Some(source) = sources.get(channel.id.index()).copied().flatten() else {
                continue;
            };
            let scratch = &mut self.scratch[..frames];
            copy_source(source, offset, scratch);
            run_chain(self.processor.as_mut(), &channel.fx, scratch);

            let dest = match channel.bus {
                BusTarget::Master => &mut *out,
                BusTarget::Bus(bus) => {
                    self.bus_fed[bus.index()] = true;
                    &mut self.bus_accum[bus.index()][..frames]
                }
            };
            mix_into(dest, scratch, channel.amplitude);
        }

        // Buses
        for channel in snapshot.channels.iter() {
            let Some(bus) = channel.id.as_bus() else {
                continue;
            };
            // A bus fed by a soloed member stays audible
            let audible =
                !channel.muted && (!any_solo || channel.solo || self.bus_fed[bus.index()]);
            if !audible {
                continue;
            }
            let scratch = &mut self.scratch[..frames];
            scratch.copy_from_slice(&self.bus_accum[bus.index()][..frames]);
            run_chain(self.processor.as_mut(), &channel.fx, scratch);
            mix_into(out, scratch, channel.amplitude);
        }

        for fx in &snapshot.master_fx {
            self.processor.process(fx.kind, &fx.params, out);
        }
    }
}

fn copy_source(source: &[f32], offset: usize, scratch: &mut [f32]) {
    let available = source.len().saturating_sub(offset).min(scratch.len());
    scratch[..available].copy_from_slice(&source[offset..offset + available]);
    scratch[available..].fill(0.0);
}

fn run_chain(processor: &mut dyn FxProcessor, chain: &[FxSnapshot], buffer: &mut [f32]) {
    for fx in chain.iter().filter(|fx| !fx.bypass) {
        match (fx.kind, &fx.instance) {
            (FxKind::Builtin(kind), _) => processor.process(kind, &fx.params, buffer),
            (FxKind::Hosted(_), Some(instance)) => instance.process(buffer),
            (FxKind::Hosted(_), None) => {}
        }
    }
}

#[inline]
fn mix_into(dest: &mut [f32], src: &[f32], amplitude: f32) {
    for (d, s) in dest.iter_mut().zip(src) {
        *d += s * amplitude;
    }
}
