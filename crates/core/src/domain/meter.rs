//! Note-triggered peak meters
//!
//! Display-only. Updates come from the audio pipeline's note callback on
//! any thread and are lossy under contention: a lost update just means a
//! slightly lower peak on screen.

use crate::domain::channel::{ChannelId, CHANNEL_COUNT};
use crossbeam::utils::CachePadded;
use std::sync::atomic::{AtomicU32, Ordering};

/// Lock-free peak level per channel, in 0.0..=1.0
pub struct PeakMeters {
    levels: Box<[CachePadded<AtomicU32>]>,
}

impl PeakMeters {
    pub fn new() -> Self {
        let levels = (0..CHANNEL_COUNT)
            .map(|_| CachePadded::new(AtomicU32::new(0.0f32.to_bits())))
            .collect();
        Self { levels }
    }

    /// Raise the channel's peak to `level` if it is higher
    pub fn trigger(&self, channel: ChannelId, level: f32) {
        let slot = &self.levels[channel.index()];
        let level = level.clamp(0.0, 1.0);
        let current = slot.load(Ordering::Relaxed);
        if level > f32::from_bits(current) {
            // Single attempt: losing the race is acceptable
            let _ = slot.compare_exchange(
                current,
                level.to_bits(),
                Ordering::Relaxed,
                Ordering::Relaxed,
            );
        }
    }

    pub fn peak(&self, channel: ChannelId) -> f32 {
        f32::from_bits(self.levels[channel.index()].load(Ordering::Relaxed))
    }

    /// Lower every peak by `amount`, called from the UI tick
    pub fn decay(&self, amount: f32) {
        for slot in self.levels.iter() {
            let current = slot.load(Ordering::Relaxed);
            let next = (f32::from_bits(current) - amount).max(0.0);
            let _ = slot.compare_exchange(
                current,
                next.to_bits(),
                Ordering::Relaxed,
                Ordering::Relaxed,
            );
        }
    }

    pub fn reset(&self) {
        for slot in self.levels.iter() {
            slot.store(0.0f32.to_bits(), Ordering::Relaxed);
        }
    }
}

impl Default for PeakMeters {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for PeakMeters {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PeakMeters")
            .field("channels", &self.levels.len())
            .finish()
    }
}
