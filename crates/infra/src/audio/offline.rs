//! Offline render pass
//!
//! Drives a [`Renderer`](crate::audio::Renderer) from the calling thread with a sine test tone on
//! chosen channels, sized by the application's buffer and sample-rate
//! settings. Used to check routing, mute/solo and FX state without an
//! output device.

use crate::audio::bridge::RenderBridge;
use std::f32::consts::TAU;
use std::sync::Arc;
use synthmix_core::domain::{
    AppConfig, BusTarget, ChannelId, MixerEngine, NoteEvent, CHANNEL_COUNT,
};
use tracing::{debug, info};

const TONE_HZ: f32 = 440.0;
const TONE_AMPLITUDE: f32 = 0.5;
const QUEUE_DEPTH: usize = 4;

/// Outcome of [`render_test_tone`]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OfflineRender {
    pub frames: usize,
    pub blocks: usize,
    /// Largest absolute master sample
    pub master_peak: f32,
}

/// Render `seconds` of a test tone on `channels` through the engine's
/// current state
///
/// Attaches a fresh render bridge to the engine. Each channel gets one
/// note trigger at the start and meters decay by `meter_decay` after
/// every block.
pub fn render_test_tone(
    engine: &mut MixerEngine,
    app: &AppConfig,
    channels: &[ChannelId],
    seconds: f32,
) -> OfflineRender {
    let block = app.buffer_size.max(1) as usize;
    let sample_rate = app.sample_rate.max(1) as f32;
    let frames = (seconds.max(0.0) * sample_rate) as usize;

    let (bridge, mut renderer) = RenderBridge::new(QUEUE_DEPTH, block);
    let bridge = Arc::new(bridge);
    engine.attach_publisher(bridge.clone());

    for &channel in channels {
        let bus = match engine.channel(channel).bus {
            BusTarget::Bus(bus) => Some(bus),
            BusTarget::Master => None,
        };
        engine.note_triggered(NoteEvent {
            channel,
            bus,
            note: 69,
            velocity: 100,
        });
    }

    let meters = engine.meters();
    let mut tone = vec![0.0f32; block];
    let mut out = vec![0.0f32; block];
    let mut result = OfflineRender {
        frames,
        blocks: 0,
        master_peak: 0.0,
    };

    let mut position = 0;
    while position < frames {
        let len = (frames - position).min(block);
        for (i, sample) in tone[..len].iter_mut().enumerate() {
            let t = (position + i) as f32 / sample_rate;
            *sample = TONE_AMPLITUDE * (TAU * TONE_HZ * t).sin();
        }

        let mut sources: Vec<Option<&[f32]>> = vec![None; CHANNEL_COUNT];
        for channel in channels {
            sources[channel.index()] = Some(&tone[..len]);
        }
        renderer.render(&sources, &mut out[..len]);

        let peak = out[..len].iter().fold(0.0f32, |acc, s| acc.max(s.abs()));
        result.master_peak = result.master_peak.max(peak);
        meters.decay(app.meter_decay);
        engine.reclaim();

        position += len;
        result.blocks += 1;
    }
    bridge.drain_retired();

    debug!(generation = renderer.generation(), "Offline render finished");
    info!(
        frames = result.frames,
        blocks = result.blocks,
        peak = result.master_peak,
        "Rendered test tone"
    );
    result
}
