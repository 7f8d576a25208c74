//! Audio pipeline side of the mixer
//!
//! - `bridge`: lock-free snapshot hand-off and the real-time render pass
//! - `cpal_backend`: output device enumeration through CPAL
//! - `offline`: test-tone render pass driven from the calling thread

pub mod bridge;
pub mod cpal_backend;
pub mod offline;

pub use bridge::{FxProcessor, Passthrough, RenderBridge, Renderer};
pub use cpal_backend::CpalEnumerator;
pub use offline::{render_test_tone, OfflineRender};
