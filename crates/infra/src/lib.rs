//! Platform side of the synth mixer: render bridge, plugin host and
//! audio device enumeration.

pub mod audio;
pub mod plugin;
