//! Channel mixing, bus routing and effects-chain engine for the synth mixer.

pub mod domain;
