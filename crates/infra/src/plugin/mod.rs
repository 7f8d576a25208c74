//! Plugin host implementations

pub mod gain;
pub mod registry;

pub use gain::{GAIN_UID, POLARITY_UID};
pub use registry::{FactoryHost, PluginFactory};
