//! Bus (aggregation channel) routing
//!
//! Instrument and plugin-instrument channels feed either the master bus
//! or one of the sixteen aggregation buses. Buses always feed master, so
//! routing is at most one level deep and cannot cycle.

use crate::domain::channel::{Channel, ChannelId};
use crate::domain::error::{MixerError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Number of aggregation buses
pub const BUS_COUNT: usize = 16;

/// Index of an aggregation bus (0-based, displayed 1-based)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BusIndex(u8);

impl BusIndex {
    pub fn new(index: usize) -> Result<Self> {
        if index < BUS_COUNT {
            Ok(Self(index as u8))
        } else {
            Err(MixerError::UnknownBus(index))
        }
    }

    pub(crate) fn from_raw(index: u8) -> Self {
        debug_assert!((index as usize) < BUS_COUNT);
        Self(index)
    }

    pub fn index(self) -> usize {
        self.0 as usize
    }

    /// 1-based number as shown to users ("Bus 3")
    pub fn number(self) -> usize {
        self.index() + 1
    }

    pub fn all() -> impl Iterator<Item = BusIndex> {
        (0..BUS_COUNT as u8).map(Self)
    }
}

impl fmt::Display for BusIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Bus {}", self.number())
    }
}

/// Where a channel's output is summed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum BusTarget {
    #[default]
    Master,
    Bus(BusIndex),
}

impl BusTarget {
    /// Persisted form: -1 for master, otherwise the bus index
    pub fn to_raw(self) -> i32 {
        match self {
            BusTarget::Master => -1,
            BusTarget::Bus(bus) => bus.index() as i32,
        }
    }

    pub fn from_raw(raw: i32) -> Result<Self> {
        if raw < 0 {
            Ok(BusTarget::Master)
        } else {
            BusIndex::new(raw as usize).map(BusTarget::Bus)
        }
    }
}

/// Derived view of which channels feed each bus
///
/// Never stored: rebuilt from the channels' `bus` fields whenever needed.
#[derive(Debug, Clone, Default)]
pub struct BusRoutingTable {
    members: [Vec<ChannelId>; BUS_COUNT],
}

impl BusRoutingTable {
    pub fn from_channels(channels: &[Channel]) -> Self {
        let mut table = Self::default();
        for channel in channels {
            if channel.id.is_bus() {
                continue;
            }
            if let BusTarget::Bus(bus) = channel.bus {
                table.members[bus.index()].push(channel.id);
            }
        }
        table
    }

    /// Channels routed into `bus`, in topology order
    pub fn members(&self, bus: BusIndex) -> &[ChannelId] {
        &self.members[bus.index()]
    }
}

/// Short and full display names of every bus
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BusNames {
    short: Vec<String>,
    full: Vec<String>,
}

impl BusNames {
    pub fn new() -> Self {
        Self {
            short: BusIndex::all().map(|b| format!("Bus {}", b.number())).collect(),
            full: BusIndex::all()
                .map(|b| format!("Bus Group {}", b.number()))
                .collect(),
        }
    }

    pub fn short(&self, bus: BusIndex) -> &str {
        &self.short[bus.index()]
    }

    pub fn full(&self, bus: BusIndex) -> &str {
        &self.full[bus.index()]
    }

    pub fn set(&mut self, bus: BusIndex, short: String, full: String) {
        self.short[bus.index()] = short;
        self.full[bus.index()] = full;
    }

    /// Replace all names. Lists that are not exactly `BUS_COUNT` long are ignored.
    pub fn restore(&mut self, short: &[String], full: &[String]) -> bool {
        if short.len() != BUS_COUNT || full.len() != BUS_COUNT {
            return false;
        }
        self.short = short.to_vec();
        self.full = full.to_vec();
        true
    }

    pub fn short_names(&self) -> &[String] {
        &self.short
    }

    pub fn full_names(&self) -> &[String] {
        &self.full
    }
}

impl Default for BusNames {
    fn default() -> Self {
        Self::new()
    }
}
