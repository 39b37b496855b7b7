//! Trigger regions and region tables
//!
//! A tuning table is a tree of [`RegionTable`]s. Each table covers one trigger
//! dimension; every entry is valid over a [`TriggerRegion`] of that dimension and
//! carries either the next dimension's table or a terminal parameter block.

use crate::trigger::{AecControl, ControlMethod, HdrAecControl};
use serde::{Deserialize, Serialize};

/// Bracketing interval in one trigger dimension
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct TriggerRegion {
    /// Lower bound
    pub start: f32,
    /// Upper bound
    pub end: f32,
}

impl TriggerRegion {
    /// Create a new region
    pub const fn new(start: f32, end: f32) -> Self {
        Self { start, end }
    }

    /// Whether `value` lies inside the closed interval
    pub fn contains(&self, value: f32) -> bool {
        value >= self.start && value <= self.end
    }

    /// Width of the interval
    pub fn width(&self) -> f32 {
        self.end - self.start
    }

    /// Position of `value` inside this region, see [`interpolation_ratio`]
    pub fn ratio(&self, value: f32) -> f32 {
        interpolation_ratio(value, self.start, self.end)
    }
}

/// Normalized position of `value` between `start` and `end`.
///
/// Below `start` yields 0, at or above `end` yields 1. A zero-width interval
/// therefore switches from 0 to 1 at `start` without dividing.
pub fn interpolation_ratio(value: f32, start: f32, end: f32) -> f32 {
    if value < start {
        0.0
    } else if value >= end {
        1.0
    } else {
        (value - start) / (end - start)
    }
}

/// Trigger bracket of one region entry.
///
/// Some dimensions can be driven by more than one raw input (AEC by lux index or by
/// gain, HDR-AEC by one of three ratios). Such entries carry one bracket per input
/// and the module's [`ControlMethod`] selects which one applies.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum RegionTrigger {
    /// Single bracket
    Range(TriggerRegion),
    /// AEC bracket pair
    Aec {
        /// Bracket used with [`AecControl::LuxIndex`]
        lux_index: TriggerRegion,
        /// Bracket used with [`AecControl::Gain`]
        gain: TriggerRegion,
    },
    /// HDR-AEC bracket triple
    HdrAec {
        /// Bracket used with [`HdrAecControl::ExposureTimeRatio`]
        exposure_time_ratio: TriggerRegion,
        /// Bracket used with [`HdrAecControl::SensitivityRatio`]
        sensitivity_ratio: TriggerRegion,
        /// Bracket used with [`HdrAecControl::ExposureGainRatio`]
        exposure_gain_ratio: TriggerRegion,
    },
}

impl RegionTrigger {
    /// Bracket selected by the control method
    pub fn resolve(&self, control: &ControlMethod) -> TriggerRegion {
        match *self {
            RegionTrigger::Range(region) => region,
            RegionTrigger::Aec { lux_index, gain } => match control.aec {
                AecControl::LuxIndex => lux_index,
                AecControl::Gain => gain,
            },
            RegionTrigger::HdrAec {
                exposure_time_ratio,
                sensitivity_ratio,
                exposure_gain_ratio,
            } => match control.hdr_aec {
                HdrAecControl::ExposureTimeRatio => exposure_time_ratio,
                HdrAecControl::SensitivityRatio => sensitivity_ratio,
                HdrAecControl::ExposureGainRatio => exposure_gain_ratio,
            },
        }
    }

    /// Every bracket this entry carries, in declaration order
    pub fn brackets(&self) -> Vec<TriggerRegion> {
        match *self {
            RegionTrigger::Range(region) => vec![region],
            RegionTrigger::Aec { lux_index, gain } => vec![lux_index, gain],
            RegionTrigger::HdrAec {
                exposure_time_ratio,
                sensitivity_ratio,
                exposure_gain_ratio,
            } => vec![exposure_time_ratio, sensitivity_ratio, exposure_gain_ratio],
        }
    }
}

impl From<TriggerRegion> for RegionTrigger {
    fn from(region: TriggerRegion) -> Self {
        RegionTrigger::Range(region)
    }
}

/// Payload of a region entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RegionPayload<P> {
    /// Table of the next trigger dimension
    Table(RegionTable<P>),
    /// Terminal parameter block
    Leaf(P),
}

/// One region of a table with its payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegionEntry<P> {
    /// Trigger bracket
    pub trigger: RegionTrigger,
    /// Nested table or leaf block
    pub payload: RegionPayload<P>,
}

impl<P> RegionEntry<P> {
    /// Entry with a terminal block
    pub fn leaf(trigger: impl Into<RegionTrigger>, block: P) -> Self {
        Self {
            trigger: trigger.into(),
            payload: RegionPayload::Leaf(block),
        }
    }

    /// Entry with a nested table
    pub fn table(trigger: impl Into<RegionTrigger>, table: RegionTable<P>) -> Self {
        Self {
            trigger: trigger.into(),
            payload: RegionPayload::Table(table),
        }
    }
}

/// Ordered regions of one trigger dimension.
///
/// Owned by the tuning asset and only ever read during interpolation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegionTable<P> {
    /// Entries, ascending by region start
    pub entries: Vec<RegionEntry<P>>,
}

impl<P> Default for RegionTable<P> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
        }
    }
}

impl<P> RegionTable<P> {
    /// Create a table from its entries
    pub fn new(entries: Vec<RegionEntry<P>>) -> Self {
        Self { entries }
    }

    /// Number of regions
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the table has no regions
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entry at `index`
    pub fn get(&self, index: usize) -> Option<&RegionEntry<P>> {
        self.entries.get(index)
    }

    /// Bracket of region `index` under `control`
    pub fn region(&self, index: usize, control: &ControlMethod) -> Option<TriggerRegion> {
        self.entries.get(index).map(|e| e.trigger.resolve(control))
    }

    /// Nesting depth along the first entry of every level (1 for a table of leaves)
    pub fn depth(&self) -> usize {
        match self.entries.first().map(|e| &e.payload) {
            Some(RegionPayload::Table(inner)) => 1 + inner.depth(),
            _ => 1,
        }
    }

    /// All leaf blocks reachable from this table, depth first
    pub fn leaves(&self) -> Vec<&P> {
        let mut out = Vec::new();
        self.collect_leaves(&mut out);
        out
    }

    fn collect_leaves<'a>(&'a self, out: &mut Vec<&'a P>) {
        for entry in &self.entries {
            match &entry.payload {
                RegionPayload::Table(inner) => inner.collect_leaves(out),
                RegionPayload::Leaf(block) => out.push(block),
            }
        }
    }
}
