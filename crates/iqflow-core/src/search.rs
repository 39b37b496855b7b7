//! Region search
//!
//! Locates the region(s) of a table that bracket a trigger value, and maps each
//! trigger dimension to its search function through a small dispatch table built
//! once per module.

use crate::region::{RegionTable, TriggerRegion};
use crate::tree::MAX_TREE_LEVELS;
use crate::trigger::{LedTrigger, TriggerSnapshot};
use crate::{CoreError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Maximum children of one tree node (two brackets plus a third light source)
pub const MAX_CHILDREN: usize = 3;
/// Maximum interpolation ratios stored on one node
pub const MAX_RATIOS: usize = MAX_CHILDREN - 1;

/// Result of a single-dimension search
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RegionBracket {
    /// First region to blend
    pub start_index: usize,
    /// Second region to blend (equal to `start_index` when holding one region)
    pub end_index: usize,
    /// Weight of `end_index`, in [0, 1]
    pub ratio: f32,
}

impl RegionBracket {
    /// Hold a single region
    pub const fn hold(index: usize) -> Self {
        Self {
            start_index: index,
            end_index: index,
            ratio: 0.0,
        }
    }

    /// Whether this bracket selects exactly one region
    pub fn is_hold(&self) -> bool {
        self.start_index == self.end_index
    }
}

/// Find the regions bracketing `value`.
///
/// Values inside a region, below the first region or above the last region hold
/// that region. Between region `i` and `i + 1` the value blends from `i` to `i + 1`:
/// across the gap `end_i..start_{i+1}` when the regions are separated, or across
/// `end_i..end_{i+1}` when they touch or overlap. Returns `None` for an empty table.
pub fn find_bracket(regions: &[TriggerRegion], value: f32) -> Option<RegionBracket> {
    locate(regions.len(), |i| regions[i], value)
}

fn locate(
    count: usize,
    region_at: impl Fn(usize) -> TriggerRegion,
    value: f32,
) -> Option<RegionBracket> {
    for index in 0..count {
        let current = region_at(index);
        if value <= current.end || index + 1 == count {
            return Some(RegionBracket::hold(index));
        }

        let next = region_at(index + 1);
        let target = if next.start > current.end {
            next.start
        } else {
            next.end
        };
        let width = target - current.end;
        if width > 0.0 && value < target {
            let ratio = ((value - current.end) / width).clamp(0.0, 1.0);
            return Some(RegionBracket {
                start_index: index,
                end_index: index + 1,
                ratio,
            });
        }
    }

    None
}

/// Children selected by one node's search, with the ratios between them
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChildSelection {
    children: [usize; MAX_CHILDREN],
    count: usize,
    ratios: [f32; MAX_RATIOS],
}

impl ChildSelection {
    /// One child, no blending
    pub const fn single(index: usize) -> Self {
        Self {
            children: [index, 0, 0],
            count: 1,
            ratios: [0.0; MAX_RATIOS],
        }
    }

    /// Two children blended by `ratio`
    pub const fn pair(first: usize, second: usize, ratio: f32) -> Self {
        Self {
            children: [first, second, 0],
            count: 2,
            ratios: [ratio, 0.0],
        }
    }

    /// Append a child blended onto the current result by `ratio`.
    ///
    /// Returns `false` when the selection is already full.
    pub fn push(&mut self, index: usize, ratio: f32) -> bool {
        if self.count >= MAX_CHILDREN {
            return false;
        }
        self.ratios[self.count - 1] = ratio;
        self.children[self.count] = index;
        self.count += 1;
        true
    }

    /// Selected region indices
    pub fn children(&self) -> &[usize] {
        &self.children[..self.count]
    }

    /// Ratios between consecutive children
    pub fn ratios(&self) -> &[f32] {
        &self.ratios[..self.count - 1]
    }

    /// Number of children
    pub fn len(&self) -> usize {
        self.count
    }

    /// Always false; a selection holds at least one child
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }
}

impl From<RegionBracket> for ChildSelection {
    fn from(bracket: RegionBracket) -> Self {
        if bracket.is_hold() {
            Self::single(bracket.start_index)
        } else {
            Self::pair(bracket.start_index, bracket.end_index, bracket.ratio)
        }
    }
}

/// LED dimension search.
///
/// Entry 0 is LED-off, entry 1 LED-on, entry 2 the third light source. With no LED
/// or a single entry the table holds entry 0. Otherwise the LED sensitivity blends
/// entry 0 into entry 1 over the tuning-supplied sensitivity interval. Three or more
/// LEDs with a non-zero first-entry ratio add entry 2 at weight
/// `1 - first_entry_ratio`.
pub fn led_selection(region_count: usize, led: &LedTrigger) -> Option<ChildSelection> {
    if region_count == 0 {
        return None;
    }
    if led.count == 0 || region_count == 1 {
        return Some(ChildSelection::single(0));
    }

    let window = led.sensitivity_trigger;
    let bracket = if led.sensitivity >= window.end {
        RegionBracket::hold(1)
    } else if led.sensitivity <= window.start {
        RegionBracket::hold(0)
    } else {
        RegionBracket {
            start_index: 0,
            end_index: 1,
            ratio: window.ratio(led.sensitivity),
        }
    };

    let last = region_count - 1;
    let mut selection = ChildSelection::from(RegionBracket {
        start_index: bracket.start_index.min(last),
        end_index: bracket.end_index.min(last),
        ratio: bracket.ratio,
    });

    if led.count >= 3 && region_count >= 3 && led.first_entry_ratio != 0.0 {
        let secondary = (1.0 - led.first_entry_ratio).clamp(0.0, 1.0);
        selection.push(2, secondary);
    }

    Some(selection)
}

/// Search function of one tree level
pub type SearchFn<P> = fn(SearchKind, &RegionTable<P>, &TriggerSnapshot) -> Option<ChildSelection>;

/// Trigger dimensions a tree level can search
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SearchKind {
    /// Total output scale ratio
    TotalScaleRatio,
    /// Scale ratio before the module
    PreScaleRatio,
    /// Scale ratio after the module
    PostScaleRatio,
    /// DRC gain
    DrcGain,
    /// HDR-AEC ratio
    HdrAec,
    /// AEC lux index or gain
    Aec,
    /// Flash LED state
    Led,
    /// Color temperature
    Cct,
    /// Lens focus position
    LensPosition,
    /// Lens zoom
    LensZoom,
}

impl SearchKind {
    /// Children a node of this dimension may select
    pub fn max_children(self) -> usize {
        match self {
            SearchKind::Led => MAX_CHILDREN,
            _ => 2,
        }
    }

    /// Snapshot value compared against this dimension's regions
    pub fn trigger_value(self, trigger: &TriggerSnapshot) -> f32 {
        match self {
            SearchKind::TotalScaleRatio => trigger.total_scale_ratio,
            SearchKind::PreScaleRatio => trigger.pre_scale_ratio,
            SearchKind::PostScaleRatio => trigger.post_scale_ratio,
            SearchKind::DrcGain => trigger.drc_gain,
            SearchKind::HdrAec => trigger.hdr_aec,
            SearchKind::Aec => trigger.aec,
            SearchKind::Led => trigger.led.sensitivity,
            SearchKind::Cct => trigger.cct,
            SearchKind::LensPosition => trigger.lens_position,
            SearchKind::LensZoom => trigger.lens_zoom,
        }
    }

    /// Search function for this dimension
    pub fn search_fn<P>(self) -> SearchFn<P> {
        match self {
            SearchKind::Led => search_led::<P>,
            _ => search_regions::<P>,
        }
    }
}

impl fmt::Display for SearchKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

fn search_regions<P>(
    kind: SearchKind,
    table: &RegionTable<P>,
    trigger: &TriggerSnapshot,
) -> Option<ChildSelection> {
    let value = kind.trigger_value(trigger);
    locate(
        table.len(),
        |i| table.entries[i].trigger.resolve(&trigger.control),
        value,
    )
    .map(ChildSelection::from)
}

fn search_led<P>(
    _kind: SearchKind,
    table: &RegionTable<P>,
    trigger: &TriggerSnapshot,
) -> Option<ChildSelection> {
    led_selection(table.len(), &trigger.led)
}

/// One level of a module's operation table
pub struct LevelOperation<P> {
    /// Dimension searched at this level
    pub kind: SearchKind,
    /// Search function
    pub search: SearchFn<P>,
    /// Maximum children per node at this level
    pub max_children: usize,
}

impl<P> Clone for LevelOperation<P> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<P> Copy for LevelOperation<P> {}

impl<P> fmt::Debug for LevelOperation<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LevelOperation")
            .field("kind", &self.kind)
            .field("max_children", &self.max_children)
            .finish()
    }
}

/// Per-module dispatch table, one entry per tree level
pub struct OperationTable<P> {
    levels: Vec<LevelOperation<P>>,
}

impl<P> Clone for OperationTable<P> {
    fn clone(&self) -> Self {
        Self {
            levels: self.levels.clone(),
        }
    }
}

impl<P> fmt::Debug for OperationTable<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.levels.iter()).finish()
    }
}

impl<P> OperationTable<P> {
    /// Build the table for an ordered list of dimensions
    pub fn from_kinds(kinds: &[SearchKind]) -> Result<Self> {
        if kinds.is_empty() {
            return Err(CoreError::MissingSearchTable);
        }
        if kinds.len() > MAX_TREE_LEVELS {
            return Err(CoreError::TooManyLevels {
                count: kinds.len(),
                max: MAX_TREE_LEVELS,
            });
        }

        let levels = kinds
            .iter()
            .map(|&kind| LevelOperation {
                kind,
                search: kind.search_fn::<P>(),
                max_children: kind.max_children(),
            })
            .collect();
        Ok(Self { levels })
    }

    /// Number of search levels
    pub fn len(&self) -> usize {
        self.levels.len()
    }

    /// Whether the table has no levels
    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }

    /// Operation of level `index`
    pub fn get(&self, index: usize) -> Option<&LevelOperation<P>> {
        self.levels.get(index)
    }

    /// Iterate levels top-down
    pub fn iter(&self) -> impl Iterator<Item = &LevelOperation<P>> {
        self.levels.iter()
    }

    /// Dimensions in level order
    pub fn kinds(&self) -> Vec<SearchKind> {
        self.levels.iter().map(|l| l.kind).collect()
    }
}
