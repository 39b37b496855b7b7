//! IQFlow Core - Trigger Interpolation and Register Encoding
//!
//! This crate turns hierarchical image-quality tuning tables into per-frame
//! hardware register fields. Every image-quality module follows the same path:
//!
//! 1. Build a [`TriggerSnapshot`] from the frame's sensor, AEC, AWB and lens metadata.
//! 2. Build an [`InterpolationTree`] top-down, one level per trigger dimension.
//! 3. Evaluate the tree bottom-up, blending neighbouring regions into one [`ParameterBlock`].
//! 4. Quantize the block into a [`RegisterFieldSet`] using the module's [`RegisterSchema`].
//!
//! Everything here is synchronous and allocation-light. Modules of the same frame can be
//! evaluated on separate threads through [`FramePipeline`].

#![warn(missing_docs)]

pub mod blend;
pub mod block;
pub mod carry_over;
pub mod diagnostics;
pub mod hysteresis;
pub mod logging;
pub mod module;
pub mod pipeline;
pub mod quantize;
pub mod region;
pub mod register;
pub mod search;
pub mod slope;
pub mod tree;
pub mod trigger;

pub use blend::{interpolate, lerp, nearest_neighbour, Interpolate};
pub use block::{FieldKind, FieldValue, ParameterBlock};
pub use carry_over::{AspectRatioKey, CameraId, CarryOverCache, CarryOverKey};
pub use diagnostics::{has_errors, validate_tuning, IssueSeverity, TuningIssue};
pub use hysteresis::{ControlVariable, DynamicEnable, HysteresisDirection, TriggerCouplet};
pub use logging::LogConfig;
pub use module::{
    IqModule, ModuleDefinition, ModuleOutcome, ModuleRunner, ModuleTuning,
    COLOR_CORRECTION_LEVELS, LENS_CORRECTION_LEVELS, SHARPENING_LEVELS, TONE_MAPPING_LEVELS,
};
pub use pipeline::{FramePipeline, FrameReport, LastGoodFields, ModuleReport};
pub use quantize::{
    complement_encode, dequantize, quantize, scale_to_q, Encoding, FieldRange,
};
pub use region::{
    interpolation_ratio, RegionEntry, RegionPayload, RegionTable, RegionTrigger, TriggerRegion,
};
pub use register::{
    quantize_to_hardware_fields, FieldRule, FieldSpec, QuantizedField, RegisterFieldSet,
    RegisterSchema, RegisterValue,
};
pub use search::{
    find_bracket, led_selection, ChildSelection, LevelOperation, OperationTable, RegionBracket,
    SearchFn, SearchKind, MAX_CHILDREN, MAX_RATIOS,
};
pub use slope::{
    encode_slope, encode_slope_table, frexp, validate_knots, SlopeEncoding, SlopeEntry,
};
pub use tree::{run_interpolation, InterpolationTree, NodeId, TreeLayout, MAX_TREE_LEVELS};
pub use trigger::{
    float_eq, AecControl, ControlMethod, FrameMetrics, HdrAecControl, LedState, LedTrigger,
    TriggerSnapshot,
};

use thiserror::Error;

/// Errors raised while building, evaluating or encoding a module's parameters.
///
/// None of these are fatal for a frame: the caller bypasses the failing module.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CoreError {
    /// A region table that must be searched has no entries
    #[error("Region table at level {level} is empty")]
    EmptyRegionTable {
        /// Tree level whose search found nothing to select
        level: usize,
    },

    /// The module has no search operations configured
    #[error("No search operations configured")]
    MissingSearchTable,

    /// More trigger dimensions than the tree supports
    #[error("Too many tree levels: {count} (max {max})")]
    TooManyLevels {
        /// Requested level count
        count: usize,
        /// Supported maximum
        max: usize,
    },

    /// A search returned more children than its level allows
    #[error("Level {level} selected {selected} children but allows {allowed}")]
    TreeCapacityExceeded {
        /// Tree level
        level: usize,
        /// Children selected by the search
        selected: usize,
        /// Children allowed by the operation table
        allowed: usize,
    },

    /// The nesting of a tuning table does not match the level count
    #[error("Tuning table depth does not match operation table at level {level}")]
    TableDepthMismatch {
        /// Level at which a leaf or table was found unexpectedly
        level: usize,
    },

    /// A search selected a region index outside its table
    #[error("Region index {index} out of range at level {level}")]
    RegionIndexOutOfRange {
        /// Tree level
        level: usize,
        /// Offending index
        index: usize,
    },

    /// An interior node has no materialized parameter block
    #[error("Interpolation tree is malformed at node {0}")]
    MalformedTree(usize),

    /// Blend ratio outside [0, 1]
    #[error("Invalid interpolation ratio: {0}")]
    InvalidRatio(f32),

    /// Two parameter blocks disagree on a field
    #[error("Field mismatch on '{field}'")]
    FieldMismatch {
        /// Field name
        field: String,
    },

    /// A schema entry names a field the block does not carry
    #[error("Missing field: {0}")]
    MissingField(String),

    /// A schema rule cannot be applied to the field's value kind
    #[error("Field '{field}' has kind {found}, rule expects {expected}")]
    FieldKindMismatch {
        /// Field name
        field: String,
        /// Kind the rule accepts
        expected: &'static str,
        /// Kind present in the block
        found: &'static str,
    },

    /// Knot positions are not strictly increasing
    #[error("Degenerate knot interval at index {index} (position {position})")]
    DegenerateKnots {
        /// Index of the first knot of the zero or negative width interval
        index: usize,
        /// Position of that knot
        position: i32,
    },

    /// Fewer than two knots
    #[error("At least two knots required, got {0}")]
    TooFewKnots(usize),

    /// Control points and knots differ in length
    #[error("Knot count mismatch: {points} control points, {knots} knots")]
    KnotCountMismatch {
        /// Number of control points
        points: usize,
        /// Number of knot positions
        knots: usize,
    },

    /// Slope mantissa width out of the supported range
    #[error("Invalid slope Q bits: {0}")]
    InvalidSlopeQBits(u32),

    /// Q-format scale out of the supported range
    #[error("Invalid Q bits: {0}")]
    InvalidQBits(u32),

    /// Register field whose range holds no value
    #[error("Register {0} has an empty range")]
    EmptyFieldRange(String),
}

/// Result type for core operations
pub type Result<T> = std::result::Result<T, CoreError>;
