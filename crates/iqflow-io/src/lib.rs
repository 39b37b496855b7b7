//! IQFlow IO - Tuning Assets and Frame Sequences
//!
//! File formats around the core engine:
//!
//! - **Tuning assets**: module definitions and tuning tables, versioned, RON or JSON
//! - **Frame sequences**: recorded per-frame metadata to replay through a pipeline
//! - **Templates**: a complete starter asset and matching frames
//!
//! Loading a tuning asset validates every module; assets with error-severity
//! issues are refused before any frame is processed.

#![warn(missing_docs)]

pub mod error;
pub mod format;
pub mod frames;
pub mod template;
pub mod tuning;
pub mod tuning_format;

pub use error::{IoError, Result};
pub use format::FileFormat;
pub use frames::{load_frames, FrameSequenceFile, SensorMode, FRAME_FILE_VERSION};
pub use template::{template_asset, template_frames};
pub use tuning::{check_asset, load_tuning_asset, save_tuning_asset, validate_asset};
pub use tuning_format::{
    AssetMetadata, ModuleAsset, TuningAsset, TuningAssetFile, MAX_TUNING_FILE_SIZE,
    TUNING_FILE_VERSION,
};
