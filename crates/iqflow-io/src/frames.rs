//! Frame metadata sequences.
//!
//! Recorded per-frame sensor, AEC, AWB and lens metadata, replayed through a
//! [`FramePipeline`](iqflow_core::FramePipeline).

use crate::error::{IoError, Result};
use crate::format;
use iqflow_core::{CameraId, CarryOverKey, FrameMetrics};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;

/// The current version of the frame sequence format.
pub const FRAME_FILE_VERSION: &str = "1.0.0";

/// Maximum allowed frame sequence size (50 MB).
pub const MAX_FRAME_FILE_SIZE: u64 = 50 * 1024 * 1024;

/// Camera and output size the frames were captured with
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SensorMode {
    /// Camera instance
    pub camera: CameraId,
    /// Output width in pixels
    pub width: u32,
    /// Output height in pixels
    pub height: u32,
}

impl Default for SensorMode {
    fn default() -> Self {
        Self {
            camera: CameraId(0),
            width: 1920,
            height: 1080,
        }
    }
}

impl SensorMode {
    /// Scope of last-known-good register fields for this mode
    pub fn carry_over_key(&self) -> CarryOverKey {
        CarryOverKey::new(self.camera, self.width, self.height)
    }
}

/// A recorded frame sequence
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameSequenceFile {
    /// The version of the frame file format.
    pub version: String,
    /// Capture mode
    #[serde(default)]
    pub sensor: SensorMode,
    /// Frames in capture order
    pub frames: Vec<FrameMetrics>,
}

impl FrameSequenceFile {
    /// Sequence in the default sensor mode
    pub fn new(frames: Vec<FrameMetrics>) -> Self {
        Self {
            version: FRAME_FILE_VERSION.to_string(),
            sensor: SensorMode::default(),
            frames,
        }
    }

    /// Load a sequence from `path`, RON or JSON by extension.
    pub fn load(path: &Path) -> Result<Self> {
        format::load_with_limit(path, MAX_FRAME_FILE_SIZE)
    }

    /// Save the sequence to `path`.
    pub fn save(&self, path: &Path) -> Result<()> {
        format::save(self, path)
    }
}

/// Load a frame sequence, checking its format version.
pub fn load_frames(path: &Path) -> Result<FrameSequenceFile> {
    let file = FrameSequenceFile::load(path)?;
    if file.version != FRAME_FILE_VERSION {
        return Err(IoError::VersionMismatch {
            expected: FRAME_FILE_VERSION.to_string(),
            found: file.version,
        });
    }
    info!(path = %path.display(), frames = file.frames.len(), "Frame sequence loaded");
    Ok(file)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::template::template_frames;
    use tempfile::NamedTempFile;

    #[test]
    fn frames_ron_roundtrip() {
        let original = template_frames();
        let file = NamedTempFile::new().unwrap();
        let path = file.path().with_extension("ron");

        original.save(&path).unwrap();
        assert_eq!(load_frames(&path).unwrap(), original);
    }

    #[test]
    fn test_missing_fields_use_defaults() {
        let file = NamedTempFile::new().unwrap();
        let path = file.path().with_extension("json");
        std::fs::write(
            &path,
            r#"{ "version": "1.0.0", "frames": [ { "lux_index": 320.0 } ] }"#,
        )
        .unwrap();

        let loaded = load_frames(&path).unwrap();
        assert_eq!(loaded.sensor, SensorMode::default());
        assert_eq!(loaded.frames[0].lux_index, 320.0);
        assert_eq!(loaded.frames[0].real_gain, 1.0);
    }

    #[test]
    fn test_version_mismatch() {
        let mut sequence = FrameSequenceFile::new(Vec::new());
        sequence.version = "0.1.0".to_string();

        let file = NamedTempFile::new().unwrap();
        let path = file.path().with_extension("ron");
        sequence.save(&path).unwrap();

        match load_frames(&path) {
            Err(IoError::VersionMismatch { expected, found }) => {
                assert_eq!(expected, FRAME_FILE_VERSION);
                assert_eq!(found, "0.1.0");
            }
            other => panic!("expected VersionMismatch, got {:?}", other),
        }
    }
}
