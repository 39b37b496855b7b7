//! On-disk encodings.
//!
//! Every IQFlow file is RON or JSON, chosen by extension. RON is the default
//! for paths without an extension.

use crate::error::{IoError, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;

/// Serialization format of a file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileFormat {
    /// Rusty Object Notation, pretty-printed
    Ron,
    /// JSON, pretty-printed
    Json,
}

impl FileFormat {
    /// Format implied by the extension of `path`
    pub fn from_path(path: &Path) -> Result<Self> {
        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .unwrap_or("ron");

        match extension {
            "json" => Ok(FileFormat::Json),
            "ron" | "iqt" => Ok(FileFormat::Ron),
            _ => Err(IoError::UnsupportedFormat(extension.to_string())),
        }
    }
}

/// Read and deserialize `path`, refusing files larger than `limit` bytes
pub(crate) fn load_with_limit<T: DeserializeOwned>(path: &Path, limit: u64) -> Result<T> {
    // Check file size first
    let size = std::fs::metadata(path)?.len();
    if size > limit {
        return Err(IoError::FileTooLarge { size, limit });
    }

    let format = FileFormat::from_path(path)?;
    let mut content = String::new();
    File::open(path)?.read_to_string(&mut content)?;

    match format {
        FileFormat::Json => Ok(serde_json::from_str(&content)?),
        FileFormat::Ron => Ok(ron::from_str(&content)?),
    }
}

/// Serialize `value` to `path`
pub(crate) fn save<T: Serialize>(value: &T, path: &Path) -> Result<()> {
    match FileFormat::from_path(path)? {
        FileFormat::Json => {
            let file = File::create(path)?;
            serde_json::to_writer_pretty(file, value)?;
        }
        FileFormat::Ron => {
            let config = ron::ser::PrettyConfig::default();
            let s = ron::ser::to_string_pretty(value, config)?;
            let mut file = File::create(path)?;
            file.write_all(s.as_bytes())?;
        }
    }
    Ok(())
}
