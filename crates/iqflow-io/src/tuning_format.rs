//! Defines the on-disk tuning asset format.
//!
//! A tuning asset holds the definition and tuning data of every image-quality
//! module of one sensor configuration. It is serialized to and from RON or JSON
//! with versioning metadata around it.

use crate::error::Result;
use crate::format;
use chrono::{DateTime, Utc};
use iqflow_core::{IqModule, ModuleDefinition, ModuleTuning};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// The current version of the tuning asset format.
///
/// Stamped into saved assets; incremented on breaking changes to
/// [`TuningAssetFile`] or the core tuning types.
pub const TUNING_FILE_VERSION: &str = "1.0.0";

/// Maximum allowed tuning asset size (50 MB).
pub const MAX_TUNING_FILE_SIZE: u64 = 50 * 1024 * 1024;

/// Top-level structure of a saved tuning asset.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TuningAssetFile {
    /// The version of the tuning file format.
    pub version: String,
    /// Metadata about the asset.
    pub metadata: AssetMetadata,
    /// The modules of the asset.
    pub asset: TuningAsset,
}

impl TuningAssetFile {
    /// Wrap `asset`, setting creation and modification times to now.
    pub fn new(name: impl Into<String>, asset: TuningAsset) -> Self {
        let now = Utc::now();
        Self {
            version: TUNING_FILE_VERSION.to_string(),
            metadata: AssetMetadata {
                name: name.into(),
                description: String::new(),
                created_at: now,
                modified_at: now,
            },
            asset,
        }
    }

    /// Load a `TuningAssetFile` from `path`, RON or JSON by extension.
    pub fn load(path: &Path) -> Result<Self> {
        Self::load_with_limit(path, MAX_TUNING_FILE_SIZE)
    }

    /// Load with a specific file size limit.
    pub(crate) fn load_with_limit(path: &Path, limit: u64) -> Result<Self> {
        format::load_with_limit(path, limit)
    }

    /// Save to `path`, updating the `modified_at` timestamp.
    pub fn save(&mut self, path: &Path) -> Result<()> {
        self.metadata.modified_at = Utc::now();
        format::save(self, path)
    }
}

/// Metadata associated with a tuning asset.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AssetMetadata {
    /// Sensor or configuration name
    pub name: String,
    /// Free-form notes
    #[serde(default)]
    pub description: String,
    /// Timestamp of when the asset was first created.
    pub created_at: DateTime<Utc>,
    /// Timestamp of the last modification.
    pub modified_at: DateTime<Utc>,
}

/// One module of an asset
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ModuleAsset {
    /// Trigger levels and register schema
    pub definition: ModuleDefinition,
    /// Tuning data
    pub tuning: ModuleTuning,
}

impl ModuleAsset {
    /// Module name
    pub fn name(&self) -> &str {
        &self.definition.name
    }
}

/// Tuning data of every module
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct TuningAsset {
    /// Modules in pipeline order
    pub modules: Vec<ModuleAsset>,
}

impl TuningAsset {
    /// Module by name
    pub fn module(&self, name: &str) -> Option<&ModuleAsset> {
        self.modules.iter().find(|m| m.name() == name)
    }

    /// Module names in pipeline order
    pub fn module_names(&self) -> Vec<&str> {
        self.modules.iter().map(ModuleAsset::name).collect()
    }

    /// Configure every module whose name passes `filter`; an empty filter keeps all.
    pub fn build_modules(&self, filter: &[String]) -> Result<Vec<IqModule>> {
        let mut modules = Vec::new();
        for module in &self.modules {
            if !filter.is_empty() && !filter.iter().any(|f| f == module.name()) {
                continue;
            }
            modules.push(IqModule::new(
                module.definition.clone(),
                module.tuning.clone(),
            )?);
        }
        Ok(modules)
    }
}
