//! Tuning I/O - High-level API
//!
//! Saving and loading tuning assets with application-level checks: format
//! version, unique module names, and load-time validation of every module's
//! tuning data. Serialization itself lives in [`crate::tuning_format`].

use crate::error::{IoError, Result};
use crate::tuning_format::{TuningAsset, TuningAssetFile, TUNING_FILE_VERSION};
use iqflow_core::{validate_tuning, IssueSeverity, TuningIssue};
use std::collections::HashSet;
use std::path::Path;
use tracing::{info, warn};

/// Save `asset` under the sensor configuration `name`.
pub fn save_tuning_asset(asset: &TuningAsset, name: &str, path: &Path) -> Result<()> {
    let mut file = TuningAssetFile::new(name, asset.clone());
    file.save(path)?;
    info!(path = %path.display(), modules = asset.modules.len(), "Tuning asset saved");
    Ok(())
}

/// Validate every module of `asset`, returning `(module, issue)` pairs.
pub fn validate_asset(asset: &TuningAsset) -> Vec<(String, TuningIssue)> {
    asset
        .modules
        .iter()
        .flat_map(|module| {
            validate_tuning(&module.definition, &module.tuning)
                .into_iter()
                .map(|issue| (module.name().to_string(), issue))
        })
        .collect()
}

/// Check module name uniqueness and tuning validity.
///
/// Warnings are logged; the first module with error-severity issues fails the check.
pub fn check_asset(asset: &TuningAsset) -> Result<()> {
    let mut seen = HashSet::new();
    for name in asset.module_names() {
        if !seen.insert(name) {
            return Err(IoError::DuplicateModule(name.to_string()));
        }
    }

    for module in &asset.modules {
        let (errors, others): (Vec<_>, Vec<_>) =
            validate_tuning(&module.definition, &module.tuning)
                .into_iter()
                .partition(|issue| issue.severity == IssueSeverity::Error);

        for issue in &others {
            warn!(module = %module.name(), "{}", issue);
        }
        if !errors.is_empty() {
            return Err(IoError::InvalidTuning {
                module: module.name().to_string(),
                issues: errors,
            });
        }
    }
    Ok(())
}

/// Load a tuning asset, checking its version and the validity of every module.
pub fn load_tuning_asset(path: &Path) -> Result<TuningAsset> {
    let file = TuningAssetFile::load(path)?;

    // No migrations yet; any other version is rejected
    if file.version != TUNING_FILE_VERSION {
        return Err(IoError::VersionMismatch {
            expected: TUNING_FILE_VERSION.to_string(),
            found: file.version,
        });
    }

    check_asset(&file.asset)?;
    info!(
        path = %path.display(),
        name = %file.metadata.name,
        modules = file.asset.modules.len(),
        "Tuning asset loaded"
    );
    Ok(file.asset)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::template::template_asset;
    use iqflow_core::RegionTable;
    use tempfile::NamedTempFile;

    #[test]
    fn tuning_ron_roundtrip() {
        let original = template_asset();
        let file = NamedTempFile::new().unwrap();
        let path = file.path().with_extension("ron");

        save_tuning_asset(&original, "imx-test", &path).unwrap();
        assert_eq!(load_tuning_asset(&path).unwrap(), original);
    }

    #[test]
    fn test_version_mismatch() {
        let mut asset_file = TuningAssetFile::new("imx-test", template_asset());
        asset_file.version = "0.1.0".to_string();

        let file = NamedTempFile::new().unwrap();
        let path = file.path().with_extension("ron");
        asset_file.save(&path).unwrap();

        match load_tuning_asset(&path) {
            Err(IoError::VersionMismatch { expected, found }) => {
                assert_eq!(expected, TUNING_FILE_VERSION);
                assert_eq!(found, "0.1.0");
            }
            other => panic!("expected VersionMismatch, got {:?}", other),
        }
    }

    #[test]
    fn test_invalid_tuning_is_refused() {
        let mut asset = template_asset();
        asset.modules[1].tuning.root = RegionTable::default();

        let file = NamedTempFile::new().unwrap();
        let path = file.path().with_extension("json");
        save_tuning_asset(&asset, "imx-test", &path).unwrap();

        match load_tuning_asset(&path) {
            Err(IoError::InvalidTuning { module, issues }) => {
                assert_eq!(module, "lens_shading");
                assert!(!issues.is_empty());
            }
            other => panic!("expected InvalidTuning, got {:?}", other),
        }
        assert!(!validate_asset(&asset).is_empty());
    }

    #[test]
    fn test_duplicate_module_names() {
        let mut asset = template_asset();
        asset.modules.push(asset.modules[0].clone());
        assert!(matches!(
            check_asset(&asset),
            Err(IoError::DuplicateModule(name)) if name == "color_correction"
        ));
    }
}
