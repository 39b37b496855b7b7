//! Diagnostics - Tuning Validation
//!
//! Checks a module's tuning data against its definition before it is used, so
//! configuration defects surface at load time instead of as per-frame bypasses.
//!
//! # Checks
//!
//! - Table nesting matches the configured trigger levels; no table is empty.
//! - Regions are well formed and ascending; overlaps are reported as warnings.
//! - Every leaf carries the fields the register schema reads, with matching kinds.
//! - All leaves share one field layout, otherwise blending would fail.
//! - Slope tables have valid knot positions.
//! - No register field has a zero-width range.

use crate::block::{FieldKind, FieldValue, ParameterBlock};
use crate::module::{ModuleDefinition, ModuleTuning};
use crate::quantize::FieldRange;
use crate::region::{RegionPayload, RegionTable};
use crate::register::{FieldRule, RegisterSchema};
use crate::search::SearchKind;
use crate::slope::validate_knots;
use crate::tree::MAX_TREE_LEVELS;
use serde::Serialize;
use std::fmt;

/// An issue found in a module's tuning data
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TuningIssue {
    /// Severity level of the issue
    pub severity: IssueSeverity,
    /// Human-readable description
    pub message: String,
    /// Region indices from the root table down to the offending entry
    pub path: Vec<usize>,
}

impl fmt::Display for TuningIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{:?}] {}", self.severity, self.message)?;
        if !self.path.is_empty() {
            write!(f, " at {:?}", self.path)?;
        }
        Ok(())
    }
}

/// Severity level of a tuning issue
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum IssueSeverity {
    /// The module cannot run correctly
    Error,
    /// Suspicious but usable
    Warning,
    /// Informational message
    Info,
}

/// Whether any issue is an error
pub fn has_errors(issues: &[TuningIssue]) -> bool {
    issues.iter().any(|i| i.severity == IssueSeverity::Error)
}

struct Validator<'a> {
    levels: &'a [SearchKind],
    schema: &'a RegisterSchema,
    layout: Option<Vec<(&'a str, FieldKind)>>,
    issues: Vec<TuningIssue>,
    path: Vec<usize>,
}

impl<'a> Validator<'a> {
    fn push(&mut self, severity: IssueSeverity, message: String) {
        self.issues.push(TuningIssue {
            severity,
            message,
            path: self.path.clone(),
        });
    }

    fn table(&mut self, table: &'a RegionTable<ParameterBlock>, level: usize) {
        if table.is_empty() {
            self.push(
                IssueSeverity::Error,
                format!("Empty region table at level {}", level),
            );
            return;
        }
        if self.levels[level] != SearchKind::Led {
            self.ordering(table, level);
        }

        let leaf_level = level + 1 == self.levels.len();
        for (index, entry) in table.entries.iter().enumerate() {
            self.path.push(index);
            match (&entry.payload, leaf_level) {
                (RegionPayload::Table(inner), false) => self.table(inner, level + 1),
                (RegionPayload::Leaf(block), true) => self.leaf(block),
                (RegionPayload::Table(_), true) => self.push(
                    IssueSeverity::Error,
                    format!("Nested table below the last level ({})", self.levels[level]),
                ),
                (RegionPayload::Leaf(_), false) => self.push(
                    IssueSeverity::Error,
                    format!(
                        "Leaf at level {} but {} levels are configured",
                        level,
                        self.levels.len()
                    ),
                ),
            }
            self.path.pop();
        }
    }

    fn ordering(&mut self, table: &RegionTable<ParameterBlock>, level: usize) {
        let kind = self.levels[level];
        for (index, entry) in table.entries.iter().enumerate() {
            for region in entry.trigger.brackets() {
                if region.start > region.end {
                    self.push(
                        IssueSeverity::Error,
                        format!(
                            "{} region {} starts after it ends ({} > {})",
                            kind, index, region.start, region.end
                        ),
                    );
                }
            }
        }

        for (index, pair) in table.entries.windows(2).enumerate() {
            let current = pair[0].trigger.brackets();
            let next = pair[1].trigger.brackets();
            if current.len() != next.len() {
                self.push(
                    IssueSeverity::Warning,
                    format!(
                        "{} regions {} and {} use different trigger variants",
                        kind,
                        index,
                        index + 1
                    ),
                );
                continue;
            }
            for (a, b) in current.iter().zip(&next) {
                if b.start < a.start {
                    self.push(
                        IssueSeverity::Error,
                        format!(
                            "{} regions {} and {} are not ascending",
                            kind,
                            index,
                            index + 1
                        ),
                    );
                } else if b.start < a.end {
                    self.push(
                        IssueSeverity::Warning,
                        format!("{} regions {} and {} overlap", kind, index, index + 1),
                    );
                }
            }
        }
    }

    fn leaf(&mut self, block: &'a ParameterBlock) {
        let shape = block.shape();
        match &self.layout {
            None => self.layout = Some(shape),
            Some(reference) if *reference != shape => self.push(
                IssueSeverity::Error,
                "Leaf fields differ from the first leaf".to_string(),
            ),
            Some(_) => {}
        }

        let schema = self.schema;
        for spec in &schema.fields {
            let Some(value) = block.get(&spec.source) else {
                self.push(
                    IssueSeverity::Error,
                    format!("Missing field '{}' for register {}", spec.source, spec.register),
                );
                continue;
            };

            let accepted = match &spec.rule {
                FieldRule::Fixed { .. } => {
                    matches!(value.kind(), FieldKind::Scalar | FieldKind::Array)
                }
                FieldRule::Raw { .. } => !value.kind().is_blendable(),
                FieldRule::Slope { .. } => value.kind() == FieldKind::Array,
            };
            if !accepted {
                self.push(
                    IssueSeverity::Error,
                    format!(
                        "Field '{}' of kind {} cannot feed register {}",
                        spec.source,
                        value.kind(),
                        spec.register
                    ),
                );
                continue;
            }

            if let FieldRule::Slope { knots, encoding, .. } = &spec.rule {
                if let Err(err) = encoding.validate() {
                    self.push(IssueSeverity::Error, err.to_string());
                }
                match block.get(knots) {
                    Some(FieldValue::IntArray(positions)) => {
                        if let Err(err) = validate_knots(positions) {
                            self.push(
                                IssueSeverity::Error,
                                format!("Knots '{}': {}", knots, err),
                            );
                        } else if positions.len() != value.len() {
                            self.push(
                                IssueSeverity::Error,
                                format!(
                                    "Knots '{}' has {} positions for {} control points",
                                    knots,
                                    positions.len(),
                                    value.len()
                                ),
                            );
                        }
                    }
                    _ => self.push(
                        IssueSeverity::Error,
                        format!("Knot field '{}' missing or not an int array", knots),
                    ),
                }
            }
        }
    }
}

/// Validate `tuning` against `definition`
pub fn validate_tuning(definition: &ModuleDefinition, tuning: &ModuleTuning) -> Vec<TuningIssue> {
    let mut validator = Validator {
        levels: &definition.levels,
        schema: &definition.schema,
        layout: None,
        issues: Vec::new(),
        path: Vec::new(),
    };

    if definition.levels.is_empty() {
        validator.push(IssueSeverity::Error, "No trigger levels configured".into());
        return validator.issues;
    }
    if definition.levels.len() > MAX_TREE_LEVELS {
        validator.push(
            IssueSeverity::Error,
            format!(
                "{} trigger levels configured, at most {} supported",
                definition.levels.len(),
                MAX_TREE_LEVELS
            ),
        );
        return validator.issues;
    }

    if definition.levels.contains(&SearchKind::Led) {
        let window = tuning.led_sensitivity_trigger;
        if window.start > window.end {
            validator.push(
                IssueSeverity::Warning,
                "LED sensitivity trigger starts after it ends".into(),
            );
        }
    }
    if let Some(dynamic) = &tuning.dynamic_enable {
        let band = dynamic.thresholds();
        if dynamic.enabled && band.start > band.end {
            validator.push(
                IssueSeverity::Warning,
                format!("Dynamic enable band on {:?} is inverted", dynamic.control),
            );
        }
    }

    for spec in &definition.schema.fields {
        if spec.rule.ranges().any(FieldRange::is_empty) {
            validator.push(
                IssueSeverity::Error,
                format!("Register {} has a zero-width range", spec.register),
            );
        }
    }

    validator.table(&tuning.root, 0);
    validator.issues
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::region::{RegionEntry, TriggerRegion};
    use crate::register::FieldSpec;
    use crate::slope::SlopeEncoding;

    fn leaf(gain: f32) -> ParameterBlock {
        ParameterBlock::new()
            .with("gain", FieldValue::Scalar(gain))
            .with("cf", FieldValue::Array(vec![1.0, 2.0]))
            .with("knots", FieldValue::IntArray(vec![0, 8]))
    }

    fn definition(levels: &[SearchKind]) -> ModuleDefinition {
        ModuleDefinition::new(
            "test",
            levels,
            RegisterSchema::default()
                .with(FieldSpec::fixed("GAIN", "gain", 8, FieldRange::unsigned(10)))
                .with(FieldSpec::slope("SLOPE", "cf", "knots", SlopeEncoding::RADIAL)),
        )
    }

    fn two_regions(a: ParameterBlock, b: ParameterBlock) -> RegionTable<ParameterBlock> {
        RegionTable::new(vec![
            RegionEntry::leaf(TriggerRegion::new(0.0, 10.0), a),
            RegionEntry::leaf(TriggerRegion::new(10.0, 20.0), b),
        ])
    }

    #[test]
    fn test_valid_tuning_has_no_issues() {
        let tuning = ModuleTuning::new(two_regions(leaf(1.0), leaf(2.0)));
        let issues = validate_tuning(&definition(&[SearchKind::Aec]), &tuning);
        assert!(issues.is_empty(), "{:?}", issues);
    }

    #[test]
    fn test_depth_mismatch() {
        let tuning = ModuleTuning::new(two_regions(leaf(1.0), leaf(2.0)));
        let issues = validate_tuning(&definition(&[SearchKind::Aec, SearchKind::Cct]), &tuning);
        assert!(has_errors(&issues));
        assert_eq!(issues[0].path, vec![0]);
    }

    #[test]
    fn test_unordered_regions() {
        let root = RegionTable::new(vec![
            RegionEntry::leaf(TriggerRegion::new(10.0, 20.0), leaf(1.0)),
            RegionEntry::leaf(TriggerRegion::new(0.0, 5.0), leaf(2.0)),
        ]);
        let issues = validate_tuning(&definition(&[SearchKind::Aec]), &ModuleTuning::new(root));
        assert!(has_errors(&issues));
    }

    #[test]
    fn test_overlap_is_warning() {
        let root = RegionTable::new(vec![
            RegionEntry::leaf(TriggerRegion::new(0.0, 12.0), leaf(1.0)),
            RegionEntry::leaf(TriggerRegion::new(10.0, 20.0), leaf(2.0)),
        ]);
        let issues = validate_tuning(&definition(&[SearchKind::Aec]), &ModuleTuning::new(root));
        assert!(!has_errors(&issues));
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].severity, IssueSeverity::Warning);
    }

    #[test]
    fn test_degenerate_knots_reported() {
        let bad = leaf(2.0).with("knots", FieldValue::IntArray(vec![4, 4]));
        let tuning = ModuleTuning::new(two_regions(leaf(1.0), bad));
        let issues = validate_tuning(&definition(&[SearchKind::Aec]), &tuning);
        assert!(has_errors(&issues));
        assert!(issues.iter().any(|i| i.message.contains("knots")));
    }

    #[test]
    fn test_missing_field_and_layout_mismatch() {
        let partial = ParameterBlock::new().with("gain", FieldValue::Scalar(1.0));
        let tuning = ModuleTuning::new(two_regions(leaf(1.0), partial));
        let issues = validate_tuning(&definition(&[SearchKind::Aec]), &tuning);
        assert!(issues.iter().any(|i| i.message.contains("differ")));
        assert!(issues.iter().any(|i| i.message.contains("Missing field 'cf'")));
    }

    #[test]
    fn test_zero_width_range_is_error() {
        let definition = ModuleDefinition::new(
            "test",
            &[SearchKind::Aec],
            RegisterSchema::default()
                .with(FieldSpec::fixed("GAIN", "gain", 8, FieldRange::unsigned(0))),
        );
        let tuning = ModuleTuning::new(two_regions(leaf(1.0), leaf(2.0)));
        let issues = validate_tuning(&definition, &tuning);
        assert!(has_errors(&issues));
        assert!(issues.iter().any(|i| i.message.contains("GAIN has a zero-width range")));
    }

    #[test]
    fn test_empty_table() {
        let tuning = ModuleTuning::new(RegionTable::default());
        let issues = validate_tuning(&definition(&[SearchKind::Aec]), &tuning);
        assert!(has_errors(&issues));
    }
}
