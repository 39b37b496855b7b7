//! Frame pipeline
//!
//! Runs every module of a frame. Modules share nothing mutable, so they are
//! evaluated in parallel, each on its own call stack.

use crate::carry_over::{CarryOverCache, CarryOverKey};
use crate::module::{IqModule, ModuleOutcome, ModuleRunner};
use crate::register::RegisterFieldSet;
use crate::trigger::FrameMetrics;
use rayon::prelude::*;
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::{debug, debug_span};

/// Last good register fields per module name
pub type LastGoodFields = BTreeMap<String, RegisterFieldSet>;

/// Outcome of one module in one frame
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModuleReport {
    /// Module name
    pub module: String,
    /// What the module produced
    pub outcome: ModuleOutcome,
}

/// Outcomes of every module for one frame
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FrameReport {
    /// Frame sequence number, starting at 0
    pub frame: u64,
    /// Per-module outcomes in pipeline order
    pub modules: Vec<ModuleReport>,
}

impl FrameReport {
    /// Outcome of the module called `name`
    pub fn get(&self, name: &str) -> Option<&ModuleOutcome> {
        self.modules
            .iter()
            .find(|m| m.module == name)
            .map(|m| &m.outcome)
    }

    /// Modules that have fields to program
    pub fn programmed(&self) -> usize {
        self.modules
            .iter()
            .filter(|m| m.outcome.fields().is_some())
            .count()
    }

    /// Modules skipped for this frame
    pub fn bypassed(&self) -> usize {
        self.modules
            .iter()
            .filter(|m| matches!(m.outcome, ModuleOutcome::Bypassed { .. }))
            .count()
    }
}

/// Set of modules driven frame by frame
#[derive(Debug, Clone, Default)]
pub struct FramePipeline {
    runners: Vec<ModuleRunner>,
    frame: u64,
}

impl FramePipeline {
    /// Pipeline over `modules`, in order
    pub fn new(modules: Vec<IqModule>) -> Self {
        Self {
            runners: modules.into_iter().map(ModuleRunner::new).collect(),
            frame: 0,
        }
    }

    /// Number of modules
    pub fn len(&self) -> usize {
        self.runners.len()
    }

    /// Whether the pipeline has no modules
    pub fn is_empty(&self) -> bool {
        self.runners.is_empty()
    }

    /// Module names in pipeline order
    pub fn module_names(&self) -> Vec<&str> {
        self.runners.iter().map(|r| r.name()).collect()
    }

    /// Run every module for `frame`
    ///
    /// Each module runs inside a `module` span parented to this call's `frame`
    /// span, whichever worker thread picks it up.
    pub fn run_frame(&mut self, frame: &FrameMetrics) -> FrameReport {
        let frame_span = debug_span!("frame", index = self.frame);
        let _entered = frame_span.enter();

        let modules: Vec<ModuleReport> = self
            .runners
            .par_iter_mut()
            .map(|runner| {
                let span = debug_span!(parent: &frame_span, "module", name = %runner.name());
                let outcome = span.in_scope(|| runner.process(frame));
                ModuleReport {
                    module: runner.name().to_string(),
                    outcome,
                }
            })
            .collect();

        let report = FrameReport {
            frame: self.frame,
            modules,
        };
        debug!(
            frame = report.frame,
            programmed = report.programmed(),
            bypassed = report.bypassed(),
            "Frame processed"
        );
        self.frame += 1;
        report
    }

    /// Run every module, falling back to the last good fields of bypassed modules.
    ///
    /// `cache` is scoped by camera and aspect ratio through `key`.
    pub fn run_frame_with_cache(
        &mut self,
        frame: &FrameMetrics,
        key: CarryOverKey,
        cache: &mut CarryOverCache<LastGoodFields>,
    ) -> FrameReport {
        let mut report = self.run_frame(frame);
        let last_good = cache.entry_or_default(key);

        for module in &mut report.modules {
            let replacement = match &module.outcome {
                ModuleOutcome::Configured(fields) | ModuleOutcome::Reused(fields) => {
                    last_good.insert(module.module.clone(), fields.clone());
                    None
                }
                ModuleOutcome::Bypassed { reason } => {
                    last_good
                        .get(&module.module)
                        .map(|fields| ModuleOutcome::CarriedOver {
                            fields: fields.clone(),
                            reason: reason.clone(),
                        })
                }
                _ => None,
            };
            if let Some(outcome) = replacement {
                module.outcome = outcome;
            }
        }

        report
    }

    /// Forget every module's previous frame
    pub fn reset(&mut self) {
        for runner in &mut self.runners {
            runner.reset();
        }
        self.frame = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::{FieldValue, ParameterBlock};
    use crate::carry_over::CameraId;
    use crate::module::{ModuleDefinition, ModuleTuning};
    use crate::quantize::FieldRange;
    use crate::region::{RegionEntry, RegionTable, TriggerRegion};
    use crate::register::{FieldSpec, RegisterSchema};
    use crate::search::SearchKind;

    fn gain_module(name: &str, source: &str) -> IqModule {
        let leaf = |gain: f32| ParameterBlock::new().with("gain", FieldValue::Scalar(gain));
        let root = RegionTable::new(vec![
            RegionEntry::leaf(TriggerRegion::new(0.0, 100.0), leaf(1.0)),
            RegionEntry::leaf(TriggerRegion::new(200.0, 300.0), leaf(2.0)),
        ]);
        let schema = RegisterSchema::default().with(FieldSpec::fixed(
            "GAIN",
            source,
            8,
            FieldRange::unsigned(10),
        ));
        IqModule::new(
            ModuleDefinition::new(name, &[SearchKind::Aec], schema),
            ModuleTuning::new(root),
        )
        .unwrap()
    }

    fn lux(value: f32) -> FrameMetrics {
        FrameMetrics {
            lux_index: value,
            ..Default::default()
        }
    }

    #[test]
    fn test_run_frame_keeps_module_order() {
        let mut pipeline = FramePipeline::new(vec![
            gain_module("first", "gain"),
            gain_module("second", "gain"),
        ]);
        assert_eq!(pipeline.module_names(), vec!["first", "second"]);

        let report = pipeline.run_frame(&lux(150.0));
        assert_eq!(report.frame, 0);
        assert_eq!(report.programmed(), 2);
        assert_eq!(
            report.get("second").and_then(|o| o.fields()).and_then(|f| f.value("GAIN")),
            Some(384)
        );
        assert_eq!(pipeline.run_frame(&lux(150.0)).frame, 1);
    }

    #[test]
    fn test_failing_module_does_not_affect_others() {
        let mut pipeline = FramePipeline::new(vec![
            gain_module("good", "gain"),
            gain_module("bad", "missing"),
        ]);
        let report = pipeline.run_frame(&lux(50.0));
        assert_eq!(report.get("good").map(|o| o.label()), Some("configured"));
        assert_eq!(report.get("bad").map(|o| o.label()), Some("bypassed"));
        assert_eq!(report.bypassed(), 1);
    }

    #[test]
    fn test_cache_carries_last_good_fields() {
        let mut cache = CarryOverCache::new();
        let key = CarryOverKey::new(CameraId(0), 1920, 1080);
        let mut pipeline = FramePipeline::new(vec![gain_module("gain", "gain")]);

        let first = pipeline.run_frame_with_cache(&lux(50.0), key, &mut cache);
        assert_eq!(first.get("gain").map(|o| o.label()), Some("configured"));
        assert!(cache.get(&key).is_some_and(|m| m.contains_key("gain")));

        // Replace the module with one that always fails, keeping the cache
        let mut broken = FramePipeline::new(vec![gain_module("gain", "missing")]);
        let report = broken.run_frame_with_cache(&lux(60.0), key, &mut cache);
        match report.get("gain") {
            Some(ModuleOutcome::CarriedOver { fields, .. }) => {
                assert_eq!(fields.value("GAIN"), Some(256));
            }
            other => panic!("expected carried-over outcome, got {:?}", other),
        }

        // A different camera has no history to fall back to
        let other = CarryOverKey::new(CameraId(1), 1920, 1080);
        let report = broken.run_frame_with_cache(&lux(60.0), other, &mut cache);
        assert_eq!(report.get("gain").map(|o| o.label()), Some("bypassed"));
    }
}
