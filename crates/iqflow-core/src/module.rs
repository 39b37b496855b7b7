//! Image-quality modules
//!
//! An [`IqModule`] pairs a [`ModuleDefinition`] (trigger dimensions and register
//! schema, fixed per module) with its [`ModuleTuning`] (vendor tuning data). A
//! [`ModuleRunner`] drives one module across frames and reuses the previous output
//! while the trigger snapshot does not change.

use crate::block::ParameterBlock;
use crate::hysteresis::DynamicEnable;
use crate::region::{RegionTable, TriggerRegion};
use crate::register::{self, RegisterFieldSet, RegisterSchema};
use crate::search::{OperationTable, SearchKind};
use crate::tree;
use crate::trigger::{ControlMethod, FrameMetrics, TriggerSnapshot};
use crate::Result;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Color correction: DRC gain, HDR-AEC, LED, AEC, color temperature
pub const COLOR_CORRECTION_LEVELS: &[SearchKind] = &[
    SearchKind::DrcGain,
    SearchKind::HdrAec,
    SearchKind::Led,
    SearchKind::Aec,
    SearchKind::Cct,
];

/// Sharpening: total scale ratio, DRC gain, HDR-AEC, AEC
pub const SHARPENING_LEVELS: &[SearchKind] = &[
    SearchKind::TotalScaleRatio,
    SearchKind::DrcGain,
    SearchKind::HdrAec,
    SearchKind::Aec,
];

/// Tone mapping: DRC gain, HDR-AEC, AEC
pub const TONE_MAPPING_LEVELS: &[SearchKind] =
    &[SearchKind::DrcGain, SearchKind::HdrAec, SearchKind::Aec];

/// Lens correction: lens position, lens zoom, AEC
pub const LENS_CORRECTION_LEVELS: &[SearchKind] = &[
    SearchKind::LensPosition,
    SearchKind::LensZoom,
    SearchKind::Aec,
];

/// Static description of a module
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModuleDefinition {
    /// Module name
    pub name: String,
    /// Trigger dimensions, outermost first
    pub levels: Vec<SearchKind>,
    /// Register encoding
    pub schema: RegisterSchema,
}

impl ModuleDefinition {
    /// Definition with explicit levels
    pub fn new(name: impl Into<String>, levels: &[SearchKind], schema: RegisterSchema) -> Self {
        Self {
            name: name.into(),
            levels: levels.to_vec(),
            schema,
        }
    }

    /// Level layout of a built-in module family
    pub fn builtin_levels(layout: &str) -> Option<&'static [SearchKind]> {
        match layout {
            "color_correction" => Some(COLOR_CORRECTION_LEVELS),
            "sharpening" => Some(SHARPENING_LEVELS),
            "tone_mapping" => Some(TONE_MAPPING_LEVELS),
            "lens_correction" => Some(LENS_CORRECTION_LEVELS),
            _ => None,
        }
    }
}

fn default_led_sensitivity_trigger() -> TriggerRegion {
    TriggerRegion::new(0.0, 1.0)
}

/// Tuning data of one module
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModuleTuning {
    /// Raw inputs of the switchable dimensions
    #[serde(default)]
    pub control: ControlMethod,
    /// LED sensitivity interval blending LED-off into LED-on
    #[serde(default = "default_led_sensitivity_trigger")]
    pub led_sensitivity_trigger: TriggerRegion,
    /// Optional trigger-driven enable
    #[serde(default)]
    pub dynamic_enable: Option<DynamicEnable>,
    /// Outermost region table
    pub root: RegionTable<ParameterBlock>,
}

impl ModuleTuning {
    /// Tuning with default control method over `root`
    pub fn new(root: RegionTable<ParameterBlock>) -> Self {
        Self {
            control: ControlMethod::default(),
            led_sensitivity_trigger: default_led_sensitivity_trigger(),
            dynamic_enable: None,
            root,
        }
    }

    /// Trigger snapshot of `frame` for this tuning
    pub fn snapshot(&self, frame: &FrameMetrics) -> TriggerSnapshot {
        TriggerSnapshot::from_frame(frame, self.control, self.led_sensitivity_trigger)
    }
}

/// A configured module, ready to run per frame
#[derive(Debug, Clone)]
pub struct IqModule {
    definition: ModuleDefinition,
    tuning: ModuleTuning,
    operations: OperationTable<ParameterBlock>,
}

impl IqModule {
    /// Build the module's dispatch table
    pub fn new(definition: ModuleDefinition, tuning: ModuleTuning) -> Result<Self> {
        let operations = OperationTable::from_kinds(&definition.levels)?;
        Ok(Self {
            definition,
            tuning,
            operations,
        })
    }

    /// Module name
    pub fn name(&self) -> &str {
        &self.definition.name
    }

    /// Static description
    pub fn definition(&self) -> &ModuleDefinition {
        &self.definition
    }

    /// Tuning data
    pub fn tuning(&self) -> &ModuleTuning {
        &self.tuning
    }

    /// Trigger snapshot of `frame` for this module
    pub fn snapshot(&self, frame: &FrameMetrics) -> TriggerSnapshot {
        self.tuning.snapshot(frame)
    }

    /// Interpolated parameter block for `trigger`
    pub fn run_interpolation(&self, trigger: &TriggerSnapshot) -> Result<ParameterBlock> {
        tree::run_interpolation(trigger, &self.tuning.root, &self.operations)
    }

    /// Encode `block` with this module's schema
    pub fn quantize_to_hardware_fields(&self, block: &ParameterBlock) -> Result<RegisterFieldSet> {
        register::quantize_to_hardware_fields(block, &self.definition.schema)
    }

    /// Interpolate and encode in one step
    pub fn compute(&self, trigger: &TriggerSnapshot) -> Result<RegisterFieldSet> {
        let block = self.run_interpolation(trigger)?;
        self.quantize_to_hardware_fields(&block)
    }
}

/// What a module produced for one frame
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum ModuleOutcome {
    /// Freshly computed fields
    Configured(RegisterFieldSet),
    /// Snapshot unchanged, previous fields still valid
    Reused(RegisterFieldSet),
    /// Computation failed, last good fields used instead
    CarriedOver {
        /// Last good fields
        fields: RegisterFieldSet,
        /// Why fresh fields are missing
        reason: String,
    },
    /// Computation failed, no hardware output this frame
    Bypassed {
        /// Failure description
        reason: String,
    },
    /// Dynamic enable switched the module off
    Disabled,
}

impl ModuleOutcome {
    /// Fields to program, if any
    pub fn fields(&self) -> Option<&RegisterFieldSet> {
        match self {
            ModuleOutcome::Configured(fields)
            | ModuleOutcome::Reused(fields)
            | ModuleOutcome::CarriedOver { fields, .. } => Some(fields),
            ModuleOutcome::Bypassed { .. } | ModuleOutcome::Disabled => None,
        }
    }

    /// Short status name
    pub fn label(&self) -> &'static str {
        match self {
            ModuleOutcome::Configured(_) => "configured",
            ModuleOutcome::Reused(_) => "reused",
            ModuleOutcome::CarriedOver { .. } => "carried-over",
            ModuleOutcome::Bypassed { .. } => "bypassed",
            ModuleOutcome::Disabled => "disabled",
        }
    }
}

/// Per-module state carried across frames
#[derive(Debug, Clone)]
pub struct ModuleRunner {
    module: IqModule,
    last_snapshot: Option<TriggerSnapshot>,
    last_fields: Option<RegisterFieldSet>,
    enabled: bool,
}

impl ModuleRunner {
    /// Runner with no history
    pub fn new(module: IqModule) -> Self {
        Self {
            module,
            last_snapshot: None,
            last_fields: None,
            enabled: true,
        }
    }

    /// Module name
    pub fn name(&self) -> &str {
        self.module.name()
    }

    /// Driven module
    pub fn module(&self) -> &IqModule {
        &self.module
    }

    /// Forget the previous frame
    pub fn reset(&mut self) {
        self.last_snapshot = None;
        self.last_fields = None;
        self.enabled = true;
    }

    /// Compute this module's output for `frame`
    pub fn process(&mut self, frame: &FrameMetrics) -> ModuleOutcome {
        if let Some(dynamic) = &self.module.tuning.dynamic_enable {
            self.enabled = dynamic.evaluate(frame, self.enabled);
            if !self.enabled {
                debug!(module = %self.name(), "Module dynamically disabled");
                self.last_snapshot = None;
                self.last_fields = None;
                return ModuleOutcome::Disabled;
            }
        }

        let snapshot = self.module.snapshot(frame);
        if let (Some(previous), Some(fields)) = (&self.last_snapshot, &self.last_fields) {
            if !snapshot.has_changed(previous) {
                return ModuleOutcome::Reused(fields.clone());
            }
        }

        match self.module.compute(&snapshot) {
            Ok(fields) => {
                self.last_snapshot = Some(snapshot);
                self.last_fields = Some(fields.clone());
                ModuleOutcome::Configured(fields)
            }
            Err(err) => {
                warn!(module = %self.name(), error = %err, "Module bypassed for this frame");
                self.last_snapshot = None;
                self.last_fields = None;
                ModuleOutcome::Bypassed {
                    reason: err.to_string(),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::FieldValue;
    use crate::hysteresis::{ControlVariable, HysteresisDirection, TriggerCouplet};
    use crate::quantize::FieldRange;
    use crate::region::RegionEntry;
    use crate::register::FieldSpec;

    fn leaf(gain: f32) -> ParameterBlock {
        ParameterBlock::new().with("gain", FieldValue::Scalar(gain))
    }

    fn module() -> IqModule {
        let root = RegionTable::new(vec![
            RegionEntry::leaf(TriggerRegion::new(0.0, 100.0), leaf(1.0)),
            RegionEntry::leaf(TriggerRegion::new(200.0, 300.0), leaf(2.0)),
        ]);
        let schema = RegisterSchema::default().with(FieldSpec::fixed(
            "GAIN",
            "gain",
            8,
            FieldRange::unsigned(10),
        ));
        IqModule::new(
            ModuleDefinition::new("gain", &[SearchKind::Aec], schema),
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
    fn test_compute() {
        let m = module();
        let fields = m.compute(&m.snapshot(&lux(150.0))).unwrap();
        assert_eq!(fields.value("GAIN"), Some(384));
    }

    #[test]
    fn test_runner_reuses_unchanged_snapshot() {
        let mut runner = ModuleRunner::new(module());
        assert_eq!(runner.process(&lux(50.0)).label(), "configured");
        assert_eq!(runner.process(&lux(50.0)).label(), "reused");
        assert_eq!(runner.process(&lux(250.0)).label(), "configured");
    }

    #[test]
    fn test_runner_bypasses_on_failure() {
        let m = IqModule::new(
            ModuleDefinition::new("broken", &[SearchKind::Aec], RegisterSchema::default()),
            ModuleTuning::new(RegionTable::default()),
        )
        .unwrap();
        let mut runner = ModuleRunner::new(m);
        let outcome = runner.process(&lux(10.0));
        assert!(matches!(outcome, ModuleOutcome::Bypassed { .. }));
        assert!(outcome.fields().is_none());
    }

    #[test]
    fn test_runner_dynamic_enable() {
        let mut m = module();
        m.tuning.dynamic_enable = Some(DynamicEnable {
            enabled: true,
            control: ControlVariable::LuxIndex,
            direction: HysteresisDirection::Downward,
            couplet: TriggerCouplet {
                primary: TriggerRegion::new(250.0, 280.0),
                secondary: TriggerRegion::new(0.0, 0.0),
            },
        });
        let mut runner = ModuleRunner::new(m);
        assert_eq!(runner.process(&lux(100.0)).label(), "configured");
        assert_eq!(runner.process(&lux(300.0)).label(), "disabled");
        // Inside the dead band the module stays off
        assert_eq!(runner.process(&lux(260.0)).label(), "disabled");
        assert_eq!(runner.process(&lux(240.0)).label(), "configured");
    }

    #[test]
    fn test_builtin_levels() {
        assert_eq!(
            ModuleDefinition::builtin_levels("color_correction"),
            Some(COLOR_CORRECTION_LEVELS)
        );
        assert!(ModuleDefinition::builtin_levels("unknown").is_none());
    }
}
