//! Dynamic module enable with hysteresis
//!
//! Some modules switch themselves on or off depending on one trigger value. A
//! start/end couplet forms a dead band so the state does not flicker when the value
//! hovers around a single threshold.

use crate::region::TriggerRegion;
use crate::trigger::FrameMetrics;
use serde::{Deserialize, Serialize};

/// Raw frame value that drives a dynamic enable
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ControlVariable {
    /// Lens zoom
    LensZoom,
    /// AEC lux index
    LuxIndex,
    /// AEC real gain
    Gain,
    /// DRC gain
    DrcGain,
    /// HDR exposure time ratio
    ExposureTimeRatio,
    /// HDR sensitivity ratio
    SensitivityRatio,
    /// Color temperature
    ColorTemperature,
    /// Lens focus position
    LensPosition,
    /// Total scale ratio
    TotalScaleRatio,
    /// Post-scale ratio
    PostScaleRatio,
    /// Pre-scale ratio
    PreScaleRatio,
}

impl ControlVariable {
    /// Read this variable from frame metadata
    pub fn read(self, frame: &FrameMetrics) -> f32 {
        match self {
            ControlVariable::LensZoom => frame.lens_zoom,
            ControlVariable::LuxIndex => frame.lux_index,
            ControlVariable::Gain => frame.real_gain,
            ControlVariable::DrcGain => frame.drc_gain,
            ControlVariable::ExposureTimeRatio => frame.exposure_time_ratio,
            ControlVariable::SensitivityRatio => frame.sensitivity_ratio,
            ControlVariable::ColorTemperature => frame.color_temperature,
            ControlVariable::LensPosition => frame.lens_position,
            ControlVariable::TotalScaleRatio => frame.total_scale_ratio,
            ControlVariable::PostScaleRatio => frame.post_scale_ratio,
            ControlVariable::PreScaleRatio => frame.pre_scale_ratio,
        }
    }

    /// Gain and exposure time ratio are thresholded on the couplet's second bracket
    fn uses_secondary(self) -> bool {
        matches!(
            self,
            ControlVariable::Gain | ControlVariable::ExposureTimeRatio
        )
    }
}

/// Direction in which the module turns on
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum HysteresisDirection {
    /// Enabled at high values
    #[default]
    Upward,
    /// Enabled at low values
    Downward,
}

/// Threshold brackets of a dynamic enable
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TriggerCouplet {
    /// Bracket for lux index style controls
    pub primary: TriggerRegion,
    /// Bracket for gain and exposure time ratio
    pub secondary: TriggerRegion,
}

/// Dynamic enable configuration of a module
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DynamicEnable {
    /// Whether dynamic enabling is active; inactive means always enabled
    pub enabled: bool,
    /// Driving variable
    pub control: ControlVariable,
    /// Direction of the hysteresis
    #[serde(default)]
    pub direction: HysteresisDirection,
    /// Thresholds
    pub couplet: TriggerCouplet,
}

impl DynamicEnable {
    /// Bracket applied to `self.control`
    pub fn thresholds(&self) -> TriggerRegion {
        if self.control.uses_secondary() {
            self.couplet.secondary
        } else {
            self.couplet.primary
        }
    }

    /// Next enable state given the previous one.
    ///
    /// Inside the dead band the previous state is kept.
    pub fn evaluate(&self, frame: &FrameMetrics, previous: bool) -> bool {
        if !self.enabled {
            return true;
        }

        let value = self.control.read(frame);
        let band = self.thresholds();
        match self.direction {
            HysteresisDirection::Upward => {
                if value >= band.end {
                    true
                } else if value < band.start {
                    false
                } else {
                    previous
                }
            }
            HysteresisDirection::Downward => {
                if value > band.end {
                    false
                } else if value <= band.start {
                    true
                } else {
                    previous
                }
            }
        }
    }
}
