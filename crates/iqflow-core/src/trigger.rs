//! Trigger snapshots
//!
//! [`FrameMetrics`] is the raw per-frame metadata coming from sensor, AEC, AWB and
//! lens control. [`TriggerSnapshot`] is what one module's interpolation tree reads:
//! the raw values reduced through the module's [`ControlMethod`].

use crate::region::TriggerRegion;
use serde::{Deserialize, Serialize};

/// Tolerance used when comparing trigger values between frames
pub const TRIGGER_EPSILON: f32 = 1e-9;

/// Float equality within [`TRIGGER_EPSILON`]
pub fn float_eq(a: f32, b: f32) -> bool {
    (a - b).abs() < TRIGGER_EPSILON
}

/// Raw input driving the AEC dimension
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AecControl {
    /// Scene lux index
    #[default]
    LuxIndex,
    /// Real sensor gain
    Gain,
}

/// Raw input driving the HDR-AEC dimension
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HdrAecControl {
    /// Long/short exposure time ratio
    #[default]
    ExposureTimeRatio,
    /// AEC sensitivity ratio
    SensitivityRatio,
    /// Exposure gain ratio
    ExposureGainRatio,
}

/// Which raw inputs feed the switchable trigger dimensions
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ControlMethod {
    /// AEC input
    #[serde(default)]
    pub aec: AecControl,
    /// HDR-AEC input
    #[serde(default)]
    pub hdr_aec: HdrAecControl,
}

/// Flash LED state reported for a frame
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct LedState {
    /// Number of active LEDs
    pub count: u16,
    /// LED sensitivity reported by AEC
    pub sensitivity: f32,
    /// Blend weight between the first and second light source
    pub first_entry_ratio: f32,
}

/// Raw per-frame metadata
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FrameMetrics {
    /// AEC lux index
    pub lux_index: f32,
    /// AEC real gain
    pub real_gain: f32,
    /// HDR exposure time ratio
    pub exposure_time_ratio: f32,
    /// HDR sensitivity ratio
    pub sensitivity_ratio: f32,
    /// HDR exposure gain ratio
    pub exposure_gain_ratio: f32,
    /// AWB correlated color temperature in Kelvin
    pub color_temperature: f32,
    /// Dynamic range compression gain
    pub drc_gain: f32,
    /// Lens focus position
    pub lens_position: f32,
    /// Lens zoom factor
    pub lens_zoom: f32,
    /// Scale ratio before the module
    pub pre_scale_ratio: f32,
    /// Scale ratio after the module
    pub post_scale_ratio: f32,
    /// Total output scale ratio
    pub total_scale_ratio: f32,
    /// Flash LED state
    pub led: LedState,
}

impl Default for FrameMetrics {
    fn default() -> Self {
        Self {
            lux_index: 0.0,
            real_gain: 1.0,
            exposure_time_ratio: 1.0,
            sensitivity_ratio: 1.0,
            exposure_gain_ratio: 1.0,
            color_temperature: 5000.0,
            drc_gain: 1.0,
            lens_position: 0.0,
            lens_zoom: 1.0,
            pre_scale_ratio: 1.0,
            post_scale_ratio: 1.0,
            total_scale_ratio: 1.0,
            led: LedState::default(),
        }
    }
}

/// LED inputs of the LED search
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct LedTrigger {
    /// Number of active LEDs
    pub count: u16,
    /// Sensitivity compared against `sensitivity_trigger`
    pub sensitivity: f32,
    /// Blend weight between the first and second light source
    pub first_entry_ratio: f32,
    /// Tuning-supplied interval over which LED-off blends into LED-on
    pub sensitivity_trigger: TriggerRegion,
}

/// Derived trigger values for one module and one frame
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TriggerSnapshot {
    /// Total output scale ratio
    pub total_scale_ratio: f32,
    /// Pre-scale ratio
    pub pre_scale_ratio: f32,
    /// Post-scale ratio
    pub post_scale_ratio: f32,
    /// DRC gain
    pub drc_gain: f32,
    /// HDR-AEC value selected by `control.hdr_aec`
    pub hdr_aec: f32,
    /// AEC value selected by `control.aec`
    pub aec: f32,
    /// Color temperature
    pub cct: f32,
    /// Lens focus position
    pub lens_position: f32,
    /// Lens zoom
    pub lens_zoom: f32,
    /// LED inputs
    pub led: LedTrigger,
    /// Raw input selection for switchable dimensions
    pub control: ControlMethod,
}

impl TriggerSnapshot {
    /// Reduce raw frame metadata through `control`
    pub fn from_frame(
        frame: &FrameMetrics,
        control: ControlMethod,
        led_sensitivity_trigger: TriggerRegion,
    ) -> Self {
        let aec = match control.aec {
            AecControl::LuxIndex => frame.lux_index,
            AecControl::Gain => frame.real_gain,
        };
        let hdr_aec = match control.hdr_aec {
            HdrAecControl::ExposureTimeRatio => frame.exposure_time_ratio,
            HdrAecControl::SensitivityRatio => frame.sensitivity_ratio,
            HdrAecControl::ExposureGainRatio => frame.exposure_gain_ratio,
        };

        Self {
            total_scale_ratio: frame.total_scale_ratio,
            pre_scale_ratio: frame.pre_scale_ratio,
            post_scale_ratio: frame.post_scale_ratio,
            drc_gain: frame.drc_gain,
            hdr_aec,
            aec,
            cct: frame.color_temperature,
            lens_position: frame.lens_position,
            lens_zoom: frame.lens_zoom,
            led: LedTrigger {
                count: frame.led.count,
                sensitivity: frame.led.sensitivity,
                first_entry_ratio: frame.led.first_entry_ratio,
                sensitivity_trigger: led_sensitivity_trigger,
            },
            control,
        }
    }

    /// Whether this snapshot differs materially from `previous`.
    ///
    /// When it does not, the previous frame's interpolation result is still valid.
    pub fn has_changed(&self, previous: &TriggerSnapshot) -> bool {
        let values = [
            (self.total_scale_ratio, previous.total_scale_ratio),
            (self.pre_scale_ratio, previous.pre_scale_ratio),
            (self.post_scale_ratio, previous.post_scale_ratio),
            (self.drc_gain, previous.drc_gain),
            (self.hdr_aec, previous.hdr_aec),
            (self.aec, previous.aec),
            (self.cct, previous.cct),
            (self.lens_position, previous.lens_position),
            (self.lens_zoom, previous.lens_zoom),
            (self.led.sensitivity, previous.led.sensitivity),
            (self.led.first_entry_ratio, previous.led.first_entry_ratio),
            (
                self.led.sensitivity_trigger.start,
                previous.led.sensitivity_trigger.start,
            ),
            (
                self.led.sensitivity_trigger.end,
                previous.led.sensitivity_trigger.end,
            ),
        ];

        self.control != previous.control
            || self.led.count != previous.led.count
            || values.iter().any(|&(a, b)| !float_eq(a, b))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame() -> FrameMetrics {
        FrameMetrics {
            lux_index: 350.0,
            real_gain: 2.0,
            exposure_time_ratio: 4.0,
            sensitivity_ratio: 8.0,
            exposure_gain_ratio: 16.0,
            ..Default::default()
        }
    }

    #[test]
    fn test_control_method_selects_inputs() {
        let led = TriggerRegion::new(0.0, 1.0);
        let default = TriggerSnapshot::from_frame(&frame(), ControlMethod::default(), led);
        assert_eq!(default.aec, 350.0);
        assert_eq!(default.hdr_aec, 4.0);

        let control = ControlMethod {
            aec: AecControl::Gain,
            hdr_aec: HdrAecControl::ExposureGainRatio,
        };
        let switched = TriggerSnapshot::from_frame(&frame(), control, led);
        assert_eq!(switched.aec, 2.0);
        assert_eq!(switched.hdr_aec, 16.0);

        let sensitivity = ControlMethod {
            hdr_aec: HdrAecControl::SensitivityRatio,
            ..Default::default()
        };
        assert_eq!(
            TriggerSnapshot::from_frame(&frame(), sensitivity, led).hdr_aec,
            8.0
        );
    }

    #[test]
    fn test_has_changed() {
        let led = TriggerRegion::new(0.0, 1.0);
        let a = TriggerSnapshot::from_frame(&frame(), ControlMethod::default(), led);
        let mut b = a;
        assert!(!a.has_changed(&b));

        b.cct += 10.0;
        assert!(a.has_changed(&b));

        let mut c = a;
        c.led.count = 2;
        assert!(a.has_changed(&c));

        let mut d = a;
        d.control.aec = AecControl::Gain;
        assert!(a.has_changed(&d));
    }

    #[test]
    fn test_float_eq() {
        assert!(float_eq(1.0, 1.0));
        assert!(!float_eq(1.0, 1.0001));
    }
}
