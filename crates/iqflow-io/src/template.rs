//! Starter assets.
//!
//! A small but complete tuning asset and a matching frame sequence, used by the
//! `template` command and as fixtures.

use crate::frames::FrameSequenceFile;
use crate::tuning_format::{ModuleAsset, TuningAsset};
use iqflow_core::{
    FieldRange, FieldSpec, FieldValue, FrameMetrics, LedState, ModuleDefinition, ModuleTuning,
    ParameterBlock, RegionEntry, RegionTable, RegionTrigger, RegisterSchema, SlopeEncoding,
    TriggerRegion, COLOR_CORRECTION_LEVELS, LENS_CORRECTION_LEVELS,
};

/// Color temperatures of the CCT regions, in Kelvin
const CCT_POINTS: [f32; 3] = [2800.0, 4000.0, 6500.0];

/// Knot positions of the radial gain curve
const RADIAL_KNOTS: [i32; 5] = [0, 64, 128, 256, 512];

fn ccm_block(saturation: f32, enable: bool) -> ParameterBlock {
    let s = saturation;
    let off = (1.0 - s) / 2.0;
    ParameterBlock::new()
        .with(
            "ccm",
            FieldValue::Array(vec![s, off, off, off, s, off, off, off, s]),
        )
        .with("enable", FieldValue::Flag(enable))
}

/// One table per level, leaves built from their index path
fn nest(
    levels: &[Vec<RegionTrigger>],
    path: &mut Vec<usize>,
    leaf: &dyn Fn(&[usize]) -> ParameterBlock,
) -> RegionTable<ParameterBlock> {
    let depth = path.len();
    let entries = levels[depth]
        .iter()
        .enumerate()
        .map(|(index, trigger)| {
            path.push(index);
            let entry = if depth + 1 == levels.len() {
                RegionEntry::leaf(*trigger, leaf(path.as_slice()))
            } else {
                RegionEntry::table(*trigger, nest(levels, path, leaf))
            };
            path.pop();
            entry
        })
        .collect();
    RegionTable::new(entries)
}

fn color_correction() -> ModuleAsset {
    let drc: Vec<RegionTrigger> = vec![
        TriggerRegion::new(1.0, 1.5).into(),
        TriggerRegion::new(3.0, 8.0).into(),
    ];
    let hdr = vec![
        RegionTrigger::HdrAec {
            exposure_time_ratio: TriggerRegion::new(1.0, 2.0),
            sensitivity_ratio: TriggerRegion::new(1.0, 2.0),
            exposure_gain_ratio: TriggerRegion::new(1.0, 2.0),
        },
        RegionTrigger::HdrAec {
            exposure_time_ratio: TriggerRegion::new(8.0, 16.0),
            sensitivity_ratio: TriggerRegion::new(8.0, 16.0),
            exposure_gain_ratio: TriggerRegion::new(8.0, 16.0),
        },
    ];
    // LED off, LED on
    let led: Vec<RegionTrigger> = vec![
        TriggerRegion::new(0.0, 0.0).into(),
        TriggerRegion::new(0.0, 0.0).into(),
    ];
    let aec = vec![
        RegionTrigger::Aec {
            lux_index: TriggerRegion::new(0.0, 250.0),
            gain: TriggerRegion::new(1.0, 2.0),
        },
        RegionTrigger::Aec {
            lux_index: TriggerRegion::new(350.0, 500.0),
            gain: TriggerRegion::new(8.0, 16.0),
        },
    ];
    let cct: Vec<RegionTrigger> = CCT_POINTS
        .iter()
        .map(|&k| TriggerRegion::new(k - 100.0, k + 100.0).into())
        .collect();

    let root = nest(&[drc, hdr, led, aec, cct], &mut Vec::new(), &|path| {
        // Saturation drops with DRC gain and low light, rises with color temperature
        let s = 1.6 - 0.05 * path[0] as f32 - 0.1 * path[3] as f32 + 0.05 * path[4] as f32;
        ccm_block(s, true)
    });

    let schema = RegisterSchema::default()
        .with(FieldSpec::fixed("CCM_COEFF", "ccm", 10, FieldRange::signed(12)))
        .with(FieldSpec::raw("CCM_EN", "enable", FieldRange::unsigned(1)));

    ModuleAsset {
        definition: ModuleDefinition::new("color_correction", COLOR_CORRECTION_LEVELS, schema),
        tuning: ModuleTuning::new(root),
    }
}

fn lens_shading() -> ModuleAsset {
    let position: Vec<RegionTrigger> = vec![
        TriggerRegion::new(0.0, 100.0).into(),
        TriggerRegion::new(400.0, 500.0).into(),
    ];
    let zoom: Vec<RegionTrigger> = vec![
        TriggerRegion::new(1.0, 1.0).into(),
        TriggerRegion::new(2.0, 4.0).into(),
    ];
    let aec = vec![
        RegionTrigger::Aec {
            lux_index: TriggerRegion::new(0.0, 250.0),
            gain: TriggerRegion::new(1.0, 2.0),
        },
        RegionTrigger::Aec {
            lux_index: TriggerRegion::new(350.0, 500.0),
            gain: TriggerRegion::new(8.0, 16.0),
        },
    ];

    let root = nest(&[position, zoom, aec], &mut Vec::new(), &|path| {
        // Stronger falloff correction when zoomed out, weaker in low light
        let strength = 1.0 + 0.5 * (1 - path[1]) as f32 - 0.25 * path[2] as f32;
        let gains = RADIAL_KNOTS
            .iter()
            .map(|&k| 1.0 + strength * (k as f32 / 512.0).powi(2))
            .collect();
        ParameterBlock::new()
            .with("radial_gain", FieldValue::Array(gains))
            .with("radial_knots", FieldValue::IntArray(RADIAL_KNOTS.to_vec()))
    });

    let schema = RegisterSchema::default()
        .with(FieldSpec::fixed("RADIAL_GAIN", "radial_gain", 10, FieldRange::unsigned(13)))
        .with(FieldSpec::slope(
            "RADIAL_SLOPE",
            "radial_gain",
            "radial_knots",
            SlopeEncoding::RADIAL,
        ));

    ModuleAsset {
        definition: ModuleDefinition::new("lens_shading", LENS_CORRECTION_LEVELS, schema),
        tuning: ModuleTuning::new(root),
    }
}

/// Tuning asset with a color correction and a lens shading module
pub fn template_asset() -> TuningAsset {
    TuningAsset {
        modules: vec![color_correction(), lens_shading()],
    }
}

/// Frames sweeping from daylight to low light with a flash frame at the end
pub fn template_frames() -> FrameSequenceFile {
    let mut frames: Vec<FrameMetrics> = [100.0, 100.0, 300.0, 450.0]
        .iter()
        .map(|&lux_index| FrameMetrics {
            lux_index,
            real_gain: 1.0 + lux_index / 100.0,
            color_temperature: 5200.0,
            lens_position: 250.0,
            lens_zoom: 1.5,
            ..Default::default()
        })
        .collect();
    frames.push(FrameMetrics {
        lux_index: 480.0,
        real_gain: 12.0,
        color_temperature: 3400.0,
        led: LedState {
            count: 1,
            sensitivity: 0.6,
            first_entry_ratio: 0.0,
        },
        ..Default::default()
    });
    FrameSequenceFile::new(frames)
}

#[cfg(test)]
mod tests {
    use super::*;
    use iqflow_core::{has_errors, validate_tuning};

    #[test]
    fn test_template_is_valid() {
        for module in &template_asset().modules {
            let issues = validate_tuning(&module.definition, &module.tuning);
            assert!(!has_errors(&issues), "{}: {:?}", module.name(), issues);
        }
    }

    #[test]
    fn test_template_shapes() {
        let asset = template_asset();
        let cc = asset.module("color_correction").unwrap();
        assert_eq!(cc.tuning.root.depth(), COLOR_CORRECTION_LEVELS.len());
        assert_eq!(cc.tuning.root.leaves().len(), 2 * 2 * 2 * 2 * 3);
        assert_eq!(template_frames().frames.len(), 5);
    }
}
