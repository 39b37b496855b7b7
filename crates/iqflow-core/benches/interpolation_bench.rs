use criterion::{criterion_group, criterion_main, Criterion};
use iqflow_core::{
    quantize_to_hardware_fields, run_interpolation, ControlMethod, FieldRange, FieldSpec,
    FieldValue, FrameMetrics, LedState, OperationTable, ParameterBlock, RegionEntry,
    RegionTable, RegisterSchema, SearchKind, TriggerRegion, TriggerSnapshot,
    COLOR_CORRECTION_LEVELS,
};
use std::hint::black_box;

fn ccm(seed: f32) -> ParameterBlock {
    ParameterBlock::new()
        .with("ccm", FieldValue::Array((0..9).map(|i| seed + i as f32 * 0.1).collect()))
        .with("offset", FieldValue::Array(vec![seed; 3]))
        .with("enable", FieldValue::Flag(true))
}

/// Two regions per level, three LED entries
fn color_correction_table(level: usize, seed: f32) -> RegionTable<ParameterBlock> {
    let count = if COLOR_CORRECTION_LEVELS.get(level) == Some(&SearchKind::Led) {
        3
    } else {
        2
    };
    let entries = (0..count)
        .map(|i| {
            let region = TriggerRegion::new(i as f32 * 100.0, i as f32 * 100.0 + 50.0);
            let seed = seed + i as f32;
            if level + 1 == COLOR_CORRECTION_LEVELS.len() {
                RegionEntry::leaf(region, ccm(seed))
            } else {
                RegionEntry::table(region, color_correction_table(level + 1, seed * 2.0))
            }
        })
        .collect();
    RegionTable::new(entries)
}

fn interpolation_benchmark(c: &mut Criterion) {
    let root = color_correction_table(0, 0.0);
    let ops = OperationTable::from_kinds(COLOR_CORRECTION_LEVELS).unwrap();
    let schema = RegisterSchema::default()
        .with(FieldSpec::fixed("CCM", "ccm", 10, FieldRange::signed(12)))
        .with(FieldSpec::fixed("OFFSET", "offset", 4, FieldRange::signed(10)));
    let frame = FrameMetrics {
        drc_gain: 75.0,
        exposure_time_ratio: 60.0,
        lux_index: 80.0,
        color_temperature: 70.0,
        led: LedState {
            count: 3,
            sensitivity: 0.5,
            first_entry_ratio: 0.25,
        },
        ..Default::default()
    };
    let trigger =
        TriggerSnapshot::from_frame(&frame, ControlMethod::default(), TriggerRegion::new(0.0, 1.0));

    let mut group = c.benchmark_group("ColorCorrection");
    group.bench_function("run_interpolation", |b| {
        b.iter(|| run_interpolation(black_box(&trigger), &root, &ops).unwrap())
    });
    group.bench_function("interpolate_and_quantize", |b| {
        b.iter(|| {
            let block = run_interpolation(black_box(&trigger), &root, &ops).unwrap();
            quantize_to_hardware_fields(&block, &schema).unwrap()
        })
    });
    group.finish();
}

criterion_group!(benches, interpolation_benchmark);
criterion_main!(benches);
