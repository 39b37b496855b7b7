use iqflow_core::{CarryOverCache, FramePipeline, ModuleOutcome};
use iqflow_io::{
    load_frames, load_tuning_asset, save_tuning_asset, template_asset, template_frames,
};
use tempfile::tempdir;

#[test]
fn test_template_replay() {
    let dir = tempdir().unwrap();
    let asset_path = dir.path().join("sensor.ron");
    let frames_path = dir.path().join("frames.json");

    save_tuning_asset(&template_asset(), "template", &asset_path).unwrap();
    template_frames().save(&frames_path).unwrap();

    let asset = load_tuning_asset(&asset_path).unwrap();
    let sequence = load_frames(&frames_path).unwrap();

    let mut pipeline = FramePipeline::new(asset.build_modules(&[]).unwrap());
    let mut cache = CarryOverCache::new();
    let key = sequence.sensor.carry_over_key();

    let reports: Vec<_> = sequence
        .frames
        .iter()
        .map(|frame| pipeline.run_frame_with_cache(frame, key, &mut cache))
        .collect();

    let labels = |module: &str| -> Vec<&str> {
        reports
            .iter()
            .map(|r| r.get(module).map(|o| o.label()).unwrap_or("missing"))
            .collect()
    };
    assert_eq!(
        labels("color_correction"),
        vec!["configured", "reused", "configured", "configured", "configured"]
    );
    assert_eq!(labels("lens_shading")[1], "reused");

    let fields = reports[0].get("color_correction").and_then(ModuleOutcome::fields).unwrap();
    assert_eq!(fields.table("CCM_COEFF").map(|t| t.len()), Some(9));
    assert_eq!(fields.value("CCM_EN"), Some(1));

    let shading = reports[0].get("lens_shading").and_then(ModuleOutcome::fields).unwrap();
    assert_eq!(shading.slopes("RADIAL_SLOPE").map(<[_]>::len), Some(4));
    // Centre gain is exactly 1.0 in every region
    assert_eq!(shading.table("RADIAL_GAIN").and_then(|t| t.first().copied()), Some(1024));

    assert!(cache.get(&key).is_some_and(|last| last.len() == 2));
}

#[test]
fn test_module_filter() {
    let asset = template_asset();
    let mut pipeline =
        FramePipeline::new(asset.build_modules(&["color_correction".to_string()]).unwrap());
    assert_eq!(pipeline.module_names(), vec!["color_correction"]);

    let report = pipeline.run_frame(&template_frames().frames[0]);
    assert!(report.get("lens_shading").is_none());
    assert_eq!(report.programmed(), 1);
}
