//! IQFlow - Command-line driver
//!
//! Loads a tuning asset and a recorded frame sequence, runs every module per
//! frame and prints the resulting register fields.

mod cli;
mod logging_setup;

use anyhow::{bail, Context, Result};
use clap::Parser;
use cli::{Args, Command, OutputFormat};
use iqflow_core::{
    CarryOverCache, FramePipeline, FrameReport, IssueSeverity, LogConfig, RegisterValue,
};
use iqflow_io::{
    load_frames, load_tuning_asset, save_tuning_asset, template_asset, template_frames,
    validate_asset, TuningAssetFile, TUNING_FILE_VERSION,
};
use std::io::{self, Write};
use std::path::Path;
use tracing::{info, info_span, instrument};

fn main() -> Result<()> {
    let args = Args::parse();

    let log_config = LogConfig {
        level: args.log_level.clone(),
        log_path: args.log_dir.clone(),
        file_output: args.log_file,
        directives: args.log_directives.clone(),
        span_timing: args.timings,
        ..Default::default()
    };
    let log_guard = logging_setup::init(&log_config)?;
    if let Some(path) = log_guard.log_file() {
        eprintln!("Logging to file: {:?}", path);
    }

    match args.command {
        Command::Run {
            asset,
            frames,
            modules,
            format,
        } => run(&asset, &frames, &modules, format),
        Command::Validate { asset } => validate(&asset),
        Command::Template { asset, frames } => template(&asset, frames.as_deref()),
    }
}

#[instrument(
    skip_all,
    fields(asset = %asset_path.display(), frames = %frames_path.display())
)]
fn run(
    asset_path: &Path,
    frames_path: &Path,
    filter: &[String],
    format: OutputFormat,
) -> Result<()> {
    let asset = load_tuning_asset(asset_path)
        .with_context(|| format!("Failed to load tuning asset {:?}", asset_path))?;
    let sequence = load_frames(frames_path)
        .with_context(|| format!("Failed to load frames {:?}", frames_path))?;

    for name in filter {
        if asset.module(name).is_none() {
            bail!("Unknown module '{}'", name);
        }
    }

    let mut pipeline = FramePipeline::new(asset.build_modules(filter)?);
    let mut cache = CarryOverCache::new();
    let key = sequence.sensor.carry_over_key();
    info!(
        modules = ?pipeline.module_names(),
        frames = sequence.frames.len(),
        aspect = %key.aspect,
        "Replaying frame sequence"
    );

    let stdout = io::stdout();
    let mut out = stdout.lock();
    for (index, frame) in sequence.frames.iter().enumerate() {
        let report = info_span!("replay", index, lux = frame.lux_index)
            .in_scope(|| pipeline.run_frame_with_cache(frame, key, &mut cache));
        match format {
            OutputFormat::Json => writeln!(out, "{}", serde_json::to_string(&report)?)?,
            OutputFormat::Text => write_text(&mut out, &report)?,
        }
    }
    Ok(())
}

fn write_text(out: &mut impl Write, report: &FrameReport) -> io::Result<()> {
    writeln!(out, "frame {}", report.frame)?;
    for module in &report.modules {
        writeln!(out, "  {} [{}]", module.module, module.outcome.label())?;
        let Some(fields) = module.outcome.fields() else {
            continue;
        };
        for (register, value) in fields.iter() {
            match value {
                RegisterValue::Single(field) => {
                    writeln!(out, "    {} = {}", register, field.value())?
                }
                RegisterValue::Table(table) => {
                    let values: Vec<String> =
                        table.iter().map(|f| f.value().to_string()).collect();
                    writeln!(out, "    {} = [{}]", register, values.join(", "))?
                }
                RegisterValue::Slopes(entries) => {
                    let values: Vec<String> = entries
                        .iter()
                        .map(|e| format!("{}>>{}", e.mantissa, e.shift))
                        .collect();
                    writeln!(out, "    {} = [{}]", register, values.join(", "))?
                }
            }
        }
    }
    Ok(())
}

#[instrument(skip_all, fields(asset = %asset_path.display()))]
fn validate(asset_path: &Path) -> Result<()> {
    let file = TuningAssetFile::load(asset_path)
        .with_context(|| format!("Failed to read tuning asset {:?}", asset_path))?;

    if file.version != TUNING_FILE_VERSION {
        println!(
            "format version {} (this build reads {})",
            file.version, TUNING_FILE_VERSION
        );
    }

    let issues = validate_asset(&file.asset);
    for (module, issue) in &issues {
        println!("{}: {}", module, issue);
    }
    info!(
        modules = file.asset.modules.len(),
        issues = issues.len(),
        "Validation finished"
    );

    let errors = issues
        .iter()
        .filter(|(_, issue)| issue.severity == IssueSeverity::Error)
        .count();
    println!(
        "{} module(s), {} issue(s), {} error(s)",
        file.asset.modules.len(),
        issues.len(),
        errors
    );
    if errors > 0 {
        bail!("{:?} has {} error(s)", asset_path, errors);
    }
    Ok(())
}

fn template(asset_path: &Path, frames_path: Option<&Path>) -> Result<()> {
    save_tuning_asset(&template_asset(), "template", asset_path)
        .with_context(|| format!("Failed to write tuning asset {:?}", asset_path))?;
    println!("Wrote tuning asset {:?}", asset_path);

    if let Some(path) = frames_path {
        template_frames()
            .save(path)
            .with_context(|| format!("Failed to write frames {:?}", path))?;
        println!("Wrote frame sequence {:?}", path);
    }
    Ok(())
}
