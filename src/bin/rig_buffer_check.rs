use anyhow::{anyhow, Context, Result};
use kestrel_rig::cli::{CheckOptions, USAGE};
use kestrel_rig::config::RigConfig;
use kestrel_rig::copy::{paste_scale, CopyData, CopySummary};
use serde::Serialize;
use std::fs;
use std::path::Path;
use std::process;

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    match run() {
        Ok(invalid) => {
            if invalid > 0 {
                process::exit(2);
            }
        }
        Err(err) => {
            eprintln!("rig_buffer_check error: {err:?}");
            process::exit(1);
        }
    }
}

#[derive(Serialize)]
struct BufferReport<'a> {
    path: &'a str,
    #[serde(flatten)]
    summary: CopySummary,
    source_pixels_per_unit: f32,
    paste_scale: f32,
    is_character_data: bool,
}

fn run() -> Result<usize> {
    let options = CheckOptions::parse_from_env()?;
    if options.show_help {
        println!("{USAGE}");
        return Ok(0);
    }
    if options.paths.is_empty() {
        return Err(anyhow!("no copy buffers given\n{USAGE}"));
    }
    let mut config = match &options.config {
        Some(path) => RigConfig::load(path)?,
        None => RigConfig::default(),
    };
    let overrides = options.config_overrides();
    if !overrides.is_empty() {
        log::info!("CLI overrides applied: {}", overrides.applied_fields().join(", "));
        config.apply_overrides(&overrides);
    }

    let mut invalid = 0;
    for path in &options.paths {
        match check_buffer(path, &config) {
            Ok(line) => println!("OK {line}"),
            Err(err) => {
                invalid += 1;
                println!("INVALID {}: {err:#}", path.display());
            }
        }
    }
    println!("Checked {} buffers ({} invalid)", options.paths.len(), invalid);
    Ok(invalid)
}

fn check_buffer(path: &Path, config: &RigConfig) -> Result<String> {
    let text = fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?;
    let data = CopyData::from_json(&text).context("not a rig copy buffer")?;
    let display = path.display().to_string();
    let report = BufferReport {
        path: &display,
        summary: data.summary(),
        source_pixels_per_unit: data.pixels_per_unit,
        paste_scale: paste_scale(data.pixels_per_unit, config.copy.pixels_per_unit),
        is_character_data: data.is_character_data,
    };
    let line = if config.copy.pretty_buffer {
        serde_json::to_string_pretty(&report)?
    } else {
        serde_json::to_string(&report)?
    };
    Ok(line)
}
