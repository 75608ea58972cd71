// src/commands.rs
//! Command handlers for the fmuforge CLI

use anyhow::{Context, Result};
use fmuforge::complement::{self, PortCount, PortStats};
use fmuforge::fmu;
use fmuforge::forge::{Forge, ForgeConfig, Platform, TcpEndpoint};
use fmuforge::model::ModelSpec;
use fmuforge::progress::ProgressLog;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

/// Run the full generation pipeline for one model input file.
#[allow(clippy::too_many_arguments)]
pub fn cmd_generate(
    model_path: &str,
    target: &str,
    model_name: Option<&str>,
    template: &str,
    platform: Option<&str>,
    model_version: &str,
    author: &str,
    copyright: &str,
    license: &str,
    tool_timeout: u64,
    no_check: bool,
    no_endpoint: bool,
    local_port: u16,
    remote_ip: &str,
    remote_port: u16,
) -> Result<()> {
    let mut model = ModelSpec::load(Path::new(model_path))
        .with_context(|| format!("cannot load model input {}", model_path))?;
    if let Some(name) = model_name {
        model.model_name = name.to_string();
    }
    let model_name = model.model_name.clone();

    let platform = match platform {
        Some(text) => text
            .parse::<Platform>()
            .map_err(|_| anyhow::anyhow!("unknown platform '{}'", text))?,
        None => Platform::host(),
    };

    let config = ForgeConfig {
        template_dir: PathBuf::from(template),
        platform,
        version: model_version.to_string(),
        author: author.to_string(),
        copyright: copyright.to_string(),
        license: license.to_string(),
        tool_timeout: Duration::from_secs(tool_timeout),
        endpoint: (!no_endpoint).then(|| TcpEndpoint {
            local_port,
            remote_ip: remote_ip.to_string(),
            remote_port,
        }),
        run_check: !no_check,
    };

    info!(model = %model_name, target, "starting generation run");
    let forge = Forge::new(config);
    let mut log = ProgressLog::with_echo();
    let result = forge
        .generate(model, Path::new(target), &mut log)
        .with_context(|| format!("generation of model '{}' failed", model_name))?;

    println!("\nGenerated FMU: {}", result.fmu_path.display());
    println!("  GUID: {}", result.guid);
    println!("  Recovery input: {}", result.recovery_path.display());
    println!("  Project tree: {}", result.project_dir.display());
    Ok(())
}

/// Read the ports of an existing FMU archive and print them.
pub fn cmd_inspect(fmu_path: &str, json: bool) -> Result<()> {
    let model = fmu::read_model(Path::new(fmu_path))
        .with_context(|| format!("cannot inspect {}", fmu_path))?;

    if json {
        println!("{}", model.to_json_string()?);
        return Ok(());
    }

    println!("Model: {}", model.model_name);
    if !model.description.is_empty() {
        println!("Description: {}", model.description);
    }
    if model.variables.is_empty() {
        println!("No input or output ports declared.");
        return Ok(());
    }

    println!();
    println!(
        "  {:<24} {:<10} {:<8} {:<12} {:<12} start",
        "name", "causality", "type", "variability", "initial"
    );
    for var in &model.variables {
        let initial = var
            .initial
            .map(|i| i.to_string())
            .unwrap_or_else(|| "-".to_string());
        println!(
            "  {:<24} {:<10} {:<8} {:<12} {:<12} {}",
            var.name, var.causality, var.var_type, var.variability, initial, var.start_value
        );
    }

    let stats = PortStats::of(&model);
    println!("\nInputs:  {}", stats.inputs);
    println!("Outputs: {}", stats.outputs);
    Ok(())
}

/// Work out which target inputs the given FMUs leave unfed and write a
/// source model covering them.
pub fn cmd_complement(
    model_path: &str,
    fmus: &[String],
    name: &str,
    output: Option<&str>,
) -> Result<()> {
    let target = ModelSpec::load(Path::new(model_path))
        .with_context(|| format!("cannot load model input {}", model_path))?;

    let mut provided = Vec::with_capacity(fmus.len());
    for path in fmus {
        let model = fmu::read_model(Path::new(path))
            .with_context(|| format!("cannot read FMU {}", path))?;
        info!(fmu = %path, model = %model.model_name, "read FMU ports");
        provided.push(model);
    }

    let target_stats = PortStats::of(&target);
    let mut available = PortCount::default();
    for model in &provided {
        available.accumulate(&PortStats::of(model).outputs);
    }
    let uncovered = target_stats.inputs.saturating_sub(&available);

    println!("Target inputs:    {}", target_stats.inputs);
    println!("Provided outputs: {}", available);
    println!("Uncovered inputs: {}", uncovered);

    let source = complement::synthesize_source_model(name, &target, &provided);
    let output_path = match output {
        Some(path) => PathBuf::from(path),
        None => PathBuf::from(format!("{}.input", name)),
    };
    source.save(&output_path)?;

    if source.variables.is_empty() {
        println!("\nAll target inputs are covered.");
    }
    println!(
        "\nWrote source model with {} output(s) to {}",
        source.variables.len(),
        output_path.display()
    );
    Ok(())
}
