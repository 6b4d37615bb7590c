//! Subcommand handlers.

use std::path::{Path, PathBuf};

use anyhow::{Context, bail};
use loadwise_core::config::{config_exists, workspace_config_path};
use loadwise_core::{Advisor, AdvisorConfig, AvailableResources, GIB, TaskConfig};

use crate::render;
use crate::{Commands, ConfigAction, ResourceArgs, TaskArgs};

pub fn handle_command(
    command: Commands,
    workspace: &Path,
    config_path: Option<&Path>,
) -> anyhow::Result<()> {
    match command {
        Commands::Estimate { task } => handle_estimate(&task, workspace, config_path),
        Commands::Check { task, resources } => {
            handle_check(&task, &resources, workspace, config_path)
        }
        Commands::Suggest { task, resources } => {
            handle_suggest(&task, &resources, workspace, config_path)
        }
        Commands::Config { action } => handle_config(action, workspace, config_path),
    }
}

fn handle_estimate(
    args: &TaskArgs,
    workspace: &Path,
    config_path: Option<&Path>,
) -> anyhow::Result<()> {
    let config = load_settings(workspace, config_path)?;
    let advisor = Advisor::new(config)?;
    let task = load_task(&args.task)?;

    let estimate = advisor.estimate(&task)?;
    if args.json {
        println!("{}", serde_json::to_string_pretty(&estimate)?);
    } else {
        print!("{}", render::estimate(&task, &estimate));
    }
    Ok(())
}

fn handle_check(
    args: &TaskArgs,
    resources: &ResourceArgs,
    workspace: &Path,
    config_path: Option<&Path>,
) -> anyhow::Result<()> {
    let config = load_settings(workspace, config_path)?;
    let available = resolve_resources(resources, &config)?;
    let advisor = Advisor::new(config)?;
    let task = load_task(&args.task)?;

    let report = advisor.analyze(&task, &available)?;
    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print!("{}", render::report(&task, &report, &available));
    }
    Ok(())
}

fn handle_suggest(
    args: &TaskArgs,
    resources: &ResourceArgs,
    workspace: &Path,
    config_path: Option<&Path>,
) -> anyhow::Result<()> {
    let config = load_settings(workspace, config_path)?;
    let available = resolve_resources(resources, &config)?;
    let advisor = Advisor::new(config)?;
    let task = load_task(&args.task)?;

    let report = advisor.analyze(&task, &available)?;
    if args.json {
        println!("{}", serde_json::to_string_pretty(&report.suggestions)?);
    } else {
        print!("{}", render::suggestions(&report.suggestions));
    }
    Ok(())
}

fn handle_config(
    action: ConfigAction,
    workspace: &Path,
    config_path: Option<&Path>,
) -> anyhow::Result<()> {
    match action {
        ConfigAction::Init => {
            let (path, created) = init_config(workspace)?;
            if created {
                println!("Created default configuration at: {}", path.display());
            } else {
                println!("Configuration file already exists at: {}", path.display());
            }
            Ok(())
        }
        ConfigAction::Show => {
            let config = load_settings(workspace, config_path)?;
            if let Some(notice) = defaults_notice(workspace, config_path) {
                eprintln!("{notice}");
            }
            println!("{}", toml::to_string_pretty(&config)?);
            Ok(())
        }
    }
}

/// Write the default configuration into the workspace unless a file is already there.
fn init_config(workspace: &Path) -> anyhow::Result<(PathBuf, bool)> {
    let path = workspace_config_path(workspace);
    if path.exists() {
        return Ok((path, false));
    }
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create {}", dir.display()))?;
    }
    let toml_str = toml::to_string_pretty(&AdvisorConfig::default())?;
    std::fs::write(&path, toml_str)
        .with_context(|| format!("Failed to write {}", path.display()))?;
    Ok((path, true))
}

/// Layered configuration, with an explicit `--config` file on top.
fn load_settings(workspace: &Path, config_path: Option<&Path>) -> anyhow::Result<AdvisorConfig> {
    if let Some(path) = config_path {
        if !path.is_file() {
            bail!("Config file not found: {}", path.display());
        }
    }

    loadwise_core::load_config(Some(workspace), config_path, None)
        .map_err(|e| anyhow::anyhow!("Failed to load config: {}", e))
}

/// Hint printed by `config show` when only built-in defaults are in effect.
fn defaults_notice(workspace: &Path, config_path: Option<&Path>) -> Option<String> {
    if config_path.is_some() || config_exists(Some(workspace)) {
        return None;
    }
    Some(format!(
        "No configuration file found; showing built-in defaults. \
         Run `loadwise config init` to create {}",
        workspace_config_path(workspace).display()
    ))
}

fn load_task(path: &Path) -> anyhow::Result<TaskConfig> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read task file {}", path.display()))?;
    let is_json = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
    parse_task(&text, is_json).with_context(|| format!("Invalid task file {}", path.display()))
}

fn parse_task(text: &str, is_json: bool) -> anyhow::Result<TaskConfig> {
    let task: TaskConfig = if is_json {
        serde_json::from_str(text)?
    } else {
        toml::from_str(text)?
    };
    tracing::debug!(kind = %task.kind(), "Loaded task");
    Ok(task)
}

/// Capacity from flags, falling back per dimension to `[resources]` in config.
fn resolve_resources(
    args: &ResourceArgs,
    config: &AdvisorConfig,
) -> anyhow::Result<AvailableResources> {
    let configured = config.resources;

    let vram_bytes = match (args.vram_gib, configured) {
        (Some(gib), _) => gib_to_bytes("--vram-gib", gib)?,
        (None, Some(resources)) => resources.vram_bytes,
        (None, None) => bail!("No VRAM capacity declared: pass --vram-gib or set [resources] in config"),
    };
    let ram_bytes = match (args.ram_gib, configured) {
        (Some(gib), _) => gib_to_bytes("--ram-gib", gib)?,
        (None, Some(resources)) => resources.ram_bytes,
        (None, None) => bail!("No RAM capacity declared: pass --ram-gib or set [resources] in config"),
    };

    Ok(AvailableResources::new(vram_bytes, ram_bytes))
}

fn gib_to_bytes(flag: &str, gib: f64) -> anyhow::Result<u64> {
    if !gib.is_finite() || gib < 0.0 {
        bail!("{flag} must be a non-negative number, got {gib}");
    }
    Ok((gib * GIB as f64).round() as u64)
}
