//! Configuration system for Loadwise.
//!
//! Uses `figment` for layered configuration: defaults -> config file -> environment -> overrides.
//! Configuration is loaded from `~/.config/loadwise/config.toml` and/or `.loadwise/config.toml`
//! in the workspace directory.

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::cost::CostTables;
use crate::error::ConfigError;
use crate::model::AvailableResources;
use crate::suggest::BalanceTable;

/// Top-level configuration for the advisor.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AdvisorConfig {
    /// Cost model calibration.
    #[serde(default)]
    pub tables: CostTables,
    /// Suggestion kind -> "balanced" flag.
    #[serde(default)]
    pub balance: BalanceTable,
    /// Declared hardware capacity, used when a request does not carry its own.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resources: Option<AvailableResources>,
}

impl AdvisorConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.tables.validate()
    }
}

fn project_dirs() -> Option<directories::ProjectDirs> {
    directories::ProjectDirs::from("dev", "loadwise", "loadwise")
}

/// Path of the user-level config file, if a home directory can be resolved.
pub fn user_config_path() -> Option<PathBuf> {
    project_dirs().map(|dirs| dirs.config_dir().join("config.toml"))
}

/// Path of the workspace-level config file.
pub fn workspace_config_path(workspace: &Path) -> PathBuf {
    workspace.join(".loadwise").join("config.toml")
}

/// Load configuration from layered sources.
///
/// Priority (highest to lowest):
/// 1. Explicit overrides (passed as argument)
/// 2. Explicit config file (only the keys it sets)
/// 3. Environment variables (prefixed with `LOADWISE_`)
/// 4. Workspace-local config (`.loadwise/config.toml`)
/// 5. User config (`~/.config/loadwise/config.toml`)
/// 6. Built-in defaults
pub fn load_config(
    workspace: Option<&Path>,
    config_file: Option<&Path>,
    overrides: Option<&AdvisorConfig>,
) -> Result<AdvisorConfig, Box<figment::Error>> {
    let mut figment = Figment::from(Serialized::defaults(AdvisorConfig::default()));

    if let Some(user_config) = user_config_path() {
        if user_config.exists() {
            figment = figment.merge(Toml::file(&user_config));
        }
    }

    if let Some(ws) = workspace {
        let ws_config = workspace_config_path(ws);
        if ws_config.exists() {
            figment = figment.merge(Toml::file(&ws_config));
        }
    }

    // LOADWISE_TABLES__SYSTEM_OVERHEAD_BYTES, LOADWISE_RESOURCES__VRAM_BYTES, etc.
    figment = figment.merge(Env::prefixed("LOADWISE_").split("__"));

    if let Some(path) = config_file {
        figment = figment.merge(Toml::file(path));
    }

    if let Some(overrides) = overrides {
        figment = figment.merge(Serialized::defaults(overrides));
    }

    let config: AdvisorConfig = figment.extract().map_err(Box::new)?;
    tracing::debug!(
        has_resources = config.resources.is_some(),
        "Loaded advisor configuration"
    );
    Ok(config)
}

/// Check whether any Loadwise configuration file exists (user-level or workspace-level).
pub fn config_exists(workspace: Option<&Path>) -> bool {
    if user_config_path().is_some_and(|p| p.exists()) {
        return true;
    }
    workspace.is_some_and(|ws| workspace_config_path(ws).exists())
}
