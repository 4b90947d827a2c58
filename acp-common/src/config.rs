//! Configuration loading and root folder resolution

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::warn;

/// Environment variable naming the root folder
pub const ROOT_FOLDER_ENV: &str = "ACP_ROOT_FOLDER";

/// Environment variable carrying the hosted-store API key
pub const HOSTED_API_KEY_ENV: &str = "ACP_HOSTED_API_KEY";

/// TOML configuration file contents
///
/// All fields are optional; the service applies its own defaults for
/// anything left unset.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TomlConfig {
    /// Root folder holding the database and fallback file
    pub root_folder: Option<String>,
    /// Listen address, e.g. "127.0.0.1:3000"
    pub bind: Option<String>,
    /// Ordered storage chain: "sqlite", "hosted", "memory"
    pub backends: Option<Vec<String>>,
    /// Per-backend call timeout in seconds
    pub backend_timeout_secs: Option<u64>,
    /// Hours before a partial qualification is considered stale
    pub qualification_ttl_hours: Option<i64>,
    /// Fallback file name or path (relative paths resolve under the root folder)
    pub fallback_file: Option<String>,
    /// Hosted row-store connection settings
    pub hosted: Option<HostedConfig>,
}

/// Hosted row-store section of the TOML config
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HostedConfig {
    /// Base URL of the hosted REST endpoint
    pub url: Option<String>,
    /// API key (environment variable takes precedence)
    pub api_key: Option<String>,
}

/// Resolve the root folder following the priority order:
/// 1. Command-line argument (highest priority)
/// 2. `ACP_ROOT_FOLDER` environment variable
/// 3. TOML config file `root_folder`
/// 4. OS-dependent compiled default (fallback)
pub fn resolve_root_folder(cli_arg: Option<&str>, toml_root: Option<&str>) -> PathBuf {
    // Priority 1: Command-line argument
    if let Some(path) = cli_arg {
        return PathBuf::from(path);
    }

    // Priority 2: Environment variable
    if let Ok(path) = std::env::var(ROOT_FOLDER_ENV) {
        if !path.trim().is_empty() {
            return PathBuf::from(path);
        }
    }

    // Priority 3: TOML config file
    if let Some(path) = toml_root {
        return PathBuf::from(path);
    }

    // Priority 4: OS-dependent compiled default
    default_root_folder()
}

/// Get OS-dependent default root folder path
pub fn default_root_folder() -> PathBuf {
    if cfg!(target_os = "linux") {
        // ~/.local/share/acp (or /var/lib/acp for system-wide)
        dirs::data_local_dir()
            .map(|d| d.join("acp"))
            .unwrap_or_else(|| PathBuf::from("/var/lib/acp"))
    } else if cfg!(target_os = "macos") {
        // ~/Library/Application Support/acp
        dirs::data_dir()
            .map(|d| d.join("acp"))
            .unwrap_or_else(|| PathBuf::from("/Library/Application Support/acp"))
    } else if cfg!(target_os = "windows") {
        // %LOCALAPPDATA%\acp
        dirs::data_local_dir()
            .map(|d| d.join("acp"))
            .unwrap_or_else(|| PathBuf::from("C:\\ProgramData\\acp"))
    } else {
        PathBuf::from("./acp_data")
    }
}

/// Get default configuration file path for the platform
pub fn default_config_path() -> Result<PathBuf> {
    dirs::config_dir()
        .map(|d| d.join("acp").join("acp-lc.toml"))
        .ok_or_else(|| Error::Config("Could not determine config directory".to_string()))
}

/// Load the TOML config file
///
/// An explicit path must exist and parse; the default platform path is
/// allowed to be absent, in which case built-in defaults apply.
pub fn load_toml_config(explicit: Option<&Path>) -> Result<TomlConfig> {
    let (path, required) = match explicit {
        Some(p) => (p.to_path_buf(), true),
        None => (default_config_path()?, false),
    };

    if !path.exists() {
        if required {
            return Err(Error::Config(format!(
                "Config file not found: {}",
                path.display()
            )));
        }
        return Ok(TomlConfig::default());
    }

    let content = std::fs::read_to_string(&path)
        .map_err(|e| Error::Config(format!("Failed to read {}: {}", path.display(), e)))?;
    toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Failed to parse {}: {}", path.display(), e)))
}

/// Resolve the hosted-store API key
///
/// Priority: environment variable, then TOML. Warns when both are set
/// since that usually indicates a stale config file.
pub fn resolve_hosted_api_key(toml_config: &TomlConfig) -> Option<String> {
    let env_key = std::env::var(HOSTED_API_KEY_ENV)
        .ok()
        .filter(|k| !k.trim().is_empty());
    let toml_key = toml_config
        .hosted
        .as_ref()
        .and_then(|h| h.api_key.clone())
        .filter(|k| !k.trim().is_empty());

    if env_key.is_some() && toml_key.is_some() {
        warn!(
            "Hosted API key found in both {} and TOML config; using environment",
            HOSTED_API_KEY_ENV
        );
    }

    env_key.or(toml_key)
}
