//! Service configuration resolution for acp-lc
//!
//! Combines CLI arguments with the TOML config into the resolved runtime
//! settings. The storage chain is picked here, by configuration, so the
//! composition root in `main` owns backend construction and lifecycle.

use acp_common::config::{self, TomlConfig};
use acp_common::{Error, Result};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Default listen address when neither CLI nor TOML sets one
pub const DEFAULT_BIND: &str = "127.0.0.1:3000";

/// Default per-backend call timeout
pub const DEFAULT_BACKEND_TIMEOUT_SECS: u64 = 5;

/// Default staleness horizon for partial qualifications
pub const DEFAULT_QUALIFICATION_TTL_HOURS: i64 = 24;

/// Default fallback file name under the root folder
pub const DEFAULT_FALLBACK_FILE: &str = "fallback_leads.json";

/// Storage backend selector
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    Sqlite,
    Hosted,
    Memory,
}

impl FromStr for BackendKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sqlite" => Ok(BackendKind::Sqlite),
            "hosted" => Ok(BackendKind::Hosted),
            "memory" => Ok(BackendKind::Memory),
            other => Err(Error::Config(format!(
                "Unknown storage backend '{}' (expected sqlite, hosted, or memory)",
                other
            ))),
        }
    }
}

/// Hosted row-store settings, required when the chain contains "hosted"
#[derive(Debug, Clone)]
pub struct HostedSettings {
    pub url: String,
    pub api_key: String,
}

/// Fully resolved runtime configuration
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub root_folder: PathBuf,
    pub bind: SocketAddr,
    pub backends: Vec<BackendKind>,
    pub backend_timeout: Duration,
    pub qualification_ttl_hours: i64,
    pub fallback_path: PathBuf,
    pub hosted: Option<HostedSettings>,
}

impl ServiceConfig {
    /// Resolve runtime settings from CLI overrides and the TOML config
    pub fn resolve(
        cli_root_folder: Option<&str>,
        cli_bind: Option<&str>,
        toml_config: &TomlConfig,
    ) -> Result<Self> {
        let root_folder =
            config::resolve_root_folder(cli_root_folder, toml_config.root_folder.as_deref());

        let bind_str = cli_bind
            .map(str::to_string)
            .or_else(|| toml_config.bind.clone())
            .unwrap_or_else(|| DEFAULT_BIND.to_string());
        let bind: SocketAddr = bind_str
            .parse()
            .map_err(|e| Error::Config(format!("Invalid bind address '{}': {}", bind_str, e)))?;

        let backend_names = toml_config
            .backends
            .clone()
            .unwrap_or_else(|| vec!["sqlite".to_string()]);
        let backends = backend_names
            .iter()
            .map(|name| name.parse())
            .collect::<Result<Vec<BackendKind>>>()?;
        if backends.is_empty() {
            return Err(Error::Config(
                "At least one storage backend must be configured".to_string(),
            ));
        }

        let hosted = if backends.contains(&BackendKind::Hosted) {
            let url = toml_config
                .hosted
                .as_ref()
                .and_then(|h| h.url.clone())
                .filter(|u| !u.trim().is_empty())
                .ok_or_else(|| {
                    Error::Config(
                        "Backend 'hosted' selected but [hosted] url is not configured".to_string(),
                    )
                })?;
            let api_key = config::resolve_hosted_api_key(toml_config).ok_or_else(|| {
                Error::Config(format!(
                    "Backend 'hosted' selected but no API key found ({} or [hosted] api_key)",
                    config::HOSTED_API_KEY_ENV
                ))
            })?;
            Some(HostedSettings { url, api_key })
        } else {
            None
        };

        let fallback_file = toml_config
            .fallback_file
            .clone()
            .unwrap_or_else(|| DEFAULT_FALLBACK_FILE.to_string());
        let fallback_path = {
            let p = PathBuf::from(&fallback_file);
            if p.is_absolute() {
                p
            } else {
                root_folder.join(p)
            }
        };

        Ok(Self {
            root_folder,
            bind,
            backends,
            backend_timeout: Duration::from_secs(
                toml_config
                    .backend_timeout_secs
                    .unwrap_or(DEFAULT_BACKEND_TIMEOUT_SECS),
            ),
            qualification_ttl_hours: toml_config
                .qualification_ttl_hours
                .unwrap_or(DEFAULT_QUALIFICATION_TTL_HOURS),
            fallback_path,
            hosted,
        })
    }

    /// Path of the sqlite database under the root folder
    pub fn database_path(&self) -> PathBuf {
        self.root_folder.join("acp.db")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use acp_common::config::HostedConfig;

    #[test]
    fn test_backend_kind_parsing() {
        assert_eq!("sqlite".parse::<BackendKind>().unwrap(), BackendKind::Sqlite);
        assert_eq!("Hosted".parse::<BackendKind>().unwrap(), BackendKind::Hosted);
        assert_eq!(" memory ".parse::<BackendKind>().unwrap(), BackendKind::Memory);
        assert!("postgres".parse::<BackendKind>().is_err());
    }

    #[test]
    fn test_resolve_defaults() {
        let config =
            ServiceConfig::resolve(Some("/tmp/acp-test"), None, &TomlConfig::default()).unwrap();
        assert_eq!(config.bind, DEFAULT_BIND.parse().unwrap());
        assert_eq!(config.backends, vec![BackendKind::Sqlite]);
        assert_eq!(config.backend_timeout, Duration::from_secs(5));
        assert_eq!(config.qualification_ttl_hours, 24);
        assert_eq!(
            config.fallback_path,
            PathBuf::from("/tmp/acp-test/fallback_leads.json")
        );
        assert!(config.hosted.is_none());
    }

    #[test]
    fn test_cli_bind_beats_toml() {
        let toml_config = TomlConfig {
            bind: Some("127.0.0.1:9999".to_string()),
            ..Default::default()
        };
        let config =
            ServiceConfig::resolve(Some("/tmp/acp-test"), Some("0.0.0.0:3000"), &toml_config)
                .unwrap();
        assert_eq!(config.bind, "0.0.0.0:3000".parse().unwrap());
    }

    #[test]
    fn test_invalid_bind_rejected() {
        let result =
            ServiceConfig::resolve(Some("/tmp/acp-test"), Some("not-an-addr"), &TomlConfig::default());
        assert!(result.is_err());
    }

    #[test]
    fn test_unknown_backend_rejected() {
        let toml_config = TomlConfig {
            backends: Some(vec!["sqlite".to_string(), "mongo".to_string()]),
            ..Default::default()
        };
        assert!(ServiceConfig::resolve(Some("/tmp/acp-test"), None, &toml_config).is_err());
    }

    #[test]
    fn test_empty_backend_list_rejected() {
        let toml_config = TomlConfig {
            backends: Some(vec![]),
            ..Default::default()
        };
        assert!(ServiceConfig::resolve(Some("/tmp/acp-test"), None, &toml_config).is_err());
    }

    #[test]
    fn test_hosted_requires_url() {
        let toml_config = TomlConfig {
            backends: Some(vec!["hosted".to_string()]),
            hosted: Some(HostedConfig {
                url: None,
                api_key: Some("key".to_string()),
            }),
            ..Default::default()
        };
        assert!(ServiceConfig::resolve(Some("/tmp/acp-test"), None, &toml_config).is_err());
    }

    #[test]
    fn test_hosted_settings_resolved() {
        let toml_config = TomlConfig {
            backends: Some(vec!["hosted".to_string(), "sqlite".to_string()]),
            hosted: Some(HostedConfig {
                url: Some("https://rows.example.co".to_string()),
                api_key: Some("toml-key".to_string()),
            }),
            ..Default::default()
        };
        let config = ServiceConfig::resolve(Some("/tmp/acp-test"), None, &toml_config).unwrap();
        assert_eq!(
            config.backends,
            vec![BackendKind::Hosted, BackendKind::Sqlite]
        );
        let hosted = config.hosted.unwrap();
        assert_eq!(hosted.url, "https://rows.example.co");
        assert_eq!(hosted.api_key, "toml-key");
    }

    #[test]
    fn test_absolute_fallback_path_kept() {
        let toml_config = TomlConfig {
            fallback_file: Some("/var/backups/leads.json".to_string()),
            ..Default::default()
        };
        let config = ServiceConfig::resolve(Some("/tmp/acp-test"), None, &toml_config).unwrap();
        assert_eq!(config.fallback_path, PathBuf::from("/var/backups/leads.json"));
    }
}
