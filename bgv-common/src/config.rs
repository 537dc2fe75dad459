//! Configuration loading and resolution
//!
//! Settings resolve in priority order:
//! 1. Environment variable (highest priority)
//! 2. TOML config file (`~/.config/bgv/config.toml`, then `/etc/bgv/config.toml`)
//! 3. Compiled default (fallback)

use crate::{Error, Result};
use serde::Deserialize;
use std::path::PathBuf;

/// Default listen port for the reporting service
pub const DEFAULT_PORT: u16 = 5830;

/// Service configuration resolved at startup
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Path to the SQLite database file
    pub database_path: PathBuf,
    /// HTTP listen port
    pub port: u16,
}

/// On-disk TOML shape (all keys optional)
#[derive(Debug, Default, Deserialize)]
struct ConfigFile {
    database_path: Option<PathBuf>,
    port: Option<u16>,
}

impl ServiceConfig {
    /// Resolve configuration from environment, config file, and defaults
    pub fn resolve() -> Result<Self> {
        let file = load_config_file().unwrap_or_default();

        let database_path = match std::env::var("BGV_DATABASE_PATH") {
            Ok(path) => PathBuf::from(path),
            Err(_) => match file.database_path {
                Some(path) => path,
                None => default_database_path()?,
            },
        };

        let port = match std::env::var("BGV_PORT") {
            Ok(raw) => raw
                .parse::<u16>()
                .map_err(|_| Error::Config(format!("BGV_PORT is not a valid port: {raw}")))?,
            Err(_) => file.port.unwrap_or(DEFAULT_PORT),
        };

        Ok(Self {
            database_path,
            port,
        })
    }
}

/// Load the first config file found, if any
fn load_config_file() -> Option<ConfigFile> {
    let mut candidates: Vec<PathBuf> = Vec::new();
    if let Some(dir) = dirs::config_dir() {
        candidates.push(dir.join("bgv").join("config.toml"));
    }
    candidates.push(PathBuf::from("/etc/bgv/config.toml"));

    for path in candidates {
        if !path.exists() {
            continue;
        }
        match std::fs::read_to_string(&path) {
            Ok(contents) => match toml::from_str::<ConfigFile>(&contents) {
                Ok(config) => return Some(config),
                Err(e) => {
                    tracing::warn!("Ignoring malformed config file {}: {}", path.display(), e);
                }
            },
            Err(e) => {
                tracing::warn!("Cannot read config file {}: {}", path.display(), e);
            }
        }
    }

    None
}

/// OS-dependent default database location
fn default_database_path() -> Result<PathBuf> {
    let base = dirs::data_dir()
        .ok_or_else(|| Error::Config("Could not determine data directory".to_string()))?;
    Ok(base.join("bgv").join("bgv.db"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_file_parses_partial_keys() {
        let parsed: ConfigFile = toml::from_str("port = 6001").unwrap();
        assert_eq!(parsed.port, Some(6001));
        assert!(parsed.database_path.is_none());
    }

    #[test]
    fn test_config_file_parses_all_keys() {
        let parsed: ConfigFile =
            toml::from_str("database_path = \"/tmp/bgv.db\"\nport = 5900").unwrap();
        assert_eq!(parsed.database_path, Some(PathBuf::from("/tmp/bgv.db")));
        assert_eq!(parsed.port, Some(5900));
    }
}
