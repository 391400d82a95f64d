//! Configuration for py2lua.
//!
//! Loaded from the `--config` path if given, otherwise from `py2lua.toml`
//! in the working directory when it exists. Missing keys keep their
//! defaults.
//!
//! Example py2lua.toml:
//! ```toml
//! [emit]
//! indent_width = 2
//!
//! [emit.heuristics]
//! http_calls = false
//! route_decorators = true
//! method_calls = true
//! ```

use py2lua_syntax::EmitOptions;
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Config file looked up in the working directory.
pub const CONFIG_FILE: &str = "py2lua.toml";

/// Root configuration structure.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct Config {
    pub emit: EmitOptions,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid config {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
}

impl Config {
    /// Resolve the config for a run started in `cwd`.
    ///
    /// An explicit path must exist; the implicit one is optional.
    pub fn load(explicit: Option<&Path>, cwd: &Path) -> Result<Self, ConfigError> {
        match explicit {
            Some(path) => Self::load_file(path),
            None => {
                let path = cwd.join(CONFIG_FILE);
                if path.is_file() {
                    Self::load_file(&path)
                } else {
                    tracing::debug!("no {} found, using defaults", CONFIG_FILE);
                    Ok(Self::default())
                }
            }
        }
    }

    /// Load config from a file path.
    pub fn load_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config = toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        tracing::debug!(path = %path.display(), "loaded config");
        Ok(config)
    }
}
