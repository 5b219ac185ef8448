//! Credential lookup with layered resolution
//!
//! Resolution order (higher priority first):
//! 1. Process environment
//! 2. Local secrets file (`.autopip/secrets.toml`)
//!
//! The file is only read; the process environment is never modified.

use crate::config::ConfigError;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Secrets file format
#[derive(Debug, Clone, Default, Deserialize)]
struct SecretsFile {
    #[serde(default)]
    secrets: HashMap<String, String>,
}

/// Environment-first secret store with a local file fallback
#[derive(Debug, Clone, Default)]
pub struct SecretStore {
    local_secrets: HashMap<String, String>,
}

impl SecretStore {
    /// Default location of the local secrets file under `project_dir`
    pub fn default_path(project_dir: &Path) -> PathBuf {
        project_dir.join(".autopip").join("secrets.toml")
    }

    /// Load the local file if it exists; a missing file is not an error
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let file: SecretsFile = toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;

        Ok(Self {
            local_secrets: file.secrets,
        })
    }

    /// Get a secret by name. Resolution order: env var -> local file.
    /// Empty values count as unset.
    pub fn get(&self, name: &str) -> Option<String> {
        std::env::var(name)
            .ok()
            .filter(|v| !v.trim().is_empty())
            .or_else(|| {
                self.local_secrets
                    .get(name)
                    .filter(|v| !v.trim().is_empty())
                    .cloned()
            })
    }
}
