//! Configuration for autopip
//!
//! Loaded once at startup from TOML and passed down by reference. Every
//! section and field is optional; missing values fall back to defaults.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Error type for configuration loading
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path:?}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

/// Top-level configuration document
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AutopipConfig {
    pub python: PythonConfig,
    pub ai: AiConfig,
    /// Extra module -> package entries layered over the built-in map
    pub packages: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PythonConfig {
    /// Interpreter used for probes and for `-m pip`
    pub executable: String,
    /// Appended to every real `pip install`
    pub extra_pip_args: Vec<String>,
}

impl Default for PythonConfig {
    fn default() -> Self {
        Self {
            executable: "python3".to_string(),
            extra_pip_args: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AiConfig {
    pub enabled: bool,
    /// OpenAI-compatible API root; `/chat/completions` is appended
    pub base_url: String,
    pub model: String,
    /// Name of the secret holding the API key
    pub api_key_env: String,
    pub timeout_seconds: u64,
    pub max_tokens: Option<u32>,
    pub temperature: Option<f64>,
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            base_url: "https://api.perplexity.ai".to_string(),
            model: "sonar".to_string(),
            api_key_env: "PERPLEXITY_API_KEY".to_string(),
            timeout_seconds: 30,
            max_tokens: Some(64),
            temperature: Some(0.0),
        }
    }
}

impl AutopipConfig {
    /// Default search locations, relative to the working directory
    pub fn default_paths() -> Vec<PathBuf> {
        vec![
            PathBuf::from("autopip.toml"),
            PathBuf::from(".autopip").join("config.toml"),
        ]
    }

    /// Load a specific file. A missing file is an error here.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        Self::from_toml_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn from_toml_str(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// First existing file among `candidates`, or defaults when none exists.
    /// Returns the path that was used, if any.
    pub fn discover(candidates: &[PathBuf]) -> Result<(Self, Option<PathBuf>), ConfigError> {
        for path in candidates {
            if path.exists() {
                return Ok((Self::load(path)?, Some(path.clone())));
            }
        }
        Ok((Self::default(), None))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = AutopipConfig::default();
        assert_eq!(config.python.executable, "python3");
        assert!(config.ai.enabled);
        assert_eq!(config.ai.model, "sonar");
        assert_eq!(config.ai.api_key_env, "PERPLEXITY_API_KEY");
        assert!(config.packages.is_empty());
    }

    #[test]
    fn test_partial_document() {
        let config = AutopipConfig::from_toml_str(
            r#"
[python]
executable = "/usr/bin/python3.12"

[ai]
model = "sonar-pro"

[packages]
mymod = "my-dist"
"#,
        )
        .unwrap();

        assert_eq!(config.python.executable, "/usr/bin/python3.12");
        assert!(config.python.extra_pip_args.is_empty());
        assert_eq!(config.ai.model, "sonar-pro");
        assert_eq!(config.ai.base_url, "https://api.perplexity.ai");
        assert_eq!(config.packages.get("mymod").map(String::as_str), Some("my-dist"));
    }

    #[test]
    fn test_discover_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let (config, used) = AutopipConfig::discover(&[dir.path().join("nope.toml")]).unwrap();
        assert_eq!(config, AutopipConfig::default());
        assert!(used.is_none());
    }

    #[test]
    fn test_discover_picks_first_existing() {
        let dir = tempfile::tempdir().unwrap();
        let second = dir.path().join("second.toml");
        let mut file = std::fs::File::create(&second).unwrap();
        writeln!(file, "[ai]\nenabled = false").unwrap();

        let (config, used) =
            AutopipConfig::discover(&[dir.path().join("first.toml"), second.clone()]).unwrap();
        assert!(!config.ai.enabled);
        assert_eq!(used, Some(second));
    }

    #[test]
    fn test_parse_error_names_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.toml");
        std::fs::write(&path, "[python\nexecutable = 1").unwrap();

        match AutopipConfig::load(&path) {
            Err(ConfigError::Parse { path: p, .. }) => assert_eq!(p, path),
            other => panic!("Expected parse error, got {:?}", other),
        }
    }
}
