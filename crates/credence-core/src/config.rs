//! Engine configuration, loaded from `credence.toml`.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

pub const DEFAULT_USER_PROMPT: &str =
    "You are now simulating a user who is interacting with a system.\nYou are not an assistant.";

pub const DEFAULT_CHECKER_PROMPT: &str = "You are quality assurance system that confirms whether the responses given by an assistant meet a requirement.\nDon't be too strict with your analysis. If the response is close to meeting the requirement, then give it a pass.";

pub const DEFAULT_ERROR_TRACE_LIMIT: usize = 3000;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file at {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config at {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("failed to serialize config at {path}: {source}")]
    Serialize {
        path: PathBuf,
        #[source]
        source: toml::ser::Error,
    },
    #[error("failed to create config parent directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to write config file at {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub generation: GenerationConfig,
    #[serde(default)]
    pub checks: ChecksConfig,
    #[serde(default)]
    pub report: ReportConfig,
}

/// User simulation settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationConfig {
    #[serde(default = "default_user_prompt")]
    pub user_prompt: String,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            user_prompt: default_user_prompt(),
        }
    }
}

/// Requirement evaluator settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChecksConfig {
    #[serde(default = "default_checker_prompt")]
    pub system_prompt: String,
    /// Extra attempts when the evaluator reply cannot be parsed.
    #[serde(default = "default_invalid_response_retries")]
    pub invalid_response_retries: u32,
}

impl Default for ChecksConfig {
    fn default() -> Self {
        Self {
            system_prompt: default_checker_prompt(),
            invalid_response_retries: default_invalid_response_retries(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportConfig {
    /// Characters kept from the tail of a captured error trace.
    #[serde(default = "default_error_trace_limit")]
    pub error_trace_limit: usize,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            error_trace_limit: default_error_trace_limit(),
        }
    }
}

fn default_user_prompt() -> String {
    DEFAULT_USER_PROMPT.to_string()
}

fn default_checker_prompt() -> String {
    DEFAULT_CHECKER_PROMPT.to_string()
}

fn default_invalid_response_retries() -> u32 {
    1
}

fn default_error_trace_limit() -> usize {
    DEFAULT_ERROR_TRACE_LIMIT
}

pub fn parse_engine_config(contents: &str) -> Result<EngineConfig, toml::de::Error> {
    toml::from_str(contents)
}

pub fn load_engine_config(path: impl AsRef<Path>) -> Result<EngineConfig, ConfigError> {
    let path_ref = path.as_ref();
    let body = fs::read_to_string(path_ref).map_err(|source| ConfigError::Read {
        path: path_ref.to_path_buf(),
        source,
    })?;
    parse_engine_config(&body).map_err(|source| ConfigError::Parse {
        path: path_ref.to_path_buf(),
        source,
    })
}

pub fn save_engine_config(
    path: impl AsRef<Path>,
    config: &EngineConfig,
) -> Result<(), ConfigError> {
    let path_ref = path.as_ref();
    if let Some(parent_dir) = path_ref.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent_dir).map_err(|source| ConfigError::CreateDir {
            path: parent_dir.to_path_buf(),
            source,
        })?;
    }

    let body = toml::to_string_pretty(config).map_err(|source| ConfigError::Serialize {
        path: path_ref.to_path_buf(),
        source,
    })?;
    fs::write(path_ref, body).map_err(|source| ConfigError::Write {
        path: path_ref.to_path_buf(),
        source,
    })?;
    Ok(())
}
