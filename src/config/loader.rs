//! Reading node settings from a TOML file.

use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::config::schema::NodeConfig;
use crate::config::validation::{validate_config, ValidationError};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid TOML: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("invalid settings: {}", join_errors(.0))]
    Invalid(Vec<ValidationError>),
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors.iter().map(ToString::to_string).collect::<Vec<_>>().join("; ")
}

/// Read, parse and validate `path`.
pub fn load_config(path: &Path) -> Result<NodeConfig, ConfigError> {
    let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let config = parse_config(&text)?;
    tracing::debug!(path = %path.display(), "Node settings loaded");
    Ok(config)
}

/// Parse and validate settings already in memory. Missing sections take
/// their defaults.
pub fn parse_config(text: &str) -> Result<NodeConfig, ConfigError> {
    let config: NodeConfig = toml::from_str(text)?;
    validate_config(&config).map_err(ConfigError::Invalid)?;
    Ok(config)
}
