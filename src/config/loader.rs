//! Configuration file loading.
//!
//! ## Responsibility
//! Read a TOML file from disk, parse it into a [`ServiceConfig`], run
//! validation, and apply environment overrides. This is the primary entry
//! point for loading service configuration at startup.
//!
//! ## Guarantees
//! - A successfully loaded config is always validated
//! - I/O errors and parse errors are distinguished in the error type
//! - File path is included in every error message
//!
//! ## NOT Responsible For
//! - Defining the config schema (that belongs to `mod.rs`)
//! - Loading the artifacts the config points at (that belongs to `artifact`)

use std::path::Path;

use super::validation::{self, ConfigError};
use super::ServiceConfig;

/// Load a [`ServiceConfig`] from a TOML file.
///
/// Reads the file, parses it as TOML, and validates all semantic constraints.
///
/// # Arguments
///
/// * `path` — Path to the TOML configuration file.
///
/// # Returns
///
/// - `Ok(ServiceConfig)` if the file is readable, well-formed, and valid.
/// - `Err(ConfigError::Io)` if the file cannot be read.
/// - `Err(ConfigError::Parse)` if the TOML is malformed.
/// - `Err(ConfigError::Validation)` if semantic constraints are violated.
///
/// # Panics
///
/// This function never panics.
///
/// # Example
///
/// ```rust,ignore
/// use emissions_predictor::config::loader::load_from_file;
/// use std::path::Path;
///
/// let config = load_from_file(Path::new("service.toml"))?;
/// println!("Loaded service: {}", config.service.name);
/// ```
pub fn load_from_file(path: &Path) -> Result<ServiceConfig, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
        file: path.display().to_string(),
        source: e,
    })?;

    load_from_str(&content, &path.display().to_string())
}

/// Load a [`ServiceConfig`] from a TOML string.
///
/// Useful for testing or embedding configs without file I/O.
///
/// # Arguments
///
/// * `content` — TOML content as a string.
/// * `source_name` — Identifier for the source (used in error messages).
///
/// # Returns
///
/// - `Ok(ServiceConfig)` if the TOML is well-formed and valid.
/// - `Err(ConfigError::Parse)` if the TOML is malformed.
/// - `Err(ConfigError::Validation)` if semantic constraints are violated.
///
/// # Panics
///
/// This function never panics.
pub fn load_from_str(content: &str, source_name: &str) -> Result<ServiceConfig, ConfigError> {
    let config: ServiceConfig = toml::from_str(content).map_err(|e| ConfigError::Parse {
        file: source_name.to_string(),
        source: e,
    })?;

    validation::validate(&config).map_err(|errors| {
        ConfigError::Validation(
            errors
                .iter()
                .map(|e| e.to_string())
                .collect::<Vec<_>>()
                .join("\n"),
        )
    })?;

    Ok(config)
}

/// Apply environment overrides after the file (or defaults) loaded.
///
/// Deployment platforms inject the listen port through the `PORT`
/// environment variable; when set, it replaces `server.port`. Unset means
/// the configured value stands.
///
/// # Errors
///
/// - `Err(ConfigError::InvalidField)` if `PORT` is set but not a usable
///   TCP port number. Startup aborts rather than binding a surprise port.
///
/// # Panics
///
/// This function never panics.
pub fn apply_env_overrides(config: &mut ServiceConfig) -> Result<(), ConfigError> {
    if let Ok(raw) = std::env::var("PORT") {
        let parsed = raw.trim().parse::<u16>().ok().filter(|port| *port != 0);
        match parsed {
            Some(port) => config.server.port = port,
            None => {
                return Err(ConfigError::InvalidField {
                    field: "PORT".into(),
                    value: raw,
                    reason: "must be a TCP port number between 1 and 65535".into(),
                });
            }
        }
    }
    Ok(())
}
