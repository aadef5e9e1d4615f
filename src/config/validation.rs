//! Configuration validation engine.
//!
//! ## Responsibility
//! Validate semantic constraints on a parsed [`ServiceConfig`] that cannot
//! be expressed through the type system alone (e.g., non-empty strings,
//! non-zero ports).
//!
//! ## Guarantees
//! - Every validation rule has at least one test that triggers it
//! - Validation collects *all* errors before returning (no short-circuit)
//! - Error messages include the field path and the invalid value
//!
//! ## NOT Responsible For
//! - Parsing TOML (that belongs to `loader`)
//! - File I/O (that belongs to `loader`)

use super::ServiceConfig;

/// Errors arising from configuration parsing, validation, or I/O.
///
/// # Panics
///
/// This type never panics.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// TOML parsing failed.
    #[error("Parse error in {file}: {source}")]
    Parse {
        /// Path of the file that failed to parse.
        file: String,
        /// Underlying TOML deserialization error.
        #[source]
        source: toml::de::Error,
    },

    /// One or more semantic validation rules failed.
    #[error("Validation failed: {0}")]
    Validation(String),

    /// A specific field has an out-of-range or contradictory value.
    #[error("Field '{field}' has invalid value {value}: {reason}")]
    InvalidField {
        /// Dot-separated field path (e.g., "server.port").
        field: String,
        /// String representation of the invalid value.
        value: String,
        /// Human-readable explanation of the constraint.
        reason: String,
    },

    /// File I/O error.
    #[error("IO error reading {file}: {source}")]
    Io {
        /// Path of the file that could not be read.
        file: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
}

/// Validate all semantic constraints on a [`ServiceConfig`].
///
/// Collects every violation before returning so the caller sees the full
/// scope of issues at once.
///
/// # Arguments
///
/// * `config` — The parsed config to validate.
///
/// # Returns
///
/// - `Ok(())` if all constraints pass.
/// - `Err(Vec<ConfigError>)` with every violation found.
///
/// # Panics
///
/// This function never panics.
pub fn validate(config: &ServiceConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();

    // ── Service identity ─────────────────────────────────────────────
    if config.service.name.trim().is_empty() {
        errors.push(ConfigError::InvalidField {
            field: "service.name".into(),
            value: String::new(),
            reason: "service name must not be empty".into(),
        });
    }

    if config.service.version.trim().is_empty() {
        errors.push(ConfigError::InvalidField {
            field: "service.version".into(),
            value: String::new(),
            reason: "service version must not be empty".into(),
        });
    }

    // ── Listener ─────────────────────────────────────────────────────
    if config.server.host.trim().is_empty() {
        errors.push(ConfigError::InvalidField {
            field: "server.host".into(),
            value: String::new(),
            reason: "listen host must not be empty".into(),
        });
    }

    if config.server.port == 0 {
        errors.push(ConfigError::InvalidField {
            field: "server.port".into(),
            value: "0".into(),
            reason: "port 0 would bind an arbitrary port; pick one".into(),
        });
    }

    if config.server.max_request_size == 0 {
        errors.push(ConfigError::InvalidField {
            field: "server.max_request_size".into(),
            value: "0".into(),
            reason: "must accept at least 1 byte".into(),
        });
    }

    // ── Artifacts ────────────────────────────────────────────────────
    if config.artifacts.model_path.trim().is_empty() {
        errors.push(ConfigError::InvalidField {
            field: "artifacts.model_path".into(),
            value: String::new(),
            reason: "model artifact path must not be empty".into(),
        });
    }

    if config.artifacts.encoders_path.trim().is_empty() {
        errors.push(ConfigError::InvalidField {
            field: "artifacts.encoders_path".into(),
            value: String::new(),
            reason: "encoders artifact path must not be empty".into(),
        });
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
