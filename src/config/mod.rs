//! # Stage: Declarative Service Configuration
//!
//! ## Responsibility
//! Parse and validate TOML service configuration files. Operators point the
//! binary at a file with:
//! ```text
//! cargo run -- --config service.toml
//! ```
//! and get the same service every time, or a startup error listing exactly
//! what is wrong.
//!
//! ## Guarantees
//! - Deterministic: same TOML input always produces the same `ServiceConfig`
//! - Validated: all semantic constraints are checked before a config is accepted
//! - Zero-config: every server and artifact field has a documented default
//! - Schema-exportable: JSON Schema output enables IDE autocomplete
//!
//! ## NOT Responsible For
//! - Loading the artifacts the config points at (that belongs to `artifact`)
//! - Serving HTTP (that belongs to `web_api`)
//! - Metrics collection (that belongs to `metrics`)

pub mod loader;
pub mod validation;

pub use validation::ConfigError;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

// ── Default value functions ──────────────────────────────────────────────

/// Default service name.
fn default_service_name() -> String {
    "emissions-predictor".to_string()
}

/// Default reported version: this crate's version.
fn default_service_version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}

/// Default listen host: all interfaces, for container deployments.
fn default_host() -> String {
    "0.0.0.0".to_string()
}

/// Default listen port.
fn default_port() -> u16 {
    8080
}

/// Default request body cap: 1 MiB. Predict payloads are a few hundred
/// bytes; anything near the cap is abuse or a client bug.
fn default_max_request_size() -> usize {
    1024 * 1024
}

/// Default model artifact path.
fn default_model_path() -> String {
    "artifacts/co2_model.json".to_string()
}

/// Default encoders artifact path.
fn default_encoders_path() -> String {
    "artifacts/encoders.json".to_string()
}

// ── Top-level config ─────────────────────────────────────────────────────

/// Root configuration for a service instance.
///
/// Deserialized from a TOML file and validated before use. Every field has
/// either a required value or a documented default; [`Default`] gives a
/// complete runnable configuration for the no-file case.
///
/// # Example
///
/// ```toml
/// [service]
/// name = "co2-emissions"
/// version = "1.0"
///
/// [server]
/// port = 8080
///
/// [artifacts]
/// model_path = "artifacts/co2_model.json"
/// ```
///
/// # Panics
///
/// This type never panics during construction or access.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct ServiceConfig {
    /// Service identity and version metadata.
    pub service: ServiceSection,
    /// HTTP listener settings.
    #[serde(default)]
    pub server: ServerConfig,
    /// Startup artifact locations.
    #[serde(default)]
    pub artifacts: ArtifactsConfig,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            service: ServiceSection::default(),
            server: ServerConfig::default(),
            artifacts: ArtifactsConfig::default(),
        }
    }
}

// ── Service identity ─────────────────────────────────────────────────────

/// Service identity and version metadata.
///
/// # Panics
///
/// This type never panics.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct ServiceSection {
    /// Human-readable service name (e.g., "co2-emissions").
    pub name: String,
    /// Semantic version of this configuration (e.g., "1.0").
    pub version: String,
    /// Optional description for documentation purposes.
    pub description: Option<String>,
}

impl Default for ServiceSection {
    fn default() -> Self {
        Self {
            name: default_service_name(),
            version: default_service_version(),
            description: None,
        }
    }
}

// ── HTTP listener ────────────────────────────────────────────────────────

/// HTTP listener settings.
///
/// The `PORT` environment variable, when set, overrides `port` after the
/// file is loaded; see [`loader::apply_env_overrides`].
///
/// # Panics
///
/// This type never panics.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(default)]
pub struct ServerConfig {
    /// Interface to bind (e.g., "0.0.0.0" or "127.0.0.1").
    pub host: String,
    /// TCP port to listen on.
    pub port: u16,
    /// Maximum accepted request body size in bytes.
    pub max_request_size: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            max_request_size: default_max_request_size(),
        }
    }
}

// ── Artifacts ────────────────────────────────────────────────────────────

/// Locations of the startup artifacts, relative to the working directory.
///
/// # Panics
///
/// This type never panics.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(default)]
pub struct ArtifactsConfig {
    /// Path to the regression model artifact (JSON).
    pub model_path: String,
    /// Path to the encoder vocabularies artifact (JSON).
    pub encoders_path: String,
}

impl Default for ArtifactsConfig {
    fn default() -> Self {
        Self {
            model_path: default_model_path(),
            encoders_path: default_encoders_path(),
        }
    }
}

/// Export the JSON Schema for `ServiceConfig`.
///
/// This enables IDE autocomplete when editing TOML config files.
///
/// # Errors
///
/// Returns `serde_json::Error` if schema serialization fails (should not
/// happen with well-formed derive macros).
///
/// # Panics
///
/// This function never panics.
pub fn export_schema() -> Result<String, serde_json::Error> {
    let schema = schemars::schema_for!(ServiceConfig);
    serde_json::to_string_pretty(&schema)
}
