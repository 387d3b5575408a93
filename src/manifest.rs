//! Manifest Model - Declarative Build Input
//!
//! The manifest is parsed once, normalized, and never mutated afterwards.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("Malformed manifest document: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid runtime version '{0}': not a semantic version")]
    InvalidRuntimeVersion(String),

    #[error("Duplicate environment key: {0}")]
    DuplicateEnvironmentKey(String),

    #[error("Malformed environment entry '{0}': expected NAME=value")]
    MalformedEnvironmentEntry(String),

    #[error("Duplicate exposed port: {0}")]
    DuplicatePort(u16),

    #[error("Port {0} out of range: must be in 1..=65535")]
    PortOutOfRange(u64),

    #[error("Command must not be empty")]
    EmptyCommand,
}

/// A network port with the valid range enforced at construction.
///
/// Ports are a distinct typed quantity, never interchangeable with the
/// free-form environment strings they may be substituted from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Port(u16);

impl Port {
    pub fn new(raw: u64) -> Result<Self, ManifestError> {
        if raw == 0 || raw > u16::MAX as u64 {
            return Err(ManifestError::PortOutOfRange(raw));
        }
        Ok(Self(raw as u16))
    }

    /// Checked conversion from an environment-variable value. Returns None
    /// when the string is not a port at all; out-of-range numerics are also
    /// None because such a value can never satisfy a port reference.
    pub fn from_env_value(value: &str) -> Option<Self> {
        let n: u64 = value.trim().parse().ok()?;
        Self::new(n).ok()
    }

    pub fn number(&self) -> u16 {
        self.0
    }
}

impl fmt::Display for Port {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeFrequency {
    Low,
    Medium,
    High,
}

impl Default for ChangeFrequency {
    fn default() -> Self {
        Self::Medium
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DependencyKind {
    SystemPackage,
    LanguagePackage,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DependencyStep {
    pub kind: DependencyKind,
    pub items: Vec<String>,
    #[serde(default)]
    pub change_frequency: ChangeFrequency,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuntimeBase {
    pub name: String,
    pub version: String,
}

impl RuntimeBase {
    /// Full base-image tag, e.g. `python:3.10`.
    pub fn image_tag(&self) -> String {
        format!("{}:{}", self.name, self.version)
    }

    /// Slim variant used for final runtime layers, e.g. `python:3.10-slim`.
    pub fn slim_image_tag(&self) -> String {
        format!("{}:{}-slim", self.name, self.version)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VolumeMount {
    pub source: String,
    pub target: String,
}

/// Process-wide defaults made explicit. Passed into every compilation so
/// concurrent compilations with different defaults never interfere.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompilerConfig {
    pub default_working_directory: String,
    pub default_runtime_version: String,
}

impl Default for CompilerConfig {
    fn default() -> Self {
        Self {
            default_working_directory: "/app".to_string(),
            default_runtime_version: "3.10".to_string(),
        }
    }
}

/// Raw document shape as the embedding application submits it. Environment
/// entries arrive as `NAME=value` strings so duplicate keys are detectable;
/// a JSON object would silently collapse them.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct RawManifest {
    base_runtime: RawRuntime,
    #[serde(default)]
    working_directory: Option<String>,
    #[serde(default)]
    dependency_steps: Vec<DependencyStep>,
    #[serde(default)]
    environment: Vec<String>,
    #[serde(default)]
    exposed_ports: Vec<u64>,
    #[serde(default)]
    volumes: Vec<VolumeMount>,
    #[serde(default)]
    command: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawRuntime {
    name: String,
    #[serde(default)]
    version: Option<String>,
}

/// The validated, normalized compilation input.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Manifest {
    pub base_runtime: RuntimeBase,
    pub working_directory: String,
    pub dependency_steps: Vec<DependencyStep>,
    pub environment: BTreeMap<String, String>,
    pub exposed_ports: Vec<Port>,
    pub volumes: Vec<VolumeMount>,
    pub command: Vec<String>,
}

impl Manifest {
    /// Parse a raw JSON manifest document and normalize defaults.
    ///
    /// Fail-fast: the first structural defect aborts the parse. Cross-field
    /// consistency is the validator's job and is collected, not short-circuited.
    pub fn parse(raw: &str, config: &CompilerConfig) -> Result<Self, ManifestError> {
        let raw: RawManifest = serde_json::from_str(raw)?;
        Self::from_raw(raw, config)
    }

    fn from_raw(raw: RawManifest, config: &CompilerConfig) -> Result<Self, ManifestError> {
        let version = raw
            .base_runtime
            .version
            .unwrap_or_else(|| config.default_runtime_version.clone());
        check_runtime_version(&version)?;

        let mut environment = BTreeMap::new();
        for entry in &raw.environment {
            let (name, value) = entry
                .split_once('=')
                .ok_or_else(|| ManifestError::MalformedEnvironmentEntry(entry.clone()))?;
            if name.is_empty() {
                return Err(ManifestError::MalformedEnvironmentEntry(entry.clone()));
            }
            if environment
                .insert(name.to_string(), value.to_string())
                .is_some()
            {
                return Err(ManifestError::DuplicateEnvironmentKey(name.to_string()));
            }
        }

        let mut exposed_ports = Vec::with_capacity(raw.exposed_ports.len());
        for raw_port in raw.exposed_ports {
            let port = Port::new(raw_port)?;
            if exposed_ports.contains(&port) {
                return Err(ManifestError::DuplicatePort(port.number()));
            }
            exposed_ports.push(port);
        }

        if raw.command.is_empty() {
            return Err(ManifestError::EmptyCommand);
        }

        Ok(Self {
            base_runtime: RuntimeBase {
                name: raw.base_runtime.name,
                version,
            },
            working_directory: raw
                .working_directory
                .unwrap_or_else(|| config.default_working_directory.clone()),
            dependency_steps: raw.dependency_steps,
            environment,
            exposed_ports,
            volumes: raw.volumes,
            command: raw.command,
        })
    }
}

/// Base runtime versions are dotted prefixes of a semantic version
/// (`3.10`, `3.10.2`). Zero-pad before handing to the semver parser; the
/// stored string keeps its declared form.
fn check_runtime_version(version: &str) -> Result<(), ManifestError> {
    if version.is_empty() {
        return Err(ManifestError::InvalidRuntimeVersion(version.to_string()));
    }
    let padded = match version.matches('.').count() {
        0 => format!("{version}.0.0"),
        1 => format!("{version}.0"),
        _ => version.to_string(),
    };
    semver::Version::parse(&padded)
        .map(|_| ())
        .map_err(|_| ManifestError::InvalidRuntimeVersion(version.to_string()))
}
