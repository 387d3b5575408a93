//! Compilation Pipeline - Single Entry Point
//!
//! CRITICAL: compile MUST call validate internally. No bypass. Rendering is
//! all-or-nothing; a manifest with error-severity violations produces no
//! artifact text at all.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;
use uuid::Uuid;

use crate::hashing::{compute_build_hash, compute_manifest_hash};
use crate::manifest::{CompilerConfig, Manifest, ManifestError};
use crate::planner::{plan, resolve_plan};
use crate::render::{render, OrchestrationManifest, RenderMode, RenderedArtifact};
use crate::resolver::ResolveError;
use crate::validation::{ValidationResult, Validator};
use crate::ENGINE_VERSION;

#[cfg(feature = "test-hooks")]
use std::sync::atomic::{AtomicU32, Ordering};

#[cfg(feature = "test-hooks")]
static VALIDATION_CALL_COUNT: AtomicU32 = AtomicU32::new(0);

#[cfg(feature = "test-hooks")]
pub fn get_validation_call_count() -> u32 {
    VALIDATION_CALL_COUNT.load(Ordering::SeqCst)
}

#[cfg(feature = "test-hooks")]
pub fn reset_validation_call_count() {
    VALIDATION_CALL_COUNT.store(0, Ordering::SeqCst);
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Manifest error: {0}")]
    Manifest(#[from] ManifestError),

    #[error("Validation failed: {}", .0.report().join("; "))]
    ValidationFailed(ValidationResult),

    #[error("Variable resolution failed: {0}")]
    Unresolved(#[from] ResolveError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Orchestration manifest error: {0}")]
    Orchestration(#[from] serde_yaml_ng::Error),

    #[error("Failed to write artifacts: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone, Serialize)]
pub struct CompileRequest {
    pub manifest: Manifest,
    pub mode: RenderMode,
}

/// The persisted output of one compilation: rendered artifacts plus the
/// provenance needed to reproduce them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompiledBuild {
    pub id: String,
    pub engine_version: String,
    pub created_at: DateTime<Utc>,
    pub manifest_hash: String,
    pub build_hash: String,
    pub validation: ValidationResult,
    pub artifact: RenderedArtifact,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub orchestration: Option<String>,
}

impl CompiledBuild {
    /// Persist the build script (and orchestration manifest, when present)
    /// under `dir`.
    pub fn write_to(&self, dir: &Path) -> Result<(), PipelineError> {
        fs::create_dir_all(dir)?;
        fs::write(dir.join("Dockerfile"), &self.artifact.text)?;
        if let Some(orchestration) = &self.orchestration {
            fs::write(dir.join("compose.yaml"), orchestration)?;
        }
        Ok(())
    }
}

/// The compilation pipeline - single entry point for all build operations.
///
/// Each compilation is a pure function of its request; the pipeline holds
/// only configuration and may be shared freely across threads.
pub struct CompilationPipeline {
    config: CompilerConfig,
    validator: Validator,
}

impl CompilationPipeline {
    pub fn new(config: CompilerConfig) -> Self {
        Self {
            config,
            validator: Validator::new(),
        }
    }

    pub fn config(&self) -> &CompilerConfig {
        &self.config
    }

    /// Parse a raw manifest document with this pipeline's defaults.
    pub fn parse_manifest(&self, raw: &str) -> Result<Manifest, ManifestError> {
        Manifest::parse(raw, &self.config)
    }

    /// Cross-check a manifest for internal consistency.
    ///
    /// This is the ONLY validation entry point. All violations are collected.
    pub fn validate_manifest(&self, manifest: &Manifest) -> ValidationResult {
        #[cfg(feature = "test-hooks")]
        VALIDATION_CALL_COUNT.fetch_add(1, Ordering::SeqCst);

        self.validator.validate(manifest)
    }

    /// Compile a manifest into rendered artifacts.
    ///
    /// CRITICAL: This ALWAYS calls validate_manifest internally. No bypass
    /// possible. Error-severity violations abort before planning.
    pub fn compile(&self, request: &CompileRequest) -> Result<CompiledBuild, PipelineError> {
        // MANDATORY: validation is always called. This is non-negotiable.
        let validation = self.validate_manifest(&request.manifest);
        if validation.has_errors() {
            return Err(PipelineError::ValidationFailed(validation));
        }

        let build_plan = plan(&request.manifest);
        let build_plan = resolve_plan(build_plan, &request.manifest.environment)?;
        let artifact = render(&build_plan, request.mode);

        let orchestration = match OrchestrationManifest::for_manifest(&request.manifest) {
            Some(orchestration) => Some(orchestration.to_yaml()?),
            None => None,
        };

        let manifest_hash = compute_manifest_hash(&request.manifest)?;
        let build_hash =
            compute_build_hash(&manifest_hash, &request.mode, &build_plan, ENGINE_VERSION)?;

        Ok(CompiledBuild {
            id: Uuid::new_v4().to_string(),
            engine_version: ENGINE_VERSION.to_string(),
            created_at: Utc::now(),
            manifest_hash,
            build_hash,
            validation,
            artifact,
            orchestration,
        })
    }
}

impl Default for CompilationPipeline {
    fn default() -> Self {
        Self::new(CompilerConfig::default())
    }
}
