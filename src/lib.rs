//! LayerForge Core - Container Build Specification Compiler
//!
//! # The Five Laws (Non-Negotiable)
//! 1. The Manifest Is Truth
//! 2. Validation Is Protective
//! 3. Low-Churn Layers Come First
//! 4. Deterministic Output
//! 5. Rendering Is All-or-Nothing

pub mod hashing;
pub mod manifest;
pub mod pipeline;
pub mod planner;
pub mod render;
pub mod resolver;
pub mod validation;

pub use manifest::{CompilerConfig, Manifest, ManifestError, Port};
pub use pipeline::{CompilationPipeline, CompileRequest, CompiledBuild, PipelineError};
pub use planner::{plan, BuildPlan, PlanAction, PlanStep};
pub use render::{render, OrchestrationManifest, RenderMode, RenderedArtifact};
pub use resolver::{resolve, ResolveError};
pub use validation::{ValidationResult, ValidationRule, ValidationViolation, ViolationSeverity};

pub const ENGINE_VERSION: &str = env!("CARGO_PKG_VERSION");
