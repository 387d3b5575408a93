//! Artifact Renderer - Plan to Text
//!
//! One directive line per plan step. Multi-stage mode splits the plan into a
//! builder stage and a slim runtime stage; the runtime-facing directives
//! (ENV/EXPOSE/CMD) appear exactly once, never in the builder.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::manifest::{DependencyKind, Manifest};
use crate::planner::{BuildPlan, PlanStep};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RenderMode {
    SingleStage,
    MultiStage,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenderedArtifact {
    pub kind: RenderMode,
    pub text: String,
}

/// Render the plan as a build script in the requested mode.
pub fn render(plan: &BuildPlan, mode: RenderMode) -> RenderedArtifact {
    let text = match mode {
        RenderMode::SingleStage => render_single_stage(plan),
        RenderMode::MultiStage => render_multi_stage(plan),
    };
    RenderedArtifact { kind: mode, text }
}

fn render_single_stage(plan: &BuildPlan) -> String {
    let mut lines = Vec::new();
    for step in &plan.steps {
        match step {
            PlanStep::CopyBase {
                runtime,
                working_directory,
            } => {
                lines.push(format!("FROM {}", runtime.slim_image_tag()));
                lines.push(format!("WORKDIR {working_directory}"));
            }
            other => lines.push(directive(other)),
        }
    }
    finish(lines)
}

fn render_multi_stage(plan: &BuildPlan) -> String {
    let mut builder = Vec::new();
    let mut runtime_stage = Vec::new();
    let mut base = None;

    for step in &plan.steps {
        match step {
            PlanStep::CopyBase {
                runtime,
                working_directory,
            } => {
                builder.push(format!("FROM {} AS builder", runtime.image_tag()));
                builder.push(format!("WORKDIR {working_directory}"));
                base = Some((runtime.clone(), working_directory.clone()));
            }
            PlanStep::Install { .. } | PlanStep::CopySource => {
                builder.push(directive(step));
            }
            PlanStep::SetEnv { .. } | PlanStep::Expose { .. } | PlanStep::Run { .. } => {
                runtime_stage.push(directive(step));
            }
        }
    }

    let mut lines = builder;
    lines.push(String::new());
    if let Some((runtime, workdir)) = base {
        lines.push(format!("FROM {}", runtime.slim_image_tag()));
        lines.push(format!("WORKDIR {workdir}"));
        // Installed dependency closure plus the application tree; build
        // toolchains stay behind in the builder stage.
        lines.push("COPY --from=builder /usr/local /usr/local".to_string());
        lines.push(format!("COPY --from=builder {workdir} {workdir}"));
    }
    lines.extend(runtime_stage);
    finish(lines)
}

/// Line-level mapping from plan step to emitted directive.
fn directive(step: &PlanStep) -> String {
    match step {
        PlanStep::CopyBase { .. } => unreachable!("base step rendered per stage"),
        PlanStep::Install { kind, items } => match kind {
            DependencyKind::SystemPackage => format!(
                "RUN apt-get update && apt-get install -y {}",
                items.join(" ")
            ),
            DependencyKind::LanguagePackage => {
                format!("RUN pip install --no-cache-dir {}", items.join(" "))
            }
        },
        PlanStep::CopySource => "COPY . .".to_string(),
        PlanStep::SetEnv { name, value } => {
            // A bare value with whitespace would parse as further ENV pairs.
            if value.chars().any(char::is_whitespace) {
                format!("ENV {name}={}", serde_json::to_string(value).unwrap_or_else(|_| format!("\"{value}\"")))
            } else {
                format!("ENV {name}={value}")
            }
        }
        PlanStep::Expose { port } => format!("EXPOSE {port}"),
        PlanStep::Run { command } => {
            let tokens: Vec<String> = command
                .iter()
                .map(|t| serde_json::to_string(t).unwrap_or_else(|_| format!("\"{t}\"")))
                .collect();
            format!("CMD [{}]", tokens.join(", "))
        }
    }
}

fn finish(lines: Vec<String>) -> String {
    let mut text = lines.join("\n");
    text.push('\n');
    text
}

// --- Orchestration manifest ---

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestrationManifest {
    pub services: BTreeMap<String, ServiceSpec>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceSpec {
    pub build: String,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub ports: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub volumes: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub environment: Vec<String>,
}

impl OrchestrationManifest {
    /// A manifest with volumes or more than one exposed port is assumed to
    /// benefit from an orchestration description; anything simpler gets none.
    pub fn for_manifest(manifest: &Manifest) -> Option<Self> {
        if manifest.volumes.is_empty() && manifest.exposed_ports.len() <= 1 {
            return None;
        }

        let service = ServiceSpec {
            build: ".".to_string(),
            ports: manifest
                .exposed_ports
                .iter()
                .map(|p| format!("{p}:{p}"))
                .collect(),
            volumes: manifest
                .volumes
                .iter()
                .map(|v| format!("{}:{}", v.source, v.target))
                .collect(),
            environment: manifest
                .environment
                .iter()
                .map(|(k, v)| format!("{k}={v}"))
                .collect(),
        };

        let mut services = BTreeMap::new();
        services.insert("app".to_string(), service);
        Some(Self { services })
    }

    pub fn to_yaml(&self) -> Result<String, serde_yaml_ng::Error> {
        serde_yaml_ng::to_string(self)
    }
}
