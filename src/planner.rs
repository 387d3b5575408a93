//! Layer Planner - Cache-Optimal Step Ordering
//!
//! The planner does not reorder dependency steps; their declared order is the
//! cache contract the validator already enforced. It inserts the structural
//! steps around them: base image first, source copy after every install,
//! environment, ports, and the startup command last.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::manifest::{DependencyKind, Manifest, Port, RuntimeBase};
use crate::resolver::{resolve, ResolveError};

/// Action kind of a plan step, independent of its payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanAction {
    CopyBase,
    Install,
    CopySource,
    SetEnv,
    Expose,
    Run,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "action", content = "payload")]
pub enum PlanStep {
    CopyBase {
        runtime: RuntimeBase,
        working_directory: String,
    },
    Install {
        kind: DependencyKind,
        items: Vec<String>,
    },
    CopySource,
    SetEnv {
        name: String,
        value: String,
    },
    Expose {
        port: Port,
    },
    Run {
        command: Vec<String>,
    },
}

impl PlanStep {
    pub fn action(&self) -> PlanAction {
        match self {
            Self::CopyBase { .. } => PlanAction::CopyBase,
            Self::Install { .. } => PlanAction::Install,
            Self::CopySource => PlanAction::CopySource,
            Self::SetEnv { .. } => PlanAction::SetEnv,
            Self::Expose { .. } => PlanAction::Expose,
            Self::Run { .. } => PlanAction::Run,
        }
    }
}

/// Immutable ordered build plan. Derived from a manifest, consumed by the
/// renderer, then discarded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildPlan {
    pub steps: Vec<PlanStep>,
}

impl BuildPlan {
    pub fn actions(&self) -> Vec<PlanAction> {
        self.steps.iter().map(PlanStep::action).collect()
    }
}

/// Derive the total step order from a validated manifest.
///
/// Deterministic: environment entries come from an ordered map, ports and
/// dependency steps keep their declared order.
pub fn plan(manifest: &Manifest) -> BuildPlan {
    let mut steps = Vec::with_capacity(
        4 + manifest.dependency_steps.len()
            + manifest.environment.len()
            + manifest.exposed_ports.len(),
    );

    steps.push(PlanStep::CopyBase {
        runtime: manifest.base_runtime.clone(),
        working_directory: manifest.working_directory.clone(),
    });

    for dep in &manifest.dependency_steps {
        steps.push(PlanStep::Install {
            kind: dep.kind,
            items: dep.items.clone(),
        });
    }

    // Source changes most often, so it lands after every install layer.
    steps.push(PlanStep::CopySource);

    for (name, value) in &manifest.environment {
        steps.push(PlanStep::SetEnv {
            name: name.clone(),
            value: value.clone(),
        });
    }

    for port in &manifest.exposed_ports {
        steps.push(PlanStep::Expose { port: *port });
    }

    steps.push(PlanStep::Run {
        command: manifest.command.clone(),
    });

    BuildPlan { steps }
}

/// Expand placeholders in the startup command against the environment.
/// Runs between planning and rendering; every other payload is literal.
pub fn resolve_plan(
    plan: BuildPlan,
    environment: &BTreeMap<String, String>,
) -> Result<BuildPlan, ResolveError> {
    let steps = plan
        .steps
        .into_iter()
        .map(|step| match step {
            PlanStep::Run { command } => {
                let command = command
                    .iter()
                    .map(|token| resolve(token, environment))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(PlanStep::Run { command })
            }
            other => Ok(other),
        })
        .collect::<Result<Vec<_>, ResolveError>>()?;

    Ok(BuildPlan { steps })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifest::{CompilerConfig, Manifest};

    fn manifest() -> Manifest {
        Manifest::parse(
            r#"{
                "baseRuntime": {"name": "python", "version": "3.10"},
                "dependencySteps": [
                    {"kind": "system_package", "items": ["gcc"], "changeFrequency": "low"},
                    {"kind": "language_package", "items": ["pandas", "numpy"]}
                ],
                "environment": ["PORT=8501"],
                "exposedPorts": [8501],
                "command": ["run", "app.py", "--port", "${PORT}"]
            }"#,
            &CompilerConfig::default(),
        )
        .unwrap()
    }

    #[test]
    fn test_plan_step_order() {
        let plan = plan(&manifest());
        assert_eq!(
            plan.actions(),
            vec![
                PlanAction::CopyBase,
                PlanAction::Install,
                PlanAction::Install,
                PlanAction::CopySource,
                PlanAction::SetEnv,
                PlanAction::Expose,
                PlanAction::Run,
            ]
        );
    }

    #[test]
    fn test_resolve_plan_expands_only_run() {
        let m = manifest();
        let resolved = resolve_plan(plan(&m), &m.environment).unwrap();
        match resolved.steps.last().unwrap() {
            PlanStep::Run { command } => {
                assert_eq!(command, &["run", "app.py", "--port", "8501"]);
            }
            other => panic!("expected Run, got {other:?}"),
        }
        match &resolved.steps[4] {
            PlanStep::SetEnv { name, value } => {
                assert_eq!(name, "PORT");
                assert_eq!(value, "8501");
            }
            other => panic!("expected SetEnv, got {other:?}"),
        }
    }
}
