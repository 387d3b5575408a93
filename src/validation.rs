//! Consistency Validator - Rule/Policy Separation
//!
//! Rules produce structured violations. The validator collects every
//! violation before reporting; it never stops at the first one.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::manifest::{ChangeFrequency, Manifest, Port};
use crate::resolver::placeholders;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ViolationSeverity {
    Error,
    Warning,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationViolation {
    pub rule: String,
    pub severity: ViolationSeverity,
    pub message: String,
    pub expected: Option<String>,
    pub actual: Option<String>,
    pub remediation: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationResult {
    pub valid: bool,
    pub violations: Vec<ValidationViolation>,
}

impl ValidationResult {
    pub fn has_errors(&self) -> bool {
        self.violations
            .iter()
            .any(|v| v.severity == ViolationSeverity::Error)
    }

    /// One line per violation, for error streams.
    pub fn report(&self) -> Vec<String> {
        self.violations
            .iter()
            .map(|v| format!("{}: {}", v.rule, v.message))
            .collect()
    }
}

/// Consistency rule - inspects the whole manifest, emits violations.
pub trait ValidationRule {
    fn name(&self) -> &'static str;
    fn check(&self, manifest: &Manifest) -> Vec<ValidationViolation>;
}

// --- Concrete Rules ---

/// Ports referenced from the command must be declared; declared ports
/// nobody references are flagged as warnings.
pub struct PortReferenceRule;

impl PortReferenceRule {
    /// Ports the command references via `${NAME}` bindings whose value
    /// converts to a port. Only these count as port references; a literal
    /// numeric argument may just be a retry count or a sleep duration.
    fn placeholder_ports(manifest: &Manifest) -> BTreeSet<Port> {
        let mut ports = BTreeSet::new();
        for token in &manifest.command {
            for name in placeholders(token) {
                if let Some(value) = manifest.environment.get(name) {
                    if let Some(port) = Port::from_env_value(value) {
                        ports.insert(port);
                    }
                }
            }
        }
        ports
    }

    /// Literal command tokens that happen to look like ports. Too ambiguous
    /// to treat as references, but enough to suppress the unreferenced-port
    /// warning for a port the command plainly mentions.
    fn literal_ports(manifest: &Manifest) -> BTreeSet<Port> {
        manifest
            .command
            .iter()
            .filter_map(|token| Port::from_env_value(token))
            .collect()
    }
}

impl ValidationRule for PortReferenceRule {
    fn name(&self) -> &'static str {
        "port_reference"
    }

    fn check(&self, manifest: &Manifest) -> Vec<ValidationViolation> {
        let mut violations = vec![];
        let referenced = Self::placeholder_ports(manifest);

        for port in &referenced {
            if !manifest.exposed_ports.contains(port) {
                violations.push(ValidationViolation {
                    rule: self.name().to_string(),
                    severity: ViolationSeverity::Error,
                    message: format!("Command references port {port} which is not exposed"),
                    expected: Some(format!("{port} listed in exposedPorts")),
                    actual: Some(format!(
                        "exposedPorts = [{}]",
                        manifest
                            .exposed_ports
                            .iter()
                            .map(Port::to_string)
                            .collect::<Vec<_>>()
                            .join(", ")
                    )),
                    remediation: vec![format!("Add {port} to exposedPorts")],
                });
            }
        }

        let mentioned: BTreeSet<Port> = referenced
            .union(&Self::literal_ports(manifest))
            .copied()
            .collect();
        for port in &manifest.exposed_ports {
            if !mentioned.contains(port) {
                violations.push(ValidationViolation {
                    rule: self.name().to_string(),
                    severity: ViolationSeverity::Warning,
                    message: format!("Exposed port {port} is never referenced by the command"),
                    expected: Some("every exposed port reachable from the startup command".into()),
                    actual: Some(format!("{port} unreferenced")),
                    remediation: vec![format!(
                        "Remove {port} from exposedPorts or reference it from the command"
                    )],
                });
            }
        }

        violations
    }
}

/// Container-side mount targets must be pairwise distinct.
pub struct VolumeTargetRule;

impl ValidationRule for VolumeTargetRule {
    fn name(&self) -> &'static str {
        "volume_target"
    }

    fn check(&self, manifest: &Manifest) -> Vec<ValidationViolation> {
        let mut seen = BTreeSet::new();
        let mut violations = vec![];
        for mount in &manifest.volumes {
            if !seen.insert(mount.target.as_str()) {
                violations.push(ValidationViolation {
                    rule: self.name().to_string(),
                    severity: ViolationSeverity::Error,
                    message: format!("Duplicate volume target '{}'", mount.target),
                    expected: Some("distinct container-side paths per mount".into()),
                    actual: Some(mount.target.clone()),
                    remediation: vec!["Give each volume a unique container path".to_string()],
                });
            }
        }
        violations
    }
}

/// The working directory must be absolute.
pub struct WorkdirRule;

impl ValidationRule for WorkdirRule {
    fn name(&self) -> &'static str {
        "working_directory"
    }

    fn check(&self, manifest: &Manifest) -> Vec<ValidationViolation> {
        if manifest.working_directory.starts_with('/') {
            return vec![];
        }
        vec![ValidationViolation {
            rule: self.name().to_string(),
            severity: ViolationSeverity::Error,
            message: "Working directory must be an absolute path".to_string(),
            expected: Some("path starting with '/'".into()),
            actual: Some(manifest.working_directory.clone()),
            remediation: vec!["Use an absolute container path such as /app".to_string()],
        }]
    }
}

/// Dependency steps must be declared least-frequently-changing first.
/// The planner trusts this ordering; it is the cache-reuse contract.
pub struct DependencyOrderRule;

impl ValidationRule for DependencyOrderRule {
    fn name(&self) -> &'static str {
        "dependency_order"
    }

    fn check(&self, manifest: &Manifest) -> Vec<ValidationViolation> {
        let mut violations = vec![];
        let mut last = ChangeFrequency::Low;
        for (index, step) in manifest.dependency_steps.iter().enumerate() {
            if step.change_frequency < last {
                violations.push(ValidationViolation {
                    rule: self.name().to_string(),
                    severity: ViolationSeverity::Error,
                    message: format!(
                        "Dependency step {index} has change frequency {:?} after a {:?} step",
                        step.change_frequency, last
                    ),
                    expected: Some("non-decreasing change frequency".into()),
                    actual: Some(format!("{:?} after {:?}", step.change_frequency, last)),
                    remediation: vec![
                        "Reorder dependency steps from least to most frequently changing"
                            .to_string(),
                    ],
                });
            }
            last = step.change_frequency;
        }
        violations
    }
}

/// Validator orchestrates rules; all violations are collected and
/// reported together.
pub struct Validator {
    rules: Vec<Box<dyn ValidationRule>>,
}

impl Validator {
    pub fn new() -> Self {
        Self {
            rules: vec![
                Box::new(PortReferenceRule),
                Box::new(VolumeTargetRule),
                Box::new(WorkdirRule),
                Box::new(DependencyOrderRule),
            ],
        }
    }

    pub fn validate(&self, manifest: &Manifest) -> ValidationResult {
        let mut violations = vec![];
        for rule in &self.rules {
            violations.extend(rule.check(manifest));
        }

        let has_errors = violations
            .iter()
            .any(|v| v.severity == ViolationSeverity::Error);

        ValidationResult {
            valid: !has_errors,
            violations,
        }
    }
}

impl Default for Validator {
    fn default() -> Self {
        Self::new()
    }
}
