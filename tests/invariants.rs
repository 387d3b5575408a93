//! Contract Invariant Tests
//!
//! These tests verify the non-negotiable guarantees.

use layerforge_core::{
    planner, CompilationPipeline, CompileRequest, CompilerConfig, Manifest, PipelineError,
    PlanAction, RenderMode, ViolationSeverity,
};

fn streamlit_manifest() -> Manifest {
    Manifest::parse(
        r#"{
            "baseRuntime": {"name": "python", "version": "3.10"},
            "dependencySteps": [
                {"kind": "system_package", "items": ["gcc"], "changeFrequency": "low"},
                {"kind": "language_package", "items": ["pandas", "numpy"], "changeFrequency": "medium"}
            ],
            "environment": ["PORT=8501"],
            "exposedPorts": [8501],
            "command": ["run", "app.py", "--port", "${PORT}"]
        }"#,
        &CompilerConfig::default(),
    )
    .unwrap()
}

fn compile(manifest: Manifest, mode: RenderMode) -> layerforge_core::CompiledBuild {
    let pipeline = CompilationPipeline::default();
    pipeline
        .compile(&CompileRequest { manifest, mode })
        .unwrap()
}

#[test]
fn invariant_rendering_is_deterministic() {
    // Same manifest, repeated compilation: byte-identical artifact text
    // and identical build hash.
    let b1 = compile(streamlit_manifest(), RenderMode::SingleStage);
    let b2 = compile(streamlit_manifest(), RenderMode::SingleStage);
    assert_eq!(b1.artifact.text, b2.artifact.text);
    assert_eq!(b1.manifest_hash, b2.manifest_hash);
    assert_eq!(b1.build_hash, b2.build_hash);

    let m1 = compile(streamlit_manifest(), RenderMode::MultiStage);
    let m2 = compile(streamlit_manifest(), RenderMode::MultiStage);
    assert_eq!(m1.artifact.text, m2.artifact.text);

    // Mode participates in the build hash.
    assert_ne!(b1.build_hash, m1.build_hash);
}

#[test]
fn invariant_plan_step_ordering() {
    let plan = planner::plan(&streamlit_manifest());
    let actions = plan.actions();

    let last_install = actions
        .iter()
        .rposition(|a| *a == PlanAction::Install)
        .unwrap();
    let copy_source = actions
        .iter()
        .position(|a| *a == PlanAction::CopySource)
        .unwrap();
    let first_runtime = actions
        .iter()
        .position(|a| matches!(a, PlanAction::SetEnv | PlanAction::Expose | PlanAction::Run))
        .unwrap();

    assert!(last_install < copy_source);
    assert!(copy_source < first_runtime);
    assert_eq!(actions.last(), Some(&PlanAction::Run));
}

#[test]
fn invariant_round_trip_port_consistency() {
    let build = compile(streamlit_manifest(), RenderMode::SingleStage);
    let text = &build.artifact.text;

    // The resolved RUN directive and the EXPOSE directive carry the same
    // literal port.
    assert!(text.contains("EXPOSE 8501"));
    assert!(text.lines().last().unwrap().contains("8501"));
    assert!(!text.contains("${PORT}"));
}

#[test]
fn invariant_port_mismatch_caught_before_rendering() {
    // Command references port 9000 via ${PORT}; only 8501 is exposed.
    let manifest = Manifest::parse(
        r#"{
            "baseRuntime": {"name": "python", "version": "3.10"},
            "environment": ["PORT=9000"],
            "exposedPorts": [8501],
            "command": ["run", "app.py", "--port", "${PORT}"]
        }"#,
        &CompilerConfig::default(),
    )
    .unwrap();

    let pipeline = CompilationPipeline::default();
    let err = pipeline
        .compile(&CompileRequest {
            manifest,
            mode: RenderMode::SingleStage,
        })
        .unwrap_err();

    match err {
        PipelineError::ValidationFailed(result) => {
            assert!(result
                .report()
                .iter()
                .any(|line| line.contains("9000")));
        }
        other => panic!("expected ValidationFailed, got {other}"),
    }
}

#[test]
fn invariant_validator_collects_all_violations() {
    // Two independent defects: an exposed-but-unreferenced port and a
    // duplicate volume target. Both must be reported together.
    let manifest = Manifest::parse(
        r#"{
            "baseRuntime": {"name": "python", "version": "3.10"},
            "exposedPorts": [9999],
            "volumes": [
                {"source": "./data", "target": "/data"},
                {"source": "./cache", "target": "/data"}
            ],
            "command": ["run", "app.py"]
        }"#,
        &CompilerConfig::default(),
    )
    .unwrap();

    let pipeline = CompilationPipeline::default();
    let result = pipeline.validate_manifest(&manifest);

    let rules: Vec<&str> = result.violations.iter().map(|v| v.rule.as_str()).collect();
    assert!(rules.contains(&"port_reference"));
    assert!(rules.contains(&"volume_target"));

    // The duplicate target is an error; the unreferenced port a warning.
    assert!(!result.valid);
    assert!(result
        .violations
        .iter()
        .any(|v| v.rule == "volume_target" && v.severity == ViolationSeverity::Error));
    assert!(result
        .violations
        .iter()
        .any(|v| v.rule == "port_reference" && v.severity == ViolationSeverity::Warning));
}

#[test]
fn invariant_multi_stage_matches_single_stage_runtime_directives() {
    let single = compile(streamlit_manifest(), RenderMode::SingleStage);
    let multi = compile(streamlit_manifest(), RenderMode::MultiStage);

    let runtime_lines = |text: &str| -> Vec<String> {
        text.lines()
            .filter(|l| {
                l.starts_with("ENV ") || l.starts_with("EXPOSE ") || l.starts_with("CMD ")
            })
            .map(String::from)
            .collect()
    };
    assert_eq!(
        runtime_lines(&single.artifact.text),
        runtime_lines(&multi.artifact.text)
    );

    // Install steps live exclusively in the builder stage.
    let stages: Vec<&str> = multi.artifact.text.split("\n\n").collect();
    assert_eq!(stages.len(), 2);
    assert!(stages[0].contains("RUN apt-get"));
    assert!(stages[0].contains("RUN pip install"));
    assert!(!stages[1].contains("apt-get"));
    assert!(!stages[1].contains("pip install"));
}

#[test]
fn invariant_unresolved_variable_fails_loudly() {
    // ${APP_MODE} has no environment binding. Resolution must fail naming
    // the variable, never emit an empty string.
    let manifest = Manifest::parse(
        r#"{
            "baseRuntime": {"name": "python", "version": "3.10"},
            "command": ["run", "app.py", "--mode", "${APP_MODE}"]
        }"#,
        &CompilerConfig::default(),
    )
    .unwrap();

    let pipeline = CompilationPipeline::default();
    let err = pipeline
        .compile(&CompileRequest {
            manifest,
            mode: RenderMode::SingleStage,
        })
        .unwrap_err();

    assert!(matches!(err, PipelineError::Unresolved(_)));
    assert!(err.to_string().contains("APP_MODE"));
}

#[test]
fn invariant_streamlit_scenario() {
    // python 3.10, gcc (low churn), pandas/numpy (medium), PORT=8501.
    let plan = planner::plan(&streamlit_manifest());
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

    let build = compile(streamlit_manifest(), RenderMode::SingleStage);
    let cmd_line = build.artifact.text.lines().last().unwrap();
    assert!(cmd_line.starts_with("CMD ["));
    assert!(cmd_line.contains("8501"));
}

#[test]
fn invariant_misordered_dependency_steps_rejected() {
    let manifest = Manifest::parse(
        r#"{
            "baseRuntime": {"name": "python", "version": "3.10"},
            "dependencySteps": [
                {"kind": "language_package", "items": ["streamlit"], "changeFrequency": "high"},
                {"kind": "system_package", "items": ["gcc"], "changeFrequency": "low"}
            ],
            "command": ["run", "app.py"]
        }"#,
        &CompilerConfig::default(),
    )
    .unwrap();

    let pipeline = CompilationPipeline::default();
    let result = pipeline.validate_manifest(&manifest);
    assert!(!result.valid);
    assert!(result
        .violations
        .iter()
        .any(|v| v.rule == "dependency_order"));
}

#[test]
fn invariant_orchestration_emitted_for_volumed_manifests() {
    let manifest = Manifest::parse(
        r#"{
            "baseRuntime": {"name": "python", "version": "3.10"},
            "environment": ["PORT=8501"],
            "exposedPorts": [8501],
            "volumes": [{"source": ".", "target": "/app"}],
            "command": ["run", "app.py", "--port", "${PORT}"]
        }"#,
        &CompilerConfig::default(),
    )
    .unwrap();

    let build = compile(manifest, RenderMode::SingleStage);
    let yaml = build.orchestration.expect("orchestration manifest expected");
    assert!(yaml.contains("8501:8501"));
    assert!(yaml.contains(".:/app"));

    // A single-port, volume-free manifest gets none.
    let plain = compile(streamlit_manifest(), RenderMode::SingleStage);
    assert!(plain.orchestration.is_none());
}

#[test]
fn invariant_artifacts_round_trip_to_disk() {
    let manifest = Manifest::parse(
        r#"{
            "baseRuntime": {"name": "python", "version": "3.10"},
            "environment": ["PORT=8501"],
            "exposedPorts": [8501],
            "volumes": [{"source": ".", "target": "/app"}],
            "command": ["run", "app.py", "--port", "${PORT}"]
        }"#,
        &CompilerConfig::default(),
    )
    .unwrap();

    let build = compile(manifest, RenderMode::SingleStage);
    let dir = tempfile::tempdir().unwrap();
    build.write_to(dir.path()).unwrap();

    let script = std::fs::read_to_string(dir.path().join("Dockerfile")).unwrap();
    assert_eq!(script, build.artifact.text);
    assert!(dir.path().join("compose.yaml").exists());
}

#[test]
fn invariant_numeric_literal_argument_is_not_a_port_reference() {
    // "30" is a sleep duration, not a port. Only placeholder-derived ports
    // may trigger the unexposed-port error.
    let manifest = Manifest::parse(
        r#"{
            "baseRuntime": {"name": "python", "version": "3.10"},
            "command": ["sleep", "30"]
        }"#,
        &CompilerConfig::default(),
    )
    .unwrap();

    let pipeline = CompilationPipeline::default();
    let result = pipeline.validate_manifest(&manifest);
    assert!(result.valid);
    assert!(result.violations.is_empty());

    let build = compile(
        Manifest::parse(
            r#"{
                "baseRuntime": {"name": "python", "version": "3.10"},
                "command": ["run", "app.py", "--workers", "4"]
            }"#,
            &CompilerConfig::default(),
        )
        .unwrap(),
        RenderMode::SingleStage,
    );
    assert!(build.validation.valid);

    // A literal port token still suppresses the unreferenced-port warning.
    let manifest = Manifest::parse(
        r#"{
            "baseRuntime": {"name": "python", "version": "3.10"},
            "exposedPorts": [8501],
            "command": ["run", "app.py", "--port", "8501"]
        }"#,
        &CompilerConfig::default(),
    )
    .unwrap();
    let result = pipeline.validate_manifest(&manifest);
    assert!(result.valid);
    assert!(result.violations.is_empty());
}

#[test]
fn invariant_warnings_do_not_block_compilation() {
    // Exposed port never referenced by the command: warning only.
    let manifest = Manifest::parse(
        r#"{
            "baseRuntime": {"name": "python", "version": "3.10"},
            "exposedPorts": [8501],
            "command": ["run", "app.py"]
        }"#,
        &CompilerConfig::default(),
    )
    .unwrap();

    let build = compile(manifest, RenderMode::SingleStage);
    assert!(build.validation.valid);
    assert!(!build.validation.violations.is_empty());
    assert!(build.artifact.text.contains("EXPOSE 8501"));
}

#[cfg(feature = "test-hooks")]
#[test]
fn invariant_compile_calls_validate() {
    use layerforge_core::pipeline::{get_validation_call_count, reset_validation_call_count};

    reset_validation_call_count();
    let _ = compile(streamlit_manifest(), RenderMode::SingleStage);
    assert!(get_validation_call_count() >= 1);
}
