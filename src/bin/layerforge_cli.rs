//! LayerForge CLI
//!
//! Commands: validate, plan, compile
//! Outputs JSON to stdout, violations to stderr
//! Returns non-zero on validation or compilation failure

use clap::{Parser, Subcommand, ValueEnum};
use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;

use layerforge_core::{
    planner, CompilationPipeline, CompileRequest, CompilerConfig, Manifest, RenderMode,
};

#[derive(Parser)]
#[command(name = "layerforge-cli")]
#[command(about = "LayerForge CLI - Container Build Specification Compiler")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Default working directory applied when the manifest omits one
    #[arg(long, default_value = "/app")]
    default_workdir: String,

    /// Default base runtime version applied when the manifest omits one
    #[arg(long, default_value = "3.10")]
    default_runtime_version: String,
}

#[derive(Clone, Copy, ValueEnum)]
enum Mode {
    Single,
    Multi,
}

impl From<Mode> for RenderMode {
    fn from(mode: Mode) -> Self {
        match mode {
            Mode::Single => RenderMode::SingleStage,
            Mode::Multi => RenderMode::MultiStage,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Check a manifest for internal consistency
    Validate {
        /// Path to the manifest document
        manifest: PathBuf,
    },

    /// Show the ordered build plan without rendering
    Plan {
        /// Path to the manifest document
        manifest: PathBuf,
    },

    /// Compile a manifest into build artifacts
    Compile {
        /// Path to the manifest document
        manifest: PathBuf,

        /// Rendering mode
        #[arg(long, value_enum, default_value = "single")]
        mode: Mode,

        /// Write Dockerfile (and compose.yaml) into this directory
        /// instead of printing JSON
        #[arg(long)]
        out: Option<PathBuf>,
    },
}

fn load_manifest(pipeline: &CompilationPipeline, path: &PathBuf) -> Result<Manifest, String> {
    let raw = fs::read_to_string(path)
        .map_err(|e| format!("Failed to read {}: {}", path.display(), e))?;
    pipeline
        .parse_manifest(&raw)
        .map_err(|e| format!("Manifest error: {e}"))
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = CompilerConfig {
        default_working_directory: cli.default_workdir,
        default_runtime_version: cli.default_runtime_version,
    };
    let pipeline = CompilationPipeline::new(config);

    match cli.command {
        Commands::Validate { manifest } => {
            let manifest = match load_manifest(&pipeline, &manifest) {
                Ok(m) => m,
                Err(e) => {
                    eprintln!("{e}");
                    return ExitCode::FAILURE;
                }
            };

            let result = pipeline.validate_manifest(&manifest);
            println!("{}", serde_json::to_string_pretty(&result).unwrap());
            if result.valid {
                ExitCode::SUCCESS
            } else {
                for line in result.report() {
                    eprintln!("{line}");
                }
                ExitCode::from(2) // Validation failure
            }
        }

        Commands::Plan { manifest } => {
            let manifest = match load_manifest(&pipeline, &manifest) {
                Ok(m) => m,
                Err(e) => {
                    eprintln!("{e}");
                    return ExitCode::FAILURE;
                }
            };

            let result = pipeline.validate_manifest(&manifest);
            if !result.valid {
                for line in result.report() {
                    eprintln!("{line}");
                }
                return ExitCode::from(2);
            }

            let plan = planner::plan(&manifest);
            println!("{}", serde_json::to_string_pretty(&plan).unwrap());
            ExitCode::SUCCESS
        }

        Commands::Compile {
            manifest,
            mode,
            out,
        } => {
            let manifest = match load_manifest(&pipeline, &manifest) {
                Ok(m) => m,
                Err(e) => {
                    eprintln!("{e}");
                    return ExitCode::FAILURE;
                }
            };

            let request = CompileRequest {
                manifest,
                mode: mode.into(),
            };

            match pipeline.compile(&request) {
                Ok(build) => {
                    if let Some(dir) = out {
                        if let Err(e) = build.write_to(&dir) {
                            eprintln!("{e}");
                            return ExitCode::FAILURE;
                        }
                        println!(
                            "{}",
                            serde_json::json!({
                                "success": true,
                                "out": dir,
                                "manifestHash": build.manifest_hash,
                                "buildHash": build.build_hash,
                            })
                        );
                    } else {
                        let output = serde_json::json!({
                            "success": true,
                            "build": build,
                        });
                        println!("{}", serde_json::to_string_pretty(&output).unwrap());
                    }
                    ExitCode::SUCCESS
                }
                Err(e) => {
                    if let layerforge_core::PipelineError::ValidationFailed(result) = &e {
                        for line in result.report() {
                            eprintln!("{line}");
                        }
                    } else {
                        eprintln!("{e}");
                    }
                    let output = serde_json::json!({
                        "success": false,
                        "error": e.to_string(),
                    });
                    println!("{}", serde_json::to_string(&output).unwrap());
                    ExitCode::from(2) // Compilation failure
                }
            }
        }
    }
}
