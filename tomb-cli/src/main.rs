// Thin developer-facing shim over `tomb-compiler`: not a specified external
// interface, it exists for local development and the test suite's
// golden-file fixtures, the way a compiler ships a small CLI alongside its
// library crates.

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

use tomb_compiler::{compile, CompileOptions, ModuleArtifactKind};
use tomb_diagnostics::DiagnosticEngine;

#[derive(Parser)]
#[command(name = "tomb")]
#[command(version = "0.2.0")]
#[command(about = "Tomb smart-contract language compiler", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile a Tomb source file and print each module's ABI as JSON
    Compile {
        /// Input .tomb file
        #[arg(value_name = "INPUT")]
        input: PathBuf,

        /// Write bytecode for each module to OUTPUT_DIR/<module>.bc
        #[arg(short, long, value_name = "OUTPUT_DIR")]
        output: Option<PathBuf>,

        /// Override the file name recorded in diagnostics (useful when
        /// piping source from stdin with `-`)
        #[arg(long, value_name = "NAME")]
        name: Option<String>,
    },

    /// Parse and type-check a Tomb source file without emitting bytecode
    Check {
        /// Input .tomb file
        #[arg(value_name = "INPUT")]
        input: PathBuf,
    },
}

fn read_source(input: &PathBuf) -> Result<(String, String)> {
    let file_name = input
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("<source>")
        .to_string();
    let source = if input.as_os_str() == "-" {
        use std::io::Read;
        let mut buf = String::new();
        std::io::stdin().read_to_string(&mut buf)?;
        buf
    } else {
        std::fs::read_to_string(input)?
    };
    Ok((source, file_name))
}

fn report_errors(source: &str, errors: &[tomb_diagnostics::CompileError]) {
    let mut engine = DiagnosticEngine::new();
    for err in errors {
        engine.emit(err.0.clone());
    }
    engine.print_all(source);
    engine.print_summary();
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Compile { input, output, name } => {
            let (source, default_name) = read_source(&input)?;
            let file_name = name.unwrap_or(default_name);
            log::info!("compiling {}", file_name);

            let options = CompileOptions { file_name: file_name.clone() };
            match compile(&source, options) {
                Ok(artifacts) => {
                    if let Some(dir) = &output {
                        std::fs::create_dir_all(dir)?;
                    }
                    for artifact in &artifacts {
                        let kind = match artifact.kind {
                            ModuleArtifactKind::Contract => "contract",
                            ModuleArtifactKind::Script => "script",
                            ModuleArtifactKind::Description => "description",
                        };
                        println!("✓ {} `{}` ({} bytes)", kind, artifact.name, artifact.bytecode.len());
                        let abi_json = serde_json::to_string_pretty(&artifact.abi)?;
                        println!("{}", abi_json);
                        if let Some(dir) = &output {
                            let path = dir.join(format!("{}.bc", artifact.name));
                            std::fs::write(&path, &artifact.bytecode)?;
                            println!("  bytecode written to {}", path.display());
                        }
                    }
                    Ok(())
                }
                Err(errors) => {
                    report_errors(&source, &errors);
                    anyhow::bail!("{} module(s) failed to compile", errors.len());
                }
            }
        }
        Commands::Check { input } => {
            let (source, default_name) = read_source(&input)?;
            let options = CompileOptions { file_name: default_name };
            match compile(&source, options) {
                Ok(artifacts) => {
                    println!("✓ {} module(s) compiled cleanly", artifacts.len());
                    Ok(())
                }
                Err(errors) => {
                    report_errors(&source, &errors);
                    anyhow::bail!("{} module(s) failed to compile", errors.len());
                }
            }
        }
    }
}
