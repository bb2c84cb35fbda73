//! Weft CLI - declarative step runner

use clap::{Parser, Subcommand};
use colored::Colorize;
use serde_json::Value;

use weft::error::{FixSuggestion, WeftError};
use weft::{Env, Program, Runner};

#[derive(Parser)]
#[command(name = "weft")]
#[command(about = "Weft - run programs of external nodes over JSON pipes")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a program file
    Run {
        /// Path to the program YAML file
        file: String,

        /// Dump the event log after the run
        #[arg(long)]
        trace: bool,

        /// Arguments passed through to the program (after `--`), visible
        /// in the environment as `argv`
        #[arg(last = true)]
        node_args: Vec<String>,
    },

    /// Validate a program file (parse and static checks only)
    Validate {
        /// Path to the program YAML file
        file: String,
    },
}

#[tokio::main]
async fn main() {
    // Load .env file (ignore if not present)
    let _ = dotenvy::dotenv();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into()),
        )
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Run {
            file,
            trace,
            node_args,
        } => run_program(&file, trace, node_args).await,
        Commands::Validate { file } => validate_program(&file),
    };

    if let Err(e) = result {
        eprintln!("{} {}", "Error:".red().bold(), e);
        if let Some(suggestion) = e.fix_suggestion() {
            eprintln!("  {} {}", "Fix:".yellow(), suggestion);
        }
        std::process::exit(1);
    }
}

async fn run_program(file: &str, trace: bool, node_args: Vec<String>) -> Result<(), WeftError> {
    // Read and parse (async to not block runtime)
    let yaml = tokio::fs::read_to_string(file).await.map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            WeftError::ProgramNotFound {
                path: file.to_string(),
            }
        } else {
            e.into()
        }
    })?;
    let program = Program::from_yaml(&yaml)?;
    program.validate()?;

    println!(
        "{} Running '{}' ({} steps)",
        "→".cyan(),
        program.name.as_deref().unwrap_or(file).cyan().bold(),
        program.steps.len()
    );

    // One environment for the whole run; pass-through args are visible to
    // the program as `argv`
    let mut env = Env::new();
    env.insert(
        "argv",
        Value::Array(node_args.into_iter().map(Value::String).collect()),
    );

    let runner = Runner::new();
    let result = runner.run(&program, &mut env).await;

    if trace {
        println!("{}", "Trace:".cyan().bold());
        for event in runner.event_log().snapshot() {
            println!("[{:>6}ms] {:?}", event.timestamp_ms, event.kind);
        }
    }

    result?;
    println!("{} Done", "✓".green());
    Ok(())
}

fn validate_program(file: &str) -> Result<(), WeftError> {
    let yaml = std::fs::read_to_string(file).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            WeftError::ProgramNotFound {
                path: file.to_string(),
            }
        } else {
            e.into()
        }
    })?;
    let program = Program::from_yaml(&yaml)?;
    program.validate()?;

    println!("{} Program '{}' is valid", "✓".green(), file);
    if let Some(name) = &program.name {
        println!("  Name: {name}");
    }
    println!("  Steps: {}", program.steps.len());
    for (index, step) in program.steps.iter().enumerate() {
        let node = step
            .node
            .as_ref()
            .map(|n| n.to_string())
            .unwrap_or_default();
        println!("    {} → {}", step.label(index), node);
    }

    Ok(())
}
