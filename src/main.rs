//! Binary entry point for engram.
//!
//! This binary provides the CLI interface for the engram memory system.

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(missing_docs)]
// Allow print_stderr in main binary for CLI output
#![allow(clippy::print_stderr)]
#![allow(clippy::print_stdout)]

use std::process::ExitCode;

use clap::{Parser, Subcommand};
use engram::config::MemoryConfig;
use engram::models::Namespace;
use engram::tools::ToolRegistry;
use engram::{Result, cli};
use tracing_subscriber::EnvFilter;

/// Engram - persistent knowledge-graph memory for AI assistants.
#[derive(Parser)]
#[command(name = "engram")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Available commands.
#[derive(Subcommand)]
enum Commands {
    /// Run one memory operation and print the JSON result.
    Call {
        /// The operation to perform (e.g. `create_entities`, `search_nodes`).
        operation: String,

        /// Namespace to operate on.
        #[arg(short, long, default_value = Namespace::DEFAULT)]
        namespace: String,

        /// Operation payload as JSON; `-` reads from stdin.
        #[arg(short, long)]
        data: Option<String>,
    },

    /// Print the registered tool definitions.
    Tools,

    /// Print backing-file information for a namespace.
    Status {
        /// Namespace to inspect.
        #[arg(short, long, default_value = Namespace::DEFAULT)]
        namespace: String,
    },
}

fn main() -> ExitCode {
    dotenvy::dotenv().ok();

    let args = Cli::parse();
    init_tracing(args.verbose);

    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}", cli::render_error(&e));
            ExitCode::FAILURE
        }
    }
}

fn run(args: Cli) -> Result<()> {
    let config = MemoryConfig::from_env();

    match args.command {
        Commands::Call {
            operation,
            namespace,
            data,
        } => {
            let registry = ToolRegistry::with_memory_tool(config);
            cli::run_call(&registry, &operation, &namespace, data.as_deref())
        }
        Commands::Tools => {
            let registry = ToolRegistry::with_memory_tool(config);
            cli::run_tools(&registry)
        }
        Commands::Status { namespace } => cli::run_status(config, &namespace),
    }
}

/// Initialises the tracing subscriber, writing to stderr so stdout stays
/// valid JSON.
fn init_tracing(verbose: bool) {
    let default_filter = if verbose { "engram=debug" } else { "engram=info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
