//! # sinopia
//!
//! Sinopia - Reactive HTML templates.
//!
//! ## Name Origin
//!
//! **Sinopia** is the reddish underdrawing a fresco painter lays on the wall
//! before the plaster goes on. Templates are the underdrawing; the runtime
//! paints live values over them. This binary compiles templates into their
//! static descriptors and renders them through the runtime.

mod commands;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "sinopia")]
#[command(about = "Reactive HTML templates: compiler and runtime", long_about = None)]
#[command(version, disable_version_flag = true)]
struct Cli {
    /// Print version
    #[arg(short = 'v', short_alias = 'V', long, action = clap::ArgAction::Version)]
    version: (),
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile templates to markup and descriptors (default command)
    #[command(visible_alias = "atelier")]
    Compile(commands::compile::CompileArgs),

    /// Compile a template, run one refresh and print the resulting HTML
    #[command(visible_alias = "fresco")]
    Render(commands::render::RenderArgs),
}

fn init_logging() {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();
}

fn main() {
    init_logging();
    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Compile(args)) => commands::compile::run(args),
        Some(Commands::Render(args)) => commands::render::run(args),
        None => {
            // Default to compile command with default args
            commands::compile::run(commands::compile::CompileArgs::default());
        }
    }
}
