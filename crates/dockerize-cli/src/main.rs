mod commands;

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "dockerize",
    about = "Generate Dockerfiles and Coolify manifests for detected project stacks"
)]
#[command(version)]
struct Cli {
    /// Project root to inspect
    #[arg(long, global = true, default_value = ".")]
    project: PathBuf,
    /// Enable debug logging (RUST_LOG takes precedence)
    #[arg(long, short, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Detect the project's stack
    Detect {
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },
    /// Resolve templates and print the artifacts without writing them
    Plan {
        #[command(flatten)]
        target: TargetArgs,
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },
    /// Resolve templates and write the artifacts
    Generate {
        #[command(flatten)]
        target: TargetArgs,
        /// Output directory (default: project.output_dir from dockerize.toml)
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// List the stacks in the registry
    Stacks {
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },
    /// Validate a registry file (default: the configured or built-in registry)
    Check {
        /// Registry TOML file
        registry: Option<PathBuf>,
    },
    /// Write a dockerize.toml skeleton
    Init,
}

#[derive(Args)]
struct TargetArgs {
    /// Use this stack instead of detecting one
    #[arg(long)]
    stack: Option<String>,
    /// Override a variable (repeatable)
    #[arg(long = "set", value_name = "KEY=VALUE")]
    set: Vec<String>,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter = match tracing_subscriber::EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(e) => {
            if std::env::var_os("RUST_LOG").is_some() {
                eprintln!("warning: ignoring RUST_LOG: {e}");
            }
            tracing_subscriber::EnvFilter::new(default_level)
        }
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let project = cli.project.as_path();
    match cli.command {
        Commands::Detect { json } => commands::detect(project, json)?,
        Commands::Plan { target, json } => {
            commands::plan(project, target.stack.as_deref(), &target.set, json)?
        }
        Commands::Generate { target, out } => commands::generate(
            project,
            target.stack.as_deref(),
            &target.set,
            out.as_deref(),
        )?,
        Commands::Stacks { json } => commands::stacks(project, json)?,
        Commands::Check { registry } => commands::check(project, registry.as_deref())?,
        Commands::Init => commands::init_project(project)?,
    }

    Ok(())
}
