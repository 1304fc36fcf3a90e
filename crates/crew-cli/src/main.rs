//! Crew CLI: run, validate and inspect AutoML agent crews.

use clap::{Parser, Subcommand};

use crew_cli::commands;

/// Crew: agent crews for an AutoML client pipeline
#[derive(Parser)]
#[command(name = "crew", version, about = "Crew: agent crews for an AutoML client pipeline")]
pub struct Cli {
    /// Extra env file loaded before `.env.local` and `.env`
    #[arg(long, global = true, env = "CREW_ENV_FILE")]
    env_file: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a workflow (the built-in AutoML pipeline when FILE is omitted)
    Run {
        /// Workflow YAML file
        file: Option<String>,
        /// Control strategy: sequential or conversation
        #[arg(long)]
        mode: Option<String>,
        /// Transcript bound for conversation mode
        #[arg(long)]
        max_round: Option<usize>,
        /// Early-stop rule, e.g. "contains:SUCCESS: Email"
        #[arg(long)]
        terminate_on: Option<String>,
        /// Speaker selection: declaration_order, round_robin or manager
        #[arg(long)]
        selector: Option<String>,
        /// Answer every prompt with the offline backend
        #[arg(long)]
        offline: bool,
        /// Print each step's full output
        #[arg(long, short = 'v')]
        verbose: bool,
        /// Print the run report as JSON instead of progress lines
        #[arg(long)]
        json: bool,
    },

    /// Validate a workflow and print its execution order
    Validate {
        /// Workflow YAML file
        file: Option<String>,
    },

    /// List the agents of a workflow
    Agents {
        /// Workflow YAML file
        file: Option<String>,
    },

    /// Write the built-in AutoML pipeline to PATH
    Init {
        /// Destination file
        #[arg(default_value = "automl_pipeline.yaml")]
        path: String,
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "crew_core=info,crew_cli=info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    if let Some(path) = &cli.env_file {
        if let Err(e) = crew_core::config::load_env_file(path) {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    }
    crew_core::config::load_env_files();

    let result = match cli.command {
        Some(Commands::Run {
            file,
            mode,
            max_round,
            terminate_on,
            selector,
            offline,
            verbose,
            json,
        }) => {
            let options = commands::run::RunOptions {
                mode,
                max_round,
                terminate_on,
                selector,
                offline,
                verbose,
                json,
            };
            commands::run::run(file.as_deref(), &options).await
        }
        Some(Commands::Validate { file }) => commands::validate::validate(file.as_deref()),
        Some(Commands::Agents { file }) => commands::agents::list(file.as_deref()),
        Some(Commands::Init { path, force }) => commands::init::init(&path, force),
        None => {
            use clap::CommandFactory;
            Cli::command().print_help().ok();
            println!();
            Ok(())
        }
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
