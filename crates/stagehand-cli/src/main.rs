//! Stagehand CLI - progressive delivery stages for Kubernetes applications

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use stagehand_core::Variant;
use stagehand_kube::StageStatus;
use tracing_subscriber::EnvFilter;

mod commands;
mod error;
mod exit_codes;

use commands::run::RunArgs;
use error::Result;

#[derive(Parser)]
#[command(name = "stagehand")]
#[command(version)]
#[command(about = "Progressive delivery stages for Kubernetes applications", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable debug output
    #[arg(long, global = true)]
    debug: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Execute one pipeline stage
    Run {
        /// Deployment configuration file
        #[arg(short, long)]
        config: PathBuf,

        /// Stage name (e.g. K8S_CANARY_ROLLOUT or canary-rollout)
        #[arg(short, long)]
        stage: String,

        /// Position of the stage in the configured pipeline (0-based), for
        /// pipelines that repeat a stage
        #[arg(long)]
        stage_index: Option<usize>,

        /// Application directory at the trigger commit
        #[arg(long)]
        app_dir: PathBuf,

        /// Application directory at the running commit
        #[arg(long)]
        running_dir: Option<PathBuf>,

        /// Application identifier
        #[arg(long)]
        app_id: String,

        /// Commit being deployed
        #[arg(long)]
        commit: String,

        /// Commit of the last successful deployment
        #[arg(long)]
        running_commit: Option<String>,

        /// Identifier recorded on applied resources
        #[arg(long, default_value = "stagehand-cli")]
        agent_id: String,

        /// Run against an in-memory cluster and print the result
        #[arg(long)]
        dry_run: bool,
    },

    /// Print the manifests generated for a variant
    Render {
        /// Deployment configuration file
        #[arg(short, long)]
        config: PathBuf,

        /// Application directory
        #[arg(long)]
        app_dir: PathBuf,

        /// primary, canary or baseline
        #[arg(long, default_value = "canary")]
        variant: Variant,

        /// Name suffix (defaults to the stage option, then the variant name)
        #[arg(long)]
        suffix: Option<String>,
    },
}

fn init_tracing(debug: bool) {
    let filter = if debug {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .without_time()
        .init();
}

async fn dispatch(command: Commands) -> Result<i32> {
    match command {
        Commands::Run {
            config,
            stage,
            stage_index,
            app_dir,
            running_dir,
            app_id,
            commit,
            running_commit,
            agent_id,
            dry_run,
        } => {
            let status = commands::run::run(RunArgs {
                config,
                stage,
                stage_index,
                app_dir,
                running_dir,
                app_id,
                commit,
                running_commit,
                agent_id,
                dry_run,
            })
            .await?;

            Ok(match status {
                StageStatus::Success => exit_codes::SUCCESS,
                StageStatus::Cancelled => exit_codes::CANCELLED,
                _ => exit_codes::ERROR,
            })
        }

        Commands::Render {
            config,
            app_dir,
            variant,
            suffix,
        } => {
            commands::render::run(&config, &app_dir, variant, suffix.as_deref()).await?;
            Ok(exit_codes::SUCCESS)
        }
    }
}

#[tokio::main]
async fn main() {
    miette::set_panic_hook();

    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let code = if e.use_stderr() {
                exit_codes::USAGE_ERROR
            } else {
                exit_codes::SUCCESS
            };
            let _ = e.print();
            std::process::exit(code);
        }
    };

    init_tracing(cli.debug);

    let code = match dispatch(cli.command).await {
        Ok(code) => code,
        Err(e) => {
            let code = e.exit_code();
            eprintln!("{:?}", miette::Report::new(e));
            code
        }
    };
    std::process::exit(code);
}
