use clap::{Args as ClapArgs, Parser, Subcommand};
use std::path::PathBuf;
use weft_engine::ConfigLoader;

mod commands;

#[derive(Parser)]
#[command(name = "weft", version, about = "Self-healing UI flow runner")]
struct Args {
    /// Config file (default: ./weft.yaml, then ~/.weft/config.yaml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run one flow by dot path, a category, or every flow
    Run(RunArgs),
    /// List discovered flows
    Flows,
    /// Parse and validate flow files without running them
    Check,
    /// Inspect or edit the learned-selector knowledge base
    #[command(subcommand)]
    Kb(KbCommand),
}

#[derive(ClapArgs)]
pub struct RunArgs {
    /// Flow dot path, e.g. auth.login. Omit with --category or --all.
    pub flow: Option<String>,

    /// Run every flow under this category prefix
    #[arg(long, conflicts_with = "all")]
    pub category: Option<String>,

    /// Run every discovered flow
    #[arg(long)]
    pub all: bool,

    /// Base URL override
    #[arg(long)]
    pub url: Option<String>,

    /// Flow file glob override
    #[arg(long)]
    pub flows: Option<String>,

    /// Credential override for the {email} parameter
    #[arg(long)]
    pub email: Option<String>,

    /// Credential override for the {password} parameter
    #[arg(long)]
    pub password: Option<String>,

    /// Extra parameter as key=value (repeatable)
    #[arg(long = "param", value_name = "KEY=VALUE")]
    pub params: Vec<String>,

    /// Launch the browser visibly instead of headless
    #[arg(long)]
    pub headed: bool,

    /// Skip the oracle tier even when an endpoint is configured
    #[arg(long)]
    pub no_oracle: bool,

    /// Knowledge base path override
    #[arg(long)]
    pub knowledge: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum KbCommand {
    /// Print every learned solution
    Show,
    /// Delete solutions below a confidence threshold
    Prune {
        /// Confidence below which solutions are dropped
        #[arg(long, default_value_t = 0.5)]
        below: f64,
    },
    /// Delete one solution by id
    Forget {
        /// Solution id, e.g. click:fc82529e728c
        id: String,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Logs go to stderr; stdout carries reports and listings.
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    let config = match &args.config {
        Some(path) => ConfigLoader::load_from(path).await?,
        None => ConfigLoader::load_default().await,
    };

    match args.command {
        Command::Run(run_args) => {
            let all_passed = commands::run(config, run_args).await?;
            if !all_passed {
                std::process::exit(1);
            }
        }
        Command::Flows => commands::list_flows(&config).await?,
        Command::Check => commands::check(&config).await?,
        Command::Kb(command) => commands::kb(config, command).await?,
    }

    Ok(())
}
