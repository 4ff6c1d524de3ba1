use anyhow::{Context, Result};
use appraisal_node::{config::NodeConfig, logging, run_scenario, Scenario};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing::info;

const DEFAULT_CONFIG: &str = "./appraisal-config.toml";

#[derive(Parser)]
#[command(name = "appraisal")]
#[command(about = "Appraisal session engine", long_about = None)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Verbosity level (can be repeated)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a default configuration file
    Init {
        /// Output path for the configuration
        #[arg(short, long, default_value = DEFAULT_CONFIG)]
        output: PathBuf,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// Print the effective configuration after env overrides
    ShowConfig,

    /// Run a scripted session end to end and print the report as JSON
    Simulate {
        /// Scenario TOML file
        #[arg(short, long)]
        scenario: PathBuf,

        /// Minimum stake override, in base units
        #[arg(long)]
        min_stake: Option<u64>,
    },
}

fn load_config(path: Option<&Path>) -> Result<NodeConfig> {
    let mut config = match path {
        Some(path) => NodeConfig::from_file(path)?,
        None if Path::new(DEFAULT_CONFIG).exists() => NodeConfig::from_file(Path::new(DEFAULT_CONFIG))?,
        None => NodeConfig::default(),
    };
    config.apply_env_overrides();
    config.validate()?;
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let mut config = load_config(cli.config.as_deref())?;

    if config.logging.show_boot_banner && cli.verbose == 0 && std::env::var("RUST_LOG").is_err() {
        logging::display_boot_banner(env!("CARGO_PKG_VERSION"));
    }
    if let Err(e) = logging::init_logging(&config.logging, cli.verbose) {
        eprintln!("Failed to initialize logging: {}", e);
    }

    match cli.command {
        Commands::Init { output, force } => {
            if output.exists() && !force {
                anyhow::bail!("{} already exists (use --force)", output.display());
            }
            NodeConfig::default().save_to_file(&output)?;
            info!(path = %output.display(), "⚙️ Configuration written");
        }
        Commands::ShowConfig => {
            println!("{}", toml::to_string_pretty(&config)?);
        }
        Commands::Simulate {
            scenario,
            min_stake,
        } => {
            if let Some(min_stake) = min_stake {
                config.engine.min_stake = min_stake;
            }
            let scenario_def = Scenario::from_file(&scenario)?;
            info!(
                scenario = %scenario.display(),
                voters = scenario_def.voters.len(),
                "🚀 Running scenario"
            );
            let report = run_scenario(config.engine, &scenario_def)
                .await
                .with_context(|| format!("scenario {}", scenario.display()))?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
    }

    Ok(())
}
