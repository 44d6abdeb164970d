use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use chainquest::config::Config;
use chainquest::{ChainQuest, QuestError};

mod cli;

#[derive(Parser)]
#[command(name = "chainquest")]
#[command(about = "ChainQuest - XP, streaks and rewards for wallet-based learning quests")]
#[command(version)]
struct Cli {
    /// Path to the config file (defaults to ~/.chainquest/config.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a commented default config file
    Init {
        /// Overwrite existing config file
        #[arg(long)]
        force: bool,
    },

    /// Show a wallet's progress as JSON
    Status { wallet: String },

    /// Connect a wallet: updates the streak and shows the daily popups
    Login { wallet: String },

    /// List learning modules
    Modules {
        /// Mark modules this wallet already finished
        wallet: Option<String>,
    },

    /// Complete a learning module and collect its reward
    Module { wallet: String, module: String },

    /// Show today's daily challenges
    Challenges { wallet: String },

    /// Complete one of today's challenges
    Challenge {
        wallet: String,
        slug: String,
        /// Also claim the reward
        #[arg(long)]
        claim: bool,
    },

    /// Grant a mystery box
    GrantBox {
        wallet: String,
        /// common, rare, epic or legendary
        #[arg(long, default_value = "common")]
        tier: String,
    },

    /// Open a mystery box (lists unopened boxes when no id is given)
    OpenBox { wallet: String, box_id: Option<String> },

    /// Recompute the stored level from XP
    Sync { wallet: String },

    /// Mint a finished module's completion NFT
    Mint {
        wallet: String,
        module: String,
        /// Balance of the simulated wallet (defaults to wallet.simulated_balance)
        #[arg(long)]
        balance: Option<f64>,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    if let Err(err) = run(cli).await {
        match err.downcast_ref::<QuestError>() {
            Some(quest) => {
                tracing::debug!("{err:#}");
                eprintln!("{}", quest.user_message());
            }
            None => eprintln!("Error: {err:#}"),
        }
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    if let Commands::Init { force } = cli.command {
        return cli::init::init_command(cli.config, force);
    }

    let config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };
    let app = ChainQuest::new(config)?;

    match cli.command {
        Commands::Init { .. } => {}
        Commands::Status { wallet } => cli::status::status_command(&app, &wallet)?,
        Commands::Login { wallet } => cli::rewards::login_command(&app, &wallet)?,
        Commands::Modules { wallet } => cli::rewards::modules_command(&app, wallet.as_deref())?,
        Commands::Module { wallet, module } => {
            cli::rewards::module_command(&app, &wallet, &module)?;
        }
        Commands::Challenges { wallet } => cli::rewards::challenges_command(&app, &wallet)?,
        Commands::Challenge {
            wallet,
            slug,
            claim,
        } => cli::rewards::challenge_command(&app, &wallet, &slug, claim)?,
        Commands::GrantBox { wallet, tier } => {
            cli::rewards::grant_box_command(&app, &wallet, &tier)?;
        }
        Commands::OpenBox { wallet, box_id } => {
            cli::rewards::open_box_command(&app, &wallet, box_id.as_deref())?;
        }
        Commands::Sync { wallet } => cli::rewards::sync_command(&app, &wallet)?,
        Commands::Mint {
            wallet,
            module,
            balance,
        } => cli::mint::mint_command(&app, &wallet, &module, balance).await?,
    }

    Ok(())
}
