use anyhow::Result;
use bankcms::core::log::{LogFormat, init_logging};
use bankcms::core::rate::{NewRate, RatePatch};
use clap::{CommandFactory, Parser, Subcommand};
use std::path::PathBuf;

const DEFAULT_CATEGORY: &str = "general";

#[derive(Parser)]
#[command(version, about)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to optional configuration file
    #[arg(short, long, global = true)]
    config_path: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

impl From<Commands> for bankcms::AppCommand {
    fn from(cmd: Commands) -> bankcms::AppCommand {
        match cmd {
            Commands::Sync => bankcms::AppCommand::Sync,
            Commands::Rates { all } => bankcms::AppCommand::Rates { all },
            Commands::AddRate {
                code,
                name,
                flag,
                buy,
                sell,
                base,
                inactive,
            } => bankcms::AppCommand::AddRate(NewRate {
                currency_code: code,
                display_name: name,
                flag,
                buy_rate: buy,
                sell_rate: sell,
                base_currency_code: base,
                active: Some(!inactive),
            }),
            Commands::UpdateRate {
                code,
                name,
                flag,
                buy,
                sell,
                base,
                active,
            } => bankcms::AppCommand::UpdateRate {
                currency_code: code,
                patch: RatePatch {
                    display_name: name,
                    flag,
                    buy_rate: buy,
                    sell_rate: sell,
                    base_currency_code: base,
                    active,
                },
            },
            Commands::RemoveRate { code } => bankcms::AppCommand::RemoveRate {
                currency_code: code,
            },
            Commands::Schedule => bankcms::AppCommand::Schedule,
            Commands::Upload { file, category } => bankcms::AppCommand::Upload { file, category },
            Commands::Replace {
                locator,
                file,
                category,
            } => bankcms::AppCommand::Replace {
                locator,
                file,
                category,
            },
            Commands::Delete { locator, category } => {
                bankcms::AppCommand::Delete { locator, category }
            }
            Commands::Setup => unreachable!("Setup command should be handled separately"),
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Create default configuration
    Setup,
    /// Fetch quotes and refresh all configured exchange rates
    Sync,
    /// Display exchange rates
    Rates {
        /// Include inactive rates
        #[arg(long)]
        all: bool,
    },
    /// Add an exchange rate by hand
    AddRate {
        code: String,
        name: String,
        #[arg(long)]
        buy: f64,
        #[arg(long)]
        sell: f64,
        #[arg(long)]
        flag: Option<String>,
        /// Base currency, defaults to the configured one
        #[arg(long)]
        base: Option<String>,
        #[arg(long)]
        inactive: bool,
    },
    /// Change fields of an existing exchange rate
    UpdateRate {
        code: String,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        flag: Option<String>,
        #[arg(long)]
        buy: Option<f64>,
        #[arg(long)]
        sell: Option<f64>,
        #[arg(long)]
        base: Option<String>,
        #[arg(long)]
        active: Option<bool>,
    },
    /// Remove an exchange rate
    RemoveRate { code: String },
    /// Run the daily sync until interrupted
    Schedule,
    /// Store a file and print its public locator
    Upload {
        file: PathBuf,
        #[arg(long, default_value = DEFAULT_CATEGORY)]
        category: String,
    },
    /// Store a new file and drop the one behind LOCATOR
    Replace {
        locator: String,
        file: PathBuf,
        #[arg(long, default_value = DEFAULT_CATEGORY)]
        category: String,
    },
    /// Delete the file behind LOCATOR
    Delete {
        locator: String,
        #[arg(long, default_value = DEFAULT_CATEGORY)]
        category: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let format = match cli.command {
        Some(Commands::Schedule) => LogFormat::Timestamped,
        _ => LogFormat::Pretty,
    };
    init_logging(cli.verbose, format);

    let result = match cli.command {
        Some(Commands::Setup) => match cli.config_path.as_deref() {
            Some(path) => bankcms::cli::setup::setup_at_path(path),
            None => bankcms::cli::setup::setup(),
        },
        Some(cmd) => bankcms::run_command(cmd.into(), cli.config_path.as_deref()).await,
        None => {
            Cli::command().print_help()?;
            Ok(())
        }
    };

    if let Err(e) = &result {
        tracing::error!(error = %e, "Application failed");
    }
    result
}
