//! # Vast CLI
//!
//! Command-line interface for the Vast.ai GPU marketplace.
//! This crate provides the CLI structure, argument parsing, and command routing.

pub mod commands;
pub mod config;
pub mod display;

pub use config::Config;

use clap::{Args, Parser, Subcommand};
use commands::Context;
use thiserror::Error;

/// Application-level errors for the CLI
#[derive(Error, Debug)]
pub enum CliError {
    #[error("Core domain error: {0}")]
    Core(#[from] vast_core::VastError),

    #[error("{0}")]
    Api(#[from] vast_api::ApiError),

    #[error("Utils error: {0}")]
    Utils(#[from] vast_utils::UtilsError),

    #[error("{0}")]
    Query(#[from] vast_core::QueryError),

    #[error("Config error: {0}")]
    Config(#[from] crate::config::ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("{0}")]
    OperationFailed(String),

    #[error("Other: {0}")]
    Other(String),
}

impl From<dialoguer::Error> for CliError {
    fn from(err: dialoguer::Error) -> Self {
        CliError::Other(format!("Input error: {}", err))
    }
}

pub type Result<T> = std::result::Result<T, CliError>;

/// Main CLI struct
#[derive(Parser)]
#[command(name = "vast")]
#[command(about = "Command-line client for the Vast.ai GPU marketplace")]
#[command(version)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(subcommand)]
    pub command: Commands,
}

/// Options accepted by every command
#[derive(Args, Debug, Clone, Default)]
pub struct GlobalArgs {
    /// Server REST api url
    #[arg(long, global = true, value_name = "URL")]
    pub url: Option<String>,

    /// Output machine-readable json
    #[arg(long, global = true)]
    pub raw: bool,

    /// Api key. Defaults to the saved key or VAST_API_KEY
    #[arg(long = "api-key", global = true, value_name = "API_KEY")]
    pub api_key: Option<String>,

    /// Attempts per request when rate limited
    #[arg(long, global = true, value_name = "N")]
    pub retry: Option<u32>,
}

impl GlobalArgs {
    fn overrides(&self) -> config::Overrides {
        config::Overrides {
            api_key: self.api_key.clone(),
            base_url: self.url.clone(),
            retry: self.retry,
        }
    }
}

/// All available CLI commands, grouped `verb object`
#[derive(Subcommand)]
pub enum Commands {
    /// Search for rentable offers
    Search {
        #[command(subcommand)]
        object: SearchCommands,
    },
    /// Display instances, machines, invoices or the current user
    Show {
        #[command(subcommand)]
        object: commands::show::ShowCommands,
    },
    /// ssh url helper
    SshUrl(commands::ssh::UrlArgs),
    /// scp url helper
    ScpUrl(commands::ssh::UrlArgs),
    /// Create an instance or an account
    Create {
        #[command(subcommand)]
        object: CreateCommands,
    },
    /// Start stopped instances
    Start {
        #[command(subcommand)]
        object: StartCommands,
    },
    /// Stop running instances
    Stop {
        #[command(subcommand)]
        object: StopCommands,
    },
    /// Assign a string label to an instance
    Label {
        #[command(subcommand)]
        object: LabelCommands,
    },
    /// Destroy instances (irreversible, deletes data)
    Destroy {
        #[command(subcommand)]
        object: DestroyCommands,
    },
    /// Change the bid price of an interruptible instance
    Change {
        #[command(subcommand)]
        object: ChangeCommands,
    },
    /// [Host] list a machine for rent
    List {
        #[command(subcommand)]
        object: ListCommands,
    },
    /// [Host] unlist a listed machine
    Unlist {
        #[command(subcommand)]
        object: UnlistCommands,
    },
    /// Set default jobs, minimum bids or the api key
    Set {
        #[command(subcommand)]
        object: SetCommands,
    },
    /// [Host] delete default jobs
    Remove {
        #[command(subcommand)]
        object: RemoveCommands,
    },
    /// Deprecated, use the web console
    Login {
        #[arg(value_name = "IGNORED", hide = true)]
        ignored: Vec<String>,
    },
}

#[derive(Subcommand)]
pub enum SearchCommands {
    /// Search for instance types using custom query
    #[command(alias = "instances")]
    Offers(commands::search::SearchArgs),
}

#[derive(Subcommand)]
pub enum CreateCommands {
    /// Create a new instance
    Instance(commands::instance::CreateArgs),
    /// Deprecated, use the web console
    Account {
        #[arg(value_name = "IGNORED", hide = true)]
        ignored: Vec<String>,
    },
}

#[derive(Subcommand)]
pub enum StartCommands {
    /// Start a stopped instance
    Instance(commands::instance::IdArgs),
    /// Start a list of stopped instances
    Instances(commands::instance::IdListArgs),
}

#[derive(Subcommand)]
pub enum StopCommands {
    /// Stop a running instance
    Instance(commands::instance::IdArgs),
    /// Stop a list of running instances
    Instances(commands::instance::IdListArgs),
}

#[derive(Subcommand)]
pub enum LabelCommands {
    /// Assign a string label to an instance
    Instance(commands::instance::LabelArgs),
}

#[derive(Subcommand)]
pub enum DestroyCommands {
    /// Destroy an instance (irreversible, deletes data)
    Instance(commands::instance::IdArgs),
    /// Destroy a list of instances (irreversible, deletes data)
    Instances(commands::instance::DestroyManyArgs),
}

#[derive(Subcommand)]
pub enum ChangeCommands {
    /// Change the bid price for a spot/interruptible instance
    Bid(commands::instance::PriceArgs),
}

#[derive(Subcommand)]
pub enum ListCommands {
    /// [Host] list a machine for rent
    Machine(commands::machine::ListArgs),
}

#[derive(Subcommand)]
pub enum UnlistCommands {
    /// [Host] Unlist a listed machine
    Machine(commands::machine::MachineIdArgs),
}

#[derive(Subcommand)]
pub enum SetCommands {
    /// [Host] Create default jobs for a machine
    Defjob(commands::machine::DefJobArgs),
    /// [Host] Set the minimum bid/rental price for a machine
    MinBid(commands::machine::MinBidArgs),
    /// Set api-key (get your api-key from the console/CLI)
    ApiKey {
        /// Api key to save for later commands
        new_api_key: String,
    },
}

#[derive(Subcommand)]
pub enum RemoveCommands {
    /// [Host] Delete default jobs
    Defjob(commands::machine::MachineIdArgs),
}

/// Main CLI runner
pub async fn run() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::new()?.with_overrides(cli.global.overrides());
    let ctx = Context::new(config, cli.global.raw);

    match cli.command {
        Commands::Search {
            object: SearchCommands::Offers(args),
        } => commands::search::handle(args, &ctx).await,
        Commands::Show { object } => commands::show::handle(object, &ctx).await,
        Commands::SshUrl(args) => commands::ssh::handle_ssh(args, &ctx).await,
        Commands::ScpUrl(args) => commands::ssh::handle_scp(args, &ctx).await,
        Commands::Create { object } => match object {
            CreateCommands::Instance(args) => commands::instance::handle_create(args, &ctx).await,
            CreateCommands::Account { .. } => commands::account::handle_deprecated(),
        },
        Commands::Start { object } => match object {
            StartCommands::Instance(args) => commands::instance::handle_start(args, &ctx).await,
            StartCommands::Instances(args) => {
                commands::instance::handle_start_many(args, &ctx).await
            }
        },
        Commands::Stop { object } => match object {
            StopCommands::Instance(args) => commands::instance::handle_stop(args, &ctx).await,
            StopCommands::Instances(args) => commands::instance::handle_stop_many(args, &ctx).await,
        },
        Commands::Label {
            object: LabelCommands::Instance(args),
        } => commands::instance::handle_label(args, &ctx).await,
        Commands::Destroy { object } => match object {
            DestroyCommands::Instance(args) => commands::instance::handle_destroy(args, &ctx).await,
            DestroyCommands::Instances(args) => {
                commands::instance::handle_destroy_many(args, &ctx).await
            }
        },
        Commands::Change {
            object: ChangeCommands::Bid(args),
        } => commands::instance::handle_change_bid(args, &ctx).await,
        Commands::List {
            object: ListCommands::Machine(args),
        } => commands::machine::handle_list(args, &ctx).await,
        Commands::Unlist {
            object: UnlistCommands::Machine(args),
        } => commands::machine::handle_unlist(args, &ctx).await,
        Commands::Set { object } => match object {
            SetCommands::Defjob(args) => commands::machine::handle_set_defjob(args, &ctx).await,
            SetCommands::MinBid(args) => commands::machine::handle_set_min_bid(args, &ctx).await,
            SetCommands::ApiKey { new_api_key } => {
                commands::account::handle_set_api_key(&new_api_key, &ctx)
            }
        },
        Commands::Remove {
            object: RemoveCommands::Defjob(args),
        } => commands::machine::handle_remove_defjob(args, &ctx).await,
        Commands::Login { .. } => commands::account::handle_deprecated(),
    }
}
