use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueHint, builder::BoolishValueParser};

/// Command-line arguments for the Omnia binary.
#[derive(Debug, Parser)]
#[command(
    name = "omnia",
    version,
    about = "Hydrating read client for the Omnia item API"
)]
pub struct CliArgs {
    /// Optional path to a configuration file.
    #[arg(long = "config-file", env = "OMNIA_CONFIG_FILE", value_name = "PATH")]
    pub config_file: Option<PathBuf>,

    #[command(flatten)]
    pub overrides: GlobalOverrides,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Hydrate a collection (or one record of it) and print it as JSON.
    Get(GetArgs),
    /// List the known collections and how each one is hydrated.
    Plans,
    /// Create an item through the write API.
    Create(CreateArgs),
    /// Update an item through the write API.
    Update(UpdateArgs),
}

#[derive(Debug, Args, Clone)]
pub struct GetArgs {
    /// Collection name, e.g. `actants`.
    #[arg(value_name = "COLLECTION")]
    pub collection: String,

    /// Return only the record with this id.
    #[arg(long, value_name = "ID")]
    pub id: Option<String>,
}

#[derive(Debug, Args, Clone)]
pub struct PayloadArgs {
    /// Inline JSON object.
    #[arg(long, value_name = "JSON", conflicts_with = "data_file")]
    pub data: Option<String>,

    /// Read the JSON object from a file.
    #[arg(long = "data-file", value_name = "FILE", value_hint = ValueHint::FilePath)]
    pub data_file: Option<PathBuf>,
}

#[derive(Debug, Args, Clone)]
pub struct CreateArgs {
    /// Remote resource name, e.g. `items`.
    #[arg(value_name = "RESOURCE")]
    pub resource: String,

    #[command(flatten)]
    pub payload: PayloadArgs,
}

#[derive(Debug, Args, Clone)]
pub struct UpdateArgs {
    #[arg(value_name = "RESOURCE")]
    pub resource: String,

    #[arg(value_name = "ID")]
    pub id: String,

    #[command(flatten)]
    pub payload: PayloadArgs,
}

#[derive(Debug, Args, Default, Clone)]
pub struct GlobalOverrides {
    /// Override the read endpoint of the item API.
    #[arg(long = "api-base-url", value_name = "URL", global = true)]
    pub api_base_url: Option<String>,

    /// Override the per-request timeout.
    #[arg(long = "api-timeout-seconds", value_name = "SECONDS", global = true)]
    pub api_timeout_seconds: Option<u64>,

    /// Override the write endpoint of the item API.
    #[arg(long = "write-base-url", value_name = "URL", global = true)]
    pub write_base_url: Option<String>,

    /// Override the base log level (trace|debug|info|warn|error).
    #[arg(long = "log-level", value_name = "LEVEL", global = true)]
    pub log_level: Option<String>,

    /// Toggle JSON logging.
    #[arg(
        long = "log-json",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new(),
        global = true
    )]
    pub log_json: Option<bool>,

    /// Toggle the session cache.
    #[arg(
        long = "cache-enabled",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new(),
        global = true
    )]
    pub cache_enabled: Option<bool>,

    /// Override the cache backend (memory|session_dir).
    #[arg(long = "cache-backend", value_name = "BACKEND", global = true)]
    pub cache_backend: Option<String>,
}
