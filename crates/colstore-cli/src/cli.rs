use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "colstore",
    about = "colstore: mirror document collections into observable lists",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Client configuration file (TOML)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// JSON seed for the in-memory service: { collection: { id: fields } }
    #[arg(long, global = true)]
    pub seed: Option<PathBuf>,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Command {
    /// Mirror a collection from the seeded service and print its list.
    ///
    /// The service lives in this process, so the list is final once the
    /// store has synced and the command exits.
    Watch(WatchArgs),
    /// Write a document, then print the mirrored collection
    Send(SendArgs),
    /// Print the effective client configuration
    Config,
}

#[derive(Args, Clone, Debug, Default)]
pub struct ShapeArgs {
    /// Order by this field
    #[arg(long)]
    pub order_by: Option<String>,
    /// Sort descending
    #[arg(long, requires = "order_by")]
    pub desc: bool,
    /// Maximum number of documents
    #[arg(long)]
    pub limit: Option<usize>,
    /// Equality filter FIELD=VALUE; VALUE is parsed as JSON, else taken as a string
    #[arg(long = "where", value_name = "FIELD=VALUE")]
    pub filters: Vec<String>,
}

#[derive(Args)]
pub struct WatchArgs {
    pub collection: String,
    #[command(flatten)]
    pub shape: ShapeArgs,
    /// Publish one list per appended document instead of one per snapshot
    #[arg(long)]
    pub incremental: bool,
}

#[derive(Args)]
pub struct SendArgs {
    pub collection: String,
    /// Document fields as a JSON object
    pub data: String,
    /// Document id; omitted means the service assigns one
    #[arg(long)]
    pub id: Option<String>,
    #[command(flatten)]
    pub shape: ShapeArgs,
}
