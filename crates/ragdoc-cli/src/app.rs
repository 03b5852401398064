//! CLI argument definitions

use clap::{Args, Parser, Subcommand, ValueEnum};
use ragdoc_core::Capability;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "ragdoc")]
#[command(
    author,
    version,
    about = "Ask questions about your documents with any LLM or embedding backend"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Settings file (defaults to the user config directory)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Database path, overriding the settings file
    #[arg(long, global = true, env = "RAGDOC_DB")]
    pub db: Option<PathBuf>,

    /// Output format
    #[arg(long, global = true, value_enum, default_value = "cli")]
    pub format: OutputFormat,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Chunk, embed and store text files
    Ingest(IngestArgs),

    /// Vector similarity search over stored chunks
    Search(SearchArgs),

    /// Answer a question from the stored documents
    Chat(ChatArgs),

    /// Re-embed stored documents with the current embedding provider
    Reindex(ReindexArgs),

    /// List stored documents
    #[command(alias = "ls")]
    Documents,

    /// Delete a document and its chunks
    #[command(alias = "rm")]
    Delete { id: i64 },

    /// Describe the registered providers
    Providers(ProvidersArgs),

    /// Probe the active providers
    Health,

    /// Show or create the settings file
    Config(ConfigArgs),
}

#[derive(Args)]
pub struct IngestArgs {
    /// Files or directories; pages are separated by form feeds
    #[arg(required = true)]
    pub paths: Vec<PathBuf>,

    /// Glob applied to files found under directories
    #[arg(long, default_value = "**/*.txt")]
    pub pattern: String,
}

#[derive(Args)]
pub struct SearchArgs {
    /// Search query
    #[arg(required = true)]
    pub query: Vec<String>,

    /// Number of results (defaults to top_k from settings)
    #[arg(short = 'n')]
    pub limit: Option<usize>,

    /// Restrict to these document ids
    #[arg(long = "doc")]
    pub documents: Vec<i64>,
}

#[derive(Args)]
pub struct ChatArgs {
    /// Question
    #[arg(required = true)]
    pub query: Vec<String>,

    /// Number of context chunks (defaults to top_k from settings)
    #[arg(short = 'n')]
    pub limit: Option<usize>,

    /// Restrict context to these document ids
    #[arg(long = "doc")]
    pub documents: Vec<i64>,

    /// Print the answer as it is generated
    #[arg(long)]
    pub stream: bool,
}

#[derive(Args)]
pub struct ReindexArgs {
    /// Document to reindex
    #[arg(conflicts_with = "all", required_unless_present = "all")]
    pub id: Option<i64>,

    /// Reindex every document
    #[arg(long)]
    pub all: bool,
}

#[derive(Args)]
pub struct ProvidersArgs {
    /// Only this capability
    #[arg(value_enum)]
    pub capability: Option<CapabilityArg>,
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum CapabilityArg {
    Llm,
    Embedding,
}

impl From<CapabilityArg> for Capability {
    fn from(arg: CapabilityArg) -> Self {
        match arg {
            CapabilityArg::Llm => Capability::Llm,
            CapabilityArg::Embedding => Capability::Embedding,
        }
    }
}

#[derive(Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub action: ConfigAction,
}

#[derive(Subcommand)]
pub enum ConfigAction {
    /// Print the effective settings
    Show,
    /// Write a settings file with the current values
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Cli,
    Json,
}
