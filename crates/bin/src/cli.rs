//! CLI argument definitions for the Sharedoc binary.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use sharedoc::ops::Side;

use crate::output::OutputFormat;

/// Output format flag
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum Format {
    /// Aligned tables and pretty JSON
    Human,
    /// One JSON document on stdout
    Json,
}

impl From<Format> for OutputFormat {
    fn from(format: Format) -> Self {
        match format {
            Format::Human => OutputFormat::Human,
            Format::Json => OutputFormat::Json,
        }
    }
}

/// Which operation wins a tie in `transform`
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum TieSide {
    /// The transformed operation is ordered before the one it is transformed against
    Before,
    /// The transformed operation is ordered after the one it is transformed against
    After,
}

impl From<TieSide> for Side {
    fn from(side: TieSide) -> Self {
        match side {
            TieSide::Before => Side::Before,
            TieSide::After => Side::After,
        }
    }
}

/// Sharedoc shared document operator tool
#[derive(Parser, Debug)]
#[command(name = "sharedoc")]
#[command(about = "Sharedoc: inspect and replay collaborative document operations")]
#[command(version)]
pub struct Cli {
    /// Document config file (JSON)
    #[arg(short, long, global = true, env = "SHAREDOC_CONFIG")]
    pub config: Option<PathBuf>,

    /// Output format
    #[arg(short, long, global = true, default_value = "human")]
    pub format: Format,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Apply a log of operation records to a fresh document
    Replay(ReplayArgs),
    /// Transform one operation against a concurrent one
    Transform(TransformArgs),
}

/// Arguments for the replay command
#[derive(clap::Args, Debug)]
pub struct ReplayArgs {
    /// JSON array of operation records
    pub ops: PathBuf,

    /// Participant address of the replaying replica
    #[arg(short, long, default_value = "replay@localhost", env = "SHAREDOC_PARTICIPANT")]
    pub participant: String,

    /// Replica id of the replaying handle; must differ from every replica in the log
    #[arg(long, default_value = "replay")]
    pub replica: String,

    /// Document id used in log output
    #[arg(long, default_value = "replay")]
    pub document: String,
}

/// Arguments for the transform command
#[derive(clap::Args, Debug)]
pub struct TransformArgs {
    /// JSON file with the operation to transform
    pub op: PathBuf,

    /// JSON file with the concurrent operation it is transformed against
    pub against: PathBuf,

    /// Tie-break side of the transformed operation
    #[arg(long, default_value = "after")]
    pub tie_break: TieSide,
}
