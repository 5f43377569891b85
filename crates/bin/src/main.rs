use clap::Parser;
use sharedoc::DocumentConfig;
use tracing_subscriber::EnvFilter;

mod cli;
mod commands {
    pub mod replay;
    pub mod transform;
}
mod output;

use cli::{Cli, Commands};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Logs go to stderr so stdout stays machine-readable.
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("sharedoc=warn".parse()?))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let format = cli.format.into();

    let config = match &cli.config {
        Some(path) => {
            let config = DocumentConfig::from_file(path)?;
            tracing::info!(path = %path.display(), ?config, "loaded config");
            config
        }
        None => DocumentConfig::default(),
    };

    match &cli.command {
        Commands::Replay(args) => commands::replay::run(args, config, format),
        Commands::Transform(args) => commands::transform::run(args, format),
    }
}
