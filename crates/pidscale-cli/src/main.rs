use std::path::PathBuf;

use clap::{Parser, Subcommand};

mod commands;
mod config;

#[derive(Parser)]
#[command(
    name = "pidscale",
    about = "pidscale — PID scaling strategy host",
    version,
    propagate_version = true,
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print plugin metadata
    Info,
    /// Evaluate scaling checks read as JSON lines.
    ///
    /// Each line holds `check`, `metrics` and the current `count`; one JSON
    /// decision is printed per line. Controller state persists across lines.
    Run {
        /// Plugin-wide config (TOML with a [strategy] table)
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// Input file (default: stdin)
        #[arg(short, long)]
        input: Option<PathBuf>,
    },
    /// Print the policy key derived for a scaling check
    Key {
        #[arg(long, default_value = "")]
        source: String,
        #[arg(long, default_value = "")]
        query: String,
        #[arg(long, default_value = "")]
        group: String,
        #[arg(long, default_value = "")]
        name: String,
        #[arg(long, default_value = "pid")]
        strategy: String,
    },
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("pidscale=info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Info => commands::inspect::info(),
        Commands::Run { config, input } => {
            commands::run::run(config.as_deref(), input.as_deref())
        }
        Commands::Key {
            source,
            query,
            group,
            name,
            strategy,
        } => commands::inspect::key(&source, &query, &group, &name, &strategy),
    }
}
