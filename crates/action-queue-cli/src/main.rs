mod cmd;
mod offline;
mod output;
mod root;

use clap::{Parser, Subcommand};
use cmd::config::ConfigSubcommand;
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "aq",
    about = "Inspect and operate the action program queue",
    version,
    propagate_version = true
)]
struct Cli {
    /// Directory holding .aq/ (default: search upward from cwd)
    #[arg(long, global = true, env = "AQ_ROOT")]
    root: Option<PathBuf>,

    /// Output as JSON
    #[arg(long, short = 'j', global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create .aq/config.yaml with defaults
    Init,

    /// List stored programs
    List,

    /// Show one program: actions, current effect, push events
    Show {
        /// Program id
        id: String,
    },

    /// Stop a program and withdraw its push events
    Cancel {
        /// Program id
        id: String,
    },

    /// Delete a finished program
    Remove {
        /// Program id
        id: String,
    },

    /// Delete every finished program
    Prune,

    /// Release claims left behind by runners that died mid-step
    Recover,

    /// Re-register the device and every pending program's triggers
    Sync,

    /// Inspect the config
    Config {
        #[command(subcommand)]
        subcommand: ConfigSubcommand,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into()),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let root = root::resolve_root(cli.root.as_deref());

    let result = match cli.command {
        Commands::Init => cmd::init::run(&root),
        Commands::List => cmd::list::run(&root, cli.json),
        Commands::Show { id } => cmd::show::run(&root, &id, cli.json),
        Commands::Cancel { id } => cmd::cancel::run(&root, &id, cli.json).await,
        Commands::Remove { id } => cmd::remove::run(&root, &id, cli.json).await,
        Commands::Prune => cmd::prune::run(&root, cli.json).await,
        Commands::Recover => cmd::recover::run(&root, cli.json),
        Commands::Sync => cmd::sync::run(&root, cli.json).await,
        Commands::Config { subcommand } => cmd::config::run(&root, subcommand, cli.json),
    };

    if let Err(e) = result {
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}
