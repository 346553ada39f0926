//! NPAS hook runner.
//!
//! This is the entry point for the `npas-hook` binary. Each invocation opens
//! the data directory, performs one action against the relation and exits,
//! the same way the hosting framework runs one hook per process.

mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Drive the subordinate side of the neutron-plugin-api-subordinate relation.
#[derive(Parser, Debug)]
#[command(name = "npas-hook")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Directory holding flags and conversation data.
    #[arg(long, env = "NPAS_DATA_DIR", default_value = "./npas-data")]
    data_dir: PathBuf,

    /// JSON file with relation configuration.
    #[arg(long, env = "NPAS_CONFIG")]
    config: Option<PathBuf>,

    /// Override the relation name from the configuration.
    #[arg(long, env = "NPAS_RELATION")]
    relation: Option<String>,

    /// Enable debug logging.
    #[arg(long, default_value = "false")]
    debug: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run a relation hook, e.g. `neutron-plugin-api-subordinate-relation-changed`.
    Hook {
        /// Full hook name.
        #[arg(env = "NPAS_HOOK_NAME")]
        name: String,
    },

    /// Publish the plugin configuration.
    Configure(commands::ConfigureArgs),

    /// Ask the principal to restart services.
    Restart {
        /// Service type to restart; all services when omitted.
        #[arg(long)]
        service_type: Option<String>,
    },

    /// Ask the principal to run database migrations.
    Migrate,

    /// Publish keys as the principal would (`KEY=VALUE`).
    PeerSet {
        /// Settings to publish.
        #[arg(required = true, value_parser = commands::parse_setting)]
        settings: Vec<(String, String)>,
    },

    /// Withdraw keys as the principal would.
    PeerUnset {
        /// Keys to withdraw.
        #[arg(required = true)]
        keys: Vec<String>,
    },

    /// Print flags and both sides of the conversation as JSON.
    Status,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let default_filter = if args.debug {
        "npas_hook=debug,npas_relation=debug,npas_store=debug,info"
    } else {
        "info"
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let config = commands::load_config(args.config.as_deref(), args.relation.as_deref())?;
    let ctx = commands::Context::open(&args.data_dir, config)?;
    tracing::debug!(
        data_dir = %args.data_dir.display(),
        relation = %ctx.relation(),
        "Opened data directory"
    );

    match args.command {
        Command::Hook { name } => ctx.run_hook(&name),
        Command::Configure(configure) => ctx.configure(&configure),
        Command::Restart { service_type } => ctx.restart(service_type.as_deref()),
        Command::Migrate => ctx.migrate(),
        Command::PeerSet { settings } => ctx.peer_set(settings),
        Command::PeerUnset { keys } => ctx.peer_unset(keys),
        Command::Status => ctx.status(),
    }
}
