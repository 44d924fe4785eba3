use std::path::PathBuf;

use anyhow::Result;
use clap::{ArgAction, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use dpamvifctl::cmd_export;
use dpamvifctl::cmd_generate::{self, GenerateArgs};
use dpamvifctl::cmd_get;
use dpamvifctl::cmd_import;
use dpamvifctl::cmd_merge::{self, MergeArgs};
use dpamvifctl::cmd_ports;
use dpamvifctl::cmd_schema;
use dpamvifctl::cmd_set;
use dpamvifctl::persist::DEFAULT_STORE_PATH;

#[derive(Parser, Debug)]
#[command(name = "dpamvifctl", version, about = "DisplayPort Alt Mode VIF generator")]
struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
    /// Output JSON where applicable
    #[arg(long)]
    json: bool,
    /// Persisted capability values and last-used paths
    #[arg(long, default_value = DEFAULT_STORE_PATH)]
    store: PathBuf,
    #[command(subcommand)]
    cmd: Cmd,
}

#[derive(Subcommand, Debug)]
enum Cmd {
    /// Merge a settings document into a VIF (batch mode)
    Merge {
        #[arg(short, long)]
        input: Option<PathBuf>,
        #[arg(short, long)]
        output: Option<PathBuf>,
        #[arg(short, long)]
        settings: Option<PathBuf>,
        /// Leave ports without settings unchanged instead of failing
        #[arg(long)]
        skip_missing_ports: bool,
    },
    /// List the Port_Labels of a VIF
    Ports {
        #[arg(short, long)]
        input: Option<PathBuf>,
    },
    /// List the capability fields
    Schema,
    /// Read one capability field of one port
    Get {
        #[arg(long)]
        field: String,
        #[arg(long, default_value_t = 0)]
        port: usize,
    },
    /// Write one capability field of one port
    Set {
        #[arg(long)]
        field: String,
        #[arg(long, default_value_t = 0)]
        port: usize,
        #[arg(long)]
        value: String,
    },
    /// Load a settings document into the store
    Import {
        #[arg(short, long)]
        input: Option<PathBuf>,
        #[arg(short, long)]
        settings: Option<PathBuf>,
    },
    /// Save the store as a settings document
    Export {
        #[arg(short, long)]
        input: Option<PathBuf>,
        #[arg(short, long)]
        settings: Option<PathBuf>,
    },
    /// Merge the store into a VIF in the background
    Generate {
        #[arg(short, long)]
        input: Option<PathBuf>,
        #[arg(short, long)]
        output: Option<PathBuf>,
        #[arg(long)]
        skip_missing_ports: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let Cli {
        verbose,
        json,
        store,
        cmd,
    } = Cli::parse();

    let level = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| level.into()),
        ))
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match cmd {
        Cmd::Merge {
            input,
            output,
            settings,
            skip_missing_ports,
        } => {
            let args = MergeArgs {
                input,
                output,
                settings,
                skip_missing_ports,
            };
            cmd_merge::run(args, json).await?
        }
        Cmd::Ports { input } => cmd_ports::run(input, &store, json).await?,
        Cmd::Schema => cmd_schema::run(json)?,
        Cmd::Get { field, port } => cmd_get::run(field, port, &store, json).await?,
        Cmd::Set { field, port, value } => cmd_set::run(field, port, value, &store, json).await?,
        Cmd::Import { input, settings } => cmd_import::run(input, settings, &store, json).await?,
        Cmd::Export { input, settings } => cmd_export::run(input, settings, &store, json).await?,
        Cmd::Generate {
            input,
            output,
            skip_missing_ports,
        } => {
            let args = GenerateArgs {
                input,
                output,
                skip_missing_ports,
            };
            cmd_generate::run(args, &store, json).await?
        }
    };

    Ok(())
}
