//! vmware-inventory
//!
//! Dynamic inventory script: discovers clusters, hosts and VMs from a
//! management endpoint and prints them as an inventory document on stdout.
//! Diagnostics go to stderr.

use std::path::PathBuf;

use clap::Parser;
use color_eyre::Result;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};
use vminv_inventory::config::default_config_path;
use vminv_inventory::{BuildError, ConfigResolver, InventoryBuilder};
use vminv_session::{SessionProvider, SnapshotProvider};

mod error;

use error::RunError;

/// VMware dynamic inventory
#[derive(Parser, Debug)]
#[command(name = "vmware-inventory", version, about)]
struct Args {
    /// Print the full inventory
    #[arg(long, conflicts_with = "host")]
    list: bool,

    /// Print variables for a single host (always empty; use --list)
    #[arg(long, value_name = "NAME")]
    host: Option<String>,

    /// Discard the cached inventory and rebuild
    #[arg(long)]
    refresh_cache: bool,

    /// Enable debug logging
    #[arg(long)]
    debug: bool,

    /// Configuration file (defaults to vmware_inventory.toml next to the executable)
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,
}

/// Initialize stderr logging; `RUST_LOG` overrides the level
fn init_tracing(debug: bool) {
    let level = if debug { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();
}

/// Cancel `token` on Ctrl-C
fn watch_interrupt(token: CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received, stopping traversal");
            token.cancel();
        }
    });
}

async fn run(args: &Args, cancel: CancellationToken) -> Result<(), RunError> {
    let path = args.config.clone().unwrap_or_else(default_config_path);
    debug!(path = %path.display(), "loading configuration");
    let environment = std::env::vars_os()
        .filter_map(|(key, value)| Some((key.into_string().ok()?, value.into_string().ok()?)));
    let config = ConfigResolver::new().load(&path, environment)?;

    if let Some(host) = &args.host {
        debug!(host = %host, "per-host variables are served through --list");
        println!("{{}}");
        return Ok(());
    }

    let session = SnapshotProvider::new()
        .connect(&config.connection_info())
        .await?;

    let result = InventoryBuilder::new(&config, session)
        .with_cancellation(cancel)
        .build(args.refresh_cache)
        .await;

    let document = match result {
        Ok(document) => document,
        Err(BuildError::Interrupted(partial)) => {
            error!(
                partial = %partial.to_json().unwrap_or_default(),
                "inventory build interrupted, partial inventory not cached"
            );
            return Err(BuildError::Interrupted(partial).into());
        }
        Err(e) => return Err(e.into()),
    };

    if args.list {
        println!("{}", document.to_json()?);
    } else {
        info!("inventory built; pass --list to print it");
    }

    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize error handling
    color_eyre::install()?;

    let args = Args::parse();
    init_tracing(args.debug);
    debug!(?args, "running vmware-inventory");

    let cancel = CancellationToken::new();
    watch_interrupt(cancel.clone());

    if let Err(e) = run(&args, cancel).await {
        error!(error = %e, "inventory run failed");
        std::process::exit(e.exit_code());
    }

    Ok(())
}
