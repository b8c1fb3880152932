//! smbfsp - serve file-system provider requests over stdio
//!
//! Usage:
//!   smbfsp --export-root <dir>        Serve <dir>'s subdirectories as shares
//!   smbfsp --print-config             Print a sample configuration file
//!
//! Requests arrive one JSON envelope per line on stdin; responses are written
//! the same way to stdout. Logs go to stderr.

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tracing::{info, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use smbfsp_core::Config;
use smbfsp_daemon::bridge::serve;
use smbfsp_daemon::credentials::CredentialStore;
use smbfsp_daemon::dispatcher::Dispatcher;
use smbfsp_daemon::provider::Provider;
use smbfsp_daemon::remote::LocalFs;

#[derive(Parser)]
#[command(name = "smbfsp")]
#[command(about = "SMB file-system provider bridge", long_about = None)]
struct Cli {
    /// Configuration file (default: platform config directory)
    #[arg(short, long, env = "SMBFSP_CONFIG")]
    config: Option<PathBuf>,

    /// Directory whose subdirectories are served as shares
    #[arg(short, long, env = "SMBFSP_EXPORT_ROOT")]
    export_root: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Print a sample configuration file and exit
    #[arg(long)]
    print_config: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    if cli.print_config {
        print!("{}", Config::sample());
        return Ok(());
    }

    // stdout carries envelopes, so logs go to stderr
    let level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level.to_string().to_lowercase()));
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
        .with(filter)
        .init();

    let config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load(),
    };

    let export_root = cli
        .export_root
        .or_else(|| config.local.export_root.clone())
        .ok_or("no export root given (use --export-root or [local] export_root)")?;
    let export_root = export_root.canonicalize()?;
    if !export_root.is_dir() {
        return Err(format!("export root is not a directory: {:?}", export_root).into());
    }

    let credentials = CredentialStore::new();
    let fs = LocalFs::new(export_root.clone()).with_auth(Arc::new(credentials.clone()));
    let provider = Provider::new(Arc::new(fs), credentials, config.provider.clone());
    let dispatcher = Dispatcher::new(provider);

    info!("smbfsp serving shares from {:?}", export_root);
    serve(
        tokio::io::stdin(),
        tokio::io::stdout(),
        dispatcher,
        config.transport.queue_depth,
    )
    .await?;
    info!("input closed, exiting");

    Ok(())
}
