//! BEARS-TP Receiver
//!
//! Accepts one transfer on a UDP port and writes it to a file or stdout.

use anyhow::Context;
use bears::protocol::ReceiverError;
use bears::TransferError;
use bears_cli::{Config, ReceiverConfig};
use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "bears-receiver")]
#[command(about = "BEARS-TP reference receiver", long_about = None)]
struct Args {
    /// Listen port
    #[arg(short, long)]
    port: Option<u16>,

    /// Output file ('-' for stdout)
    #[arg(short, long)]
    output: Option<String>,

    /// Bind address
    #[arg(short, long)]
    bind: Option<String>,

    /// Debug logging
    #[arg(short, long)]
    debug: bool,

    /// TOML configuration file with a [receiver] table
    #[arg(long)]
    config: Option<PathBuf>,

    /// Exit after this many seconds without traffic
    #[arg(long)]
    idle_timeout: Option<u64>,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    bears_cli::init_logging(args.debug);

    let mut config = match &args.config {
        Some(path) => Config::from_file(path)
            .with_context(|| format!("loading {}", path.display()))?
            .receiver
            .unwrap_or_default(),
        None => ReceiverConfig::default(),
    };
    if let Some(port) = args.port {
        config.port = port;
    }
    if let Some(output) = args.output {
        config.output = output;
    }
    if let Some(bind) = args.bind {
        config.bind = bind;
    }
    if args.idle_timeout.is_some() {
        config.idle_timeout_secs = args.idle_timeout;
    }

    tracing::info!("BEARS-TP receiver starting...");
    let local = config.bind_addr()?;
    let mut output = bears_cli::open_output(&config.output)
        .with_context(|| format!("opening {}", config.output))?;
    let cancel = bears_cli::cancel_on_signal()?;

    match bears::receive(local, &mut output, &config.to_options(), &cancel) {
        Ok(summary) => {
            bears_cli::display_receiver_summary(&summary);
            Ok(())
        }
        Err(TransferError::Receiver(ReceiverError::Cancelled)) => {
            tracing::warn!("Interrupted");
            std::process::exit(130);
        }
        Err(e) => Err(e.into()),
    }
}
