//! BEARS-TP CLI Library
//!
//! Shared functionality for the BEARS-TP command-line tools.

pub mod config;
pub mod stats;

pub use config::{Config, ConfigError, ReceiverConfig, SenderConfig, DEFAULT_PORT};
pub use stats::{
    display_compact_stats, display_receiver_summary, display_sender_summary, format_bandwidth,
    format_bytes, format_duration,
};

use bears::CancelToken;
use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Write};
use tracing_subscriber::EnvFilter;

/// Install the stderr log subscriber
///
/// `RUST_LOG` wins when set; otherwise `debug` raises the level from info.
pub fn init_logging(debug: bool) {
    let default_level = if debug { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

/// Token that trips on SIGINT or SIGTERM
pub fn cancel_on_signal() -> io::Result<CancelToken> {
    let token = CancelToken::new();
    signal_hook::flag::register(signal_hook::consts::SIGTERM, token.flag())?;
    signal_hook::flag::register(signal_hook::consts::SIGINT, token.flag())?;
    Ok(token)
}

/// Open a file for reading, or stdin for "-"
pub fn open_input(path: &str) -> io::Result<Box<dyn Read + Send>> {
    if path == "-" {
        tracing::info!("Reading from stdin");
        Ok(Box::new(io::stdin()))
    } else {
        tracing::info!("Reading from {}", path);
        Ok(Box::new(BufReader::new(File::open(path)?)))
    }
}

/// Create a file for writing, or stdout for "-"
pub fn open_output(path: &str) -> io::Result<Box<dyn Write + Send>> {
    if path == "-" {
        Ok(Box::new(io::stdout()))
    } else {
        tracing::info!("Writing to {}", path);
        Ok(Box::new(BufWriter::new(File::create(path)?)))
    }
}
