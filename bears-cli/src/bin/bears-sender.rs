//! BEARS-TP Sender
//!
//! Reads a file or stdin and delivers it reliably to a BEARS-TP receiver
//! over UDP.

use anyhow::Context;
use bears::protocol::packet::MIN_PAYLOAD_SIZE;
use bears::{SenderError, SharedStats, TransferError};
use bears_cli::{Config, SenderConfig};
use clap::Parser;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

#[derive(Parser, Debug)]
#[command(name = "bears-sender")]
#[command(about = "BEARS-TP reliable file sender", long_about = None)]
struct Args {
    /// File to send ('-' or omitted for stdin)
    #[arg(short, long)]
    file: Option<String>,

    /// Destination port
    #[arg(short, long)]
    port: Option<u16>,

    /// Destination address
    #[arg(short, long)]
    address: Option<String>,

    /// Debug logging
    #[arg(short, long)]
    debug: bool,

    /// Selective acknowledgement mode
    #[arg(short = 'k', long)]
    sack: bool,

    /// TOML configuration file with a [sender] table
    #[arg(long)]
    config: Option<PathBuf>,

    /// Maximum outstanding packets
    #[arg(long)]
    window: Option<usize>,

    /// Retransmission timeout in milliseconds
    #[arg(long)]
    timeout_ms: Option<u64>,

    /// Statistics interval in seconds
    #[arg(long)]
    stats: Option<u64>,
}

impl Args {
    fn apply(&self, config: &mut SenderConfig) {
        if let Some(file) = &self.file {
            config.input = file.clone();
        }
        if let Some(port) = self.port {
            config.port = port;
        }
        if let Some(address) = &self.address {
            config.address = address.clone();
        }
        if self.sack {
            config.sack = true;
        }
        if let Some(window) = self.window {
            config.window_size = window;
        }
        if let Some(timeout_ms) = self.timeout_ms {
            config.timeout_ms = timeout_ms;
        }
        if let Some(stats) = self.stats {
            config.stats_interval_secs = stats;
        }
    }
}

/// Print compact stats every `interval` until `done` is set
fn spawn_reporter(
    stats: SharedStats,
    interval: Duration,
    done: Arc<AtomicBool>,
) -> thread::JoinHandle<()> {
    thread::spawn(move || {
        let started = Instant::now();
        let tick = Duration::from_millis(100).min(interval);
        let mut next = started + interval;
        while !done.load(Ordering::Relaxed) {
            thread::sleep(tick);
            if Instant::now() >= next {
                let snapshot = stats.read().clone();
                bears_cli::display_compact_stats(&snapshot, started.elapsed());
                next += interval;
            }
        }
    })
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    bears_cli::init_logging(args.debug);

    let mut config = match &args.config {
        Some(path) => Config::from_file(path)
            .with_context(|| format!("loading {}", path.display()))?
            .sender
            .unwrap_or_default(),
        None => SenderConfig::default(),
    };
    args.apply(&mut config);

    let options = config.to_options()?;
    if options.payload_size < MIN_PAYLOAD_SIZE {
        tracing::warn!(
            "payload size {} is below {} bytes; throughput will suffer",
            options.payload_size,
            MIN_PAYLOAD_SIZE
        );
    }
    if options.sack_mode {
        tracing::info!("Selective acknowledgement requested; cumulative ACKs remain in effect");
    }

    tracing::info!("BEARS-TP sender starting...");
    let input = bears_cli::open_input(&config.input)
        .with_context(|| format!("opening {}", config.input))?;
    let cancel = bears_cli::cancel_on_signal()?;
    let stats = SharedStats::default();

    let done = Arc::new(AtomicBool::new(false));
    let reporter = config
        .stats_interval()
        .map(|interval| spawn_reporter(SharedStats::clone(&stats), interval, Arc::clone(&done)));

    let result = bears::send(
        &config.address,
        config.port,
        input,
        options,
        &cancel,
        &stats,
    );

    done.store(true, Ordering::Relaxed);
    if let Some(reporter) = reporter {
        let _ = reporter.join();
        eprintln!();
    }

    match result {
        Ok(summary) => {
            bears_cli::display_sender_summary(&summary);
            Ok(())
        }
        Err(TransferError::Sender(SenderError::Cancelled)) => {
            tracing::warn!("Interrupted");
            std::process::exit(130);
        }
        Err(e) => Err(e.into()),
    }
}
