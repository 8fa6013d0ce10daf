//! Statistics display and formatting
//!
//! Everything here writes to stderr; stdout may be carrying received data.

use bears::protocol::ReceiverSummary;
use bears::{SenderStats, SenderSummary};
use std::time::Duration;

/// Format bytes in human-readable form
pub fn format_bytes(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.2} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}

/// Format bandwidth in human-readable form
pub fn format_bandwidth(bps: u64) -> String {
    const KBPS: u64 = 1000;
    const MBPS: u64 = KBPS * 1000;
    const GBPS: u64 = MBPS * 1000;

    if bps >= GBPS {
        format!("{:.2} Gbps", bps as f64 / GBPS as f64)
    } else if bps >= MBPS {
        format!("{:.2} Mbps", bps as f64 / MBPS as f64)
    } else if bps >= KBPS {
        format!("{:.2} Kbps", bps as f64 / KBPS as f64)
    } else {
        format!("{} bps", bps)
    }
}

/// Format duration in human-readable form
pub fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    let hours = secs / 3600;
    let minutes = (secs % 3600) / 60;
    let seconds = secs % 60;

    if hours > 0 {
        format!("{}h {:02}m {:02}s", hours, minutes, seconds)
    } else if minutes > 0 {
        format!("{}m {:02}s", minutes, seconds)
    } else if secs > 0 {
        format!("{}s", seconds)
    } else {
        format!("{}ms", duration.as_millis())
    }
}

/// Bits per second for `bytes` moved in `elapsed`
pub fn throughput_bps(bytes: u64, elapsed: Duration) -> u64 {
    let secs = elapsed.as_secs_f64();
    if secs > 0.0 {
        ((bytes * 8) as f64 / secs) as u64
    } else {
        0
    }
}

/// Display the final sender report
pub fn display_sender_summary(summary: &SenderSummary) {
    let stats = &summary.stats;

    eprintln!("\n┌─────────────────────────────────────────────────────────────┐");
    eprintln!("│ TRANSFER COMPLETE                                           │");
    eprintln!("├─────────────────────────────────────────────────────────────┤");
    eprintln!(
        "│ Sequence:  {} .. {}",
        summary.initial_seq, summary.final_seq
    );
    eprintln!(
        "│ Sent:      {} in {} packets ({} SYN)",
        format_bytes(stats.bytes_sent),
        stats.packets_sent,
        stats.handshake_attempts
    );
    eprintln!(
        "│ Elapsed:   {} ({})",
        format_duration(summary.elapsed),
        format_bandwidth(throughput_bps(stats.bytes_sent, summary.elapsed))
    );
    eprintln!("├─────────────────────────────────────────────────────────────┤");
    eprintln!(
        "│ Retransmitted: {} ({} on timeout, {} fast)",
        stats.retransmissions(),
        stats.timeout_retransmissions,
        stats.fast_retransmissions
    );
    eprintln!(
        "│ Timeouts: {} | ACKs: {} ({} duplicate, {} ignored) | Corrupt: {}",
        stats.timeouts,
        stats.acks_received,
        stats.duplicate_acks,
        stats.stale_acks,
        stats.corrupt_datagrams
    );
    eprintln!("└─────────────────────────────────────────────────────────────┘");
}

/// Display the final receiver report
pub fn display_receiver_summary(summary: &ReceiverSummary) {
    let stats = &summary.stats;
    eprintln!(
        "Received {} in {} packets over {} ({} out of order, {} corrupt, {} ACKs sent)",
        format_bytes(stats.bytes_delivered),
        stats.packets_delivered,
        format_duration(summary.elapsed),
        stats.out_of_order,
        stats.corrupt_datagrams,
        stats.acks_sent
    );
}

/// Display compact stats on one line (for continuous updates)
pub fn display_compact_stats(stats: &SenderStats, elapsed: Duration) {
    eprint!(
        "\r[{:8}] Sent: {} | Rate: {} | Packets: {} | Retx: {}         ",
        format_duration(elapsed),
        format_bytes(stats.bytes_sent),
        format_bandwidth(throughput_bps(stats.bytes_sent, elapsed)),
        stats.packets_sent,
        stats.retransmissions()
    );
}
