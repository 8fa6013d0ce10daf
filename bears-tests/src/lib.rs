//! Shared helpers for the cross-crate BEARS-TP tests

use bears_protocol::{
    serve, CancelToken, DatagramChannel, Fault, ReceiverError, ReceiverOptions, ReceiverSummary,
    SenderOptions,
};
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Deterministic, non-repeating-looking test input of `len` bytes
pub fn payload(len: usize) -> Vec<u8> {
    (0..len).map(|i| ((i * 31 + i / 251) % 256) as u8).collect()
}

/// Sender options with small packets and a short retransmission timeout
pub fn fast_options(payload_size: usize, window_size: usize) -> SenderOptions {
    SenderOptions {
        payload_size,
        window_size,
        retransmission_timeout: Duration::from_millis(20),
        ..SenderOptions::default()
    }
}

/// Receiver options tuned for tests: quick polling, short linger
pub fn fast_receiver_options() -> ReceiverOptions {
    ReceiverOptions {
        poll_interval: Duration::from_millis(5),
        linger: Duration::from_millis(300),
        idle_timeout: Some(Duration::from_secs(10)),
    }
}

/// Run the reference receiver on its own thread, collecting its output
pub fn spawn_receiver<C>(
    mut channel: C,
    options: ReceiverOptions,
) -> JoinHandle<Result<(Vec<u8>, ReceiverSummary), ReceiverError>>
where
    C: DatagramChannel + Send + 'static,
{
    thread::spawn(move || {
        let mut output = Vec::new();
        let summary = serve(&mut channel, &mut output, &options, &CancelToken::new())?;
        Ok((output, summary))
    })
}

/// Fault filter that drops every `nth` datagram it sees
pub fn drop_every(nth: usize) -> impl FnMut(&[u8]) -> Fault + Send + 'static {
    let mut seen = 0usize;
    move |_| {
        seen += 1;
        if seen % nth == 0 {
            Fault::Drop
        } else {
            Fault::Deliver
        }
    }
}

/// Fault filter that corrupts every `nth` datagram it sees
pub fn corrupt_every(nth: usize) -> impl FnMut(&[u8]) -> Fault + Send + 'static {
    let mut seen = 0usize;
    move |_| {
        seen += 1;
        if seen % nth == 0 {
            Fault::Corrupt
        } else {
            Fault::Deliver
        }
    }
}
