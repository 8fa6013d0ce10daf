//! Sender and receiver on separate threads
//!
//! Uses real timeouts, so the retransmission interval is shortened.

use bears_io::{MemoryChannel, UdpChannel};
use bears_protocol::{CancelToken, SenderError, SenderSession, SeqNumber};
use bears_tests::{
    corrupt_every, drop_every, fast_options, fast_receiver_options, payload, spawn_receiver,
};
use std::io::Cursor;
use std::thread;
use std::time::Duration;

#[test]
fn test_memory_channel_clean() {
    let (sender_end, receiver_end) = MemoryChannel::pair();
    let receiver = spawn_receiver(receiver_end, fast_receiver_options());

    let input = payload(40_000);
    let mut session =
        SenderSession::new(sender_end, Cursor::new(input.clone()), fast_options(1400, 7)).unwrap();
    let summary = session.run().unwrap();

    let (output, received) = receiver.join().unwrap().unwrap();
    assert_eq!(output, input);
    assert_eq!(received.final_seq, Some(summary.final_seq));
    assert_eq!(summary.stats.packets_sent, 29);
}

#[test]
fn test_memory_channel_lossy_both_ways() {
    let (sender_end, receiver_end) = MemoryChannel::pair();
    let sender_end = sender_end.with_faults(drop_every(7));
    let receiver_end = receiver_end.with_faults(corrupt_every(4));
    let receiver = spawn_receiver(receiver_end, fast_receiver_options());

    let input = payload(30_000);
    let mut session =
        SenderSession::new(sender_end, Cursor::new(input.clone()), fast_options(1000, 5)).unwrap();
    let summary = session.run().unwrap();

    let (output, _) = receiver.join().unwrap().unwrap();
    assert_eq!(output, input);
    assert!(summary.stats.retransmissions() > 0);
    assert!(summary.stats.corrupt_datagrams > 0);
    assert!(session.channel().dropped() > 0);
}

#[test]
fn test_cancel_during_transfer() {
    // No receiver at all: the sender is stuck resending the SYN.
    let (sender_end, _receiver_end) = MemoryChannel::pair();
    let cancel = CancelToken::new();
    let mut session = SenderSession::new(sender_end, Cursor::new(payload(100)), fast_options(10, 7))
        .unwrap()
        .with_cancel_token(cancel.clone());

    let trigger = thread::spawn(move || {
        thread::sleep(Duration::from_millis(100));
        cancel.cancel();
    });

    let result = session.run();
    trigger.join().unwrap();

    assert!(matches!(result, Err(SenderError::Cancelled)));
    assert!(session.stats().read().handshake_attempts > 1);
    assert!(session.window().is_empty());
}

#[test]
fn test_udp_loopback_transfer() {
    let receiver_end = UdpChannel::bind("127.0.0.1:0".parse().unwrap()).unwrap();
    let addr = receiver_end.local_addr().unwrap();
    let receiver = spawn_receiver(receiver_end, fast_receiver_options());

    let input = payload(100_000);
    let sender_end = UdpChannel::connect(addr).unwrap();
    let mut options = fast_options(1471, 7);
    options.retransmission_timeout = Duration::from_millis(100);
    let mut session = SenderSession::new(sender_end, Cursor::new(input.clone()), options).unwrap();
    let summary = session.run().unwrap();

    let (output, received) = receiver.join().unwrap().unwrap();
    assert_eq!(output, input);
    assert_eq!(summary.initial_seq, SeqNumber::new(725));
    assert_eq!(received.initial_seq, Some(SeqNumber::new(725)));
}
