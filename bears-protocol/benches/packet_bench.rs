use bears_protocol::packet::{self, Packet, MAX_PAYLOAD_SIZE};
use bears_protocol::sequence::SeqNumber;
use bears_protocol::window::Window;
use bytes::Bytes;
use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use std::convert::Infallible;

fn bench_data_packet_encode(c: &mut Criterion) {
    let packet = Packet::data(
        SeqNumber::new(726),
        Bytes::from(vec![0x5Au8; MAX_PAYLOAD_SIZE]),
        false,
    );

    let mut group = c.benchmark_group("data_packet");
    group.throughput(Throughput::Bytes(MAX_PAYLOAD_SIZE as u64));
    group.bench_function("encode", |b| {
        b.iter(|| {
            let bytes = black_box(&packet).to_bytes();
            black_box(bytes);
        });
    });

    let wire = packet.to_bytes();
    group.bench_function("decode", |b| {
        b.iter(|| {
            let packet = packet::decode(black_box(&wire)).unwrap();
            black_box(packet);
        });
    });

    group.bench_function("validate_checksum", |b| {
        b.iter(|| {
            let ok = packet::validate_checksum(black_box(&wire));
            black_box(ok);
        });
    });
    group.finish();
}

fn bench_ack_decode(c: &mut Criterion) {
    let wire = Packet::ack(SeqNumber::new(1_000_000)).to_bytes();

    c.bench_function("ack_decode", |b| {
        b.iter(|| {
            let packet = packet::decode(black_box(&wire)).unwrap();
            black_box(packet);
        });
    });
}

fn bench_window_cycle(c: &mut Criterion) {
    let payload = Bytes::from(vec![0u8; MAX_PAYLOAD_SIZE]);

    c.bench_function("window_fill_resend_drain", |b| {
        b.iter(|| {
            let mut window = Window::new(SeqNumber::new(726), 7);
            for seq in 726..733 {
                window.try_insert(Packet::data(SeqNumber::new(seq), payload.clone(), false));
            }
            let resent = window
                .resend_all(|wire| {
                    black_box(wire);
                    Ok::<_, Infallible>(())
                })
                .unwrap();
            window.advance_base(SeqNumber::new(733));
            black_box(resent);
        });
    });
}

criterion_group!(
    benches,
    bench_data_packet_encode,
    bench_ack_decode,
    bench_window_cycle
);
criterion_main!(benches);
