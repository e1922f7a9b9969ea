//! Message codec throughput over a representative slice of the catalog,
//! from the empty keepalive up to a replicate filling the body budget.

use bytes::{Bytes, BytesMut};
use criterion::{Criterion, Throughput, black_box, criterion_group, criterion_main};
use replicast::protocol::{
    constants::MAX_MSG_SIZE,
    datum::Datum,
    header::PacketHeader,
    message::{Broadcast, Invoke, NetMsg, Ping, Replicate, SpawnActor},
    seqnum::SeqNum,
};

fn state_fields(n: usize) -> Vec<(u8, Datum)> {
    (0..n)
        .map(|i| {
            let value = match i % 4 {
                0 => Datum::Vector([1.0, 2.0, 3.0 + i as f32]),
                1 => Datum::Float(i as f32 * 0.25),
                2 => Datum::Int(i as i32 * 31),
                _ => Datum::Byte(i as u8),
            };
            (i as u8, value)
        })
        .collect()
}

/// Messages spanning the size spectrum the codec sees in practice.
fn catalog() -> Vec<(&'static str, NetMsg)> {
    vec![
        ("ping", NetMsg::Ping(Ping)),
        (
            "spawn_actor",
            NetMsg::SpawnActor(SpawnActor {
                type_id: 42,
                net_id: 7,
            }),
        ),
        (
            "replicate_small",
            NetMsg::Replicate(Replicate {
                net_id: 7,
                fields: state_fields(4),
                reliable: false,
            }),
        ),
        (
            "replicate_large",
            NetMsg::Replicate(Replicate {
                net_id: 7,
                fields: (0..8)
                    .map(|i| (i as u8, Datum::Str("x".repeat(52))))
                    .collect(),
                reliable: false,
            }),
        ),
        (
            "invoke",
            NetMsg::Invoke(Invoke {
                net_id: 7,
                func: 3,
                params: vec![
                    Datum::Vector([4.5, 0.0, -1.0]),
                    Datum::Bool(true),
                    Datum::Int(9000),
                ],
                reliable: true,
            }),
        ),
        (
            "broadcast",
            NetMsg::Broadcast(Broadcast {
                game_code: 0xC0DE,
                version: 2,
                name: "deathmatch #3".into(),
                max_players: 9,
                num_players: 4,
            }),
        ),
    ]
}

fn encoded(msg: &NetMsg) -> Bytes {
    let mut buf = BytesMut::new();
    msg.encode(&mut buf);
    buf.freeze()
}

fn bench_encode(c: &mut Criterion) {
    let mut group = c.benchmark_group("encode");
    for (name, msg) in catalog() {
        group.throughput(Throughput::Bytes(encoded(&msg).len() as u64));
        group.bench_function(name, |b| {
            let mut buf = BytesMut::with_capacity(MAX_MSG_SIZE);
            b.iter(|| {
                buf.clear();
                black_box(&msg).encode(&mut buf);
                black_box(buf.len())
            });
        });
    }
    group.finish();
}

fn bench_decode(c: &mut Criterion) {
    let mut group = c.benchmark_group("decode");
    for (name, msg) in catalog() {
        let wire = encoded(&msg);
        group.throughput(Throughput::Bytes(wire.len() as u64));
        group.bench_function(name, |b| {
            b.iter(|| {
                let mut src = wire.clone();
                black_box(NetMsg::decode(&mut src).unwrap())
            });
        });
    }
    group.finish();
}

/// The receive path proper: strip the header, then drain every message
/// batched behind it.
fn bench_drain_packet(c: &mut Criterion) {
    let mut buf = BytesMut::new();
    PacketHeader::new(SeqNum::new(512), true).encode(&mut buf);
    for (_, msg) in catalog() {
        msg.encode(&mut buf);
    }
    let wire = buf.freeze();
    let batch = catalog().len();

    let mut group = c.benchmark_group("drain");
    group.throughput(Throughput::Bytes(wire.len() as u64));
    group.bench_function("mixed_packet", |b| {
        b.iter(|| {
            let mut src = wire.clone();
            let header = PacketHeader::decode(&mut src).unwrap();
            let mut n = 0;
            while !src.is_empty() {
                black_box(NetMsg::decode(&mut src).unwrap());
                n += 1;
            }
            assert_eq!(n, batch);
            black_box(header)
        });
    });
    group.finish();
}

criterion_group!(benches, bench_encode, bench_decode, bench_drain_packet);
criterion_main!(benches);
