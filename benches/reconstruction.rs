//! Benchmarks for reconstruction throughput.

use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use l2_snapshot_engine::{
    EngineConfig, EventKind, OrderEvent, ReconstructionEngine, Side, VecSink,
};

const NS: i64 = 1_000_000_000;

fn create_test_events(count: usize) -> Vec<OrderEvent> {
    let mut events = Vec::with_capacity(count + 20);
    let base_price = 100.0;

    // Connect-time snapshot batch: 10 levels per side
    for i in 0..10 {
        let offset = i as f64 * 0.01;
        events.push(OrderEvent::from_decimal(
            0,
            "BTC-USD",
            EventKind::Snapshot,
            Side::Bid,
            base_price - offset,
            1.0 + i as f64 * 0.1,
        ));
        events.push(OrderEvent::from_decimal(
            0,
            "BTC-USD",
            EventKind::Snapshot,
            Side::Ask,
            base_price + 0.01 + offset,
            1.0 + i as f64 * 0.1,
        ));
    }

    // Streaming updates walking around inside the book
    for i in 0..count {
        let is_bid = i % 2 == 0;
        let offset = ((i % 10) as f64) * 0.01;
        let price = if is_bid {
            base_price - offset
        } else {
            base_price + 0.01 + offset
        };

        events.push(OrderEvent::from_decimal(
            (i as i64 / 100) * NS,
            "BTC-USD",
            EventKind::Update,
            if is_bid { Side::Bid } else { Side::Ask },
            price,
            ((i % 100) + 1) as f64 * 0.01,
        ));
    }

    events
}

fn bench_reconstruction(c: &mut Criterion) {
    let events = create_test_events(10_000);

    let mut group = c.benchmark_group("reconstruction");
    group.throughput(Throughput::Elements(events.len() as u64));

    group.bench_function("process_events", |b| {
        b.iter(|| {
            let mut engine =
                ReconstructionEngine::new(EngineConfig::default().with_logging(false));
            let mut sink = VecSink::new();
            engine.run(black_box(events.clone()), &mut sink).unwrap();
            black_box(engine.stats().snapshots_emitted)
        })
    });

    group.finish();
}

fn bench_feature_extraction(c: &mut Criterion) {
    use l2_snapshot_engine::{BookConfig, LadderEntry};

    let mut book = l2_snapshot_engine::OrderBookState::new(
        "BTC-USD",
        BookConfig::default().with_logging(false),
    );

    let mut entries = Vec::new();
    for i in 0..50 {
        entries.push(LadderEntry {
            side: Side::Bid,
            price: l2_snapshot_engine::price_from_f64(100.0 - i as f64 * 0.01),
            quantity: 1.0 + i as f64 * 0.1,
        });
        entries.push(LadderEntry {
            side: Side::Ask,
            price: l2_snapshot_engine::price_from_f64(100.01 + i as f64 * 0.01),
            quantity: 1.0 + i as f64 * 0.1,
        });
    }
    book.apply_snapshot_batch(&entries);

    c.bench_function("extract_features_depth_10", |b| {
        b.iter(|| black_box(book.extract_features(black_box(10))))
    });
}

criterion_group!(benches, bench_reconstruction, bench_feature_extraction);
criterion_main!(benches);
