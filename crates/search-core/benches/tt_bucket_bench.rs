//! Benchmark for the two-slot table's store/retrieve hot path

use criterion::{criterion_group, criterion_main, Criterion};
use rand::Rng;
use search_core::tt::{AlphaBetaEntry, AlphaBetaTable, ValueKind};
use std::hint::black_box;

fn setup_filled_table(bits: u32) -> AlphaBetaTable<u16> {
    let mut table = AlphaBetaTable::new(bits).expect("valid bits");
    table.allocate();
    let mut rng = rand::rng();

    for _ in 0..10_000 {
        let hash = rng.random::<u64>();
        let depth = rng.random_range(1..20);
        table.store(AlphaBetaEntry {
            full_hash: hash,
            value: rng.random_range(-1.0..1.0),
            kind: ValueKind::Exact,
            depth,
            best_move: Some(rng.random::<u16>()),
            scored_moves: None,
        });
    }

    table
}

fn bench_retrieve(c: &mut Criterion) {
    let mut group = c.benchmark_group("tt_retrieve");

    let table = setup_filled_table(16);
    let mut rng = rand::rng();
    let test_hashes: Vec<u64> = (0..1000).map(|_| rng.random::<u64>()).collect();

    group.bench_function("mixed_access", |b| {
        let mut idx = 0;
        b.iter(|| {
            let hash = test_hashes[idx % test_hashes.len()];
            idx += 1;
            black_box(table.retrieve(black_box(hash)))
        });
    });

    group.finish();
}

fn bench_store(c: &mut Criterion) {
    let mut group = c.benchmark_group("tt_store");

    let table = setup_filled_table(16);
    let mut rng = rand::rng();

    group.bench_function("replacement_pressure", |b| {
        b.iter(|| {
            let hash = rng.random::<u64>();
            table.store(AlphaBetaEntry {
                full_hash: black_box(hash),
                value: 0.0,
                kind: ValueKind::LowerBound,
                depth: rng.random_range(1..20),
                best_move: None,
                scored_moves: None,
            });
        });
    });

    group.finish();
}

criterion_group!(benches, bench_retrieve, bench_store);
criterion_main!(benches);
