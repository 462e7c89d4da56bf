use std::hint::black_box;

use criterion::{criterion_group, criterion_main, Criterion};
use rand::{rngs::SmallRng, Rng, SeedableRng};

use kivi::SkipList;

fn bench_insert(c: &mut Criterion) {
    c.bench_function("insert 10_000 (SkipList)", |b| {
        let mut rng = SmallRng::seed_from_u64(1);
        b.iter(|| {
            let mut list = SkipList::new();
            for i in 0..10_000u64 {
                list.insert(black_box(i), rng.gen_range(0.0..100.0));
            }
        });
    });
}

fn bench_rank(c: &mut Criterion) {
    let mut list = SkipList::new();
    for i in 0..10_000u64 {
        list.insert(i, i as f64);
    }

    c.bench_function("rank 10_000 (SkipList)", |b| {
        b.iter(|| {
            for i in 0..10_000u64 {
                black_box(list.rank(&i, i as f64));
            }
        });
    });

    c.bench_function("element_by_rank (SkipList)", |b| {
        let mut rng = SmallRng::seed_from_u64(2);
        b.iter(|| {
            let r = rng.gen_range(1..=10_000usize);
            black_box(list.element_by_rank(r));
        });
    });
}

criterion_group!(benches, bench_insert, bench_rank);
criterion_main!(benches);
