//! Node list insertion and traversal benchmarks
//!
//! Appends use the wide position gap; repeated inserts at one anchor drain
//! the gap and exercise local rebalancing.
//!
//! Run with: cargo bench --bench node_list

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use fixq_core::graph::{Direction, NodeId, NodeList};

const LIST_SIZES: &[usize] = &[100, 1_000, 10_000];

fn filled(size: usize) -> NodeList<usize> {
    let mut list = NodeList::new();
    for i in 0..size {
        list.push_back(i).unwrap();
    }
    list
}

fn bench_append(c: &mut Criterion) {
    let mut group = c.benchmark_group("node_list_append");
    for &size in LIST_SIZES {
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, &size| {
            b.iter(|| black_box(filled(size)));
        });
    }
    group.finish();
}

fn bench_insert_same_anchor(c: &mut Criterion) {
    let mut group = c.benchmark_group("node_list_insert_same_anchor");
    for &count in &[64usize, 256, 1_024] {
        group.bench_with_input(BenchmarkId::from_parameter(count), &count, |b, &count| {
            b.iter(|| {
                let mut list = filled(2);
                let anchor = list.first(Direction::Forward).unwrap();
                for i in 0..count {
                    list.insert_after(anchor, i, Direction::Forward).unwrap();
                }
                black_box(list.rebalance_count())
            });
        });
    }
    group.finish();
}

fn bench_traversal(c: &mut Criterion) {
    let mut group = c.benchmark_group("node_list_traversal");
    for &size in LIST_SIZES {
        let list = filled(size);
        group.bench_with_input(BenchmarkId::new("forward", size), &list, |b, list| {
            b.iter(|| list.iter(Direction::Forward).map(|(_, v)| *v).sum::<usize>());
        });
        group.bench_with_input(BenchmarkId::new("backward", size), &list, |b, list| {
            b.iter(|| list.iter_from(NodeId::HEAD, Direction::Backward).count());
        });
    }
    group.finish();
}

criterion_group!(
    benches,
    bench_append,
    bench_insert_same_anchor,
    bench_traversal
);
criterion_main!(benches);
