//! Benchmarks for the keyed children diff

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use ripple_core::prelude::*;

fn rows(keys: &[i64]) -> VNode {
    h(
        "tbody",
        Props::new(),
        keys.iter()
            .map(|&k| h("tr", Props::new().with("key", k), format!("row {k}")))
            .collect::<Vec<_>>(),
    )
}

/// Render `from`, then repeatedly flip between `from` and `to`.
fn bench_shuffle(c: &mut Criterion, name: &str, from: Vec<i64>, to: Vec<i64>) {
    let mut group = c.benchmark_group(name);
    for size in [100usize, 1_000] {
        let from: Vec<i64> = from.iter().copied().filter(|&k| (k as usize) < size).collect();
        let to: Vec<i64> = to.iter().copied().filter(|&k| (k as usize) < size).collect();

        let renderer = Renderer::new(MemoryHost::new());
        let root = renderer.host_mut().create_root();
        renderer.render(&rows(&from), root).unwrap();

        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, _| {
            b.iter(|| {
                renderer.render(black_box(&rows(&to)), root).unwrap();
                renderer.render(black_box(&rows(&from)), root).unwrap();
                renderer.host_mut().clear_ops();
            })
        });
    }
    group.finish();
}

fn bench_reverse(c: &mut Criterion) {
    let keys: Vec<i64> = (0..1_000).collect();
    let reversed = keys.iter().rev().copied().collect();
    bench_shuffle(c, "diff_reverse", keys, reversed);
}

fn bench_swap_rows(c: &mut Criterion) {
    let keys: Vec<i64> = (0..1_000).collect();
    let mut swapped = keys.clone();
    swapped.swap(1, 98);
    bench_shuffle(c, "diff_swap_rows", keys, swapped);
}

fn bench_remove_every_tenth(c: &mut Criterion) {
    let keys: Vec<i64> = (0..1_000).collect();
    let thinned = keys.iter().copied().filter(|k| k % 10 != 0).collect();
    bench_shuffle(c, "diff_remove_every_tenth", keys, thinned);
}

fn bench_append(c: &mut Criterion) {
    let keys: Vec<i64> = (0..900).collect();
    let grown = (0..1_000).collect();
    bench_shuffle(c, "diff_append", keys, grown);
}

criterion_group!(
    benches,
    bench_reverse,
    bench_swap_rows,
    bench_remove_every_tenth,
    bench_append
);
criterion_main!(benches);
