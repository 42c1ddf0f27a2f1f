//! 通知防抖基准测试
//!
//! 测试不同阈值下故障/恢复判定的性能

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use probe_scheduler::notification::{should_notify_down, should_notify_up};
use probe_scheduler::Check;
use std::hint::black_box;
use uuid::Uuid;

fn failing_history(len: usize) -> Vec<Check> {
    let service_id = Uuid::new_v4();
    (0..len)
        .map(|i| Check::new(service_id, 0, i % 4 != 3))
        .collect()
}

/// 防抖判定基准测试
fn debounce_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("debounce");

    for threshold in [1u32, 3, 10, 50] {
        let history = failing_history(threshold as usize);

        group.bench_with_input(
            BenchmarkId::new("should_notify_down", threshold),
            &history,
            |b, history| {
                b.iter(|| should_notify_down(black_box(history), black_box(threshold), false))
            },
        );

        group.bench_with_input(
            BenchmarkId::new("should_notify_up", threshold),
            &history,
            |b, history| b.iter(|| should_notify_up(black_box(history), black_box(threshold))),
        );
    }

    group.finish();
}

criterion_group!(benches, debounce_benchmark);
criterion_main!(benches);
