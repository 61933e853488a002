use criterion::{black_box, criterion_group, criterion_main, Criterion};
use crossbeam::channel::unbounded;
use ring_pipeline::{BatchConfig, PipelineBuilder, RingBuffer};
use std::time::Duration;

fn benchmark_ring_push_drain(c: &mut Criterion) {
    c.bench_function("ring_push_1000_drain", |b| {
        let buffer = RingBuffer::new(100);
        b.iter(|| {
            for i in 0..1000i64 {
                buffer.push(black_box(i));
            }
            black_box(buffer.drain());
        });
    });
}

fn benchmark_filter_chain(c: &mut Criterion) {
    c.bench_function("two_filters_1000_values", |b| {
        b.iter(|| {
            let pipeline = PipelineBuilder::<i64>::new()
                .filter("positive", |v| *v > 0)
                .filter("multiple_of_3", |v| v % 3 == 0)
                .build()
                .expect("Build failed");

            let values: Vec<i64> = (-500..500).collect();
            let report = pipeline.run(values, |v: i64| {
                black_box(v);
            });
            let _ = black_box(report);
        });
    });
}

fn benchmark_batched_delivery(c: &mut Criterion) {
    c.bench_function("batch_flush_300_values", |b| {
        b.iter(|| {
            let pipeline = PipelineBuilder::<i64>::new()
                .batch("batch", BatchConfig::new(1000, Duration::from_millis(1)))
                .build()
                .expect("Build failed");

            let (input, in_rx) = unbounded();
            let running = pipeline.start(in_rx.into_iter()).expect("Start failed");
            for i in 0..300 {
                input.send(i).expect("Send failed");
            }

            let mut remaining = 300;
            let signal = running.signal();
            let _ = running.run_sink(move |v: i64| {
                black_box(v);
                remaining -= 1;
                if remaining == 0 {
                    signal.cancel();
                }
            });
            drop(input);
        });
    });
}

criterion_group!(
    name = benches;
    config = Criterion::default().measurement_time(Duration::from_secs(10));
    targets = benchmark_ring_push_drain, benchmark_filter_chain, benchmark_batched_delivery
);
criterion_main!(benches);
