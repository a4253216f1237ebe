use bitram::{EngineBuilder, Placement};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

/// Benchmark filling an engine with fixed-size allocations per strategy
fn bench_fill(c: &mut Criterion) {
    let strategies = vec![
        ("left_fit", Placement::LeftFit, 1),
        ("aligned_8", Placement::Aligned, 8),
        ("random", Placement::Random, 1),
    ];

    let mut group = c.benchmark_group("allocation_fill");

    for (name, placement, alignment) in strategies {
        let count = 4096 / 16 / 2;
        group.throughput(Throughput::Elements(count as u64));

        group.bench_with_input(BenchmarkId::from_parameter(name), &placement, |b, &placement| {
            b.iter_with_setup(
                || EngineBuilder::new().size(4096).seed(1).build().unwrap(),
                |mut engine| {
                    for _ in 0..count {
                        black_box(engine.allocate(16, placement, alignment).ok());
                    }
                },
            );
        });
    }

    group.finish();
}

/// Benchmark defragmenting a half-freed engine
fn bench_defragment(c: &mut Criterion) {
    let sizes = vec![1024, 8192, 65536];

    let mut group = c.benchmark_group("defragment");
    group.sample_size(20);

    for size in sizes {
        group.throughput(Throughput::Elements(size as u64));

        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, &size| {
            b.iter_with_setup(
                || {
                    let mut engine = EngineBuilder::new().size(size).seed(2).build().unwrap();
                    let count = size / 16;
                    for i in 0..count {
                        engine.declare_int(&format!("v{}", i), 16, i as i64).unwrap();
                    }
                    for i in (0..count).step_by(2) {
                        engine.free_variable(&format!("v{}", i)).unwrap();
                    }
                    engine
                },
                |mut engine| {
                    black_box(engine.defragment());
                },
            );
        });
    }

    group.finish();
}

criterion_group!(benches, bench_fill, bench_defragment);
criterion_main!(benches);
