//! Benchmarks for sysbind buffers, handles and vector marshalling

use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use sysbind::buffer::Buffer;
use sysbind::config::BufferConfig;
use sysbind::{register_builtin_types, HostTable, HostValue, ObjectRegistry, TableBridge};

fn registry() -> ObjectRegistry {
    let mut reg = ObjectRegistry::new();
    register_builtin_types(&mut reg, &BufferConfig::default()).unwrap();
    reg
}

/// Benchmark allocate/copy/free of owned buffers
fn bench_buffer_cycle(c: &mut Criterion) {
    let mut group = c.benchmark_group("buffer_cycle");

    for &size in &[64usize, 4096, 65536] {
        let data = vec![0x5Au8; size];
        group.throughput(Throughput::Bytes(size as u64));

        group.bench_function(format!("{}_bytes", size), |b| {
            b.iter(|| {
                let mut buf = Buffer::allocate(size).unwrap();
                buf.set_length(size).unwrap();
                buf.copy_in(&data).unwrap();
                buf.free().unwrap();
                black_box(buf)
            })
        });
    }

    group.finish();
}

/// Benchmark handle creation and finalization
fn bench_handle_lifecycle(c: &mut Criterion) {
    let mut reg = registry();

    c.bench_function("timespec_new_destroy", |b| {
        b.iter(|| {
            let h = reg.new_handle("timespec", &HostValue::Number(1.5)).unwrap();
            black_box(reg.destroy(h).unwrap())
        })
    });
}

/// Benchmark vector import and export
fn bench_vectors(c: &mut Criterion) {
    let mut group = c.benchmark_group("vectors");
    let bridge = TableBridge::default();

    for &count in &[16i64, 256, 1024] {
        let mut reg = registry();
        let handles: Vec<_> = (0..count)
            .map(|s| reg.new_handle("timespec", &HostValue::Integer(s)).unwrap())
            .collect();
        let table = HostTable::from_sequence(handles);
        group.throughput(Throughput::Elements(count as u64));

        group.bench_function(format!("import_{}", count), |b| {
            b.iter(|| black_box(bridge.import_vector(&reg, &table, "timespec").unwrap()))
        });

        group.bench_function(format!("round_trip_{}", count), |b| {
            b.iter(|| {
                let mut vector = bridge.import_vector(&reg, &table, "timespec").unwrap();
                let mut out = HostTable::new();
                bridge
                    .export_vector(&mut reg, &mut vector, &mut out, true, true)
                    .unwrap();
                for v in out.sequence() {
                    if let Some(h) = v.as_handle() {
                        reg.destroy(h).unwrap();
                    }
                }
                black_box(out.len())
            })
        });
    }

    group.finish();
}

criterion_group!(benches, bench_buffer_cycle, bench_handle_lifecycle, bench_vectors);
criterion_main!(benches);
