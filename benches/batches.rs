use criterion::{black_box, criterion_group, criterion_main, BatchSize, BenchmarkId, Criterion};
use criterion::Throughput;

use storageflux::cursors::memory::{MemoryCursor, MemoryGroupCursor, MemorySeries};
use storageflux::schema::{Bounds, ColMeta, ColType, GroupKey};
use storageflux::{new_group_table, new_series_table, GroupCursor, ScanConfig, TableParams, Tags};

const ROWS: usize = 100_000;
const SERIES: usize = 16;

fn params(config: &ScanConfig) -> TableParams {
    let alloc = config.allocator();
    let cache = config.tags_cache(alloc.clone());
    TableParams::new(
        GroupKey::default(),
        ColMeta::table_columns(ColType::Float, ["host", "region"]),
        Bounds::new(0, ROWS as i64),
        cache,
        alloc,
    )
}

fn points(n: usize) -> Vec<(i64, f64)> {
    (0..n).map(|i| (i as i64, i as f64)).collect()
}

fn bench_series_table(c: &mut Criterion) {
    let config = ScanConfig::default();
    let tags: Tags = [("host", "a"), ("region", "west")].into();
    let mut group = c.benchmark_group("series_table");
    group.throughput(Throughput::Elements(ROWS as u64));
    for &block in &[100_usize, 1_000, 10_000] {
        group.bench_with_input(BenchmarkId::new("released", block), &block, |b, &block| {
            b.iter_batched(
                || MemoryCursor::from_points(points(ROWS), block),
                |cursor| {
                    let table = new_series_table(cursor.into_series(), &tags, params(&config))
                        .expect("table");
                    table
                        .for_each_batch(&mut |batch| {
                            black_box(batch.len());
                            Ok(())
                        })
                        .expect("read");
                },
                BatchSize::LargeInput,
            );
        });
        group.bench_with_input(BenchmarkId::new("retained", block), &block, |b, &block| {
            b.iter_batched(
                || MemoryCursor::from_points(points(ROWS), block),
                |cursor| {
                    let table = new_series_table(cursor.into_series(), &tags, params(&config))
                        .expect("table");
                    let mut retained = Vec::new();
                    table
                        .for_each_batch(&mut |batch| {
                            retained.push(batch.clone());
                            Ok(())
                        })
                        .expect("read");
                    black_box(retained);
                },
                BatchSize::LargeInput,
            );
        });
    }
    group.finish();
}

fn bench_group_table(c: &mut Criterion) {
    let config = ScanConfig::default();
    let mut group = c.benchmark_group("group_table");
    group.throughput(Throughput::Elements(ROWS as u64));
    group.bench_function(format!("{SERIES}_series"), |b| {
        b.iter_batched(
            || {
                let series = (0..SERIES)
                    .map(|i| {
                        let host = format!("host-{i}");
                        MemorySeries::new(
                            [("host", host.as_str()), ("region", "west")].into(),
                            MemoryCursor::from_points(points(ROWS / SERIES), 1_000).into_series(),
                        )
                    })
                    .collect();
                MemoryGroupCursor::new(series)
            },
            |mut gc| {
                gc.next();
                let cursor = gc.cursor().expect("cursor");
                let tags = gc.tags();
                let table = new_group_table(Box::new(gc), cursor, &tags, params(&config))
                    .expect("table");
                table
                    .for_each_batch(&mut |batch| {
                        black_box(batch.len());
                        Ok(())
                    })
                    .expect("read");
            },
            BatchSize::LargeInput,
        );
    });
    group.finish();
}

criterion_group!(benches, bench_series_table, bench_group_table);
criterion_main!(benches);
