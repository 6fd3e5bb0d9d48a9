//! HNSW benchmarks.
//!
//! Measures graph construction time and search throughput across M and
//! ef_search settings, plus prebuilt decode time.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use smallworld::{
    decode_graph, encode_graph, Dataset, HnswBuilder, HnswConfig, HnswIndex, MetricRegistry,
    VectorSource,
};

fn benchmark_build(c: &mut Criterion) {
    let registry = MetricRegistry::with_builtins();
    let sizes = vec![1_000, 10_000];

    for size in sizes {
        let dataset = Dataset::generate(size, 0, 128, 1);

        let mut group = c.benchmark_group(format!("hnsw_build_{}", size));
        group.sample_size(10);

        for m in [16, 32] {
            group.bench_with_input(BenchmarkId::from_parameter(m), &m, |b, &m| {
                b.iter(|| {
                    let builder = HnswBuilder::new(HnswConfig {
                        max_connections: m,
                        ..HnswConfig::default()
                    })
                    .unwrap();
                    black_box(builder.build(&registry, dataset.vectors.clone()).unwrap())
                });
            });
        }

        group.finish();
    }
}

fn benchmark_search(c: &mut Criterion) {
    let registry = MetricRegistry::with_builtins();
    let dataset = Dataset::generate(10_000, 1_000, 128, 1);

    for m in [16, 32] {
        let builder = HnswBuilder::new(HnswConfig {
            max_connections: m,
            ..HnswConfig::default()
        })
        .unwrap();
        let mut index = builder.build(&registry, dataset.vectors.clone()).unwrap();

        let mut group = c.benchmark_group(format!("hnsw_search_m{}", m));

        for ef in [10, 50, 100, 200] {
            index.set_ef_search(ef);
            let mut searcher = index.searcher();

            group.bench_with_input(BenchmarkId::from_parameter(ef), &ef, |b, _| {
                let mut query_idx = 0;
                b.iter(|| {
                    let query = dataset.queries.vector(query_idx % dataset.queries.len());
                    query_idx += 1;
                    black_box(searcher.search(query, 10).unwrap())
                });
            });
        }

        group.finish();
    }
}

fn benchmark_prebuilt_decode(c: &mut Criterion) {
    let registry = MetricRegistry::with_builtins();
    let dataset = Dataset::generate(10_000, 0, 64, 1);

    let builder = HnswBuilder::new(HnswConfig::default()).unwrap();
    let index = builder.build(&registry, dataset.vectors.clone()).unwrap();
    let blob = encode_graph(index.graph()).unwrap();

    let mut group = c.benchmark_group("prebuilt");
    group.bench_function("decode_10k", |b| {
        b.iter(|| black_box(decode_graph(&blob).unwrap()))
    });
    group.bench_function("decode_and_attach_10k", |b| {
        b.iter(|| {
            let graph = decode_graph(&blob).unwrap();
            black_box(HnswIndex::from_graph(graph, &dataset.vectors, &registry).unwrap())
        })
    });
    group.finish();
}

criterion_group!(
    benches,
    benchmark_build,
    benchmark_search,
    benchmark_prebuilt_decode
);
criterion_main!(benches);
