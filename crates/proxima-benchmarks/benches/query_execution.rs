//! Query execution benchmarks
//!
//! Measures document-at-a-time execution over a synthetic Zipfian corpus:
//! 1. Or fan-out with and without executor pool eviction
//! 2. Annotation expansion (resolver cached after the first run)
//! 3. Phrase and bounded-gap sequence chaining
//! 4. And minimal covering intervals

use std::sync::Arc;
use std::time::Duration;

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use proxima_benchmarks::{bucket_annotations, build_engine, generate_corpus, word, CorpusSpec};
use proxima_core::AnnotationConstraint;
use proxima_query::node::{and, annotation, or, phrase, sequence, term};
use proxima_query::GapRange;

const FAN_OUT: [usize; 3] = [16, 256, 2048];

fn or_fan_out_benchmark(c: &mut Criterion) {
    let spec = CorpusSpec::default();
    let index = Arc::new(generate_corpus(spec));
    let mut group = c.benchmark_group("or_fan_out");
    group.sample_size(20);
    group.measurement_time(Duration::from_secs(10));

    for &width in FAN_OUT.iter() {
        // rare terms so that every child contributes a handful of documents
        let query = or((0..width).map(|i| term("body", word(spec.vocabulary - 1 - i))));

        for (label, max_live) in [("unbounded", width), ("evicting", width / 8)] {
            let engine = build_engine(Arc::clone(&index), None, max_live.max(1))
                .expect("failed to build engine");
            group.bench_with_input(BenchmarkId::new(label, width), &query, |b, query| {
                b.iter(|| engine.search(query).expect("search failed").len());
            });
        }
    }
    group.finish();
}

fn annotation_benchmark(c: &mut Criterion) {
    let spec = CorpusSpec::default();
    let index = Arc::new(generate_corpus(spec));
    let table = Arc::new(bucket_annotations(spec.vocabulary, 64).expect("failed to annotate"));
    let engine = build_engine(index, Some(table), 512).expect("failed to build engine");

    let mut group = c.benchmark_group("annotation");
    group.sample_size(20);
    let query = annotation("token", [AnnotationConstraint::eq("bucket", 7)]);
    group.bench_function("bucket_expansion", |b| {
        b.iter(|| engine.documents(&query).expect("search failed").len());
    });
    group.finish();
}

fn sequence_benchmark(c: &mut Criterion) {
    let index = Arc::new(generate_corpus(CorpusSpec::default()));
    let engine = build_engine(index, None, 4096).expect("failed to build engine");

    let mut group = c.benchmark_group("sequence");
    let adjacent = phrase([term("body", word(0)), term("body", word(1))]);
    let windowed = sequence(
        [term("body", word(0)), term("body", word(2)), term("body", word(5))],
        [GapRange::new(0, 3), GapRange::new(0, 3)],
    );

    for (label, query) in [("phrase", adjacent), ("gapped", windowed)] {
        group.bench_with_input(BenchmarkId::from_parameter(label), &query, |b, query| {
            b.iter(|| engine.search(query).expect("search failed").len());
        });
    }
    group.finish();
}

fn and_benchmark(c: &mut Criterion) {
    let index = Arc::new(generate_corpus(CorpusSpec::default()));
    let engine = build_engine(index, None, 4096).expect("failed to build engine");

    let mut group = c.benchmark_group("and_covering");
    for width in [2usize, 4] {
        let query = and((0..width).map(|i| term("body", word(i * 3))));
        group.bench_with_input(BenchmarkId::from_parameter(width), &query, |b, query| {
            b.iter(|| engine.search(query).expect("search failed").len());
        });
    }
    group.finish();
}

criterion_group!(
    benches,
    or_fan_out_benchmark,
    annotation_benchmark,
    sequence_benchmark,
    and_benchmark
);
criterion_main!(benches);
