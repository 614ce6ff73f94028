//! Benchmarks for search candidate scoring
//!
//! Tests performance of title normalization and candidate selection.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use stremtmdb::matching::scoring::{normalize, score, select_best, CatalogQuery};
use stremtmdb::providers::{DisplayedPosition, GraphParent, SearchCandidate};

fn candidate(n: usize) -> SearchCandidate {
    SearchCandidate {
        id: format!("tt{n:07}"),
        title: Some(format!("Candidate Title Number {n}")),
        original_title: Some(format!("Titre Original {n}")),
        akas: (0..10).map(|a| format!("Alias {a} for {n}")).collect(),
        runtime_seconds: Some(2700 + n as u32 * 7),
        vote_count: (n as u64 * 131) % 9973,
        parent: None,
    }
}

fn unplaced_episode() -> SearchCandidate {
    SearchCandidate {
        id: "tt9999999".into(),
        title: Some("Some Series: The Long Night (2)".into()),
        original_title: None,
        akas: vec!["La Longue Nuit".into(), "Die lange Nacht".into()],
        runtime_seconds: Some(3420),
        vote_count: 12,
        parent: Some(GraphParent {
            series_id: "tt0000001".into(),
            position: Some(DisplayedPosition::new("unknown", "unknown")),
        }),
    }
}

fn bench_normalize(c: &mut Criterion) {
    let mut group = c.benchmark_group("normalize");

    group.bench_function("ascii", |b| {
        b.iter(|| normalize(black_box("The Lord of the Rings: The Return of the King")))
    });
    group.bench_function("unicode", |b| {
        b.iter(|| normalize(black_box("Le Fabuleux Destin d'Amélie Poulain (2001)")))
    });

    group.finish();
}

fn bench_score(c: &mut Criterion) {
    let mut group = c.benchmark_group("score");
    let query = CatalogQuery::new("The Long Night (2)", None, Some(57));
    let plain = candidate(1);
    let unplaced = unplaced_episode();

    group.bench_function("plain_candidate", |b| {
        b.iter(|| score(black_box(&query), black_box(&plain)))
    });
    group.bench_function("unplaced_episode", |b| {
        b.iter(|| score(black_box(&query), black_box(&unplaced)))
    });

    group.finish();
}

fn bench_select_best(c: &mut Criterion) {
    let mut group = c.benchmark_group("select_best");
    let query = CatalogQuery::new("Candidate Title Number 7", None, Some(46));

    for size in [5usize, 20, 100] {
        let candidates: Vec<SearchCandidate> = (0..size).map(candidate).collect();
        group.bench_with_input(
            BenchmarkId::new("candidates", size),
            &candidates,
            |b, candidates| b.iter(|| select_best(black_box(&query), black_box(candidates))),
        );
    }

    group.finish();
}

criterion_group!(benches, bench_normalize, bench_score, bench_select_best);
criterion_main!(benches);
