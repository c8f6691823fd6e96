//! Tag extraction and field resolution throughput

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use url::Url;
use webapp_catalog::catalog::RecordNormalizer;
use webapp_catalog::extraction::{FieldResolver, TagExtractor};

const HEAD: &str = r#"<!DOCTYPE html><html lang="en"><head>
<meta charset="utf-8">
<title>Acme Tasks | Team task manager</title>
<meta name="description" content="Organize your team's tasks and projects.">
<meta property="og:title" content="Acme Tasks">
<meta property="og:description" content="Tasks, projects &amp; deadlines in one place.">
<meta property="og:image" content="/img/social.png">
<meta name="twitter:card" content="summary_large_image">
</head>"#;

fn page(body_paragraphs: usize) -> String {
    format!(
        "{HEAD}<body>{}</body></html>",
        "<p>Lorem ipsum dolor sit amet, consectetur adipiscing elit.</p>".repeat(body_paragraphs)
    )
}

fn bench_extract(c: &mut Criterion) {
    let extractor = TagExtractor::default();
    let mut group = c.benchmark_group("extract");

    for paragraphs in [0usize, 100, 10_000] {
        let html = page(paragraphs);
        group.throughput(Throughput::Bytes(html.len() as u64));
        group.bench_with_input(BenchmarkId::from_parameter(paragraphs), &html, |b, html| {
            b.iter(|| extractor.extract(black_box(html)))
        });
    }
    group.finish();
}

fn bench_resolve_and_normalize(c: &mut Criterion) {
    let url = Url::parse("https://acme.example/tasks").unwrap();
    let tags = TagExtractor::default().extract(&page(10));
    let resolver = FieldResolver::default();
    let normalizer = RecordNormalizer::default();

    c.bench_function("resolve", |b| b.iter(|| resolver.resolve(black_box(&tags), &url)));

    let fields = resolver.resolve(&tags, &url);
    c.bench_function("normalize", |b| {
        b.iter(|| normalizer.normalize(&url, black_box(&fields), None))
    });
}

criterion_group!(benches, bench_extract, bench_resolve_and_normalize);
criterion_main!(benches);
