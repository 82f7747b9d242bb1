//! Benchmarks for markdown import.

use criterion::{Criterion, black_box, criterion_group, criterion_main};
use mdsync::Session;
use mdsync::plugins::{CorePluginParams, content_plugins};

fn session() -> Session {
    Session::with_core(CorePluginParams::default(), content_plugins()).unwrap()
}

fn bench_import_simple(c: &mut Criterion) {
    let session = session();
    let texts = ["# Hello\n\nWorld", "# Hello\n\nThere"];
    let mut i = 0;
    c.bench_function("import_simple", |b| {
        b.iter(|| {
            i += 1;
            session.set_markdown(black_box(texts[i % 2])).unwrap();
        });
    });
}

fn bench_import_guide(c: &mut Criterion) {
    let guide = include_str!("fixtures/guide.md");
    let edited = format!("{guide}\nOne more line.\n");
    let session = session();
    let mut i = 0;
    c.bench_function("import_guide", |b| {
        b.iter(|| {
            i += 1;
            let text = if i % 2 == 0 { guide } else { edited.as_str() };
            session.set_markdown(black_box(text)).unwrap();
        });
    });
}

fn bench_parse_only(c: &mut Criterion) {
    let guide = include_str!("fixtures/guide.md");
    let session = session();
    let pipeline = mdsync::import::ImportPipeline::from_registries(session.registries());
    c.bench_function("parse_guide", |b| {
        b.iter(|| pipeline.parse(black_box(guide)).unwrap());
    });
}

criterion_group!(benches, bench_import_simple, bench_import_guide, bench_parse_only);
criterion_main!(benches);
