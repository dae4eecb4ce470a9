use criterion::{criterion_group, criterion_main, Criterion};
use markweave_engine::markdown::{parse, serialize};
use markweave_engine::schema::markdown_schema;

fn generate_document(sections: usize) -> String {
    let base = "# Title\n\n\
                Some *emphasised* and **strong** prose with a [link](https://example.com).\n\n\
                - item one\n- item two\n  - nested\n\n\
                1. first\n2. second\n\n\
                > a quote with `code` inside\n\n\
                | a | b |\n| --- | ---: |\n| 1 | 2 |\n\n\
                ```rust\nfn example() {}\n```\n\n";
    base.repeat(sections)
}

fn bench_parse(c: &mut Criterion) {
    let mut group = c.benchmark_group("roundtrip");
    group.sample_size(10);

    let schema = markdown_schema();
    let content = generate_document(50);

    group.bench_function("parse", |b| {
        b.iter(|| {
            let doc = parse(&schema, std::hint::black_box(&content));
            std::hint::black_box(doc);
        });
    });

    let doc = parse(&schema, &content);
    group.bench_function("serialize", |b| {
        b.iter(|| {
            let text = serialize(&schema, std::hint::black_box(&doc)).unwrap();
            std::hint::black_box(text);
        });
    });

    group.bench_function("parse_serialize_cycle", |b| {
        b.iter(|| {
            let doc = parse(&schema, std::hint::black_box(&content));
            let text = serialize(&schema, &doc).unwrap();
            std::hint::black_box(text);
        });
    });

    group.finish();
}

criterion_group!(benches, bench_parse);
criterion_main!(benches);
