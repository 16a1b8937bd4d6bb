use std::fs::File;
use std::io::{Cursor, Read};

use criterion::{criterion_group, criterion_main, Criterion};
use pdfkit::Document;

fn bench_load(c: &mut Criterion) {
    let mut buffer = Vec::new();
    File::open("assets/example.pdf").unwrap().read_to_end(&mut buffer).unwrap();

    c.bench_function("load", |b| {
        b.iter(|| {
            Document::load_from(Cursor::new(&buffer)).unwrap();
        })
    });
}

fn bench_load_with_encryption_probe(c: &mut Criterion) {
    let mut buffer = Vec::new();
    File::open("assets/example.pdf").unwrap().read_to_end(&mut buffer).unwrap();

    c.bench_function("load_with_password", |b| {
        b.iter(|| {
            let _ = Document::load_from_with_password(Cursor::new(&buffer), "");
        })
    });
}

criterion_group!(benches, bench_load, bench_load_with_encryption_probe);
criterion_main!(benches);
