use std::fs::File;
use std::io::{Cursor, Read};

use criterion::{criterion_group, criterion_main, Criterion};
use pdfkit::writer::WriterOptions;
use pdfkit::Document;

fn bench_save_classical(c: &mut Criterion) {
    let mut buffer = Vec::new();
    File::open("assets/example.pdf").unwrap().read_to_end(&mut buffer).unwrap();
    let doc = Document::load_from(Cursor::new(&buffer)).unwrap();

    c.bench_function("save_classical_xref", |b| {
        b.iter(|| {
            let _ = pdfkit::writer::write(&doc, &WriterOptions { xref_stream: Some(false) }).unwrap();
        })
    });
}

fn bench_save_xref_stream(c: &mut Criterion) {
    let mut buffer = Vec::new();
    File::open("assets/example.pdf").unwrap().read_to_end(&mut buffer).unwrap();
    let doc = Document::load_from(Cursor::new(&buffer)).unwrap();

    c.bench_function("save_xref_stream", |b| {
        b.iter(|| {
            let _ = pdfkit::writer::write(&doc, &WriterOptions { xref_stream: Some(true) }).unwrap();
        })
    });
}

criterion_group!(benches, bench_save_classical, bench_save_xref_stream);
criterion_main!(benches);
