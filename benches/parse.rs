use std::fs::File;
use std::io::{Cursor, Read};

use criterion::{criterion_group, criterion_main, Criterion};
use pdfkit::writer::{write_incremental, WriterOptions};
use pdfkit::Document;

fn bench_parse(c: &mut Criterion) {
    let mut buffer = Vec::new();
    File::open("assets/example.pdf").unwrap().read_to_end(&mut buffer).unwrap();

    c.bench_function("parse", |b| {
        b.iter(|| {
            Document::load_from(Cursor::new(&buffer)).unwrap();
        })
    });
}

fn bench_parse_incremental_update(c: &mut Criterion) {
    let mut buffer = Vec::new();
    File::open("assets/example.pdf").unwrap().read_to_end(&mut buffer).unwrap();
    let mut doc = Document::load_from(Cursor::new(&buffer)).unwrap();
    let page = doc.get_page(1).unwrap();
    let mut page_dict = doc.get_object(page).unwrap().as_dict().unwrap().clone();
    page_dict.set("Rotate", pdfkit::Object::integer(90));
    doc.update_object(page, page_dict);
    let updated = write_incremental(&doc, &buffer, &WriterOptions::default()).unwrap();

    c.bench_function("parse_incremental_update", |b| {
        b.iter(|| {
            Document::load_mem(&updated).unwrap();
        })
    });
}

criterion_group!(benches, bench_parse, bench_parse_incremental_update);
criterion_main!(benches);
