use std::fs::File;
use std::io::{Cursor, Read};

use criterion::{criterion_group, criterion_main, Criterion};
use pdfkit::Document;

fn bench_extract_text(c: &mut Criterion) {
    let mut buffer = Vec::new();
    File::open("assets/example.pdf").unwrap().read_to_end(&mut buffer).unwrap();
    let doc = Document::load_from(Cursor::new(&buffer)).unwrap();
    let pages: Vec<u32> = doc.get_pages().keys().cloned().collect();

    c.bench_function("extract_text", |b| {
        b.iter(|| {
            let _ = doc.extract_text(&pages).unwrap();
        })
    });
}

fn bench_update_object(c: &mut Criterion) {
    let mut buffer = Vec::new();
    File::open("assets/example.pdf").unwrap().read_to_end(&mut buffer).unwrap();
    let doc = Document::load_from(Cursor::new(&buffer)).unwrap();

    c.bench_function("update_object", |b| {
        b.iter(|| {
            let mut doc_clone = doc.clone();
            let page = doc_clone.get_page(1).unwrap();
            let mut page_dict = doc_clone.get_object(page).unwrap().as_dict().unwrap().clone();
            page_dict.set("Rotate", pdfkit::Object::integer(90));
            doc_clone.update_object(page, page_dict);
        })
    });
}

criterion_group!(benches, bench_extract_text, bench_update_object);
criterion_main!(benches);
