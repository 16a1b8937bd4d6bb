use criterion::{criterion_group, criterion_main, Criterion};
use pdfkit::date;
use pdfkit::Object;

fn bench_format_and_parse_date(c: &mut Criterion) {
    c.bench_function("format_and_parse_pdf_date", |b| {
        b.iter(|| {
            let now = jiff::Zoned::now();
            let text = date::format(&now);
            let reparsed = date::parse(&text);
            assert!(reparsed.is_ok());
        });
    });
}

fn bench_integer_write(c: &mut Criterion) {
    c.bench_function("integer_write", |b| {
        b.iter(|| {
            let mut doc = pdfkit::Document::new();
            doc.add_object(Object::integer(5));
            let _ = doc.save_to_bytes().unwrap();
        })
    });
}

fn bench_floating_point_write(c: &mut Criterion) {
    c.bench_function("floating_point_write", |b| {
        b.iter(|| {
            let mut doc = pdfkit::Document::new();
            doc.add_object(Object::real(5.0));
            let _ = doc.save_to_bytes().unwrap();
        })
    });
}

fn bench_boolean_write(c: &mut Criterion) {
    c.bench_function("boolean_write", |b| {
        b.iter(|| {
            let mut doc = pdfkit::Document::new();
            doc.add_object(Object::Boolean(false));
            let _ = doc.save_to_bytes().unwrap();
        })
    });
}

criterion_group!(
    benches,
    bench_format_and_parse_date,
    bench_integer_write,
    bench_floating_point_write,
    bench_boolean_write
);
criterion_main!(benches);
