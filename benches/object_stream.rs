use criterion::{criterion_group, criterion_main, Criterion};
use pdfkit::dictionary::Dictionary;
use pdfkit::object::{Object, Stream};
use pdfkit::object_stream::ObjectStream;

fn synthetic_object_stream(n: usize) -> Stream {
    let mut header = String::new();
    let mut body = String::new();
    for i in 0..n {
        let entry = format!("<< /Type /TestObj /Value {i} >>");
        header.push_str(&format!("{} {} ", i + 1, body.len()));
        body.push_str(&entry);
        body.push(' ');
    }
    let first = header.len();
    let mut dict = Dictionary::new();
    dict.set("Type", Object::name(&b"ObjStm"[..]));
    dict.set("N", Object::integer(n as i64));
    dict.set("First", Object::integer(first as i64));
    Stream::new(dict, format!("{header}{body}").into_bytes())
}

fn bench_object_stream_decode(c: &mut Criterion) {
    let mut stream = synthetic_object_stream(100);

    c.bench_function("object_stream_decode", |b| {
        b.iter(|| {
            let _ = ObjectStream::new(&mut stream).unwrap();
        })
    });
}

criterion_group!(benches, bench_object_stream_decode);
criterion_main!(benches);
