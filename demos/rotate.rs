//! Sets every page's `/Rotate` entry to a value given on the command line
//! and writes the result alongside the input as `<name>.rotated.pdf`.

use std::env;

use pdfkit::{Document, Object};

fn main() {
    let mut args = env::args().skip(1);
    let path = args.next().expect("usage: rotate <file.pdf> <degrees>");
    let degrees: i64 = args.next().expect("usage: rotate <file.pdf> <degrees>").parse().expect("degrees must be an integer");

    let mut doc = Document::load(&path).expect("failed to load document");
    for (_, page_id) in doc.get_pages() {
        let mut page_dict = doc.get_object(page_id).expect("page object missing").as_dict().expect("page is not a dictionary").clone();
        page_dict.set("Rotate", Object::integer(degrees));
        doc.update_object(page_id, page_dict);
    }

    let out_path = format!("{path}.rotated.pdf");
    doc.save(&out_path).expect("failed to save document");
    println!("wrote {out_path}");
}
