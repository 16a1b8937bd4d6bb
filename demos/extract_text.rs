//! Extracts and prints the text of every page in a PDF given on the command
//! line.

use std::env;

use pdfkit::Document;

fn main() {
    let path = env::args().nth(1).expect("usage: extract_text <file.pdf>");
    let doc = Document::load(&path).expect("failed to load document");
    let pages: Vec<u32> = doc.get_pages().keys().copied().collect();
    let text = doc.extract_text(&pages).expect("failed to extract text");
    print!("{text}");
}
