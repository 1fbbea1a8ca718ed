//! Synthetic PDFs for tests
//!
//! Every page carries a `(<label>-Page-<n>)` text operator so tests can
//! check which source page ended up where.

use lopdf::{Dictionary, Document, Object, ObjectId, Stream};

/// Build a simple PDF with `num_pages` pages labelled with `label`
pub fn sample_document(num_pages: u32, label: &str) -> Vec<u8> {
    let mut doc = Document::with_version("1.5");

    let pages_id = doc.new_object_id();
    let catalog_id = doc.new_object_id();

    let mut page_ids = Vec::new();

    for page_num in 0..num_pages {
        let page_id = doc.new_object_id();
        let content_id = doc.new_object_id();

        let content = format!(
            "BT /F1 12 Tf 50 700 Td ({}-Page-{}) Tj ET",
            label,
            page_num + 1
        );
        doc.objects.insert(
            content_id,
            Object::Stream(Stream::new(Dictionary::new(), content.into_bytes())),
        );

        let mut page_dict = Dictionary::new();
        page_dict.set("Type", Object::Name(b"Page".to_vec()));
        page_dict.set("Parent", Object::Reference(pages_id));
        page_dict.set("Contents", Object::Reference(content_id));

        doc.objects.insert(page_id, Object::Dictionary(page_dict));
        page_ids.push(Object::Reference(page_id));
    }

    // MediaBox lives on the root so pages have to inherit it
    let mut pages_dict = Dictionary::new();
    pages_dict.set("Type", Object::Name(b"Pages".to_vec()));
    pages_dict.set("Count", Object::Integer(num_pages as i64));
    pages_dict.set("Kids", Object::Array(page_ids));
    pages_dict.set(
        "MediaBox",
        Object::Array(vec![
            Object::Integer(0),
            Object::Integer(0),
            Object::Integer(612),
            Object::Integer(792),
        ]),
    );
    doc.objects.insert(pages_id, Object::Dictionary(pages_dict));

    let mut catalog_dict = Dictionary::new();
    catalog_dict.set("Type", Object::Name(b"Catalog".to_vec()));
    catalog_dict.set("Pages", Object::Reference(pages_id));
    doc.objects
        .insert(catalog_id, Object::Dictionary(catalog_dict));

    doc.trailer.set("Root", Object::Reference(catalog_id));

    let mut buffer = Vec::new();
    doc.save_to(&mut buffer).expect("in-memory save cannot fail");
    buffer
}

/// Page labels of an unencrypted document, in page order
pub fn page_labels(bytes: &[u8]) -> Vec<String> {
    let doc = Document::load_mem(bytes).expect("fixture should parse");
    labels_of(&doc)
}

/// Page labels of an already loaded document, in page order
pub fn labels_of(doc: &Document) -> Vec<String> {
    doc.get_pages()
        .values()
        .map(|&page_id| label_of_page(doc, page_id))
        .collect()
}

fn label_of_page(doc: &Document, page_id: ObjectId) -> String {
    let content = doc.get_page_content(page_id).unwrap_or_default();
    let text = String::from_utf8_lossy(&content);
    match (text.find('('), text.find(')')) {
        (Some(start), Some(end)) if start < end => text[start + 1..end].to_string(),
        _ => String::new(),
    }
}

/// Load an encrypted document and decrypt it with `password`
pub fn open_with_password(bytes: &[u8], password: &str) -> Result<Document, lopdf::Error> {
    let mut doc = Document::load_mem(bytes)?;
    doc.decrypt(password)?;
    Ok(doc)
}
