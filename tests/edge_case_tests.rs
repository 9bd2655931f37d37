use pdfkern::{Document, Object, PdfError, SaveOptions, Stream, dict};

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn pdf_with_value(value: &str) -> Vec<u8> {
    let body = format!(
        "1 0 obj\n<< /Type /Catalog /Pages 2 0 R /Probe {value} >>\nendobj\n\
         2 0 obj\n<< /Type /Pages /Kids [ ] /Count 0 >>\nendobj\n"
    );
    let mut bytes = Vec::new();
    bytes.extend_from_slice(b"%PDF-1.4\n%\xBF\xF7\xA2\xFE\n\n");
    bytes.extend_from_slice(body.as_bytes());
    let xref_offset = bytes.len();
    bytes.extend_from_slice(b"xref\n0 1\n0000000000 65535 f \n");
    bytes.extend_from_slice(
        format!("trailer << /Root 1 0 R /Size 3 >>\nstartxref\n{xref_offset}\n%%EOF\n").as_bytes(),
    );
    bytes
}

fn probe(doc: &Document) -> &Object {
    let root = doc.root().unwrap();
    doc.node(root).as_dict().unwrap().get(b"Probe").unwrap()
}

#[test]
fn hex_string_is_normalized() {
    init_logging();
    let mut doc = Document::parse(&pdf_with_value("<4A 6B 9>")).unwrap();
    assert_eq!(probe(&doc), &Object::HexString(b"4a6b90".to_vec()));

    let out = doc.to_bytes().unwrap();
    assert!(String::from_utf8_lossy(&out).contains("/Probe <4a6b90>"));
}

#[test]
fn real_spelling_survives_serialization() {
    init_logging();
    let mut doc = Document::parse(&pdf_with_value("0.50")).unwrap();
    let out = doc.to_bytes().unwrap();
    assert!(String::from_utf8_lossy(&out).contains("/Probe 0.50"));
}

#[test]
fn odd_number_spellings_parse() {
    init_logging();
    let doc = Document::parse(&pdf_with_value("[ +17 -.5 4. 007 ]")).unwrap();
    let items = probe(&doc).as_array().unwrap();
    assert_eq!(items[0].as_int(), Some(17));
    assert_eq!(items[1].as_f64(), Some(-0.5));
    assert_eq!(items[2].as_f64(), Some(4.0));
    assert_eq!(items[3].as_int(), Some(7));
}

#[test]
fn octal_escapes_decode() {
    init_logging();
    let doc = Document::parse(&pdf_with_value("(\\101\\102\\103)")).unwrap();
    assert_eq!(probe(&doc).as_string(), Some(&b"ABC"[..]));
}

#[test]
fn escaped_cr_survives_roundtrip() {
    init_logging();
    let mut doc = Document::parse(&pdf_with_value("(a\\rb)")).unwrap();
    assert_eq!(probe(&doc).as_string(), Some(&b"a\rb"[..]));

    let out = doc.to_bytes().unwrap();
    assert!(String::from_utf8_lossy(&out).contains("/Probe (a\\rb)"));
    let reparsed = Document::parse(&out).unwrap();
    assert_eq!(probe(&reparsed).as_string(), Some(&b"a\rb"[..]));
}

#[test]
fn empty_containers_roundtrip() {
    init_logging();
    let mut doc = Document::parse(&pdf_with_value("[ ]")).unwrap();
    assert_eq!(probe(&doc).as_array().unwrap().len(), 0);
    let out = doc.to_bytes().unwrap();
    assert!(String::from_utf8_lossy(&out).contains("/Probe [ ]"));

    let doc = Document::parse(&pdf_with_value("<< >>")).unwrap();
    assert_eq!(probe(&doc).as_dict().unwrap().len(), 0);
}

#[test]
fn carriage_return_only_line_endings() {
    init_logging();
    let body = "1 0 obj\r<< /Type /Catalog /Pages 2 0 R >>\rendobj\r\
                2 0 obj\r<< /Type /Pages /Kids [ ] /Count 0 >>\rendobj\r";
    let mut bytes = Vec::new();
    bytes.extend_from_slice(b"%PDF-1.4\r");
    bytes.extend_from_slice(body.as_bytes());
    let xref_offset = bytes.len();
    bytes.extend_from_slice(b"xref\r0 1\r0000000000 65535 f \r");
    bytes.extend_from_slice(
        format!("trailer << /Root 1 0 R /Size 3 >>\rstartxref\r{xref_offset}\r%%EOF\r").as_bytes(),
    );
    let doc = Document::parse(&bytes).unwrap();
    assert!(doc.root().is_some());
}

#[test]
fn stream_with_cr_lf_after_keyword() {
    init_logging();
    let body = "1 0 obj\n<< /Type /Catalog /Pages 2 0 R >>\nendobj\n\
                2 0 obj\n<< /Type /Pages /Kids [ ] /Count 0 >>\nendobj\n\
                3 0 obj\n<< /Length 5 >>\nstream\r\nhello\nendstream\nendobj\n";
    let mut bytes = Vec::new();
    bytes.extend_from_slice(b"%PDF-1.4\n");
    bytes.extend_from_slice(body.as_bytes());
    let xref_offset = bytes.len();
    bytes.extend_from_slice(b"xref\n0 1\n0000000000 65535 f \n");
    bytes.extend_from_slice(
        format!("trailer << /Root 1 0 R /Size 4 >>\nstartxref\n{xref_offset}\n%%EOF\n").as_bytes(),
    );
    let doc = Document::parse(&bytes).unwrap();
    let stream = doc
        .iter()
        .find_map(|(_, v)| v.as_stream())
        .expect("stream object");
    assert_eq!(stream.data, b"hello");
}

#[test]
fn deep_nesting_is_rejected() {
    init_logging();
    let value = format!("{}{}", "[".repeat(300), "]".repeat(300));
    assert!(matches!(
        Document::parse(&pdf_with_value(&value)),
        Err(PdfError::Parse { .. })
    ));
}

#[test]
fn clean_names_emit_verbatim() {
    init_logging();
    let mut doc = Document::parse(&pdf_with_value("/Simple-Name_2")).unwrap();
    let out = doc.to_bytes().unwrap();
    assert!(String::from_utf8_lossy(&out).contains("/Probe /Simple-Name_2"));
}

#[test]
fn minify_save_option_rewrites_page_content() {
    init_logging();
    let mut doc = Document::new();
    let root = doc.root().unwrap();
    let pages_id = doc
        .node(root)
        .as_dict()
        .unwrap()
        .get(b"Pages")
        .unwrap()
        .as_link()
        .unwrap();

    let source = b"BT\n   /F1   12   Tf\n   ( spaced   out )   Tj\nET\n".to_vec();
    let content = doc.insert(Object::Stream(Stream::new(dict! {}, source.clone())));
    let page = doc.insert(Object::Dictionary(dict! {
        "Type" => Object::name("Page"),
        "Parent" => pages_id,
        "Contents" => content,
    }));
    {
        let pages = doc.node_mut(pages_id).as_dict_mut().unwrap();
        pages.insert("Kids", Object::Array(vec![Object::Link(page)]));
        pages.insert("Count", 1);
    }

    let out = doc
        .to_bytes_with(SaveOptions {
            minify: true,
            ..SaveOptions::default()
        })
        .unwrap();
    let reparsed = Document::parse(&out).unwrap();
    let minified = reparsed
        .iter()
        .find_map(|(_, v)| v.as_stream())
        .expect("content stream");
    assert_eq!(
        minified.data,
        pdfkern::minify_content_stream(&source).unwrap()
    );
}

#[test]
fn per_stream_minify_flag() {
    init_logging();
    let mut doc = Document::new();
    let mut stream = Stream::new(dict! {}, b"q   1 0 0 1   0 0 cm   Q".to_vec());
    stream.flags.minify = true;
    let node = doc.insert(Object::Stream(stream));
    let root = doc.root().unwrap();
    doc.node_mut(root)
        .as_dict_mut()
        .unwrap()
        .insert("AAContent", node);

    let out = doc.to_bytes().unwrap();
    assert!(String::from_utf8_lossy(&out).contains("q 1 0 0 1 0 0 cm Q"));
}

#[test]
fn length_reference_to_missing_object() {
    init_logging();
    let body = "1 0 obj\n<< /Type /Catalog /Pages 2 0 R >>\nendobj\n\
                2 0 obj\n<< /Type /Pages /Kids [ ] /Count 0 >>\nendobj\n\
                3 0 obj\n<< /Length 42 0 R >>\nstream\ncontent bytes\nendstream\nendobj\n";
    let mut bytes = Vec::new();
    bytes.extend_from_slice(b"%PDF-1.4\n");
    bytes.extend_from_slice(body.as_bytes());
    let xref_offset = bytes.len();
    bytes.extend_from_slice(b"xref\n0 1\n0000000000 65535 f \n");
    bytes.extend_from_slice(
        format!("trailer << /Root 1 0 R /Size 4 >>\nstartxref\n{xref_offset}\n%%EOF\n").as_bytes(),
    );
    let doc = Document::parse(&bytes).unwrap();
    let stream = doc
        .iter()
        .find_map(|(_, v)| v.as_stream())
        .expect("stream object");
    assert_eq!(stream.data, b"content bytes");
    // Length was corrected to the actual byte count.
    assert_eq!(stream.dict.get(b"Length").unwrap().as_int(), Some(13));
}
