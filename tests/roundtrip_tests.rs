use std::collections::HashSet;

use pdfkern::{Dict, Document, Object, SaveOptions, Stream, dict, minify_content_stream};

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Structural equality between two documents, indifferent to how sharing
/// is expressed (inline value vs. link into the arena) and to trailer
/// `Size`, which is recomputed on every write.
fn tree_eq(a: &Document, b: &Document) -> bool {
    let mut a_trailer = a.trailer.clone();
    let mut b_trailer = b.trailer.clone();
    a_trailer.remove(b"Size");
    b_trailer.remove(b"Size");
    let mut visiting = HashSet::new();
    dict_eq(a, b, &a_trailer, &b_trailer, &mut visiting)
}

type Visiting = HashSet<(Option<usize>, Option<usize>)>;

fn key_of(doc: &Document, value: &Object) -> Option<usize> {
    value.as_link().map(|n| {
        doc.iter()
            .position(|(id, _)| id == n)
            .expect("link into the same document")
    })
}

fn value_eq(a_doc: &Document, b_doc: &Document, a: &Object, b: &Object, seen: &mut Visiting) -> bool {
    if matches!(a, Object::Link(_)) || matches!(b, Object::Link(_)) {
        let pair = (key_of(a_doc, a), key_of(b_doc, b));
        if !seen.insert(pair) {
            // Already comparing this pair further up the stack (a cycle).
            return true;
        }
        let result = value_eq(a_doc, b_doc, a_doc.resolve(a), b_doc.resolve(b), seen);
        return result;
    }

    match (a, b) {
        (Object::Null, Object::Null) => true,
        (Object::Boolean(x), Object::Boolean(y)) => x == y,
        (Object::Integer(x), Object::Integer(y)) => x == y,
        (Object::Real(x), Object::Real(y)) => x == y,
        (Object::Name(x), Object::Name(y)) => x == y,
        (Object::String(x), Object::String(y)) => x == y,
        (Object::HexString(x), Object::HexString(y)) => x == y,
        (Object::Reference(x), Object::Reference(y)) => x == y,
        (Object::Array(xs), Object::Array(ys)) => {
            xs.len() == ys.len()
                && xs
                    .iter()
                    .zip(ys)
                    .all(|(x, y)| value_eq(a_doc, b_doc, x, y, seen))
        }
        (Object::Dictionary(x), Object::Dictionary(y)) => dict_eq(a_doc, b_doc, x, y, seen),
        (Object::Stream(x), Object::Stream(y)) => {
            x.data == y.data && dict_eq(a_doc, b_doc, &x.dict, &y.dict, seen)
        }
        _ => false,
    }
}

fn dict_eq(a_doc: &Document, b_doc: &Document, a: &Dict, b: &Dict, seen: &mut Visiting) -> bool {
    a.len() == b.len()
        && a.iter().zip(b.iter()).all(|((ka, va), (kb, vb))| {
            ka == kb && value_eq(a_doc, b_doc, va, vb, seen)
        })
}

/// A moderately rich hand-written file: nested containers, every string
/// form, a stream, a shared object, and a parent back-pointer.
fn fixture() -> Vec<u8> {
    let content = b"BT /F1 24.0 Tf 72 720 Td (Hello \\(PDF\\)) Tj ET";
    let mut bytes = Vec::new();
    bytes.extend_from_slice(b"%PDF-1.4\n%\xBF\xF7\xA2\xFE\n\n");
    bytes.extend_from_slice(
        b"1 0 obj\n<< /Type /Catalog /Pages 2 0 R >>\nendobj\n",
    );
    bytes.extend_from_slice(
        b"2 0 obj\n<< /Type /Pages /Kids [ 3 0 R ] /Count 1 >>\nendobj\n",
    );
    bytes.extend_from_slice(
        b"3 0 obj\n<< /Type /Page /Parent 2 0 R /Contents 4 0 R\n   /MediaBox [ 0 0 612.0 792.0 ]\n   /Resources << /Font << /F1 5 0 R >> >>\n   /Extras [ (lit) <4A6B> /Nm 1.50 -2 true null ]\n>>\nendobj\n",
    );
    bytes.extend_from_slice(
        format!(
            "4 0 obj\n<< /Length {} >>\nstream\n{}\nendstream\nendobj\n",
            content.len(),
            String::from_utf8_lossy(content)
        )
        .as_bytes(),
    );
    bytes.extend_from_slice(
        b"5 0 obj\n<< /Type /Font /Subtype /Type1 /BaseFont /Helvetica >>\nendobj\n",
    );
    let xref_offset = bytes.len();
    bytes.extend_from_slice(
        b"xref\n0 6\n\
          0000000000 65535 f \n\
          0000000000 00000 n \n\
          0000000000 00000 n \n\
          0000000000 00000 n \n\
          0000000000 00000 n \n\
          0000000000 00000 n \n",
    );
    bytes.extend_from_slice(
        format!("trailer << /Root 1 0 R /Size 6 >>\nstartxref\n{xref_offset}\n%%EOF\n").as_bytes(),
    );
    bytes
}

// --- Law 1: parse ∘ serialize ∘ parse = parse ---

#[test]
fn reparse_after_serialize_preserves_the_tree() {
    init_logging();
    let bytes = fixture();
    let mut first = Document::parse(&bytes).unwrap();
    let out = first.to_bytes().unwrap();
    let reparsed = Document::parse(&out).unwrap();
    let fresh = Document::parse(&bytes).unwrap();
    assert!(tree_eq(&fresh, &reparsed));
}

#[test]
fn serialization_reaches_a_fixed_point() {
    init_logging();
    let mut first = Document::parse(&fixture()).unwrap();
    let once = first.to_bytes().unwrap();
    let mut second = Document::parse(&once).unwrap();
    let twice = second.to_bytes().unwrap();
    assert_eq!(once, twice);
}

#[test]
fn roundtrip_through_object_streams() {
    init_logging();
    let mut doc = Document::parse(&fixture()).unwrap();
    let packed = doc
        .to_bytes_with(SaveOptions {
            use_object_streams: true,
            ..SaveOptions::default()
        })
        .unwrap();
    let from_packed = Document::parse(&packed).unwrap();
    let fresh = Document::parse(&fixture()).unwrap();
    assert!(tree_eq(&fresh, &from_packed));
}

#[test]
fn compressed_roundtrip_preserves_stream_bytes() {
    init_logging();
    let mut doc = Document::parse(&fixture()).unwrap();
    let original: Vec<Vec<u8>> = doc
        .iter()
        .filter_map(|(_, v)| v.as_stream().map(|s| s.data.clone()))
        .collect();

    let out = doc
        .to_bytes_with(SaveOptions {
            compress: true,
            ..SaveOptions::default()
        })
        .unwrap();
    let reparsed = Document::parse(&out).unwrap();
    let after: Vec<Vec<u8>> = reparsed
        .iter()
        .filter_map(|(_, v)| v.as_stream().map(|s| s.data.clone()))
        .collect();
    assert_eq!(original, after);
}

// --- Law 2: minification is idempotent ---

#[test]
fn minify_is_idempotent() {
    init_logging();
    let src = b"BT\n  /F1 24.0 Tf\n  72 720 Td\n  (Hello \\(PDF\\))   Tj\nET\n";
    let once = minify_content_stream(src).unwrap();
    let twice = minify_content_stream(&once).unwrap();
    assert_eq!(once, twice);
}

// --- Cycles ---

#[test]
fn parent_cycle_survives_roundtrip() {
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

    let page = doc.insert(Object::Dictionary(dict! {
        "Type" => Object::name("Page"),
        "Parent" => pages_id,
    }));
    let pages = doc.node_mut(pages_id).as_dict_mut().unwrap();
    pages.insert("Kids", Object::Array(vec![Object::Link(page)]));
    pages.insert("Count", 1);

    let out = doc.to_bytes().unwrap();
    let reparsed = Document::parse(&out).unwrap();

    let root = reparsed.root().unwrap();
    let pages_link = reparsed
        .node(root)
        .as_dict()
        .unwrap()
        .get(b"Pages")
        .unwrap()
        .as_link()
        .unwrap();
    let kids = reparsed
        .dict_get(reparsed.node(pages_link).as_dict().unwrap(), b"Kids")
        .unwrap()
        .as_array()
        .unwrap();
    let kid = kids[0].as_link().unwrap();
    let parent_link = reparsed
        .node(kid)
        .as_dict()
        .unwrap()
        .get(b"Parent")
        .unwrap()
        .as_link()
        .unwrap();
    // Identity, not just equality: the parent IS the page-tree node.
    assert_eq!(parent_link, pages_link);
}

// --- Stream flag behavior across generations ---

#[test]
fn unmutated_compressed_streams_stay_compressed() {
    init_logging();
    let mut doc = Document::new();
    let stream = doc.insert(Object::Stream(Stream::new(
        Dict::new(),
        b"0 0 612 792 re f ".repeat(30),
    )));
    let root = doc.root().unwrap();
    doc.node_mut(root)
        .as_dict_mut()
        .unwrap()
        .insert("AAContent", stream);

    // Generation 1: explicitly compressed.
    let gen1 = doc
        .to_bytes_with(SaveOptions {
            compress: true,
            ..SaveOptions::default()
        })
        .unwrap();
    // Generation 2: default options; was-compressed wins.
    let mut doc2 = Document::parse(&gen1).unwrap();
    let gen2 = doc2.to_bytes().unwrap();
    assert!(String::from_utf8_lossy(&gen2).contains("/Filter /FlateDecode"));

    // And the payload is still intact.
    let doc3 = Document::parse(&gen2).unwrap();
    let (_, stream) = doc3.iter().find(|(_, v)| v.as_stream().is_some()).unwrap();
    assert_eq!(
        stream.as_stream().unwrap().data,
        b"0 0 612 792 re f ".repeat(30)
    );
}
