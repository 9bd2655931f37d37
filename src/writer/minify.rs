//! Content-stream minification.
//!
//! The stream is re-tokenized, re-emitted with minimal whitespace, then
//! re-tokenized again and compared token for token against the original.
//! A verify failure is fatal: silently shipping a content stream that
//! tokenizes differently would corrupt page drawing.

use std::collections::{BTreeSet, HashSet};

use log::warn;

use crate::core::{Document, NodeId, Object, PdfError};
use crate::filters;
use crate::parser::lexer::Lexer;

use super::push_token;

#[derive(Debug, PartialEq, Eq)]
enum Tok<'a> {
    /// Any ordinary token, by its exact source bytes.
    Plain(&'a [u8]),
    /// Inline-image payload between `ID` and `EI`.
    Image(&'a [u8]),
}

/// Minify one content stream: whitespace collapsed to single separators,
/// lines kept under 255 columns, every token byte-identical to the input.
///
/// Idempotent: minifying a minified stream returns it unchanged.
pub fn minify_content_stream(data: &[u8]) -> Result<Vec<u8>, PdfError> {
    let original = tokenize(data)?;
    let minified = serialize(&original);
    let reparsed = tokenize(&minified).map_err(|_| PdfError::RoundTrip)?;
    if original != reparsed {
        return Err(PdfError::RoundTrip);
    }
    Ok(minified)
}

fn tokenize(data: &[u8]) -> Result<Vec<Tok<'_>>, PdfError> {
    let mut lexer = Lexer::new(data);
    let mut out = Vec::new();
    while let Some(token) = lexer.next_token()? {
        let starts_image = token.is_word(b"ID");
        out.push(Tok::Plain(token.raw));
        if starts_image {
            out.push(Tok::Image(lexer.read_inline_image()?));
        }
    }
    Ok(out)
}

fn serialize(tokens: &[Tok<'_>]) -> Vec<u8> {
    let mut out = Vec::new();
    let mut line_len = 0usize;
    for token in tokens {
        match token {
            Tok::Plain(raw) => push_token(&mut out, &mut line_len, raw),
            Tok::Image(body) => {
                // Image bytes are opaque; delimit with single newlines and
                // close with EI ourselves.
                out.push(b'\n');
                out.extend_from_slice(body);
                out.extend_from_slice(b"\nEI");
                line_len = 2;
            }
        }
    }
    out
}

/// Minify page content streams (when the document-wide flag is on) plus
/// any stream individually flagged for minification.
pub(crate) fn minify_streams(doc: &mut Document, minify_content: bool) -> Result<(), PdfError> {
    let mut targets: BTreeSet<NodeId> = doc
        .node_ids()
        .filter(|id| {
            doc.node(*id)
                .as_stream()
                .is_some_and(|s| s.flags.minify)
        })
        .collect();
    if minify_content {
        collect_page_content_streams(doc, &mut targets);
    }

    for node in targets {
        let Object::Stream(stream) = doc.node_mut(node) else {
            continue;
        };
        if filters::has_filter(&stream.dict) {
            warn!("stream carries an undecoded filter; not minifying");
            continue;
        }
        stream.data = minify_content_stream(&stream.data)?;
        let len = stream.data.len() as i64;
        stream.dict.insert("Length", len);
    }
    Ok(())
}

fn collect_page_content_streams(doc: &Document, targets: &mut BTreeSet<NodeId>) {
    let Some(root) = doc.root() else { return };
    let Some(pages) = doc.node(root).as_dict().and_then(|d| d.get(b"Pages")) else {
        return;
    };
    let mut seen = HashSet::new();
    visit_page_tree(doc, pages, &mut seen, targets);
}

fn visit_page_tree(
    doc: &Document,
    value: &Object,
    seen: &mut HashSet<NodeId>,
    targets: &mut BTreeSet<NodeId>,
) {
    let value = match value {
        Object::Link(n) => {
            if !seen.insert(*n) {
                return;
            }
            doc.node(*n)
        }
        v => v,
    };
    let Some(dict) = value.as_dict() else { return };

    match dict.get(b"Type").and_then(Object::as_name) {
        Some(b"Pages") => {
            if let Some(Object::Array(kids)) = dict.get(b"Kids").map(|k| doc.resolve(k)) {
                for kid in kids {
                    visit_page_tree(doc, kid, seen, targets);
                }
            }
        }
        Some(b"Page") => {
            match dict.get(b"Contents").map(|c| doc.resolve(c)) {
                Some(Object::Stream(_)) => {
                    if let Some(Object::Link(n)) = dict.get(b"Contents") {
                        targets.insert(*n);
                    }
                }
                Some(Object::Array(parts)) => {
                    for part in parts {
                        if let Object::Link(n) = part {
                            if matches!(doc.node(*n), Object::Stream(_)) {
                                targets.insert(*n);
                            }
                        }
                    }
                }
                _ => {}
            }
        }
        _ => {}
    }
}
