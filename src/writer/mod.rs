//! Write path: enumeration, direct-object emission, and file assembly.
//!
//! Serialization renumbers everything: output ids are positions in the
//! enumeration order, never the ids the objects had on disk. A per-pass
//! seen-set catches any attempt to emit the same direct value twice,
//! which would silently duplicate a subgraph.

mod enumerate;
pub(crate) mod minify;
mod xref;

use std::collections::HashSet;

pub use minify::minify_content_stream;

use crate::core::{
    DEFAULT_BINARY_SIGNATURE, Dict, Document, NodeId, Object, PdfError, SaveOptions, pdf_date,
    validate_with_policy,
};
use crate::filters;
use crate::parser::lexer::is_regular;
use enumerate::Enumeration;

pub(crate) fn save(doc: &mut Document, options: SaveOptions) -> Result<Vec<u8>, PdfError> {
    validate_with_policy(doc, options.validation)?;
    apply_timestamp(doc, &options);

    let enumeration = enumerate::enumerate(doc);
    minify::minify_streams(doc, options.minify_enabled())?;
    refresh_stream_lengths(doc);

    let mut out = Vec::new();
    let minor = if options.object_streams_enabled() {
        doc.version.1.max(5)
    } else {
        4
    };
    out.extend_from_slice(format!("%PDF-1.{minor}\n").as_bytes());
    out.push(b'%');
    let signature = if options.preserve_binary_signature {
        doc.binary_signature
    } else {
        DEFAULT_BINARY_SIGNATURE
    };
    out.extend_from_slice(&signature);
    out.extend_from_slice(b"\n\n");

    if options.object_streams_enabled() {
        xref::write_with_object_streams(doc, &enumeration, &options, &mut out)?;
    } else {
        xref::write_classic(doc, &enumeration, &options, &mut out)?;
    }
    Ok(out)
}

/// `Info/ModDate` is stamped on every save that carries a timestamp;
/// `CreationDate` only when absent.
fn apply_timestamp(doc: &mut Document, options: &SaveOptions) {
    let Some(epoch) = options.effective_timestamp() else {
        return;
    };
    let stamp = Object::string(pdf_date(epoch).into_bytes());

    let info_node = match doc.trailer.get(b"Info") {
        Some(Object::Link(n)) => Some(*n),
        Some(Object::Dictionary(_)) => None,
        _ => {
            let n = doc.insert(Object::Dictionary(Dict::new()));
            doc.trailer.insert("Info", n);
            Some(n)
        }
    };
    let info = match info_node {
        Some(n) => doc.node_mut(n).as_dict_mut(),
        None => doc
            .trailer
            .get_mut(b"Info")
            .and_then(Object::as_dict_mut),
    };
    if let Some(info) = info {
        if !info.contains_key(b"CreationDate") {
            info.insert("CreationDate", stamp.clone());
        }
        info.insert("ModDate", stamp);
    }
}

/// `/Length` equals the payload length at the moment of serialization.
fn refresh_stream_lengths(doc: &mut Document) {
    for id in doc.node_ids().collect::<Vec<NodeId>>() {
        if let Object::Stream(stream) = doc.node_mut(id) {
            let len = stream.data.len() as i64;
            stream.dict.insert("Length", len);
        }
    }
}

/// Append one lexical token to a minified buffer: wrap the line before it
/// would pass 255 columns, and separate it from the previous token with a
/// single space only when both sides are regular characters.
pub(crate) fn push_token(out: &mut Vec<u8>, line_len: &mut usize, token: &[u8]) {
    if *line_len > 0 && *line_len + token.len() >= 255 {
        out.push(b'\n');
        *line_len = 0;
    }
    let need_space = out.last().is_some_and(|b| is_regular(*b))
        && token.first().is_some_and(|b| is_regular(*b));
    if need_space {
        out.push(b' ');
        *line_len += 1;
    }
    out.extend_from_slice(token);
    match token.iter().rposition(|b| *b == b'\n') {
        Some(last_newline) => *line_len = token.len() - last_newline - 1,
        None => *line_len += token.len(),
    }
}

/// Direct-object writer. One instance serves a whole serialization pass;
/// its seen-set is what detects double emission of a direct value.
pub(crate) struct ObjectWriter<'a> {
    doc: &'a Document,
    enumeration: &'a Enumeration,
    seen: HashSet<NodeId>,
}

impl<'a> ObjectWriter<'a> {
    pub(crate) fn new(doc: &'a Document, enumeration: &'a Enumeration) -> Self {
        ObjectWriter {
            doc,
            enumeration,
            seen: HashSet::new(),
        }
    }

    /// Indented emission, used for indirect-object bodies and the trailer.
    /// No trailing newline.
    pub(crate) fn write_value(
        &mut self,
        out: &mut Vec<u8>,
        value: &Object,
        indent: usize,
    ) -> Result<(), PdfError> {
        match value {
            Object::Null => out.extend_from_slice(b"null"),
            Object::Boolean(true) => out.extend_from_slice(b"true"),
            Object::Boolean(false) => out.extend_from_slice(b"false"),
            Object::Integer(i) => out.extend_from_slice(i.to_string().as_bytes()),
            Object::Real(r) => out.extend_from_slice(r.literal().as_bytes()),
            Object::Name(n) => emit_name(out, n.as_bytes()),
            Object::String(s) => emit_literal_string(out, s),
            Object::HexString(text) => {
                out.push(b'<');
                out.extend_from_slice(text);
                out.push(b'>');
            }
            Object::Reference(r) => {
                // Dangling reference: the legacy escape hatch.
                out.extend_from_slice(format!("({} {} R)", r.id, r.generation).as_bytes());
            }
            Object::Link(n) => {
                let n = *n;
                if let Some(id) = self.enumeration.id_of(n) {
                    out.extend_from_slice(format!("{id} 0 R").as_bytes());
                    return Ok(());
                }
                if !self.seen.insert(n) {
                    return Err(PdfError::DoubleEmit);
                }
                let target = self.doc.node(n);
                return self.write_value(out, target, indent);
            }
            Object::Array(items) => {
                if items.iter().all(|item| self.emits_on_one_line(item)) {
                    out.push(b'[');
                    for item in items {
                        out.push(b' ');
                        self.write_value(out, item, indent)?;
                    }
                    out.extend_from_slice(b" ]");
                } else {
                    out.extend_from_slice(b"[\n");
                    for item in items {
                        pad(out, indent + 1);
                        self.write_value(out, item, indent + 1)?;
                        out.push(b'\n');
                    }
                    pad(out, indent);
                    out.push(b']');
                }
            }
            Object::Dictionary(dict) => return self.write_dict(out, dict, indent),
            Object::Stream(_) => return Err(PdfError::DirectStream),
        }
        Ok(())
    }

    pub(crate) fn write_dict(
        &mut self,
        out: &mut Vec<u8>,
        dict: &Dict,
        indent: usize,
    ) -> Result<(), PdfError> {
        out.extend_from_slice(b"<<\n");
        for (key, v) in dict.iter() {
            pad(out, indent + 1);
            emit_name(out, key.as_bytes());
            out.push(b' ');
            self.write_value(out, v, indent + 1)?;
            out.push(b'\n');
        }
        pad(out, indent);
        out.extend_from_slice(b">>");
        Ok(())
    }

    /// Minified emission, used for object-stream members.
    pub(crate) fn write_value_minified(
        &mut self,
        out: &mut Vec<u8>,
        line_len: &mut usize,
        value: &Object,
    ) -> Result<(), PdfError> {
        match value {
            Object::Null => push_token(out, line_len, b"null"),
            Object::Boolean(true) => push_token(out, line_len, b"true"),
            Object::Boolean(false) => push_token(out, line_len, b"false"),
            Object::Integer(i) => push_token(out, line_len, i.to_string().as_bytes()),
            Object::Real(r) => push_token(out, line_len, r.literal().as_bytes()),
            Object::Name(n) => {
                let mut text = Vec::with_capacity(n.as_bytes().len() + 1);
                emit_name(&mut text, n.as_bytes());
                push_token(out, line_len, &text);
            }
            Object::String(s) => {
                let mut text = Vec::with_capacity(s.len() + 2);
                emit_literal_string(&mut text, s);
                push_token(out, line_len, &text);
            }
            Object::HexString(text) => {
                let mut token = Vec::with_capacity(text.len() + 2);
                token.push(b'<');
                token.extend_from_slice(text);
                token.push(b'>');
                push_token(out, line_len, &token);
            }
            Object::Reference(r) => {
                push_token(out, line_len, format!("({} {} R)", r.id, r.generation).as_bytes());
            }
            Object::Link(n) => {
                let n = *n;
                if let Some(id) = self.enumeration.id_of(n) {
                    push_token(out, line_len, id.to_string().as_bytes());
                    push_token(out, line_len, b"0");
                    push_token(out, line_len, b"R");
                    return Ok(());
                }
                if !self.seen.insert(n) {
                    return Err(PdfError::DoubleEmit);
                }
                let target = self.doc.node(n);
                return self.write_value_minified(out, line_len, target);
            }
            Object::Array(items) => {
                push_token(out, line_len, b"[");
                for item in items {
                    self.write_value_minified(out, line_len, item)?;
                }
                push_token(out, line_len, b"]");
            }
            Object::Dictionary(dict) => {
                push_token(out, line_len, b"<<");
                for (key, v) in dict.iter() {
                    let mut text = Vec::with_capacity(key.as_bytes().len() + 1);
                    emit_name(&mut text, key.as_bytes());
                    push_token(out, line_len, &text);
                    self.write_value_minified(out, line_len, v)?;
                }
                push_token(out, line_len, b">>");
            }
            Object::Stream(_) => return Err(PdfError::DirectStream),
        }
        Ok(())
    }

    /// Scalars, dangling references, and links to indirect objects all fit
    /// on one line; composites and inline links do not.
    fn emits_on_one_line(&self, value: &Object) -> bool {
        match value {
            Object::Link(n) => match self.enumeration.id_of(*n) {
                Some(_) => true,
                None => !self.doc.node(*n).is_composite(),
            },
            v => !v.is_composite(),
        }
    }
}

fn pad(out: &mut Vec<u8>, indent: usize) {
    for _ in 0..indent {
        out.extend_from_slice(b"  ");
    }
}

/// `/` plus the name bytes; whitespace, delimiters and `#` hex-escaped.
fn emit_name(out: &mut Vec<u8>, name: &[u8]) {
    out.push(b'/');
    for &b in name {
        if is_regular(b) && b != b'#' {
            out.push(b);
        } else {
            out.extend_from_slice(format!("#{b:02X}").as_bytes());
        }
    }
}

/// Parenthesized literal string. Backslashes and parens are escaped; a
/// raw CR would be folded to LF on re-read, so it goes out as `\r`.
fn emit_literal_string(out: &mut Vec<u8>, s: &[u8]) {
    out.push(b'(');
    for &b in s {
        match b {
            b'\\' => out.extend_from_slice(b"\\\\"),
            b'(' => out.extend_from_slice(b"\\("),
            b')' => out.extend_from_slice(b"\\)"),
            b'\r' => out.extend_from_slice(b"\\r"),
            _ => out.push(b),
        }
    }
    out.push(b')');
}

/// Per-stream output policy: an explicit per-stream hint beats the
/// document default; `was_compressed` streams go back out compressed.
/// Streams still carrying foreign filters are never recompressed.
pub(crate) fn stream_wants_compression(
    stream: &crate::core::Stream,
    options: &SaveOptions,
) -> bool {
    if filters::has_filter(&stream.dict) {
        return false;
    }
    if options.decompress_enabled() || stream.flags.decompress {
        return false;
    }
    options.compress_enabled() || stream.flags.compress || stream.flags.was_compressed
}
