//! Read path: full-buffer forward scan into a [`Document`].
//!
//! The file is scanned front to back; indirect objects are registered at
//! the positions they are actually found. Cross-reference tables must be
//! present and well-formed, but their offsets are never trusted. Trailers
//! (classic and xref-stream dictionaries) are collected and merged once
//! the scan completes, selected by proximity to the final `startxref`
//! value and chained through `Prev`.

pub(crate) mod lexer;
mod object_stream;
mod resolve;
mod xref;

use std::collections::HashMap;

use log::warn;

use crate::core::{
    DEFAULT_BINARY_SIGNATURE, Dict, Document, Name, NodeId, Object, ObjRef, ParseOptions,
    PdfError, Real, Stream, validate_with_policy,
};
use crate::filters;
use lexer::{Lexer, Token, TokenKind};

/// Nesting bound for arrays/dictionaries, against hostile input.
const MAX_DEPTH: usize = 100;

/// Trailer keys that describe the carrying stream rather than the
/// document; never copied into the merged trailer.
const STREAM_ONLY_TRAILER_KEYS: &[&[u8]] = &[
    b"DecodeParms",
    b"Filter",
    b"Index",
    b"Length",
    b"Prev",
    b"W",
    b"XRefStm",
];

pub(crate) fn parse(buf: &[u8], options: ParseOptions) -> Result<Document, PdfError> {
    let mut parser = Parser::begin(buf)?;
    parser.scan()?;

    let mut trailer = parser.merge_trailers()?;
    let encrypted = trailer.contains_key(b"Encrypt");
    if encrypted {
        warn!("document is encrypted; stream payloads are left opaque");
    } else {
        parser.decode_filters()?;
        parser.expand_object_streams()?;
    }

    let Parser {
        mut nodes,
        registry,
        version,
        signature,
        ..
    } = parser;
    resolve::resolve_references(&mut nodes, &mut trailer, &registry);

    let mut doc = Document::from_parts(nodes, trailer, version, signature);
    validate_with_policy(&mut doc, options.validation)?;
    Ok(doc)
}

struct TrailerCandidate {
    dict: Dict,
    offset: usize,
    from_xref_stream: bool,
}

struct Parser<'a> {
    buf: &'a [u8],
    nodes: Vec<Object>,
    /// File offset of each node's object header (sub-objects from object
    /// streams inherit their container's offset).
    node_offsets: Vec<usize>,
    registry: HashMap<(u32, u16), NodeId>,
    trailers: Vec<TrailerCandidate>,
    startxref: Option<usize>,
    version: (u8, u8),
    signature: [u8; 4],
    decode_names: bool,
}

impl<'a> Parser<'a> {
    /// Check header and `%%EOF`, pick up version and binary signature.
    fn begin(buf: &'a [u8]) -> Result<Self, PdfError> {
        let head = &buf[..buf.len().min(1024)];
        let header_pos = find(head, b"%PDF-").ok_or(PdfError::Header)?;

        let tail_start = buf.len().saturating_sub(1024);
        if find(&buf[tail_start..], b"%%EOF").is_none() {
            return Err(PdfError::Header);
        }

        let version = parse_version(&buf[header_pos + 5..]).ok_or(PdfError::Header)?;
        let signature = read_binary_signature(buf, header_pos);

        Ok(Parser {
            buf,
            nodes: Vec::new(),
            node_offsets: Vec::new(),
            registry: HashMap::new(),
            trailers: Vec::new(),
            startxref: None,
            version,
            signature,
            decode_names: version >= (1, 2),
        })
    }

    /// Forward scan over the whole buffer.
    fn scan(&mut self) -> Result<(), PdfError> {
        let mut lexer = Lexer::new(self.buf);
        // Window of the two most recent integer tokens; `obj` reaches back
        // through it for the object number and generation.
        let mut pending: Vec<(i64, usize)> = Vec::new();

        while let Some(token) = lexer.next_token()? {
            match token.kind {
                TokenKind::Integer => {
                    if pending.len() == 2 {
                        pending.remove(0);
                    }
                    pending.push((int_value(&token)?, token.offset));
                }
                TokenKind::Word => {
                    match token.raw {
                        b"obj" => {
                            if pending.len() != 2 {
                                return Err(PdfError::parse(
                                    token.offset,
                                    "obj keyword without object number and generation",
                                ));
                            }
                            let (generation, _) = pending[1];
                            let (id, id_offset) = pending[0];
                            pending.clear();
                            let id = u32::try_from(id).map_err(|_| {
                                PdfError::parse(id_offset, "object number out of range")
                            })?;
                            let generation = u16::try_from(generation).map_err(|_| {
                                PdfError::parse(id_offset, "generation number out of range")
                            })?;
                            self.parse_indirect(&mut lexer, id, generation, id_offset)?;
                        }
                        b"xref" => {
                            pending.clear();
                            xref::parse_xref_table(&mut lexer)?;
                        }
                        b"trailer" => {
                            pending.clear();
                            let value = parse_value(&mut lexer, self.decode_names, 0)?;
                            let Object::Dictionary(dict) = value else {
                                return Err(PdfError::parse(
                                    token.offset,
                                    "trailer keyword not followed by a dictionary",
                                ));
                            };
                            self.trailers.push(TrailerCandidate {
                                dict,
                                offset: token.offset,
                                from_xref_stream: false,
                            });
                        }
                        b"startxref" => {
                            pending.clear();
                            let target = lexer
                                .next_token()?
                                .filter(|t| t.kind == TokenKind::Integer)
                                .ok_or_else(|| {
                                    PdfError::parse(token.offset, "garbled startxref")
                                })?;
                            let value = int_value(&target)?;
                            if value < 0 {
                                return Err(PdfError::parse(target.offset, "garbled startxref"));
                            }
                            self.startxref = Some(value as usize);
                        }
                        other => {
                            return Err(PdfError::parse(
                                token.offset,
                                format!(
                                    "unexpected keyword '{}' at top level",
                                    String::from_utf8_lossy(other)
                                ),
                            ));
                        }
                    }
                }
                _ => {
                    return Err(PdfError::parse(token.offset, "unexpected token at top level"));
                }
            }
        }
        Ok(())
    }

    /// Body of `N M obj … endobj`, including the stream case.
    fn parse_indirect(
        &mut self,
        lexer: &mut Lexer<'a>,
        id: u32,
        generation: u16,
        header_offset: usize,
    ) -> Result<(), PdfError> {
        let mut body = parse_value(lexer, self.decode_names, 0)?;

        let next = lexer.next_token()?.ok_or_else(|| {
            PdfError::parse(self.buf.len(), "unexpected end of file in indirect object")
        })?;
        if next.is_word(b"stream") {
            let Object::Dictionary(mut dict) = body else {
                return Err(PdfError::parse(
                    next.offset,
                    "stream keyword not preceded by a dictionary",
                ));
            };
            let data = self.read_stream_body(lexer, &dict, next.offset)?;
            dict.insert("Length", data.len() as i64);
            body = Object::Stream(Stream::new(dict, data.to_vec()));

            let end = lexer.next_token()?;
            match end {
                Some(t) if t.is_word(b"endobj") => {}
                Some(t) => return Err(PdfError::parse(t.offset, "expected endobj after stream")),
                None => {
                    return Err(PdfError::parse(
                        self.buf.len(),
                        "unexpected end of file after stream",
                    ));
                }
            }
        } else if !next.is_word(b"endobj") {
            return Err(PdfError::parse(next.offset, "expected endobj"));
        }

        // Xref streams double as trailer dictionaries.
        if let Object::Stream(stream) = &body {
            if stream.dict.get(b"Type").and_then(Object::as_name) == Some(b"XRef") {
                self.trailers.push(TrailerCandidate {
                    dict: stream.dict.clone(),
                    offset: header_offset,
                    from_xref_stream: true,
                });
            }
        }

        let node = NodeId(self.nodes.len());
        self.nodes.push(body);
        self.node_offsets.push(header_offset);
        // Redefinitions later in the file (incremental updates) win.
        self.registry.insert((id, generation), node);
        Ok(())
    }

    /// Stream payload extraction: trust a declared integer `/Length` only
    /// if `endstream` actually follows it; otherwise take the shortest
    /// body terminated by optional whitespace and `endstream`.
    fn read_stream_body(
        &self,
        lexer: &mut Lexer<'a>,
        dict: &Dict,
        keyword_offset: usize,
    ) -> Result<&'a [u8], PdfError> {
        let buf = self.buf;
        let mut start = lexer.pos();
        if buf.get(start) == Some(&b'\r') {
            start += 1;
        }
        if buf.get(start) == Some(&b'\n') {
            start += 1;
        }

        let declared = dict.get(b"Length").and_then(Object::as_int);
        if let Some(len) = declared {
            if len >= 0 {
                let end = start.checked_add(len as usize).filter(|e| *e <= buf.len());
                if let Some(end) = end {
                    if let Some(after) = skip_ws_then_endstream(buf, end) {
                        lexer.seek(after);
                        return Ok(&buf[start..end]);
                    }
                }
            }
        }

        let found = find(&buf[start..], b"endstream")
            .map(|rel| start + rel)
            .ok_or(PdfError::StreamTruncated {
                offset: keyword_offset,
            })?;
        let mut body_end = found;
        while body_end > start && lexer::is_whitespace(buf[body_end - 1]) {
            body_end -= 1;
        }
        if let Some(len) = declared {
            warn!(
                "stream at byte {keyword_offset}: declared Length {len} but actual {}",
                body_end - start
            );
        }
        lexer.seek(found + b"endstream".len());
        Ok(&buf[start..body_end])
    }

    /// Merge the collected trailers: the chain starts at the candidate
    /// nearest the final `startxref` value and follows `Prev`; remaining
    /// candidates append in reverse file order. The first trailer to
    /// define a key wins.
    fn merge_trailers(&mut self) -> Result<Dict, PdfError> {
        if self.trailers.is_empty() {
            return Err(PdfError::TrailerMissing);
        }
        if self.startxref.is_none() {
            warn!("missing startxref; using the trailer closest to end of file");
        }

        let mut order: Vec<usize> = Vec::new();
        let mut used = vec![false; self.trailers.len()];

        let mut target = self.startxref;
        loop {
            let next = match target {
                Some(t) => nearest_candidate(&self.trailers, &used, t),
                // No hint: the candidate closest to the end of the file.
                None => self
                    .trailers
                    .iter()
                    .enumerate()
                    .filter(|(i, _)| !used[*i])
                    .max_by_key(|(_, c)| c.offset)
                    .map(|(i, _)| i),
            };
            let Some(idx) = next else { break };
            order.push(idx);
            used[idx] = true;
            target = match self.trailers[idx].dict.get(b"Prev").and_then(Object::as_int) {
                Some(prev) if prev >= 0 => Some(prev as usize),
                _ => break,
            };
        }

        let mut rest: Vec<usize> = (0..self.trailers.len()).filter(|i| !used[*i]).collect();
        rest.sort_by_key(|i| std::cmp::Reverse(self.trailers[*i].offset));
        order.extend(rest);

        let mut merged = Dict::new();
        for idx in order {
            let candidate = &self.trailers[idx];
            for (key, value) in candidate.dict.iter() {
                if STREAM_ONLY_TRAILER_KEYS.contains(&key.as_bytes()) {
                    continue;
                }
                if candidate.from_xref_stream && key.as_bytes() == b"Type" {
                    continue;
                }
                if !merged.contains_key(key.as_bytes()) {
                    merged.insert(key.clone(), value.clone());
                }
            }
        }

        if merged.is_empty() {
            return Err(PdfError::TrailerMissing);
        }
        Ok(merged)
    }

    /// Inflate every FlateDecode stream in place.
    fn decode_filters(&mut self) -> Result<(), PdfError> {
        for i in 0..self.nodes.len() {
            let offset = self.node_offsets[i];
            if let Object::Stream(stream) = &mut self.nodes[i] {
                filters::decode_stream(stream, offset)?;
            }
        }
        Ok(())
    }
}

fn nearest_candidate(
    trailers: &[TrailerCandidate],
    used: &[bool],
    target: usize,
) -> Option<usize> {
    trailers
        .iter()
        .enumerate()
        .filter(|(i, _)| !used[*i])
        .min_by_key(|(_, c)| c.offset.abs_diff(target))
        .map(|(i, _)| i)
}

/// Parse one value. References (`N M R`) are assembled by looking ahead
/// two tokens when an integer shows up.
fn parse_value(
    lexer: &mut Lexer<'_>,
    decode_names: bool,
    depth: usize,
) -> Result<Object, PdfError> {
    if depth > MAX_DEPTH {
        return Err(PdfError::parse(lexer.pos(), "value nesting too deep"));
    }
    let token = lexer
        .next_token()?
        .ok_or_else(|| PdfError::parse(lexer.pos(), "unexpected end of input"))?;

    match token.kind {
        TokenKind::Integer => {
            let save = lexer.pos();
            if let Some(reference) = try_reference(lexer, &token)? {
                return Ok(Object::Reference(reference));
            }
            lexer.seek(save);
            Ok(Object::Integer(int_value(&token)?))
        }
        TokenKind::Real => {
            let real = std::str::from_utf8(token.raw)
                .ok()
                .and_then(Real::from_literal)
                .ok_or_else(|| PdfError::parse(token.offset, "malformed real number"))?;
            Ok(Object::Real(real))
        }
        TokenKind::Name => Ok(Object::Name(Name::new(lexer::decode_name(
            token.raw,
            decode_names,
        )))),
        TokenKind::LiteralString => Ok(Object::String(lexer::decode_literal_string(token.raw))),
        TokenKind::HexString => Ok(Object::HexString(lexer::normalize_hex_string(token.raw))),
        TokenKind::ArrayOpen => {
            let mut items = Vec::new();
            loop {
                let next = lexer.peek_token()?.ok_or_else(|| {
                    PdfError::parse(token.offset, "unterminated array")
                })?;
                if next.kind == TokenKind::ArrayClose {
                    lexer.next_token()?;
                    break;
                }
                items.push(parse_value(lexer, decode_names, depth + 1)?);
            }
            Ok(Object::Array(items))
        }
        TokenKind::DictOpen => {
            let mut dict = Dict::new();
            loop {
                let key = lexer.next_token()?.ok_or_else(|| {
                    PdfError::parse(token.offset, "unterminated dictionary")
                })?;
                match key.kind {
                    TokenKind::DictClose => break,
                    TokenKind::Name => {
                        let name = Name::new(lexer::decode_name(key.raw, decode_names));
                        let value = parse_value(lexer, decode_names, depth + 1)?;
                        dict.insert(name, value);
                    }
                    _ => {
                        return Err(PdfError::parse(
                            key.offset,
                            "dictionary key must be a name",
                        ));
                    }
                }
            }
            Ok(Object::Dictionary(dict))
        }
        TokenKind::Word => match token.raw {
            b"true" => Ok(Object::Boolean(true)),
            b"false" => Ok(Object::Boolean(false)),
            b"null" => Ok(Object::Null),
            other => Err(PdfError::parse(
                token.offset,
                format!(
                    "unexpected keyword '{}' in value position",
                    String::from_utf8_lossy(other)
                ),
            )),
        },
        TokenKind::DictClose | TokenKind::ArrayClose => Err(PdfError::parse(
            token.offset,
            "unbalanced bracket",
        )),
    }
}

/// Look ahead for `M R` after an integer; the caller rewinds on `None`.
fn try_reference(lexer: &mut Lexer<'_>, first: &Token<'_>) -> Result<Option<ObjRef>, PdfError> {
    let Some(second) = lexer.next_token()? else {
        return Ok(None);
    };
    if second.kind != TokenKind::Integer {
        return Ok(None);
    }
    let Some(third) = lexer.next_token()? else {
        return Ok(None);
    };
    if !third.is_word(b"R") {
        return Ok(None);
    }
    let id = u32::try_from(int_value(first)?).ok();
    let generation = u16::try_from(int_value(&second)?).ok();
    match (id, generation) {
        (Some(id), Some(generation)) => Ok(Some(ObjRef { id, generation })),
        _ => Ok(None),
    }
}

fn int_value(token: &Token<'_>) -> Result<i64, PdfError> {
    std::str::from_utf8(token.raw)
        .ok()
        .and_then(|s| s.parse::<i64>().ok())
        .ok_or_else(|| PdfError::parse(token.offset, "integer out of range"))
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

/// `endstream` after optional whitespace; returns the position just past
/// the keyword.
fn skip_ws_then_endstream(buf: &[u8], mut pos: usize) -> Option<usize> {
    while pos < buf.len() && lexer::is_whitespace(buf[pos]) {
        pos += 1;
    }
    if buf[pos..].starts_with(b"endstream") {
        Some(pos + b"endstream".len())
    } else {
        None
    }
}

fn parse_version(after_header: &[u8]) -> Option<(u8, u8)> {
    let mut it = after_header.iter();
    let major = *it.next()?;
    if !major.is_ascii_digit() || *it.next()? != b'.' {
        return None;
    }
    let minor = *it.next()?;
    if !minor.is_ascii_digit() {
        return None;
    }
    Some((major - b'0', minor - b'0'))
}

/// The four marker bytes of the `%…` comment on the line after the
/// header, when each has the high bit set.
fn read_binary_signature(buf: &[u8], header_pos: usize) -> [u8; 4] {
    let mut pos = header_pos;
    while pos < buf.len() && !matches!(buf[pos], 0x0A | 0x0D) {
        pos += 1;
    }
    while pos < buf.len() && matches!(buf[pos], 0x0A | 0x0D) {
        pos += 1;
    }
    if buf.get(pos) == Some(&b'%') {
        if let Some(marker) = buf.get(pos + 1..pos + 5) {
            if marker.iter().all(|b| *b >= 0x80) {
                return [marker[0], marker[1], marker[2], marker[3]];
            }
        }
    }
    DEFAULT_BINARY_SIGNATURE
}
