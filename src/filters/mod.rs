//! Stream filter layer.
//!
//! Only FlateDecode is understood: compressed streams are inflated on read
//! and deflated again on write. Every other filter name is carried through
//! untouched, payload and all.

use std::io::{Read, Write};

use flate2::Compression;
use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use log::warn;

use crate::core::{Dict, Object, PdfError, Stream};

const FLATE: &[u8] = b"FlateDecode";

pub(crate) fn inflate(data: &[u8]) -> Result<Vec<u8>, PdfError> {
    let mut out = Vec::new();
    ZlibDecoder::new(data)
        .read_to_end(&mut out)
        .map_err(|e| PdfError::Inflate(e.to_string()))?;
    Ok(out)
}

pub(crate) fn deflate(data: &[u8]) -> Result<Vec<u8>, PdfError> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::best());
    encoder
        .write_all(data)
        .map_err(|e| PdfError::Deflate(e.to_string()))?;
    encoder.finish().map_err(|e| PdfError::Deflate(e.to_string()))
}

/// True when the stream's first (or only) filter is FlateDecode.
pub(crate) fn first_filter_is_flate(dict: &Dict) -> bool {
    match dict.get(b"Filter") {
        Some(Object::Name(n)) => n.as_bytes() == FLATE,
        Some(Object::Array(filters)) => filters
            .first()
            .and_then(Object::as_name)
            .is_some_and(|n| n == FLATE),
        _ => false,
    }
}

/// True when the stream carries any filter at all.
pub(crate) fn has_filter(dict: &Dict) -> bool {
    match dict.get(b"Filter") {
        Some(Object::Array(filters)) => !filters.is_empty(),
        Some(_) => true,
        None => false,
    }
}

/// PNG/TIFF predictors change the byte layout after inflation; those
/// streams are left opaque rather than half-decoded.
fn has_unsupported_predictor(dict: &Dict) -> bool {
    let parms = match dict.get(b"DecodeParms") {
        Some(Object::Array(parms)) => parms.first(),
        other => other,
    };
    parms
        .and_then(Object::as_dict)
        .and_then(|d| d.get(b"Predictor"))
        .and_then(Object::as_int)
        .is_some_and(|p| p > 1)
}

/// Read-side decode: inflate a FlateDecode stream in place, drop
/// FlateDecode from the filter chain, and mark the stream as having
/// arrived compressed. Returns whether anything was done.
pub(crate) fn decode_stream(stream: &mut Stream, offset: usize) -> Result<bool, PdfError> {
    if !first_filter_is_flate(&stream.dict) {
        return Ok(false);
    }
    if has_unsupported_predictor(&stream.dict) {
        warn!("stream at byte {offset}: FlateDecode with predictor left undecoded");
        return Ok(false);
    }

    stream.data = inflate(&stream.data)?;
    stream.dict.insert("Length", stream.data.len() as i64);
    pop_first_filter(&mut stream.dict);
    stream.flags.was_compressed = true;
    Ok(true)
}

/// Remove the first filter (and its DecodeParms slot) from the chain.
fn pop_first_filter(dict: &mut Dict) {
    match dict.remove(b"Filter") {
        Some(Object::Array(mut filters)) if filters.len() > 1 => {
            filters.remove(0);
            if filters.len() == 1 {
                dict.insert("Filter", filters.remove(0));
            } else {
                dict.insert("Filter", Object::Array(filters));
            }
            if let Some(Object::Array(mut parms)) = dict.remove(b"DecodeParms") {
                if !parms.is_empty() {
                    parms.remove(0);
                }
                if !parms.is_empty() {
                    dict.insert("DecodeParms", Object::Array(parms));
                }
            }
        }
        Some(_) => {
            dict.remove(b"DecodeParms");
        }
        None => {}
    }
}

/// Prepend FlateDecode to the filter chain for write-side compression.
pub(crate) fn push_flate_filter(dict: &mut Dict) {
    match dict.remove(b"Filter") {
        None => {
            dict.insert("Filter", Object::name(FLATE));
        }
        Some(Object::Array(mut filters)) => {
            filters.insert(0, Object::name(FLATE));
            dict.insert("Filter", Object::Array(filters));
            if let Some(Object::Array(parms)) = dict.get_mut(b"DecodeParms") {
                parms.insert(0, Object::Null);
            }
        }
        Some(existing) => {
            dict.insert("Filter", Object::Array(vec![Object::name(FLATE), existing]));
            if let Some(parms) = dict.remove(b"DecodeParms") {
                dict.insert("DecodeParms", Object::Array(vec![Object::Null, parms]));
            }
        }
    }
}
