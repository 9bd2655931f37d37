//! `/ObjStm` expansion (PDF 1.5 object streams).
//!
//! A container's inflated payload starts with `N` whitespace-separated
//! `(id offset)` integer pairs; offsets are relative to `/First`. Each
//! body is parsed with the ordinary value parser and registered under its
//! id at generation 0.

use std::collections::hash_map::Entry;

use log::warn;

use crate::core::{NodeId, Object, PdfError};
use crate::filters;
use crate::parser::lexer::{Lexer, TokenKind};
use crate::parser::{Parser, int_value, parse_value};

impl Parser<'_> {
    /// Expand every object-stream container. Containers later in the file
    /// are processed first and existing registrations are never displaced,
    /// so incremental updates and `/Extends` chains resolve in favor of
    /// the newest definition.
    pub(super) fn expand_object_streams(&mut self) -> Result<(), PdfError> {
        let mut containers: Vec<usize> = (0..self.nodes.len())
            .filter(|i| is_object_stream(&self.nodes[*i]))
            .collect();
        containers.sort_by_key(|i| std::cmp::Reverse(self.node_offsets[*i]));

        for idx in containers {
            let offset = self.node_offsets[idx];
            let Some((count, first, data)) = self.container_payload(idx, offset) else {
                continue;
            };

            let mut header = Lexer::new(&data);
            // Each pair needs at least four bytes; a hostile N cannot
            // reserve more than the payload could hold.
            let mut pairs: Vec<(u32, usize)> = Vec::with_capacity(count.min(data.len() / 4 + 1));
            for _ in 0..count {
                let Some((id, off)) = read_pair(&mut header)? else {
                    warn!("object stream at byte {offset}: truncated (id, offset) header");
                    break;
                };
                pairs.push((id, off));
            }

            for (id, off) in pairs {
                let Some(at) = first.checked_add(off).filter(|at| *at <= data.len()) else {
                    warn!("object stream at byte {offset}: object {id} offset out of bounds");
                    continue;
                };
                let mut body = Lexer::at(&data, at);
                let value = parse_value(&mut body, self.decode_names, 0)?;
                if let Entry::Vacant(slot) = self.registry.entry((id, 0)) {
                    let node = NodeId(self.nodes.len());
                    slot.insert(node);
                    self.nodes.push(value);
                    self.node_offsets.push(offset);
                }
            }
        }
        Ok(())
    }

    /// `(N, First, inflated payload)` of a container, or `None` with a
    /// warning when the container is unusable.
    fn container_payload(&self, idx: usize, offset: usize) -> Option<(usize, usize, Vec<u8>)> {
        let Object::Stream(stream) = &self.nodes[idx] else {
            return None;
        };
        if filters::has_filter(&stream.dict) {
            warn!("object stream at byte {offset}: undecoded filter, contents unavailable");
            return None;
        }
        let count = stream.dict.get(b"N").and_then(Object::as_int);
        let first = stream.dict.get(b"First").and_then(Object::as_int);
        match (count, first) {
            (Some(count), Some(first)) if count >= 0 && first >= 0 => {
                Some((count as usize, first as usize, stream.data.clone()))
            }
            _ => {
                warn!("object stream at byte {offset}: missing or bad N/First");
                None
            }
        }
    }
}

fn is_object_stream(value: &Object) -> bool {
    value
        .as_stream()
        .and_then(|s| s.dict.get(b"Type"))
        .and_then(Object::as_name)
        == Some(b"ObjStm")
}

fn read_pair(lexer: &mut Lexer<'_>) -> Result<Option<(u32, usize)>, PdfError> {
    let Some(id_token) = lexer.next_token()? else {
        return Ok(None);
    };
    let Some(off_token) = lexer.next_token()? else {
        return Ok(None);
    };
    if id_token.kind != TokenKind::Integer || off_token.kind != TokenKind::Integer {
        return Ok(None);
    }
    let id = u32::try_from(int_value(&id_token)?).ok();
    let off = usize::try_from(int_value(&off_token)?).ok();
    Ok(id.zip(off))
}
