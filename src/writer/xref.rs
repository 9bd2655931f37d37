//! File assembly: indirect-object bodies plus the cross-reference index,
//! in either the classic table shape or the PDF 1.5 xref-stream shape
//! with object-stream packing.

use std::borrow::Cow;

use crate::core::{Dict, Document, Object, PdfError, SaveOptions, Stream};
use crate::filters;

use super::enumerate::Enumeration;
use super::{ObjectWriter, stream_wants_compression};

const OBJSTM_MAX_OBJECTS: usize = 65535;
const OBJSTM_MAX_BYTES: usize = 1 << 20;

/// Keys never carried from the document trailer into an emitted trailer
/// or xref-stream dictionary.
const TRAILER_SKIP: &[&[u8]] = &[
    b"DecodeParms",
    b"Filter",
    b"Index",
    b"Length",
    b"Prev",
    b"Size",
    b"Type",
    b"W",
    b"XRefStm",
];

/// Classic shape: sequential `N 0 obj` bodies, an ASCII xref table, a
/// `trailer` dictionary, `startxref`, `%%EOF`.
pub(crate) fn write_classic(
    doc: &Document,
    enumeration: &Enumeration,
    options: &SaveOptions,
    out: &mut Vec<u8>,
) -> Result<(), PdfError> {
    let mut writer = ObjectWriter::new(doc, enumeration);

    let mut offsets = Vec::with_capacity(enumeration.order.len());
    for (index, node) in enumeration.order.iter().enumerate() {
        offsets.push(out.len());
        write_indirect_object(doc, &mut writer, out, index as u32 + 1, *node, options)?;
    }

    let xref_offset = out.len();
    let size = enumeration.len() + 1;
    out.extend_from_slice(format!("xref\n0 {size}\n").as_bytes());
    out.extend_from_slice(b"0000000000 65535 f \n");
    for offset in &offsets {
        out.extend_from_slice(format!("{offset:010} 00000 n \n").as_bytes());
    }

    let mut trailer = trailer_without_index_keys(doc);
    trailer.insert("Size", size as i64);
    out.extend_from_slice(b"trailer ");
    writer.write_value(out, &Object::Dictionary(trailer), 0)?;
    out.extend_from_slice(format!("\nstartxref\n{xref_offset}\n%%EOF\n").as_bytes());
    Ok(())
}

/// PDF 1.5 shape: eligible objects packed into `/ObjStm` containers, a
/// binary xref stream as the final object, no `trailer` keyword.
pub(crate) fn write_with_object_streams(
    doc: &Document,
    enumeration: &Enumeration,
    options: &SaveOptions,
    out: &mut Vec<u8>,
) -> Result<(), PdfError> {
    let mut writer = ObjectWriter::new(doc, enumeration);
    let encrypt_node = doc.trailer.get(b"Encrypt").and_then(Object::as_link);

    #[derive(Clone, Copy)]
    enum Placement {
        Direct,
        Packed { container: usize, index: u16 },
    }

    // Pack pass: accumulate minified member bodies until a container is
    // full (object count or byte budget), then start the next one.
    let mut placements = Vec::with_capacity(enumeration.order.len());
    let mut containers: Vec<Container> = Vec::new();
    let mut current = Container::default();

    for (index, node) in enumeration.order.iter().enumerate() {
        let id = index as u32 + 1;
        let value = doc.node(*node);
        let packable = !matches!(value, Object::Stream(_)) && Some(*node) != encrypt_node;
        if !packable {
            placements.push(Placement::Direct);
            continue;
        }

        let mut member = Vec::new();
        let mut line_len = 0usize;
        writer.write_value_minified(&mut member, &mut line_len, value)?;

        let over_budget = current.count > 0
            && current.header.len() + current.body.len() + member.len() + 2 > OBJSTM_MAX_BYTES;
        if current.count == OBJSTM_MAX_OBJECTS || over_budget {
            containers.push(std::mem::take(&mut current));
        }

        let offset = current.body.len();
        current
            .header
            .extend_from_slice(format!("{id} {offset} ").as_bytes());
        current.body.extend_from_slice(&member);
        current.body.push(b'\n');
        placements.push(Placement::Packed {
            container: containers.len(),
            index: current.count as u16,
        });
        current.count += 1;
    }
    if current.count > 0 {
        containers.push(current);
    }

    let container_base = enumeration.order.len() as u32;
    let xref_id = container_base + containers.len() as u32 + 1;
    let size = xref_id as usize + 1;

    // (type, field2, field3) per object id; W = [1, 4, 2].
    let mut entries: Vec<(u8, u32, u16)> = vec![(0, 0, 0); size];
    entries[0] = (0, 0, 0xFFFF);

    for (index, node) in enumeration.order.iter().enumerate() {
        let id = index + 1;
        match placements[index] {
            Placement::Direct => {
                entries[id] = (1, out.len() as u32, 0);
                write_indirect_object(doc, &mut writer, out, id as u32, *node, options)?;
            }
            Placement::Packed { container, index } => {
                entries[id] = (2, container_base + 1 + container as u32, index);
            }
        }
    }

    for (c, container) in containers.iter().enumerate() {
        let cid = container_base + 1 + c as u32;
        entries[cid as usize] = (1, out.len() as u32, 0);
        let extends = (c > 0).then(|| container_base + c as u32);
        write_container(out, cid, extends, container, options)?;
    }

    let xref_offset = out.len();
    entries[xref_id as usize] = (1, xref_offset as u32, 0);

    let mut data = Vec::with_capacity(entries.len() * 7);
    for (kind, second, third) in &entries {
        data.push(*kind);
        data.extend_from_slice(&second.to_be_bytes());
        data.extend_from_slice(&third.to_be_bytes());
    }
    let packed = filters::deflate(&data)?;

    let mut dict = trailer_without_index_keys(doc);
    dict.insert("Filter", Object::name("FlateDecode"));
    dict.insert(
        "Index",
        Object::Array(vec![Object::Integer(0), Object::Integer(size as i64)]),
    );
    dict.insert("Length", packed.len() as i64);
    dict.insert("Size", size as i64);
    dict.insert("Type", Object::name("XRef"));
    dict.insert(
        "W",
        Object::Array(vec![
            Object::Integer(1),
            Object::Integer(4),
            Object::Integer(2),
        ]),
    );

    out.extend_from_slice(format!("{xref_id} 0 obj\n").as_bytes());
    writer.write_value(out, &Object::Dictionary(dict), 0)?;
    out.extend_from_slice(b"\nstream\n");
    out.extend_from_slice(&packed);
    if packed.last() != Some(&b'\n') {
        out.push(b'\n');
    }
    out.extend_from_slice(b"endstream\nendobj\n\n");

    out.extend_from_slice(format!("startxref\n{xref_offset}\n%%EOF\n").as_bytes());
    Ok(())
}

fn trailer_without_index_keys(doc: &Document) -> Dict {
    let mut dict = Dict::new();
    for (key, value) in doc.trailer.iter() {
        if TRAILER_SKIP.contains(&key.as_bytes()) {
            continue;
        }
        dict.insert(key.clone(), value.clone());
    }
    dict
}

fn write_indirect_object(
    doc: &Document,
    writer: &mut ObjectWriter<'_>,
    out: &mut Vec<u8>,
    id: u32,
    node: crate::core::NodeId,
    options: &SaveOptions,
) -> Result<(), PdfError> {
    out.extend_from_slice(format!("{id} 0 obj\n").as_bytes());
    match doc.node(node) {
        Object::Stream(stream) => write_stream_object(writer, out, stream, options)?,
        value => writer.write_value(out, value, 0)?,
    }
    out.extend_from_slice(b"\nendobj\n\n");
    Ok(())
}

fn write_stream_object(
    writer: &mut ObjectWriter<'_>,
    out: &mut Vec<u8>,
    stream: &Stream,
    options: &SaveOptions,
) -> Result<(), PdfError> {
    let (dict, data): (Cow<'_, Dict>, Cow<'_, [u8]>) = if stream_wants_compression(stream, options)
    {
        let data = filters::deflate(&stream.data)?;
        let mut dict = stream.dict.clone();
        filters::push_flate_filter(&mut dict);
        dict.insert("Length", data.len() as i64);
        (Cow::Owned(dict), Cow::Owned(data))
    } else {
        (Cow::Borrowed(&stream.dict), Cow::Borrowed(&stream.data[..]))
    };

    writer.write_dict(out, &dict, 0)?;
    out.extend_from_slice(b"\nstream\n");
    out.extend_from_slice(&data);
    if data.last() != Some(&b'\n') {
        out.push(b'\n');
    }
    out.extend_from_slice(b"endstream");
    Ok(())
}

/// An in-progress object-stream container: `(id offset)` header pairs and
/// the concatenated minified member bodies.
#[derive(Default)]
struct Container {
    header: Vec<u8>,
    body: Vec<u8>,
    count: usize,
}

/// One `/ObjStm` container. The dictionary is written by hand because
/// `Extends` refers to an output id that has no arena node behind it.
fn write_container(
    out: &mut Vec<u8>,
    cid: u32,
    extends: Option<u32>,
    container: &Container,
    options: &SaveOptions,
) -> Result<(), PdfError> {
    let first = container.header.len();
    let mut payload = Vec::with_capacity(first + container.body.len());
    payload.extend_from_slice(&container.header);
    payload.extend_from_slice(&container.body);

    let compress = options.compress_enabled();
    let payload = if compress {
        filters::deflate(&payload)?
    } else {
        payload
    };

    out.extend_from_slice(format!("{cid} 0 obj\n<<\n").as_bytes());
    if let Some(previous) = extends {
        out.extend_from_slice(format!("  /Extends {previous} 0 R\n").as_bytes());
    }
    if compress {
        out.extend_from_slice(b"  /Filter /FlateDecode\n");
    }
    out.extend_from_slice(format!("  /First {first}\n").as_bytes());
    out.extend_from_slice(format!("  /Length {}\n", payload.len()).as_bytes());
    out.extend_from_slice(format!("  /N {}\n", container.count).as_bytes());
    out.extend_from_slice(b"  /Type /ObjStm\n>>\nstream\n");
    out.extend_from_slice(&payload);
    if payload.last() != Some(&b'\n') {
        out.push(b'\n');
    }
    out.extend_from_slice(b"endstream\nendobj\n\n");
    Ok(())
}
